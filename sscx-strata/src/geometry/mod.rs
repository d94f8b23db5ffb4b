//! 几何引擎.
//!
//! 根据人工标注的四边形 (上边 = 软脑膜一侧, 下边 = 白质一侧) 在皮层区域多边形上构建深度网格,
//! 然后用网格中的横向轮廓线将区域多边形逐层切开, 得到按深度排列的子区域 (深度层).
//!
//! 坐标单位均为微米. 坐标系不限定 y 轴方向, 只要求四边形按
//! `top_left -> top_right -> bottom_right -> bottom_left` 的顺序给出.

mod clip;
mod count;
mod grid;
mod polygon;
mod split;

pub use count::{compute_cells_depth, count_nb_cell_per_polygon};
pub use grid::{create_grid, DepthGrid};
pub use polygon::{Quadrilateral, RegionPolygon, Stratum};
pub(crate) use polygon::bounds_of;
pub use split::create_depth_polygons;

use geo::Coord;
use thiserror::Error;

/// 几何退化或非法几何输入.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum GeometryError {
    /// 网格的行数或列数为 0.
    #[error("invalid grid resolution {rows}x{cols}")]
    InvalidResolution {
        /// 行数.
        rows: usize,
        /// 列数.
        cols: usize,
    },

    /// 四边形的角点重合, 共线或不是有限值.
    #[error("degenerate quadrilateral")]
    DegenerateQuadrilateral,

    /// 多边形顶点不足, 含非有限值或面积为 0.
    #[error("invalid region polygon: {0}")]
    InvalidPolygon(&'static str),

    /// 第 `0` 条纵向分割线 (从左数, 从 0 开始) 与区域多边形没有交集.
    #[error("vertical divider {0} does not cross the region polygon")]
    DividerMissesRegion(usize),
}

/// 几何运算结果.
pub type GeometryResult<T> = Result<T, GeometryError>;

/// 线性插值 `a + (b - a) * t`.
#[inline]
pub(crate) fn lerp(a: Coord, b: Coord, t: f64) -> Coord {
    a + (b - a) * t
}

/// 两点的欧几里得距离.
#[inline]
pub fn distance(a: Coord, b: Coord) -> f64 {
    (a.x - b.x).hypot(a.y - b.y)
}

/// 向量 `oa` 与 `ob` 的叉积.
#[inline]
pub(crate) fn cross(o: Coord, a: Coord, b: Coord) -> f64 {
    (a.x - o.x) * (b.y - o.y) - (a.y - o.y) * (b.x - o.x)
}

/// 单位向量. 零向量返回 `None`.
#[inline]
pub(crate) fn unit(v: Coord) -> Option<Coord> {
    let len = v.x.hypot(v.y);
    (len > 0.0 && len.is_finite()).then(|| v / len)
}

/// 将线段 `p1 -> p2` 向两端按 `ratio` 倍延长.
///
/// 返回 `(a, b)`, 其中 `a` 位于 `p1` 一侧, `b` 位于 `p2` 一侧,
/// 即 `a = p2 + ratio * (p1 - p2)`, `b = p1 + ratio * (p2 - p1)`.
pub fn extrapolate_segment(p1: Coord, p2: Coord, ratio: f64) -> (Coord, Coord) {
    let a = p2 + (p1 - p2) * ratio;
    let b = p1 + (p2 - p1) * ratio;
    (a, b)
}
