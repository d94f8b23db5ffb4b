//! 区域多边形, 参考四边形和深度层.

use super::{cross, GeometryError, GeometryResult};
use geo::{Area, Contains, Coord, Line, LineString, MultiPolygon, Point, Polygon};

/// 组织区域多边形 (例如 "S1" 或 "S1HL" 体感皮层轮廓).
///
/// 外环首尾相连, 面积严格大于 0. 该结构假设多边形是简单多边形 (没有自相交边),
/// 但不做检查.
#[derive(Clone, Debug)]
pub struct RegionPolygon {
    inner: Polygon<f64>,
    area: f64,
}

impl RegionPolygon {
    /// 从顶点序列构建. 首尾顶点可以相同也可以不同, 内部总会闭合.
    ///
    /// # 返回值
    ///
    /// - 不同顶点少于 3 个, 或存在非有限坐标, 或面积为 0 时返回
    ///   `Err(GeometryError::InvalidPolygon)`;
    /// - 其他情况返回 `Ok(RegionPolygon)`.
    pub fn new(mut vertices: Vec<Coord>) -> GeometryResult<Self> {
        if vertices.iter().any(|c| !c.x.is_finite() || !c.y.is_finite()) {
            return Err(GeometryError::InvalidPolygon("non-finite vertex"));
        }
        vertices.dedup();
        if vertices.len() > 1 && vertices.first() == vertices.last() {
            vertices.pop();
        }
        if vertices.len() < 3 {
            return Err(GeometryError::InvalidPolygon("fewer than 3 distinct vertices"));
        }

        let inner = Polygon::new(LineString::from(vertices), vec![]);
        let area = inner.unsigned_area();
        if !(area > 0.0) {
            return Err(GeometryError::InvalidPolygon("zero area"));
        }
        Ok(Self { inner, area })
    }

    /// 从 `(x, y)` 元组构建.
    pub fn from_xy<I: IntoIterator<Item = (f64, f64)>>(it: I) -> GeometryResult<Self> {
        Self::new(it.into_iter().map(Coord::from).collect())
    }

    /// 底层多边形.
    #[inline]
    pub fn polygon(&self) -> &Polygon<f64> {
        &self.inner
    }

    /// 面积 (单位: 平方微米).
    #[inline]
    pub fn area(&self) -> f64 {
        self.area
    }

    /// 闭合外环的全部顶点 (最后一个顶点与第一个相同).
    #[inline]
    pub fn vertices(&self) -> &[Coord] {
        &self.inner.exterior().0
    }

    /// 外环的所有边.
    #[inline]
    pub fn edges(&self) -> impl Iterator<Item = Line<f64>> + '_ {
        self.inner.exterior().lines()
    }

    /// 点是否严格位于多边形内部. 边界上的点不算在内.
    #[inline]
    pub fn contains(&self, c: Coord) -> bool {
        self.inner.contains(&Point::from(c))
    }

    /// 顶点坐标的包围盒 `(min, max)`.
    pub fn bounds(&self) -> (Coord, Coord) {
        bounds_of(self.vertices().iter().copied())
    }
}

/// 求点集的包围盒 `(min, max)`. 点集为空时返回 `(+inf, -inf)`.
pub(crate) fn bounds_of<I: IntoIterator<Item = Coord>>(it: I) -> (Coord, Coord) {
    let init = (
        Coord {
            x: f64::INFINITY,
            y: f64::INFINITY,
        },
        Coord {
            x: f64::NEG_INFINITY,
            y: f64::NEG_INFINITY,
        },
    );
    it.into_iter().fold(init, |(lo, hi), c| {
        (
            Coord {
                x: lo.x.min(c.x),
                y: lo.y.min(c.y),
            },
            Coord {
                x: hi.x.max(c.x),
                y: hi.y.max(c.y),
            },
        )
    })
}

/// 人工标注的参考四边形, 定义了区域的 "深度" 方向 (上 -> 下) 和 "宽度" 方向 (左 -> 右).
///
/// 它只用于生成网格, 不要求是严格的矩形.
#[derive(Copy, Clone, Debug, PartialEq)]
pub struct Quadrilateral {
    /// 左上角.
    pub top_left: Coord,
    /// 右上角.
    pub top_right: Coord,
    /// 右下角.
    pub bottom_right: Coord,
    /// 左下角.
    pub bottom_left: Coord,
}

impl Quadrilateral {
    /// 按 `top_left, top_right, bottom_right, bottom_left` 顺序构建.
    ///
    /// 四个角点必须是两两不同的有限值, 且 `top_left`, `top_right`, `bottom_left` 不共线,
    /// 否则返回 `Err(GeometryError::DegenerateQuadrilateral)`.
    pub fn new(
        top_left: Coord,
        top_right: Coord,
        bottom_right: Coord,
        bottom_left: Coord,
    ) -> GeometryResult<Self> {
        let corners = [top_left, top_right, bottom_right, bottom_left];
        if corners.iter().any(|c| !c.x.is_finite() || !c.y.is_finite()) {
            return Err(GeometryError::DegenerateQuadrilateral);
        }
        for i in 0..4 {
            if corners[i + 1..].contains(&corners[i]) {
                return Err(GeometryError::DegenerateQuadrilateral);
            }
        }
        if cross(top_left, top_right, bottom_left) == 0.0 {
            return Err(GeometryError::DegenerateQuadrilateral);
        }
        Ok(Self {
            top_left,
            top_right,
            bottom_right,
            bottom_left,
        })
    }

    /// 从 4 个角点 (或首尾重复的 5 个点) 构建, 顺序同 [`Quadrilateral::new`].
    pub fn from_ring(ring: &[Coord]) -> GeometryResult<Self> {
        match ring {
            [tl, tr, br, bl] | [tl, tr, br, bl, _] => Self::new(*tl, *tr, *br, *bl),
            _ => Err(GeometryError::DegenerateQuadrilateral),
        }
    }

    /// 四个角点, 按 `top_left, top_right, bottom_right, bottom_left` 顺序.
    #[inline]
    pub fn corners(&self) -> [Coord; 4] {
        [
            self.top_left,
            self.top_right,
            self.bottom_right,
            self.bottom_left,
        ]
    }

    /// 沿 `top_left -> top_right` 方向前进时, 底边是否位于左手侧 (叉积为正的一侧).
    ///
    /// 在 y 轴向下的图像坐标系中, 顺时针标注的四边形返回 `true`.
    #[inline]
    pub fn bottom_on_positive_side(&self) -> bool {
        cross(self.top_left, self.top_right, self.bottom_left) > 0.0
    }
}

/// 一个深度层: 区域多边形被相邻两条横向轮廓线所夹的部分.
///
/// 凹区域可能被切出多个不相连的部分, 因此用 `MultiPolygon` 表示.
#[derive(Clone, Debug)]
pub struct Stratum {
    shape: MultiPolygon<f64>,
    area: f64,
}

impl Stratum {
    /// 初始化.
    pub fn new(shape: MultiPolygon<f64>) -> Self {
        let area = shape.unsigned_area();
        Self { shape, area }
    }

    /// 面积 (单位: 平方微米).
    #[inline]
    pub fn area(&self) -> f64 {
        self.area
    }

    /// 底层几何形状.
    #[inline]
    pub fn shape(&self) -> &MultiPolygon<f64> {
        &self.shape
    }

    /// 点是否严格位于该层内部. 边界上的点不算在内.
    #[inline]
    pub fn contains(&self, c: Coord) -> bool {
        let p = Point::from(c);
        self.shape.0.iter().any(|poly| poly.contains(&p))
    }
}

impl From<&RegionPolygon> for Stratum {
    fn from(region: &RegionPolygon) -> Self {
        Self {
            shape: MultiPolygon::new(vec![region.inner.clone()]),
            area: region.area,
        }
    }
}
