//! 深度网格构建.

use super::clip::clip_segment;
use super::polygon::{Quadrilateral, RegionPolygon};
use super::{extrapolate_segment, lerp, unit, GeometryError, GeometryResult};
use crate::consts::grid::{EXTRAPOLATION_RATIO, OUTER_DIVIDER_OFFSET_UM};
use geo::{Coord, Line, LineString};

/// 深度网格: 纵向分割线与横向 (深度) 轮廓线.
#[derive(Clone, Debug, PartialEq)]
pub struct DepthGrid {
    /// `n_cols + 1` 条纵向分割线, 从左到右排列, 每条都从上指向下.
    vertical_lines: Vec<Line<f64>>,

    /// `n_rows - 1` 条横向轮廓线, 从上到下排列.
    ///
    /// 每条轮廓线的方向保证四边形的底边位于其左手侧 (叉积为正的一侧).
    horizontal_lines: Vec<LineString<f64>>,
}

impl DepthGrid {
    /// 纵向分割线.
    #[inline]
    pub fn vertical_lines(&self) -> &[Line<f64>] {
        &self.vertical_lines
    }

    /// 横向轮廓线.
    #[inline]
    pub fn horizontal_lines(&self) -> &[LineString<f64>] {
        &self.horizontal_lines
    }
}

/// 在 `region` 上构建 `n_rows` 行 `n_cols` 列的深度网格.
///
/// 1. 纵向分割线: 最左和最右两条分别位于四边形左右边之外 2000 微米处 (沿上下边方向平移),
///   保证包住整个区域. 第 `i` 条内部分割线连接上边和下边上比例为 `i / n_cols` 的两点,
///   向两端延长 1.3 倍后与区域多边形求交. 若交集由多段组成 (区域是凹的), 只保留离上端最近的一段.
/// 2. 横向轮廓线: 第 `i` 条轮廓线依次连接每条纵向分割线上比例为 `i / n_rows` 的点.
///   这样轮廓线会随区域形状弯曲, 而不是一条直线.
///
/// # 返回值
///
/// - `n_rows` 或 `n_cols` 为 0 时返回 `Err(GeometryError::InvalidResolution)`;
/// - 某条内部分割线与区域完全不相交时返回 `Err(GeometryError::DividerMissesRegion)`;
/// - 其他情况返回 `Ok(DepthGrid)`. 相同输入总是得到相同的结果.
pub fn create_grid(
    quadrilateral: &Quadrilateral,
    region: &RegionPolygon,
    n_rows: usize,
    n_cols: usize,
) -> GeometryResult<DepthGrid> {
    if n_rows == 0 || n_cols == 0 {
        return Err(GeometryError::InvalidResolution {
            rows: n_rows,
            cols: n_cols,
        });
    }
    let Quadrilateral {
        top_left: tl,
        top_right: tr,
        bottom_right: br,
        bottom_left: bl,
    } = *quadrilateral;

    let top_dir = unit(tr - tl).ok_or(GeometryError::DegenerateQuadrilateral)?;
    let bottom_dir = unit(br - bl).ok_or(GeometryError::DegenerateQuadrilateral)?;

    let mut vertical_lines = Vec::with_capacity(n_cols + 1);
    vertical_lines.push(Line::new(
        tl - top_dir * OUTER_DIVIDER_OFFSET_UM,
        bl - bottom_dir * OUTER_DIVIDER_OFFSET_UM,
    ));
    for i in 1..n_cols {
        let f = i as f64 / n_cols as f64;
        let (a, b) = extrapolate_segment(lerp(tl, tr, f), lerp(bl, br, f), EXTRAPOLATION_RATIO);
        let pieces = clip_segment(region, a, b);
        let Some(&(start, end)) = pieces.first() else {
            return Err(GeometryError::DividerMissesRegion(i));
        };
        if pieces.len() > 1 {
            log::debug!(
                "vertical divider {i} crosses the region in {} segments, keeping the first one",
                pieces.len()
            );
        }
        vertical_lines.push(Line::new(start, end));
    }
    vertical_lines.push(Line::new(
        tr + top_dir * OUTER_DIVIDER_OFFSET_UM,
        br + bottom_dir * OUTER_DIVIDER_OFFSET_UM,
    ));

    let reverse = !quadrilateral.bottom_on_positive_side();
    let horizontal_lines = (1..n_rows)
        .map(|i| {
            let f = i as f64 / n_rows as f64;
            let mut points: Vec<Coord> = vertical_lines
                .iter()
                .map(|l| lerp(l.start, l.end, f))
                .collect();
            if reverse {
                points.reverse();
            }
            LineString::new(points)
        })
        .collect();

    Ok(DepthGrid {
        vertical_lines,
        horizontal_lines,
    })
}
