//! 用横向轮廓线逐层切分区域多边形.

use super::polygon::{bounds_of, RegionPolygon, Stratum};
use super::unit;
use crate::consts::grid::{AREA_TOLERANCE, NEGLIGIBLE_AREA_RATIO};
use geo::{Area, BooleanOps, Coord, LineString, MultiPolygon, Polygon};

/// 从上到下依次用 `horizontal_lines` 切分 `region`, 得到按深度排列的深度层.
///
/// 每一次切分都会产生 "上" 和 "下" 两部分, 上半部分加入结果,
/// 下半部分作为剩余区域参与下一次切分; 最后的剩余区域作为最深的一层加入结果.
/// 因此正常情况下结果共有 `horizontal_lines.len() + 1` 层.
///
/// "上" 和 "下" 由轮廓线的方向决定: 沿轮廓线前进时, 位于右手侧的为上, 左手侧的为下
/// (见 [`DepthGrid`](super::DepthGrid) 中关于方向的约定).
///
/// # 注意
///
/// 若某条轮廓线没有真正穿过剩余区域 (任意一侧的面积可忽略), 则该次切分被跳过,
/// 剩余区域保持不变, 最终层数相应减少. 下游必须以实际层数而不是请求的行数计算深度百分比.
pub fn create_depth_polygons(region: &RegionPolygon, horizontal_lines: &[LineString<f64>]) -> Vec<Stratum> {
    let negligible = region.area() * NEGLIGIBLE_AREA_RATIO;
    let mut strata = Vec::with_capacity(horizontal_lines.len() + 1);
    let mut rest = MultiPolygon::new(vec![region.polygon().clone()]);

    for (index, line) in horizontal_lines.iter().enumerate() {
        match split_by_contour(&rest, line, region, negligible) {
            Some((upper, lower)) => {
                strata.push(Stratum::new(upper));
                rest = lower;
            }
            None => log::warn!("depth contour {index} does not split the remaining region, skipped"),
        }
    }
    strata.push(Stratum::new(rest));

    let total: f64 = strata.iter().map(Stratum::area).sum();
    let ratio = total / region.area();
    log::debug!("recomputed area {:.4} %", ratio * 100.0);
    if (ratio - 1.0).abs() > AREA_TOLERANCE {
        log::warn!(
            "strata cover {:.4} % of the region area, expected 100 %",
            ratio * 100.0
        );
    }
    strata
}

/// 用轮廓线 `contour` 切分 `shape`, 返回 `(上, 下)`.
///
/// 任意一侧面积不超过 `negligible` 时返回 `None`.
fn split_by_contour(
    shape: &MultiPolygon<f64>,
    contour: &LineString<f64>,
    region: &RegionPolygon,
    negligible: f64,
) -> Option<(MultiPolygon<f64>, MultiPolygon<f64>)> {
    let half = MultiPolygon::new(vec![upper_half(contour, region)?]);
    let upper = shape.intersection(&half);
    let lower = shape.difference(&half);
    (upper.unsigned_area() > negligible && lower.unsigned_area() > negligible).then_some((upper, lower))
}

/// 构建 `contour` 右手侧 (上侧) 的一个足够大的多边形.
///
/// 轮廓线的两端沿首尾连线方向各延长 `reach`, 再向上侧平移 `reach` 封闭.
/// `reach` 远大于区域和轮廓线的尺寸, 所以该多边形在区域附近等价于上半平面.
fn upper_half(contour: &LineString<f64>, region: &RegionPolygon) -> Option<Polygon<f64>> {
    let points = &contour.0;
    let (&first, &last) = (points.first()?, points.last()?);
    let u = unit(last - first)?;
    // 左手侧法向为 (-u.y, u.x), 上侧取其反方向.
    let up = Coord { x: u.y, y: -u.x };

    let (lo, hi) = bounds_of(region.vertices().iter().chain(points).copied());
    let reach = 4.0 * (hi.x - lo.x).hypot(hi.y - lo.y) + 1.0;

    let left = first - u * reach;
    let right = last + u * reach;
    let mut ring = Vec::with_capacity(points.len() + 4);
    ring.push(left);
    ring.extend(points.iter().copied());
    ring.push(right);
    ring.push(right + up * reach);
    ring.push(left + up * reach);
    Some(Polygon::new(LineString::from(ring), vec![]))
}
