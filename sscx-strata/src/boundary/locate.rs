//! 由旋转后的各层细胞估计每层的底部边界.

use super::rotate::rotated_cells_from_top_line;
use crate::consts::boundary::BOTTOM_TAIL;
use crate::data::Layer;
use geo::Coord;
use ndarray::Array2;
use ordered_float::NotNan;
use std::collections::BTreeMap;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// 一层的底部边界.
#[derive(Copy, Clone, Debug, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct LayerBoundary {
    /// 底部到原点 (第一层顶部) 的距离 (单位: 微米).
    pub absolute_um: f64,

    /// `absolute_um` 占总跨度 (最深的底部到原点) 的比例.
    pub percentage: f64,

    /// 底部在旋转坐标系中的 y 坐标.
    pub bottom_y: f64,
}

/// 一张图像的分层边界.
#[derive(Clone, Debug, PartialEq)]
pub struct BoundaryResult {
    /// 每层的底部边界. 没有细胞的层不出现.
    pub boundaries: BTreeMap<Layer, LayerBoundary>,

    /// 原点在旋转坐标系中的 y 坐标.
    pub y_origin: f64,
}

impl BoundaryResult {
    /// 按规范顺序检查 `layers` 是否全部存在, 且底部边界单调不减.
    pub fn is_consistent(&self, layers: &[Layer]) -> bool {
        let mut last = f64::NEG_INFINITY;
        for l in layers {
            match self.boundaries.get(l) {
                Some(b) if b.absolute_um >= last => last = b.absolute_um,
                _ => return false,
            }
        }
        true
    }
}

/// 估计一层的底部: 最深的 `BOTTOM_TAIL` 个点中除最深一个以外的点的平均 y 坐标.
///
/// 只有一个点时取该点. `ys` 为空时返回 `None`.
fn layer_bottom(ys: &[NotNan<f64>]) -> Option<f64> {
    let mut sorted = ys.to_vec();
    sorted.sort_unstable();
    let n = sorted.len();
    match n {
        0 => None,
        1 => Some(sorted[0].into_inner()),
        _ => {
            let tail = &sorted[n.saturating_sub(BOTTOM_TAIL)..n - 1];
            Some(tail.iter().map(|v| v.into_inner()).sum::<f64>() / tail.len() as f64)
        }
    }
}

fn y_values(points: &Array2<f64>) -> Vec<NotNan<f64>> {
    points
        .column(1)
        .iter()
        .filter_map(|&y| NotNan::new(y).ok())
        .collect()
}

/// 定位各层的底部边界.
///
/// `rotated` 中的点须已旋转到上表面水平, 且 y 轴指向深处 (图像坐标系). 原点取 `layers`
/// 按规范顺序第一个有细胞的层的最小 y 坐标. 每层的百分比为其绝对距离除以所有层中最大的绝对距离;
/// 后者不是正数时百分比为 0.
///
/// 没有细胞的层不出现在结果中. 所有层都没有细胞时返回 `None`.
pub fn locate_layers_boundaries(
    rotated: &BTreeMap<Layer, Array2<f64>>,
    layers: &[Layer],
) -> Option<BoundaryResult> {
    let mut order = layers.to_vec();
    order.sort_unstable();
    order.dedup();

    let present: Vec<(Layer, Vec<NotNan<f64>>)> = order
        .into_iter()
        .filter_map(|l| {
            let ys = y_values(rotated.get(&l)?);
            (!ys.is_empty()).then_some((l, ys))
        })
        .collect();

    let (_, first) = present.first()?;
    let y_origin = first.iter().min()?.into_inner();

    let bottoms: Vec<(Layer, f64)> = present
        .iter()
        .filter_map(|(l, ys)| Some((*l, layer_bottom(ys)?)))
        .collect();
    let span = bottoms
        .iter()
        .map(|&(_, b)| b - y_origin)
        .fold(f64::NEG_INFINITY, f64::max);
    log::info!("cortex depth span {span:.2} um");

    let boundaries = bottoms
        .into_iter()
        .map(|(l, b)| {
            let absolute_um = b - y_origin;
            let percentage = if span > 0.0 { absolute_um / span } else { 0.0 };
            (
                l,
                LayerBoundary {
                    absolute_um,
                    percentage,
                    bottom_y: b,
                },
            )
        })
        .collect();

    Some(BoundaryResult {
        boundaries,
        y_origin,
    })
}

/// 旋转后定位各层的底部边界.
///
/// 先以 `top_left -> top_right` 为上表面旋转各层的点, 再调用 [`locate_layers_boundaries`].
/// 输入的点应当已经过聚类去噪.
pub fn locate_layer_boundaries(
    points_by_layer: &BTreeMap<Layer, Array2<f64>>,
    top_left: Coord,
    top_right: Coord,
    layers: &[Layer],
) -> Option<BoundaryResult> {
    let rotated = rotated_cells_from_top_line(top_left, top_right, points_by_layer);
    locate_layers_boundaries(&rotated.points, layers)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::boundary::rotate::rotate_points;
    use geo::coord;

    fn f64_eq(a: f64, b: f64) -> bool {
        (a - b).abs() < 1e-9
    }

    /// y 坐标为 `y0, y0 + 1, ..., y0 + n - 1` 的竖直一列点.
    fn column(y0: f64, n: usize) -> Array2<f64> {
        Array2::from_shape_fn((n, 2), |(i, j)| if j == 0 { 5.0 } else { y0 + i as f64 })
    }

    #[test]
    fn test_layer_bottom() {
        let ys: Vec<NotNan<f64>> = (0..20).map(|i| NotNan::new(i as f64).unwrap()).collect();
        // 10..=18 的平均值.
        assert!(f64_eq(layer_bottom(&ys).unwrap(), 14.0));

        let few: Vec<NotNan<f64>> = [3.0, 1.0, 2.0].iter().map(|&v| NotNan::new(v).unwrap()).collect();
        assert!(f64_eq(layer_bottom(&few).unwrap(), 1.5));
        assert!(f64_eq(layer_bottom(&few[..1]).unwrap(), 3.0));
        assert!(layer_bottom(&[]).is_none());
    }

    #[test]
    fn test_locate_boundaries() {
        let mut m = BTreeMap::new();
        m.insert(Layer::L1, column(0.0, 20));
        m.insert(Layer::L2, column(20.0, 30));
        m.insert(Layer::L3, column(50.0, 50));
        m.insert(Layer::L4, Array2::zeros((0, 2)));
        let layers = [Layer::L1, Layer::L2, Layer::L3, Layer::L4];
        let r = locate_layers_boundaries(&m, &layers).unwrap();

        assert!(f64_eq(r.y_origin, 0.0));
        assert_eq!(r.boundaries.len(), 3);
        assert!(!r.boundaries.contains_key(&Layer::L4));
        let b1 = r.boundaries[&Layer::L1];
        let b3 = r.boundaries[&Layer::L3];
        assert!(f64_eq(b1.absolute_um, 14.0));
        // 50 + 40..=48 的平均值.
        assert!(f64_eq(b3.absolute_um, 94.0));
        assert!(f64_eq(b3.percentage, 1.0));
        assert!(f64_eq(b1.percentage, 14.0 / 94.0));

        assert!(r.is_consistent(&layers[..3]));
        assert!(!r.is_consistent(&layers));
    }

    #[test]
    fn test_origin_from_first_present_layer() {
        let mut m = BTreeMap::new();
        m.insert(Layer::L1, Array2::zeros((0, 2)));
        m.insert(Layer::L2, column(100.0, 5));
        let r = locate_layers_boundaries(&m, &[Layer::L2, Layer::L1]).unwrap();
        assert!(f64_eq(r.y_origin, 100.0));
        assert!(f64_eq(r.boundaries[&Layer::L2].percentage, 1.0));

        let empty: BTreeMap<Layer, Array2<f64>> = BTreeMap::new();
        assert!(locate_layers_boundaries(&empty, &Layer::ALL).is_none());
    }

    #[test]
    fn test_rotated_column() {
        // 一个倾斜 30 度的皮层柱: 旋转回来后结果与水平时相同.
        let theta = 30f64.to_radians();
        let mut straight = BTreeMap::new();
        straight.insert(Layer::L1, column(0.0, 20));
        straight.insert(Layer::L2, column(20.0, 30));
        let tilted: BTreeMap<Layer, Array2<f64>> = straight
            .iter()
            .map(|(&l, p)| (l, rotate_points(p.view(), theta)))
            .collect();
        let tl = coord! { x: 0.0, y: 0.0 };
        let tr = coord! { x: theta.cos() * 100.0, y: theta.sin() * 100.0 };

        let layers = [Layer::L1, Layer::L2];
        let expected = locate_layers_boundaries(&straight, &layers).unwrap();
        let got = locate_layer_boundaries(&tilted, tl, tr, &layers).unwrap();
        for l in layers {
            let (a, b) = (expected.boundaries[&l], got.boundaries[&l]);
            assert!((a.absolute_um - b.absolute_um).abs() < 1e-6);
            assert!((a.percentage - b.percentage).abs() < 1e-6);
        }
    }
}
