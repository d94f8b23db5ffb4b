//! 旋转坐标系, 使皮层上表面水平.

use crate::data::Layer;
use geo::Coord;
use ndarray::{array, Array2, ArrayView2};
use std::collections::BTreeMap;

/// 直线 `p1 -> p2` 与 x 轴正方向的有符号夹角 (弧度), 取值 `(-pi, pi]`.
#[inline]
pub fn get_angle(p1: Coord, p2: Coord) -> f64 {
    (p2.y - p1.y).atan2(p2.x - p1.x)
}

/// 将形状为 `(N, 2)` 的点集绕原点旋转 `theta` 弧度.
pub fn rotate_points(points: ArrayView2<f64>, theta: f64) -> Array2<f64> {
    let (s, c) = theta.sin_cos();
    let r = array![[c, -s], [s, c]];
    points.dot(&r.t())
}

/// 旋转后的各层细胞和上表面.
#[derive(Clone, Debug)]
pub struct RotatedLayers {
    /// 旋转角 (弧度).
    pub theta: f64,
    /// 各层旋转后的点集.
    pub points: BTreeMap<Layer, Array2<f64>>,
    /// 旋转后的上表面两端点, 形状 `(2, 2)`, 两点的 y 坐标相同.
    pub top_line: Array2<f64>,
}

/// 以 `top_left -> top_right` 为皮层上表面, 将所有点旋转 `-angle`, 使上表面水平.
///
/// 旋转后点的 y 坐标即可视为深度 (相差一个常数).
pub fn rotated_cells_from_top_line(
    top_left: Coord,
    top_right: Coord,
    layer_points: &BTreeMap<Layer, Array2<f64>>,
) -> RotatedLayers {
    let theta = -get_angle(top_left, top_right);
    let points = layer_points
        .iter()
        .map(|(&l, p)| (l, rotate_points(p.view(), theta)))
        .collect();
    let top = array![[top_left.x, top_left.y], [top_right.x, top_right.y]];
    RotatedLayers {
        theta,
        points,
        top_line: rotate_points(top.view(), theta),
    }
}
