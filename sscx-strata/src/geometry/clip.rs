//! 线段与区域多边形求交.

use super::polygon::RegionPolygon;
use super::lerp;
use geo::line_intersection::{line_intersection, LineIntersection};
use geo::{Coord, Line};
use ordered_float::NotNan;

/// 两个参数之差小于该值时被视为同一个交点.
const PARAM_EPS: f64 = 1e-12;

/// 计算线段 `a -> b` 落在 `region` 内部的所有子线段.
///
/// 结果按照到 `a` 的距离从近到远排列, 每个子线段的方向与 `a -> b` 相同.
/// 相邻且首尾相接的子线段 (例如穿过多边形的凹顶点) 会被合并.
pub(crate) fn clip_segment(region: &RegionPolygon, a: Coord, b: Coord) -> Vec<(Coord, Coord)> {
    let d = b - a;
    let len2 = d.x * d.x + d.y * d.y;
    if !(len2 > 0.0) {
        return vec![];
    }

    // 交点在 `a -> b` 上的参数 t, 其中 a 为 0, b 为 1.
    let param = |c: Coord| (((c.x - a.x) * d.x + (c.y - a.y) * d.y) / len2).clamp(0.0, 1.0);

    let seg = Line::new(a, b);
    let mut ts = vec![0.0, 1.0];
    for edge in region.edges() {
        match line_intersection(seg, edge) {
            Some(LineIntersection::SinglePoint { intersection, .. }) => ts.push(param(intersection)),
            Some(LineIntersection::Collinear { intersection }) => {
                ts.push(param(intersection.start));
                ts.push(param(intersection.end));
            }
            None => {}
        }
    }

    let mut ts: Vec<NotNan<f64>> = ts.into_iter().filter_map(|t| NotNan::new(t).ok()).collect();
    ts.sort_unstable();
    ts.dedup_by(|x, y| (x.into_inner() - y.into_inner()).abs() < PARAM_EPS);

    let mut pieces: Vec<(f64, f64)> = vec![];
    for w in ts.windows(2) {
        let (t0, t1) = (w[0].into_inner(), w[1].into_inner());
        if !region.contains(lerp(a, b, (t0 + t1) / 2.0)) {
            continue;
        }
        match pieces.last_mut() {
            Some(last) if (last.1 - t0).abs() < PARAM_EPS => last.1 = t1,
            _ => pieces.push((t0, t1)),
        }
    }

    pieces
        .into_iter()
        .map(|(t0, t1)| (lerp(a, b, t0), lerp(a, b, t1)))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use geo::coord;

    fn f64_eq(a: f64, b: f64) -> bool {
        (a - b).abs() < 1e-9
    }

    #[test]
    fn test_clip_convex() {
        let square = RegionPolygon::from_xy([(0.0, 0.0), (100.0, 0.0), (100.0, 100.0), (0.0, 100.0)])
            .unwrap();
        let pieces = clip_segment(
            &square,
            coord! { x: 50.0, y: -30.0 },
            coord! { x: 50.0, y: 130.0 },
        );
        assert_eq!(pieces.len(), 1);
        let (s, e) = pieces[0];
        assert!(f64_eq(s.x, 50.0) && f64_eq(s.y, 0.0));
        assert!(f64_eq(e.x, 50.0) && f64_eq(e.y, 100.0));

        // 完全在外部.
        let pieces = clip_segment(
            &square,
            coord! { x: 150.0, y: -30.0 },
            coord! { x: 150.0, y: 130.0 },
        );
        assert!(pieces.is_empty());

        // 起点在内部.
        let pieces = clip_segment(
            &square,
            coord! { x: 50.0, y: 50.0 },
            coord! { x: 50.0, y: 130.0 },
        );
        assert_eq!(pieces.len(), 1);
        assert!(f64_eq(pieces[0].0.y, 50.0) && f64_eq(pieces[0].1.y, 100.0));
    }

    #[test]
    fn test_clip_concave() {
        // "U" 形区域: 两条竖臂之间有缺口.
        let u = RegionPolygon::from_xy([
            (0.0, 0.0),
            (30.0, 0.0),
            (30.0, 60.0),
            (70.0, 60.0),
            (70.0, 0.0),
            (100.0, 0.0),
            (100.0, 100.0),
            (0.0, 100.0),
        ])
        .unwrap();

        // 横穿两条竖臂, 得到两段, 按离起点的距离排列.
        let pieces = clip_segment(&u, coord! { x: -10.0, y: 30.0 }, coord! { x: 110.0, y: 30.0 });
        assert_eq!(pieces.len(), 2);
        assert!(f64_eq(pieces[0].0.x, 0.0) && f64_eq(pieces[0].1.x, 30.0));
        assert!(f64_eq(pieces[1].0.x, 70.0) && f64_eq(pieces[1].1.x, 100.0));

        // 竖直穿过缺口下方, 只剩一段.
        let pieces = clip_segment(&u, coord! { x: 50.0, y: -10.0 }, coord! { x: 50.0, y: 110.0 });
        assert_eq!(pieces.len(), 1);
        assert!(f64_eq(pieces[0].0.y, 60.0) && f64_eq(pieces[0].1.y, 100.0));
    }
}
