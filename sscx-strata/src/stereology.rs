//! 体视学排除.
//!
//! 有限厚度的切片会过多计入只有一部分位于切片内的细胞. 对每个细胞在 `[0, 厚度)` 中均匀抽取一个
//! z 偏移, 若 `z + 直径 / 2` 不小于切片厚度, 即细胞的下半部分越过了计数边界, 则将其排除.
//! 细胞在 z 方向的直径无法直接测量, 用其最近邻细胞的平均直径近似.

use crate::consts::column;
use crate::consts::stereology::{DEFAULT_SLICE_THICKNESS_UM, NEIGHBOURS};
use crate::data::CellTable;
use crate::error::{ImageError, ImageResult};
use crate::spatial::PointIndex;
use geo::Coord;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

/// 体视学排除参数.
#[derive(Copy, Clone, Debug, PartialEq)]
pub struct StereologyParams {
    /// 切片厚度 (单位: 微米).
    pub slice_thickness_um: f64,

    /// 估计直径时使用的最近邻个数.
    pub neighbours: usize,

    /// 随机数种子. `None` 时每次运行使用不同的随机数.
    pub seed: Option<u64>,
}

impl Default for StereologyParams {
    fn default() -> Self {
        Self {
            slice_thickness_um: DEFAULT_SLICE_THICKNESS_UM,
            neighbours: NEIGHBOURS,
            seed: None,
        }
    }
}

/// 每个细胞的最近邻 (不包括自身) 平均直径.
///
/// 邻居不足 `k` 个时对已有的邻居求平均; 没有任何邻居时使用细胞自身的直径.
/// 非有限的直径不参与平均.
///
/// # 注意
///
/// `points` 和 `diameters` 长度必须相同, 否则 panic.
pub fn neighbour_mean_diameters(points: &[Coord], diameters: &[f64], k: usize) -> Vec<f64> {
    assert_eq!(points.len(), diameters.len(), "one diameter per cell");
    let index = PointIndex::new(points.iter().map(|c| [c.x, c.y]));

    points
        .iter()
        .enumerate()
        .map(|(i, c)| {
            let (sum, n) = index
                .nearest_others([c.x, c.y], i, k)
                .map(|j| diameters[j])
                .filter(|d| d.is_finite())
                .fold((0.0, 0usize), |(s, n), d| (s + d, n + 1));
            if n == 0 {
                diameters[i]
            } else {
                sum / n as f64
            }
        })
        .collect()
}

/// 计算每个细胞的排除标记.
///
/// # 注意
///
/// `params.slice_thickness_um` 必须为正, `points` 和 `diameters` 长度必须相同, 否则 panic.
pub fn stereology_exclusion(points: &[Coord], diameters: &[f64], params: &StereologyParams) -> Vec<bool> {
    let thickness = params.slice_thickness_um;
    assert!(thickness > 0.0, "slice thickness must be positive");

    let mean = neighbour_mean_diameters(points, diameters, params.neighbours);
    let mut rng = match params.seed {
        Some(seed) => StdRng::seed_from_u64(seed),
        None => StdRng::from_entropy(),
    };
    mean.into_iter()
        .map(|d| rng.gen_range(0.0..thickness) + d / 2.0 >= thickness)
        .collect()
}

/// 对细胞检测表执行体视学排除, 并覆盖表中的排除标记.
///
/// # 返回值
///
/// - 切片厚度不是正数时返回 `Err(ImageError::InvalidParameter)`;
/// - 表中缺少直径列时返回 `Err(ImageError::MissingColumn)`;
/// - 其他情况返回被排除的细胞个数.
pub fn apply_stereology_exclusion(table: &mut CellTable, params: &StereologyParams) -> ImageResult<usize> {
    if !(params.slice_thickness_um > 0.0 && params.slice_thickness_um.is_finite()) {
        return Err(ImageError::InvalidParameter(format!(
            "slice thickness must be positive, got {} um",
            params.slice_thickness_um
        )));
    }
    let diameters = table
        .mean_diameters()
        .ok_or_else(|| ImageError::MissingColumn(column::MAX_DIAMETER.to_owned()))?;
    let flags = stereology_exclusion(&table.points(), &diameters, params);
    let excluded = flags.iter().filter(|&&e| e).count();
    table.set_exclude(flags);
    Ok(excluded)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::parse_cells;
    use geo::coord;

    fn lattice(n: usize) -> Vec<Coord> {
        (0..n * n)
            .map(|i| coord! { x: (i % n) as f64 * 10.0, y: (i / n) as f64 * 10.0 })
            .collect()
    }

    #[test]
    fn test_single_point() {
        let params = StereologyParams {
            seed: Some(7),
            ..Default::default()
        };
        let flags = stereology_exclusion(&[coord! { x: 1.0, y: 2.0 }], &[10.0], &params);
        assert_eq!(flags.len(), 1);
        assert_eq!(neighbour_mean_diameters(&[coord! { x: 1.0, y: 2.0 }], &[10.0], 5), vec![10.0]);
        assert!(stereology_exclusion(&[], &[], &params).is_empty());
    }

    #[test]
    fn test_neighbour_mean() {
        let points = [
            coord! { x: 0.0, y: 0.0 },
            coord! { x: 1.0, y: 0.0 },
            coord! { x: 2.0, y: 0.0 },
        ];
        let d = neighbour_mean_diameters(&points, &[100.0, 2.0, 4.0], 5);
        // 自身不参与平均, 邻居不足 5 个时对已有的求平均.
        assert_eq!(d, vec![3.0, 52.0, 51.0]);
        let d = neighbour_mean_diameters(&points, &[100.0, 2.0, 4.0], 1);
        assert_eq!(d[0], 2.0);
        assert_eq!(d[2], 2.0);
    }

    #[test]
    fn test_seeded_reproducible() {
        let points = lattice(20);
        let diameters: Vec<f64> = (0..points.len()).map(|i| 5.0 + (i % 7) as f64 * 3.0).collect();
        let params = StereologyParams {
            seed: Some(42),
            ..Default::default()
        };
        let a = stereology_exclusion(&points, &diameters, &params);
        let b = stereology_exclusion(&points, &diameters, &params);
        assert_eq!(a, b);
        let n = a.iter().filter(|&&e| e).count();
        assert!(n > 0 && n < points.len());
    }

    #[test]
    fn test_extreme_diameters() {
        let points = lattice(5);
        let params = StereologyParams {
            slice_thickness_um: 50.0,
            seed: Some(1),
            ..Default::default()
        };
        // 半径不小于厚度: 总是被排除.
        assert!(stereology_exclusion(&points, &[100.0; 25], &params).iter().all(|&e| e));
        // 直径为 0: z 总是小于厚度, 从不被排除.
        assert!(stereology_exclusion(&points, &[0.0; 25], &params).iter().all(|&e| !e));
    }

    #[test]
    fn test_apply_to_table() {
        let text = "Centroid X \u{b5}m\tCentroid Y \u{b5}m\tMax diameter \u{b5}m\tMin diameter \u{b5}m
0\t0\t200\t200
10\t0\t200\t200
0\t10\t200\t200
";
        let mut table = parse_cells(text.as_bytes()).unwrap();
        let params = StereologyParams {
            seed: Some(3),
            ..Default::default()
        };
        assert_eq!(apply_stereology_exclusion(&mut table, &params).unwrap(), 3);
        assert!(table.exclude_flags().iter().all(|&e| e));

        let mut bare = parse_cells("Centroid X \u{b5}m\tCentroid Y \u{b5}m\n1\t2\n".as_bytes()).unwrap();
        assert!(matches!(
            apply_stereology_exclusion(&mut bare, &params),
            Err(ImageError::MissingColumn(_))
        ));
        let params = StereologyParams {
            slice_thickness_um: 0.0,
            ..params
        };
        assert!(matches!(
            apply_stereology_exclusion(&mut table, &params),
            Err(ImageError::InvalidParameter(_))
        ));
    }
}
