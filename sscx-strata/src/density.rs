//! 以皮层深度百分比为自变量的细胞密度计算.

use crate::consts::UM2_PER_MM2;
use crate::error::{ImageError, ImageResult};
use crate::geometry::{
    count_nb_cell_per_polygon, create_depth_polygons, create_grid, DepthGrid, Quadrilateral,
    RegionPolygon, Stratum,
};
use geo::Coord;
use itertools::izip;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// 一个深度层的密度结果.
#[derive(Copy, Clone, Debug, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct DensityRecord {
    /// 深度百分比, 取值 `i / N`, 其中 `i` 为层的索引, `N` 为实际层数.
    ///
    /// 它只是索引的比例, 与物理距离不成正比.
    pub depth_percentage: f64,

    /// 细胞密度 (单位: 个每立方毫米).
    pub density: f64,

    /// 该层内的细胞个数.
    pub nb_cells: usize,
}

/// 根据每层的细胞个数计算密度.
///
/// 第 `i` 层的体积为 `面积 (平方毫米) * z_thickness_mm`, 密度为细胞个数除以体积.
/// 深度百分比的分母是 `strata.len()`, 即实际产生的层数, 而不是请求的网格行数.
///
/// # 注意
///
/// `counts` 与 `strata` 长度必须相同, `z_thickness_mm` 必须为正, 否则 panic.
pub fn compute_cell_density(
    counts: &[usize],
    strata: &[Stratum],
    z_thickness_mm: f64,
) -> Vec<DensityRecord> {
    assert_eq!(counts.len(), strata.len(), "one count per stratum");
    assert!(z_thickness_mm > 0.0, "slice thickness must be positive");

    let n = strata.len() as f64;
    izip!(0.., counts, strata)
        .map(|(i, &nb_cells, stratum)| DensityRecord {
            depth_percentage: i as f64 / n,
            density: nb_cells as f64 / ((stratum.area() / UM2_PER_MM2) * z_thickness_mm),
            nb_cells,
        })
        .collect()
}

/// 单张图像的完整深度密度结果, 保留了中间的几何对象以便可视化.
#[derive(Clone, Debug)]
pub struct DepthProfile {
    /// 深度网格.
    pub grid: DepthGrid,
    /// 从上到下的深度层.
    pub strata: Vec<Stratum>,
    /// 每层的密度.
    pub records: Vec<DensityRecord>,
}

impl DepthProfile {
    /// `(深度百分比, 密度)` 序列.
    pub fn pairs(&self) -> impl Iterator<Item = (f64, f64)> + '_ {
        self.records.iter().map(|r| (r.depth_percentage, r.density))
    }

    /// 计入统计的细胞总数.
    pub fn total_cells(&self) -> usize {
        self.records.iter().map(|r| r.nb_cells).sum()
    }
}

/// 计算一张图像的深度密度曲线.
///
/// 依次构建深度网格, 切分深度层, 统计每层细胞数, 计算密度.
///
/// # 返回值
///
/// - `thickness_mm` 不是正数时返回 `Err(ImageError::InvalidParameter)`;
/// - 网格构建失败时返回 `Err(ImageError::Geometry)`;
/// - 存在落在所有深度层之外的细胞时返回 `Err(ImageError::CellsOutsideGrid)`,
///   此时整张图像都不应参与统计;
/// - 其他情况返回 `Ok(DepthProfile)`.
pub fn compute_depth_density(
    points: &[Coord],
    region: &RegionPolygon,
    quadrilateral: &Quadrilateral,
    thickness_mm: f64,
    n_rows: usize,
    n_cols: usize,
) -> ImageResult<DepthProfile> {
    if !(thickness_mm > 0.0 && thickness_mm.is_finite()) {
        return Err(ImageError::InvalidParameter(format!(
            "slice thickness must be positive, got {thickness_mm} mm"
        )));
    }
    let grid = create_grid(quadrilateral, region, n_rows, n_cols)?;
    let strata = create_depth_polygons(region, grid.horizontal_lines());
    if strata.len() < n_rows {
        log::warn!(
            "{} of {n_rows} depth strata produced, percentages use the actual count",
            strata.len()
        );
    }

    log::info!("computing cell densities as a function of depth percentage");
    let counts = count_nb_cell_per_polygon(points, &strata);
    let used: usize = counts.iter().sum();
    if used != points.len() {
        return Err(ImageError::CellsOutsideGrid {
            outside: points.len() - used,
            total: points.len(),
        });
    }

    let records = compute_cell_density(&counts, &strata, thickness_mm);
    Ok(DepthProfile {
        grid,
        strata,
        records,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use geo::coord;

    fn f64_eq(a: f64, b: f64) -> bool {
        (a - b).abs() < 1e-9
    }

    fn square() -> (RegionPolygon, Quadrilateral) {
        let r = RegionPolygon::from_xy([(0.0, 0.0), (100.0, 0.0), (100.0, 100.0), (0.0, 100.0), (0.0, 0.0)])
            .unwrap();
        let q = Quadrilateral::new(
            coord! { x: 0.0, y: 0.0 },
            coord! { x: 100.0, y: 0.0 },
            coord! { x: 100.0, y: 100.0 },
            coord! { x: 0.0, y: 100.0 },
        )
        .unwrap();
        (r, q)
    }

    fn halves_points() -> Vec<Coord> {
        (0..5)
            .flat_map(|i| {
                let x = 10.0 + 20.0 * i as f64;
                [coord! { x: x, y: 30.0 }, coord! { x: x, y: 70.0 }]
            })
            .collect()
    }

    #[test]
    fn test_square_two_strata() {
        let (r, q) = square();
        let profile = compute_depth_density(&halves_points(), &r, &q, 0.05, 2, 3).unwrap();
        assert_eq!(profile.strata.len(), 2);
        assert!((profile.strata[0].area() - 5000.0).abs() < 1e-6);
        assert!((profile.strata[1].area() - 5000.0).abs() < 1e-6);

        let counts: Vec<usize> = profile.records.iter().map(|r| r.nb_cells).collect();
        assert_eq!(counts, vec![5, 5]);
        assert_eq!(profile.total_cells(), 10);

        // 5 / (0.005 mm^2 * 0.05 mm) = 20000.
        let pairs: Vec<(f64, f64)> = profile.pairs().collect();
        assert!(f64_eq(pairs[0].0, 0.0) && f64_eq(pairs[1].0, 0.5));
        assert!((pairs[0].1 - pairs[1].1).abs() < 1e-6);
        assert!((pairs[0].1 - 20000.0).abs() < 1e-3);
    }

    #[test]
    fn test_percentages_and_non_negative() {
        let (r, q) = square();
        let points: Vec<Coord> = (0..97)
            .map(|i| {
                let t = i as f64;
                coord! { x: 1.0 + (t * 7.3) % 98.0, y: 1.0 + (t * 3.1) % 98.0 }
            })
            .collect();
        let profile = compute_depth_density(&points, &r, &q, 0.05, 10, 4).unwrap();
        let n = profile.records.len();
        assert_eq!(n, 10);
        for (i, rec) in profile.records.iter().enumerate() {
            assert!(f64_eq(rec.depth_percentage, i as f64 / n as f64));
            assert!(rec.density >= 0.0);
        }
        assert!(profile
            .records
            .windows(2)
            .all(|w| w[0].depth_percentage < w[1].depth_percentage));
    }

    #[test]
    fn test_cells_outside_grid() {
        let (r, q) = square();
        let mut points = halves_points();
        points.push(coord! { x: 500.0, y: 50.0 });
        match compute_depth_density(&points, &r, &q, 0.05, 2, 2) {
            Err(ImageError::CellsOutsideGrid { outside, total }) => {
                assert_eq!((outside, total), (1, 11));
            }
            other => panic!("unexpected result {other:?}"),
        }
    }

    #[test]
    fn test_invalid_input() {
        let (r, q) = square();
        assert!(matches!(
            compute_depth_density(&halves_points(), &r, &q, 0.0, 2, 2),
            Err(ImageError::InvalidParameter(_))
        ));
        assert!(matches!(
            compute_depth_density(&halves_points(), &r, &q, 0.05, 0, 2),
            Err(ImageError::Geometry(_))
        ));
    }

    #[test]
    fn test_denominator_is_actual_count() {
        let (r, _) = square();
        let strata = vec![Stratum::from(&r), Stratum::from(&r), Stratum::from(&r)];
        let records = compute_cell_density(&[0, 3, 6], &strata, 0.1);
        assert!(f64_eq(records[1].depth_percentage, 1.0 / 3.0));
        assert!(f64_eq(records[0].density, 0.0));
        // 6 / (0.01 mm^2 * 0.1 mm) = 6000.
        assert!((records[2].density - 6000.0).abs() < 1e-6);
    }
}
