//! 深度密度流水线.

use super::{BatchOutcome, DensityParams, Source};
use crate::dataset::{image_loader, load_image, ImageData, ImageEntry};
use crate::density::compute_depth_density;
use crate::error::{ImageError, ImageResult};
use crate::visual::VisualSink;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// 深度密度结果表中的一行.
#[derive(Clone, Debug, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct DensityRow {
    /// 图像名.
    pub image: String,
    /// 深度百分比.
    pub depth_percentage: f64,
    /// 细胞密度 (单位: 个每立方毫米).
    pub density: f64,
    /// 该深度层内的细胞个数.
    pub nb_cells: usize,
}

/// 计算已读取的一张图像的深度密度. 被标记为体视学排除的细胞不参与计算.
///
/// # 返回值
///
/// 没有任何参与计算的细胞时返回 `Err(ImageError::NoCells)`, 其余错误见
/// [`compute_depth_density`](crate::density::compute_depth_density).
pub fn image_density(
    name: &str,
    data: &ImageData,
    params: &DensityParams,
    sink: &mut dyn VisualSink,
) -> ImageResult<Vec<DensityRow>> {
    let points = data.cells.included_points();
    if points.is_empty() {
        return Err(ImageError::NoCells);
    }
    log::info!(
        "{name}: {} cells, {} excluded by stereology",
        points.len(),
        data.cells.len() - points.len()
    );

    let a = &data.annotations;
    let profile = compute_depth_density(
        &points,
        &a.region,
        &a.quadrilateral,
        params.thickness_mm(),
        params.n_rows,
        params.n_cols,
    )?;

    sink.render_strata(name, &a.region, &profile, &points, &data.cells.excluded_points())?;
    sink.render_density_curve(name, &profile.records)?;

    Ok(profile
        .records
        .iter()
        .map(|r| DensityRow {
            image: name.to_owned(),
            depth_percentage: r.depth_percentage,
            density: r.density,
            nb_cells: r.nb_cells,
        })
        .collect())
}

/// 读取并计算一张图像的深度密度.
pub fn single_image_density(
    entry: &ImageEntry,
    source: &Source,
    params: &DensityParams,
    sink: &mut dyn VisualSink,
) -> ImageResult<Vec<DensityRow>> {
    let data = load_image(entry, &source.region_name, source.pixel_size)?;
    image_density(&entry.name, &data, params, sink)
}

/// 逐张计算 `entries` 中所有图像的深度密度. 失败的图像被记录并跳过.
pub fn batch_density(
    entries: Vec<ImageEntry>,
    source: &Source,
    params: &DensityParams,
    sink: &mut dyn VisualSink,
) -> BatchOutcome<DensityRow> {
    let loader = image_loader(entries, &source.region_name, source.pixel_size);
    let total = loader.len();
    let mut ans = BatchOutcome::new(total);

    for (k, (entry, data)) in loader.enumerate() {
        log::info!("[{}/{total}] processing {}", k + 1, entry.name);
        match data.and_then(|d| image_density(&entry.name, &d, params, sink)) {
            Ok(rows) => ans.rows.extend(rows),
            Err(e) => {
                log::error!("{} is not a valid image: {e}", entry.name);
                ans.failed.push((entry.name, e.to_string()));
            }
        }
    }
    ans
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::write_cells;
    use crate::dataset::list_images;
    use crate::pipeline::fixtures::*;
    use crate::visual::NullSink;

    const LAYERS: [&str; 3] = ["Layer 1", "Layer 2", "Layer 3"];

    fn source() -> Source {
        Source {
            region_name: "S1HL".to_owned(),
            pixel_size: 1.0,
        }
    }

    fn params() -> DensityParams {
        DensityParams {
            thickness_cut_um: 50.0,
            n_rows: 3,
            n_cols: 2,
        }
    }

    /// 记录每次调用的接收者.
    #[derive(Default)]
    struct Recorder {
        strata: Vec<(String, usize, usize)>,
        curves: usize,
        fail_on: Option<String>,
    }

    impl VisualSink for Recorder {
        fn render_strata(
            &mut self,
            image: &str,
            _region: &crate::geometry::RegionPolygon,
            profile: &crate::density::DepthProfile,
            cells: &[geo::Coord],
            _excluded: &[geo::Coord],
        ) -> ImageResult<()> {
            self.strata
                .push((image.to_owned(), profile.strata.len(), cells.len()));
            Ok(())
        }

        fn render_density_curve(
            &mut self,
            image: &str,
            _records: &[crate::density::DensityRecord],
        ) -> ImageResult<()> {
            self.curves += 1;
            if self.fail_on.as_deref() == Some(image) {
                return Err(ImageError::Plot(format!("{image}_densities.png")));
            }
            Ok(())
        }
    }

    #[test]
    fn test_single_image_density() {
        let dir = temp_dir("single-density");
        write_image(&dir, "img", LAYERS);
        let entries = list_images(&dir, CELL_SUFFIX, ANNOTATION_SUFFIX).unwrap();
        assert_eq!(entries.len(), 1);

        let mut sink = Recorder::default();
        let rows = single_image_density(&entries[0], &source(), &params(), &mut sink).unwrap();
        assert_eq!(rows.len(), 3);
        assert!(rows.iter().all(|r| r.image == "img" && r.nb_cells == 100));
        // 100 / (0.01 mm^2 * 0.05 mm) = 200000.
        for r in &rows {
            assert!((r.density - 200000.0).abs() < 1.0);
        }
        assert!((rows[1].depth_percentage - 1.0 / 3.0).abs() < 1e-12);
        assert_eq!(sink.strata, vec![("img".to_owned(), 3, 300)]);
        assert_eq!(sink.curves, 1);
    }

    #[test]
    fn test_excluded_cells_are_dropped() {
        let dir = temp_dir("excluded-density");
        write_image(&dir, "img", LAYERS);
        let entries = list_images(&dir, CELL_SUFFIX, ANNOTATION_SUFFIX).unwrap();
        let source = source();
        let mut data = load_image(&entries[0], &source.region_name, source.pixel_size).unwrap();

        // 排除第一层的全部细胞.
        let flags: Vec<bool> = (0..data.cells.len()).map(|i| i < 100).collect();
        data.cells.set_exclude(flags);
        write_cells(&entries[0].cells_path, &data.cells).unwrap();

        let rows = single_image_density(&entries[0], &source, &params(), &mut NullSink).unwrap();
        let counts: Vec<usize> = rows.iter().map(|r| r.nb_cells).collect();
        assert_eq!(counts, vec![0, 100, 100]);
        assert_eq!(rows[0].density, 0.0);
    }

    #[test]
    fn test_failed_plot_fails_the_image() {
        init_log();
        let dir = temp_dir("plot-failure-density");
        write_image(&dir, "a", LAYERS);
        write_image(&dir, "b", LAYERS);
        let entries = list_images(&dir, CELL_SUFFIX, ANNOTATION_SUFFIX).unwrap();

        let mut sink = Recorder {
            fail_on: Some("a".to_owned()),
            ..Default::default()
        };
        let e = single_image_density(&entries[0], &source(), &params(), &mut sink).unwrap_err();
        assert!(matches!(e, ImageError::Plot(_)));

        let out = batch_density(entries, &source(), &params(), &mut sink);
        assert_eq!(out.rows.len(), 3);
        assert!(out.rows.iter().all(|r| r.image == "b"));
        assert_eq!(out.failed.len(), 1);
        assert!(out.failed[0].1.contains("a_densities.png"));
    }

    #[test]
    fn test_batch_density_skips_failures() {
        init_log();
        let dir = temp_dir("batch-density");
        write_image(&dir, "a", LAYERS);
        write_broken_image(&dir, "b");
        write_image(&dir, "c", LAYERS);
        let entries = list_images(&dir, CELL_SUFFIX, ANNOTATION_SUFFIX).unwrap();

        let out = batch_density(entries, &source(), &params(), &mut NullSink);
        assert_eq!(out.nb_images, 3);
        assert_eq!(out.rows.len(), 6);
        assert_eq!(out.rows[0].image, "a");
        assert_eq!(out.rows[5].image, "c");
        assert_eq!(out.failed.len(), 1);
        assert_eq!(out.failed[0].0, "b");
        assert!(out.invalid.is_empty());
    }
}
