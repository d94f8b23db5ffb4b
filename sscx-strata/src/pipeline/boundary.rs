//! 皮层分层边界流水线.

use super::{BatchOutcome, BoundaryParams, Source};
use crate::boundary::{
    boundary_rows, compute_dbscan_eps, get_main_cluster, get_valid_image, locate_layers_boundaries,
    rotated_cells_from_top_line, BoundaryRow,
};
use crate::dataset::{image_loader, load_image, ImageData, ImageEntry};
use crate::error::{ImageError, ImageResult};
use crate::visual::VisualSink;

/// 定位已读取的一张图像的分层边界.
///
/// 依次按层分组细胞, 对每层聚类去噪, 旋转坐标系使上表面水平, 估计每层底部.
///
/// # 返回值
///
/// - 表中没有 `Class` 列时返回 `Err(ImageError::MissingColumn)`;
/// - 聚类后所有层都没有细胞时返回 `Err(ImageError::NoCells)`;
/// - 其他情况返回按规范顺序排列的结果行. 聚类后为空的层不出现.
pub fn image_boundary(
    name: &str,
    data: &ImageData,
    params: &BoundaryParams,
    sink: &mut dyn VisualSink,
) -> ImageResult<Vec<BoundaryRow>> {
    let by_layer = data.cells.points_by_layer(&params.layers)?;
    let eps = match &params.layer_eps {
        Some(eps) => eps.clone(),
        None => compute_dbscan_eps(&data.cells, &params.layers, params.eps_factor)?,
    };
    let clustered = get_main_cluster(&by_layer, &eps);

    let q = &data.annotations.quadrilateral;
    let rotated = rotated_cells_from_top_line(q.top_left, q.top_right, &clustered);
    let result =
        locate_layers_boundaries(&rotated.points, &params.layers).ok_or(ImageError::NoCells)?;
    for l in &params.layers {
        if !result.boundaries.contains_key(l) {
            log::warn!("{name}: no cells left in {l} after clustering");
        }
    }

    sink.render_boundaries(name, &rotated, &result)?;
    Ok(boundary_rows(name, &result))
}

/// 读取并定位一张图像的分层边界.
pub fn single_image_boundary(
    entry: &ImageEntry,
    source: &Source,
    params: &BoundaryParams,
    sink: &mut dyn VisualSink,
) -> ImageResult<Vec<BoundaryRow>> {
    let data = load_image(entry, &source.region_name, source.pixel_size)?;
    image_boundary(&entry.name, &data, params, sink)
}

/// 逐张定位 `entries` 中所有图像的分层边界, 只保留边界正确排列的图像.
///
/// 失败的图像被记录在 `failed` 中, 未通过
/// [`get_valid_image`](crate::boundary::get_valid_image) 检查的图像被记录在 `invalid` 中.
pub fn batch_boundary(
    entries: Vec<ImageEntry>,
    source: &Source,
    params: &BoundaryParams,
    sink: &mut dyn VisualSink,
) -> BatchOutcome<BoundaryRow> {
    let loader = image_loader(entries, &source.region_name, source.pixel_size);
    let total = loader.len();
    let mut ans = BatchOutcome::new(total);
    let mut rows = vec![];

    for (k, (entry, data)) in loader.enumerate() {
        log::info!("[{}/{total}] processing {}", k + 1, entry.name);
        match data.and_then(|d| image_boundary(&entry.name, &d, params, sink)) {
            Ok(r) => rows.extend(r),
            Err(e) => {
                log::error!("{} is not a valid image: {e}", entry.name);
                ans.failed.push((entry.name, e.to_string()));
            }
        }
    }

    let (valid, invalid) = get_valid_image(&rows, &params.layers);
    ans.rows = valid;
    ans.invalid.extend(invalid);
    ans
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::Layer;
    use crate::dataset::list_images;
    use crate::pipeline::fixtures::*;
    use crate::visual::NullSink;
    use std::collections::BTreeMap;

    const LAYERS: [&str; 3] = ["Layer 1", "Layer 2", "Layer 3"];

    fn f64_eq(a: f64, b: f64) -> bool {
        (a - b).abs() < 1e-9
    }

    fn source() -> Source {
        Source {
            region_name: "S1HL".to_owned(),
            pixel_size: 1.0,
        }
    }

    fn params() -> BoundaryParams {
        BoundaryParams::new(vec![Layer::L1, Layer::L2, Layer::L3])
    }

    #[test]
    fn test_single_image_boundary() {
        let dir = temp_dir("single-boundary");
        write_image(&dir, "img", LAYERS);
        let entries = list_images(&dir, CELL_SUFFIX, ANNOTATION_SUFFIX).unwrap();

        let rows = single_image_boundary(&entries[0], &source(), &params(), &mut NullSink).unwrap();
        let layers: Vec<Layer> = rows.iter().map(|r| r.layer).collect();
        assert_eq!(layers, vec![Layer::L1, Layer::L2, Layer::L3]);

        // 原点为第一层最浅的 y = 5, 每层底部为该层最深一行 y = 95 + 100k.
        for (k, r) in rows.iter().enumerate() {
            assert!(f64_eq(r.absolute_um, 90.0 + 100.0 * k as f64));
        }
        assert!(f64_eq(rows[2].percentage, 1.0));
        assert!(f64_eq(rows[0].percentage, 90.0 / 290.0));
    }

    #[test]
    fn test_fixed_eps() {
        let dir = temp_dir("fixed-eps-boundary");
        write_image(&dir, "img", LAYERS);
        let entries = list_images(&dir, CELL_SUFFIX, ANNOTATION_SUFFIX).unwrap();

        // 第三层的半径过小, 所有点都是噪声, 该层缺失.
        let mut p = params();
        p.layer_eps = Some(BTreeMap::from([
            (Layer::L1, 25.0),
            (Layer::L2, 25.0),
            (Layer::L3, 1.0),
        ]));
        let rows = single_image_boundary(&entries[0], &source(), &p, &mut NullSink).unwrap();
        assert_eq!(rows.len(), 2);
        assert!(rows.iter().all(|r| r.layer != Layer::L3));
    }

    #[test]
    fn test_missing_class_column() {
        let dir = temp_dir("no-class-boundary");
        write_image(&dir, "img", LAYERS);
        let entries = list_images(&dir, CELL_SUFFIX, ANNOTATION_SUFFIX).unwrap();
        let tsv = cells_tsv(LAYERS).replacen("Class", "Name", 1);
        std::fs::write(&entries[0].cells_path, tsv).unwrap();

        assert!(matches!(
            single_image_boundary(&entries[0], &source(), &params(), &mut NullSink),
            Err(ImageError::MissingColumn(_))
        ));
    }

    #[test]
    fn test_batch_boundary() {
        init_log();
        let dir = temp_dir("batch-boundary");
        write_image(&dir, "a", LAYERS);
        // 第一层和第二层的标签对调, 边界倒置.
        write_image(&dir, "b", ["Layer 2", "Layer 1", "Layer 3"]);
        write_broken_image(&dir, "c");
        write_image(&dir, "d", LAYERS);
        let entries = list_images(&dir, CELL_SUFFIX, ANNOTATION_SUFFIX).unwrap();

        let out = batch_boundary(entries, &source(), &params(), &mut NullSink);
        assert_eq!(out.nb_images, 4);
        assert_eq!(out.invalid, vec!["b".to_owned()]);
        assert_eq!(out.failed.len(), 1);
        assert_eq!(out.failed[0].0, "c");
        assert_eq!(out.rows.len(), 6);
        assert!(out.rows.iter().all(|r| r.image == "a" || r.image == "d"));
    }
}
