//! 输入数据转换: 将一张图像的标注和细胞检测表导出为独立的表格.

use super::report::{write_coords, write_quadrilateral};
use super::{BatchOutcome, Source};
use crate::data::write_cells;
use crate::dataset::{image_loader, load_image, ImageData, ImageEntry};
use crate::error::ImageResult;
use std::path::{Path, PathBuf};

/// 一张图像转换后的输出文件.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ConvertedFiles {
    /// 参考四边形角点表 `<prefix>_points_annotations.tsv`.
    pub points: PathBuf,
    /// 皮层区域多边形顶点表 `<prefix>_<区域名>_annotations.tsv`.
    pub region: PathBuf,
    /// 软脑膜外侧折线表 `<prefix>_out_of_pia.tsv`. 没有该标注时只有表头.
    pub out_of_pia: PathBuf,
    /// 细胞特征表 `<prefix>_cells_features.tsv`.
    pub cells: PathBuf,
}

impl ConvertedFiles {
    fn new(dir: &Path, prefix: &str, region_name: &str) -> Self {
        let file = |what: &str| dir.join(format!("{prefix}_{what}.tsv"));
        Self {
            points: file("points_annotations"),
            region: file(&format!("{region_name}_annotations")),
            out_of_pia: file("out_of_pia"),
            cells: file("cells_features"),
        }
    }
}

/// 将已读取的一张图像写入 `dir` 下以 `prefix` 开头的四张表. 坐标单位为微米.
pub fn image_convert(
    data: &ImageData,
    region_name: &str,
    dir: &Path,
    prefix: &str,
) -> ImageResult<ConvertedFiles> {
    let files = ConvertedFiles::new(dir, prefix, region_name);
    let a = &data.annotations;
    write_quadrilateral(&files.points, &a.quadrilateral)?;
    write_coords(&files.region, a.region.vertices())?;
    write_coords(&files.out_of_pia, a.outside_pia.as_deref().unwrap_or_default())?;
    write_cells(&files.cells, &data.cells)?;
    log::info!("{prefix}: converted into {}", dir.display());
    Ok(files)
}

/// 读取并转换一张图像.
pub fn single_image_convert<P: AsRef<Path>>(
    entry: &ImageEntry,
    source: &Source,
    dir: P,
    prefix: &str,
) -> ImageResult<ConvertedFiles> {
    let data = load_image(entry, &source.region_name, source.pixel_size)?;
    image_convert(&data, &source.region_name, dir.as_ref(), prefix)
}

/// 逐张转换 `entries` 中的所有图像, 以图像名作为输出文件前缀. 失败的图像被记录并跳过.
pub fn batch_convert<P: AsRef<Path>>(
    entries: Vec<ImageEntry>,
    source: &Source,
    dir: P,
) -> BatchOutcome<ConvertedFiles> {
    let dir = dir.as_ref();
    let loader = image_loader(entries, &source.region_name, source.pixel_size);
    let total = loader.len();
    let mut ans = BatchOutcome::new(total);

    for (k, (entry, data)) in loader.enumerate() {
        log::info!("[{}/{total}] converting {}", k + 1, entry.name);
        match data.and_then(|d| image_convert(&d, &source.region_name, dir, &entry.name)) {
            Ok(files) => ans.rows.push(files),
            Err(e) => {
                log::error!("{} is not a valid image: {e}", entry.name);
                ans.failed.push((entry.name, e.to_string()));
            }
        }
    }
    ans
}
