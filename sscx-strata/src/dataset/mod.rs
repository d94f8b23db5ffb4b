//! 数据集操作.
//!
//! 一个数据集目录下, 每张图像对应两份 QuPath 导出文件:
//! `<图像名><细胞文件后缀>` (细胞检测表) 和 `<图像名><标注文件后缀>` (GeoJSON 标注).

use crate::data::{read_annotations, read_cells, Annotations, CellTable};
use crate::error::ImageResult;
use std::path::{Path, PathBuf};

/// 获取 `{用户主目录}/dataset` 目录.
pub fn home_dataset_dir() -> Option<PathBuf> {
    let mut ans = dirs::home_dir()?;
    ans.push("dataset");
    Some(ans)
}

/// 获取 `{用户主目录}/dataset` 目录下给定继续项组成的全路径.
pub fn home_dataset_dir_with<P: AsRef<Path>, I: IntoIterator<Item = P>>(it: I) -> Option<PathBuf> {
    let mut ans = home_dataset_dir()?;
    ans.extend(it);
    Some(ans)
}

/// 数据集中的一张图像.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ImageEntry {
    /// 图像名 (文件名去掉后缀).
    pub name: String,
    /// 细胞检测表路径.
    pub cells_path: PathBuf,
    /// 标注文件路径.
    pub annotations_path: PathBuf,
}

/// 列出 `dir` 下所有同时具有细胞检测表和标注文件的图像, 按图像名排序.
///
/// 只有细胞检测表而没有对应标注文件的图像会被记录错误日志并跳过.
pub fn list_images<P: AsRef<Path>>(
    dir: P,
    cell_suffix: &str,
    annotation_suffix: &str,
) -> std::io::Result<Vec<ImageEntry>> {
    let dir = dir.as_ref();
    let mut ans = vec![];
    for entry in std::fs::read_dir(dir)? {
        let entry = entry?;
        if !entry.file_type()?.is_file() {
            continue;
        }
        let file_name = entry.file_name();
        let Some(name) = file_name.to_str().and_then(|f| f.strip_suffix(cell_suffix)) else {
            continue;
        };
        let annotations_path = dir.join(format!("{name}{annotation_suffix}"));
        if !annotations_path.is_file() {
            log::error!(
                "{} does not exist for image {name}",
                annotations_path.display()
            );
            continue;
        }
        ans.push(ImageEntry {
            name: name.to_owned(),
            cells_path: entry.path(),
            annotations_path,
        });
    }
    ans.sort_unstable_by(|a, b| a.name.cmp(&b.name));
    Ok(ans)
}

/// 一张图像已读取的输入数据.
#[derive(Clone, Debug)]
pub struct ImageData {
    /// 细胞检测表.
    pub cells: CellTable,
    /// 标注 (单位: 微米).
    pub annotations: Annotations,
}

/// 读取一张图像的细胞检测表和标注.
pub fn load_image(entry: &ImageEntry, region_name: &str, pixel_size: f64) -> ImageResult<ImageData> {
    let cells = read_cells(&entry.cells_path)?;
    let annotations = read_annotations(&entry.annotations_path, region_name, pixel_size)?;
    Ok(ImageData { cells, annotations })
}

/// 创建逐张读取图像的加载器.
pub fn image_loader(entries: Vec<ImageEntry>, region_name: &str, pixel_size: f64) -> ImageLoader {
    let mut entries = entries;
    entries.reverse();
    ImageLoader {
        entries_rev: entries,
        region_name: region_name.to_owned(),
        pixel_size,
    }
}

/// 图像数据加载器. 读取失败的图像以 `Err` 的形式交给调用方处理.
#[derive(Debug)]
pub struct ImageLoader {
    entries_rev: Vec<ImageEntry>,
    region_name: String,
    pixel_size: f64,
}

impl Iterator for ImageLoader {
    type Item = (ImageEntry, ImageResult<ImageData>);

    fn next(&mut self) -> Option<Self::Item> {
        let entry = self.entries_rev.pop()?;
        let data = load_image(&entry, &self.region_name, self.pixel_size);
        Some((entry, data))
    }
}

impl ExactSizeIterator for ImageLoader {
    #[inline]
    fn len(&self) -> usize {
        self.entries_rev.len()
    }
}
