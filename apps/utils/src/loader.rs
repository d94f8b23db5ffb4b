//! 对 `sscx_strata::dataset` 的更一层封装. 提供更直接的数据集加载方式.

use sscx_strata::dataset::{self, ImageEntry};
use std::env;
use std::io;
use std::path::{Path, PathBuf};

/// 默认的细胞检测表文件名后缀.
pub const DEFAULT_CELL_SUFFIX: &str = " Detections.txt";

/// 默认的标注文件名后缀.
pub const DEFAULT_ANNOTATION_SUFFIX: &str = ".geojson";

/// 获取数据集基本路径.
///
/// 1. 若环境变量 `$SSCX_DATA_DIR` 非空, 则返回其值;
/// 2. 否则, 返回 `$HOME/dataset/sscx`;
/// 3. 无法获取用户主目录时返回当前目录.
pub fn data_dir_from_env_or_home() -> PathBuf {
    match env::var("SSCX_DATA_DIR") {
        Ok(d) if !d.is_empty() => PathBuf::from(d),
        _ => dataset::home_dataset_dir_with(["sscx"]).unwrap_or_else(|| PathBuf::from(".")),
    }
}

/// 列出 `dir` 下的所有图像. 没有任何图像时记录警告.
pub fn images_in<P: AsRef<Path>>(
    dir: P,
    cell_suffix: &str,
    annotation_suffix: &str,
) -> io::Result<Vec<ImageEntry>> {
    let dir = dir.as_ref();
    let images = dataset::list_images(dir, cell_suffix, annotation_suffix)?;
    if images.is_empty() {
        log::warn!("no input files to process in {}", dir.display());
    } else {
        let names: Vec<&str> = images.iter().map(|e| e.name.as_str()).collect();
        log::info!("input images: {names:?}");
    }
    Ok(images)
}

/// 在 `dir` 中按文件名查找一张图像的输入文件.
///
/// `cells` 为细胞检测表路径, 标注文件为同目录下 `<图像名><annotation_suffix>`.
/// 图像名为细胞检测表文件名去掉 `cell_suffix` 后的部分.
pub fn entry_for(cells: &Path, annotations: &Path, cell_suffix: &str) -> ImageEntry {
    let file_name = cells
        .file_name()
        .map(|f| f.to_string_lossy().into_owned())
        .unwrap_or_default();
    let name = file_name
        .strip_suffix(cell_suffix)
        .map(str::to_owned)
        .or_else(|| {
            cells
                .file_stem()
                .map(|s| s.to_string_lossy().into_owned())
        })
        .unwrap_or(file_name);
    ImageEntry {
        name,
        cells_path: cells.to_owned(),
        annotations_path: annotations.to_owned(),
    }
}
