//! 体视学排除流水线.

use super::BatchOutcome;
use crate::data::{read_cells, write_cells};
use crate::dataset::ImageEntry;
use crate::error::ImageResult;
use crate::stereology::{apply_stereology_exclusion, StereologyParams};
use std::path::{Path, PathBuf};

/// 对细胞检测表 `input` 执行体视学排除, 并将带有 `exclude_for_density` 列的表写入 `output`.
///
/// # 返回值
///
/// 被排除的细胞个数.
pub fn exclude<P: AsRef<Path>, Q: AsRef<Path>>(
    input: P,
    output: Q,
    params: &StereologyParams,
) -> ImageResult<usize> {
    let (input, output) = (input.as_ref(), output.as_ref());
    let mut table = read_cells(input)?;
    let excluded = apply_stereology_exclusion(&mut table, params)?;
    log::info!(
        "{}: {excluded} of {} cells excluded for density",
        input.display(),
        table.len()
    );
    write_cells(output, &table)?;
    Ok(excluded)
}

/// 逐张对 `entries` 中的细胞检测表执行体视学排除, 结果写入 `dir` 下的同名文件.
///
/// 结果行为 `(图像名, 被排除的细胞个数)`. 失败的图像被记录并跳过.
///
/// # 注意
///
/// `dir` 与输入目录相同时, 原始的细胞检测表会被覆盖.
pub fn batch_exclude<P: AsRef<Path>>(
    entries: &[ImageEntry],
    dir: P,
    params: &StereologyParams,
) -> BatchOutcome<(String, usize)> {
    let dir = dir.as_ref();
    let total = entries.len();
    let mut ans = BatchOutcome::new(total);

    for (k, entry) in entries.iter().enumerate() {
        log::info!("[{}/{total}] excluding cells of {}", k + 1, entry.name);
        let output: PathBuf = match entry.cells_path.file_name() {
            Some(f) => dir.join(f),
            None => dir.join(&entry.name),
        };
        match exclude(&entry.cells_path, &output, params) {
            Ok(n) => ans.rows.push((entry.name.clone(), n)),
            Err(e) => {
                log::error!("{} is not a valid image: {e}", entry.name);
                ans.failed.push((entry.name.clone(), e.to_string()));
            }
        }
    }
    ans
}
