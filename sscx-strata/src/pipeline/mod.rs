//! 单张图像与批处理流水线.
//!
//! 每张图像从读取到输出完整处理完毕后才处理下一张. 批处理中任何一张图像失败,
//! 都只记录日志并跳过该图像, 不会中止整个批次.

mod boundary;
mod convert;
mod density;
mod exclude;
mod report;

pub use boundary::{batch_boundary, image_boundary, single_image_boundary};
pub use convert::{batch_convert, image_convert, single_image_convert, ConvertedFiles};
pub use density::{batch_density, image_density, single_image_density, DensityRow};
pub use exclude::{batch_exclude, exclude};
pub use report::{
    write_boundary_rows, write_boundary_rows_to, write_coords, write_coords_to, write_density_rows,
    write_density_rows_to, write_quadrilateral, write_quadrilateral_to,
};

use crate::consts::boundary::DEFAULT_EPS_FACTOR;
use crate::consts::UM_PER_MM;
use crate::data::Layer;
use std::collections::BTreeMap;

/// 输入数据的解释方式.
#[derive(Clone, Debug, PartialEq)]
pub struct Source {
    /// 标注文件中皮层区域多边形的名字, 例如 "S1HL".
    pub region_name: String,
    /// 像素尺寸 (单位: 微米每像素).
    pub pixel_size: f64,
}

/// 深度密度参数.
#[derive(Copy, Clone, Debug, PartialEq)]
pub struct DensityParams {
    /// 切片厚度 (单位: 微米).
    pub thickness_cut_um: f64,
    /// 网格行数, 即请求的深度层数.
    pub n_rows: usize,
    /// 网格列数.
    pub n_cols: usize,
}

impl DensityParams {
    /// 切片厚度 (单位: 毫米).
    #[inline]
    pub fn thickness_mm(&self) -> f64 {
        self.thickness_cut_um / UM_PER_MM
    }
}

/// 分层边界参数.
#[derive(Clone, Debug, PartialEq)]
pub struct BoundaryParams {
    /// 参与计算的皮层.
    pub layers: Vec<Layer>,
    /// 每层固定的 DBSCAN 邻域半径. `None` 时由细胞检测表估计.
    pub layer_eps: Option<BTreeMap<Layer, f64>>,
    /// 估计邻域半径时使用的倍率.
    pub eps_factor: f64,
}

impl BoundaryParams {
    /// 使用估计的邻域半径和默认倍率.
    pub fn new(layers: Vec<Layer>) -> Self {
        Self {
            layers,
            layer_eps: None,
            eps_factor: DEFAULT_EPS_FACTOR,
        }
    }
}

/// 批处理结果.
#[derive(Clone, Debug, PartialEq)]
pub struct BatchOutcome<T> {
    /// 所有成功处理的图像的结果行, 按图像名顺序拼接.
    pub rows: Vec<T>,
    /// 处理失败的图像名及原因.
    pub failed: Vec<(String, String)>,
    /// 处理成功但未通过有效性检查的图像名.
    pub invalid: Vec<String>,
    /// 尝试处理的图像总数.
    pub nb_images: usize,
}

impl<T> BatchOutcome<T> {
    fn new(nb_images: usize) -> Self {
        Self {
            rows: vec![],
            failed: vec![],
            invalid: vec![],
            nb_images,
        }
    }
}

#[cfg(test)]
pub(crate) mod fixtures {
    //! 在临时目录中生成三层皮层的合成图像.
    //!
    //! 区域为 `[0, 100] x [0, 300]` 的矩形 (像素尺寸为 1). 每层是间距 10 微米的
    //! `10 x 10` 细胞点阵, 第 `k` 层的 y 坐标为 `5 + 100k, 15 + 100k, ..., 95 + 100k`.

    use std::path::{Path, PathBuf};
    use std::sync::atomic::{AtomicUsize, Ordering};

    pub const CELL_SUFFIX: &str = "_cells.txt";
    pub const ANNOTATION_SUFFIX: &str = "_annotations.geojson";

    const ANNOTATIONS: &str = r#"{
  "type": "FeatureCollection",
  "features": [
    {
      "type": "Feature",
      "geometry": {"type": "Polygon", "coordinates": [[[0, 0], [100, 0], [100, 300], [0, 300], [0, 0]]]},
      "properties": {"classification": {"name": "S1HL"}}
    },
    {"type": "Feature", "geometry": {"type": "Point", "coordinates": [0, 0]}, "properties": {"name": "top_left"}},
    {"type": "Feature", "geometry": {"type": "Point", "coordinates": [100, 0]}, "properties": {"name": "top_right"}},
    {"type": "Feature", "geometry": {"type": "Point", "coordinates": [100, 300]}, "properties": {"name": "bottom_right"}},
    {"type": "Feature", "geometry": {"type": "Point", "coordinates": [0, 300]}, "properties": {"name": "bottom_left"}}
  ]
}"#;

    /// 打开日志输出. 重复调用无害.
    pub fn init_log() {
        let _ = simple_logger::SimpleLogger::new()
            .with_level(log::LevelFilter::Debug)
            .init();
    }

    static NEXT_DIR: AtomicUsize = AtomicUsize::new(0);

    /// 创建一个测试专用的空目录. 目录名包含进程号和序号, 并行测试互不干扰.
    pub fn temp_dir(name: &str) -> PathBuf {
        let k = NEXT_DIR.fetch_add(1, Ordering::Relaxed);
        let dir = std::env::temp_dir().join(format!("sscx-strata-{name}-{}-{k}", std::process::id()));
        let _ = std::fs::remove_dir_all(&dir);
        std::fs::create_dir_all(&dir).unwrap();
        dir
    }

    /// 细胞检测表. `labels[k]` 为第 `k` 层点阵的分类名.
    pub fn cells_tsv(labels: [&str; 3]) -> String {
        let mut s = String::from("Class\tCentroid X \u{b5}m\tCentroid Y \u{b5}m\tMax diameter \u{b5}m\tMin diameter \u{b5}m\n");
        for (k, label) in labels.iter().enumerate() {
            for j in 0..10 {
                for i in 0..10 {
                    let x = 5 + 10 * i;
                    let y = 5 + 10 * j + 100 * k;
                    s.push_str(&format!("{label}\t{x}\t{y}\t12\t8\n"));
                }
            }
        }
        s
    }

    /// 在 `dir` 中写入一张图像.
    pub fn write_image(dir: &Path, name: &str, labels: [&str; 3]) {
        std::fs::write(dir.join(format!("{name}{CELL_SUFFIX}")), cells_tsv(labels)).unwrap();
        std::fs::write(dir.join(format!("{name}{ANNOTATION_SUFFIX}")), ANNOTATIONS).unwrap();
    }

    /// 写入一张标注中缺少皮层区域的图像.
    pub fn write_broken_image(dir: &Path, name: &str) {
        std::fs::write(
            dir.join(format!("{name}{CELL_SUFFIX}")),
            cells_tsv(["Layer 1", "Layer 2", "Layer 3"]),
        )
        .unwrap();
        std::fs::write(
            dir.join(format!("{name}{ANNOTATION_SUFFIX}")),
            ANNOTATIONS.replace("S1HL", "S2"),
        )
        .unwrap();
    }
}
