//! 批处理配置文件.
//!
//! 配置文件为 YAML 格式, 例如:
//!
//! ```yaml
//! input_directory: /data/sscx/images
//! cell_position_suffix: " Detections.txt"
//! annotations_geojson_suffix: ".geojson"
//! output_directory: /data/sscx/results
//! output_file_prefix: sscx
//! pixel_size: 0.3460130331522824
//! thickness_cut: 50
//! grid_nb_row: 20
//! grid_nb_col: 10
//! region_name: S1HL
//! layers_name: [Layer 1, Layer 2, Layer 3, Layer 4, Layer 5, Layer 6 a, Layer 6 b]
//! ```
//!
//! 省略 `input_directory` 时使用 [`data_dir_from_env_or_home`] 给出的目录,
//! 省略两个后缀时使用 QuPath 默认导出的文件名后缀.

use crate::loader::{self, data_dir_from_env_or_home, DEFAULT_ANNOTATION_SUFFIX, DEFAULT_CELL_SUFFIX};
use serde::Deserialize;
use sscx_strata::data::parse_layers;
use sscx_strata::dataset::ImageEntry;
use sscx_strata::pipeline::{BoundaryParams, DensityParams, Source};
use sscx_strata::prelude::{ImageError, Layer, StereologyParams};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use thiserror::Error;

/// 读取配置文件时的错误.
#[derive(Error, Debug)]
pub enum ConfigError {
    /// 无法读取文件.
    #[error("cannot read config {}: {}", .0.display(), .1)]
    Io(PathBuf, #[source] std::io::Error),
    /// YAML 格式错误.
    #[error("malformed config: {0}")]
    Yaml(#[from] serde_yaml::Error),
    /// 数值超出合理范围.
    #[error("config key `{0}` is out of range")]
    OutOfRange(&'static str),
    /// 皮层名字无法识别.
    #[error("invalid layer list: {0}")]
    Layer(#[source] ImageError),
}

fn default_cell_suffix() -> String {
    DEFAULT_CELL_SUFFIX.to_owned()
}

fn default_annotation_suffix() -> String {
    DEFAULT_ANNOTATION_SUFFIX.to_owned()
}

/// 批处理配置.
#[derive(Clone, Debug, Deserialize, PartialEq)]
pub struct BatchConfig {
    /// 输入目录.
    #[serde(default)]
    pub input_directory: Option<PathBuf>,
    /// 细胞检测表文件名后缀.
    #[serde(default = "default_cell_suffix")]
    pub cell_position_suffix: String,
    /// 标注文件名后缀.
    #[serde(default = "default_annotation_suffix")]
    pub annotations_geojson_suffix: String,
    /// 输出目录.
    pub output_directory: PathBuf,
    /// 输出文件名前缀.
    pub output_file_prefix: String,
    /// 像素尺寸 (单位: 微米每像素).
    pub pixel_size: f64,
    /// 切片厚度 (单位: 微米).
    pub thickness_cut: f64,
    /// 网格行数.
    pub grid_nb_row: usize,
    /// 网格列数.
    pub grid_nb_col: usize,
    /// 皮层区域多边形的标注名.
    pub region_name: String,
    /// 参与计算的皮层名字.
    pub layers_name: Vec<String>,
    /// 每层固定的 DBSCAN 邻域半径, 键为皮层名字.
    #[serde(default)]
    pub layer_dbscan_eps: Option<BTreeMap<String, f64>>,
    /// 估计 DBSCAN 邻域半径时的倍率.
    #[serde(default)]
    pub dbscan_eps_factor: Option<f64>,
    /// 体视学排除的随机数种子.
    #[serde(default)]
    pub stereology_seed: Option<u64>,
}

impl BatchConfig {
    /// 从 YAML 文本解析并检查配置.
    pub fn parse(text: &str) -> Result<Self, ConfigError> {
        let config: Self = serde_yaml::from_str(text)?;
        config.validate()?;
        Ok(config)
    }

    /// 读取配置文件.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let text =
            std::fs::read_to_string(path).map_err(|e| ConfigError::Io(path.to_owned(), e))?;
        let config = Self::parse(&text)?;
        log::info!("config loaded from {}", path.display());
        Ok(config)
    }

    fn validate(&self) -> Result<(), ConfigError> {
        let positive = |v: f64| v > 0.0 && v.is_finite();
        if !positive(self.pixel_size) {
            return Err(ConfigError::OutOfRange("pixel_size"));
        }
        if !positive(self.thickness_cut) {
            return Err(ConfigError::OutOfRange("thickness_cut"));
        }
        if self.grid_nb_row == 0 {
            return Err(ConfigError::OutOfRange("grid_nb_row"));
        }
        if self.grid_nb_col == 0 {
            return Err(ConfigError::OutOfRange("grid_nb_col"));
        }
        if self.dbscan_eps_factor.is_some_and(|f| !positive(f)) {
            return Err(ConfigError::OutOfRange("dbscan_eps_factor"));
        }
        if let Some(eps) = &self.layer_dbscan_eps {
            if eps.values().any(|&e| !positive(e)) {
                return Err(ConfigError::OutOfRange("layer_dbscan_eps"));
            }
        }
        self.layers().map(|_| ())
    }

    /// 输入目录. 配置中没有给出时为 `$SSCX_DATA_DIR` 或者 `$HOME/dataset/sscx`.
    pub fn input_dir(&self) -> PathBuf {
        self.input_directory
            .clone()
            .unwrap_or_else(data_dir_from_env_or_home)
    }

    /// 列出输入目录下的所有图像.
    pub fn images(&self) -> std::io::Result<Vec<ImageEntry>> {
        loader::images_in(
            self.input_dir(),
            &self.cell_position_suffix,
            &self.annotations_geojson_suffix,
        )
    }

    /// 参与计算的皮层, 按规范顺序排列.
    pub fn layers(&self) -> Result<Vec<Layer>, ConfigError> {
        parse_layers(&self.layers_name).map_err(ConfigError::Layer)
    }

    /// 输入数据的解释方式.
    pub fn source(&self) -> Source {
        Source {
            region_name: self.region_name.clone(),
            pixel_size: self.pixel_size,
        }
    }

    /// 深度密度参数.
    pub fn density_params(&self) -> DensityParams {
        DensityParams {
            thickness_cut_um: self.thickness_cut,
            n_rows: self.grid_nb_row,
            n_cols: self.grid_nb_col,
        }
    }

    /// 分层边界参数.
    pub fn boundary_params(&self) -> Result<BoundaryParams, ConfigError> {
        let mut params = BoundaryParams::new(self.layers()?);
        if let Some(f) = self.dbscan_eps_factor {
            params.eps_factor = f;
        }
        if let Some(eps) = &self.layer_dbscan_eps {
            let mut by_layer = BTreeMap::new();
            for (name, &e) in eps {
                let layer = name.parse::<Layer>().map_err(ConfigError::Layer)?;
                by_layer.insert(layer, e);
            }
            params.layer_eps = Some(by_layer);
        }
        Ok(params)
    }

    /// 体视学排除参数, 切片厚度取 `thickness_cut`.
    pub fn stereology_params(&self) -> StereologyParams {
        StereologyParams {
            slice_thickness_um: self.thickness_cut,
            seed: self.stereology_seed,
            ..Default::default()
        }
    }

    /// 深度密度结果表的路径.
    pub fn density_output(&self) -> PathBuf {
        self.output_directory
            .join(format!("{}_densities.tsv", self.output_file_prefix))
    }

    /// 分层边界结果表的路径.
    pub fn boundary_output(&self) -> PathBuf {
        self.output_directory
            .join(format!("{}_boundaries.tsv", self.output_file_prefix))
    }
}
