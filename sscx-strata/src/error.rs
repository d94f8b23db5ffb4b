//! 单张图像处理的运行时错误.

use crate::geometry::GeometryError;
use thiserror::Error;

/// "不是有效图像" 错误.
///
/// 批处理中遇到该错误时, 调用方应记录日志并跳过该图像, 而不是中止整个批次.
#[derive(Error, Debug)]
pub enum ImageError {
    /// 细胞检测表缺少必需的列.
    #[error("missing required column `{0}`")]
    MissingColumn(String),

    /// 表格中存在无法解析的值. `line` 从 1 开始计数 (包括表头).
    #[error("invalid value `{value}` in column `{column}` at line {line}")]
    InvalidValue {
        /// 行号.
        line: usize,
        /// 列名.
        column: String,
        /// 原始文本.
        value: String,
    },

    /// 标注文件中缺少指定名字的标注.
    #[error("missing annotation `{0}`")]
    MissingAnnotation(String),

    /// 标注文件结构不符合预期.
    #[error("malformed annotation document: {0}")]
    MalformedAnnotation(String),

    /// 未知的皮层名字.
    #[error("unknown layer name `{0}`")]
    UnknownLayer(String),

    /// 部分细胞落在所有深度层之外 (网格与标注不匹配).
    #[error("{outside} cells lie outside the grid for a total of {total} cells")]
    CellsOutsideGrid {
        /// 落在网格外的细胞个数.
        outside: usize,
        /// 细胞总数.
        total: usize,
    },

    /// 非法参数.
    #[error("invalid parameter: {0}")]
    InvalidParameter(String),

    /// 没有可用于计算的细胞.
    #[error("no cells left to process")]
    NoCells,

    /// 可视化结果无法输出.
    #[error("cannot plot {0}")]
    Plot(String),

    /// 几何退化.
    #[error(transparent)]
    Geometry(#[from] GeometryError),

    /// 底层 I/O 错误.
    #[error(transparent)]
    Io(#[from] std::io::Error),

    /// JSON 解析错误.
    #[error(transparent)]
    Json(#[from] serde_json::Error),

    /// 表格读写错误.
    #[error(transparent)]
    Csv(#[from] csv::Error),
}

/// 单张图像处理结果.
pub type ImageResult<T> = Result<T, ImageError>;
