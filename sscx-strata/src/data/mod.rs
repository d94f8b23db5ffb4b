//! 单张图像的输入数据: 细胞检测表, GeoJSON 标注和皮层分层标签.

mod annotation;
mod cells;
mod layer;

pub use annotation::{
    parse_annotations, read_annotations, read_pixel_size, Annotations, CORNERS, OUTSIDE_PIA,
};
pub use cells::{parse_cells, read_cells, write_cells, write_cells_to, CellTable};
pub use layer::{parse_layers, Layer};
