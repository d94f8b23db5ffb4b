//! 🍇欢迎光临🍓
//!
//! 涵盖了本 crate 一系列常用的功能.

pub use crate::{ImageError, ImageResult};

pub use crate::data::{read_annotations, read_cells, read_pixel_size, write_cells, CellTable, Layer};
pub use crate::geometry::{GeometryError, Quadrilateral, RegionPolygon, Stratum};

pub use crate::density::{compute_depth_density, DensityRecord, DepthProfile};
pub use crate::stereology::StereologyParams;

pub use crate::boundary::{get_valid_image, locate_layer_boundaries, BoundaryResult, BoundaryRow};

pub use crate::dataset::home_dataset_dir_with;
pub use crate::dataset::{self, list_images, ImageEntry};

pub use crate::pipeline::{BatchOutcome, BoundaryParams, DensityParams, DensityRow, Source};

pub use crate::visual::{NullSink, VisualSink};

#[cfg(feature = "plot")]
pub use crate::visual::RasterSink;
