//! 结果可视化.
//!
//! 计算函数只返回普通的数据结构, 从不直接绘图. 需要可视化的调用方实现 [`VisualSink`],
//! 由流水线在每张图像计算完成后同步调用. 可视化不会影响任何计算结果,
//! 但输出失败时 ([`ImageError::Plot`](crate::ImageError::Plot)) 该图像被视为处理失败.

#[cfg(feature = "plot")]
mod raster;

#[cfg(feature = "plot")]
pub use raster::RasterSink;

use crate::boundary::{BoundaryResult, RotatedLayers};
use crate::density::{DensityRecord, DepthProfile};
use crate::error::ImageResult;
use crate::geometry::RegionPolygon;
use geo::Coord;

/// 可视化结果的接收者. 所有方法默认什么也不做.
pub trait VisualSink {
    /// 展示深度网格, 深度层以及细胞位置.
    fn render_strata(
        &mut self,
        _image: &str,
        _region: &RegionPolygon,
        _profile: &DepthProfile,
        _cells: &[Coord],
        _excluded: &[Coord],
    ) -> ImageResult<()> {
        Ok(())
    }

    /// 展示密度随深度百分比变化的曲线.
    fn render_density_curve(&mut self, _image: &str, _records: &[DensityRecord]) -> ImageResult<()> {
        Ok(())
    }

    /// 展示旋转后的各层细胞以及各层的底部边界.
    fn render_boundaries(
        &mut self,
        _image: &str,
        _rotated: &RotatedLayers,
        _result: &BoundaryResult,
    ) -> ImageResult<()> {
        Ok(())
    }
}

/// 丢弃一切的接收者.
#[derive(Copy, Clone, Debug, Default)]
pub struct NullSink;

impl VisualSink for NullSink {}
