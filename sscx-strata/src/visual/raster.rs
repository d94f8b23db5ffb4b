//! 将可视化结果保存为 PNG 图片.
//!
//! # 注意
//!
//! 1. 需要 `plot` feature.
//! 2. 图像坐标的 y 轴朝下, 绘图前取负, 使图片与显微图像方向一致.
//! 3. 不启用字体后端, 图中只有图形而没有文字.

use super::VisualSink;
use crate::boundary::{BoundaryResult, RotatedLayers};
use crate::density::{DensityRecord, DepthProfile};
use crate::error::{ImageError, ImageResult};
use crate::geometry::{bounds_of, compute_cells_depth, RegionPolygon};
use geo::Coord;
use plotters::coord::types::RangedCoordf64;
use plotters::prelude::*;
use std::ops::Range;
use std::path::{Path, PathBuf};

type DrawResult = Result<(), Box<dyn std::error::Error>>;
type Chart<'a, 'b> = ChartContext<'a, BitMapBackend<'b>, Cartesian2d<RangedCoordf64, RangedCoordf64>>;

const GRAY: RGBColor = RGBColor(160, 160, 160);

const PALETTE: [RGBColor; 7] = [
    RGBColor(31, 119, 180),
    RGBColor(255, 127, 14),
    RGBColor(44, 160, 44),
    RGBColor(148, 103, 189),
    RGBColor(140, 86, 75),
    RGBColor(227, 119, 194),
    RGBColor(188, 189, 34),
];

/// 图片短边的最小像素数.
const MIN_SIDE: u32 = 200;

#[inline]
fn flip(c: Coord) -> (f64, f64) {
    (c.x, -c.y)
}

fn flipped(coords: &[Coord]) -> Vec<(f64, f64)> {
    coords.iter().copied().map(flip).collect()
}

/// 包围盒 `[lo, hi]` 翻转 y 轴并向外扩展 2% 后的坐标范围.
fn ranges(lo: Coord, hi: Coord) -> (Range<f64>, Range<f64>) {
    let pad = |a: f64, b: f64| ((b - a) * 0.02).max(1e-6);
    let (px, py) = (pad(lo.x, hi.x), pad(lo.y, hi.y));
    (lo.x - px..hi.x + px, -hi.y - py..-lo.y + py)
}

/// 在已填充白色背景的区域上建立坐标系并画出坐标轴.
fn build_chart<'a, 'b>(
    root: &'a DrawingArea<BitMapBackend<'b>, plotters::coord::Shift>,
    x: Range<f64>,
    y: Range<f64>,
) -> Result<Chart<'a, 'b>, Box<dyn std::error::Error>> {
    let mut chart = ChartBuilder::on(root)
        .margin(10)
        .x_label_area_size(10)
        .y_label_area_size(10)
        .build_cartesian_2d(x, y)?;
    chart
        .configure_mesh()
        .disable_mesh()
        .x_labels(0)
        .y_labels(0)
        .axis_style(BLACK)
        .draw()?;
    Ok(chart)
}

/// 将每张图像的可视化结果保存到目录 `dir` 下的 PNG 文件.
///
/// 文件名为 `<图像名>_strata.png`, `<图像名>_densities.png` 和 `<图像名>_boundaries.png`.
#[derive(Clone, Debug)]
pub struct RasterSink {
    dir: PathBuf,
    size: u32,
}

impl RasterSink {
    /// 初始化. 图片长边默认为 1200 像素.
    pub fn new<P: AsRef<Path>>(dir: P) -> Self {
        Self {
            dir: dir.as_ref().to_owned(),
            size: 1200,
        }
    }

    /// 修改图片长边的像素数.
    ///
    /// # 注意
    ///
    /// `size` 必须不小于 200, 否则 panic.
    pub fn with_size(mut self, size: u32) -> Self {
        assert!(size >= MIN_SIDE, "image too small");
        self.size = size;
        self
    }

    fn path(&self, image: &str, what: &str) -> PathBuf {
        self.dir.join(format!("{image}_{what}.png"))
    }

    /// 长边为 `size`, 宽高比与包围盒一致的图片尺寸.
    fn dims(&self, lo: Coord, hi: Coord) -> (u32, u32) {
        let (dx, dy) = ((hi.x - lo.x).max(1e-9), (hi.y - lo.y).max(1e-9));
        let long = f64::from(self.size);
        if dx >= dy {
            (self.size, ((long * dy / dx) as u32).max(MIN_SIDE))
        } else {
            (((long * dx / dy) as u32).max(MIN_SIDE), self.size)
        }
    }

    /// 执行绘图并把错误转为 [`ImageError::Plot`].
    fn save<F: FnOnce(&Path) -> DrawResult>(&self, image: &str, what: &str, draw: F) -> ImageResult<()> {
        let path = self.path(image, what);
        draw(&path).map_err(|e| ImageError::Plot(format!("{}: {e}", path.display())))?;
        log::info!("saved {}", path.display());
        Ok(())
    }
}

fn draw_strata(
    path: &Path,
    dims: (u32, u32),
    region: &RegionPolygon,
    profile: &DepthProfile,
    cells: &[Coord],
    excluded: &[Coord],
) -> DrawResult {
    let root = BitMapBackend::new(path, dims).into_drawing_area();
    root.fill(&WHITE)?;
    let (lo, hi) = region.bounds();
    let (x, y) = ranges(lo, hi);
    let mut chart = build_chart(&root, x, y)?;

    for (k, stratum) in profile.strata.iter().enumerate() {
        let color = PALETTE[k % PALETTE.len()];
        for poly in stratum.shape() {
            let ring = flipped(&poly.exterior().0);
            chart.draw_series(std::iter::once(Polygon::new(ring.clone(), color.mix(0.2).filled())))?;
            chart.draw_series(LineSeries::new(ring, color))?;
        }
    }
    for l in profile.grid.vertical_lines() {
        chart.draw_series(LineSeries::new([flip(l.start), flip(l.end)], GRAY))?;
    }
    chart.draw_series(LineSeries::new(flipped(region.vertices()), BLACK))?;

    let depths = compute_cells_depth(cells, &profile.strata);
    chart.draw_series(cells.iter().zip(depths).map(|(c, depth)| {
        let color = depth.map_or(BLACK, |k| PALETTE[k % PALETTE.len()]);
        Circle::new(flip(*c), 2, color.filled())
    }))?;
    chart.draw_series(excluded.iter().map(|c| Cross::new(flip(*c), 3, RED)))?;

    root.present()?;
    Ok(())
}

fn draw_density_curve(path: &Path, dims: (u32, u32), records: &[DensityRecord], max: f64) -> DrawResult {
    let root = BitMapBackend::new(path, dims).into_drawing_area();
    root.fill(&WHITE)?;
    // 横轴为深度百分比, 纵轴为密度.
    let mut chart = build_chart(&root, 0.0..1.0, 0.0..max * 1.1)?;

    let curve: Vec<(f64, f64)> = records.iter().map(|r| (r.depth_percentage, r.density)).collect();
    chart.draw_series(LineSeries::new(curve.clone(), &PALETTE[0]))?;
    chart.draw_series(curve.into_iter().map(|p| Circle::new(p, 3, PALETTE[0].filled())))?;

    root.present()?;
    Ok(())
}

fn draw_boundaries(
    path: &Path,
    dims: (u32, u32),
    (lo, hi): (Coord, Coord),
    rotated: &RotatedLayers,
    result: &BoundaryResult,
) -> DrawResult {
    let root = BitMapBackend::new(path, dims).into_drawing_area();
    root.fill(&WHITE)?;
    let (x, y) = ranges(lo, hi);
    let mut chart = build_chart(&root, x, y)?;

    for (k, m) in rotated.points.values().enumerate() {
        let color = PALETTE[k % PALETTE.len()];
        chart.draw_series(
            m.outer_iter()
                .map(|r| Circle::new((r[0], -r[1]), 2, color.filled())),
        )?;
    }
    let t = &rotated.top_line;
    chart.draw_series(LineSeries::new(
        [(t[[0, 0]], -t[[0, 1]]), (t[[1, 0]], -t[[1, 1]])],
        BLACK.stroke_width(2),
    ))?;

    let horizontal = |y: f64| [(lo.x, -y), (hi.x, -y)];
    chart.draw_series(LineSeries::new(horizontal(result.y_origin), GRAY))?;
    for b in result.boundaries.values() {
        chart.draw_series(LineSeries::new(horizontal(b.bottom_y), RED.stroke_width(2)))?;
    }

    root.present()?;
    Ok(())
}

impl VisualSink for RasterSink {
    fn render_strata(
        &mut self,
        image: &str,
        region: &RegionPolygon,
        profile: &DepthProfile,
        cells: &[Coord],
        excluded: &[Coord],
    ) -> ImageResult<()> {
        let (lo, hi) = region.bounds();
        let dims = self.dims(lo, hi);
        self.save(image, "strata", |path| {
            draw_strata(path, dims, region, profile, cells, excluded)
        })
    }

    fn render_density_curve(&mut self, image: &str, records: &[DensityRecord]) -> ImageResult<()> {
        let max = records.iter().map(|r| r.density).fold(0.0, f64::max);
        if records.is_empty() || !(max > 0.0) {
            log::warn!("{image}: nothing to plot in the density curve");
            return Ok(());
        }
        let dims = (self.size, (self.size * 2 / 3).max(MIN_SIDE));
        self.save(image, "densities", |path| draw_density_curve(path, dims, records, max))
    }

    fn render_boundaries(
        &mut self,
        image: &str,
        rotated: &RotatedLayers,
        result: &BoundaryResult,
    ) -> ImageResult<()> {
        let all = rotated
            .points
            .values()
            .flat_map(|m| m.outer_iter().map(|r| Coord { x: r[0], y: r[1] }).collect::<Vec<_>>());
        let (lo, hi) = bounds_of(all);
        if !(lo.x <= hi.x) {
            log::warn!("{image}: no cells to plot");
            return Ok(());
        }
        let dims = self.dims(lo, hi);
        self.save(image, "boundaries", |path| {
            draw_boundaries(path, dims, (lo, hi), rotated, result)
        })
    }
}
