//! 程序运行函数.

use crate::result::BatchSummary;
use crate::ImageArgs;
use anyhow::{bail, Context};
use sscx_strata::data::{parse_layers, read_pixel_size, Layer};
use sscx_strata::pipeline::{self, BoundaryParams, DensityParams, Source};
use sscx_strata::prelude::{NullSink, RasterSink, StereologyParams, VisualSink};
use std::io;
use std::path::Path;
use utils::config::BatchConfig;
use utils::loader;

/// 可视化接收者: 给出目录时输出 PNG, 否则丢弃.
fn sink_for(dir: Option<&Path>) -> anyhow::Result<Box<dyn VisualSink>> {
    match dir {
        Some(d) => {
            std::fs::create_dir_all(d)
                .with_context(|| format!("cannot create {}", d.display()))?;
            Ok(Box::new(RasterSink::new(d)))
        }
        None => Ok(Box::new(NullSink)),
    }
}

fn source_of(image: &ImageArgs) -> anyhow::Result<Source> {
    let pixel_size = match (&image.pixel_size_file, image.pixel_size) {
        (Some(f), _) => read_pixel_size(f)?,
        (None, Some(p)) if p > 0.0 && p.is_finite() => p,
        (None, Some(p)) => bail!("pixel size must be positive, got {p}"),
        (None, None) => bail!("no pixel size given"),
    };
    Ok(Source {
        region_name: image.region.clone(),
        pixel_size,
    })
}

/// 单张图像的深度密度.
pub fn density(image: &ImageArgs, thickness: f64, rows: usize, cols: usize) -> anyhow::Result<()> {
    let source = source_of(image)?;
    let entry = loader::entry_for(&image.cells, &image.annotations, loader::DEFAULT_CELL_SUFFIX);
    let params = DensityParams {
        thickness_cut_um: thickness,
        n_rows: rows,
        n_cols: cols,
    };
    let mut sink = sink_for(image.plot_dir.as_deref())?;

    let result = pipeline::single_image_density(&entry, &source, &params, sink.as_mut())
        .with_context(|| format!("{} is not a valid image", entry.name))?;
    match &image.output {
        Some(p) => pipeline::write_density_rows(p, &result)?,
        None => pipeline::write_density_rows_to(io::stdout().lock(), &result)?,
    }
    Ok(())
}

/// 单张图像的分层边界.
pub fn boundary(image: &ImageArgs, layers: &[String], eps_factor: f64) -> anyhow::Result<()> {
    let source = source_of(image)?;
    let entry = loader::entry_for(&image.cells, &image.annotations, loader::DEFAULT_CELL_SUFFIX);
    let layers = if layers.is_empty() {
        Layer::ALL.to_vec()
    } else {
        parse_layers(layers)?
    };
    let mut params = BoundaryParams::new(layers);
    params.eps_factor = eps_factor;
    let mut sink = sink_for(image.plot_dir.as_deref())?;

    let result = pipeline::single_image_boundary(&entry, &source, &params, sink.as_mut())
        .with_context(|| format!("{} is not a valid image", entry.name))?;
    if !result.iter().map(|r| r.layer).eq(params.layers.iter().copied()) {
        log::warn!("{}: some layers are missing, see the log above", entry.name);
    }
    match &image.output {
        Some(p) => pipeline::write_boundary_rows(p, &result)?,
        None => pipeline::write_boundary_rows_to(io::stdout().lock(), &result)?,
    }
    Ok(())
}

/// 读取配置文件并准备输出目录.
fn prepare_batch(config: &Path) -> anyhow::Result<BatchConfig> {
    let config = BatchConfig::load(config)?;
    std::fs::create_dir_all(&config.output_directory).with_context(|| {
        format!("cannot create {}", config.output_directory.display())
    })?;
    Ok(config)
}

/// 批量计算深度密度.
pub fn density_batch(config: &Path, plot: bool) -> anyhow::Result<()> {
    let config = prepare_batch(config)?;
    let entries = config.images()?;
    if entries.is_empty() {
        return Ok(());
    }
    let mut sink = sink_for(plot.then_some(config.output_directory.as_path()))?;

    let outcome = pipeline::batch_density(
        entries,
        &config.source(),
        &config.density_params(),
        sink.as_mut(),
    );
    if !outcome.rows.is_empty() {
        pipeline::write_density_rows(config.density_output(), &outcome.rows)?;
    }
    BatchSummary::new("density", &outcome).analyze();
    Ok(())
}

/// 批量计算分层边界.
pub fn boundary_batch(config: &Path, plot: bool) -> anyhow::Result<()> {
    let config = prepare_batch(config)?;
    let params = config.boundary_params()?;
    let entries = config.images()?;
    if entries.is_empty() {
        return Ok(());
    }
    let mut sink = sink_for(plot.then_some(config.output_directory.as_path()))?;

    let outcome = pipeline::batch_boundary(entries, &config.source(), &params, sink.as_mut());
    if !outcome.rows.is_empty() {
        pipeline::write_boundary_rows(config.boundary_output(), &outcome.rows)?;
    }
    BatchSummary::new("boundary", &outcome).analyze();
    Ok(())
}

/// 体视学排除.
pub fn exclude(input: &Path, output: &Path, thickness: f64, seed: Option<u64>) -> anyhow::Result<()> {
    let params = StereologyParams {
        slice_thickness_um: thickness,
        seed,
        ..Default::default()
    };
    let n = pipeline::exclude(input, output, &params)
        .with_context(|| format!("cannot process {}", input.display()))?;
    println!("{n} cells excluded, written to {}", output.display());
    Ok(())
}

/// 按配置文件批量执行体视学排除, 结果写入输出目录.
pub fn exclude_batch(config: &Path) -> anyhow::Result<()> {
    let config = prepare_batch(config)?;
    let entries = config.images()?;
    if entries.is_empty() {
        return Ok(());
    }
    let outcome = pipeline::batch_exclude(
        &entries,
        &config.output_directory,
        &config.stereology_params(),
    );
    for (image, n) in &outcome.rows {
        log::info!("{image}: {n} cells excluded");
    }
    BatchSummary::new("exclude", &outcome).analyze();
    Ok(())
}

/// 将单张图像的标注和细胞检测表导出为表格.
pub fn convert(image: &ImageArgs, prefix: Option<&str>) -> anyhow::Result<()> {
    let source = source_of(image)?;
    let entry = loader::entry_for(&image.cells, &image.annotations, loader::DEFAULT_CELL_SUFFIX);
    let dir = match &image.output {
        Some(d) => d.clone(),
        None => std::env::current_dir()?,
    };
    std::fs::create_dir_all(&dir).with_context(|| format!("cannot create {}", dir.display()))?;

    let prefix = prefix.unwrap_or(&entry.name);
    let files = pipeline::single_image_convert(&entry, &source, &dir, prefix)
        .with_context(|| format!("{} is not a valid image", entry.name))?;
    for f in [&files.points, &files.region, &files.out_of_pia, &files.cells] {
        println!("{}", f.display());
    }
    Ok(())
}

/// 按配置文件批量导出表格.
pub fn convert_batch(config: &Path) -> anyhow::Result<()> {
    let config = prepare_batch(config)?;
    let entries = config.images()?;
    if entries.is_empty() {
        return Ok(());
    }
    let outcome = pipeline::batch_convert(entries, &config.source(), &config.output_directory);
    BatchSummary::new("convert", &outcome).analyze();
    Ok(())
}
