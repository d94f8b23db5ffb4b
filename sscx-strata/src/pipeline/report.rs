//! 结果表输出.

use super::DensityRow;
use crate::boundary::BoundaryRow;
use crate::consts::column;
use crate::error::ImageResult;
use crate::geometry::Quadrilateral;
use geo::Coord;
use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::Path;

const DENSITY_HEADER: [&str; 4] = ["image", "depth_percentage", "densities", "nb_cells"];

const BOUNDARY_HEADER: [&str; 4] = [
    "image",
    "Layer",
    "Layer bottom (um). Origin is top of layer 1",
    "Layer bottom (percentage). Origin is top of layer 1",
];

fn tsv_writer<W: Write>(writer: W) -> csv::Writer<W> {
    csv::WriterBuilder::new().delimiter(b'\t').from_writer(writer)
}

/// 将深度密度结果行以制表符分隔的格式写入 `writer`.
pub fn write_density_rows_to<W: Write>(writer: W, rows: &[DensityRow]) -> ImageResult<()> {
    let mut w = tsv_writer(writer);
    w.write_record(DENSITY_HEADER)?;
    for r in rows {
        w.write_record([
            r.image.clone(),
            r.depth_percentage.to_string(),
            r.density.to_string(),
            r.nb_cells.to_string(),
        ])?;
    }
    w.flush()?;
    Ok(())
}

/// 将深度密度结果行写入文件 `path`.
pub fn write_density_rows<P: AsRef<Path>>(path: P, rows: &[DensityRow]) -> ImageResult<()> {
    let path = path.as_ref();
    write_density_rows_to(BufWriter::new(File::create(path)?), rows)?;
    log::info!("{} density rows written to {}", rows.len(), path.display());
    Ok(())
}

/// 将分层边界结果行以制表符分隔的格式写入 `writer`.
pub fn write_boundary_rows_to<W: Write>(writer: W, rows: &[BoundaryRow]) -> ImageResult<()> {
    let mut w = tsv_writer(writer);
    w.write_record(BOUNDARY_HEADER)?;
    for r in rows {
        w.write_record([
            r.image.clone(),
            r.layer.name().to_owned(),
            r.absolute_um.to_string(),
            r.percentage.to_string(),
        ])?;
    }
    w.flush()?;
    Ok(())
}

/// 将分层边界结果行写入文件 `path`.
pub fn write_boundary_rows<P: AsRef<Path>>(path: P, rows: &[BoundaryRow]) -> ImageResult<()> {
    let path = path.as_ref();
    write_boundary_rows_to(BufWriter::new(File::create(path)?), rows)?;
    log::info!("{} boundary rows written to {}", rows.len(), path.display());
    Ok(())
}

/// 参考四边形各角点在输出表中的名字, 顺序与 [`Quadrilateral::corners`] 一致.
const CORNER_NAMES: [&str; 4] = ["top_left", "top_right", "bottom_right", "bottom_left"];

/// 将坐标点以制表符分隔的格式写入 `writer`, 每行一个点.
pub fn write_coords_to<W: Write>(writer: W, coords: &[Coord]) -> ImageResult<()> {
    let mut w = tsv_writer(writer);
    w.write_record([column::CENTROID_X, column::CENTROID_Y])?;
    for c in coords {
        w.write_record([c.x.to_string(), c.y.to_string()])?;
    }
    w.flush()?;
    Ok(())
}

/// 将坐标点写入文件 `path`.
pub fn write_coords<P: AsRef<Path>>(path: P, coords: &[Coord]) -> ImageResult<()> {
    let path = path.as_ref();
    write_coords_to(BufWriter::new(File::create(path)?), coords)?;
    log::debug!("{} points written to {}", coords.len(), path.display());
    Ok(())
}

/// 将参考四边形的四个角点写入 `writer`. 第一列为角点名字.
pub fn write_quadrilateral_to<W: Write>(writer: W, q: &Quadrilateral) -> ImageResult<()> {
    let mut w = tsv_writer(writer);
    w.write_record(["point", column::CENTROID_X, column::CENTROID_Y])?;
    for (name, c) in CORNER_NAMES.iter().zip(q.corners()) {
        w.write_record([name.to_string(), c.x.to_string(), c.y.to_string()])?;
    }
    w.flush()?;
    Ok(())
}

/// 将参考四边形的四个角点写入文件 `path`.
pub fn write_quadrilateral<P: AsRef<Path>>(path: P, q: &Quadrilateral) -> ImageResult<()> {
    write_quadrilateral_to(BufWriter::new(File::create(path.as_ref())?), q)
}
