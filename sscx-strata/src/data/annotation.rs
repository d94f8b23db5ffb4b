//! QuPath 导出的 GeoJSON 标注.
//!
//! 每张图像的标注文件中包含:
//!
//! 1. 皮层区域多边形 (名字由调用方指定, 例如 "S1HL");
//! 2. 手工放置的四个角点 `TOP_LEFT`, `TOP_RIGHT`, `BOTTOM_RIGHT`, `BOTTOM_LEFT`;
//! 3. 可选的软脑膜外侧折线 `Outside Pia`.
//!
//! 标注坐标的单位是像素, 读取时统一乘以像素尺寸换算为微米.

use crate::error::{ImageError, ImageResult};
use crate::geometry::{Quadrilateral, RegionPolygon};
use geo::Coord;
use serde_json::Value;
use std::collections::HashMap;
use std::path::Path;

/// 软脑膜外侧折线的标注名.
pub const OUTSIDE_PIA: &str = "Outside Pia";

/// 四个角点的标注名, 按 `top_left, top_right, bottom_right, bottom_left` 顺序.
pub const CORNERS: [&str; 4] = ["TOP_LEFT", "TOP_RIGHT", "BOTTOM_RIGHT", "BOTTOM_LEFT"];

/// 一张图像的标注 (单位: 微米).
#[derive(Clone, Debug)]
pub struct Annotations {
    /// 皮层区域多边形.
    pub region: RegionPolygon,
    /// 参考四边形.
    pub quadrilateral: Quadrilateral,
    /// 软脑膜外侧折线.
    pub outside_pia: Option<Vec<Coord>>,
}

/// 标注的名字: 优先取 `properties.name`, 否则取 `properties.classification.name`.
fn feature_name(feature: &Value) -> Option<&str> {
    let props = feature.get("properties")?;
    props
        .get("name")
        .and_then(Value::as_str)
        .or_else(|| props.get("classification")?.get("name")?.as_str())
}

fn coord_of(v: &Value, scale: f64) -> Option<Coord> {
    match v.as_array()?.as_slice() {
        [x, y, ..] => Some(Coord {
            x: x.as_f64()? * scale,
            y: y.as_f64()? * scale,
        }),
        _ => None,
    }
}

fn coords_of(v: &Value, scale: f64) -> Option<Vec<Coord>> {
    v.as_array()?.iter().map(|c| coord_of(c, scale)).collect()
}

fn malformed(name: &str, what: &str) -> ImageError {
    ImageError::MalformedAnnotation(format!("`{name}`: {what}"))
}

/// 按小写名字索引全部带名字的标注. 同名标注只保留第一个.
fn index_features(doc: &Value) -> ImageResult<HashMap<String, &Value>> {
    let features = match doc {
        Value::Array(a) => a,
        Value::Object(o) => o
            .get("features")
            .and_then(Value::as_array)
            .ok_or_else(|| ImageError::MalformedAnnotation("no `features` array".to_owned()))?,
        _ => {
            return Err(ImageError::MalformedAnnotation(
                "expected a feature collection".to_owned(),
            ))
        }
    };

    let mut ans = HashMap::new();
    for f in features {
        if let Some(name) = feature_name(f) {
            ans.entry(name.to_lowercase()).or_insert(f);
        }
    }
    Ok(ans)
}

fn geometry<'a>(features: &HashMap<String, &'a Value>, name: &str) -> ImageResult<(&'a str, &'a Value)> {
    let f: &'a Value = features
        .get(&name.to_lowercase())
        .copied()
        .ok_or_else(|| ImageError::MissingAnnotation(name.to_owned()))?;
    let g = f.get("geometry").ok_or_else(|| malformed(name, "no geometry"))?;
    let kind = g.get("type").and_then(Value::as_str).unwrap_or_default();
    let coordinates = g.get("coordinates").ok_or_else(|| malformed(name, "no coordinates"))?;
    Ok((kind, coordinates))
}

fn region_of(features: &HashMap<String, &Value>, name: &str, scale: f64) -> ImageResult<RegionPolygon> {
    let (kind, coordinates) = geometry(features, name)?;
    let ring = match kind {
        "Polygon" => coordinates.get(0),
        "MultiPolygon" => {
            log::warn!("region `{name}` is a multi-polygon, only its first polygon is used");
            coordinates.get(0).and_then(|p| p.get(0))
        }
        _ => return Err(malformed(name, "not a polygon")),
    };
    let ring = ring
        .and_then(|r| coords_of(r, scale))
        .ok_or_else(|| malformed(name, "bad polygon ring"))?;
    Ok(RegionPolygon::new(ring)?)
}

fn point_of(features: &HashMap<String, &Value>, name: &str, scale: f64) -> ImageResult<Coord> {
    let (kind, coordinates) = geometry(features, name)?;
    let point = match kind {
        "Point" => coord_of(coordinates, scale),
        // 偶尔会被标成只含一个点的 MultiPoint.
        "MultiPoint" => coordinates.get(0).and_then(|c| coord_of(c, scale)),
        _ => None,
    };
    point.ok_or_else(|| malformed(name, "not a point"))
}

fn line_of(features: &HashMap<String, &Value>, name: &str, scale: f64) -> ImageResult<Vec<Coord>> {
    let (kind, coordinates) = geometry(features, name)?;
    let line = match kind {
        "LineString" => coords_of(coordinates, scale),
        "Polygon" => coordinates.get(0).and_then(|r| coords_of(r, scale)),
        _ => None,
    };
    line.ok_or_else(|| malformed(name, "not a line"))
}

/// 从已经解析的 JSON 文档中提取标注.
///
/// 标注名不区分大小写. 所有坐标乘以 `pixel_size` (微米每像素).
///
/// # 返回值
///
/// - 缺少区域多边形或任一角点时返回 `Err(ImageError::MissingAnnotation)`;
/// - 几何类型或坐标结构不符合预期时返回 `Err(ImageError::MalformedAnnotation)`;
/// - 区域多边形或四边形退化时返回 `Err(ImageError::Geometry)`.
pub fn parse_annotations(doc: &Value, region_name: &str, pixel_size: f64) -> ImageResult<Annotations> {
    let features = index_features(doc)?;
    let region = region_of(&features, region_name, pixel_size)?;

    let [tl, tr, br, bl] = CORNERS;
    let quadrilateral = Quadrilateral::new(
        point_of(&features, tl, pixel_size)?,
        point_of(&features, tr, pixel_size)?,
        point_of(&features, br, pixel_size)?,
        point_of(&features, bl, pixel_size)?,
    )?;

    let outside_pia = match line_of(&features, OUTSIDE_PIA, pixel_size) {
        Ok(line) => Some(line),
        Err(ImageError::MissingAnnotation(_)) => None,
        Err(e) => return Err(e),
    };

    Ok(Annotations {
        region,
        quadrilateral,
        outside_pia,
    })
}

/// 读取 GeoJSON 标注文件. 规则同 [`parse_annotations`].
pub fn read_annotations<P: AsRef<Path>>(
    path: P,
    region_name: &str,
    pixel_size: f64,
) -> ImageResult<Annotations> {
    let file = std::fs::File::open(path)?;
    let doc: Value = serde_json::from_reader(std::io::BufReader::new(file))?;
    parse_annotations(&doc, region_name, pixel_size)
}

/// 读取像素尺寸文件 (第一行为一个浮点数, 单位: 微米每像素).
pub fn read_pixel_size<P: AsRef<Path>>(path: P) -> ImageResult<f64> {
    let text = std::fs::read_to_string(path)?;
    let first = text.lines().next().unwrap_or_default().trim();
    first
        .parse::<f64>()
        .ok()
        .filter(|v| *v > 0.0 && v.is_finite())
        .ok_or_else(|| ImageError::InvalidValue {
            line: 1,
            column: "pixel size".to_owned(),
            value: first.to_owned(),
        })
}
