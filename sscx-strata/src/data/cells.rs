//! QuPath 导出的细胞检测表 (制表符分隔).

use super::layer::Layer;
use crate::consts::column;
use crate::error::{ImageError, ImageResult};
use csv::StringRecord;
use geo::Coord;
use ndarray::Array2;
use std::collections::BTreeMap;
use std::io::{Read, Write};
use std::path::Path;

/// 细胞检测表.
///
/// 保留原始的表头和每一行文本, 以便在追加 `exclude_for_density` 列后原样写回;
/// 同时按列解析出计算所需的数值.
#[derive(Clone, Debug)]
pub struct CellTable {
    header: StringRecord,
    rows: Vec<StringRecord>,

    x: Vec<f64>,
    y: Vec<f64>,
    class: Option<Vec<String>>,
    max_diameter: Option<Vec<f64>>,
    min_diameter: Option<Vec<f64>>,
    delaunay: Option<Vec<f64>>,

    exclude: Vec<bool>,
    has_exclude_column: bool,
}

impl CellTable {
    /// 细胞个数.
    #[inline]
    pub fn len(&self) -> usize {
        self.x.len()
    }

    /// 是否没有细胞.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.x.is_empty()
    }

    /// 所有细胞的质心 (单位: 微米).
    pub fn points(&self) -> Vec<Coord> {
        self.x.iter().zip(&self.y).map(|(&x, &y)| Coord { x, y }).collect()
    }

    /// 未被排除的细胞的质心.
    pub fn included_points(&self) -> Vec<Coord> {
        self.points_where(|excluded| !excluded)
    }

    /// 被排除的细胞的质心.
    pub fn excluded_points(&self) -> Vec<Coord> {
        self.points_where(|excluded| excluded)
    }

    fn points_where(&self, pred: impl Fn(bool) -> bool) -> Vec<Coord> {
        self.points()
            .into_iter()
            .zip(&self.exclude)
            .filter(|(_, &e)| pred(e))
            .map(|(c, _)| c)
            .collect()
    }

    /// 第 `index` 个细胞的分类名字.
    pub fn class(&self, index: usize) -> Option<&str> {
        self.class.as_ref().map(|c| c[index].as_str())
    }

    /// 每个细胞的平均直径 `(最大直径 + 最小直径) / 2`.
    ///
    /// 表中缺少任一直径列时返回 `None`.
    pub fn mean_diameters(&self) -> Option<Vec<f64>> {
        let (max, min) = (self.max_diameter.as_ref()?, self.min_diameter.as_ref()?);
        Some(max.iter().zip(min).map(|(a, b)| (a + b) / 2.0).collect())
    }

    /// `Delaunay: Mean distance` 列.
    #[inline]
    pub fn delaunay(&self) -> Option<&[f64]> {
        self.delaunay.as_deref()
    }

    /// 体视学排除标记.
    #[inline]
    pub fn exclude_flags(&self) -> &[bool] {
        &self.exclude
    }

    /// 原始表中是否带有 `exclude_for_density` 列.
    #[inline]
    pub fn has_exclude_column(&self) -> bool {
        self.has_exclude_column
    }

    /// 覆盖体视学排除标记.
    ///
    /// # 注意
    ///
    /// `flags` 的长度必须等于细胞个数, 否则 panic.
    pub fn set_exclude(&mut self, flags: Vec<bool>) {
        assert_eq!(flags.len(), self.len(), "one flag per cell");
        self.exclude = flags;
    }

    /// 属于给定各层的细胞索引, 键按规范顺序排列. 没有细胞的层对应空 `Vec`.
    ///
    /// 分类名字无法识别的细胞不属于任何层.
    ///
    /// # 返回值
    ///
    /// 表中没有 `Class` 列时返回 `Err(ImageError::MissingColumn)`.
    pub fn layer_indices(&self, layers: &[Layer]) -> ImageResult<BTreeMap<Layer, Vec<usize>>> {
        let class = self
            .class
            .as_ref()
            .ok_or_else(|| ImageError::MissingColumn(column::CLASS.to_owned()))?;
        let mut ans: BTreeMap<Layer, Vec<usize>> = layers.iter().map(|&l| (l, vec![])).collect();
        let mut unknown = 0;
        for (i, name) in class.iter().enumerate() {
            match Layer::from_name(name) {
                Some(l) => {
                    if let Some(v) = ans.get_mut(&l) {
                        v.push(i);
                    }
                }
                None => unknown += 1,
            }
        }
        if unknown > 0 {
            log::debug!("{unknown} cells carry no known layer class");
        }
        Ok(ans)
    }

    /// 各层细胞的质心, 每层为形状 `(N, 2)` 的矩阵.
    pub fn points_by_layer(&self, layers: &[Layer]) -> ImageResult<BTreeMap<Layer, Array2<f64>>> {
        Ok(self
            .layer_indices(layers)?
            .into_iter()
            .map(|(l, idx)| {
                let m = Array2::from_shape_fn((idx.len(), 2), |(i, j)| {
                    if j == 0 {
                        self.x[idx[i]]
                    } else {
                        self.y[idx[i]]
                    }
                });
                (l, m)
            })
            .collect())
    }
}

fn normalize_header(h: &str) -> String {
    // QuPath 的不同版本分别使用 MICRO SIGN 和 GREEK SMALL LETTER MU.
    h.trim_start_matches('\u{feff}').trim().replace('\u{3bc}', "\u{b5}")
}

fn parse_flag(s: &str) -> Option<bool> {
    match s.to_ascii_lowercase().as_str() {
        "true" | "1" | "yes" => Some(true),
        "false" | "0" | "no" | "" => Some(false),
        _ => None,
    }
}

/// 从读取器解析细胞检测表.
///
/// # 返回值
///
/// - 缺少质心列时返回 `Err(ImageError::MissingColumn)`;
/// - 质心不是有限数值, 或直径等可选数值列无法解析时返回 `Err(ImageError::InvalidValue)`.
///   可选数值列中的空值视为 `NaN`.
pub fn parse_cells<R: Read>(reader: R) -> ImageResult<CellTable> {
    let mut reader = csv::ReaderBuilder::new()
        .delimiter(b'\t')
        .flexible(true)
        .from_reader(reader);
    let header: StringRecord = reader.headers()?.iter().map(normalize_header).collect();

    let find = |name: &str| header.iter().position(|h| h == name);
    let required = |name: &str| find(name).ok_or_else(|| ImageError::MissingColumn(name.to_owned()));
    let ix = required(column::CENTROID_X)?;
    let iy = required(column::CENTROID_Y)?;
    let i_class = find(column::CLASS);
    let i_max = find(column::MAX_DIAMETER);
    let i_min = find(column::MIN_DIAMETER);
    let i_delaunay = find(column::DELAUNAY_MEAN);
    let i_exclude = find(column::EXCLUDE_FOR_DENSITY);

    let mut table = CellTable {
        header: header.clone(),
        rows: vec![],
        x: vec![],
        y: vec![],
        class: i_class.map(|_| vec![]),
        max_diameter: i_max.map(|_| vec![]),
        min_diameter: i_min.map(|_| vec![]),
        delaunay: i_delaunay.map(|_| vec![]),
        exclude: vec![],
        has_exclude_column: i_exclude.is_some(),
    };

    for (k, record) in reader.records().enumerate() {
        let record = record?;
        if record.iter().all(|f| f.trim().is_empty()) {
            continue;
        }
        let line = record.position().map_or(k + 2, |p| p.line() as usize);
        let text = |i: usize| record.get(i).unwrap_or("").trim();
        let invalid = |i: usize| ImageError::InvalidValue {
            line,
            column: header.get(i).unwrap_or_default().to_owned(),
            value: text(i).to_owned(),
        };
        let number = |i: usize| -> ImageResult<f64> {
            match text(i) {
                "" => Ok(f64::NAN),
                s => s.parse().map_err(|_| invalid(i)),
            }
        };
        let coordinate = |i: usize| -> ImageResult<f64> {
            text(i)
                .parse::<f64>()
                .ok()
                .filter(|v| v.is_finite())
                .ok_or_else(|| invalid(i))
        };

        table.x.push(coordinate(ix)?);
        table.y.push(coordinate(iy)?);
        if let (Some(i), Some(v)) = (i_class, table.class.as_mut()) {
            v.push(text(i).to_owned());
        }
        for (index, values) in [
            (i_max, table.max_diameter.as_mut()),
            (i_min, table.min_diameter.as_mut()),
            (i_delaunay, table.delaunay.as_mut()),
        ] {
            if let (Some(i), Some(v)) = (index, values) {
                v.push(number(i)?);
            }
        }
        let excluded = match i_exclude {
            Some(i) => parse_flag(text(i)).ok_or_else(|| invalid(i))?,
            None => false,
        };
        table.exclude.push(excluded);
        table.rows.push(record);
    }
    Ok(table)
}

/// 读取细胞检测表文件. 规则同 [`parse_cells`].
pub fn read_cells<P: AsRef<Path>>(path: P) -> ImageResult<CellTable> {
    let file = std::fs::File::open(path)?;
    parse_cells(std::io::BufReader::new(file))
}

/// 将细胞检测表以制表符分隔的格式写入 `writer`.
///
/// 所有原始列保持不变, `exclude_for_density` 列 (若原表没有则追加在末尾) 写入当前的排除标记.
pub fn write_cells_to<W: Write>(writer: W, table: &CellTable) -> ImageResult<()> {
    let mut header: Vec<&str> = table.header.iter().collect();
    let ie = match header.iter().position(|&h| h == column::EXCLUDE_FOR_DENSITY) {
        Some(i) => i,
        None => {
            header.push(column::EXCLUDE_FOR_DENSITY);
            header.len() - 1
        }
    };

    let mut w = csv::WriterBuilder::new().delimiter(b'\t').from_writer(writer);
    w.write_record(&header)?;
    for (row, &excluded) in table.rows.iter().zip(&table.exclude) {
        let mut fields: Vec<&str> = (0..header.len()).map(|i| row.get(i).unwrap_or("")).collect();
        fields[ie] = if excluded { "True" } else { "False" };
        w.write_record(&fields)?;
    }
    w.flush()?;
    Ok(())
}

/// 将细胞检测表写入文件. 规则同 [`write_cells_to`].
pub fn write_cells<P: AsRef<Path>>(path: P, table: &CellTable) -> ImageResult<()> {
    let file = std::fs::File::create(path)?;
    write_cells_to(std::io::BufWriter::new(file), table)
}

#[cfg(test)]
mod tests {
    use super::*;

    const TABLE: &str = "Image\tName\tClass\tCentroid X \u{3bc}m\tCentroid Y \u{b5}m\tMax diameter \u{b5}m\tMin diameter \u{b5}m\tDelaunay: Mean distance
a.svs\tcell\tLayer 1\t10.5\t20.0\t12\t8\t30
a.svs\tcell\tLayer 2\t11.0\t120.0\t10\t6\t
a.svs\tcell\tLayer 6 a\t12.0\t420.0\t14\t10\t25

a.svs\tcell\tOther\t13.0\t520.0\t14\t10\t25
";

    #[test]
    fn test_parse_cells() {
        let t = parse_cells(TABLE.as_bytes()).unwrap();
        assert_eq!(t.len(), 4);
        assert!(!t.has_exclude_column());
        assert_eq!(t.exclude_flags(), &[false; 4]);
        assert_eq!(t.points()[0], Coord { x: 10.5, y: 20.0 });
        assert_eq!(t.class(2), Some("Layer 6 a"));
        assert_eq!(t.mean_diameters().unwrap(), vec![10.0, 8.0, 12.0, 12.0]);
        assert!(t.delaunay().unwrap()[1].is_nan());

        let by_layer = t.points_by_layer(&[Layer::L1, Layer::L6a, Layer::L6b]).unwrap();
        assert_eq!(by_layer.len(), 3);
        assert_eq!(by_layer[&Layer::L1].shape(), &[1, 2]);
        assert_eq!(by_layer[&Layer::L6a][[0, 1]], 420.0);
        assert_eq!(by_layer[&Layer::L6b].shape(), &[0, 2]);
    }

    #[test]
    fn test_parse_errors() {
        let e = parse_cells("Class\tCentroid X \u{b5}m\nLayer 1\t1.0\n".as_bytes()).unwrap_err();
        assert!(matches!(e, ImageError::MissingColumn(c) if c == column::CENTROID_Y));

        let bad = "Centroid X \u{b5}m\tCentroid Y \u{b5}m\n1.0\t2.0\n1.0\tabc\n";
        match parse_cells(bad.as_bytes()).unwrap_err() {
            ImageError::InvalidValue { line, column, value } => {
                assert_eq!(line, 3);
                assert_eq!(column, "Centroid Y \u{b5}m");
                assert_eq!(value, "abc");
            }
            e => panic!("unexpected error {e:?}"),
        }

        let t = parse_cells("Centroid X \u{b5}m\tCentroid Y \u{b5}m\n1\t2\n".as_bytes()).unwrap();
        assert!(matches!(
            t.layer_indices(&[Layer::L1]),
            Err(ImageError::MissingColumn(_))
        ));
    }

    #[test]
    fn test_write_cells_with_exclusion() {
        let mut t = parse_cells(TABLE.as_bytes()).unwrap();
        t.set_exclude(vec![false, true, false, true]);

        let mut buf = vec![];
        write_cells_to(&mut buf, &t).unwrap();
        let text = String::from_utf8(buf).unwrap();
        let first = text.lines().next().unwrap();
        assert!(first.ends_with("\texclude_for_density"));
        assert!(first.contains("Centroid X \u{b5}m"));

        let back = parse_cells(text.as_bytes()).unwrap();
        assert!(back.has_exclude_column());
        assert_eq!(back.exclude_flags(), &[false, true, false, true]);
        assert_eq!(back.included_points().len(), 2);
        assert_eq!(back.excluded_points()[0], Coord { x: 11.0, y: 120.0 });
    }
}
