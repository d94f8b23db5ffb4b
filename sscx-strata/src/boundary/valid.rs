//! 跨图像汇总时的有效性检查.

use super::locate::BoundaryResult;
use crate::data::Layer;
use std::collections::{BTreeMap, HashMap};

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// 分层边界结果表中的一行.
#[derive(Clone, Debug, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct BoundaryRow {
    /// 图像名.
    pub image: String,
    /// 分层.
    pub layer: Layer,
    /// 底部到第一层顶部的距离 (单位: 微米).
    pub absolute_um: f64,
    /// 底部的深度百分比.
    pub percentage: f64,
}

/// 将一张图像的边界结果展开为按规范顺序排列的行.
pub fn boundary_rows(image: &str, result: &BoundaryResult) -> Vec<BoundaryRow> {
    result
        .boundaries
        .iter()
        .map(|(&layer, b)| BoundaryRow {
            image: image.to_owned(),
            layer,
            absolute_um: b.absolute_um,
            percentage: b.percentage,
        })
        .collect()
}

/// 只保留分层边界正确排列的图像.
///
/// 一张图像有效, 当且仅当 `layers` 中的每一层都恰有一行, 且按规范顺序底部边界单调不减.
/// 任何缺失或倒置都使该图像的全部行被剔除.
///
/// # 返回值
///
/// `(有效的行, 无效的图像名)`. 有效的行保持输入顺序, 无效的图像名按首次出现的顺序排列.
pub fn get_valid_image(rows: &[BoundaryRow], layers: &[Layer]) -> (Vec<BoundaryRow>, Vec<String>) {
    let mut order: Vec<&str> = vec![];
    let mut per_image: HashMap<&str, BTreeMap<Layer, Vec<f64>>> = HashMap::new();
    for r in rows {
        let entry = per_image.entry(r.image.as_str()).or_insert_with(|| {
            order.push(r.image.as_str());
            BTreeMap::new()
        });
        entry.entry(r.layer).or_default().push(r.absolute_um);
    }

    let mut canonical = layers.to_vec();
    canonical.sort_unstable();
    canonical.dedup();

    let invalid: Vec<String> = order
        .into_iter()
        .filter(|image| {
            let by_layer = &per_image[image];
            let mut last = f64::NEG_INFINITY;
            let ok = canonical.iter().all(|l| match by_layer.get(l).map(Vec::as_slice) {
                Some(&[pos]) if pos >= last => {
                    last = pos;
                    true
                }
                _ => false,
            });
            !ok
        })
        .map(str::to_owned)
        .collect();

    for image in &invalid {
        log::warn!("image {image} has missing or misordered layer boundaries, excluded");
    }
    let valid = rows
        .iter()
        .filter(|r| !invalid.contains(&r.image))
        .cloned()
        .collect();
    (valid, invalid)
}
