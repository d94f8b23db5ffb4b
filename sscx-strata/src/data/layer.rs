//! 皮层分层标签.

use crate::error::ImageError;
use std::fmt;
use std::str::FromStr;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// 大鼠体感皮层的解剖分层, 按从软脑膜到白质的顺序排列.
///
/// 派生的 `Ord` 即为这一规范顺序.
#[derive(Copy, Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub enum Layer {
    /// 第 1 层.
    L1,
    /// 第 2 层.
    L2,
    /// 第 3 层.
    L3,
    /// 第 4 层.
    L4,
    /// 第 5 层.
    L5,
    /// 第 6a 层.
    L6a,
    /// 第 6b 层.
    L6b,
}

impl Layer {
    /// 按规范顺序排列的全部分层.
    pub const ALL: [Layer; 7] = [
        Layer::L1,
        Layer::L2,
        Layer::L3,
        Layer::L4,
        Layer::L5,
        Layer::L6a,
        Layer::L6b,
    ];

    /// 在细胞检测表 `Class` 列和结果表中使用的名字.
    pub const fn name(self) -> &'static str {
        match self {
            Layer::L1 => "Layer 1",
            Layer::L2 => "Layer 2",
            Layer::L3 => "Layer 3",
            Layer::L4 => "Layer 4",
            Layer::L5 => "Layer 5",
            Layer::L6a => "Layer 6 a",
            Layer::L6b => "Layer 6 b",
        }
    }

    /// 根据名字查找分层.
    ///
    /// 忽略大小写和空白, 因此 `"Layer 6 a"`, `"layer 6a"` 和 `"LAYER6A"` 都对应 [`Layer::L6a`].
    ///
    /// # 注意
    ///
    /// 合并标注 `"Layer 2/3"` 不属于任何单独的分层, 返回 `None`.
    /// 这类细胞在按层分组时与其他未知分类一样被忽略.
    pub fn from_name(name: &str) -> Option<Layer> {
        let key = normalize(name);
        Self::ALL.into_iter().find(|l| normalize(l.name()) == key)
    }
}

fn normalize(name: &str) -> String {
    name.chars()
        .filter(|c| !c.is_whitespace())
        .flat_map(char::to_lowercase)
        .collect()
}

impl fmt::Display for Layer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for Layer {
    type Err = ImageError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Layer::from_name(s).ok_or_else(|| ImageError::UnknownLayer(s.to_owned()))
    }
}

/// 将一组名字解析为分层, 并按规范顺序排序去重.
pub fn parse_layers<S: AsRef<str>>(names: &[S]) -> Result<Vec<Layer>, ImageError> {
    let mut layers = names
        .iter()
        .map(|s| s.as_ref().parse())
        .collect::<Result<Vec<Layer>, _>>()?;
    layers.sort_unstable();
    layers.dedup();
    Ok(layers)
}
