//! 深度层内的细胞计数.

use super::polygon::Stratum;
use geo::Coord;

/// 统计每个深度层内的细胞个数.
///
/// 每个点只计入从上到下第一个严格包含它的深度层. 落在层边界上或所有层之外的点不计入任何层,
/// 因此计数总和可能小于点数, 调用方应据此判断网格与标注是否匹配.
///
/// 复杂度为 `O(points * strata)`.
pub fn count_nb_cell_per_polygon(points: &[Coord], strata: &[Stratum]) -> Vec<usize> {
    let mut counts = vec![0; strata.len()];
    for index in compute_cells_depth(points, strata).into_iter().flatten() {
        counts[index] += 1;
    }
    counts
}

/// 求每个点所在深度层的索引. 规则同 [`count_nb_cell_per_polygon`], 不在任何层内的点为 `None`.
pub fn compute_cells_depth(points: &[Coord], strata: &[Stratum]) -> Vec<Option<usize>> {
    points
        .iter()
        .map(|&p| strata.iter().position(|s| s.contains(p)))
        .collect()
}
