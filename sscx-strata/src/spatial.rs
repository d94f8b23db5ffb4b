//! 基于 R 树的二维点索引.

use rstar::primitives::GeomWithData;
use rstar::RTree;

type IndexedPoint = GeomWithData<[f64; 2], usize>;

/// 二维点集的空间索引. 每个点携带它在原始序列中的下标.
pub(crate) struct PointIndex {
    tree: RTree<IndexedPoint>,
}

impl PointIndex {
    /// 批量构建.
    pub(crate) fn new<I: IntoIterator<Item = [f64; 2]>>(points: I) -> Self {
        let items = points
            .into_iter()
            .enumerate()
            .map(|(i, p)| IndexedPoint::new(p, i))
            .collect();
        Self {
            tree: RTree::bulk_load(items),
        }
    }

    /// 离 `p` 最近的至多 `k` 个点的下标, 由近到远, 不包括下标为 `exclude` 的点.
    pub(crate) fn nearest_others(
        &self,
        p: [f64; 2],
        exclude: usize,
        k: usize,
    ) -> impl Iterator<Item = usize> + '_ {
        self.tree
            .nearest_neighbor_iter(&p)
            .map(|n| n.data)
            .filter(move |&i| i != exclude)
            .take(k)
    }

    /// 与 `p` 距离不超过 `radius` 的全部点的下标 (包括 `p` 自身, 若它在索引中).
    pub(crate) fn within(&self, p: [f64; 2], radius: f64) -> Vec<usize> {
        self.tree
            .locate_within_distance(p, radius * radius)
            .map(|n| n.data)
            .collect()
    }
}
