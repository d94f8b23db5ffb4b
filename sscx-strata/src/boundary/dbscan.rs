//! 基于密度的聚类 (DBSCAN), 用于剔除远离本层主体的误分类细胞.

use crate::consts::boundary::DBSCAN_MIN_SAMPLES;
use crate::data::{CellTable, Layer};
use crate::error::ImageResult;
use crate::spatial::PointIndex;
use ndarray::{Array2, ArrayView2, Axis};
use std::collections::{BTreeMap, VecDeque};

/// DBSCAN 聚类结果.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Clustering {
    /// 每个点所属的簇, 噪声点为 `None`. 簇按发现顺序从 0 编号.
    pub labels: Vec<Option<usize>>,

    /// 每个点是否为核心点.
    pub core: Vec<bool>,

    /// 簇的个数.
    pub n_clusters: usize,
}

impl Clustering {
    /// 每个簇的核心点个数.
    pub fn core_sizes(&self) -> Vec<usize> {
        let mut sizes = vec![0; self.n_clusters];
        for (label, &core) in self.labels.iter().zip(&self.core) {
            if let (Some(l), true) = (label, core) {
                sizes[*l] += 1;
            }
        }
        sizes
    }
}

fn rows(points: ArrayView2<f64>) -> Vec<[f64; 2]> {
    points.outer_iter().map(|r| [r[0], r[1]]).collect()
}

/// 对形状为 `(N, 2)` 的点集执行 DBSCAN.
///
/// 距离不超过 `eps` 的点互为邻居, 邻居个数 (包括自身) 不少于 `min_samples` 的点为核心点.
/// 从核心点出发, 经由核心点可达的所有点构成一个簇; 不属于任何簇的点为噪声.
/// 边界点归入最先到达它的簇, 因此结果是确定的.
pub fn dbscan(points: ArrayView2<f64>, eps: f64, min_samples: usize) -> Clustering {
    let n = points.nrows();
    let pts = rows(points);
    let index = PointIndex::new(pts.iter().copied());
    let neighbours: Vec<Vec<usize>> = pts.iter().map(|&p| index.within(p, eps)).collect();
    let core: Vec<bool> = neighbours.iter().map(|v| v.len() >= min_samples).collect();

    let mut labels = vec![None; n];
    let mut n_clusters = 0;
    let mut queue = VecDeque::new();
    for seed in 0..n {
        if !core[seed] || labels[seed].is_some() {
            continue;
        }
        labels[seed] = Some(n_clusters);
        queue.push_back(seed);
        while let Some(i) = queue.pop_front() {
            if !core[i] {
                continue;
            }
            for &j in &neighbours[i] {
                if labels[j].is_none() {
                    labels[j] = Some(n_clusters);
                    queue.push_back(j);
                }
            }
        }
        n_clusters += 1;
    }

    Clustering {
        labels,
        core,
        n_clusters,
    }
}

/// 保留最大簇的核心点.
///
/// 簇的大小以核心点个数计; 大小相同时取先发现的簇. 点的相对顺序保持不变.
/// 没有任何簇时返回形状为 `(0, 2)` 的空矩阵.
pub fn main_cluster(points: ArrayView2<f64>, eps: f64) -> Array2<f64> {
    let c = dbscan(points, eps, DBSCAN_MIN_SAMPLES);
    let sizes = c.core_sizes();
    let Some(best) = (0..c.n_clusters).fold(None, |best: Option<usize>, k| match best {
        Some(b) if sizes[b] >= sizes[k] => Some(b),
        _ => Some(k),
    }) else {
        return Array2::zeros((0, 2));
    };

    let keep: Vec<usize> = (0..points.nrows())
        .filter(|&i| c.core[i] && c.labels[i] == Some(best))
        .collect();
    points.select(Axis(0), &keep)
}

/// 点集中每个点到其最近邻的距离的平均值. 少于两个点时返回 `None`.
pub fn mean_nearest_neighbour_distance(points: ArrayView2<f64>) -> Option<f64> {
    let n = points.nrows();
    if n < 2 {
        return None;
    }
    let pts = rows(points);
    let index = PointIndex::new(pts.iter().copied());
    let sum: f64 = pts
        .iter()
        .enumerate()
        .filter_map(|(i, &p)| {
            let j = index.nearest_others(p, i, 1).next()?;
            Some((p[0] - pts[j][0]).hypot(p[1] - pts[j][1]))
        })
        .sum();
    Some(sum / n as f64)
}

/// 估计每层的 DBSCAN 邻域半径.
///
/// 表中有 `Delaunay: Mean distance` 列时, 取本层细胞该列的平均值乘以 `factor`;
/// 否则取本层细胞的平均最近邻距离乘以 `factor`. 两者都无法计算的层 (例如只有一个细胞)
/// 不出现在结果中.
pub fn compute_dbscan_eps(
    table: &CellTable,
    layers: &[Layer],
    factor: f64,
) -> ImageResult<BTreeMap<Layer, f64>> {
    let by_layer = table.layer_indices(layers)?;
    let points = table.points();

    let mut ans = BTreeMap::new();
    for (layer, idx) in by_layer {
        let delaunay = table.delaunay().and_then(|d| {
            let values: Vec<f64> = idx.iter().map(|&i| d[i]).filter(|v| v.is_finite()).collect();
            (!values.is_empty()).then(|| values.iter().sum::<f64>() / values.len() as f64)
        });
        let base = delaunay.or_else(|| {
            let m = Array2::from_shape_fn((idx.len(), 2), |(i, j)| {
                let c = points[idx[i]];
                if j == 0 {
                    c.x
                } else {
                    c.y
                }
            });
            mean_nearest_neighbour_distance(m.view())
        });
        match base {
            Some(b) => {
                ans.insert(layer, b * factor);
            }
            None => log::warn!("cannot estimate the DBSCAN radius of {layer}"),
        }
    }
    Ok(ans)
}

/// 对每层细胞执行聚类, 只保留主簇的点.
///
/// 没有邻域半径的层以及没有细胞的层得到空矩阵.
pub fn get_main_cluster(
    layer_points: &BTreeMap<Layer, Array2<f64>>,
    layer_eps: &BTreeMap<Layer, f64>,
) -> BTreeMap<Layer, Array2<f64>> {
    layer_points
        .iter()
        .map(|(&layer, points)| {
            let kept = match layer_eps.get(&layer) {
                Some(&eps) if points.nrows() > 0 => main_cluster(points.view(), eps),
                _ => Array2::zeros((0, 2)),
            };
            log::debug!(
                "{layer}: {} of {} cells kept in the main cluster",
                kept.nrows(),
                points.nrows()
            );
            (layer, kept)
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::parse_cells;

    /// 以 `(cx, cy)` 为中心, 间距为 `step` 的 `n * n` 网格点.
    fn blob(cx: f64, cy: f64, n: usize, step: f64) -> Vec<[f64; 2]> {
        (0..n * n)
            .map(|i| [cx + (i % n) as f64 * step, cy + (i / n) as f64 * step])
            .collect()
    }

    fn to_array(points: &[[f64; 2]]) -> Array2<f64> {
        Array2::from_shape_fn((points.len(), 2), |(i, j)| points[i][j])
    }

    #[test]
    fn test_dbscan_two_blobs_and_noise() {
        let mut pts = blob(0.0, 0.0, 5, 1.0);
        pts.extend(blob(100.0, 100.0, 4, 1.0));
        pts.push([50.0, 50.0]);
        let c = dbscan(to_array(&pts).view(), 1.5, 5);
        assert_eq!(c.n_clusters, 2);
        assert_eq!(c.labels[0], Some(0));
        assert_eq!(c.labels[25], Some(1));
        assert_eq!(*c.labels.last().unwrap(), None);
        assert!(!c.core[pts.len() - 1]);
    }

    #[test]
    fn test_main_cluster() {
        let mut pts = blob(0.0, 0.0, 6, 1.0);
        pts.extend(blob(100.0, 100.0, 4, 1.0));
        pts.push([500.0, -500.0]);
        let a = to_array(&pts);
        let kept = main_cluster(a.view(), 3.2);
        // 大的簇内所有点都是核心点.
        assert_eq!(kept.nrows(), 36);
        assert!(kept.column(0).iter().all(|&x| x < 10.0));

        // 点太少, 没有核心点.
        let sparse = to_array(&blob(0.0, 0.0, 2, 1.0));
        assert_eq!(main_cluster(sparse.view(), 3.2).shape(), &[0, 2]);
    }

    #[test]
    fn test_tie_keeps_first_cluster() {
        let mut pts = blob(100.0, 0.0, 4, 1.0);
        pts.extend(blob(0.0, 0.0, 4, 1.0));
        let kept = main_cluster(to_array(&pts).view(), 5.0);
        assert_eq!(kept.nrows(), 16);
        assert!(kept.column(0).iter().all(|&x| x >= 100.0));
    }

    #[test]
    fn test_mean_nearest_neighbour_distance() {
        let a = to_array(&[[0.0, 0.0], [3.0, 4.0], [3.0, 6.0]]);
        // 5, 2, 2.
        let m = mean_nearest_neighbour_distance(a.view()).unwrap();
        assert!((m - 3.0).abs() < 1e-12);
        assert!(mean_nearest_neighbour_distance(to_array(&[[1.0, 1.0]]).view()).is_none());
    }

    #[test]
    fn test_compute_dbscan_eps() {
        let with_delaunay = "Class\tCentroid X \u{b5}m\tCentroid Y \u{b5}m\tDelaunay: Mean distance
Layer 1\t0\t0\t10
Layer 1\t5\t0\t20
Layer 2\t0\t100\t
Layer 2\t0\t104\t
";
        let t = parse_cells(with_delaunay.as_bytes()).unwrap();
        let eps = compute_dbscan_eps(&t, &[Layer::L1, Layer::L2, Layer::L3], 4.0).unwrap();
        assert_eq!(eps[&Layer::L1], 60.0);
        // 没有 Delaunay 值时使用最近邻距离.
        assert_eq!(eps[&Layer::L2], 16.0);
        assert!(!eps.contains_key(&Layer::L3));

        let points: BTreeMap<Layer, Array2<f64>> = t.points_by_layer(&[Layer::L1, Layer::L3]).unwrap();
        let kept = get_main_cluster(&points, &eps);
        assert_eq!(kept.len(), 2);
        // 只有两个细胞, 不可能形成簇.
        assert_eq!(kept[&Layer::L1].nrows(), 0);
        assert_eq!(kept[&Layer::L3].nrows(), 0);
    }
}
