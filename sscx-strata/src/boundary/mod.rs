//! 皮层分层边界定位.
//!
//! 1. 对每层细胞做 DBSCAN 聚类, 只保留主簇, 剔除误分类的离群细胞;
//! 2. 以手工标注的上表面 (`TOP_LEFT -> TOP_RIGHT`) 为基准旋转坐标系, 使上表面水平;
//! 3. 以每层最深的若干个点的平均 y 坐标作为该层的底部边界.

mod dbscan;
mod locate;
mod rotate;
mod valid;

pub use dbscan::{
    compute_dbscan_eps, dbscan, get_main_cluster, main_cluster, mean_nearest_neighbour_distance,
    Clustering,
};
pub use locate::{locate_layer_boundaries, locate_layers_boundaries, BoundaryResult, LayerBoundary};
pub use rotate::{get_angle, rotate_points, rotated_cells_from_top_line, RotatedLayers};
pub use valid::{boundary_rows, get_valid_image, BoundaryRow};
