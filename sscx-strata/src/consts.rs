//! 通用常量.

/// QuPath 细胞检测表中的列名.
pub mod column {
    /// 细胞质心 x 坐标 (单位: 微米).
    pub const CENTROID_X: &str = "Centroid X µm";

    /// 细胞质心 y 坐标 (单位: 微米).
    pub const CENTROID_Y: &str = "Centroid Y µm";

    /// 细胞分类 (一般为所在皮层的名字).
    pub const CLASS: &str = "Class";

    /// 细胞最大直径 (单位: 微米).
    pub const MAX_DIAMETER: &str = "Max diameter µm";

    /// 细胞最小直径 (单位: 微米).
    pub const MIN_DIAMETER: &str = "Min diameter µm";

    /// QuPath 计算的 Delaunay 三角剖分平均邻边长度.
    pub const DELAUNAY_MEAN: &str = "Delaunay: Mean distance";

    /// 体视学排除标记.
    pub const EXCLUDE_FOR_DENSITY: &str = "exclude_for_density";
}

/// 深度网格.
pub mod grid {
    /// 最外侧两条纵向分割线距离四边形左右边的偏移量 (单位: 微米).
    ///
    /// 偏移量足够大, 保证两条线完全位于区域多边形之外.
    pub const OUTER_DIVIDER_OFFSET_UM: f64 = 2000.0;

    /// 内部纵向分割线在与区域多边形求交前, 向两端延长的倍率.
    pub const EXTRAPOLATION_RATIO: f64 = 1.3;

    /// 面积小于 `区域面积 * NEGLIGIBLE_AREA_RATIO` 的切分结果被视为空.
    pub const NEGLIGIBLE_AREA_RATIO: f64 = 1e-9;

    /// 切分后面积总和与原区域面积之间允许的相对误差.
    pub const AREA_TOLERANCE: f64 = 1e-3;
}

/// 皮层边界定位.
pub mod boundary {
    /// DBSCAN 中核心点邻域内 (包括自身) 的最少点数.
    pub const DBSCAN_MIN_SAMPLES: usize = 10;

    /// 估计 DBSCAN 邻域半径时使用的默认倍率.
    pub const DEFAULT_EPS_FACTOR: f64 = 4.0;

    /// 估计皮层底部时参与平均的最深点个数 (最深的一个点本身不参与).
    pub const BOTTOM_TAIL: usize = 10;
}

/// 体视学排除.
pub mod stereology {
    /// 估计细胞直径时使用的近邻个数.
    pub const NEIGHBOURS: usize = 5;

    /// 默认切片厚度 (单位: 微米).
    pub const DEFAULT_SLICE_THICKNESS_UM: f64 = 50.0;
}

/// 平方微米到平方毫米.
pub const UM2_PER_MM2: f64 = 1e6;

/// 微米到毫米.
pub const UM_PER_MM: f64 = 1e3;
