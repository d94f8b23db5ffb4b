#![warn(missing_docs)] // <= 合适时移除它.
// #![warn(clippy::missing_docs_in_private_items)]  // <= too strict.

//! 核心库. 根据 QuPath 导出的细胞检测表和 GeoJSON 标注, 计算大鼠体感皮层 (SSCX) Nissl
//! 切片的细胞密度随皮层深度的分布, 并定位各皮层的底部边界.
//!
//! 该 crate 目前仅提供 `safe` 接口, 所有计算都是单线程同步的.
//!
//! # 注意
//!
//! 1. 所有坐标的单位都是微米. 标注坐标在读取时乘以像素尺寸完成换算.
//! 2. 坐标系与图像一致, 即 y 轴向下, 越深的皮层 y 坐标越大.
//! 3. 不合法的输入 (缺列, 缺标注, 细胞落在网格外等) 以 [`ImageError`] 的形式返回,
//!   批处理会跳过对应图像. 违反函数参数约定时程序会直接 panic.
//!
//! # 开发计划
//!
//! ### 深度网格与深度层切分 ✅
//!
//! 以手工放置的四个角点为参考, 在皮层区域内构建纵横网格, 再按横向等深线将区域切分为从上到下的深度层.
//!
//! 实现位于 `sscx-strata/src/geometry`.
//!
//! ### 深度密度 ✅
//!
//! 统计每层细胞个数, 除以 `面积 * 切片厚度` 得到密度.
//! 深度百分比的分母始终是实际产生的层数.
//!
//! 实现位于 `sscx-strata/src/density.rs`.
//!
//! ### 体视学排除 ✅
//!
//! 随机 z 偏移加最近邻平均直径, 可指定随机数种子以保证可复现.
//!
//! 实现位于 `sscx-strata/src/stereology.rs`.
//!
//! ### 皮层分层边界 ✅
//!
//! 1. DBSCAN 去除误分类细胞; ✅
//! 2. 旋转坐标系使上表面水平; ✅
//! 3. 以最深的若干个细胞估计底部; ✅
//! 4. 跨图像检查边界单调性. ✅
//!
//! 实现位于 `sscx-strata/src/boundary`.
//!
//! ### 输入输出与批处理 ✅
//!
//! 包括深度密度, 分层边界, 体视学排除和标注导出四种批处理.
//!
//! 实现位于 `sscx-strata/src/data`, `sscx-strata/src/dataset` 和 `sscx-strata/src/pipeline`.
//!
//! ### 可视化 ✅
//!
//! 计算与绘图分离, 需要 `plot` feature 才能通过 `plotters` 输出 PNG.
//!
//! 实现位于 `sscx-strata/src/visual`.

pub mod consts;

mod error;
pub use error::{ImageError, ImageResult};

pub mod geometry;

pub mod density;

pub mod stereology;

pub mod boundary;

/// QuPath 导出文件的读写.
pub mod data;

pub mod dataset;
pub mod pipeline;
pub mod prelude;
pub mod visual;

mod spatial;
