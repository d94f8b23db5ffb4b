//! 命令行程序依赖的通用组件.

pub mod config;
pub mod loader;

const SEP: &str = "--------------------------------------------------------";

/// 将简单分隔线写入 `w`.
#[inline]
pub fn sep_to<W: std::io::Write>(mut w: W) -> std::io::Result<()> {
    writeln!(&mut w, "{SEP}")
}
