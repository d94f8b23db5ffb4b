//! 批处理结果汇总.

use sscx_strata::pipeline::BatchOutcome;
use std::io::{self, Write};

/// 批处理结果汇总.
pub struct BatchSummary {
    name: &'static str,
    nb_images: usize,
    nb_rows: usize,
    failed: Vec<(String, String)>,
    invalid: Vec<String>,
}

/// 将 `s` 的内容写进 `w` 中.
fn describe_into<W: Write>(s: &BatchSummary, w: &mut W) -> io::Result<()> {
    const S4: &str = "    ";

    let ok = s.nb_images.saturating_sub(s.failed.len() + s.invalid.len());
    writeln!(w, "Batch `{}`:", s.name)?;
    writeln!(w, "{S4}Images listed: {}", s.nb_images)?;
    writeln!(w, "{S4}Images kept: {ok}")?;
    writeln!(w, "{S4}Rows written: {}", s.nb_rows)?;
    writeln!(w, "{S4}Failed images: {}", s.failed.len())?;
    for (image, reason) in &s.failed {
        writeln!(w, "{S4}{S4}{image}: {reason}")?;
    }
    write!(w, "{S4}Invalid images: {}", s.invalid.len())?;
    for image in &s.invalid {
        write!(w, "\n{S4}{S4}{image}")?;
    }
    Ok(())
}

impl BatchSummary {
    pub fn new<T>(name: &'static str, outcome: &BatchOutcome<T>) -> Self {
        Self {
            name,
            nb_images: outcome.nb_images,
            nb_rows: outcome.rows.len(),
            failed: outcome.failed.clone(),
            invalid: outcome.invalid.clone(),
        }
    }

    /// 输出汇总.
    pub fn analyze(&self) {
        let mut buf = Vec::with_capacity(512);
        let ans = utils::sep_to(&mut buf)
            .and_then(|()| describe_into(self, &mut buf))
            .and_then(|()| writeln!(&mut buf))
            .and_then(|()| utils::sep_to(&mut buf));
        match ans {
            Ok(()) => print!("{}", String::from_utf8_lossy(&buf)),
            Err(e) => log::error!("cannot describe batch result: {e}"),
        }
    }
}
