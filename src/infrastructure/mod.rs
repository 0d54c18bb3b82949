// Infrastructure implementations for Constable.

pub mod config;
pub mod executor;
pub mod locator;
pub mod project_loader;
pub mod rewrite_cache;
pub mod rewriter;

pub use executor::WrapperExecutor;
pub use locator::SynSourceLocator;
pub use rewriter::SynTreeRewriter;

use std::fmt::Write;

use crate::api::dto::RewriteReportDto;
use crate::error::{Error, Result};
use crate::ports::ReportExporter;

pub struct JsonReportExporter;

impl ReportExporter for JsonReportExporter {
    fn export(&self, report: &RewriteReportDto) -> Result<String> {
        serde_json::to_string_pretty(report).map_err(|e| Error::Io(e.into()))
    }
}

/// One line per anchor, its injected statements indented below it.
pub struct TextReportExporter;

impl ReportExporter for TextReportExporter {
    fn export(&self, report: &RewriteReportDto) -> Result<String> {
        let mut out = String::new();
        let line = |l: Option<usize>| l.map_or_else(|| "?".to_string(), |l| l.to_string());
        let _ = writeln!(
            out,
            "{} (lines {}-{}, defined on {})",
            report.function,
            line(report.start_line),
            line(report.end_line),
            line(report.def_line),
        );
        for anchor in &report.anchors {
            let _ = writeln!(
                out,
                "  #{} {} [{}] line {}: {}",
                anchor.index,
                anchor.kind,
                anchor.targets.join(", "),
                line(anchor.line),
                anchor.text,
            );
            for injected in &anchor.injected {
                let _ = writeln!(
                    out,
                    "      {:>3} {:<7} {}",
                    line(injected.line),
                    injected.kind,
                    injected.statement,
                );
            }
        }
        let _ = writeln!(out, "{} statements injected", report.injected_count());
        Ok(out)
    }
}
