use serde::{Deserialize, Serialize};

use crate::domain::report::RewriteReport;
use crate::infrastructure::rewriter::render_statement;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RewriteReportDto {
    pub function: String,
    pub start_line: Option<usize>,
    pub end_line: Option<usize>,
    pub def_line: Option<usize>,
    pub anchors: Vec<AnchorDto>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnchorDto {
    pub index: usize,
    pub kind: String,
    pub targets: Vec<String>,
    pub line: Option<usize>,
    pub text: String,
    pub injected: Vec<InjectedDto>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InjectedDto {
    pub kind: String,
    pub target: String,
    pub line: Option<usize>,
    pub statement: String,
}

impl RewriteReportDto {
    pub fn injected_count(&self) -> usize {
        self.anchors.iter().map(|a| a.injected.len()).sum()
    }
}

impl From<&RewriteReport> for RewriteReportDto {
    fn from(report: &RewriteReport) -> Self {
        let anchors = report
            .anchors
            .iter()
            .enumerate()
            .map(|(position, anchor)| AnchorDto {
                index: anchor.index,
                kind: anchor.kind.as_str().to_string(),
                targets: anchor.targets.clone(),
                line: anchor.line.known(),
                text: anchor.text.clone(),
                injected: report
                    .injected_after(position)
                    .map(|stmt| InjectedDto {
                        kind: stmt.kind.as_str().to_string(),
                        target: stmt.target.clone(),
                        line: stmt.line.known(),
                        statement: render_statement(&stmt.stmt),
                    })
                    .collect(),
            })
            .collect();

        RewriteReportDto {
            function: report.function.clone(),
            start_line: report.start_line.known(),
            end_line: report.end_line.known(),
            def_line: report.def_line.known(),
            anchors,
        }
    }
}
