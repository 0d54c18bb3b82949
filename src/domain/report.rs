// Rewrite reports for Constable.

use crate::domain::ast::{AnchorStatement, InjectedStatement, LineRef, RewrittenBody};

/// What one rewrite did to one function.
#[derive(Debug, Clone)]
pub struct RewriteReport {
    pub function: String,
    pub start_line: LineRef,
    pub end_line: LineRef,
    pub def_line: LineRef,
    pub anchors: Vec<AnchorStatement>,
    pub injected: Vec<InjectedStatement>,
}

impl RewriteReport {
    pub fn new(function: String, start_line: LineRef, end_line: LineRef, def_line: LineRef, body: &RewrittenBody) -> Self {
        Self {
            function,
            start_line,
            end_line,
            def_line,
            anchors: body.anchors.clone(),
            injected: body.injected.clone(),
        }
    }

    /// Injected statements that follow the anchor at `anchor`.
    pub fn injected_after(&self, anchor: usize) -> impl Iterator<Item = &InjectedStatement> {
        self.injected.iter().filter(move |s| s.anchor == anchor)
    }
}

/// The wrapper function ready to replace the original.
#[derive(Debug, Clone)]
pub struct InstrumentedFunction {
    pub item: syn::ItemFn,
    pub report: RewriteReport,
}
