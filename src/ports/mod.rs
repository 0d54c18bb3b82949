use crate::api::dto::RewriteReportDto;
use crate::domain::ast::{LocatedFunction, RewrittenBody, SourceFile};
use crate::domain::options::TraceOptions;
use crate::domain::report::InstrumentedFunction;
use crate::error::Result;

/// Finds one function in a source file and parses it.
pub trait SourceLocator {
    fn locate(&self, file: &SourceFile, target: &str) -> Result<LocatedFunction>;
}

/// Splices diagnostic statements after watched assignments.
pub trait TreeRewriter {
    fn rewrite(&self, function: &LocatedFunction, options: &TraceOptions) -> Result<RewrittenBody>;
}

/// Turns a rewritten body into the wrapper that times and reports the call.
pub trait CallExecutor {
    fn assemble(
        &self,
        function: &LocatedFunction,
        body: RewrittenBody,
        options: &TraceOptions,
    ) -> Result<InstrumentedFunction>;
}

pub trait ReportExporter {
    fn export(&self, report: &RewriteReportDto) -> Result<String>;
}
