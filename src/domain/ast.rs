// Syntax-level data for Constable.
// A located function, the assignments chosen as anchors in its body and the
// diagnostic statements spliced in after them.

use std::fmt;
use std::path::{Path, PathBuf};

use proc_macro2::{Span, TokenStream};
use quote::{quote, quote_spanned, ToTokens};

/// A 1-based source line.
///
/// Outside a procedural macro `proc-macro2` reports real line numbers. Inside
/// one, stable toolchains report line 0; the span is kept instead and the
/// emitted code asks the compiler for the line via `line!()`.
#[derive(Debug, Clone, Copy)]
pub enum LineRef {
    Known(usize),
    Spanned(Span),
}

impl LineRef {
    pub fn from_span(span: Span) -> Self {
        match span.start().line {
            0 => LineRef::Spanned(span),
            line => LineRef::Known(line),
        }
    }

    pub fn known(&self) -> Option<usize> {
        match self {
            LineRef::Known(line) => Some(*line),
            LineRef::Spanned(_) => None,
        }
    }

    /// The line `by` lines below this one. Unknown lines stay unknown.
    pub fn offset(&self, by: usize) -> LineRef {
        match self {
            LineRef::Known(line) => LineRef::Known(line + by),
            LineRef::Spanned(span) => LineRef::Spanned(*span),
        }
    }
}

impl PartialEq for LineRef {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (LineRef::Known(a), LineRef::Known(b)) => a == b,
            _ => false,
        }
    }
}

impl ToTokens for LineRef {
    fn to_tokens(&self, tokens: &mut TokenStream) {
        match self {
            LineRef::Known(line) => {
                let line = *line as u32;
                tokens.extend(quote!(#line));
            }
            LineRef::Spanned(span) => tokens.extend(quote_spanned!(*span=> ::core::line!())),
        }
    }
}

impl fmt::Display for LineRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LineRef::Known(line) => write!(f, "{}", line),
            LineRef::Spanned(_) => write!(f, "?"),
        }
    }
}

/// A Rust source file handed to the locator.
#[derive(Debug, Clone)]
pub struct SourceFile {
    pub path: PathBuf,
    pub text: String,
}

impl SourceFile {
    pub fn new(path: impl Into<PathBuf>, text: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            text: text.into(),
        }
    }

    pub fn read(path: &Path) -> std::io::Result<Self> {
        let text = std::fs::read_to_string(path)?;
        Ok(Self::new(path, text))
    }
}

/// Where a located function lives, so it can be spliced back.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FunctionOrigin {
    Free,
    Method { self_ty: String },
}

/// Output of the source locator: one function and what is known about its text.
#[derive(Debug, Clone)]
pub struct LocatedFunction {
    pub name: String,
    pub origin: FunctionOrigin,
    /// First line of the item, attributes included.
    pub start_line: LineRef,
    /// Line of the closing brace.
    pub end_line: LineRef,
    /// Line carrying the `fn` keyword.
    pub def_line: LineRef,
    /// Lines `start_line..=end_line`, when the text is available.
    pub source_lines: Option<Vec<String>>,
    /// Index into `source_lines` of the definition line.
    pub def_offset: Option<usize>,
    pub item: syn::ItemFn,
}

impl LocatedFunction {
    /// `name` for free functions, `Type::name` for methods.
    pub fn qualified_name(&self) -> String {
        match &self.origin {
            FunctionOrigin::Free => self.name.clone(),
            FunctionOrigin::Method { self_ty } => format!("{}::{}", self_ty, self.name),
        }
    }

    /// Trimmed text of an absolute source line, if that line is covered.
    pub fn source_line(&self, line: usize) -> Option<&str> {
        let start = self.start_line.known()?;
        let lines = self.source_lines.as_ref()?;
        lines.get(line.checked_sub(start)?).map(|l| l.trim())
    }
}

/// The assignment forms that can anchor diagnostics.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AssignmentKind {
    /// `let x = e;`
    Let,
    /// `let x: T = e;`
    Annotated,
    /// `x = e;` or `x = y = e;`
    Assign,
    /// `x += e;` and the other compound operators.
    Compound,
}

impl AssignmentKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            AssignmentKind::Let => "let",
            AssignmentKind::Annotated => "annotated",
            AssignmentKind::Assign => "assignment",
            AssignmentKind::Compound => "compound",
        }
    }
}

/// An original top-level statement that assigns to at least one watched name.
#[derive(Debug, Clone)]
pub struct AnchorStatement {
    /// Position in the original body.
    pub index: usize,
    pub kind: AssignmentKind,
    /// Watched names assigned by the statement, in source order.
    pub targets: Vec<String>,
    pub line: LineRef,
    pub text: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DiagnosticKind {
    Blank,
    Context,
    Source,
    Value,
    Type,
    Inline,
}

impl DiagnosticKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            DiagnosticKind::Blank => "blank",
            DiagnosticKind::Context => "context",
            DiagnosticKind::Source => "source",
            DiagnosticKind::Value => "value",
            DiagnosticKind::Type => "type",
            DiagnosticKind::Inline => "inline",
        }
    }
}

/// A synthesized diagnostic statement. Never mutated after insertion.
#[derive(Debug, Clone)]
pub struct InjectedStatement {
    pub kind: DiagnosticKind,
    pub target: String,
    /// Index of the anchor in `RewrittenBody::anchors`.
    pub anchor: usize,
    /// `anchor.line + i` for the i-th statement (1-based) after that anchor.
    pub line: LineRef,
    pub stmt: syn::Stmt,
}

/// Output of the tree rewriter.
#[derive(Debug, Clone)]
pub struct RewrittenBody {
    pub block: syn::Block,
    pub anchors: Vec<AnchorStatement>,
    pub injected: Vec<InjectedStatement>,
}
