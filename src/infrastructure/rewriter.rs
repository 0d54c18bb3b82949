// Tree rewriter: splices diagnostic statements after watched assignments.
//
// Only the top-level statements of the function body are scanned. Anything
// inside nested blocks, closures or items is left exactly as written.

use proc_macro2::{Span, TokenStream};
use quote::{quote, quote_spanned};
use syn::ext::IdentExt;
use syn::spanned::Spanned;
use syn::{BinOp, Block, Expr, ExprAssign, Ident, Item, ItemFn, Pat, Stmt};
use tracing::debug;

use crate::domain::ast::{
    AnchorStatement, AssignmentKind, DiagnosticKind, InjectedStatement, LineRef, LocatedFunction,
    RewrittenBody,
};
use crate::domain::options::{TraceOptions, WatchSet};
use crate::error::{Error, Result};
use crate::ports::TreeRewriter;

pub struct SynTreeRewriter;

impl TreeRewriter for SynTreeRewriter {
    fn rewrite(&self, function: &LocatedFunction, options: &TraceOptions) -> Result<RewrittenBody> {
        let display_name = function.qualified_name();
        let original = &function.item.block;
        let mut stmts = Vec::with_capacity(original.stmts.len());
        let mut anchors = Vec::new();
        let mut injected = Vec::new();

        for (index, stmt) in original.stmts.iter().enumerate() {
            let (kind, targets) = match match_assignment(stmt, &options.watch) {
                Some(found) => found,
                None => {
                    stmts.push(stmt.clone());
                    continue;
                }
            };

            let span = stmt.span();
            let line = LineRef::from_span(span);
            let text = statement_text(function, stmt, line);
            let anchor = anchors.len();
            stmts.push(terminated(stmt.clone()));

            let mut offset = 0;
            for target in &targets {
                for (diagnostic, template) in templates(&display_name, target, line, &text, span, options) {
                    offset += 1;
                    let synthesized = synthesize(template)?;
                    injected.push(InjectedStatement {
                        kind: diagnostic,
                        target: target.unraw().to_string(),
                        anchor,
                        line: line.offset(offset),
                        stmt: synthesized.clone(),
                    });
                    stmts.push(synthesized);
                }
            }

            debug!(
                function = %display_name,
                line = %line,
                kind = kind.as_str(),
                inserted = offset,
                "instrumented assignment"
            );
            anchors.push(AnchorStatement {
                index,
                kind,
                targets: targets.iter().map(|t| t.unraw().to_string()).collect(),
                line,
                text,
            });
        }

        Ok(RewrittenBody {
            block: Block {
                brace_token: original.brace_token,
                stmts,
            },
            anchors,
            injected,
        })
    }
}

/// The assignment form of `stmt` and the watched names it assigns.
fn match_assignment(stmt: &Stmt, watch: &WatchSet) -> Option<(AssignmentKind, Vec<Ident>)> {
    let is_watched = |ident: &Ident| watch.contains(&ident.unraw().to_string());
    match stmt {
        Stmt::Local(local) => {
            // `let x;` has no value to show yet.
            local.init.as_ref()?;
            let (ident, kind) = match &local.pat {
                Pat::Ident(pat) if pat.subpat.is_none() => (&pat.ident, AssignmentKind::Let),
                Pat::Type(typed) => match &*typed.pat {
                    Pat::Ident(pat) if pat.subpat.is_none() => (&pat.ident, AssignmentKind::Annotated),
                    _ => return None,
                },
                _ => return None,
            };
            is_watched(ident).then(|| (kind, vec![ident.clone()]))
        }
        Stmt::Expr(Expr::Assign(assign), _) => {
            let mut targets = Vec::new();
            collect_assign_targets(assign, &is_watched, &mut targets);
            (!targets.is_empty()).then_some((AssignmentKind::Assign, targets))
        }
        Stmt::Expr(Expr::Binary(binary), _) if is_compound(&binary.op) => {
            let ident = bare_ident(&binary.left)?;
            is_watched(ident).then(|| (AssignmentKind::Compound, vec![ident.clone()]))
        }
        _ => None,
    }
}

/// Targets of `a = b = e`, left to right.
fn collect_assign_targets(assign: &ExprAssign, is_watched: &dyn Fn(&Ident) -> bool, out: &mut Vec<Ident>) {
    if let Some(ident) = bare_ident(&assign.left) {
        if is_watched(ident) {
            out.push(ident.clone());
        }
    }
    if let Expr::Assign(inner) = &*assign.right {
        collect_assign_targets(inner, is_watched, out);
    }
}

fn bare_ident(expr: &Expr) -> Option<&Ident> {
    match expr {
        Expr::Path(path) if path.qself.is_none() => path.path.get_ident(),
        _ => None,
    }
}

fn is_compound(op: &BinOp) -> bool {
    matches!(
        op,
        BinOp::AddAssign(_)
            | BinOp::SubAssign(_)
            | BinOp::MulAssign(_)
            | BinOp::DivAssign(_)
            | BinOp::RemAssign(_)
            | BinOp::BitXorAssign(_)
            | BinOp::BitAndAssign(_)
            | BinOp::BitOrAssign(_)
            | BinOp::ShlAssign(_)
            | BinOp::ShrAssign(_)
    )
}

/// A tail assignment gets a semicolon so statements can follow it.
fn terminated(stmt: Stmt) -> Stmt {
    match stmt {
        Stmt::Expr(expr, None) => Stmt::Expr(expr, Some(Default::default())),
        other => other,
    }
}

/// The original source line when it is known, otherwise the statement
/// pretty-printed on one line.
fn statement_text(function: &LocatedFunction, stmt: &Stmt, line: LineRef) -> String {
    line.known()
        .and_then(|line| function.source_line(line))
        .map(str::to_string)
        .unwrap_or_else(|| render_statement(stmt))
}

pub(crate) fn render_statement(stmt: &Stmt) -> String {
    let holder = ItemFn {
        attrs: Vec::new(),
        vis: syn::Visibility::Inherited,
        sig: syn::parse_quote!(fn holder()),
        block: Box::new(Block {
            brace_token: Default::default(),
            stmts: vec![stmt.clone()],
        }),
    };
    let file = syn::File {
        shebang: None,
        attrs: Vec::new(),
        items: vec![Item::Fn(holder)],
    };
    prettyplease::unparse(&file)
        .lines()
        .skip(1)
        .take_while(|line| *line != "}")
        .map(str::trim)
        .collect::<Vec<_>>()
        .join(" ")
}

/// The statements to insert after one target, in print order.
fn templates(
    function: &str,
    target: &Ident,
    line: LineRef,
    text: &str,
    span: Span,
    options: &TraceOptions,
) -> Vec<(DiagnosticKind, TokenStream)> {
    let rt = quote_spanned!(span=> ::constable::rt);
    let name = target.unraw().to_string();
    let max_len = match options.max_len {
        Some(n) => quote!(::core::option::Option::Some(#n)),
        None => quote!(::core::option::Option::None),
    };

    let mut out = Vec::with_capacity(5);
    if options.use_spacing {
        out.push((DiagnosticKind::Blank, quote_spanned!(span=> #rt::blank();)));
    }
    if options.verbose {
        out.push((
            DiagnosticKind::Context,
            quote_spanned!(span=> #rt::context(#function, #line);),
        ));
        out.push((DiagnosticKind::Source, quote_spanned!(span=> #rt::source(#text);)));
        out.push((
            DiagnosticKind::Value,
            quote_spanned!(span=> #rt::value(#name, &#target, #max_len);),
        ));
        out.push((
            DiagnosticKind::Type,
            quote_spanned!(span=> #rt::type_of(#name, &#target);),
        ));
    } else {
        out.push((
            DiagnosticKind::Inline,
            quote_spanned!(span=> #rt::inline(#function, #line, #name, &#target, #max_len);),
        ));
    }
    out
}

fn synthesize(template: TokenStream) -> Result<Stmt> {
    syn::parse2::<Stmt>(template.clone()).map_err(|source| Error::TreeMutation {
        template: template.to_string(),
        source,
    })
}
