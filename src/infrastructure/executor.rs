// Executor: wraps the rewritten body in a function that times the call and
// prints the summary block.
//
// The body runs inside a `move` closure handed to `rt::call_once`, or an
// `async move` block awaited in place for async functions. The `FnOnce`
// bound lets the body return borrows of what it captured. Arguments are
// captured explicitly, free names resolve exactly as they did in the
// original body, and `return`, `?` and panics behave as before.

use proc_macro2::TokenStream;
use quote::{format_ident, quote, quote_spanned};
use syn::visit::{self, Visit};
use syn::{Block, FnArg, Item, ItemFn, Pat, ReturnType, Signature, Type};
use tracing::{debug, info};

use crate::domain::ast::{LocatedFunction, RewrittenBody};
use crate::domain::options::TraceOptions;
use crate::domain::report::{InstrumentedFunction, RewriteReport};
use crate::error::{Error, Result};
use crate::ports::CallExecutor;

pub struct WrapperExecutor;

impl CallExecutor for WrapperExecutor {
    fn assemble(
        &self,
        function: &LocatedFunction,
        body: RewrittenBody,
        options: &TraceOptions,
    ) -> Result<InstrumentedFunction> {
        let item = &function.item;
        let name = function.qualified_name();
        check_supported(&name, &item.sig)?;

        let span = item.sig.fn_token.span;
        let rt = quote_spanned!(span=> ::constable::rt);
        let run = invocation(&item.sig, &body.block);

        let wrapper = if options.exec_info() {
            summarized(function, &name, run, &rt, options)
        } else {
            quote!({ #run })
        };

        let block: Block = syn::parse2(wrapper).map_err(|source| Error::Compile {
            name: name.clone(),
            source,
        })?;
        debug!(function = %name, statements = block.stmts.len(), "assembled wrapper");

        let instrumented = ItemFn {
            attrs: item.attrs.clone(),
            vis: item.vis.clone(),
            sig: item.sig.clone(),
            block: Box::new(block),
        };
        let report = RewriteReport::new(
            name,
            function.start_line,
            function.end_line,
            function.def_line,
            &body,
        );
        info!(
            function = %report.function,
            anchors = report.anchors.len(),
            injected = report.injected.len(),
            "instrumented function"
        );
        Ok(InstrumentedFunction {
            item: instrumented,
            report,
        })
    }
}

fn check_supported(name: &str, sig: &Signature) -> Result<()> {
    let reason = if sig.constness.is_some() {
        "a const fn cannot read the clock"
    } else if sig.variadic.is_some() {
        "variadic functions cannot be wrapped"
    } else {
        return Ok(());
    };
    Err(Error::Unsupported {
        name: name.to_string(),
        reason: reason.to_string(),
    })
}

/// The expression that runs the rewritten body once.
fn invocation(sig: &Signature, block: &Block) -> TokenStream {
    let annotation = return_annotation(&sig.output);
    match (sig.asyncness.is_some(), annotation) {
        (false, Some(ty)) => quote!(::constable::rt::call_once(move || -> #ty #block)),
        (false, None) => quote!(::constable::rt::call_once(move || #block)),
        (true, Some(ty)) => {
            quote!(::constable::rt::expect_output::<#ty, _>(async move #block).await)
        }
        (true, None) => quote!((async move #block).await),
    }
}

/// The declared return type, when it can be written on a closure as is.
fn return_annotation(output: &ReturnType) -> Option<&Type> {
    let ty = match output {
        ReturnType::Default => return None,
        ReturnType::Type(_, ty) => &**ty,
    };
    let mut finder = ElisionFinder { found: false };
    finder.visit_type(ty);
    (!finder.found).then_some(ty)
}

/// Flags types a closure signature cannot restate: elided or anonymous
/// lifetimes, `impl Trait` and `!`.
struct ElisionFinder {
    found: bool,
}

impl<'ast> Visit<'ast> for ElisionFinder {
    fn visit_type_reference(&mut self, reference: &'ast syn::TypeReference) {
        if reference.lifetime.is_none() {
            self.found = true;
        }
        visit::visit_type_reference(self, reference);
    }

    fn visit_lifetime(&mut self, lifetime: &'ast syn::Lifetime) {
        if lifetime.ident == "_" {
            self.found = true;
        }
    }

    fn visit_type_impl_trait(&mut self, _: &'ast syn::TypeImplTrait) {
        self.found = true;
    }

    fn visit_type_never(&mut self, _: &'ast syn::TypeNever) {
        self.found = true;
    }
}

fn summarized(
    function: &LocatedFunction,
    name: &str,
    run: TokenStream,
    rt: &TokenStream,
    options: &TraceOptions,
) -> TokenStream {
    let result = format_ident!("__constable_result");
    let start = format_ident!("__constable_start");
    let elapsed = format_ident!("__constable_elapsed");
    let args = format_ident!("__constable_args");
    let max_len = match options.max_len {
        Some(n) => quote!(::core::option::Option::Some(#n)),
        None => quote!(::core::option::Option::None),
    };

    let (capture_args, signature) = if options.show_args {
        let names = argument_names(&function.item.sig);
        let labels = names.iter().map(|ident| ident.to_string());
        let text = signature_text(&function.item.sig);
        (
            quote! {
                let #args = ::core::option::Option::Some(#rt::render_args(&[
                    #((#labels, (&#rt::Shown(&#names)).render_shown(#max_len))),*
                ]));
            },
            quote!(::core::option::Option::Some(#text)),
        )
    } else {
        (
            quote!(let #args: ::core::option::Option<::std::string::String> = ::core::option::Option::None;),
            quote!(::core::option::Option::None),
        )
    };
    let returned = if options.show_result {
        quote!(::core::option::Option::Some((&#rt::Shown(&#result)).render_shown(#max_len)))
    } else {
        quote!(::core::option::Option::None)
    };
    let timing = if options.show_timing {
        quote!(::core::option::Option::Some(#elapsed))
    } else {
        quote!(::core::option::Option::None)
    };
    let first_line = function.start_line;
    let last_line = function.end_line;

    quote!({
        #[allow(unused_imports)]
        use #rt::{ShowDebug as _, ShowOpaque as _};
        #capture_args
        let #start = ::std::time::Instant::now();
        let #result = #run;
        let #elapsed = #start.elapsed();
        #rt::Summary {
            function: #name,
            first_line: #first_line,
            last_line: #last_line,
            signature: #signature,
            args: #args,
            result: #returned,
            elapsed: #timing,
        }
        .emit();
        #result
    })
}

/// Parameters bound to a plain name. Receivers and destructuring patterns
/// are left out of the `args:` line.
fn argument_names(sig: &Signature) -> Vec<syn::Ident> {
    sig.inputs
        .iter()
        .filter_map(|arg| match arg {
            FnArg::Typed(typed) => match &*typed.pat {
                Pat::Ident(pat) => Some(pat.ident.clone()),
                _ => None,
            },
            FnArg::Receiver(_) => None,
        })
        .collect()
}

/// `fn add(a: i32, b: i32) -> i32`, pretty-printed.
pub(crate) fn signature_text(sig: &Signature) -> String {
    let holder = ItemFn {
        attrs: Vec::new(),
        vis: syn::Visibility::Inherited,
        sig: sig.clone(),
        block: Box::new(Block {
            brace_token: Default::default(),
            stmts: Vec::new(),
        }),
    };
    let file = syn::File {
        shebang: None,
        attrs: Vec::new(),
        items: vec![Item::Fn(holder)],
    };
    let printed = prettyplease::unparse(&file);
    let flat = printed
        .lines()
        .map(str::trim)
        .collect::<Vec<_>>()
        .join(" ");
    flat.trim_end_matches("{}")
        .trim_end()
        .replace("( ", "(")
        .replace(", )", ")")
}
