// Application layer: drives the locate, rewrite and assemble steps for both
// the `#[trace]` attribute and the command line.

use proc_macro2::TokenStream;
use quote::ToTokens;
use syn::{ImplItem, ImplItemFn, Item, ItemFn};
use tracing::{debug, info};

use crate::api::dto::RewriteReportDto;
use crate::domain::ast::{FunctionOrigin, LocatedFunction, SourceFile};
use crate::domain::options::TraceOptions;
use crate::domain::report::InstrumentedFunction;
use crate::error::{Error, Result};
use crate::infrastructure::locator::type_ident;
use crate::infrastructure::rewrite_cache::{CachedRewrite, RewriteCache};
use crate::infrastructure::{SynSourceLocator, SynTreeRewriter, WrapperExecutor};
use crate::ports::{CallExecutor, SourceLocator, TreeRewriter};

pub struct TraceUsecase<'a> {
    pub locator: &'a dyn SourceLocator,
    pub rewriter: &'a dyn TreeRewriter,
    pub executor: &'a dyn CallExecutor,
    pub cache: Option<&'a RewriteCache>,
}

impl Default for TraceUsecase<'_> {
    fn default() -> Self {
        Self {
            locator: &SynSourceLocator,
            rewriter: &SynTreeRewriter,
            executor: &WrapperExecutor,
            cache: None,
        }
    }
}

/// A whole source file with one function replaced by its traced wrapper.
#[derive(Debug, Clone)]
pub struct InstrumentedSource {
    pub source: String,
    pub report: RewriteReportDto,
    pub cached: bool,
}

impl<'a> TraceUsecase<'a> {
    pub fn with_cache(cache: &'a RewriteCache) -> Self {
        Self {
            cache: Some(cache),
            ..Self::default()
        }
    }

    pub fn instrument_located(
        &self,
        function: &LocatedFunction,
        options: &TraceOptions,
    ) -> Result<InstrumentedFunction> {
        let body = self.rewriter.rewrite(function, options)?;
        self.executor.assemble(function, body, options)
    }

    /// The attribute path: the function arrives as tokens.
    pub fn instrument_item(&self, item: ItemFn, options: &TraceOptions) -> Result<InstrumentedFunction> {
        let located = SynSourceLocator.locate_item(item);
        self.instrument_located(&located, options)
    }

    pub fn locate(&self, file: &SourceFile, target: &str) -> Result<LocatedFunction> {
        self.locator.locate(file, target)
    }

    /// Rewrite `target` inside `file` and print the resulting file.
    pub fn instrument_source(
        &self,
        file: &SourceFile,
        target: &str,
        options: &TraceOptions,
    ) -> Result<InstrumentedSource> {
        let key = RewriteCache::key(&file.text, target, options);
        if let Some(hit) = self.cache.and_then(|cache| cache.get(&key)) {
            info!(function = target, "reusing cached rewrite");
            return Ok(InstrumentedSource {
                source: hit.source,
                report: hit.report,
                cached: true,
            });
        }

        let located = self.locator.locate(file, target)?;
        let instrumented = self.instrument_located(&located, options)?;
        let report = RewriteReportDto::from(&instrumented.report);

        let mut ast = syn::parse_file(&file.text).map_err(|source| Error::Parse {
            path: file.path.clone(),
            source,
        })?;
        if !splice(&mut ast.items, &located, &instrumented.item) {
            return Err(Error::SourceUnavailable {
                name: located.qualified_name(),
                hint: format!(" in {} after rewriting", file.path.display()),
            });
        }
        let source = prettyplease::unparse(&ast);
        debug!(bytes = source.len(), "printed instrumented source");

        if let Some(cache) = self.cache {
            cache.put(&key, CachedRewrite::new(&key, source.clone(), report.clone()))?;
        }
        Ok(InstrumentedSource {
            source,
            report,
            cached: false,
        })
    }
}

impl TraceUsecase<'_> {
    /// Find the one file among `files` that defines `target` and rewrite it.
    pub fn instrument_workspace<'f>(
        &self,
        files: &'f [SourceFile],
        target: &str,
        options: &TraceOptions,
    ) -> Result<(&'f SourceFile, InstrumentedSource)> {
        let (index, _) = SynSourceLocator.locate_in(files, target)?;
        let file = &files[index];
        debug!(path = %file.path.display(), function = target, "target found in workspace");
        Ok((file, self.instrument_source(file, target, options)?))
    }
}

/// Replace the located function in `items`. Returns whether it was found.
fn splice(items: &mut [Item], located: &LocatedFunction, wrapper: &ItemFn) -> bool {
    for item in items.iter_mut() {
        match (item, &located.origin) {
            (Item::Fn(func), FunctionOrigin::Free) if func.sig.ident == located.name => {
                *func = wrapper.clone();
                return true;
            }
            (Item::Impl(imp), FunctionOrigin::Method { self_ty }) => {
                if type_ident(&imp.self_ty).as_deref() != Some(self_ty.as_str()) {
                    continue;
                }
                for impl_item in imp.items.iter_mut() {
                    if let ImplItem::Fn(method) = impl_item {
                        if method.sig.ident == located.name {
                            *method = ImplItemFn {
                                attrs: wrapper.attrs.clone(),
                                vis: wrapper.vis.clone(),
                                defaultness: method.defaultness,
                                sig: wrapper.sig.clone(),
                                block: (*wrapper.block).clone(),
                            };
                            return true;
                        }
                    }
                }
            }
            (Item::Mod(module), _) => {
                if let Some((_, nested)) = module.content.as_mut() {
                    if splice(nested, located, wrapper) {
                        return true;
                    }
                }
            }
            _ => {}
        }
    }
    false
}

/// Expansion of `#[trace(...)]`. Errors become `compile_error!` next to the
/// untouched item so the rest of the crate still type-checks.
pub fn expand_attribute(args: TokenStream, item: TokenStream) -> TokenStream {
    let options = match syn::parse2::<TraceOptions>(args) {
        Ok(options) => options,
        Err(e) => return with_error(e, item),
    };
    let function = match syn::parse2::<ItemFn>(item.clone()) {
        Ok(function) => function,
        Err(e) => return with_error(e, item),
    };
    let span = function.sig.ident.span();
    match TraceUsecase::default().instrument_item(function, &options) {
        Ok(instrumented) => instrumented.item.into_token_stream(),
        Err(e) => with_error(syn::Error::new(span, e.to_string()), item),
    }
}

fn with_error(error: syn::Error, item: TokenStream) -> TokenStream {
    let mut tokens = error.to_compile_error();
    tokens.extend(item);
    tokens
}

#[cfg(test)]
mod tests {
    use super::*;
    use quote::quote;

    const SOURCE: &str = "\
use std::fmt;

pub fn example(a: i32, b: i32) -> i32 {
    let mut a = a + 1;
    let b: i32 = b + 1;
    a += 1;
    a + b
}

struct Counter(u32);

impl Counter {
    fn bump(&mut self) -> u32 {
        let next = self.0 + 1;
        self.0 = next;
        next
    }
}
";

    #[test]
    fn test_instrument_source_reparses() {
        let file = SourceFile::new("lib.rs", SOURCE);
        let out = TraceUsecase::default()
            .instrument_source(&file, "example", &TraceOptions::watching(["a", "b"]))
            .unwrap();
        let reparsed = syn::parse_file(&out.source).unwrap();
        assert_eq!(reparsed.items.len(), 4);
        assert!(out.source.contains("::constable::rt::Summary"));
        assert_eq!(out.report.anchors.len(), 3);
        assert_eq!(out.report.injected_count(), 15);
        assert!(!out.cached);
    }

    #[test]
    fn test_method_is_spliced_into_its_impl() {
        let file = SourceFile::new("lib.rs", SOURCE);
        let out = TraceUsecase::default()
            .instrument_source(&file, "Counter::bump", &TraceOptions::watching(["next"]))
            .unwrap();
        assert_eq!(out.report.function, "Counter::bump");
        assert_eq!(out.report.anchors.len(), 1);
        let reparsed = syn::parse_file(&out.source).unwrap();
        let traced = reparsed.items.iter().any(|item| match item {
            Item::Impl(imp) => imp
                .items
                .iter()
                .any(|i| i.to_token_stream().to_string().contains("constable")),
            _ => false,
        });
        assert!(traced);
    }

    #[test]
    fn test_second_run_hits_cache() {
        let cache = RewriteCache::in_memory();
        let usecase = TraceUsecase::with_cache(&cache);
        let file = SourceFile::new("lib.rs", SOURCE);
        let options = TraceOptions::watching(["a"]);

        let first = usecase.instrument_source(&file, "example", &options).unwrap();
        let second = usecase.instrument_source(&file, "example", &options).unwrap();
        assert!(!first.cached);
        assert!(second.cached);
        assert_eq!(first.source, second.source);
        assert_eq!(cache.len(), 1);
    }

    #[test]
    fn test_workspace_picks_defining_file() {
        let files = vec![
            SourceFile::new("a.rs", "fn other() {}"),
            SourceFile::new("b.rs", SOURCE),
            SourceFile::new("c.rs", "fn broken( {"),
        ];
        let (file, out) = TraceUsecase::default()
            .instrument_workspace(&files, "example", &TraceOptions::watching(["b"]))
            .unwrap();
        assert_eq!(file.path.to_str(), Some("b.rs"));
        assert_eq!(out.report.anchors.len(), 1);
    }

    #[test]
    fn test_missing_target_is_reported() {
        let file = SourceFile::new("lib.rs", SOURCE);
        let err = TraceUsecase::default()
            .instrument_source(&file, "nowhere", &TraceOptions::default())
            .unwrap_err();
        assert!(matches!(err, Error::SourceUnavailable { .. }));
    }

    #[test]
    fn test_expand_attribute_bad_option_keeps_item() {
        let out = expand_attribute(
            quote!(max_len = "wide"),
            quote!(fn f() -> u8 { 1 }),
        )
        .to_string();
        assert!(out.contains("compile_error"));
        assert!(out.contains("fn f"));
    }

    #[test]
    fn test_expand_attribute_const_fn_unsupported() {
        let out = expand_attribute(quote!(), quote!(const fn f() -> u8 { 1 })).to_string();
        assert!(out.contains("compile_error"));
        assert!(out.contains("const fn"));
    }

    #[test]
    fn test_expand_attribute_wraps_body() {
        let out = expand_attribute(
            quote!(x),
            quote!(fn f(y: u8) -> u8 { let x = y * 2; x }),
        );
        let item: ItemFn = syn::parse2(out).unwrap();
        let text = item.to_token_stream().to_string();
        assert!(text.contains("__constable_result"));
        assert!(text.contains("rt :: context"));
    }
}
