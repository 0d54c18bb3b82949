// Source locator: finds a function by name and recovers its text and lines.

use rayon::prelude::*;
use syn::spanned::Spanned;
use syn::{ImplItem, Item, ItemFn, Type};
use tracing::{debug, warn};

use crate::domain::ast::{FunctionOrigin, LineRef, LocatedFunction, SourceFile};
use crate::error::{Error, Result};
use crate::ports::SourceLocator;

pub struct SynSourceLocator;

impl SourceLocator for SynSourceLocator {
    fn locate(&self, file: &SourceFile, target: &str) -> Result<LocatedFunction> {
        let ast = syn::parse_file(&file.text).map_err(|source| Error::Parse {
            path: file.path.clone(),
            source,
        })?;

        let mut found = Vec::new();
        collect_matches(&ast.items, target, &mut found);
        let (item, origin) = match found.len() {
            0 => {
                return Err(Error::SourceUnavailable {
                    name: target.to_string(),
                    hint: format!(" in {}", file.path.display()),
                })
            }
            1 => found.remove(0),
            _ => {
                let paths = found
                    .iter()
                    .map(|(item, origin)| qualify(&item.sig.ident.to_string(), origin))
                    .collect();
                return Err(Error::AmbiguousTarget {
                    name: target.to_string(),
                    paths,
                });
            }
        };

        let located = located_from_text(item, origin, &file.text)?;
        debug!(
            function = %located.qualified_name(),
            start = %located.start_line,
            end = %located.end_line,
            def = %located.def_line,
            "located function"
        );
        Ok(located)
    }
}

impl SynSourceLocator {
    /// Locate a function that arrives as tokens, without its file text.
    pub fn locate_item(&self, item: ItemFn) -> LocatedFunction {
        let name = item.sig.ident.to_string();
        let start_line = LineRef::from_span(item.span());
        let end_line = LineRef::from_span(item.block.brace_token.span.close());
        let def_line = LineRef::from_span(item.sig.fn_token.span);
        LocatedFunction {
            name,
            origin: FunctionOrigin::Free,
            start_line,
            end_line,
            def_line,
            source_lines: None,
            def_offset: None,
            item,
        }
    }

    /// Search many files at once. Files that do not parse are skipped.
    /// Returns the index of the file that defines `target`.
    ///
    /// Syntax trees are not `Send`, so the parallel pass only reports which
    /// files match and the winner is located again on this thread.
    pub fn locate_in(&self, files: &[SourceFile], target: &str) -> Result<(usize, LocatedFunction)> {
        let hits: Vec<usize> = files
            .par_iter()
            .enumerate()
            .filter_map(|(index, file)| match self.locate(file, target) {
                Ok(_) => Some(Ok(index)),
                Err(Error::SourceUnavailable { .. }) => None,
                Err(Error::Parse { path, source }) => {
                    warn!("skipping {}: {}", path.display(), source);
                    None
                }
                Err(e) => Some(Err(e)),
            })
            .collect::<Result<Vec<_>>>()?;

        match hits.as_slice() {
            [] => Err(Error::SourceUnavailable {
                name: target.to_string(),
                hint: format!(" in {} source files", files.len()),
            }),
            [index] => Ok((*index, self.locate(&files[*index], target)?)),
            _ => Err(Error::AmbiguousTarget {
                name: target.to_string(),
                paths: hits
                    .iter()
                    .map(|index| files[*index].path.display().to_string())
                    .collect(),
            }),
        }
    }
}

fn qualify(name: &str, origin: &FunctionOrigin) -> String {
    match origin {
        FunctionOrigin::Free => name.to_string(),
        FunctionOrigin::Method { self_ty } => format!("{}::{}", self_ty, name),
    }
}

/// `Type::method` matches methods of impls for `Type`; a bare name matches
/// free functions first and methods only when no free function has it.
fn collect_matches(items: &[Item], target: &str, out: &mut Vec<(ItemFn, FunctionOrigin)>) {
    let (type_name, fn_name) = match target.rsplit_once("::") {
        Some((ty, name)) => (Some(ty), name),
        None => (None, target),
    };

    let mut methods = Vec::new();
    collect_items(items, type_name, fn_name, out, &mut methods);
    if type_name.is_some() || out.is_empty() {
        out.extend(methods);
    }
}

fn collect_items(
    items: &[Item],
    type_name: Option<&str>,
    fn_name: &str,
    free: &mut Vec<(ItemFn, FunctionOrigin)>,
    methods: &mut Vec<(ItemFn, FunctionOrigin)>,
) {
    for item in items {
        match item {
            Item::Fn(func) if type_name.is_none() && func.sig.ident == fn_name => {
                free.push((func.clone(), FunctionOrigin::Free));
            }
            Item::Impl(imp) => {
                let self_ty = match type_ident(&imp.self_ty) {
                    Some(ident) => ident,
                    None => continue,
                };
                if type_name.map_or(false, |t| t != self_ty) {
                    continue;
                }
                for impl_item in &imp.items {
                    if let ImplItem::Fn(method) = impl_item {
                        if method.sig.ident == fn_name {
                            let func = ItemFn {
                                attrs: method.attrs.clone(),
                                vis: method.vis.clone(),
                                sig: method.sig.clone(),
                                block: Box::new(method.block.clone()),
                            };
                            methods.push((func, FunctionOrigin::Method { self_ty: self_ty.clone() }));
                        }
                    }
                }
            }
            Item::Mod(module) => {
                if let Some((_, nested)) = &module.content {
                    collect_items(nested, type_name, fn_name, free, methods);
                }
            }
            _ => {}
        }
    }
}

/// Last path segment of an impl's self type.
pub(crate) fn type_ident(ty: &Type) -> Option<String> {
    match ty {
        Type::Path(path) => path.path.segments.last().map(|s| s.ident.to_string()),
        _ => None,
    }
}

fn located_from_text(item: ItemFn, origin: FunctionOrigin, text: &str) -> Result<LocatedFunction> {
    let name = item.sig.ident.to_string();
    let start = item.span().start().line;
    let end = item.block.brace_token.span.close().end().line;
    let lines: Vec<&str> = text.lines().collect();
    if start == 0 || end < start || end > lines.len() {
        return Err(Error::SourceUnavailable {
            name,
            hint: " (span locations do not cover the function)".to_string(),
        });
    }

    let source_lines: Vec<String> = lines[start - 1..end].iter().map(|l| l.to_string()).collect();
    let def_offset =
        definition_offset(&source_lines).ok_or_else(|| Error::DefinitionNotFound { name: name.clone() })?;

    Ok(LocatedFunction {
        name,
        origin,
        start_line: LineRef::Known(start),
        end_line: LineRef::Known(end),
        def_line: LineRef::Known(start + def_offset),
        source_lines: Some(source_lines),
        def_offset: Some(def_offset),
        item,
    })
}

/// Index of the first line whose text, past attributes and qualifiers,
/// begins with the `fn` keyword.
pub fn definition_offset(lines: &[String]) -> Option<usize> {
    lines.iter().position(|line| is_definition_line(line))
}

fn is_definition_line(line: &str) -> bool {
    let mut rest = line.trim_start();
    loop {
        if rest.starts_with("#[") {
            match rest.find(']') {
                Some(end) => rest = rest[end + 1..].trim_start(),
                None => return false,
            }
            continue;
        }
        match strip_qualifier(rest) {
            Some(stripped) => rest = stripped.trim_start(),
            None => break,
        }
    }
    match rest.strip_prefix("fn") {
        Some(after) => after.is_empty() || after.starts_with(char::is_whitespace),
        None => false,
    }
}

fn strip_qualifier(text: &str) -> Option<&str> {
    for keyword in ["pub", "const", "async", "unsafe", "default", "extern"] {
        let rest = match text.strip_prefix(keyword) {
            Some(rest) => rest,
            None => continue,
        };
        if keyword == "pub" && rest.starts_with('(') {
            return rest.find(')').map(|close| &rest[close + 1..]);
        }
        if keyword == "extern" {
            let after = rest.trim_start();
            if let Some(abi) = after.strip_prefix('"') {
                return abi.find('"').map(|close| &abi[close + 1..]);
            }
        }
        if rest.starts_with(char::is_whitespace) {
            return Some(rest);
        }
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;

    const SOURCE: &str = r#"use std::fmt;

/// Adds things.
#[inline]
pub fn add(a: i32, b: i32) -> i32 {
    let mut a = a + 1;
    a += b;
    a
}

struct Counter {
    n: u32,
}

impl Counter {
    pub(crate) fn bump(&mut self) -> u32 {
        self.n += 1;
        self.n
    }
}

mod inner {
    fn nested() {}
}
"#;

    fn file() -> SourceFile {
        SourceFile::new("lib.rs", SOURCE)
    }

    #[test]
    fn test_locates_free_function_with_attributes() {
        let located = SynSourceLocator.locate(&file(), "add").unwrap();
        assert_eq!(located.start_line, LineRef::Known(3));
        assert_eq!(located.end_line, LineRef::Known(9));
        assert_eq!(located.def_offset, Some(2));
        assert_eq!(located.def_line, LineRef::Known(5));
        assert_eq!(located.source_line(6), Some("let mut a = a + 1;"));
        assert_eq!(located.origin, FunctionOrigin::Free);
    }

    #[test]
    fn test_locates_method_by_qualified_name() {
        let located = SynSourceLocator.locate(&file(), "Counter::bump").unwrap();
        assert_eq!(located.qualified_name(), "Counter::bump");
        assert_eq!(located.def_line, LineRef::Known(16));
        assert!(located.item.sig.receiver().is_some());
    }

    #[test]
    fn test_bare_name_falls_back_to_methods() {
        let located = SynSourceLocator.locate(&file(), "bump").unwrap();
        assert_eq!(
            located.origin,
            FunctionOrigin::Method { self_ty: "Counter".to_string() }
        );
    }

    #[test]
    fn test_locates_inside_inline_module() {
        let located = SynSourceLocator.locate(&file(), "nested").unwrap();
        assert_eq!(located.start_line, LineRef::Known(23));
    }

    #[test]
    fn test_missing_function_is_source_unavailable() {
        let err = SynSourceLocator.locate(&file(), "missing").unwrap_err();
        assert!(matches!(err, Error::SourceUnavailable { .. }), "{:?}", err);
    }

    #[test]
    fn test_unparsable_file_is_parse_error() {
        let broken = SourceFile::new("broken.rs", "fn add( {");
        let err = SynSourceLocator.locate(&broken, "add").unwrap_err();
        assert!(matches!(err, Error::Parse { .. }));
    }

    #[test]
    fn test_definition_line_search() {
        let lines: Vec<String> = [
            "/// fn in a doc comment",
            "#[cfg(test)]",
            "pub(crate) async unsafe fn go() {",
            "}",
        ]
        .iter()
        .map(|s| s.to_string())
        .collect();
        assert_eq!(definition_offset(&lines), Some(2));
    }

    #[test]
    fn test_definition_line_forms() {
        assert!(is_definition_line("fn main() {"));
        assert!(is_definition_line("    #[inline] pub fn f() {}"));
        assert!(is_definition_line(r#"pub extern "C" fn f() {}"#));
        assert!(is_definition_line("const fn f() -> u8 { 0 }"));
        assert!(!is_definition_line("let fnord = 1;"));
        assert!(!is_definition_line("// fn commented()"));
    }

    #[test]
    fn test_missing_definition_line_is_an_error() {
        let lines = vec!["#[test]".to_string(), "}".to_string()];
        assert_eq!(definition_offset(&lines), None);
    }

    #[test]
    fn test_one_line_impl_has_no_definition_line() {
        let one_line = SourceFile::new("s.rs", "struct S; impl S { fn m() {} }");
        let err = SynSourceLocator.locate(&one_line, "S::m").unwrap_err();
        assert!(matches!(err, Error::DefinitionNotFound { ref name } if name == "m"), "{:?}", err);
    }

    #[test]
    fn test_locate_in_many_files() {
        let files = vec![
            SourceFile::new("a.rs", "fn one() {}"),
            SourceFile::new("b.rs", "fn two() { let x = 1; }"),
            SourceFile::new("c.rs", "not rust at all {"),
        ];
        let (index, located) = SynSourceLocator.locate_in(&files, "two").unwrap();
        assert_eq!(index, 1);
        assert_eq!(located.name, "two");
    }

    #[test]
    fn test_locate_in_rejects_duplicates() {
        let files = vec![
            SourceFile::new("a.rs", "fn dup() {}"),
            SourceFile::new("b.rs", "fn dup() {}"),
        ];
        let err = SynSourceLocator.locate_in(&files, "dup").unwrap_err();
        assert!(matches!(err, Error::AmbiguousTarget { .. }));
    }

    #[test]
    fn test_locate_item_without_text() {
        let item: ItemFn = syn::parse_str("fn f(a: u8) -> u8 { a }").unwrap();
        let located = SynSourceLocator.locate_item(item);
        assert_eq!(located.name, "f");
        assert!(located.source_lines.is_none());
        assert!(located.def_offset.is_none());
    }
}
