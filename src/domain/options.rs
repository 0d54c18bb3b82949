//! Trace configuration shared by the `#[trace]` attribute, `constable.toml`
//! and the command line.
//!
//! All three sources funnel through [`TraceOptions::apply`], so a bad value is
//! rejected the same way wherever it comes from, before any traced call runs.

use std::collections::BTreeSet;
use std::fmt;

use syn::parse::{Parse, ParseStream};
use syn::punctuated::Punctuated;
use syn::{Expr, Lit, LitStr, Token, UnOp};

use crate::error::{Error, Result};

/// Names of the variables whose assignments get instrumented.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash)]
pub struct WatchSet(BTreeSet<String>);

impl WatchSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, name: impl Into<String>) {
        self.0.insert(name.into());
    }

    pub fn contains(&self, name: &str) -> bool {
        self.0.contains(name)
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn iter(&self) -> impl Iterator<Item = &str> {
        self.0.iter().map(String::as_str)
    }
}

impl<S: Into<String>> FromIterator<S> for WatchSet {
    fn from_iter<I: IntoIterator<Item = S>>(iter: I) -> Self {
        Self(iter.into_iter().map(Into::into).collect())
    }
}

/// A raw option value before it is checked against the key it belongs to.
#[derive(Debug, Clone, PartialEq)]
pub enum OptionValue {
    Bool(bool),
    Int(i64),
    Str(String),
    List(Vec<String>),
    /// Anything else, described for the error message.
    Other(String),
}

impl OptionValue {
    fn kind(&self) -> &str {
        match self {
            OptionValue::Bool(_) => "a boolean",
            OptionValue::Int(_) => "an integer",
            OptionValue::Str(_) => "a string",
            OptionValue::List(_) => "a list",
            OptionValue::Other(kind) => kind,
        }
    }

    /// Interpret a command-line value: `true`/`false`, integers, else text.
    pub fn parse_cli(raw: &str) -> Self {
        match raw {
            "true" => OptionValue::Bool(true),
            "false" => OptionValue::Bool(false),
            _ => raw
                .parse::<i64>()
                .map(OptionValue::Int)
                .unwrap_or_else(|_| OptionValue::Str(raw.to_string())),
        }
    }

    pub fn from_toml(value: &toml::Value) -> Self {
        match value {
            toml::Value::Boolean(b) => OptionValue::Bool(*b),
            toml::Value::Integer(i) => OptionValue::Int(*i),
            toml::Value::String(s) => OptionValue::Str(s.clone()),
            toml::Value::Array(items) => {
                let names: Option<Vec<String>> = items
                    .iter()
                    .map(|v| v.as_str().map(str::to_string))
                    .collect();
                names
                    .map(OptionValue::List)
                    .unwrap_or_else(|| OptionValue::Other("a mixed array".to_string()))
            }
            toml::Value::Float(_) => OptionValue::Other("a float".to_string()),
            toml::Value::Datetime(_) => OptionValue::Other("a datetime".to_string()),
            toml::Value::Table(_) => OptionValue::Other("a table".to_string()),
        }
    }

    fn from_expr(expr: &Expr) -> Self {
        match expr {
            Expr::Lit(lit) => match &lit.lit {
                Lit::Bool(b) => OptionValue::Bool(b.value),
                Lit::Int(i) => i
                    .base10_parse::<i64>()
                    .map(OptionValue::Int)
                    .unwrap_or_else(|_| OptionValue::Other("an out-of-range integer".to_string())),
                Lit::Str(s) => OptionValue::Str(s.value()),
                Lit::Float(_) => OptionValue::Other("a float".to_string()),
                _ => OptionValue::Other("a literal".to_string()),
            },
            Expr::Unary(unary) if matches!(unary.op, UnOp::Neg(_)) => {
                match OptionValue::from_expr(&unary.expr) {
                    OptionValue::Int(i) => OptionValue::Int(-i),
                    other => other,
                }
            }
            Expr::Array(array) => {
                let names: Option<Vec<String>> = array
                    .elems
                    .iter()
                    .map(|e| match e {
                        Expr::Lit(lit) => match &lit.lit {
                            Lit::Str(s) => Some(s.value()),
                            _ => None,
                        },
                        Expr::Path(path) => path.path.get_ident().map(|i| i.to_string()),
                        _ => None,
                    })
                    .collect();
                names
                    .map(OptionValue::List)
                    .unwrap_or_else(|| OptionValue::Other("an array of non-names".to_string()))
            }
            _ => OptionValue::Other("an expression".to_string()),
        }
    }
}

impl fmt::Display for OptionValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            OptionValue::Bool(b) => write!(f, "{}", b),
            OptionValue::Int(i) => write!(f, "{}", i),
            OptionValue::Str(s) => write!(f, "{:?}", s),
            OptionValue::List(items) => write!(f, "{:?}", items),
            OptionValue::Other(kind) => write!(f, "<{}>", kind),
        }
    }
}

/// How a traced function reports itself.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct TraceOptions {
    pub watch: WatchSet,
    /// Print the signature and argument values in the summary block.
    pub show_args: bool,
    /// Print the returned value in the summary block.
    pub show_result: bool,
    /// Print the elapsed wall-clock time in the summary block.
    pub show_timing: bool,
    /// Multi-line block per assignment instead of a single `name = value` line.
    pub verbose: bool,
    /// Blank line before every diagnostic block.
    pub use_spacing: bool,
    pub max_len: Option<usize>,
}

impl Default for TraceOptions {
    fn default() -> Self {
        Self {
            watch: WatchSet::new(),
            show_args: true,
            show_result: true,
            show_timing: true,
            verbose: true,
            use_spacing: true,
            max_len: None,
        }
    }
}

impl TraceOptions {
    pub fn watching<I, S>(names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            watch: names.into_iter().collect(),
            ..Self::default()
        }
    }

    /// Whether the summary block is printed at all.
    pub fn exec_info(&self) -> bool {
        self.show_args || self.show_result || self.show_timing
    }

    pub fn set_exec_info(&mut self, on: bool) {
        self.show_args = on;
        self.show_result = on;
        self.show_timing = on;
    }

    /// Set one option by name.
    pub fn apply(&mut self, key: &str, value: OptionValue) -> Result<()> {
        match key {
            "exec_info" => self.set_exec_info(expect_bool(key, &value)?),
            "show_args" => self.show_args = expect_bool(key, &value)?,
            "show_result" => self.show_result = expect_bool(key, &value)?,
            "show_timing" => self.show_timing = expect_bool(key, &value)?,
            "verbose" => self.verbose = expect_bool(key, &value)?,
            "use_spaces" | "use_spacing" => self.use_spacing = expect_bool(key, &value)?,
            "max_len" => self.max_len = Some(expect_len(key, &value)?),
            "watch" => match value {
                OptionValue::Str(name) => self.watch.insert(name),
                OptionValue::List(names) => {
                    for name in names {
                        self.watch.insert(name);
                    }
                }
                other => {
                    return Err(Error::config(
                        key,
                        format!("expected a name or a list of names, found {}", other.kind()),
                    ))
                }
            },
            _ => return Err(Error::config(key, "unknown option")),
        }
        Ok(())
    }

    /// A stable rendering of every field, used as part of cache keys.
    pub fn fingerprint(&self) -> String {
        let watch: Vec<&str> = self.watch.iter().collect();
        format!(
            "watch={};args={};result={};timing={};verbose={};spacing={};max_len={:?}",
            watch.join(","),
            self.show_args,
            self.show_result,
            self.show_timing,
            self.verbose,
            self.use_spacing,
            self.max_len,
        )
    }
}

fn expect_bool(key: &str, value: &OptionValue) -> Result<bool> {
    match value {
        OptionValue::Bool(b) => Ok(*b),
        other => Err(Error::config(
            key,
            format!("expected a boolean, found {}", other.kind()),
        )),
    }
}

fn expect_len(key: &str, value: &OptionValue) -> Result<usize> {
    match value {
        OptionValue::Int(n) if *n >= 0 => Ok(*n as usize),
        OptionValue::Int(n) => Err(Error::config(key, format!("must not be negative, got {}", n))),
        other => Err(Error::config(
            key,
            format!("must be an integer, found {}", other.kind()),
        )),
    }
}

/// One argument of `#[trace(...)]`: a watched name or `key = value`.
enum TraceArg {
    Name(String),
    Option(syn::Ident, Expr),
}

impl Parse for TraceArg {
    fn parse(input: ParseStream) -> syn::Result<Self> {
        if input.peek(LitStr) {
            let name: LitStr = input.parse()?;
            return Ok(TraceArg::Name(name.value()));
        }
        let ident: syn::Ident = input.parse()?;
        if input.peek(Token![=]) {
            input.parse::<Token![=]>()?;
            let value: Expr = input.parse()?;
            Ok(TraceArg::Option(ident, value))
        } else {
            Ok(TraceArg::Name(ident.to_string()))
        }
    }
}

impl Parse for TraceOptions {
    fn parse(input: ParseStream) -> syn::Result<Self> {
        let args = Punctuated::<TraceArg, Token![,]>::parse_terminated(input)?;
        let mut options = TraceOptions::default();
        for arg in args {
            match arg {
                TraceArg::Name(name) => options.watch.insert(name),
                TraceArg::Option(key, value) => {
                    options
                        .apply(&key.to_string(), OptionValue::from_expr(&value))
                        .map_err(|e| syn::Error::new_spanned(&value, e.to_string()))?;
                }
            }
        }
        Ok(options)
    }
}
