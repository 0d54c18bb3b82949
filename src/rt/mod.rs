//! Runtime support called by instrumented code.
//!
//! Every diagnostic goes through [`emit`], which writes one line to standard
//! output, or to the buffer of an enclosing [`capture`] on the same thread.

pub mod format;

use std::any::type_name;
use std::cell::RefCell;
use std::fmt::Debug;
use std::future::Future;
use std::io::Write;
use std::time::Duration;

pub use format::{set_colors, truncate, truncate_source, SOURCE_BUDGET};
use format::{green, prefix};

thread_local! {
    static CAPTURED: RefCell<Option<Vec<String>>> = const { RefCell::new(None) };
}

/// Print one diagnostic line.
pub fn emit(line: impl Into<String>) {
    let line = line.into();
    let pending = CAPTURED.with(|cell| match cell.borrow_mut().as_mut() {
        Some(buffer) => {
            buffer.push(line);
            None
        }
        None => Some(line),
    });
    if let Some(line) = pending {
        let mut out = std::io::stdout().lock();
        let _ = writeln!(out, "{}", line);
    }
}

/// Run `f`, collecting the lines it emits on this thread instead of printing
/// them. An inner capture keeps its own lines; the outer buffer is restored
/// afterwards, also when `f` panics.
pub fn capture<R>(f: impl FnOnce() -> R) -> (R, Vec<String>) {
    struct Restore(Option<Vec<String>>);

    impl Drop for Restore {
        fn drop(&mut self) {
            let previous = self.0.take();
            CAPTURED.with(|cell| *cell.borrow_mut() = previous);
        }
    }

    let previous = CAPTURED.with(|cell| cell.borrow_mut().replace(Vec::new()));
    let restore = Restore(previous);
    let result = f();
    let lines = CAPTURED
        .with(|cell| cell.borrow_mut().take())
        .unwrap_or_default();
    drop(restore);
    (result, lines)
}

/// Pins the output type of an async block so `?` inside it can infer the
/// error conversion.
pub fn expect_output<T, F: Future<Output = T>>(future: F) -> F {
    future
}

pub fn render<T: Debug + ?Sized>(value: &T) -> String {
    format!("{:?}", value)
}

/// `render` followed by `truncate`.
pub fn render_value<T: Debug + ?Sized>(value: &T, max_len: Option<usize>) -> String {
    truncate(&render(value), max_len)
}

/// Runs the traced body. Taking `FnOnce` lets the body hand back borrows of
/// the arguments it captured.
pub fn call_once<R>(body: impl FnOnce() -> R) -> R {
    body()
}

/// A value in the summary block, whether or not its type is `Debug`.
///
/// `(&Shown(&value)).render_shown(max_len)` resolves to [`ShowDebug`] when
/// the type implements `Debug` and to [`ShowOpaque`] otherwise, which prints
/// `<type name>`. Both traits must be in scope at the call.
pub struct Shown<'a, T: ?Sized>(pub &'a T);

pub trait ShowDebug {
    fn render_shown(&self, max_len: Option<usize>) -> String;
}

impl<T: Debug + ?Sized> ShowDebug for Shown<'_, T> {
    fn render_shown(&self, max_len: Option<usize>) -> String {
        render_value(self.0, max_len)
    }
}

pub trait ShowOpaque {
    fn render_shown(&self, max_len: Option<usize>) -> String;
}

impl<T: ?Sized> ShowOpaque for &Shown<'_, T> {
    fn render_shown(&self, max_len: Option<usize>) -> String {
        truncate(&format!("<{}>", type_name::<T>()), max_len)
    }
}

/// `a = 1, b = "x"` for the summary block, from already rendered values.
pub fn render_args(args: &[(&str, String)]) -> String {
    if args.is_empty() {
        return "()".to_string();
    }
    args.iter()
        .map(|(name, value)| format!("{} = {}", name, value))
        .collect::<Vec<_>>()
        .join(", ")
}

pub fn blank() {
    emit("");
}

pub fn context(function: &str, line: u32) {
    emit(prefix(function, Some(line), None));
}

pub fn source(text: &str) {
    emit(format!("    '{}'", truncate_source(text, SOURCE_BUDGET)));
}

pub fn value<T: Debug + ?Sized>(name: &str, value: &T, max_len: Option<usize>) {
    emit(format!("    {} = {}", name, green(&render_value(value, max_len))));
}

pub fn type_of<T: ?Sized>(name: &str, _value: &T) {
    emit(format!("    type({}) = {}", name, green(type_name::<T>())));
}

/// The one-line form used when verbose output is off.
pub fn inline<T: Debug + ?Sized>(
    function: &str,
    line: u32,
    name: &str,
    value: &T,
    max_len: Option<usize>,
) {
    emit(format!(
        "{} - {} {} {}",
        prefix(function, Some(line), None),
        green(name),
        green("="),
        green(&render_value(value, max_len)),
    ));
}

/// The block printed after a traced call returns.
#[derive(Debug, Clone)]
pub struct Summary<'a> {
    pub function: &'a str,
    pub first_line: u32,
    pub last_line: u32,
    pub signature: Option<&'a str>,
    pub args: Option<String>,
    pub result: Option<String>,
    pub elapsed: Option<Duration>,
}

impl Summary<'_> {
    pub fn lines(&self) -> Vec<String> {
        let mut lines = vec![
            String::new(),
            prefix(self.function, Some(self.first_line), Some(self.last_line)),
        ];
        if let Some(signature) = self.signature {
            lines.push(format!("    signature: {}", signature));
        }
        if let Some(args) = &self.args {
            lines.push(format!("    args: {}", green(args)));
        }
        if let Some(result) = &self.result {
            lines.push(format!("    returned: {}", green(result)));
        }
        if let Some(elapsed) = self.elapsed {
            let seconds = format!("{:.8} seconds", elapsed.as_secs_f64());
            lines.push(format!("    execution time: {}", green(&seconds)));
        }
        lines.push(String::new());
        lines
    }

    pub fn emit(&self) {
        for line in self.lines() {
            emit(line);
        }
    }
}
