//! `#[trace]`: print watched assignments and a call summary at run time.
//!
//! ```ignore
//! use constable_macros::trace;
//!
//! #[trace(a, b, max_len = 40)]
//! fn example(a: i32, b: i32) -> i32 {
//!     let mut a = a + 1;
//!     let b: i32 = b + 1;
//!     a += 1;
//!     a + b
//! }
//! ```
//!
//! Bare names and string literals are the watched variables. `key = value`
//! pairs set `exec_info`, `show_args`, `show_result`, `show_timing`,
//! `verbose`, `use_spaces` and `max_len`. A bad option is a compile error.
//! The crate using the attribute must depend on `constable` as well.

use proc_macro::TokenStream;

#[proc_macro_attribute]
pub fn trace(args: TokenStream, item: TokenStream) -> TokenStream {
    let args = proc_macro2::TokenStream::from(args);
    let item = proc_macro2::TokenStream::from(item);
    constable::expand_attribute(args, item).into()
}
