mod event;

extern crate proc_macro;

use proc_macro::TokenStream;
use syn::{parse_macro_input, DeriveInput};

/// Derives the [`eventline::Event`] trait for an enum or struct.
///
/// `event_type()` is the variant name (enums) or the type's own name
/// (structs). Fields marked `#[tag]` are collected into the tag set
/// returned by `tags()`, converted to their tag value with `ToString`.
///
/// # Example
///
/// ```rust
/// use eventline_macros::Event;
///
/// #[derive(Debug, Event)]
/// enum WalletEvent {
///     Opened {
///         #[tag]
///         wallet_id: String,
///         owner: String,
///     },
///     Deposited {
///         #[tag]
///         wallet_id: String,
///         amount: i64,
///     },
/// }
/// ```
#[proc_macro_derive(Event, attributes(tag))]
pub fn event(input: TokenStream) -> TokenStream {
    let ast = parse_macro_input!(input as DeriveInput);
    match event::event_inner(&ast) {
        Ok(tokens) => tokens.into(),
        Err(err) => err.to_compile_error().into(),
    }
}
