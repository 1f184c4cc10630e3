//! Rendering of batch responses.
//!
//! Both renderers write into a [`core::fmt::Write`] sink so the caller decides whether the
//! text lands on the terminal or in a file.

mod console;
mod json;

pub use console::generate as generate_console;
pub use json::generate as generate_json;
