//! CLI command implementations
//!
//! `run` opens a board through the backend registry and drives the
//! sequencer; `list-backends` prints what the binary was built with.

mod list;
mod run;

pub use list::list_backends;
pub use run::{run, Console};
