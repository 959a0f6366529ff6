//! Project-level concerns: source-tree loading and first-party
//! discovery.

mod discover;
mod loader;

pub use discover::{discover_firstparty, Discovered};
pub use loader::load_directory;
