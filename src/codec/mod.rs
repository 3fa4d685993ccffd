//! Conversion between a [`Tree`](crate::filesystem::Tree) and its flat image.

mod export;
pub mod format;
mod import;
mod layout;

pub use export::{ExportError, encode, export};
pub use import::{Corruption, ImportError, decode, import};
