//! Module sources.
//!
//! Sources supply the text of a module: files on disk, strings already in
//! memory, or one-shot streams that must be buffered before they can be
//! read twice.

pub mod memory;
pub mod path;
pub mod source;

pub use memory::{buffer, ReaderSource, TextSource};
pub use path::FileSource;
pub use source::{read_to_string, Source};
