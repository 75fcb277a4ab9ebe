//! Persistence layer. The whole state tree is one local JSON document.

pub mod archive;
pub mod json_file;
pub mod memory;
pub mod traits;

pub use archive::{Archive, ImportSummary, export_archive, import_archive};
pub use json_file::JsonFileStore;
pub use memory::MemoryStore;
pub use traits::StateStore;
