//! JSONL source and sink stages.

pub mod paths;
pub mod reader;
pub mod writer;

pub use paths::paths_overlap;
pub use reader::JsonlReader;
pub use writer::JsonlWriter;
