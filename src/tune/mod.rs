//! Host file formats: packed tunes, uncompressed streams and JSON dumps

pub mod header;
pub mod json;
pub mod reader;
pub mod writer;

pub use header::{StreamHeader, TuneHeader};
pub use json::TuneJson;
pub use reader::{load_file, TuneFile, TuneReader};
pub use writer::{save_packed, save_stream, TuneWriter};
