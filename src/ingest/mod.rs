pub mod walker;
pub mod parsers;
pub mod chunker;
pub mod builder;

pub use walker::{content_files, discover_source_dirs, load_directory, read_manifest};
pub use parsers::{DocumentUnit, Parser, ParserRegistry};
pub use chunker::{Chunk, estimate_tokens, split_units};
pub use builder::{chunk_id, collection_dir_name, BuildParams, BuildReport, VectorIndexBuilder};
