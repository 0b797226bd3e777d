pub mod retriever;
pub mod registry;

pub use retriever::{Retriever, PASSAGE_SEPARATOR};
pub use registry::{build_tools, discover, tool_name, ManifestLookup};
