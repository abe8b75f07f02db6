pub mod chunking;
pub mod model;
pub mod parse;

pub use chunking::{reassemble, Chunker};
pub use model::{Article, CharSpan, Chunk};
pub use parse::{normalize_identifier, Corpus};
