//! Keyword index over recorded steps.
//!
//! Not part of compilation: it lets a user find which recorded events mention
//! a page, element or typed value.

pub mod chunker;
pub mod store;

pub use chunker::{TextChunker, DEFAULT_CHUNK_OVERLAP, DEFAULT_CHUNK_SIZE};
pub use store::{Chunk, SearchHit, StepDocument, StepIndex};
