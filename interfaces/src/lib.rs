pub mod defs;

pub use defs::{
    CandidateItem, ChunkOutcome, DeliveryChunk, DigestRequest, DigestResult, MarkupDialect,
};
