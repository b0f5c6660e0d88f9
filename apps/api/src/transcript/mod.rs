//! Conversation transcripts: fetching them from the voice provider and
//! normalizing them into turns.

pub mod fetcher;
pub mod normalizer;
pub mod search;

pub use fetcher::{ElevenLabsClient, TranscriptSource, TranscriptState};
