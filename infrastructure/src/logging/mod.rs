//! Transcript logging.
//!
//! [`JsonlTranscriptLogger`] appends relay events to a JSONL file and
//! implements the [`TranscriptLogger`](relay_application::TranscriptLogger)
//! port.

mod jsonl_logger;

pub use jsonl_logger::JsonlTranscriptLogger;
