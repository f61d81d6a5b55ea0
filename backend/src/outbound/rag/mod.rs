//! Retrieval-augmented answer service adapter.
//!
//! Implements the `AnswerGenerator` port over HTTP with `reqwest`.

mod dto;
mod http_generator;

pub use http_generator::{DEFAULT_RAG_TIMEOUT, HttpAnswerGenerator};
