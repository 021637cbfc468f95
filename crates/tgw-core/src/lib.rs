//! Core of the chat "wrapped" analyzer: domain types, ports and the analysis
//! pipeline (month batching, sentiment, persona matching, cross-chat merge).
//!
//! The LLM and the export format live behind ports; the OpenAI adapter and the
//! CLI are separate crates.

pub mod aggregate;
pub mod batcher;
pub mod catalog;
pub mod config;
pub mod context;
pub mod domain;
pub mod errors;
pub mod export;
pub mod frequency;
pub mod logging;
pub mod oracle;
pub mod persona;
pub mod pipeline;
pub mod sentiment;

#[cfg(test)]
mod testing;

pub use errors::{Error, Result};
