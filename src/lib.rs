//! Financial Query Orchestrator
//!
//! Answers natural-language (Korean) stock questions:
//! - Classifies a query into a structured intent with rule-based patterns
//! - Dispatches it to market-data and disclosure capabilities, in parallel or as a pipeline
//! - Merges the partial results into one view
//! - Renders a final answer through a pluggable summarizer
//!
//! CLASSIFY → DISPATCH → AGGREGATE → SUMMARIZE

pub mod agent;
pub mod aggregator;
pub mod api;
pub mod classifier;
pub mod collaborators;
pub mod config;
pub mod dispatcher;
pub mod error;
pub mod extractors;
pub mod models;
pub mod summarizer;

pub use error::Result;

// Re-export common types
pub use classifier::IntentClassifier;
pub use models::*;
