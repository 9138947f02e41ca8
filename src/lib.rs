//! CodeXpert analysis: asynchronous AI code review jobs.

pub mod analysis;
pub mod config;
pub mod error;
pub mod llm;
