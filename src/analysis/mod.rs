//! Code analysis jobs.
//!
//! Core components:
//! - `model`: job ids, states, and typed analysis results
//! - `register`: in-memory job store with retention sweep
//! - `worker`: `Analyzer`, which submits jobs and resolves them via the LLM
//! - `decode`: fence stripping and reply parsing
//! - `prompts`: instruction templates per analysis kind
//! - `routes`: submit/poll HTTP endpoints

pub mod decode;
pub mod model;
pub mod prompts;
pub mod register;
pub mod routes;
pub mod worker;

pub use model::{AnalysisKind, AnalysisResult, Job, JobId, JobState, JobStatus};
pub use register::{JobRegister, spawn_sweep_task};
pub use routes::analysis_routes;
pub use worker::{Analyzer, GENERIC_FAILURE_MESSAGE};
