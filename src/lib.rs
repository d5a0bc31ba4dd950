//! Financial Query Router
//!
//! A decision-routing agent for financial questions. Per query it chooses
//! among a knowledge-base search, live market data and a deterministic
//! calculation engine, extracts typed arguments from free text, runs each
//! step under a timeout and composes one answer from the results.
//!
//! LOOP:
//! THINKING → ACTING → OBSERVING → (THINKING | DONE | FAILED)

pub mod agent;
pub mod calc;
pub mod classifier;
pub mod composer;
pub mod config;
pub mod error;
pub mod execution;
pub mod extractor;
pub mod gemini;
pub mod memory;
pub mod models;
pub mod planner;
pub mod tools;

pub use error::{Result, RouterError};

// Re-export common types
pub use agent::ReasoningRouter;
pub use config::RouterConfig;
pub use models::*;
