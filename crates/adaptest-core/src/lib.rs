//! adaptest-core — IRT adaptive diagnostic engine.
//!
//! This crate defines the question catalog model, the 3PL psychometric
//! functions, item selection, the diagnostic session state machine and the
//! results/readiness reporting that the rest of adaptest builds on.

pub mod error;
pub mod model;
pub mod parser;
pub mod psychometrics;
pub mod results;
pub mod selector;
pub mod session;
pub mod simulation;
pub mod store;

#[cfg(test)]
mod testing;

pub use error::DiagnosticError;
pub use model::{Catalog, Domain, IrtParams, Question, QuestionBank};
pub use session::{SessionManager, SessionOptions};
