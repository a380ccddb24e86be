//! The CodeQuill orchestration engine.
//!
//! One shared loop implementation for every front end, parameterized by
//! [`codequill_config::RunnerConfig`] — there are deliberately no
//! per-front-end copies with divergent constants.
//!
//! Dependency order (leaves first): [`parser`] → executor (in core) →
//! [`scheduler`] → [`loop_runner`].

pub mod loop_runner;
pub mod parser;
pub mod prompt;
pub mod scheduler;

pub use loop_runner::TaskRunner;
pub use parser::parse_invocations;
pub use scheduler::execute_batch;
