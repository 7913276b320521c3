pub mod engine;

pub use engine::{FormEngine, SubmissionOutcome};
