//! Classroom rules for the compatibility exercise.
//!
//! `policy` decides who may create, see, edit and interact with posts in
//! each phase. `survey` is the six-step report wizard and the validation
//! the server re-runs on every submitted report.

pub mod policy;
pub mod survey;

pub use policy::SubmissionDenied;
pub use survey::{Step, SurveyDraft, SurveyError};
