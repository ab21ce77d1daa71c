//! Validation in front of every file mutation.
//!
//! Proposals are checked for destructive overwrites, elided content and
//! broken syntax before anything is written. [`EditPipeline::apply_edit`] is
//! the single write path.

mod guard;
mod pipeline;
mod section;
pub mod syntax;

pub use guard::{ElisionMatch, find_elision};
pub use pipeline::{APPLY_EDIT_LABEL, EditPipeline, FileEdit};
pub use syntax::{
    DelimiterChecker, JsonChecker, QuoteStyle, SyntaxChecker, SyntaxCheckers, SyntaxIssue,
};
