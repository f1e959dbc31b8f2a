//! Canonical xAPI statement handling for learnlrs.
//!
//! This crate is the pure, I/O-free half of learnlrs:
//!
//! - **Statement model** - [`Statement`] and friends, serialized as xAPI 1.0.3 JSON
//! - **Verb vocabulary** - [`VerbVocabulary`] mapping short aliases to verb URIs
//! - **Statement engine** - [`StatementBuilder`] turning a [`StatementDraft`]
//!   into a validated canonical statement
//! - **Query filters** - [`QueryFilter`] describing a generic statement query
//!
//! Network concerns (backends, auth, retry) live in `learnlrs-client`.

mod error;

pub mod engine;
pub mod query;
pub mod statement;
pub mod verbs;

pub use engine::{StatementBuilder, StatementDraft};
pub use error::ValidationError;
pub use query::QueryFilter;
pub use statement::{
    Account, Activity, Actor, Context, Level, Score, Statement, Verb, XapiResult,
};
pub use verbs::VerbVocabulary;
