//! Data models for harvested review comments.

pub mod comment;

pub use comment::{CommentRecord, FieldSpec, HeaderStyle, DEFAULT_RATING, FIELDS};
