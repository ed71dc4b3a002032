//! HTTP handlers for submissions and stored records.

pub mod records;
pub mod submission;
