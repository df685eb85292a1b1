//! CLI command implementations.

pub mod normalize;
pub mod query;
pub mod search;
