//! CLI subcommand implementations.

pub mod lookup;
pub mod normalize;
pub mod validate;
