pub mod auth;
pub mod change;
pub mod cli;
pub mod commit_range;
pub mod config;
pub mod docker;
pub mod error;
pub mod git;
pub mod helm;
pub mod image;
pub mod image_name;
pub mod pipeline;
pub mod process;

#[cfg(test)]
pub(crate) mod testing;

pub use error::{Error, Result};
