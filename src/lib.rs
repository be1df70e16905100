pub mod args;
pub mod boundary;
pub mod cli;
pub mod cmdline;
pub mod config;
pub mod dispatcher;
pub mod domain;
pub mod error;
pub mod exit;
pub mod git;
pub mod helpers;
pub mod resolver;
pub mod runner;
pub mod sanitizer;
pub mod ui;

pub use error::{BuildError, Result};
pub use sanitizer::{SanitizedArgs, Sanitizer};
