//! Helpers shared by component build entry points
//!
//! - [files]: string replacement in files and directory copies
//! - [docker]: image naming, build, release, lint and vulnerability checks
//! - [python]: pipenv environments, linters, pytest, distributions and PyPI uploads
//! - [mkdocs]: markdown linting, documentation builds and GitHub pages deployment

pub mod docker;
pub mod files;
pub mod mkdocs;
pub mod python;

pub use files::{copy, replace_in_files};
