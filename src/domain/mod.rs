//! Domain logic - versions, branches and tags independent of git operations

pub mod branch;
pub mod tag;
pub mod version;

pub use branch::Branch;
pub use tag::Tag;
pub use version::Version;
