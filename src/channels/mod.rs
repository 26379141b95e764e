//! Intake sources for gift links.

pub mod channel;
pub mod cli;
pub mod feed;

pub use channel::*;
pub use cli::StdinListener;
pub use feed::FeedListener;
