//! Gift Hunter — watches gift listings, filters them, prints or buys.

pub mod channels;
pub mod config;
pub mod error;
pub mod gateway;
pub mod logging;
pub mod pipeline;
