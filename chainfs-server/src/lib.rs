//! Line-oriented TCP front end for a `chainfs` store.

#[macro_use]
extern crate log;

pub mod protocol;
pub mod server;

pub use crate::server::FileServer;
