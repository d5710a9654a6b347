//! A single-disk file store: a fixed table of named files whose content lives
//! in chains of fixed-size blocks on a backing device, shared between threads
//! behind one read/write lock.

#[macro_use]
extern crate log;

pub mod alloc;
pub mod config;
pub mod fs;
pub mod io;
pub mod table;

pub use crate::fs::{FsError, Result, StorageManager, Usage};
pub use crate::table::FileEntry;
