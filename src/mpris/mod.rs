//! MPRIS producer: module declarations and re-exports.

pub mod connection;
pub mod watcher;

pub use watcher::{PlayerWatcher, WatcherCommand};
