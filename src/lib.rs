pub mod cli;
pub mod cmdline;
pub mod diagnostic;
pub mod error;
pub mod tree;

pub use error::{Stage, Step, WatchError};
pub use tree::{PlatformWatcher, TreeWatcher, start_and_wait};
