//! Terminal front end
//!
//! - `Console` - Line input and banner
//! - `ConsoleSink` - Report Bus sink printing messages (and live streams)

pub mod console;

pub use console::{Console, ConsoleSink};
