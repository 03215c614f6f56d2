//! Process lifecycle management

mod shutdown;

pub use shutdown::{ShutdownError, ShutdownSignal};
