//! Process lifecycle.
//!
//! ```text
//! main.rs:     CLI → config → logging → metrics → bind → serve
//! signals.rs:  SIGINT / SIGTERM → Shutdown::trigger
//! shutdown.rs: server listener fires → stop accepting → drain for the
//!              grace period → abandon whatever is still in flight
//! ```
//!
//! Any startup error is fatal and exits non-zero.

pub mod shutdown;
pub mod signals;

pub use shutdown::{Shutdown, ShutdownListener};
pub use signals::{spawn_signal_handler, wait_for_signal};
