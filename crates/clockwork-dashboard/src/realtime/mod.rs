pub mod listener;

pub use listener::{ListenerContext, RefreshListener};
