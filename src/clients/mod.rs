//! Typed access to a running [`TransletService`](crate::lifecycle::TransletService).

pub mod translet_client;
pub mod translator;

pub use translet_client::*;
pub use translator::*;
