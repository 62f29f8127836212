//! PFC client library
//!
//! Dials a PFC server, answers its 3-byte handshake and runs a duplex
//! session: a payload goes out on every tick while inbound chunks are
//! handed to an [`client::InboundHandler`].

pub mod cli;
pub mod client;
pub mod config;
pub mod error;
pub mod logging;
pub mod protocol;
pub mod source;
pub mod version;

pub use client::{Client, ClientConfig, ShutdownHandle, ShutdownSignal};
pub use error::{Error, Result};
