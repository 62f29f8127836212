//! Wire protocol spoken with the PFC server
//!
//! The only structured traffic is a fixed 3-byte handshake. After it,
//! both directions carry raw byte chunks with no framing.

mod messages;
mod version;

pub use messages::*;
pub use version::*;
