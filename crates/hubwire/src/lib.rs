//! Host-side protocol stack for LEGO-style programmable hubs.
//!
//! # Crate Structure
//!
//! - [`frame`]: COBS framing, XOR masking, packetization and padded CRC32
//! - [`message`]: Typed messages, the type-byte registry and device records
//! - [`peer`]: Request/response exchange and program upload (behind `peer` feature)

/// Re-export frame types.
pub mod frame {
    pub use hubwire_frame::*;
}

/// Re-export message types.
pub mod message {
    pub use hubwire_message::*;
}

/// Re-export exchange types (requires `peer` feature).
#[cfg(feature = "peer")]
pub mod peer {
    pub use hubwire_peer::*;
}
