//! Request/response exchange for the hub wire protocol.
//!
//! [`Exchange`] sends framed requests over any `Write` transport, matches
//! inbound responses to the one outstanding request by type, and routes
//! everything else to a notification channel. [`Exchange::upload_program`]
//! runs the chunked upload sequence on top of it.

pub mod error;
pub mod exchange;
pub mod stream;
pub mod upload;

#[cfg(test)]
pub(crate) mod testing;

pub use error::{PeerError, Result};
pub use exchange::{Exchange, ExchangeConfig};
pub use stream::{encode_request, MessageStream};
pub use upload::{plan_chunks, PlannedChunk, UploadOptions, UploadReport, UploadSession};
