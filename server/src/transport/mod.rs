//! Transport-neutral framing seam
//!
//! The engine only needs whole frames in both directions. Anything that can
//! read and write discrete byte frames can carry a driver session: the
//! in-process [`channel`] pair used by tests and embedders, or the
//! line-delimited [`tcp`] adapter used by the demo server.

pub mod channel;
pub mod tcp;

use crate::error::TransportError;
use std::future::Future;

pub trait FrameReader: Send + 'static {
    /// Next inbound frame; `Ok(None)` when the peer closed in an orderly way.
    fn read_frame(
        &mut self,
    ) -> impl Future<Output = Result<Option<Vec<u8>>, TransportError>> + Send;
}

pub trait FrameWriter: Send + 'static {
    fn write_frame(
        &mut self,
        frame: &[u8],
    ) -> impl Future<Output = Result<(), TransportError>> + Send;

    /// Flushes and closes the outbound direction. Errors are ignored.
    fn shutdown(&mut self) -> impl Future<Output = ()> + Send;
}
