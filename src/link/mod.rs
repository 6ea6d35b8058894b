//! The Link
//!
//! The [`SyncStack`] is generic over a "Link", the adapter for whatever
//! connectionless datagram transport the node actually has. A link only
//! has to do two things: put a broadcast frame on a discovery channel, and
//! put a unicast frame on the air towards one peer.
//!
//! Everything else flows the other way, as explicit calls into the stack:
//! received frames go to [`SyncStack::handle_frame`] and asynchronous
//! send-completion reports go to [`SyncStack::handle_send_report`]. There
//! are no process-global callbacks; a link implementation is constructed
//! with (or spawned next to) a reference to the stack it feeds.
//!
//! Both send methods are fire-and-forget: `Ok(())` means the link accepted
//! the frame, not that it arrived. Delivery failures surface later as a
//! [`SendStatus::Failed`] report, which is the protocol's only recovery
//! trigger.
//!
//! [`SyncStack`]: crate::sync_stack::SyncStack
//! [`SyncStack::handle_frame`]: crate::sync_stack::SyncStack::handle_frame
//! [`SyncStack::handle_send_report`]: crate::sync_stack::SyncStack::handle_send_report

use crate::address::LinkAddr;

pub mod null;

#[cfg(feature = "tokio-std")]
pub mod tokio_udp;

/// An error from a [`Link`] send method.
#[cfg_attr(feature = "defmt-v1", derive(defmt::Format))]
#[derive(Debug, PartialEq, Eq)]
#[non_exhaustive]
pub enum LinkSendError {
    /// The link is not up (unplugged, worker gone, not initialized)
    LinkDown,
    /// The link has no way to reach the requested destination
    NoRouteToDest,
    /// The link's outgoing queue or radio slots are full
    LinkFull,
}

/// Outcome of one datagram send, reported asynchronously by the transport.
#[cfg_attr(feature = "defmt-v1", derive(defmt::Format))]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SendStatus {
    Sent,
    Failed,
}

pub trait ConstInit {
    const INIT: Self;
}

pub trait Link {
    /// Broadcast `frame` on the given discovery channel.
    fn send_broadcast(&mut self, channel: LinkAddr, frame: &[u8]) -> Result<(), LinkSendError>;

    /// Unicast `frame` to one peer.
    fn send_unicast(&mut self, dst: LinkAddr, frame: &[u8]) -> Result<(), LinkSendError>;
}
