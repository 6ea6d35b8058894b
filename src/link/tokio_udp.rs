//! tokio UDP pair link
//!
//! Carries tether frames over a connected UDP socket pair, framing each
//! datagram as `[src: 6][dst: 6][payload]` so the link-layer addressing
//! the protocol expects survives a transport that has none. Handy for
//! running a controller and a target against each other on a desktop
//! without any radio.
//!
//! The [`UdpLink`] half lives inside the [`SyncStack`] and only enqueues;
//! [`run_udp_link`] owns the socket, drains the queue, reports each send
//! outcome back to the stack, and feeds received frames in.
//!
//! [`SyncStack`]: crate::sync_stack::SyncStack

use std::io;

use log::{trace, warn};
use mutex::ScopedRawMutex;
use tokio::{net::UdpSocket, select, sync::mpsc};

use crate::{
    address::LinkAddr,
    link::{Link, LinkSendError, SendStatus},
    sync_stack::SyncStack,
};

/// Frame header: source then destination address.
pub const FRAME_HDR_LEN: usize = 12;

/// Receive buffer size, comfortably above the largest tether payload.
const MAX_FRAME_LEN: usize = 256;

pub struct UdpLink {
    local: LinkAddr,
    tx: mpsc::UnboundedSender<Outgoing>,
}

pub struct Outgoing {
    dst: LinkAddr,
    frame: Vec<u8>,
}

/// Create the in-stack link half and the queue the worker drains.
pub fn new_udp_link(local: LinkAddr) -> (UdpLink, mpsc::UnboundedReceiver<Outgoing>) {
    let (tx, rx) = mpsc::unbounded_channel();
    (UdpLink { local, tx }, rx)
}

// ---- impl UdpLink ----

impl UdpLink {
    fn enqueue(&mut self, dst: LinkAddr, payload: &[u8]) -> Result<(), LinkSendError> {
        let mut frame = Vec::with_capacity(FRAME_HDR_LEN + payload.len());
        frame.extend_from_slice(&self.local.0);
        frame.extend_from_slice(&dst.0);
        frame.extend_from_slice(payload);
        self.tx
            .send(Outgoing { dst, frame })
            .map_err(|_| LinkSendError::LinkDown)
    }
}

impl Link for UdpLink {
    fn send_broadcast(&mut self, channel: LinkAddr, frame: &[u8]) -> Result<(), LinkSendError> {
        self.enqueue(channel, frame)
    }

    fn send_unicast(&mut self, dst: LinkAddr, frame: &[u8]) -> Result<(), LinkSendError> {
        self.enqueue(dst, frame)
    }
}

/// Drive one stack's UDP socket until the link handle is dropped or the
/// socket dies.
///
/// The socket must already be bound and connected to its peer. A fatal
/// socket error is surfaced to the caller; per-datagram send errors are
/// converted into [`SendStatus::Failed`] reports instead, which is what
/// lets the protocol evict unreachable peers.
pub async fn run_udp_link<R: ScopedRawMutex>(
    stack: &SyncStack<R, UdpLink>,
    socket: UdpSocket,
    mut rx: mpsc::UnboundedReceiver<Outgoing>,
) -> io::Result<()> {
    let mut buf = [0u8; MAX_FRAME_LEN];
    loop {
        select! {
            out = rx.recv() => {
                let Some(Outgoing { dst, frame }) = out else {
                    // stack dropped its link half, nothing left to drive
                    return Ok(());
                };
                match socket.send(&frame).await {
                    Ok(_) => stack.handle_send_report(dst, SendStatus::Sent),
                    Err(e) => {
                        warn!("udp send to {dst} failed: {e}");
                        stack.handle_send_report(dst, SendStatus::Failed);
                    }
                }
            }
            res = socket.recv(&mut buf) => {
                let n = res?;
                let Some((src, dst, payload)) = split_frame(&buf[..n]) else {
                    trace!("runt frame ({n} bytes), ignoring");
                    continue;
                };
                stack.handle_frame(src, dst, payload);
            }
        }
    }
}

fn split_frame(frame: &[u8]) -> Option<(LinkAddr, LinkAddr, &[u8])> {
    if frame.len() < FRAME_HDR_LEN {
        return None;
    }
    let mut src = [0u8; 6];
    let mut dst = [0u8; 6];
    src.copy_from_slice(&frame[..6]);
    dst.copy_from_slice(&frame[6..12]);
    Some((LinkAddr(src), LinkAddr(dst), &frame[FRAME_HDR_LEN..]))
}
