#![doc = include_str!("../README.md")]
#![cfg_attr(not(any(test, feature = "std")), no_std)]

pub mod address;
pub mod link;
pub mod peer_table;
pub mod sync_stack;
pub mod wire;

pub use address::{CONTROLLER_CHANNEL, LinkAddr, TARGET_CHANNEL};
pub use peer_table::{MAX_PEERS, Peer, PeerTable};
pub use sync_stack::{Config, PairState, SyncStack};
pub use wire::{Command, Hello, Report};

use serde::{Deserialize, Serialize};

/// Which half of the pairing this node is. Immutable for the lifetime of
/// a [`SyncStack`].
///
/// A controller owns the command snapshot and fans it out to every known
/// target, every cycle. A target owns the report snapshot and sends it to
/// its counterpart only when it changes.
#[cfg_attr(feature = "defmt-v1", derive(defmt::Format))]
#[derive(Serialize, Deserialize, Clone, Copy, Debug, PartialEq, Eq)]
pub enum Role {
    Controller,
    Target,
}

// ---- impl Role ----

impl Role {
    /// The discovery channel this role broadcasts its [`Hello`] on.
    ///
    /// Each role pings on its own channel and recognizes pings by the
    /// other role's channel appearing as a frame destination.
    pub const fn channel(&self) -> LinkAddr {
        match self {
            Role::Controller => CONTROLLER_CHANNEL,
            Role::Target => TARGET_CHANNEL,
        }
    }
}
