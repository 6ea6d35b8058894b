//! Wire payloads
//!
//! Three payload shapes travel over the link:
//!
//! 1. [`Hello`] — the short identifying message exchanged on the discovery
//!    channels, postcard-encoded.
//! 2. [`Report`] — the target's input snapshot, 80 bytes packed.
//! 3. [`Command`] — the controller's command snapshot, 12 bytes packed.
//!
//! Receivers dispatch on payload length, so the three encoded sizes must
//! never collide. This is asserted by a unit test below.
//!
//! The snapshot records are packed by hand rather than with postcard:
//! their layout is byte-exact (fixed field widths, natural order, no gaps,
//! little-endian), which varint encoding cannot express.

use serde::{Deserialize, Serialize};

use crate::Role;

/// Magic prefix of a [`Hello`], shared by both roles.
pub const HELLO_MAGIC: [u8; 4] = *b"TTHR";

/// The identifying message broadcast on a discovery channel.
#[cfg_attr(feature = "defmt-v1", derive(defmt::Format))]
#[derive(Serialize, Deserialize, Clone, Copy, Debug, PartialEq, Eq)]
pub struct Hello {
    pub magic: [u8; 4],
    pub role: Role,
}

/// A target's input snapshot: one bit per logical input in the `inputs`
/// block, caller-defined order, plus a general-purpose block.
#[cfg_attr(feature = "defmt-v1", derive(defmt::Format))]
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Report {
    pub inputs: [u8; 16],
    pub data: [u8; 64],
}

/// A controller's command snapshot.
#[cfg_attr(feature = "defmt-v1", derive(defmt::Format))]
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Command {
    pub main_id: u8,
    pub sub_id: u8,
    pub index1: u8,
    pub index2: u8,
    pub value: f32,
    pub value_int: i32,
}

// ---- impl Hello ----

impl Hello {
    /// Encoded size of a [`Hello`]: the fixed magic plus one discriminant
    /// byte. Must stay distinct from [`Report::LEN`] and [`Command::LEN`].
    pub const ENCODED_LEN: usize = 5;

    pub const fn new(role: Role) -> Self {
        Self {
            magic: HELLO_MAGIC,
            role,
        }
    }

    /// Encode into `buf`, returning the filled prefix.
    pub fn encode<'a>(&self, buf: &'a mut [u8]) -> Option<&'a [u8]> {
        postcard::to_slice(self, buf).ok().map(|b| &*b)
    }

    /// Decode a frame that is expected to be a discovery message.
    ///
    /// Returns `None` for anything that does not carry the magic — such
    /// frames are noise on a shared broadcast domain, not errors.
    pub fn decode(frame: &[u8]) -> Option<Self> {
        let hello = postcard::from_bytes::<Self>(frame).ok()?;
        if hello.magic != HELLO_MAGIC {
            return None;
        }
        Some(hello)
    }
}

// ---- impl Report ----

impl Report {
    /// Encoded size on the wire.
    pub const LEN: usize = 80;
    /// Number of addressable input bits in the `inputs` block.
    pub const INPUT_BITS: usize = 128;

    pub const fn zeroed() -> Self {
        Self {
            inputs: [0; 16],
            data: [0; 64],
        }
    }

    /// Set one input bit. Bits are packed LSB-first within each byte,
    /// in whatever order the scanning collaborator chooses to call this.
    /// Out-of-range indices are ignored.
    #[inline]
    pub fn set_input(&mut self, idx: usize, high: bool) {
        if idx >= Self::INPUT_BITS {
            return;
        }
        let mask = 1u8 << (idx % 8);
        if high {
            self.inputs[idx / 8] |= mask;
        } else {
            self.inputs[idx / 8] &= !mask;
        }
    }

    #[inline]
    pub fn input(&self, idx: usize) -> bool {
        if idx >= Self::INPUT_BITS {
            return false;
        }
        self.inputs[idx / 8] & (1 << (idx % 8)) != 0
    }

    pub fn to_bytes(&self) -> [u8; Self::LEN] {
        let mut out = [0u8; Self::LEN];
        out[..16].copy_from_slice(&self.inputs);
        out[16..].copy_from_slice(&self.data);
        out
    }

    /// Decode from a received payload. `None` unless the length matches
    /// exactly.
    pub fn from_slice(frame: &[u8]) -> Option<Self> {
        if frame.len() != Self::LEN {
            return None;
        }
        let mut out = Self::zeroed();
        out.inputs.copy_from_slice(&frame[..16]);
        out.data.copy_from_slice(&frame[16..]);
        Some(out)
    }
}

// ---- impl Command ----

impl Command {
    /// Encoded size on the wire.
    pub const LEN: usize = 12;

    pub const fn zeroed() -> Self {
        Self {
            main_id: 0,
            sub_id: 0,
            index1: 0,
            index2: 0,
            value: 0.0,
            value_int: 0,
        }
    }

    /// Pack in natural field order, little-endian, no gaps.
    pub fn to_bytes(&self) -> [u8; Self::LEN] {
        let mut out = [0u8; Self::LEN];
        out[0] = self.main_id;
        out[1] = self.sub_id;
        out[2] = self.index1;
        out[3] = self.index2;
        out[4..8].copy_from_slice(&self.value.to_le_bytes());
        out[8..12].copy_from_slice(&self.value_int.to_le_bytes());
        out
    }

    pub fn from_bytes(bytes: &[u8; Self::LEN]) -> Self {
        let mut f = [0u8; 4];
        let mut i = [0u8; 4];
        f.copy_from_slice(&bytes[4..8]);
        i.copy_from_slice(&bytes[8..12]);
        Self {
            main_id: bytes[0],
            sub_id: bytes[1],
            index1: bytes[2],
            index2: bytes[3],
            value: f32::from_le_bytes(f),
            value_int: i32::from_le_bytes(i),
        }
    }

    /// Decode from a received payload. `None` unless the length matches
    /// exactly.
    pub fn from_slice(frame: &[u8]) -> Option<Self> {
        let bytes: &[u8; Self::LEN] = frame.try_into().ok()?;
        Some(Self::from_bytes(bytes))
    }
}
