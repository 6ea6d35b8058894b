use core::fmt;

/// A 6-byte link-layer address.
///
/// Addresses are opaque to the protocol: they are only ever compared for
/// equality and handed back to the [`Link`](crate::link::Link) as send
/// destinations.
#[cfg_attr(feature = "defmt-v1", derive(defmt::Format))]
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct LinkAddr(pub [u8; 6]);

/// Discovery channel a searching target broadcasts on.
pub const TARGET_CHANNEL: LinkAddr = LinkAddr([0xFF, 0xFF, 0xFF, 0xFF, 0xFF, 0xFD]);

/// Discovery channel a controller answers on.
pub const CONTROLLER_CHANNEL: LinkAddr = LinkAddr([0xFF, 0xFF, 0xFF, 0xFF, 0xFF, 0xFE]);

// ---- impl LinkAddr ----

impl LinkAddr {
    /// Is this one of the two fixed discovery channels?
    ///
    /// Channel addresses are never valid unicast peers.
    #[inline]
    pub fn is_channel(&self) -> bool {
        *self == TARGET_CHANNEL || *self == CONTROLLER_CHANNEL
    }
}

impl fmt::Display for LinkAddr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let [a, b, c, d, e, g] = self.0;
        write!(f, "{a:02X}:{b:02X}:{c:02X}:{d:02X}:{e:02X}:{g:02X}")
    }
}

impl From<[u8; 6]> for LinkAddr {
    fn from(value: [u8; 6]) -> Self {
        Self(value)
    }
}
