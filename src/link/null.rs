//! A link that goes nowhere.
//!
//! Useful as a placeholder while bringing a node up, and for examples and
//! tests that only exercise the local side of the protocol.

use crate::address::LinkAddr;

use super::{ConstInit, Link, LinkSendError};

pub struct NullLink {
    _priv: (),
}

impl ConstInit for NullLink {
    const INIT: Self = Self { _priv: () };
}

impl Link for NullLink {
    fn send_broadcast(&mut self, _channel: LinkAddr, _frame: &[u8]) -> Result<(), LinkSendError> {
        Err(LinkSendError::LinkDown)
    }

    fn send_unicast(&mut self, _dst: LinkAddr, _frame: &[u8]) -> Result<(), LinkSendError> {
        Err(LinkSendError::LinkDown)
    }
}
