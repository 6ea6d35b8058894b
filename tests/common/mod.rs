#![allow(dead_code)]

use std::sync::{Arc, Mutex};

use mutex::raw_impls::cs::CriticalSectionRawMutex;
use tether::{
    Role,
    address::LinkAddr,
    link::{Link, LinkSendError},
    sync_stack::SyncStack,
    wire::Hello,
};

pub const CTRL: LinkAddr = LinkAddr([0xA0, 0, 0, 0, 0, 0x01]);
pub const TGT1: LinkAddr = LinkAddr([0xB0, 0, 0, 0, 0, 0x01]);
pub const TGT2: LinkAddr = LinkAddr([0xB0, 0, 0, 0, 0, 0x02]);
pub const TGT3: LinkAddr = LinkAddr([0xB0, 0, 0, 0, 0, 0x03]);

/// One frame a [`RecordingLink`] was asked to put on the air.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Sent {
    pub dst: LinkAddr,
    pub frame: Vec<u8>,
    pub broadcast: bool,
}

/// A link that records every send for later inspection.
#[derive(Clone, Default)]
pub struct RecordingLink {
    pub sent: Arc<Mutex<Vec<Sent>>>,
}

impl Link for RecordingLink {
    fn send_broadcast(&mut self, channel: LinkAddr, frame: &[u8]) -> Result<(), LinkSendError> {
        self.sent.lock().unwrap().push(Sent {
            dst: channel,
            frame: frame.to_vec(),
            broadcast: true,
        });
        Ok(())
    }

    fn send_unicast(&mut self, dst: LinkAddr, frame: &[u8]) -> Result<(), LinkSendError> {
        self.sent.lock().unwrap().push(Sent {
            dst,
            frame: frame.to_vec(),
            broadcast: false,
        });
        Ok(())
    }
}

pub type TestStack = SyncStack<CriticalSectionRawMutex, RecordingLink>;

pub fn new_stack(role: Role) -> (&'static TestStack, Arc<Mutex<Vec<Sent>>>) {
    let _ = env_logger::builder().is_test(true).try_init();
    let link = RecordingLink::default();
    let log = link.sent.clone();
    let stack = Box::leak(Box::new(SyncStack::new_with_link(role, link)));
    (stack, log)
}

/// Take and clear everything sent so far.
pub fn drain(log: &Arc<Mutex<Vec<Sent>>>) -> Vec<Sent> {
    std::mem::take(&mut *log.lock().unwrap())
}

pub fn hello_frame(role: Role) -> Vec<u8> {
    let mut buf = [0u8; 16];
    Hello::new(role).encode(&mut buf).unwrap().to_vec()
}
