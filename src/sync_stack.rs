//! The Synchronization Engine
//!
//! The [`SyncStack`] is the core of tether. It is intended to be placed in
//! a `static` variable for the duration of your application, and is driven
//! from three directions:
//!
//! 1. The control loop calls [`tick`] once per cycle with a monotonic
//!    millisecond timestamp; the stack decides whether that cycle needs a
//!    discovery broadcast, a unicast sync send, or nothing at all.
//! 2. The transport feeds every received datagram into [`handle_frame`],
//!    possibly from interrupt/callback context.
//! 3. The transport reports each send outcome into [`handle_send_report`];
//!    a failure evicts the peer and the protocol falls back to discovery.
//!
//! All shared state lives behind one [`BlockingMutex`], so the receive
//! path can never tear a snapshot out from under the send path. On top of
//! that, a command-application guard is consulted by the target send
//! path: contention skips the cycle, it never blocks and it is never an
//! error.
//!
//! [`tick`]: SyncStack::tick
//! [`handle_frame`]: SyncStack::handle_frame
//! [`handle_send_report`]: SyncStack::handle_send_report

use log::{debug, info, trace, warn};
use mutex::{BlockingMutex, ConstInit, ScopedRawMutex};

use crate::{
    Role,
    address::{CONTROLLER_CHANNEL, LinkAddr, TARGET_CHANNEL},
    link::{self, Link, SendStatus},
    peer_table::{MAX_PEERS, Peer, PeerTable},
    wire::{Command, Hello, Report},
};

/// Runtime tuning for a [`SyncStack`].
#[cfg_attr(feature = "defmt-v1", derive(defmt::Format))]
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Config {
    /// Cadence of discovery broadcasts while searching, in milliseconds.
    pub hello_period_ms: u64,
}

/// Discovery state, derived solely from the peer count.
#[cfg_attr(feature = "defmt-v1", derive(defmt::Format))]
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum PairState {
    /// Only the broadcast pseudo-peer is known.
    Searching,
    /// At least one real peer is known.
    Paired,
}

/// The tether protocol engine.
pub struct SyncStack<R: ScopedRawMutex, L: Link> {
    inner: BlockingMutex<R, SyncInner<L>>,
}

struct SyncInner<L: Link> {
    link: L,
    role: Role,
    config: Config,
    peers: PeerTable,
    report_out: Report,
    report_last_sent: Report,
    report_last_recv: Report,
    cmd_out: Command,
    cmd_recv: [u8; Command::LEN],
    /// Set while an incoming command is being applied; the target send
    /// path skips its cycle instead of reading a half-written snapshot.
    applying_cmd: bool,
    last_hello_ms: Option<u64>,
}

// ---- impl Config ----

impl Config {
    pub const fn new() -> Self {
        Self {
            hello_period_ms: 100,
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        Self::new()
    }
}

// ---- impl SyncStack ----

impl<R, L> SyncStack<R, L>
where
    R: ScopedRawMutex + ConstInit,
    L: Link + link::ConstInit,
{
    /// Create a new [`SyncStack`] with the link's const initializer and
    /// the default [`Config`].
    ///
    /// ## Example
    ///
    /// ```rust
    /// use mutex::raw_impls::cs::CriticalSectionRawMutex as CSRMutex;
    /// use tether::Role;
    /// use tether::link::null::NullLink;
    /// use tether::sync_stack::SyncStack;
    ///
    /// static STACK: SyncStack<CSRMutex, NullLink> = SyncStack::new(Role::Target);
    /// ```
    pub const fn new(role: Role) -> Self {
        Self::new_with_link(role, L::INIT)
    }
}

impl<R, L> SyncStack<R, L>
where
    R: ScopedRawMutex + ConstInit,
    L: Link,
{
    /// Create a new [`SyncStack`] around an already-constructed link.
    pub const fn new_with_link(role: Role, link: L) -> Self {
        Self::new_with_config(role, link, Config::new())
    }

    pub const fn new_with_config(role: Role, link: L, config: Config) -> Self {
        Self {
            inner: BlockingMutex::new(SyncInner::new(role, link, config)),
        }
    }
}

impl<R, L> SyncStack<R, L>
where
    R: ScopedRawMutex,
    L: Link,
{
    /// Run one control cycle.
    ///
    /// `now_ms` only needs to be monotonic; it gates the discovery
    /// broadcast cadence. Sync sends are gated by state, not time.
    pub fn tick(&self, now_ms: u64) {
        self.inner.with_lock(|inner| inner.tick(now_ms));
    }

    /// Feed one received datagram into the protocol.
    ///
    /// Unrecognized destinations and payload lengths are ignored; a shared
    /// broadcast domain is full of frames that are not for us.
    pub fn handle_frame(&self, src: LinkAddr, dst: LinkAddr, frame: &[u8]) {
        self.inner.with_lock(|inner| inner.handle_frame(src, dst, frame));
    }

    /// Feed one asynchronous send-completion report into the protocol.
    ///
    /// A failure evicts the peer, which is the protocol's only recovery
    /// mechanism; success reports are ignored.
    pub fn handle_send_report(&self, dst: LinkAddr, status: SendStatus) {
        if status == SendStatus::Sent {
            return;
        }
        debug!("send to {dst} failed");
        self.inner.with_lock(|inner| inner.evict(dst));
    }

    /// Explicitly add a peer, as if it had just been discovered.
    pub fn add_peer(&self, addr: LinkAddr) {
        self.inner.with_lock(|inner| inner.learn_peer(addr));
    }

    /// Explicitly remove a peer. Clears all cached snapshot state, so a
    /// re-added peer starts a fresh session.
    pub fn remove_peer(&self, addr: LinkAddr) {
        self.inner.with_lock(|inner| inner.evict(addr));
    }

    /// Mutate the outgoing report in place (target role). Typically called
    /// by the input-scanning collaborator before each [`tick`].
    ///
    /// [`tick`]: Self::tick
    pub fn update_report<F: FnOnce(&mut Report)>(&self, f: F) {
        self.inner.with_lock(|inner| f(&mut inner.report_out));
    }

    /// Replace the outgoing command (controller role).
    pub fn set_command(&self, cmd: Command) {
        self.inner.with_lock(|inner| inner.cmd_out = cmd);
    }

    /// The most recently received report (controller role). One shared
    /// buffer, last-write-wins across all targets; a slow reader observes
    /// only the newest value.
    pub fn received_report(&self) -> Report {
        self.inner.with_lock(|inner| inner.report_last_recv)
    }

    /// The live received command (target role).
    pub fn command(&self) -> Command {
        Command::from_bytes(&self.command_bytes())
    }

    /// Raw bytes of the live received command, for byte-exact change
    /// detection by the consumer.
    pub fn command_bytes(&self) -> [u8; Command::LEN] {
        self.inner.with_lock(|inner| inner.cmd_recv)
    }

    pub fn role(&self) -> Role {
        self.inner.with_lock(|inner| inner.role)
    }

    /// Number of known peers, including the broadcast pseudo-peer.
    pub fn peer_count(&self) -> usize {
        self.inner.with_lock(|inner| inner.peers.len())
    }

    pub fn pair_state(&self) -> PairState {
        if self.peer_count() >= 2 {
            PairState::Paired
        } else {
            PairState::Searching
        }
    }

    /// The counterpart this target syncs to, once discovered.
    pub fn counterpart(&self) -> Option<LinkAddr> {
        self.inner.with_lock(|inner| inner.peers.counterpart())
    }

    /// A snapshot of the unicast peers, in discovery order. Diagnostic;
    /// the broadcast pseudo-peer is excluded.
    pub fn unicast_peers(&self) -> heapless::Vec<Peer, MAX_PEERS> {
        self.inner
            .with_lock(|inner| inner.peers.unicast_peers().copied().collect())
    }

    /// Access the contained [`Link`].
    ///
    /// The mutex is locked for the duration of the closure, inhibiting
    /// all other use of the stack.
    pub fn with_link<F: FnOnce(&mut L) -> U, U>(&self, f: F) -> U {
        self.inner.with_lock(|inner| f(&mut inner.link))
    }
}

// ---- impl SyncInner ----

impl<L: Link> SyncInner<L> {
    const fn new(role: Role, link: L, config: Config) -> Self {
        Self {
            link,
            role,
            config,
            peers: PeerTable::new(role.channel()),
            report_out: Report::zeroed(),
            report_last_sent: Report::zeroed(),
            report_last_recv: Report::zeroed(),
            cmd_out: Command::zeroed(),
            cmd_recv: [0; Command::LEN],
            applying_cmd: false,
            last_hello_ms: None,
        }
    }

    fn tick(&mut self, now_ms: u64) {
        if self.role == Role::Target && self.peers.len() == 1 {
            // Searching: ping on the fixed cadence, nothing else. A lost
            // broadcast is healed by the next one.
            let due = match self.last_hello_ms {
                None => true,
                Some(last) => now_ms.wrapping_sub(last) >= self.config.hello_period_ms,
            };
            if due {
                self.last_hello_ms = Some(now_ms);
                self.send_hello();
            }
            return;
        }

        match self.role {
            Role::Controller => {
                // The command is the shared source of truth: one unicast
                // per peer per cycle, whether or not it changed, so a
                // late joiner sees the current value promptly.
                let frame = self.cmd_out.to_bytes();
                for peer in self.peers.unicast_peers() {
                    trace!("cmd -> {}", peer.addr);
                    if let Err(e) = self.link.send_unicast(peer.addr, &frame) {
                        warn!("cmd send to {} refused: {e:?}", peer.addr);
                    }
                }
            }
            Role::Target => {
                if self.applying_cmd {
                    trace!("receive in progress, skipping this cycle");
                    return;
                }
                let Some(dst) = self.peers.counterpart() else {
                    return;
                };
                // Byte-exact diff against the last copy the link accepted.
                // A snapshot returning to all-zero is still a change.
                if self.report_out == self.report_last_sent {
                    return;
                }
                let frame = self.report_out.to_bytes();
                match self.link.send_unicast(dst, &frame) {
                    Ok(()) => self.report_last_sent = self.report_out,
                    Err(e) => warn!("report send to {dst} refused: {e:?}"),
                }
            }
        }
    }

    fn handle_frame(&mut self, src: LinkAddr, dst: LinkAddr, frame: &[u8]) {
        match self.role {
            Role::Controller => {
                if dst == TARGET_CHANNEL {
                    match Hello::decode(frame) {
                        Some(hello) if hello.role == Role::Target => {
                            // Reply in kind, then learn the sender. There
                            // is no confirmation round-trip: added on
                            // first sight is paired.
                            self.send_hello();
                            self.learn_peer(src);
                        }
                        _ => trace!("{src}: ignoring frame on target channel"),
                    }
                }
                if frame.len() == Report::LEN {
                    if let Some(report) = Report::from_slice(frame) {
                        if report != self.report_last_recv {
                            debug!("{src}: report updated");
                            self.report_last_recv = report;
                        }
                    }
                }
            }
            Role::Target => {
                if dst == CONTROLLER_CHANNEL {
                    match Hello::decode(frame) {
                        Some(hello) if hello.role == Role::Controller => {
                            self.learn_peer(src);
                        }
                        _ => trace!("{src}: ignoring frame on controller channel"),
                    }
                }
                if frame.len() == Command::LEN && self.peers.len() >= 2 {
                    self.applying_cmd = true;
                    let mut raw = [0u8; Command::LEN];
                    raw.copy_from_slice(frame);
                    if raw != self.cmd_recv {
                        debug!("{src}: command updated");
                        self.cmd_recv = raw;
                    }
                    self.applying_cmd = false;
                }
            }
        }
    }

    fn send_hello(&mut self) {
        let mut buf = [0u8; 16];
        let hello = Hello::new(self.role);
        let Some(frame) = hello.encode(&mut buf) else {
            return;
        };
        let channel = self.role.channel();
        if let Err(e) = self.link.send_broadcast(channel, frame) {
            warn!("hello on {channel} refused: {e:?}");
        }
    }

    fn learn_peer(&mut self, addr: LinkAddr) {
        if self.peers.contains(addr) {
            return;
        }
        let was_searching = self.peers.len() == 1;
        match self.peers.add(addr) {
            Some(peer) => {
                debug!("peer added: {} (index {})", peer.addr, peer.index);
                if self.role == Role::Target && self.peers.counterpart().is_none() {
                    self.peers.set_counterpart(addr);
                }
                if was_searching {
                    info!("paired with {}", peer.addr);
                }
            }
            None => warn!("peer table full, ignoring {addr}"),
        }
    }

    fn evict(&mut self, addr: LinkAddr) {
        if addr.is_channel() {
            // Index 0 is never evicted; a lost broadcast heals on the
            // next discovery ping.
            warn!("not evicting broadcast pseudo-peer {addr}");
            return;
        }
        // A removed peer's session state must not leak into a later peer
        // at the same address.
        self.reset_snapshots();
        if let Some(peer) = self.peers.remove(addr) {
            debug!("peer evicted: {} (index {})", peer.addr, peer.index);
            if self.peers.len() == 1 {
                info!("lost last peer, searching");
            } else if self.role == Role::Target && self.peers.counterpart().is_none() {
                // Lost the counterpart but still know another controller:
                // promote the oldest remaining peer.
                let next = self.peers.unicast_peers().next().map(|p| p.addr);
                if let Some(next) = next {
                    debug!("counterpart now {next}");
                    self.peers.set_counterpart(next);
                }
            }
        }
    }

    fn reset_snapshots(&mut self) {
        self.report_out = Report::zeroed();
        self.report_last_sent = Report::zeroed();
        self.report_last_recv = Report::zeroed();
        self.cmd_out = Command::zeroed();
        self.cmd_recv = [0; Command::LEN];
    }
}
