//! Reliability bookkeeping for the datagram transport.
//!
//! UDP loses, duplicates, and reorders packets. This crate provides the
//! state that turns it into at-least-once, acknowledged delivery:
//!
//! - [`IdGenerator`] hands out the 16-bit id carried by every outbound
//!   datagram that requires a confirm.
//! - The pending table ([`PendingSend`]) keeps the raw encoded bytes of
//!   each unconfirmed send, so a retransmission is byte-identical to the
//!   original.
//! - [`SeenIds`] remembers recently processed inbound ids so a redelivered
//!   datagram is re-confirmed without re-applying its side effects.
//! - [`ReliabilityManager::sweep`] implements the timeout policy: a due
//!   entry is retransmitted until the retry budget is spent, then removed
//!   and reported as a delivery failure.
//!
//! # Integration
//!
//! The manager is pure bookkeeping and does no I/O or sleeping of its own.
//! The client drives it from its retransmission timer loop:
//!
//! ```ignore
//! loop {
//!     tokio::select! {
//!         _ = ticker.tick() => {
//!             let mut shared = shared.lock().await;
//!             let sweep = shared.reliability.sweep(Instant::now());
//!             for (id, bytes) in &sweep.retransmit {
//!                 transport.send(bytes).await?;
//!             }
//!             /* report sweep.failed */
//!         }
//!         _ = stop.changed() => break,
//!     }
//! }
//! ```
//!
//! All calls for one session must be serialized behind one lock (the
//! client's shared-state mutex). That lock is what guarantees that confirm
//! processing and timeout processing for the same id are mutually
//! exclusive: whichever runs first removes the entry, and the other finds
//! nothing to do.

use std::collections::{HashMap, HashSet, VecDeque};
use std::time::{Duration, Instant};

use natter_protocol::{MessageId, MessageKind};
use tracing::{debug, trace, warn};

// ---------------------------------------------------------------------------
// Configuration
// ---------------------------------------------------------------------------

/// Timeout and retry policy for unconfirmed sends.
#[derive(Debug, Clone, Copy)]
pub struct RetryConfig {
    /// How long a send may stay unconfirmed before it is retransmitted.
    pub timeout: Duration,
    /// How many retransmissions are attempted before the send is reported
    /// as failed. `0` means fail on the first timeout.
    pub max_retries: u8,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            timeout: Duration::from_millis(250),
            max_retries: 3,
        }
    }
}

impl RetryConfig {
    /// Clamps out-of-range values so the config is safe to use.
    ///
    /// Called by [`ReliabilityManager::new`]. A zero timeout would make
    /// every sweep retransmit everything; it is raised to 1 ms.
    pub fn validated(mut self) -> Self {
        if self.timeout.is_zero() {
            warn!("confirm timeout of zero is not usable, clamping to 1 ms");
            self.timeout = Duration::from_millis(1);
        }
        self
    }
}

// ---------------------------------------------------------------------------
// IdGenerator
// ---------------------------------------------------------------------------

/// Monotonic source of outbound message ids.
///
/// Exclusively owned by the sending side; inbound ids never touch it.
/// Wraps at 65536, matching the 16-bit wire field. By the time a
/// session has 65536 messages in flight history, the oldest pending
/// entries are long confirmed or failed, so reuse is harmless.
#[derive(Debug, Default)]
pub struct IdGenerator {
    next: u16,
}

impl IdGenerator {
    /// Returns the next id, starting at 0.
    pub fn next_id(&mut self) -> MessageId {
        let id = MessageId(self.next);
        self.next = self.next.wrapping_add(1);
        id
    }
}

// ---------------------------------------------------------------------------
// SeenIds
// ---------------------------------------------------------------------------

/// A capped recent-window of inbound ids already processed.
///
/// Grows with the session but never past `capacity`: the oldest id is
/// evicted first. The window only has to outlive the peer's practical
/// retransmission horizon (retries times timeout), which a 1024-entry
/// window covers with orders of magnitude to spare.
#[derive(Debug)]
pub struct SeenIds {
    set: HashSet<u16>,
    order: VecDeque<u16>,
    capacity: usize,
}

impl SeenIds {
    /// Default window size used by [`ReliabilityManager`].
    pub const DEFAULT_CAPACITY: usize = 1024;

    /// Creates a window holding at most `capacity` ids.
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            set: HashSet::with_capacity(capacity),
            order: VecDeque::with_capacity(capacity),
            capacity: capacity.max(1),
        }
    }

    /// Records an id. Returns `true` when the id was not in the window
    /// (first delivery) and `false` for a duplicate.
    pub fn insert(&mut self, id: MessageId) -> bool {
        if self.set.contains(&id.0) {
            return false;
        }
        if self.order.len() == self.capacity {
            if let Some(oldest) = self.order.pop_front() {
                self.set.remove(&oldest);
            }
        }
        self.order.push_back(id.0);
        self.set.insert(id.0);
        true
    }

    /// Whether the id is currently in the window.
    pub fn contains(&self, id: MessageId) -> bool {
        self.set.contains(&id.0)
    }

    /// Number of ids currently remembered.
    pub fn len(&self) -> usize {
        self.order.len()
    }

    /// `true` when no ids have been recorded yet.
    pub fn is_empty(&self) -> bool {
        self.order.is_empty()
    }
}

impl Default for SeenIds {
    fn default() -> Self {
        Self::with_capacity(Self::DEFAULT_CAPACITY)
    }
}

// ---------------------------------------------------------------------------
// PendingSend
// ---------------------------------------------------------------------------

/// One outbound datagram awaiting its confirm.
#[derive(Debug, Clone)]
pub struct PendingSend {
    /// The id the confirm must reference.
    pub id: MessageId,
    /// What the datagram was, for failure reporting.
    pub kind: MessageKind,
    /// The encoded datagram exactly as first transmitted. Retransmissions
    /// resend these bytes unchanged.
    pub bytes: Vec<u8>,
    /// When the datagram was last (re)transmitted.
    pub sent_at: Instant,
    /// How many retransmissions have happened so far.
    pub retries: u8,
}

// ---------------------------------------------------------------------------
// Sweep
// ---------------------------------------------------------------------------

/// Result of one timeout sweep: what to resend and what to give up on.
#[derive(Debug, Default)]
pub struct Sweep {
    /// Entries due for retransmission, with the exact bytes to resend.
    pub retransmit: Vec<(MessageId, Vec<u8>)>,
    /// Entries whose retry budget is spent, now removed from the table.
    pub failed: Vec<(MessageId, MessageKind)>,
}

// ---------------------------------------------------------------------------
// ReliabilityManager
// ---------------------------------------------------------------------------

/// The shared reliability state for one datagram session.
///
/// Pure bookkeeping: the caller transmits bytes and emits user-visible
/// failures; this type only decides WHAT should happen. All methods must
/// be called under the client's single shared-state lock.
#[derive(Debug)]
pub struct ReliabilityManager {
    config: RetryConfig,
    ids: IdGenerator,
    pending: HashMap<u16, PendingSend>,
    seen: SeenIds,
}

impl ReliabilityManager {
    /// Creates a manager with the given (validated) retry policy.
    pub fn new(config: RetryConfig) -> Self {
        Self {
            config: config.validated(),
            ids: IdGenerator::default(),
            pending: HashMap::new(),
            seen: SeenIds::default(),
        }
    }

    /// The retry policy in effect.
    pub fn config(&self) -> &RetryConfig {
        &self.config
    }

    /// Assigns the id for the next outbound confirmed send.
    pub fn next_id(&mut self) -> MessageId {
        self.ids.next_id()
    }

    /// Registers an outbound datagram as awaiting its confirm.
    ///
    /// Call after encoding, before (or right after) the first transmit;
    /// under the shared lock the distinction is unobservable.
    pub fn register(&mut self, id: MessageId, kind: MessageKind, bytes: Vec<u8>) {
        debug!(%id, %kind, len = bytes.len(), "awaiting confirm");
        self.pending.insert(
            id.0,
            PendingSend {
                id,
                kind,
                bytes,
                sent_at: Instant::now(),
                retries: 0,
            },
        );
    }

    /// Handles an inbound confirm: removes and returns the matching entry.
    ///
    /// A confirm for an unknown id returns `None` and is deliberately not
    /// an error; it is usually a late or duplicated confirm for an entry
    /// that already completed or failed.
    pub fn on_confirm(&mut self, id: MessageId) -> Option<PendingSend> {
        match self.pending.remove(&id.0) {
            Some(entry) => {
                debug!(%id, kind = %entry.kind, retries = entry.retries, "confirmed");
                Some(entry)
            }
            None => {
                trace!(%id, "confirm for unknown id, ignoring");
                None
            }
        }
    }

    /// Records an inbound message id. Returns `true` when this is the
    /// first delivery and its side effects should be applied; `false`
    /// means duplicate: re-confirm, but do not reprocess.
    pub fn on_inbound(&mut self, id: MessageId) -> bool {
        let fresh = self.seen.insert(id);
        if !fresh {
            debug!(%id, "duplicate delivery suppressed");
        }
        fresh
    }

    /// Runs the timeout policy against every pending entry.
    ///
    /// An entry is due when it has been `timeout` or longer since its last
    /// transmission. Due entries with retries left are aged-reset and
    /// returned for retransmission; the rest are removed and returned as
    /// failures. An entry that is never confirmed is therefore
    /// retransmitted exactly `max_retries` times before failing, no less
    /// and no more.
    pub fn sweep(&mut self, now: Instant) -> Sweep {
        let mut sweep = Sweep::default();

        let due: Vec<u16> = self
            .pending
            .values()
            .filter(|p| now.saturating_duration_since(p.sent_at) >= self.config.timeout)
            .map(|p| p.id.0)
            .collect();

        for raw in due {
            let exhausted = self
                .pending
                .get(&raw)
                .is_some_and(|p| p.retries >= self.config.max_retries);
            if exhausted {
                if let Some(entry) = self.pending.remove(&raw) {
                    warn!(
                        id = %entry.id,
                        kind = %entry.kind,
                        attempts = entry.retries as u32 + 1,
                        "delivery failed, no confirm received"
                    );
                    sweep.failed.push((entry.id, entry.kind));
                }
            } else if let Some(entry) = self.pending.get_mut(&raw) {
                entry.retries += 1;
                entry.sent_at = now;
                debug!(id = %entry.id, retry = entry.retries, "retransmitting");
                sweep.retransmit.push((entry.id, entry.bytes.clone()));
            }
        }

        sweep
    }

    /// Number of sends still awaiting their confirm.
    pub fn pending_count(&self) -> usize {
        self.pending.len()
    }

    /// Whether the given id is still awaiting its confirm.
    pub fn has_pending(&self, id: MessageId) -> bool {
        self.pending.contains_key(&id.0)
    }
}

// =========================================================================
// Tests
// =========================================================================
