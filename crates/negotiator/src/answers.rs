use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use bytes::Bytes;
use parking_lot::Mutex;
use tokio::time::Instant;

use crate::error::NegotiatorError;

/// One answer slot. `user` never changes after creation; `body` and
/// `expiry` are guarded by the row lock.
struct Row {
    user: u64,
    state: Mutex<RowState>,
}

struct RowState {
    body: Option<Bytes>,
    expiry: Instant,
}

/// Offer-ID-keyed answer store with two-level locking: the table lock
/// protects the map structure, each row lock protects that row's body and
/// deadline. Lock order is table then row, never the reverse; operations
/// clone the row handle under the table lock and release it before
/// touching the row.
pub(crate) struct AnswerTable {
    rows: Mutex<HashMap<u64, Arc<Row>>>,
    ttl: Duration,
}

impl AnswerTable {
    pub fn new(ttl: Duration) -> Self {
        Self {
            rows: Mutex::new(HashMap::new()),
            ttl,
        }
    }

    /// Insert a fresh row for a newly minted offer ID: body absent,
    /// deadline one TTL out. An ID colliding with a live row replaces it.
    pub fn create(&self, offer_id: u64, user: u64) {
        let row = Arc::new(Row {
            user,
            state: Mutex::new(RowState {
                body: None,
                expiry: Instant::now() + self.ttl,
            }),
        });
        self.rows.lock().insert(offer_id, row);
    }

    pub fn remove(&self, offer_id: u64) {
        self.rows.lock().remove(&offer_id);
    }

    fn row(&self, offer_id: u64) -> Option<Arc<Row>> {
        self.rows.lock().get(&offer_id).cloned()
    }

    /// The row exists and its deadline has not passed.
    pub fn is_live(&self, offer_id: u64) -> bool {
        match self.row(offer_id) {
            Some(row) => row.state.lock().expiry > Instant::now(),
            None => false,
        }
    }

    /// Record the answer body, once and for all.
    pub fn set_body(&self, offer_id: u64, sdp: Bytes) -> Result<(), NegotiatorError> {
        let row = self.row(offer_id).ok_or(NegotiatorError::InvalidOfferId)?;
        let mut state = row.state.lock();
        if state.body.is_some() {
            return Err(NegotiatorError::AnswerRepeated);
        }
        state.body = Some(sdp);
        Ok(())
    }

    /// Read the answer body for its owner. Lookups are idempotent; the
    /// row stays until the sweeper takes it.
    pub fn read_body(&self, user: u64, offer_id: u64) -> Result<Bytes, NegotiatorError> {
        let row = self.row(offer_id).ok_or(NegotiatorError::InvalidOfferId)?;
        if row.user != user {
            return Err(NegotiatorError::NoAccess);
        }
        let state = row.state.lock();
        match &state.body {
            Some(body) => Ok(body.clone()),
            None => Err(NegotiatorError::AnswerPending),
        }
    }

    /// Drop every row whose deadline has passed. Returns how many went.
    pub fn sweep(&self, now: Instant) -> usize {
        let mut rows = self.rows.lock();
        let before = rows.len();
        rows.retain(|_, row| row.state.lock().expiry >= now);
        before - rows.len()
    }
}

/// Removes its row on drop unless the offer was handed to a consumer.
/// Keeps a withdrawn registration from leaving an answer slot behind.
///
/// Disarming happens two ways: explicitly, once the registrant observes
/// the acknowledgement, or through `taken`, which the consumer sets
/// before acknowledging. The flag covers the registrant being dropped
/// after the consumer took the offer but before this task ran again; a
/// delivered offer's row must survive for the answer that is coming.
pub(crate) struct RowGuard<'a> {
    table: &'a AnswerTable,
    offer_id: u64,
    taken: Arc<AtomicBool>,
    armed: bool,
}

impl<'a> RowGuard<'a> {
    pub fn new(table: &'a AnswerTable, offer_id: u64, taken: Arc<AtomicBool>) -> Self {
        Self {
            table,
            offer_id,
            taken,
            armed: true,
        }
    }

    /// The handoff completed; the row now belongs to the table.
    pub fn disarm(mut self) {
        self.armed = false;
    }
}

impl Drop for RowGuard<'_> {
    fn drop(&mut self) {
        if self.armed && !self.taken.load(Ordering::Acquire) {
            self.table.remove(self.offer_id);
        }
    }
}
