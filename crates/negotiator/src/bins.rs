use std::collections::HashMap;
use std::sync::atomic::AtomicBool;
use std::sync::Arc;

use bytes::Bytes;
use parking_lot::Mutex;
use tokio::sync::mpsc::{self, error::TryRecvError, UnboundedReceiver, UnboundedSender};
use tokio::sync::oneshot;

use crate::error::NegotiatorError;

/// Largest accepted `max_group_id`. One queue exists per non-empty subset
/// of groups, so a matrix for G groups holds 2^G - 1 queues, allocated
/// eagerly at construction.
pub const MAX_GROUP_ID_LIMIT: u64 = 16;

/// An offer parked in a bin until a poller takes it.
pub(crate) struct PendingOffer {
    pub id: u64,
    pub user: u64,
    pub sdp: Bytes,
    /// Fires when a consumer takes the offer; the registering side blocks
    /// on the paired receiver until then. A closed channel marks a
    /// registration that was withdrawn before anyone accepted it.
    pub accepted: oneshot::Sender<()>,
    /// Set by the consumer before it signals `accepted`. The registering
    /// side consults this when it is dropped: a taken offer's answer row
    /// belongs to the consumer and must not be withdrawn, even if the
    /// registrant never got to observe the acknowledgement.
    pub taken: Arc<AtomicBool>,
}

struct Bin {
    tx: UnboundedSender<PendingOffer>,
    rx: Mutex<UnboundedReceiver<PendingOffer>>,
}

/// One FIFO handoff queue per non-empty subset of groups, keyed by the
/// subset's bitmap: bit i-1 of the key set means "acceptable to a server
/// in group i".
pub(crate) struct OfferBins {
    max_group_id: u64,
    bins: HashMap<u64, Bin>,
}

impl OfferBins {
    pub fn new(max_group_id: u64) -> Self {
        let mut bins = HashMap::new();
        let max_bin = (1u64 << max_group_id) - 1;
        for bin_id in 1..=max_bin {
            let (tx, rx) = mpsc::unbounded_channel();
            bins.insert(
                bin_id,
                Bin {
                    tx,
                    rx: Mutex::new(rx),
                },
            );
        }
        Self { max_group_id, bins }
    }

    /// OR-reduce a group list into a bin bitmap. Group IDs outside
    /// [1, max_group_id] are dropped silently; a list that reduces to
    /// nothing is the caller's error.
    pub fn bin_for_groups(&self, groups: &[u64]) -> Result<u64, NegotiatorError> {
        let mut bin_id = 0u64;
        for &group in groups {
            if (1..=self.max_group_id).contains(&group) {
                bin_id |= 1u64 << (group - 1);
            }
        }
        if bin_id == 0 {
            return Err(NegotiatorError::BadGroupId);
        }
        Ok(bin_id)
    }

    /// Queue an offer on its bin. The returned receiver resolves once a
    /// poller has taken the offer; dropping it withdraws the registration
    /// unless `taken` says a poller got there first.
    pub fn push(
        &self,
        bin_id: u64,
        id: u64,
        user: u64,
        sdp: Bytes,
        taken: Arc<AtomicBool>,
    ) -> oneshot::Receiver<()> {
        let (accepted, accept_rx) = oneshot::channel();
        if let Some(bin) = self.bins.get(&bin_id) {
            // Receiver halves live in the matrix itself, so the send only
            // fails mid-teardown, where the caller is going away too.
            let _ = bin.tx.send(PendingOffer {
                id,
                user,
                sdp,
                accepted,
                taken,
            });
        }
        accept_rx
    }

    /// Non-blocking probe of one bin.
    pub fn pop(&self, bin_id: u64) -> Option<PendingOffer> {
        let bin = self.bins.get(&bin_id)?;
        match bin.rx.lock().try_recv() {
            Ok(pending) => Some(pending),
            Err(TryRecvError::Empty | TryRecvError::Disconnected) => None,
        }
    }

    /// Bin IDs a poller from `group` is eligible to drain, in matrix
    /// iteration order. The order is unspecified and unfair.
    pub fn bins_for_group(&self, group: u64) -> Vec<u64> {
        if group == 0 || group > self.max_group_id {
            return Vec::new();
        }
        let mask = 1u64 << (group - 1);
        self.bins
            .keys()
            .copied()
            .filter(|bin_id| bin_id & mask != 0)
            .collect()
    }
}
