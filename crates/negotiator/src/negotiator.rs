use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Weak};
use std::time::Duration;

use bytes::Bytes;
use rand::rngs::OsRng;
use rand::RngCore;
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tracing::{debug, trace};

use crate::answers::{AnswerTable, RowGuard};
use crate::bins::{OfferBins, MAX_GROUP_ID_LIMIT};
use crate::error::NegotiatorError;

/// In-memory rendezvous between offerers and the edge servers polling on
/// their behalf. An offerer posts an SDP blob tagged with the groups it
/// accepts and blocks until a poller from one of them takes it; the
/// poller later deposits an answer that the offerer retrieves by the
/// opaque identifier minted here.
///
/// Construction allocates one offer bin per non-empty subset of groups
/// and starts the expiry sweeper; dropping the negotiator stops the
/// sweeper.
pub struct Negotiator {
    shared: Arc<Shared>,
    sweeper: JoinHandle<()>,
}

struct Shared {
    bins: OfferBins,
    answers: AnswerTable,
}

impl Negotiator {
    /// `max_group_id` must be in [1, 16]: 2^G - 1 bins are allocated up
    /// front. `ttl` bounds how long an answer row stays retrievable.
    ///
    /// Must be called from within a tokio runtime.
    pub fn new(max_group_id: u64, ttl: Duration) -> Result<Self, NegotiatorError> {
        if !(1..=MAX_GROUP_ID_LIMIT).contains(&max_group_id) {
            return Err(NegotiatorError::BadGroupId);
        }
        let shared = Arc::new(Shared {
            bins: OfferBins::new(max_group_id),
            answers: AnswerTable::new(ttl),
        });
        let sweeper = spawn_sweeper(Arc::downgrade(&shared), ttl);
        Ok(Self { shared, sweeper })
    }

    /// Queue `sdp` for any server in one of `groups` and wait until a
    /// poller accepts it. Returns the offer ID the caller later presents
    /// to [`lookup_answer`](Self::lookup_answer).
    ///
    /// The wait is the backpressure mechanism: with no poller on a
    /// matching group the future stays pending. Dropping it withdraws the
    /// registration; if a poller took the offer first, the answer row
    /// stays behind for the sweeper so the poller's answer still has a
    /// destination.
    pub async fn register_offer(
        &self,
        user: u64,
        sdp: Bytes,
        groups: &[u64],
    ) -> Result<u64, NegotiatorError> {
        let bin_id = self.shared.bins.bin_for_groups(groups)?;
        let offer_id = mint_offer_id()?;

        // The row must exist before the offer is visible to a poller, so
        // a consumer never sees an offer whose answer slot is missing for
        // any reason other than expiry. The guard withdraws it if this
        // future is dropped before a poller takes the offer; `taken` is
        // how the poller tells the guard the row is spoken for.
        self.shared.answers.create(offer_id, user);
        let taken = Arc::new(AtomicBool::new(false));
        let guard = RowGuard::new(&self.shared.answers, offer_id, Arc::clone(&taken));
        let accepted = self.shared.bins.push(bin_id, offer_id, user, sdp, taken);

        debug!(user, offer_id, bin_id, "offer queued");
        match accepted.await {
            Ok(()) => {
                guard.disarm();
                Ok(offer_id)
            }
            // Bins outlive every borrow of the negotiator, so the channel
            // only closes mid-teardown; the guard has already withdrawn
            // the row.
            Err(_) => Err(NegotiatorError::NoOfferAvailable),
        }
    }

    /// Probe every bin a server in `group` may consume from and return
    /// the first offer that is still live, or `NoOfferAvailable` if all
    /// eligible bins are momentarily empty. Never blocks; pollers call
    /// this in a loop.
    ///
    /// Withdrawn and expired offers found along the way are discarded.
    pub fn next_offer(&self, group: u64) -> Result<(u64, Bytes), NegotiatorError> {
        for bin_id in self.shared.bins.bins_for_group(group) {
            while let Some(pending) = self.shared.bins.pop(bin_id) {
                // Taking the offer is the rendezvous: the registering side
                // unblocks now, even if the offer turns out stale below.
                // Mark the offer taken before signalling, so a registrant
                // dropped between the two cannot withdraw a row this
                // side's caller is about to answer.
                pending.taken.store(true, Ordering::Release);
                if pending.accepted.send(()).is_err() {
                    trace!(offer_id = pending.id, "offer withdrawn by registrant");
                    continue;
                }
                if !self.shared.answers.is_live(pending.id) {
                    trace!(offer_id = pending.id, "discarding expired offer");
                    continue;
                }
                debug!(
                    group,
                    bin_id,
                    offer_id = pending.id,
                    user = pending.user,
                    "offer delivered"
                );
                return Ok((pending.id, pending.sdp));
            }
        }
        Err(NegotiatorError::NoOfferAvailable)
    }

    /// Deposit the answer for a previously delivered offer. Each offer
    /// takes exactly one answer; later attempts fail `AnswerRepeated`.
    pub fn register_answer(&self, offer_id: u64, sdp: Bytes) -> Result<(), NegotiatorError> {
        self.shared.answers.set_body(offer_id, sdp)?;
        debug!(offer_id, "answer registered");
        Ok(())
    }

    /// Retrieve the answer for `offer_id`, owner only. `AnswerPending`
    /// until a server has deposited one; reads do not consume the row.
    pub fn lookup_answer(&self, user: u64, offer_id: u64) -> Result<Bytes, NegotiatorError> {
        self.shared.answers.read_body(user, offer_id)
    }
}

impl Drop for Negotiator {
    fn drop(&mut self) {
        self.sweeper.abort();
    }
}

/// Uniform random u64 from the operating system. The draw is fallible by
/// contract even though it practically never fails.
pub(crate) fn mint_offer_id() -> Result<u64, NegotiatorError> {
    let mut buf = [0u8; 8];
    OsRng
        .try_fill_bytes(&mut buf)
        .map_err(|_| NegotiatorError::RngFailure)?;
    Ok(u64::from_le_bytes(buf))
}

/// Reap expired answer rows every half TTL, so a row is unreachable no
/// later than 1.5 TTL after creation. Holds only a weak handle: the task
/// ends on its own once the negotiator is gone.
fn spawn_sweeper(shared: Weak<Shared>, ttl: Duration) -> JoinHandle<()> {
    let period = (ttl / 2).max(Duration::from_millis(1));
    tokio::spawn(async move {
        loop {
            tokio::time::sleep(period).await;
            let Some(shared) = shared.upgrade() else {
                break;
            };
            let reaped = shared.answers.sweep(Instant::now());
            if reaped > 0 {
                trace!(reaped, "swept expired answer rows");
            }
        }
    })
}
