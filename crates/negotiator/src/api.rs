use std::sync::Arc;

use bytes::Bytes;
use futures::future::BoxFuture;

use crate::error::NegotiatorError;
use crate::negotiator::Negotiator;

/// Registers an offer for a user and resolves, with the minted offer ID,
/// once a poller from a matching group has taken it.
pub type RegisterOfferFn = Arc<
    dyn Fn(u64, Bytes, Vec<u64>) -> BoxFuture<'static, Result<u64, NegotiatorError>>
        + Send
        + Sync,
>;
/// Returns the next offer a server in the given group may answer, or
/// `NoOfferAvailable` when every eligible bin is momentarily empty.
pub type NextOfferFn =
    Arc<dyn Fn(u64) -> Result<(u64, Bytes), NegotiatorError> + Send + Sync>;
pub type RegisterAnswerFn =
    Arc<dyn Fn(u64, Bytes) -> Result<(), NegotiatorError> + Send + Sync>;
/// Looks up the answer for (user, offer ID).
pub type LookupAnswerFn =
    Arc<dyn Fn(u64, u64) -> Result<Bytes, NegotiatorError> + Send + Sync>;

/// Binding surface between the negotiator and a transport front end. The
/// transport owns authentication, serialization, and authorization; the
/// negotiator trusts whatever these callbacks feed it.
pub trait NegotiatorApi {
    fn set_register_offer_callback(&mut self, f: RegisterOfferFn);
    fn set_next_offer_callback(&mut self, f: NextOfferFn);
    fn set_register_answer_callback(&mut self, f: RegisterAnswerFn);
    fn set_lookup_answer_callback(&mut self, f: LookupAnswerFn);
}

impl Negotiator {
    /// Install the four operations on a transport's callback slots.
    pub fn hook_to_api(self: &Arc<Self>, api: &mut dyn NegotiatorApi) {
        let negotiator = Arc::clone(self);
        api.set_register_offer_callback(Arc::new(
            move |user, sdp, groups| -> BoxFuture<'static, Result<u64, NegotiatorError>> {
                let negotiator = Arc::clone(&negotiator);
                Box::pin(async move { negotiator.register_offer(user, sdp, &groups).await })
            },
        ));

        let negotiator = Arc::clone(self);
        api.set_next_offer_callback(Arc::new(move |group| negotiator.next_offer(group)));

        let negotiator = Arc::clone(self);
        api.set_register_answer_callback(Arc::new(move |offer_id, sdp| {
            negotiator.register_answer(offer_id, sdp)
        }));

        let negotiator = Arc::clone(self);
        api.set_lookup_answer_callback(Arc::new(move |user, offer_id| {
            negotiator.lookup_answer(user, offer_id)
        }));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[derive(Default)]
    struct Slots {
        register_offer: Option<RegisterOfferFn>,
        next_offer: Option<NextOfferFn>,
        register_answer: Option<RegisterAnswerFn>,
        lookup_answer: Option<LookupAnswerFn>,
    }

    impl NegotiatorApi for Slots {
        fn set_register_offer_callback(&mut self, f: RegisterOfferFn) {
            self.register_offer = Some(f);
        }
        fn set_next_offer_callback(&mut self, f: NextOfferFn) {
            self.next_offer = Some(f);
        }
        fn set_register_answer_callback(&mut self, f: RegisterAnswerFn) {
            self.register_answer = Some(f);
        }
        fn set_lookup_answer_callback(&mut self, f: LookupAnswerFn) {
            self.lookup_answer = Some(f);
        }
    }

    #[tokio::test]
    async fn hook_fills_every_slot_with_a_working_callback() {
        let negotiator =
            Arc::new(Negotiator::new(3, Duration::from_secs(10)).expect("valid config"));
        let mut slots = Slots::default();
        negotiator.hook_to_api(&mut slots);

        let next_offer = slots.next_offer.expect("slot bound");
        assert_eq!(next_offer(2), Err(NegotiatorError::NoOfferAvailable));

        let register_offer = slots.register_offer.expect("slot bound");
        let registration =
            tokio::spawn(register_offer(42, Bytes::from_static(b"\x01"), vec![1, 2]));
        let (offer_id, sdp) = loop {
            if let Ok(delivery) = next_offer(2) {
                break delivery;
            }
            tokio::task::yield_now().await;
        };
        assert_eq!(sdp, Bytes::from_static(b"\x01"));
        assert_eq!(registration.await.expect("task"), Ok(offer_id));

        let register_answer = slots.register_answer.expect("slot bound");
        register_answer(offer_id, Bytes::from_static(b"\xaa")).expect("first answer");

        let lookup_answer = slots.lookup_answer.expect("slot bound");
        assert_eq!(
            lookup_answer(42, offer_id).expect("answer present"),
            Bytes::from_static(b"\xaa")
        );
    }
}
