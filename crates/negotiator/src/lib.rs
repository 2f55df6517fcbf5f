//! In-memory rendezvous broker matching WebRTC offerers with the edge
//! servers polling on their behalf.
//!
//! An offerer registers an opaque SDP blob tagged with the set of server
//! groups it is willing to be served by and blocks until a poller from
//! one of those groups takes it. The poller deposits an answer under the
//! offer's broker-minted 64-bit identifier, and the offerer retrieves it
//! by polling with that identifier. Answers live for a configurable TTL;
//! a background sweeper reclaims whatever is left behind.
//!
//! The broker holds no persistent state and trusts its callers:
//! authentication and wire encoding belong to the transport bound via
//! [`NegotiatorApi`].

mod answers;
mod api;
mod bins;
mod error;
mod negotiator;

pub use api::{
    LookupAnswerFn, NegotiatorApi, NextOfferFn, RegisterAnswerFn, RegisterOfferFn,
};
pub use bins::MAX_GROUP_ID_LIMIT;
pub use error::NegotiatorError;
pub use negotiator::Negotiator;
