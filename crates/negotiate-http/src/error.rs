use negotiator::NegotiatorError;
use thiserror::Error;

use crate::wire::Status;

/// Transport-level failures of the HTTP gateway SDKs. Broker-level
/// outcomes (`AnswerPending`, `NoOfferAvailable`, ...) pass through as
/// `Negotiator` so callers can match on the core taxonomy.
#[derive(Debug, Error)]
pub enum HttpNegotiateError {
    #[error("invalid server address")]
    InvalidServerAddr,
    #[error("invalid response format")]
    InvalidResponseFormat,
    #[error("http request failed: {0}")]
    Http(#[from] reqwest::Error),
    #[error("negotiator returned status {status}: {reference}")]
    Rejected { status: Status, reference: String },
    #[error(transparent)]
    Negotiator(#[from] NegotiatorError),
}
