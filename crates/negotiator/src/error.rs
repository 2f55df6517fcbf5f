use thiserror::Error;

/// Failure kinds surfaced by the negotiator. Transports decide which of
/// these are end-user errors; `NoOfferAvailable` and `AnswerPending` are
/// conventionally "try again later".
#[derive(Debug, Error, Clone, Copy, PartialEq, Eq)]
pub enum NegotiatorError {
    /// The caller's group list reduced to an empty bitmap.
    #[error("bad group ID")]
    BadGroupId,
    /// The identifier source failed to produce a random u64.
    #[error("random number generation error")]
    RngFailure,
    /// No answer row for the given offer ID; it never existed or has
    /// already expired.
    #[error("invalid offer ID")]
    InvalidOfferId,
    #[error("no offer available yet")]
    NoOfferAvailable,
    #[error("answer is pending for the specified offer")]
    AnswerPending,
    #[error("answer is already registered for the specified offer")]
    AnswerRepeated,
    #[error("no access to the specified offer")]
    NoAccess,
    /// Reserved for transports; the negotiator itself never emits it.
    #[error("not authenticated")]
    NotAuthenticated,
}
