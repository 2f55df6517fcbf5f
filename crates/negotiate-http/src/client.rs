use std::sync::Once;

use async_trait::async_trait;
use bytes::Bytes;
use negotiator::NegotiatorError;
use tracing::debug;

use crate::auth;
use crate::error::HttpNegotiateError;
use crate::transport::ConnectOptions;
use crate::wire::{
    decode_body, decode_id, encode_body, encode_id, LookupAnswerRequest, NegotiateResponse,
    NewOfferRequest, Status,
};

/// Offerer-side face of a negotiate transport: post an offer, poll for
/// the matching answer.
#[async_trait]
pub trait ClientNegotiator {
    /// Register an offer to be accepted by one edge server from one of
    /// `groups`. The returned offer ID feeds
    /// [`lookup_answer`](Self::lookup_answer).
    async fn register_offer(&self, sdp: &[u8], groups: &[u64])
        -> Result<u64, HttpNegotiateError>;

    /// Look up the answer for a registered offer.
    /// `NegotiatorError::AnswerPending` means try again later.
    async fn lookup_answer(&self, offer_id: u64) -> Result<Bytes, HttpNegotiateError>;
}

#[derive(Debug, Clone, Default)]
pub struct ClientOptions {
    pub user_id: u64,
    pub password: String,
    pub connect: ConnectOptions,
}

/// Talks to a causeway gateway on behalf of an offerer, signing each
/// request with the user's password.
pub struct Client {
    options: ClientOptions,
    http: reqwest::Client,
    insecure_warned: Once,
}

impl Client {
    pub fn new(options: ClientOptions) -> Result<Self, HttpNegotiateError> {
        let http = options.connect.build_http()?;
        Ok(Self {
            options,
            http,
            insecure_warned: Once::new(),
        })
    }

    async fn post(
        &self,
        path: &str,
        body: &impl serde::Serialize,
    ) -> Result<NegotiateResponse, HttpNegotiateError> {
        self.options.connect.warn_if_insecure(&self.insecure_warned);
        let url = self.options.connect.endpoint(path);
        debug!(%url, "posting to negotiator gateway");
        let response = self.http.post(&url).json(body).send().await?;
        response
            .json()
            .await
            .map_err(|_| HttpNegotiateError::InvalidResponseFormat)
    }
}

#[async_trait]
impl ClientNegotiator for Client {
    async fn register_offer(
        &self,
        sdp: &[u8],
        groups: &[u64],
    ) -> Result<u64, HttpNegotiateError> {
        let request = NewOfferRequest {
            offer: encode_body(sdp),
            hmac: encode_body(&auth::sign(&self.options.password, sdp)),
            uid: encode_id(self.options.user_id),
            gid: groups.to_vec(),
        };
        let response = self.post("/negotiate/offer/new", &request).await?;
        match response.status {
            Status::Success => response
                .offer_id
                .as_deref()
                .and_then(decode_id)
                .ok_or(HttpNegotiateError::InvalidResponseFormat),
            status => Err(HttpNegotiateError::Rejected {
                status,
                reference: response.reference.unwrap_or_default(),
            }),
        }
    }

    async fn lookup_answer(&self, offer_id: u64) -> Result<Bytes, HttpNegotiateError> {
        let offer_id_hex = encode_id(offer_id);
        let request = LookupAnswerRequest {
            uid: encode_id(self.options.user_id),
            hmac: encode_body(&auth::sign(
                &self.options.password,
                offer_id_hex.as_bytes(),
            )),
            offer_id: offer_id_hex,
        };
        let response = self.post("/negotiate/answer/lookup", &request).await?;
        match response.status {
            Status::Success => response
                .answer
                .as_deref()
                .and_then(decode_body)
                .map(Bytes::from)
                .ok_or(HttpNegotiateError::InvalidResponseFormat),
            Status::Pending => Err(NegotiatorError::AnswerPending.into()),
            status => Err(HttpNegotiateError::Rejected {
                status,
                reference: response.reference.unwrap_or_default(),
            }),
        }
    }
}
