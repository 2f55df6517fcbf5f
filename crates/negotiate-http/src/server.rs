use std::sync::{Arc, Once};
use std::time::Duration;

use async_trait::async_trait;
use bytes::Bytes;
use negotiator::NegotiatorError;
use parking_lot::Mutex;
use tracing::{debug, error, warn};

use crate::error::HttpNegotiateError;
use crate::transport::ConnectOptions;
use crate::wire::{
    decode_body, decode_id, encode_body, encode_id, NegotiateResponse, NewAnswerRequest,
    NextOfferRequest, Status,
};

const DEFAULT_WAIT_AFTER_PENDING: Duration = Duration::from_secs(5);

/// Invoked by the poll loop for each offer fetched from the gateway. Must
/// not block; hand heavy work to a task.
pub type NextOfferHandler = Arc<dyn Fn(u64, Bytes) -> anyhow::Result<()> + Send + Sync>;

/// Edge-server-side face of a negotiate transport.
#[async_trait]
pub trait ServerNegotiator {
    /// Install the handler for incoming offers, starting the background
    /// poll loop on first call.
    fn set_next_offer_handler(&self, handler: NextOfferHandler);

    /// Deposit the answer for an offer received through the handler.
    async fn register_answer(&self, offer_id: u64, sdp: &[u8]) -> Result<(), HttpNegotiateError>;
}

#[derive(Debug, Clone, Default)]
pub struct ServerOptions {
    pub group_id: u64,
    /// This group's shared secret.
    pub secret: String,
    pub connect: ConnectOptions,
    /// Pause after an offer was fetched and handled. Zero means none.
    pub wait_after_success: Duration,
    /// Pause when the gateway reports no offer yet. Defaults to 5s.
    pub wait_after_pending: Option<Duration>,
    /// Pause after a poll error; the loop stops instead when unset.
    pub wait_after_error: Option<Duration>,
}

/// Talks to a causeway gateway on behalf of an edge server: polls for
/// offers in the server's group and deposits answers.
pub struct Server {
    inner: Arc<ServerInner>,
}

struct ServerInner {
    options: ServerOptions,
    http: reqwest::Client,
    handler: Mutex<Option<NextOfferHandler>>,
    poll_started: Once,
    insecure_warned: Once,
}

impl Server {
    pub fn new(options: ServerOptions) -> Result<Self, HttpNegotiateError> {
        let http = options.connect.build_http()?;
        Ok(Self {
            inner: Arc::new(ServerInner {
                options,
                http,
                handler: Mutex::new(None),
                poll_started: Once::new(),
                insecure_warned: Once::new(),
            }),
        })
    }
}

#[async_trait]
impl ServerNegotiator for Server {
    fn set_next_offer_handler(&self, handler: NextOfferHandler) {
        *self.inner.handler.lock() = Some(handler);
        let inner = Arc::clone(&self.inner);
        self.inner
            .poll_started
            .call_once(|| {
                tokio::spawn(poll_loop(inner));
            });
    }

    async fn register_answer(&self, offer_id: u64, sdp: &[u8]) -> Result<(), HttpNegotiateError> {
        let request = NewAnswerRequest {
            gid: encode_id(self.inner.options.group_id),
            secret: self.inner.options.secret.clone(),
            offer_id: encode_id(offer_id),
            answer: encode_body(sdp),
        };
        let response = self.inner.post("/negotiate/answer/new", &request).await?;
        match response.status {
            Status::Success => Ok(()),
            status => Err(HttpNegotiateError::Rejected {
                status,
                reference: response.reference.unwrap_or_default(),
            }),
        }
    }
}

impl ServerInner {
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

    async fn read_next_offer(&self) -> Result<(u64, Bytes), HttpNegotiateError> {
        let request = NextOfferRequest {
            gid: encode_id(self.options.group_id),
            secret: self.options.secret.clone(),
        };
        let response = self.post("/negotiate/offer/next", &request).await?;
        match response.status {
            Status::Success => {
                let offer_id = response
                    .offer_id
                    .as_deref()
                    .and_then(decode_id)
                    .ok_or(HttpNegotiateError::InvalidResponseFormat)?;
                let sdp = response
                    .offer
                    .as_deref()
                    .and_then(decode_body)
                    .ok_or(HttpNegotiateError::InvalidResponseFormat)?;
                Ok((offer_id, Bytes::from(sdp)))
            }
            Status::Pending => Err(NegotiatorError::NoOfferAvailable.into()),
            status => Err(HttpNegotiateError::Rejected {
                status,
                reference: response.reference.unwrap_or_default(),
            }),
        }
    }
}

async fn poll_loop(inner: Arc<ServerInner>) {
    loop {
        match inner.read_next_offer().await {
            Ok((offer_id, sdp)) => {
                debug!(offer_id, "offer received from gateway");
                let handler = inner.handler.lock().clone();
                match handler {
                    Some(handler) => {
                        if let Err(err) = handler(offer_id, sdp) {
                            error!(offer_id, error = %err, "next-offer handler failed");
                        }
                    }
                    None => warn!(offer_id, "no next-offer handler set, offer discarded"),
                }
                if !inner.options.wait_after_success.is_zero() {
                    tokio::time::sleep(inner.options.wait_after_success).await;
                }
            }
            Err(HttpNegotiateError::Negotiator(NegotiatorError::NoOfferAvailable)) => {
                debug!("offer queue empty, retrying later");
                tokio::time::sleep(
                    inner
                        .options
                        .wait_after_pending
                        .unwrap_or(DEFAULT_WAIT_AFTER_PENDING),
                )
                .await;
            }
            Err(err) => {
                error!(error = %err, "next-offer poll failed");
                match inner.options.wait_after_error {
                    Some(wait) => tokio::time::sleep(wait).await,
                    None => return,
                }
            }
        }
    }
}
