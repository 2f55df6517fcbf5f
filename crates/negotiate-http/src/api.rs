use std::sync::Arc;

use axum::extract::rejection::JsonRejection;
use axum::extract::State;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Json, Response};
use axum::routing::{get, post};
use axum::Router;
use bytes::Bytes;
use negotiator::{
    LookupAnswerFn, NegotiatorApi, NegotiatorError, NextOfferFn, RegisterAnswerFn,
    RegisterOfferFn,
};
use serde::Serialize;
use tracing::debug;

use crate::auth::Credentials;
use crate::wire::{
    decode_body, decode_id, LookupAnswerRequest, NegotiateResponse, NewAnswerRequest,
    NewOfferRequest, NextOfferRequest,
};

/// HTTP face of the negotiator: four POST routes under `/negotiate`,
/// JSON bodies, hex IDs, base64 SDP. Authentication failures and
/// malformed fields all collapse to a bare 404, so probes learn nothing.
///
/// Bind a broker with [`negotiator::Negotiator::hook_to_api`] before
/// turning the gateway into a router.
pub struct Gateway {
    credentials: Credentials,
    register_offer: Option<RegisterOfferFn>,
    next_offer: Option<NextOfferFn>,
    register_answer: Option<RegisterAnswerFn>,
    lookup_answer: Option<LookupAnswerFn>,
}

impl Gateway {
    pub fn new(credentials: Credentials) -> Self {
        Self {
            credentials,
            register_offer: None,
            next_offer: None,
            register_answer: None,
            lookup_answer: None,
        }
    }

    pub fn into_router(self) -> Router {
        let state = GatewayState {
            inner: Arc::new(self),
        };
        Router::new()
            .route("/health", get(health))
            .route("/negotiate/offer/new", post(register_offer))
            .route("/negotiate/offer/next", post(next_offer))
            .route("/negotiate/answer/new", post(register_answer))
            .route("/negotiate/answer/lookup", post(lookup_answer))
            .with_state(state)
    }
}

impl NegotiatorApi for Gateway {
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

#[derive(Clone)]
struct GatewayState {
    inner: Arc<Gateway>,
}

#[derive(Debug, Serialize)]
struct Health {
    status: &'static str,
}

async fn health() -> Json<Health> {
    Json(Health { status: "ok" })
}

fn success(response: NegotiateResponse) -> Response {
    (StatusCode::OK, Json(response)).into_response()
}

fn pending() -> Response {
    (StatusCode::NOT_FOUND, Json(NegotiateResponse::pending())).into_response()
}

fn failure(err: NegotiatorError) -> Response {
    (
        StatusCode::INTERNAL_SERVER_ERROR,
        Json(NegotiateResponse::error(err)),
    )
        .into_response()
}

fn unbound() -> Response {
    (
        StatusCode::INTERNAL_SERVER_ERROR,
        Json(NegotiateResponse::error("operation not wired")),
    )
        .into_response()
}

async fn register_offer(
    State(state): State<GatewayState>,
    payload: Result<Json<NewOfferRequest>, JsonRejection>,
) -> Response {
    let gateway = &state.inner;
    // A body that does not parse gets the same bare 404 as bad
    // credentials.
    let Ok(Json(request)) = payload else {
        return StatusCode::NOT_FOUND.into_response();
    };
    let Some(uid) = decode_id(&request.uid) else {
        return StatusCode::NOT_FOUND.into_response();
    };
    let Some(offer) = decode_body(&request.offer) else {
        return StatusCode::NOT_FOUND.into_response();
    };
    let Some(mac) = decode_body(&request.hmac) else {
        return StatusCode::NOT_FOUND.into_response();
    };
    if !gateway.credentials.verify_user_mac(uid, &offer, &mac) {
        debug!(uid, "rejecting offer with bad user credentials");
        return StatusCode::NOT_FOUND.into_response();
    }
    let Some(callback) = gateway.register_offer.as_ref() else {
        return unbound();
    };
    match callback(uid, Bytes::from(offer), request.gid).await {
        Ok(offer_id) => {
            debug!(uid, offer_id, "offer registered");
            success(NegotiateResponse::success().with_offer_id(offer_id))
        }
        Err(err) => failure(err),
    }
}

async fn next_offer(
    State(state): State<GatewayState>,
    payload: Result<Json<NextOfferRequest>, JsonRejection>,
) -> Response {
    let gateway = &state.inner;
    let Ok(Json(request)) = payload else {
        return StatusCode::NOT_FOUND.into_response();
    };
    let Some(gid) = decode_id(&request.gid) else {
        return StatusCode::NOT_FOUND.into_response();
    };
    if !gateway.credentials.verify_group_secret(gid, &request.secret) {
        debug!(gid, "rejecting poll with bad group secret");
        return StatusCode::NOT_FOUND.into_response();
    }
    let Some(callback) = gateway.next_offer.as_ref() else {
        return unbound();
    };
    match callback(gid) {
        Ok((offer_id, sdp)) => {
            debug!(gid, offer_id, "offer handed to poller");
            success(
                NegotiateResponse::success()
                    .with_offer_id(offer_id)
                    .with_offer(&sdp),
            )
        }
        Err(NegotiatorError::NoOfferAvailable) => pending(),
        Err(err) => failure(err),
    }
}

async fn register_answer(
    State(state): State<GatewayState>,
    payload: Result<Json<NewAnswerRequest>, JsonRejection>,
) -> Response {
    let gateway = &state.inner;
    let Ok(Json(request)) = payload else {
        return StatusCode::NOT_FOUND.into_response();
    };
    let Some(gid) = decode_id(&request.gid) else {
        return StatusCode::NOT_FOUND.into_response();
    };
    if !gateway.credentials.verify_group_secret(gid, &request.secret) {
        debug!(gid, "rejecting answer with bad group secret");
        return StatusCode::NOT_FOUND.into_response();
    }
    let Some(offer_id) = decode_id(&request.offer_id) else {
        return StatusCode::NOT_FOUND.into_response();
    };
    let Some(answer) = decode_body(&request.answer) else {
        return StatusCode::NOT_FOUND.into_response();
    };
    let Some(callback) = gateway.register_answer.as_ref() else {
        return unbound();
    };
    match callback(offer_id, Bytes::from(answer)) {
        Ok(()) => {
            debug!(gid, offer_id, "answer registered");
            success(NegotiateResponse::success())
        }
        Err(err) => failure(err),
    }
}

async fn lookup_answer(
    State(state): State<GatewayState>,
    payload: Result<Json<LookupAnswerRequest>, JsonRejection>,
) -> Response {
    let gateway = &state.inner;
    let Ok(Json(request)) = payload else {
        return StatusCode::NOT_FOUND.into_response();
    };
    let Some(offer_id) = decode_id(&request.offer_id) else {
        return StatusCode::NOT_FOUND.into_response();
    };
    let Some(uid) = decode_id(&request.uid) else {
        return StatusCode::NOT_FOUND.into_response();
    };
    let Some(mac) = decode_body(&request.hmac) else {
        return StatusCode::NOT_FOUND.into_response();
    };
    // The MAC covers the offer-ID string exactly as the caller sent it.
    if !gateway
        .credentials
        .verify_user_mac(uid, request.offer_id.as_bytes(), &mac)
    {
        debug!(uid, "rejecting lookup with bad user credentials");
        return StatusCode::NOT_FOUND.into_response();
    }
    let Some(callback) = gateway.lookup_answer.as_ref() else {
        return unbound();
    };
    match callback(uid, offer_id) {
        Ok(answer) => success(NegotiateResponse::success().with_answer(&answer)),
        Err(NegotiatorError::AnswerPending) => pending(),
        Err(err) => failure(err),
    }
}
