//! HTTP/JSON face of the causeway negotiator.
//!
//! [`Gateway`] exposes the broker's four operations as POST routes,
//! authenticating offerers with an HMAC over the SDP body and edge
//! servers with a per-group shared secret. [`Client`] and [`Server`] are
//! the matching SDK halves speaking the same wire format over reqwest.

mod api;
mod auth;
mod client;
mod error;
mod server;
mod transport;
pub mod wire;

pub use api::Gateway;
pub use auth::{sign, Credentials};
pub use client::{Client, ClientNegotiator, ClientOptions};
pub use error::HttpNegotiateError;
pub use server::{NextOfferHandler, Server, ServerNegotiator, ServerOptions};
pub use transport::ConnectOptions;
