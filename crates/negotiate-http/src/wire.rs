//! JSON bodies and codecs shared by the gateway and both SDKs.
//!
//! Identifiers (offer, user, group) travel as lowercase hex strings; SDP
//! bodies as standard base64. The one exception is the group list on a
//! new offer, which is a plain JSON integer array.

use std::fmt;

use base64::engine::general_purpose::STANDARD as BASE64_STANDARD;
use base64::Engine;
use serde::{Deserialize, Serialize};

pub fn encode_id(id: u64) -> String {
    format!("{id:x}")
}

pub fn decode_id(text: &str) -> Option<u64> {
    u64::from_str_radix(text, 16).ok()
}

pub fn encode_body(body: &[u8]) -> String {
    BASE64_STANDARD.encode(body)
}

pub fn decode_body(text: &str) -> Option<Vec<u8>> {
    BASE64_STANDARD.decode(text).ok()
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Status {
    Success,
    Pending,
    Error,
}

impl fmt::Display for Status {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Status::Success => write!(f, "success"),
            Status::Pending => write!(f, "pending"),
            Status::Error => write!(f, "error"),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewOfferRequest {
    /// Offer SDP, standard base64.
    pub offer: String,
    /// HMAC-SHA256 over the raw SDP bytes, base64.
    pub hmac: String,
    /// User ID, lowercase hex.
    pub uid: String,
    /// Group IDs the offerer accepts.
    pub gid: Vec<u64>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NextOfferRequest {
    /// Group ID, lowercase hex.
    pub gid: String,
    /// Shared group secret, plaintext.
    pub secret: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewAnswerRequest {
    pub gid: String,
    pub secret: String,
    /// Offer ID, lowercase hex.
    pub offer_id: String,
    /// Answer SDP, standard base64.
    pub answer: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LookupAnswerRequest {
    pub offer_id: String,
    pub uid: String,
    /// HMAC-SHA256 over the hex offer-ID string, base64.
    pub hmac: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NegotiateResponse {
    pub status: Status,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub offer_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub offer: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub answer: Option<String>,
    /// Error detail for debugging and error reporting.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reference: Option<String>,
}

impl NegotiateResponse {
    fn bare(status: Status) -> Self {
        Self {
            status,
            offer_id: None,
            offer: None,
            answer: None,
            reference: None,
        }
    }

    pub fn success() -> Self {
        Self::bare(Status::Success)
    }

    pub fn pending() -> Self {
        Self::bare(Status::Pending)
    }

    pub fn error(reference: impl fmt::Display) -> Self {
        Self {
            reference: Some(reference.to_string()),
            ..Self::bare(Status::Error)
        }
    }

    pub fn with_offer_id(mut self, offer_id: u64) -> Self {
        self.offer_id = Some(encode_id(offer_id));
        self
    }

    pub fn with_offer(mut self, sdp: &[u8]) -> Self {
        self.offer = Some(encode_body(sdp));
        self
    }

    pub fn with_answer(mut self, sdp: &[u8]) -> Self {
        self.answer = Some(encode_body(sdp));
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ids_round_trip_as_lowercase_hex() {
        assert_eq!(encode_id(0xdeadbeef), "deadbeef");
        assert_eq!(decode_id("deadbeef"), Some(0xdeadbeef));
        assert_eq!(decode_id(&encode_id(u64::MAX)), Some(u64::MAX));
        assert_eq!(decode_id("not hex"), None);
        assert_eq!(decode_id(""), None);
    }

    #[test]
    fn bodies_round_trip_as_base64() {
        let sdp = b"v=0\r\no=- 0 0 IN IP4 0.0.0.0\r\n";
        assert_eq!(decode_body(&encode_body(sdp)).as_deref(), Some(&sdp[..]));
        assert_eq!(decode_body("!!!"), None);
    }

    #[test]
    fn responses_serialize_without_absent_fields() {
        let json = serde_json::to_value(NegotiateResponse::pending()).unwrap();
        assert_eq!(json, serde_json::json!({ "status": "pending" }));

        let json =
            serde_json::to_value(NegotiateResponse::success().with_offer_id(0xab).with_offer(b"x"))
                .unwrap();
        assert_eq!(
            json,
            serde_json::json!({ "status": "success", "offer_id": "ab", "offer": "eA==" })
        );
    }

    #[test]
    fn responses_parse_with_absent_fields() {
        let parsed: NegotiateResponse =
            serde_json::from_str(r#"{ "status": "error", "reference": "bad group ID" }"#).unwrap();
        assert_eq!(parsed.status, Status::Error);
        assert_eq!(parsed.reference.as_deref(), Some("bad group ID"));
        assert!(parsed.offer_id.is_none());
    }
}
