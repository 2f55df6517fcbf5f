use std::net::SocketAddr;

use tracing::warn;

use crate::error::HttpNegotiateError;

/// Connection knobs shared by the client and server SDKs.
#[derive(Debug, Clone, Default)]
pub struct ConnectOptions {
    /// Gateway address, e.g. `"broker.example.net"` or `"1.2.3.4:443"`.
    pub server_addr: String,
    /// TLS server name to present instead of `server_addr`. Requires
    /// `server_addr` to be a socket address to dial.
    pub sni: Option<String>,
    /// Skip TLS certificate verification.
    pub insecure_skip_verify: bool,
    /// Use plain HTTP. When set, `insecure_skip_verify` is moot.
    pub insecure_plain_http: bool,
}

impl ConnectOptions {
    pub(crate) fn build_http(&self) -> Result<reqwest::Client, HttpNegotiateError> {
        if self.server_addr.is_empty() {
            return Err(HttpNegotiateError::InvalidServerAddr);
        }
        let mut builder = reqwest::Client::builder();
        if self.insecure_skip_verify {
            builder = builder.danger_accept_invalid_certs(true);
        }
        if let Some(sni) = &self.sni {
            let addr: SocketAddr = self
                .server_addr
                .parse()
                .map_err(|_| HttpNegotiateError::InvalidServerAddr)?;
            builder = builder.resolve(sni, addr);
        }
        builder.build().map_err(HttpNegotiateError::from)
    }

    /// Full URL for a gateway path, honoring the SNI and plain-HTTP
    /// settings.
    pub(crate) fn endpoint(&self, path: &str) -> String {
        let scheme = if self.insecure_plain_http {
            "http"
        } else {
            "https"
        };
        let host = self.sni.as_deref().unwrap_or(&self.server_addr);
        format!("{scheme}://{host}{path}")
    }

    pub(crate) fn warn_if_insecure(&self, once: &std::sync::Once) {
        if self.insecure_skip_verify || self.insecure_plain_http {
            once.call_once(|| {
                warn!(
                    "insecure transport enabled; negotiator traffic is unprotected unless the gateway is local"
                );
            });
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn endpoints_pick_scheme_and_host() {
        let options = ConnectOptions {
            server_addr: "broker.example.net".into(),
            ..Default::default()
        };
        assert_eq!(
            options.endpoint("/negotiate/offer/new"),
            "https://broker.example.net/negotiate/offer/new"
        );

        let options = ConnectOptions {
            server_addr: "127.0.0.1:8080".into(),
            insecure_plain_http: true,
            ..Default::default()
        };
        assert_eq!(options.endpoint("/health"), "http://127.0.0.1:8080/health");

        let options = ConnectOptions {
            server_addr: "203.0.113.9:443".into(),
            sni: Some("front.example.com".into()),
            ..Default::default()
        };
        assert_eq!(
            options.endpoint("/health"),
            "https://front.example.com/health"
        );
    }

    #[test]
    fn empty_address_is_rejected() {
        let options = ConnectOptions::default();
        assert!(matches!(
            options.build_http(),
            Err(HttpNegotiateError::InvalidServerAddr)
        ));
    }

    #[test]
    fn sni_requires_a_dialable_socket_address() {
        let options = ConnectOptions {
            server_addr: "broker.example.net".into(),
            sni: Some("front.example.com".into()),
            ..Default::default()
        };
        assert!(matches!(
            options.build_http(),
            Err(HttpNegotiateError::InvalidServerAddr)
        ));
    }
}
