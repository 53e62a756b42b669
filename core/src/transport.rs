//! The network step between a built `HttpRequest` and its `HttpResponse`.
//!
//! # Design
//! `Transport` is the only place the client touches I/O. The default
//! implementation runs the request on a blocking `ureq` agent that returns
//! 4xx/5xx responses as data, so status interpretation stays in
//! `AssetsClient::normalize`. Tests plug in closures instead.

use std::io;

use thiserror::Error;
use tracing::debug;
use ureq::{Agent, RequestBuilder};

use crate::http::{HttpMethod, HttpRequest, HttpResponse};

/// Largest response body read before the exchange is abandoned.
pub const BODY_LIMIT: u64 = 64 * 1024 * 1024;

/// Failure to obtain any HTTP response.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TransportError {
    /// The service could not be reached: refused, unresolvable, timed out.
    #[error("connection failed: {0}")]
    Connect(String),

    /// The exchange failed for another reason.
    #[error("{0}")]
    Other(String),
}

/// Executes one request synchronously.
pub trait Transport: Send + Sync {
    fn execute(&self, request: &HttpRequest) -> Result<HttpResponse, TransportError>;
}

impl<F> Transport for F
where
    F: Fn(&HttpRequest) -> Result<HttpResponse, TransportError> + Send + Sync,
{
    fn execute(&self, request: &HttpRequest) -> Result<HttpResponse, TransportError> {
        self(request)
    }
}

/// Blocking transport backed by a `ureq` agent.
#[derive(Debug, Clone)]
pub struct UreqTransport {
    agent: Agent,
}

impl UreqTransport {
    pub fn new() -> Self {
        let agent = Agent::config_builder()
            .http_status_as_error(false)
            .build()
            .new_agent();
        Self { agent }
    }
}

impl Default for UreqTransport {
    fn default() -> Self {
        Self::new()
    }
}

impl Transport for UreqTransport {
    fn execute(&self, request: &HttpRequest) -> Result<HttpResponse, TransportError> {
        let url = request.path.as_str();
        let body = request.body.as_deref();

        let result = match request.method {
            HttpMethod::Get => with_headers(self.agent.get(url), &request.headers).call(),
            HttpMethod::Delete => with_headers(self.agent.delete(url), &request.headers).call(),
            HttpMethod::Post => {
                let builder = with_headers(self.agent.post(url), &request.headers);
                match body {
                    Some(body) => builder.send(body.as_bytes()),
                    None => builder.send_empty(),
                }
            }
            HttpMethod::Put => {
                let builder = with_headers(self.agent.put(url), &request.headers);
                match body {
                    Some(body) => builder.send(body.as_bytes()),
                    None => builder.send_empty(),
                }
            }
        };

        let mut response = result.map_err(classify)?;
        let status = response.status().as_u16();
        let headers = response
            .headers()
            .iter()
            .map(|(name, value)| {
                let value = match value.to_str() {
                    Ok(v) => v.to_string(),
                    Err(_) => {
                        debug!(header = name.as_str(), "non-ascii header value, decoding lossily");
                        String::from_utf8_lossy(value.as_bytes()).into_owned()
                    }
                };
                (name.as_str().to_string(), value)
            })
            .collect();
        // Bytes, not text: a body that is not UTF-8 still completes the exchange.
        let bytes = response
            .body_mut()
            .with_config()
            .limit(BODY_LIMIT)
            .read_to_vec()
            .map_err(|e| TransportError::Other(e.to_string()))?;
        let body = String::from_utf8_lossy(&bytes).into_owned();

        Ok(HttpResponse {
            status,
            headers,
            body,
        })
    }
}

fn with_headers<B>(mut builder: RequestBuilder<B>, headers: &[(String, String)]) -> RequestBuilder<B> {
    for (name, value) in headers {
        builder = builder.header(name.as_str(), value.as_str());
    }
    builder
}

/// Sort a ureq failure into "never reached the service" or "something else".
fn classify(err: ureq::Error) -> TransportError {
    let connect = match &err {
        ureq::Error::ConnectionFailed | ureq::Error::HostNotFound | ureq::Error::Timeout(_) => true,
        ureq::Error::Io(io_err) => is_connect_io(io_err.kind()),
        _ => false,
    };
    if connect {
        TransportError::Connect(err.to_string())
    } else {
        TransportError::Other(err.to_string())
    }
}

fn is_connect_io(kind: io::ErrorKind) -> bool {
    matches!(
        kind,
        io::ErrorKind::ConnectionRefused
            | io::ErrorKind::ConnectionReset
            | io::ErrorKind::ConnectionAborted
            | io::ErrorKind::NotConnected
            | io::ErrorKind::AddrNotAvailable
            | io::ErrorKind::TimedOut
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn refused_io_is_a_connect_failure() {
        let err = ureq::Error::Io(io::Error::from(io::ErrorKind::ConnectionRefused));
        assert!(matches!(classify(err), TransportError::Connect(_)));
    }

    #[test]
    fn other_io_is_not_a_connect_failure() {
        let err = ureq::Error::Io(io::Error::from(io::ErrorKind::InvalidData));
        assert!(matches!(classify(err), TransportError::Other(_)));
    }

    #[test]
    fn host_not_found_is_a_connect_failure() {
        assert!(matches!(
            classify(ureq::Error::HostNotFound),
            TransportError::Connect(_)
        ));
    }

    #[test]
    fn closures_are_transports() {
        let transport = |_: &HttpRequest| -> Result<HttpResponse, TransportError> {
            Ok(HttpResponse {
                status: 200,
                headers: Vec::new(),
                body: "{}".to_string(),
            })
        };
        let request = HttpRequest {
            method: HttpMethod::Get,
            path: "http://assets/assets/collections".to_string(),
            headers: Vec::new(),
            body: None,
        };
        assert_eq!(transport.execute(&request).unwrap().status, 200);
    }
}
