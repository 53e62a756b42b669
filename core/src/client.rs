//! Resource client for `/assets/collections` and their items.
//!
//! # Design
//! `AssetsClient` holds the endpoint, the variant options and a transport;
//! nothing else survives between calls. Each operation is split the way the
//! wire exchange is: `build_*` produces an `HttpRequest`, the transport
//! executes it, and `normalize` turns the outcome into one of three results:
//! an `Envelope`, the synthetic 204 `Envelope` for unreachable services, or
//! an `ApiError`.
//!
//! The two variants of the service contract differ in two ways, both keyed
//! on `ClientOptions::include_location_group`: whether `x-location-group` is
//! sent, and how a 4xx is reported (upstream `message` field vs. the raw
//! transport description).

use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

use serde::Serialize;
use serde_json::Value;
use tracing::{debug, error, warn};

use crate::envelope::{
    group_headers, Envelope, ErrorEnvelope, RequestSnapshot, ResponseSnapshot, FALLBACK_MESSAGE,
    FORWARDED_HEADERS,
};
use crate::error::{ApiError, ApiResult, UpstreamFailure};
use crate::http::{HttpMethod, HttpRequest, HttpResponse};
use crate::settings::Settings;
use crate::transport::{Transport, TransportError, UreqTransport};

pub const LOCATION_GROUP_HEADER: &str = "x-location-group";

const COLLECTIONS_PATH: &str = "/assets/collections";
const ENDPOINT_MISSING: &str = "Assets service: endpoint is null";
const BODY_SUMMARY_LIMIT: usize = 120;

/// Selects between the two variants of the service contract.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ClientOptions {
    /// Send `x-location-group` and report 4xx failures with the upstream
    /// `message` field. When unset, no location header is sent and 4xx
    /// failures carry the raw transport description.
    pub include_location_group: bool,
}

/// Synchronous client for the assets collections service.
#[derive(Clone)]
pub struct AssetsClient {
    endpoint: String,
    options: ClientOptions,
    transport: Arc<dyn Transport>,
}

impl fmt::Debug for AssetsClient {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AssetsClient")
            .field("endpoint", &self.endpoint)
            .field("options", &self.options)
            .finish_non_exhaustive()
    }
}

impl AssetsClient {
    /// Client over the default blocking transport. Fails with
    /// `ApiError::Configuration` when `endpoint` is absent or empty.
    pub fn new(endpoint: Option<&str>, options: ClientOptions) -> ApiResult<Self> {
        Self::with_transport(endpoint, options, UreqTransport::new())
    }

    pub fn with_transport(
        endpoint: Option<&str>,
        options: ClientOptions,
        transport: impl Transport + 'static,
    ) -> ApiResult<Self> {
        let endpoint = match endpoint {
            Some(endpoint) if !endpoint.is_empty() => endpoint.to_string(),
            _ => return Err(ApiError::configuration(ENDPOINT_MISSING)),
        };
        Ok(Self {
            endpoint,
            options,
            transport: Arc::new(transport),
        })
    }

    pub fn from_settings(settings: &Settings) -> ApiResult<Self> {
        Self::new(settings.endpoint.as_deref(), settings.client_options())
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    pub fn options(&self) -> ClientOptions {
        self.options
    }

    // --- collections -------------------------------------------------------

    pub fn build_list(&self, location_group: Option<&str>) -> HttpRequest {
        self.request(HttpMethod::Get, COLLECTIONS_PATH.to_string(), location_group, None)
    }

    pub fn build_get_one(&self, id: &str, location_group: Option<&str>) -> HttpRequest {
        self.request(HttpMethod::Get, collection_path(id), location_group, None)
    }

    pub fn build_create<T: Serialize + ?Sized>(
        &self,
        data: &T,
        location_group: Option<&str>,
    ) -> ApiResult<HttpRequest> {
        let body = encode(data)?;
        Ok(self.request(HttpMethod::Post, COLLECTIONS_PATH.to_string(), location_group, Some(body)))
    }

    pub fn build_update<T: Serialize + ?Sized>(
        &self,
        id: &str,
        data: &T,
        location_group: Option<&str>,
    ) -> ApiResult<HttpRequest> {
        let body = encode(data)?;
        Ok(self.request(HttpMethod::Put, collection_path(id), location_group, Some(body)))
    }

    pub fn build_delete(&self, id: &str, location_group: Option<&str>) -> HttpRequest {
        self.request(HttpMethod::Delete, collection_path(id), location_group, None)
    }

    // --- items -------------------------------------------------------------

    pub fn build_list_items(&self, collection_id: &str, location_group: Option<&str>) -> HttpRequest {
        self.request(HttpMethod::Get, items_path(collection_id), location_group, None)
    }

    pub fn build_get_one_item(
        &self,
        collection_id: &str,
        item_id: &str,
        location_group: Option<&str>,
    ) -> HttpRequest {
        self.request(HttpMethod::Get, item_path(collection_id, item_id), location_group, None)
    }

    pub fn build_create_item<T: Serialize + ?Sized>(
        &self,
        collection_id: &str,
        data: &T,
        location_group: Option<&str>,
    ) -> ApiResult<HttpRequest> {
        let body = encode(data)?;
        Ok(self.request(HttpMethod::Post, items_path(collection_id), location_group, Some(body)))
    }

    pub fn build_update_item<T: Serialize + ?Sized>(
        &self,
        collection_id: &str,
        item_id: &str,
        data: &T,
        location_group: Option<&str>,
    ) -> ApiResult<HttpRequest> {
        let body = encode(data)?;
        Ok(self.request(
            HttpMethod::Put,
            item_path(collection_id, item_id),
            location_group,
            Some(body),
        ))
    }

    pub fn build_delete_item(
        &self,
        collection_id: &str,
        item_id: &str,
        location_group: Option<&str>,
    ) -> HttpRequest {
        self.request(HttpMethod::Delete, item_path(collection_id, item_id), location_group, None)
    }

    // --- executing operations ----------------------------------------------

    pub fn list(&self, location_group: Option<&str>) -> ApiResult<Envelope> {
        self.send(self.build_list(location_group))
    }

    pub fn get_one(&self, id: &str, location_group: Option<&str>) -> ApiResult<Envelope> {
        self.send(self.build_get_one(id, location_group))
    }

    pub fn create<T: Serialize + ?Sized>(
        &self,
        data: &T,
        location_group: Option<&str>,
    ) -> ApiResult<Envelope> {
        self.send(self.build_create(data, location_group)?)
    }

    pub fn update<T: Serialize + ?Sized>(
        &self,
        id: &str,
        data: &T,
        location_group: Option<&str>,
    ) -> ApiResult<Envelope> {
        self.send(self.build_update(id, data, location_group)?)
    }

    pub fn delete(&self, id: &str, location_group: Option<&str>) -> ApiResult<Envelope> {
        self.send(self.build_delete(id, location_group))
    }

    pub fn list_items(&self, collection_id: &str, location_group: Option<&str>) -> ApiResult<Envelope> {
        self.send(self.build_list_items(collection_id, location_group))
    }

    pub fn get_one_item(
        &self,
        collection_id: &str,
        item_id: &str,
        location_group: Option<&str>,
    ) -> ApiResult<Envelope> {
        self.send(self.build_get_one_item(collection_id, item_id, location_group))
    }

    pub fn create_item<T: Serialize + ?Sized>(
        &self,
        collection_id: &str,
        data: &T,
        location_group: Option<&str>,
    ) -> ApiResult<Envelope> {
        self.send(self.build_create_item(collection_id, data, location_group)?)
    }

    pub fn update_item<T: Serialize + ?Sized>(
        &self,
        collection_id: &str,
        item_id: &str,
        data: &T,
        location_group: Option<&str>,
    ) -> ApiResult<Envelope> {
        self.send(self.build_update_item(collection_id, item_id, data, location_group)?)
    }

    pub fn delete_item(
        &self,
        collection_id: &str,
        item_id: &str,
        location_group: Option<&str>,
    ) -> ApiResult<Envelope> {
        self.send(self.build_delete_item(collection_id, item_id, location_group))
    }

    /// Execute `request` on the client's transport and normalize the outcome.
    pub fn send(&self, request: HttpRequest) -> ApiResult<Envelope> {
        debug!(method = request.method.as_str(), url = %request.path, "assets request");
        let outcome = self.transport.execute(&request);
        self.normalize(&request, outcome)
    }

    /// Map a transport outcome onto the caller-facing result.
    pub fn normalize(
        &self,
        request: &HttpRequest,
        outcome: Result<HttpResponse, TransportError>,
    ) -> ApiResult<Envelope> {
        let response = match outcome {
            Ok(response) => response,
            Err(TransportError::Connect(reason)) => {
                warn!(url = %request.path, %reason, "assets service unreachable, reporting 204");
                return Ok(Envelope::no_content());
            }
            Err(TransportError::Other(reason)) => {
                error!(url = %request.path, %reason, "assets request failed");
                return Err(server_error(request, None, UpstreamFailure::Transport(reason)));
            }
        };

        match response.status {
            status if status < 400 => Ok(success(response)),
            status @ 400..=499 => {
                let message = if self.options.include_location_group {
                    upstream_message(&response.body)
                } else {
                    raw_client_error(request, &response)
                };
                debug!(url = %request.path, status, %message, "assets client error");
                Err(ApiError::UpstreamClient { message, status })
            }
            status => {
                error!(url = %request.path, status, "assets service error");
                let failure = UpstreamFailure::Status {
                    method: request.method.as_str(),
                    url: request.path.clone(),
                    status,
                };
                Err(server_error(request, Some(&response), failure))
            }
        }
    }

    fn request(
        &self,
        method: HttpMethod,
        path: String,
        location_group: Option<&str>,
        body: Option<String>,
    ) -> HttpRequest {
        let mut headers = vec![("content-type".to_string(), "application/json".to_string())];
        if self.options.include_location_group {
            if let Some(group) = location_group {
                headers.push((LOCATION_GROUP_HEADER.to_string(), group.to_string()));
            }
        }
        HttpRequest {
            method,
            path: format!("{}{path}", self.endpoint),
            headers,
            body,
        }
    }
}

fn collection_path(id: &str) -> String {
    format!("{COLLECTIONS_PATH}/{id}")
}

fn items_path(collection_id: &str) -> String {
    format!("{COLLECTIONS_PATH}/{collection_id}/items")
}

fn item_path(collection_id: &str, item_id: &str) -> String {
    format!("{COLLECTIONS_PATH}/{collection_id}/items/{item_id}")
}

fn encode<T: Serialize + ?Sized>(data: &T) -> ApiResult<String> {
    serde_json::to_string(data).map_err(|e| ApiError::Serialization(e.to_string()))
}

fn success(response: HttpResponse) -> Envelope {
    let mut headers = BTreeMap::new();
    for name in FORWARDED_HEADERS {
        let values = response.header_values(name);
        if !values.is_empty() {
            headers.insert(name.to_string(), values);
        }
    }
    Envelope {
        body: serde_json::from_str(&response.body).unwrap_or(Value::Null),
        headers,
        status_code: response.status,
    }
}

/// The `message` field of a JSON error body, or the fallback text.
fn upstream_message(body: &str) -> String {
    serde_json::from_str::<Value>(body)
        .ok()
        .and_then(|v| v.get("message").and_then(Value::as_str).map(str::to_string))
        .unwrap_or_else(|| FALLBACK_MESSAGE.to_string())
}

/// Describe a 4xx the way the HTTP layer reports it, including a summary of
/// the response body.
fn raw_client_error(request: &HttpRequest, response: &HttpResponse) -> String {
    let reason = ureq::http::StatusCode::from_u16(response.status)
        .ok()
        .and_then(|s| s.canonical_reason())
        .unwrap_or("");
    let mut message = format!(
        "Client error: `{} {}` resulted in a `{} {}` response",
        request.method.as_str(),
        request.path,
        response.status,
        reason
    );
    if let Some(summary) = body_summary(&response.body) {
        message.push_str(":\n");
        message.push_str(&summary);
    }
    message
}

fn body_summary(body: &str) -> Option<String> {
    if body.is_empty() {
        return None;
    }
    if body.chars().count() <= BODY_SUMMARY_LIMIT {
        return Some(body.to_string());
    }
    let truncated: String = body.chars().take(BODY_SUMMARY_LIMIT).collect();
    Some(format!("{truncated} (truncated...)"))
}

fn server_error(
    request: &HttpRequest,
    response: Option<&HttpResponse>,
    source: UpstreamFailure,
) -> ApiError {
    let bundle = ErrorEnvelope {
        message: FALLBACK_MESSAGE.to_string(),
        request: RequestSnapshot {
            headers: group_headers(&request.headers),
            body: request.body.clone().unwrap_or_default(),
        },
        response: match response {
            Some(response) => ResponseSnapshot {
                headers: group_headers(&response.headers),
                body: response.body.clone(),
                status: response.status,
            },
            None => ResponseSnapshot {
                headers: Default::default(),
                body: String::new(),
                status: 0,
            },
        },
    };
    // Only string maps and integers: serialization cannot fail.
    let payload = serde_json::to_string(&bundle).unwrap_or_default();
    ApiError::UpstreamServer { payload, source }
}
