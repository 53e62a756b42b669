//! Synchronous client for the assets collections service.
//!
//! # Overview
//! `AssetsClient` issues CRUD requests against `/assets/collections` and
//! `/assets/collections/{id}/items`, and normalizes every exchange into an
//! `Envelope` or an `ApiError`. `AssetsProvider` builds one client from
//! `Settings` and shares it for the application's lifetime.
//!
//! # Design
//! - Each operation is `build_*` (pure) + `Transport::execute` (I/O) +
//!   `AssetsClient::normalize` (pure), so the mapping rules are testable
//!   without a network.
//! - An unreachable service is reported as an empty 204 envelope, not an
//!   error.
//! - The location-group variant of the contract is a `ClientOptions` flag.

pub mod client;
pub mod envelope;
pub mod error;
pub mod http;
pub mod provider;
pub mod settings;
pub mod transport;

pub use client::{AssetsClient, ClientOptions};
pub use envelope::{Envelope, ErrorEnvelope};
pub use error::{ApiError, ApiResult, UpstreamFailure};
pub use http::{HttpMethod, HttpRequest, HttpResponse};
pub use provider::AssetsProvider;
pub use settings::Settings;
pub use transport::{Transport, TransportError, UreqTransport};
