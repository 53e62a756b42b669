//! Registration of the shared client.
//!
//! # Design
//! The provider owns the settings and a single lazily-filled slot. The first
//! `client()` call builds the `AssetsClient`; every later call hands out the
//! same `Arc`. Components receive the provider (or the `Arc`) through their
//! constructors, so no global state is involved.

use std::sync::Arc;

use once_cell::sync::OnceCell;
use tracing::{info, warn};

use crate::client::AssetsClient;
use crate::error::ApiResult;
use crate::settings::Settings;

/// Lazily constructs and shares one `AssetsClient` for the application.
#[derive(Debug)]
pub struct AssetsProvider {
    settings: Settings,
    client: OnceCell<Arc<AssetsClient>>,
}

impl AssetsProvider {
    /// Key the client is known by among application services.
    pub const SERVICE_KEY: &'static str = "hatch-is.assets-mcs.processor";
    /// Key of the endpoint configuration value.
    pub const ENDPOINT_KEY: &'static str = "hatch-is.assets-mcs.endpoint";

    pub fn new(settings: Settings) -> Self {
        Self {
            settings,
            client: OnceCell::new(),
        }
    }

    pub fn from_env() -> Self {
        Self::new(Settings::from_env())
    }

    pub fn settings(&self) -> &Settings {
        &self.settings
    }

    /// The shared client, built on first access. Concurrent first callers
    /// block until the single build finishes. A construction failure is
    /// returned and nothing is cached, so a later call retries.
    pub fn client(&self) -> ApiResult<Arc<AssetsClient>> {
        self.client_with(AssetsClient::from_settings)
    }

    /// Like `client`, with a caller-supplied constructor for the first build.
    pub fn client_with(
        &self,
        build: impl FnOnce(&Settings) -> ApiResult<AssetsClient>,
    ) -> ApiResult<Arc<AssetsClient>> {
        let client = self.client.get_or_try_init(|| -> ApiResult<Arc<AssetsClient>> {
            let client = build(&self.settings).inspect_err(|e| {
                warn!(
                    key = Self::SERVICE_KEY,
                    config = Self::ENDPOINT_KEY,
                    error = %e,
                    "assets client not registered"
                );
            })?;
            info!(
                key = Self::SERVICE_KEY,
                config = Self::ENDPOINT_KEY,
                endpoint = client.endpoint(),
                "assets client registered"
            );
            Ok(Arc::new(client))
        })?;
        Ok(Arc::clone(client))
    }

    pub fn is_initialized(&self) -> bool {
        self.client.get().is_some()
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Barrier;
    use std::thread;
    use std::time::Duration;

    use super::*;
    use crate::error::ApiError;

    #[test]
    fn client_is_built_once_and_shared() {
        let provider = AssetsProvider::new(Settings::new("http://assets.local"));
        assert!(!provider.is_initialized());

        let first = provider.client().unwrap();
        let second = provider.client().unwrap();
        assert!(Arc::ptr_eq(&first, &second));
        assert!(provider.is_initialized());
        assert_eq!(first.endpoint(), "http://assets.local");
    }

    #[test]
    fn missing_endpoint_fails_and_is_not_cached() {
        let provider = AssetsProvider::new(Settings::default());
        let err = provider.client().unwrap_err();
        assert!(matches!(err, ApiError::Configuration(_)));
        assert!(!provider.is_initialized());
    }

    #[test]
    fn concurrent_first_access_builds_once() {
        let provider = AssetsProvider::new(Settings::new("http://assets.local"));
        let builds = AtomicUsize::new(0);
        let barrier = Barrier::new(8);

        let clients: Vec<Arc<AssetsClient>> = thread::scope(|s| {
            let handles: Vec<_> = (0..8)
                .map(|_| {
                    s.spawn(|| {
                        barrier.wait();
                        provider
                            .client_with(|settings| {
                                builds.fetch_add(1, Ordering::SeqCst);
                                thread::sleep(Duration::from_millis(20));
                                AssetsClient::from_settings(settings)
                            })
                            .unwrap()
                    })
                })
                .collect();
            handles.into_iter().map(|h| h.join().unwrap()).collect()
        });

        assert_eq!(builds.load(Ordering::SeqCst), 1);
        assert!(clients.iter().all(|c| Arc::ptr_eq(c, &clients[0])));
    }

    #[test]
    fn registry_keys() {
        assert_eq!(AssetsProvider::SERVICE_KEY, "hatch-is.assets-mcs.processor");
        assert_eq!(AssetsProvider::ENDPOINT_KEY, "hatch-is.assets-mcs.endpoint");
    }

    #[test]
    fn options_flow_from_settings() {
        let provider = AssetsProvider::new(Settings::new("http://assets.local").with_location_group(true));
        let client = provider.client().unwrap();
        assert!(client.options().include_location_group);
    }
}
