// Kevo portal client
//
// The handle integrations hold on to. Bundles the session manager and the
// observer registry behind an `Arc` so the push task and command callers
// share one login. Endpoint methods live in `commands.rs`.

use std::sync::Arc;

use url::Url;

use crate::auth::Credentials;
use crate::models::PushMessage;
use crate::observers::{ObserverId, ObserverRegistry};
use crate::session::{SessionManager, StaleSessionPolicy};
use crate::transport::TransportConfig;

/// Public portal host.
pub const DEFAULT_BASE_URL: &str = "https://www.mykevo.com";

/// Everything needed to construct a [`KevoClient`].
#[derive(Debug, Clone)]
pub struct ClientConfig {
    pub base_url: Url,
    pub credentials: Credentials,
    pub transport: TransportConfig,
    pub stale_session_policy: StaleSessionPolicy,
}

impl ClientConfig {
    /// Config for the public portal with default transport settings.
    pub fn new(credentials: Credentials) -> Self {
        Self {
            base_url: Url::parse(DEFAULT_BASE_URL).expect("default base URL is valid"),
            credentials,
            transport: TransportConfig::default(),
            stale_session_policy: StaleSessionPolicy::default(),
        }
    }

    pub fn with_base_url(mut self, base_url: Url) -> Self {
        self.base_url = base_url;
        self
    }

    pub fn with_transport(mut self, transport: TransportConfig) -> Self {
        self.transport = transport;
        self
    }

    pub fn with_stale_session_policy(mut self, policy: StaleSessionPolicy) -> Self {
        self.stale_session_policy = policy;
        self
    }
}

/// Async client for one Kevo account.
///
/// Cheap to clone; clones share the session and the observer set. Nothing
/// touches the network until the first request, which logs in lazily.
#[derive(Debug, Clone)]
pub struct KevoClient {
    inner: Arc<ClientInner>,
}

#[derive(Debug)]
struct ClientInner {
    session: SessionManager,
    observers: ObserverRegistry,
}

impl KevoClient {
    pub fn new(config: ClientConfig) -> Self {
        let session = SessionManager::new(
            config.base_url,
            config.credentials,
            config.transport,
            config.stale_session_policy,
        );
        Self {
            inner: Arc::new(ClientInner {
                session,
                observers: ObserverRegistry::new(),
            }),
        }
    }

    /// Shorthand for the public portal with default settings.
    pub fn with_credentials(credentials: Credentials) -> Self {
        Self::new(ClientConfig::new(credentials))
    }

    pub fn session(&self) -> &SessionManager {
        &self.inner.session
    }

    pub fn observers(&self) -> &ObserverRegistry {
        &self.inner.observers
    }

    // ── Observers ────────────────────────────────────────────────────

    /// Register a callback invoked for every push message.
    pub fn subscribe<F>(&self, callback: F) -> ObserverId
    where
        F: Fn(&PushMessage) + Send + Sync + 'static,
    {
        self.inner.observers.subscribe(callback)
    }

    /// Remove a previously registered callback.
    pub fn unsubscribe(&self, id: ObserverId) -> bool {
        self.inner.observers.unsubscribe(id)
    }
}
