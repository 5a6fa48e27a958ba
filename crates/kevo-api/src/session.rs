// Authenticated portal session
//
// Owns the cookie-carrying HTTP client, performs the scrape-token-then-post
// login dance, and provides `authenticated_get`, the primitive every
// command is built on. Sessions are replaced wholesale: a login always
// starts from a fresh client and an empty cookie jar.

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use arc_swap::ArcSwapOption;
use reqwest::StatusCode;
use reqwest::cookie::Jar;
use tokio::sync::Mutex;
use tracing::{debug, warn};
use url::Url;

use crate::auth::Credentials;
use crate::error::Error;
use crate::token::extract_authenticity_token;
use crate::transport::TransportConfig;

const LOGIN_PATH: &str = "login";
const SIGNIN_PATH: &str = "signin";

/// What `authenticated_get` does with a 500 received on an existing session.
///
/// In both cases the session is re-established first.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum StaleSessionPolicy {
    /// Re-issue the GET once on the fresh session, then decode and return
    /// the body of the original 500 response. A failure on the re-issued
    /// request is still an error.
    #[default]
    ReuseStaleResponse,
    /// Re-issue the GET once on the fresh session and return its body.
    RetryAfterLogin,
}

/// Lifecycle of the portal session.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    Absent,
    Authenticating,
    Active,
}

/// One logged-in HTTP context.
pub(crate) struct Session {
    http: reqwest::Client,
    generation: u64,
}

/// Owner of the (single) authenticated session.
///
/// Safe to share between tasks. Requests clone the current session handle
/// and never hold a lock across I/O; logins are serialized so a burst of
/// expired requests triggers one re-login, not one per request.
pub struct SessionManager {
    base_url: Url,
    credentials: Credentials,
    transport: TransportConfig,
    stale_policy: StaleSessionPolicy,
    session: ArcSwapOption<Session>,
    login_lock: Mutex<()>,
    generations: AtomicU64,
}

impl SessionManager {
    /// `base_url` is the portal root, e.g. `https://www.mykevo.com`.
    pub fn new(
        base_url: Url,
        credentials: Credentials,
        transport: TransportConfig,
        stale_policy: StaleSessionPolicy,
    ) -> Self {
        Self {
            base_url: with_trailing_slash(base_url),
            credentials,
            transport,
            stale_policy,
            session: ArcSwapOption::empty(),
            login_lock: Mutex::new(()),
            generations: AtomicU64::new(0),
        }
    }

    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    pub fn username(&self) -> &str {
        self.credentials.username()
    }

    pub fn stale_policy(&self) -> StaleSessionPolicy {
        self.stale_policy
    }

    /// Resolve a portal path (no leading slash) against the base URL.
    pub fn url(&self, path: &str) -> Result<Url, Error> {
        Ok(self.base_url.join(path)?)
    }

    pub fn has_session(&self) -> bool {
        self.session.load().is_some()
    }

    pub fn state(&self) -> SessionState {
        if self.has_session() {
            SessionState::Active
        } else if self.login_lock.try_lock().is_err() {
            SessionState::Authenticating
        } else {
            SessionState::Absent
        }
    }

    /// Generation of the current session; increases with every login.
    pub fn session_generation(&self) -> Option<u64> {
        self.session.load().as_ref().map(|s| s.generation)
    }

    /// Drop the current session. The next request logs in again.
    pub fn invalidate(&self) {
        debug!("invalidating portal session");
        self.session.store(None);
    }

    // ── Login ────────────────────────────────────────────────────────

    /// Create a fresh session and log in.
    ///
    /// Fetches `/login`, scrapes the `authenticity_token`, and posts the
    /// credentials to `/signin`. The response to the post is read but not
    /// inspected; only transport failures are reported.
    pub async fn login(&self) -> Result<(), Error> {
        let _guard = self.login_lock.lock().await;
        self.login_locked().await.map(|_| ())
    }

    /// Log in unless another caller already replaced the session we saw.
    ///
    /// `seen` is the generation the caller was using (or `None` if it saw
    /// no session at all).
    async fn refresh(&self, seen: Option<u64>) -> Result<Arc<Session>, Error> {
        let _guard = self.login_lock.lock().await;

        if let Some(current) = self.session.load_full() {
            if seen.is_none_or(|g| current.generation > g) {
                debug!(
                    generation = current.generation,
                    "session already refreshed by a concurrent request"
                );
                return Ok(current);
            }
        }

        self.login_locked().await
    }

    /// Must be called with `login_lock` held.
    async fn login_locked(&self) -> Result<Arc<Session>, Error> {
        self.session.store(None);

        let http = self.transport.build_client(Arc::new(Jar::default()))?;

        let login_url = self.url(LOGIN_PATH)?;
        debug!("fetching login page at {}", login_url);
        let page = http
            .get(login_url)
            .send()
            .await
            .map_err(auth_error)?
            .text()
            .await
            .map_err(auth_error)?;

        let token = extract_authenticity_token(&page)?;

        let signin_url = self.url(SIGNIN_PATH)?;
        debug!(username = self.credentials.username(), "signing in at {}", signin_url);
        let resp = http
            .post(signin_url)
            .form(&self.credentials.login_form(&token))
            .send()
            .await
            .map_err(auth_error)?;
        let status = resp.status();
        // Content is ignored; only transport failures count.
        resp.text().await.map_err(auth_error)?;

        let generation = self.generations.fetch_add(1, Ordering::SeqCst) + 1;
        debug!(%status, generation, "login complete");

        let session = Arc::new(Session { http, generation });
        self.session.store(Some(Arc::clone(&session)));
        Ok(session)
    }

    // ── Requests ─────────────────────────────────────────────────────

    /// GET `url` with the portal session and decode the JSON body.
    ///
    /// - No session yet: log in, then GET once. A 500 is terminal.
    /// - Session present: GET once. On a 500 the session is re-established
    ///   and the GET re-issued once; which body is returned depends on
    ///   [`StaleSessionPolicy`].
    /// - Any other non-2xx status is [`Error::Api`].
    pub async fn authenticated_get(&self, url: Url) -> Result<serde_json::Value, Error> {
        let Some(session) = self.session.load_full() else {
            debug!("no portal session, logging in first");
            let session = self.refresh(None).await?;
            return get_once(&session, url).await;
        };

        debug!("GET {}", url);
        let resp = session.http.get(url.clone()).send().await?;

        if resp.status() != StatusCode::INTERNAL_SERVER_ERROR {
            return read_json(resp).await;
        }

        let stale_body = resp.text().await?;
        warn!(
            generation = session.generation,
            "portal returned 500, re-establishing session"
        );
        let fresh = self.refresh(Some(session.generation)).await?;

        // Both policies send the request again; a 500 here is terminal.
        let retried = get_once(&fresh, url).await?;
        match self.stale_policy {
            StaleSessionPolicy::ReuseStaleResponse => decode_json(&stale_body),
            StaleSessionPolicy::RetryAfterLogin => Ok(retried),
        }
    }
}

impl std::fmt::Debug for SessionManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SessionManager")
            .field("base_url", &self.base_url.as_str())
            .field("username", &self.credentials.username())
            .field("stale_policy", &self.stale_policy)
            .field("generation", &self.session_generation())
            .finish_non_exhaustive()
    }
}

// ── Helpers ──────────────────────────────────────────────────────────

/// Single GET where a 500 is terminal.
async fn get_once(session: &Session, url: Url) -> Result<serde_json::Value, Error> {
    debug!("GET {}", url);
    let resp = session.http.get(url).send().await?;
    read_json(resp).await
}

async fn read_json(resp: reqwest::Response) -> Result<serde_json::Value, Error> {
    let status = resp.status();
    let body = resp.text().await?;

    if !status.is_success() {
        return Err(Error::Api {
            status: status.as_u16(),
            body,
        });
    }

    decode_json(&body)
}

fn decode_json(body: &str) -> Result<serde_json::Value, Error> {
    serde_json::from_str(body).map_err(|e| Error::Deserialization {
        message: e.to_string(),
        body: body.to_owned(),
    })
}

fn auth_error(err: reqwest::Error) -> Error {
    Error::Authentication {
        message: err.to_string(),
    }
}

/// `Url::join` drops the last path segment unless it ends in `/`.
fn with_trailing_slash(mut url: Url) -> Url {
    if !url.path().ends_with('/') {
        let path = format!("{}/", url.path());
        url.set_path(&path);
    }
    url
}
