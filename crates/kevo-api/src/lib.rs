// kevo-api: Async Rust client for the Kevo smart-lock web portal

pub mod auth;
pub mod client;
pub mod commands;
pub mod error;
pub mod models;
pub mod observers;
pub mod session;
pub mod token;
pub mod transport;
pub mod websocket;

pub use auth::Credentials;
pub use client::{ClientConfig, DEFAULT_BASE_URL, KevoClient};
pub use error::{Error, ErrorKind};
pub use models::{BoltState, LockDetails, LockId, PushMessage};
pub use observers::{Observer, ObserverId, ObserverRegistry};
pub use session::{SessionManager, SessionState, StaleSessionPolicy};
pub use token::extract_authenticity_token;
pub use transport::{TlsMode, TransportConfig};
pub use websocket::{ChannelState, PushHandle, ReconnectConfig};
