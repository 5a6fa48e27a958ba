// Remote-lock endpoints
//
// Thin wrappers over `SessionManager::authenticated_get`. Every endpoint
// takes the lock id as the `arguments` query parameter.

use serde::Deserialize;
use tracing::debug;
use url::Url;

use crate::client::KevoClient;
use crate::error::Error;
use crate::models::{LockDetails, LockId};

const COMMANDS_PATH: &str = "user/remote_locks/command/";
const AUTH_SHOW_PATH: &str = "user/remote_locks/auth/show.json";

impl KevoClient {
    /// Fetch a point-in-time snapshot of a lock.
    ///
    /// `GET /user/remote_locks/command/lock.json?arguments={id}`
    pub async fn get_lock(&self, id: &LockId) -> Result<LockDetails, Error> {
        let url = self.command_url("lock.json", id)?;
        debug!(%id, "fetching lock details");
        let body = self.session().authenticated_get(url).await?;
        LockDetails::deserialize(&body).map_err(|e| Error::Deserialization {
            message: e.to_string(),
            body: body.to_string(),
        })
    }

    /// Lock the bolt. Locking an already locked lock is a no-op on the
    /// portal side.
    ///
    /// `GET /user/remote_locks/command/remote_lock.json?arguments={id}`
    pub async fn lock(&self, id: &LockId) -> Result<(), Error> {
        let url = self.command_url("remote_lock.json", id)?;
        debug!(%id, "sending lock command");
        self.session().authenticated_get(url).await?;
        Ok(())
    }

    /// Unlock the bolt. Unlocking an already unlocked lock is a no-op on
    /// the portal side.
    ///
    /// `GET /user/remote_locks/command/remote_unlock.json?arguments={id}`
    pub async fn unlock(&self, id: &LockId) -> Result<(), Error> {
        let url = self.command_url("remote_unlock.json", id)?;
        debug!(%id, "sending unlock command");
        self.session().authenticated_get(url).await?;
        Ok(())
    }

    /// Discover the push-channel endpoint for the current session.
    ///
    /// `GET /user/remote_locks/auth/show.json` → `socket_location`
    pub async fn websocket_url(&self) -> Result<Url, Error> {
        let url = self.session().url(AUTH_SHOW_PATH)?;
        debug!("fetching websocket location");
        let body = self.session().authenticated_get(url).await?;

        let location = body
            .get("socket_location")
            .and_then(serde_json::Value::as_str)
            .ok_or_else(|| Error::Deserialization {
                message: "missing socket_location".into(),
                body: body.to_string(),
            })?;

        Url::parse(location).map_err(|e| Error::Deserialization {
            message: format!("invalid socket_location: {e}"),
            body: body.to_string(),
        })
    }

    fn command_url(&self, endpoint: &str, id: &LockId) -> Result<Url, Error> {
        let mut url = self.session().url(&format!("{COMMANDS_PATH}{endpoint}"))?;
        url.query_pairs_mut().append_pair("arguments", id.as_str());
        Ok(url)
    }
}
