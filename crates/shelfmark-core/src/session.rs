//! Signed-in session context with an explicit load / save / clear lifecycle.

use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::{PoisonError, RwLock};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::error::{Result, ShelfmarkError};
use crate::models::{LoginResponse, Role, User};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Session {
    pub user: User,
    pub access_token: String,
    #[serde(default)]
    pub refresh_token: String,
    pub signed_in_at: DateTime<Utc>,
}

impl From<LoginResponse> for Session {
    fn from(resp: LoginResponse) -> Self {
        Self {
            user: resp.user,
            access_token: resp.access_token,
            refresh_token: resp.refresh_token,
            signed_in_at: Utc::now(),
        }
    }
}

/// Holds the current session, optionally mirrored to a JSON file.
///
/// Shared behind an `Arc` by the HTTP client (to attach the bearer token and
/// tear the session down on 401) and by whatever drives the views.
#[derive(Debug)]
pub struct SessionStore {
    path: Option<PathBuf>,
    current: RwLock<Option<Session>>,
}

impl SessionStore {
    /// Session that lives only in memory.
    pub fn in_memory() -> Self {
        Self {
            path: None,
            current: RwLock::new(None),
        }
    }

    /// Open the store at `path`, loading any session saved there.
    /// An unreadable file is discarded rather than treated as fatal.
    pub fn open(path: impl Into<PathBuf>) -> Self {
        let path = path.into();
        let current = match Self::read_file(&path) {
            Ok(session) => session,
            Err(e) => {
                warn!(path = %path.display(), error = %e, "discarding unreadable session file");
                let _ = std::fs::remove_file(&path);
                None
            }
        };
        Self {
            path: Some(path),
            current: RwLock::new(current),
        }
    }

    fn read_file(path: &Path) -> Result<Option<Session>> {
        if !path.exists() {
            return Ok(None);
        }
        let contents = std::fs::read_to_string(path)?;
        Ok(Some(serde_json::from_str(&contents)?))
    }

    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    pub fn current(&self) -> Option<Session> {
        self.current
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    pub fn is_authenticated(&self) -> bool {
        self.current
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .is_some()
    }

    pub fn access_token(&self) -> Option<String> {
        self.current
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .as_ref()
            .map(|s| s.access_token.clone())
    }

    pub fn user(&self) -> Option<User> {
        self.current().map(|s| s.user)
    }

    /// Role of the signed-in user; anonymous callers get the least-privileged role.
    pub fn role(&self) -> Role {
        self.user().map(|u| u.role).unwrap_or_default()
    }

    /// The signed-in user, or `NotSignedIn`.
    pub fn require_user(&self) -> Result<User> {
        self.user().ok_or(ShelfmarkError::NotSignedIn)
    }

    /// Replace the current session and persist it.
    pub fn save(&self, session: Session) -> Result<()> {
        if let Some(path) = &self.path {
            if let Some(parent) = path.parent() {
                std::fs::create_dir_all(parent)?;
            }
            let json = serde_json::to_string_pretty(&session)?;
            write_private(path, json.as_bytes())?;
        }
        debug!(user = %session.user.email, "session saved");
        *self.current.write().unwrap_or_else(PoisonError::into_inner) = Some(session);
        Ok(())
    }

    /// Forget the session in memory and on disk.
    pub fn clear(&self) -> Result<()> {
        self.current
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
        if let Some(path) = &self.path {
            match std::fs::remove_file(path) {
                Ok(()) => {}
                Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
                Err(e) => return Err(e.into()),
            }
        }
        debug!("session cleared");
        Ok(())
    }
}

/// Write `contents` readable by the owner only, tightening an existing file.
fn write_private(path: &Path, contents: &[u8]) -> std::io::Result<()> {
    let mut options = std::fs::OpenOptions::new();
    options.write(true).create(true).truncate(true);
    #[cfg(unix)]
    {
        use std::os::unix::fs::OpenOptionsExt;
        options.mode(0o600);
    }
    let mut file = options.open(path)?;
    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        file.set_permissions(std::fs::Permissions::from_mode(0o600))?;
    }
    file.write_all(contents)
}
