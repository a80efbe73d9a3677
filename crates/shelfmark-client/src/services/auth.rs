use std::sync::Arc;

use shelfmark_core::{LoginRequest, LoginResponse, Session, SignupRequest, SignupResponse, User};
use tracing::{info, warn};

use crate::error::Result;
use crate::http::ApiClient;

/// Sign-in, sign-up and sign-out against `/auth/*`, keeping the shared
/// `SessionStore` in step.
#[derive(Debug, Clone)]
pub struct AuthService {
    api: Arc<ApiClient>,
}

impl AuthService {
    pub fn new(api: Arc<ApiClient>) -> Self {
        Self { api }
    }

    pub async fn login(&self, request: &LoginRequest) -> Result<User> {
        request.validate()?;
        let resp: LoginResponse = self.api.post_json(&["auth", "login"], request).await?;
        let session = Session::from(resp);
        let user = session.user.clone();
        self.api.session().save(session)?;
        info!(user = %user.email, role = %user.role, "signed in");
        Ok(user)
    }

    pub async fn signup(&self, request: &SignupRequest) -> Result<SignupResponse> {
        request.validate()?;
        let resp: SignupResponse = self.api.post_json(&["auth", "signup"], request).await?;
        info!(email = %request.email, "account created");
        Ok(resp)
    }

    /// Notify the server, then drop the local session whatever the server said.
    pub async fn logout(&self) -> Result<()> {
        let remote = self
            .api
            .post_unit(&["auth", "logout"], &serde_json::json!({}))
            .await;
        if let Err(e) = &remote {
            warn!(error = %e, "server-side logout failed");
        }
        self.api.session().clear()?;
        info!("signed out");
        remote
    }

    pub fn current_user(&self) -> Option<User> {
        self.api.session().user()
    }

    pub fn is_authenticated(&self) -> bool {
        self.api.session().is_authenticated()
    }
}
