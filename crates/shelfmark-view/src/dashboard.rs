use std::sync::Arc;

use shelfmark_client::{ApiClient, ClientError, DashboardService, Result};
use shelfmark_core::{DashboardData, DashboardRequest, SessionStore};
use tracing::warn;

/// Role-specific landing data for the signed-in user.
#[derive(Debug)]
pub struct DashboardController {
    service: DashboardService,
    session: Arc<SessionStore>,
    data: Option<DashboardData>,
    loading: bool,
    error: Option<String>,
}

impl DashboardController {
    pub fn new(api: Arc<ApiClient>) -> Self {
        let session = Arc::clone(api.session());
        Self {
            service: DashboardService::new(api),
            session,
            data: None,
            loading: false,
            error: None,
        }
    }

    pub fn data(&self) -> Option<&DashboardData> {
        self.data.as_ref()
    }

    pub fn is_loading(&self) -> bool {
        self.loading
    }

    pub fn error(&self) -> Option<&str> {
        self.error.as_deref()
    }

    /// Fetch the dashboard for the current session. Previously loaded data is
    /// kept when the fetch fails.
    pub async fn load(&mut self) -> Result<&DashboardData> {
        let user = match self.session.require_user() {
            Ok(user) => user,
            Err(e) => {
                let err = ClientError::from(e);
                self.error = Some(dashboard_message(&err));
                return Err(err);
            }
        };
        let request = DashboardRequest {
            user_id: user.user_id,
            role: user.role,
        };

        self.loading = true;
        let result = self.service.fetch(&request).await;
        self.loading = false;

        match result {
            Ok(data) => {
                self.error = None;
                Ok(&*self.data.insert(data))
            }
            Err(e) => {
                warn!(error = %e, "dashboard load failed");
                self.error = Some(dashboard_message(&e));
                Err(e)
            }
        }
    }
}

fn dashboard_message(err: &ClientError) -> String {
    if err.requires_sign_in() {
        return "Session expired. Please login again.".to_string();
    }
    match err {
        ClientError::Forbidden(_) => {
            "Access denied. You do not have permission to view the dashboard.".to_string()
        }
        _ => "Failed to load dashboard data. Please try again.".to_string(),
    }
}
