use std::sync::Arc;

use shelfmark_core::{DashboardData, DashboardRequest};
use tracing::debug;

use crate::error::Result;
use crate::http::ApiClient;

#[derive(Debug, Clone)]
pub struct DashboardService {
    api: Arc<ApiClient>,
}

impl DashboardService {
    pub fn new(api: Arc<ApiClient>) -> Self {
        Self { api }
    }

    /// Dashboard sections for `request.user_id` as seen with `request.role`.
    pub async fn fetch(&self, request: &DashboardRequest) -> Result<DashboardData> {
        let data: DashboardData = self
            .api
            .get_json_with_query(&["dashboard"], request)
            .await?;
        debug!(
            cards = data.cards.len(),
            tables = data.tables.len(),
            lists = data.lists.len(),
            "fetched dashboard"
        );
        Ok(data)
    }
}
