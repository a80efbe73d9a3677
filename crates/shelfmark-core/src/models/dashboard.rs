use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::Role;

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct DashboardData {
    #[serde(default)]
    pub cards: Vec<DashboardCard>,
    #[serde(default)]
    pub tables: Vec<DashboardTable>,
    #[serde(default)]
    pub lists: Vec<DashboardList>,
}

impl DashboardData {
    pub fn is_empty(&self) -> bool {
        self.cards.is_empty() && self.tables.is_empty() && self.lists.is_empty()
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DashboardCard {
    pub label: String,
    pub metrics: f64,
}

/// Rows are free-form objects keyed by column name.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DashboardTable {
    pub title: String,
    #[serde(default)]
    pub columns: Vec<String>,
    #[serde(default)]
    pub items: Vec<Value>,
}

impl DashboardTable {
    /// Cell text for `column` in row `index`, empty when absent.
    pub fn cell(&self, index: usize, column: &str) -> String {
        match self.items.get(index).and_then(|row| row.get(column)) {
            Some(Value::String(s)) => s.clone(),
            Some(Value::Null) | None => String::new(),
            Some(other) => other.to_string(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DashboardList {
    pub title: String,
    #[serde(default)]
    pub items: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DashboardRequest {
    pub user_id: String,
    pub role: Role,
}
