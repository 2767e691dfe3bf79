use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

#[derive(Debug, Clone, PartialEq, Eq, Hash, Deserialize, Serialize)]
#[serde(untagged)]
pub enum AttributeId {
    Number(i64),
    Text(String),
}

impl AttributeId {
    pub fn as_i64(&self) -> Option<i64> {
        match self {
            AttributeId::Number(value) => Some(*value),
            AttributeId::Text(value) => value.trim().parse().ok(),
        }
    }
}

impl From<i64> for AttributeId {
    fn from(value: i64) -> Self {
        AttributeId::Number(value)
    }
}

impl fmt::Display for AttributeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AttributeId::Number(value) => write!(f, "{value}"),
            AttributeId::Text(value) => write!(f, "{value}"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct TimeRecord {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<i64>,
    pub domain_id: AttributeId,
    pub category_id: AttributeId,
    pub title_id: AttributeId,
    #[serde(rename = "timein")]
    pub time_in: DateTime<Utc>,
    /// `None` while the record is still running.
    #[serde(rename = "timeout", default)]
    pub time_out: Option<DateTime<Utc>>,
    #[serde(default)]
    pub external_link: Option<String>,
    #[serde(default)]
    pub notes: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub jira_issue_key: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub jira_worklog_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub jira_synced: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub jira_sync_error: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_synced_at: Option<DateTime<Utc>>,
}

impl TimeRecord {
    pub fn new(
        domain_id: AttributeId,
        category_id: AttributeId,
        title_id: AttributeId,
        time_in: DateTime<Utc>,
    ) -> Self {
        Self {
            id: None,
            domain_id,
            category_id,
            title_id,
            time_in,
            time_out: None,
            external_link: None,
            notes: None,
            jira_issue_key: None,
            jira_worklog_id: None,
            jira_synced: None,
            jira_sync_error: None,
            last_synced_at: None,
        }
    }

    pub fn is_open(&self) -> bool {
        self.time_out.is_none()
    }

    pub fn duration_seconds(&self) -> Option<i64> {
        self.time_out
            .map(|time_out| (time_out - self.time_in).num_seconds())
    }

    pub fn is_synced(&self) -> bool {
        self.jira_synced.unwrap_or(false)
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct RecordAttribute {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<i64>,
    pub name: String,
    #[serde(default)]
    pub parent_id: Option<i64>,
    pub user_id: i64,
    pub level_num: i64,
    #[serde(default)]
    pub color: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct TokenPair {
    pub access_token: String,
    pub refresh_token: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct AccessToken {
    pub access_token: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct Credentials<'a> {
    pub username: &'a str,
    pub password: &'a str,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct MessageBody {
    #[serde(default)]
    pub message: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct JiraConnection {
    pub id: i64,
    pub jira_url: String,
    #[serde(default)]
    pub auth_type: Option<String>,
    #[serde(default)]
    pub email: Option<String>,
    pub is_active: bool,
    #[serde(default)]
    pub created_at: Option<String>,
    #[serde(default)]
    pub updated_at: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct NewJiraConnection {
    pub jira_url: String,
    pub email: String,
    pub api_token: String,
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct JiraConnectionPatch {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub jira_url: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub api_token: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub is_active: Option<bool>,
}

#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct JiraIssue {
    pub key: String,
    #[serde(default)]
    pub summary: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub status: Option<String>,
    #[serde(default)]
    pub assignee: Option<String>,
    #[serde(rename = "issueType", default)]
    pub issue_type: Option<String>,
    #[serde(default)]
    pub project: Option<String>,
    #[serde(default)]
    pub created: Option<String>,
    #[serde(default)]
    pub updated: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct JiraSyncLog {
    pub id: i64,
    pub time_record_id: i64,
    pub jira_issue_key: String,
    #[serde(default)]
    pub jira_worklog_id: Option<String>,
    pub sync_status: String,
    #[serde(default)]
    pub sync_error: Option<String>,
    #[serde(default)]
    pub synced_at: Option<String>,
    #[serde(default)]
    pub synced_by_user_id: Option<i64>,
}

#[derive(Debug, Clone, PartialEq, Default)]
pub struct SyncResult {
    pub success: bool,
    pub message: Option<String>,
    pub worklog_id: Option<String>,
    pub error: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Default, Deserialize)]
pub struct ConnectionTestResult {
    #[serde(default)]
    pub success: bool,
    #[serde(default)]
    pub error: Option<String>,
    #[serde(default)]
    pub server_info: Option<serde_json::Value>,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct BulkSyncError {
    pub record_id: i64,
    pub error: String,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct BulkSyncResult {
    pub total: u32,
    pub succeeded: u32,
    pub failed: u32,
    #[serde(default)]
    pub errors: Vec<BulkSyncError>,
}
