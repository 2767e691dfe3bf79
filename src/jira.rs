use log::{debug, error};
use reqwest::Method;
use serde::Deserialize;
use serde_json::{Value, json};
use std::rc::Rc;

use crate::api::{ApiClient, ApiError, ApiRequest};
use crate::models::{
    BulkSyncResult, ConnectionTestResult, JiraConnection, JiraConnectionPatch, JiraIssue,
    JiraSyncLog, NewJiraConnection, SyncResult, TimeRecord,
};

pub const MIN_WORKLOG_SECONDS: i64 = 60;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SyncStatus {
    Success,
    Failed,
}

impl SyncStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            SyncStatus::Success => "success",
            SyncStatus::Failed => "failed",
        }
    }
}

#[derive(Deserialize)]
struct ConnectionsBody {
    connections: Vec<JiraConnection>,
}

#[derive(Deserialize)]
struct ConnectionBody {
    connection: JiraConnection,
}

#[derive(Deserialize)]
struct IssuesBody {
    issues: Vec<JiraIssue>,
}

#[derive(Deserialize)]
struct IssueBody {
    issue: JiraIssue,
}

#[derive(Deserialize)]
struct SyncBody {
    #[serde(default)]
    message: Option<String>,
    #[serde(default)]
    worklog_id: Option<Value>,
}

#[derive(Deserialize)]
struct HistoryBody {
    history: Vec<JiraSyncLog>,
}

pub struct JiraStore {
    api: Rc<ApiClient>,
    connections: Vec<JiraConnection>,
    last_error: Option<String>,
}

impl JiraStore {
    pub fn new(api: Rc<ApiClient>) -> Self {
        Self {
            api,
            connections: Vec::new(),
            last_error: None,
        }
    }

    pub fn connections(&self) -> &[JiraConnection] {
        &self.connections
    }

    pub fn active_connection(&self) -> Option<&JiraConnection> {
        self.connections.iter().find(|connection| connection.is_active)
    }

    pub fn has_active_connection(&self) -> bool {
        self.active_connection().is_some()
    }

    pub fn last_error(&self) -> Option<&str> {
        self.last_error.as_deref()
    }

    pub fn load_connections(&mut self) -> Result<(), ApiError> {
        self.last_error = None;
        let body: ConnectionsBody = self
            .api
            .request_json(ApiRequest::new(Method::GET, "/jira/connections"))
            .map_err(|err| self.record_failure(err, "Failed to fetch JIRA connections"))?;
        self.connections = body.connections;
        Ok(())
    }

    pub fn create_connection(
        &mut self,
        connection: &NewJiraConnection,
    ) -> Result<JiraConnection, ApiError> {
        self.last_error = None;
        let body: ConnectionBody = self
            .api
            .send_json(Method::POST, "/jira/connections", connection)
            .map_err(|err| self.record_failure(err, "Failed to create JIRA connection"))?;
        self.connections.push(body.connection.clone());
        Ok(body.connection)
    }

    pub fn update_connection(
        &mut self,
        connection_id: i64,
        patch: &JiraConnectionPatch,
    ) -> Result<JiraConnection, ApiError> {
        self.last_error = None;
        let body: ConnectionBody = self
            .api
            .send_json(
                Method::PUT,
                &format!("/jira/connections/{connection_id}"),
                patch,
            )
            .map_err(|err| self.record_failure(err, "Failed to update JIRA connection"))?;
        if let Some(slot) = self
            .connections
            .iter_mut()
            .find(|connection| connection.id == connection_id)
        {
            *slot = body.connection.clone();
        }
        Ok(body.connection)
    }

    pub fn delete_connection(&mut self, connection_id: i64) -> Result<(), ApiError> {
        self.last_error = None;
        self.api
            .delete(&format!("/jira/connections/{connection_id}"))
            .map_err(|err| self.record_failure(err, "Failed to delete JIRA connection"))?;
        self.connections
            .retain(|connection| connection.id != connection_id);
        Ok(())
    }

    pub fn test_connection(&mut self, connection_id: i64) -> ConnectionTestResult {
        self.last_error = None;
        let request = ApiRequest::new(
            Method::POST,
            format!("/jira/connections/{connection_id}/test"),
        );
        match self.api.request_json(request) {
            Ok(result) => result,
            Err(err) => {
                self.record_failure(err, "Connection test failed");
                ConnectionTestResult {
                    success: false,
                    error: self.last_error.clone(),
                    server_info: None,
                }
            }
        }
    }

    pub fn search_issues(&mut self, query: &str) -> Vec<JiraIssue> {
        if query.trim().is_empty() {
            return Vec::new();
        }
        self.last_error = None;
        let request = ApiRequest::new(Method::GET, "/jira/issues/search").query("q", query);
        match self.api.request_json::<IssuesBody>(request) {
            Ok(body) => body.issues,
            Err(err) => {
                self.record_failure(err, "Failed to search JIRA issues");
                Vec::new()
            }
        }
    }

    pub fn issue(&mut self, issue_key: &str) -> Option<JiraIssue> {
        self.last_error = None;
        let request = ApiRequest::new(Method::GET, format!("/jira/issues/{issue_key}"));
        match self.api.request_json::<IssueBody>(request) {
            Ok(body) => Some(body.issue),
            Err(err) => {
                self.record_failure(err, "Failed to get JIRA issue");
                None
            }
        }
    }

    pub fn assigned_issues(&mut self) -> Vec<JiraIssue> {
        self.last_error = None;
        let request = ApiRequest::new(Method::GET, "/jira/issues/assigned");
        match self.api.request_json::<IssuesBody>(request) {
            Ok(body) => body.issues,
            Err(err) => {
                self.record_failure(err, "Failed to get assigned issues");
                Vec::new()
            }
        }
    }

    pub fn sync_record(&mut self, record_id: i64) -> SyncResult {
        self.last_error = None;
        let request = ApiRequest::new(Method::POST, format!("/jira/sync/record/{record_id}"));
        match self.api.request_json::<SyncBody>(request) {
            Ok(body) => SyncResult {
                success: true,
                message: body.message,
                worklog_id: body.worklog_id.map(worklog_id_string),
                error: None,
            },
            Err(err) => {
                self.record_failure(err, "Failed to sync record");
                SyncResult {
                    success: false,
                    error: self.last_error.clone(),
                    ..SyncResult::default()
                }
            }
        }
    }

    pub fn bulk_sync(&mut self, record_ids: &[i64]) -> Result<BulkSyncResult, ApiError> {
        self.last_error = None;
        self.api
            .send_json(
                Method::POST,
                "/jira/sync/bulk",
                &json!({ "record_ids": record_ids }),
            )
            .map_err(|err| self.record_failure(err, "Failed to bulk sync records"))
    }

    pub fn sync_history(
        &mut self,
        status: Option<SyncStatus>,
        limit: Option<u32>,
        record_id: Option<i64>,
    ) -> Vec<JiraSyncLog> {
        self.last_error = None;
        let mut request = ApiRequest::new(Method::GET, "/jira/sync/history");
        if let Some(status) = status {
            request = request.query("status", status.as_str());
        }
        if let Some(limit) = limit.filter(|limit| *limit > 0) {
            request = request.query("limit", limit.to_string());
        }
        if let Some(record_id) = record_id {
            request = request.query("record_id", record_id.to_string());
        }
        debug!("Sync history query: {:?}", request.query);
        match self.api.request_json::<HistoryBody>(request) {
            Ok(body) => body.history,
            Err(err) => {
                self.record_failure(err, "Failed to get sync history");
                Vec::new()
            }
        }
    }

    pub fn delete_worklog(&mut self, time_record_id: i64) -> bool {
        self.last_error = None;
        match self.api.delete(&format!("/jira/worklog/{time_record_id}")) {
            Ok(()) => true,
            Err(err) => {
                self.record_failure(err, "Failed to delete worklog");
                false
            }
        }
    }

    // Server-provided text wins; transport and decoding failures get the
    // operation's own wording.
    fn record_failure(&mut self, err: ApiError, fallback: &str) -> ApiError {
        let message = match &err {
            ApiError::Client { .. } | ApiError::Server { .. } | ApiError::Unauthorized(_) => {
                err.message()
            }
            _ => fallback.to_string(),
        };
        error!("{fallback}: {err}");
        self.last_error = Some(message);
        err
    }
}

fn worklog_id_string(value: Value) -> String {
    match value {
        Value::String(value) => value,
        other => other.to_string(),
    }
}

/// `PROJECT-123`: an uppercase project key, one dash, a number.
pub fn validate_issue_key(issue_key: &str) -> Result<(), String> {
    if issue_key.is_empty() {
        return Err("Issue key cannot be empty".to_string());
    }
    let parts: Vec<&str> = issue_key.split('-').collect();
    let [project, number] = parts.as_slice() else {
        return Err("Issue key must be in format: PROJECT-123".to_string());
    };
    if project.chars().any(char::is_lowercase) || !project.chars().any(char::is_uppercase) {
        return Err("Project key must be uppercase".to_string());
    }
    if number.is_empty() || !number.chars().all(|ch| ch.is_ascii_digit()) {
        return Err("Issue number must be numeric".to_string());
    }
    Ok(())
}

pub fn validate_record_for_sync(record: &TimeRecord) -> Result<(), String> {
    if record.jira_issue_key.as_deref().is_none_or(str::is_empty) {
        return Err("Time record must have a JIRA issue linked".to_string());
    }
    let Some(time_out) = record.time_out else {
        return Err("Time record must have an end time (clock out required)".to_string());
    };
    if time_out <= record.time_in {
        return Err("End time must be after start time".to_string());
    }
    if (time_out - record.time_in).num_seconds() < MIN_WORKLOG_SECONDS {
        return Err("Time record must be at least 1 minute long".to_string());
    }
    Ok(())
}
