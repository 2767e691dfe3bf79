use chrono::{DateTime, Local, Utc};
use log::{debug, error, warn};
use reqwest::Method;
use serde_json::Value;
use std::rc::Rc;

use crate::api::{ApiClient, ApiError, ApiRequest};
use crate::dates::{DateWindow, parse_iso, to_iso_string};
use crate::models::TimeRecord;
use crate::storage::{KeyValueStore, WINDOW_END_KEY, WINDOW_START_KEY};

pub struct TimeRecordCache {
    api: Rc<ApiClient>,
    session_store: Box<dyn KeyValueStore>,
    records: Vec<TimeRecord>,
    display: DateWindow,
    cached: DateWindow,
}

impl TimeRecordCache {
    pub fn new(
        api: Rc<ApiClient>,
        session_store: Box<dyn KeyValueStore>,
        now: DateTime<Local>,
    ) -> Self {
        let defaults = DateWindow::default_for(now);
        let start = load_stored(session_store.as_ref(), WINDOW_START_KEY, defaults.start);
        let end = load_stored(session_store.as_ref(), WINDOW_END_KEY, defaults.end);
        let window = DateWindow::new(start, end);
        Self {
            api,
            session_store,
            records: Vec::new(),
            display: window,
            cached: window,
        }
    }

    /// Returns whether a request was made. A requested bound equal to the
    /// cached one still fetches.
    pub fn fetch(
        &mut self,
        force: bool,
        start: Option<DateTime<Utc>>,
        end: Option<DateTime<Utc>>,
    ) -> Result<bool, ApiError> {
        let needs_request = force
            || self.records.is_empty()
            || start.is_some_and(|start| start <= self.cached.start)
            || end.is_some_and(|end| end >= self.cached.end);

        if !needs_request {
            debug!("Don't need to make a request now");
            return Ok(false);
        }

        let request = ApiRequest::new(Method::GET, "/timerecords")
            .query("start_date", to_iso_string(start.unwrap_or(self.cached.start)))
            .query("end_date", to_iso_string(end.unwrap_or(self.cached.end)));

        let records: Vec<TimeRecord> = match self.api.request_json(request) {
            Ok(records) => records,
            Err(err) => {
                error!("Request failed: {err}");
                return Err(err);
            }
        };
        debug!("Fetched {} time records", records.len());
        self.records = records;

        if let Some(start) = start {
            if start < self.cached.start {
                self.cached.start = start;
            }
        }
        if let Some(end) = end {
            if end > self.cached.end {
                self.cached.end = end;
            }
        }
        Ok(true)
    }

    pub fn filtered_records(&self) -> Vec<&TimeRecord> {
        self.records
            .iter()
            .filter(|record| self.display.strictly_contains(record.time_in))
            .collect()
    }

    pub fn save(&self, record: &TimeRecord) {
        let result: Result<Value, ApiError> =
            self.api.send_json(Method::POST, "/timerecords", record);
        if let Err(err) = result {
            error!("Failed to save record: {err}");
        }
    }

    pub fn update(&self, record: &TimeRecord) {
        let Some(id) = record.id else {
            error!("Failed to update record: {}", ApiError::MissingId);
            return;
        };
        let result: Result<Value, ApiError> =
            self.api
                .send_json(Method::PUT, &format!("/timerecords/{id}"), record);
        if let Err(err) = result {
            error!("Failed to update record {id}: {err}");
        }
    }

    pub fn delete(&mut self, record: &TimeRecord) -> Result<(), ApiError> {
        let id = record.id.ok_or(ApiError::MissingId)?;
        if let Err(err) = self.api.delete(&format!("/timerecords/{id}")) {
            error!("Failed to delete record {id}: {err}");
            return Err(err);
        }
        self.records.retain(|resident| resident.id != Some(id));
        Ok(())
    }

    pub fn set_display_window(
        &mut self,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> Result<(), ApiError> {
        self.display = DateWindow::new(start, end);
        for (key, value) in [(WINDOW_START_KEY, start), (WINDOW_END_KEY, end)] {
            if let Err(err) = self.session_store.set(key, &to_iso_string(value)) {
                warn!("Failed to persist {key}: {err}");
            }
        }
        self.fetch(true, Some(start), Some(end))?;
        Ok(())
    }

    pub fn records(&self) -> &[TimeRecord] {
        &self.records
    }

    pub fn display_window(&self) -> DateWindow {
        self.display
    }

    pub fn cache_window(&self) -> DateWindow {
        self.cached
    }

    pub fn open_record(&self) -> Option<&TimeRecord> {
        self.records
            .iter()
            .filter(|record| record.is_open())
            .max_by_key(|record| record.time_in)
    }

    pub fn find(&self, id: i64) -> Option<&TimeRecord> {
        self.records.iter().find(|record| record.id == Some(id))
    }
}

fn load_stored(store: &dyn KeyValueStore, key: &str, fallback: DateTime<Utc>) -> DateTime<Utc> {
    match store.get(key) {
        Some(value) => parse_iso(&value).unwrap_or_else(|| {
            warn!("Failed to parse stored date {value:?} for {key}");
            fallback
        }),
        None => fallback,
    }
}
