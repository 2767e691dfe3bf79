use log::error;
use reqwest::Method;
use serde_json::Value;
use std::collections::HashMap;
use std::fmt;
use std::rc::Rc;

use crate::api::{ApiClient, ApiError, ApiRequest};
use crate::models::{AttributeId, RecordAttribute, TimeRecord};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LevelViolation {
    RootNotZero { id: Option<i64>, level_num: i64 },
    MissingParent { id: Option<i64>, parent_id: i64 },
    WrongDepth { id: Option<i64>, level_num: i64, expected: i64 },
}

impl fmt::Display for LevelViolation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let show = |id: &Option<i64>| id.map_or_else(|| "?".to_string(), |id| id.to_string());
        match self {
            LevelViolation::RootNotZero { id, level_num } => {
                write!(f, "attribute {} has no parent but level {level_num}", show(id))
            }
            LevelViolation::MissingParent { id, parent_id } => {
                write!(f, "attribute {} points at missing parent {parent_id}", show(id))
            }
            LevelViolation::WrongDepth {
                id,
                level_num,
                expected,
            } => write!(
                f,
                "attribute {} has level {level_num}, expected {expected}",
                show(id)
            ),
        }
    }
}

pub struct RecordAttributeStore {
    api: Rc<ApiClient>,
    attributes: Vec<RecordAttribute>,
}

impl RecordAttributeStore {
    pub fn new(api: Rc<ApiClient>) -> Self {
        Self {
            api,
            attributes: Vec::new(),
        }
    }

    pub fn fetch(&mut self) -> Result<(), ApiError> {
        match self.api.request_json(ApiRequest::new(Method::GET, "/recordattributes")) {
            Ok(attributes) => {
                self.attributes = attributes;
                Ok(())
            }
            Err(err) => {
                error!("Request failed: {err}");
                Err(err)
            }
        }
    }

    // A failed request leaves the local patch in place.
    pub fn update(&mut self, attribute: RecordAttribute) {
        let Some(id) = attribute.id else {
            error!("Failed to update record attribute: {}", ApiError::MissingId);
            return;
        };
        if let Some(slot) = self
            .attributes
            .iter_mut()
            .find(|existing| existing.id == Some(id))
        {
            *slot = attribute.clone();
        }
        let result: Result<Value, ApiError> =
            self.api
                .send_json(Method::PUT, &format!("/recordattributes/{id}"), &attribute);
        if let Err(err) = result {
            error!("Failed to update record attribute {id}: {err}");
        }
    }

    pub fn attributes(&self) -> &[RecordAttribute] {
        &self.attributes
    }

    pub fn find(&self, id: i64) -> Option<&RecordAttribute> {
        self.attributes.iter().find(|attribute| attribute.id == Some(id))
    }

    pub fn find_by_ref(&self, id: &AttributeId) -> Option<&RecordAttribute> {
        id.as_i64().and_then(|id| self.find(id))
    }

    pub fn roots(&self) -> Vec<&RecordAttribute> {
        self.attributes
            .iter()
            .filter(|attribute| attribute.parent_id.is_none())
            .collect()
    }

    pub fn children_of(&self, parent_id: i64) -> Vec<&RecordAttribute> {
        self.attributes
            .iter()
            .filter(|attribute| attribute.parent_id == Some(parent_id))
            .collect()
    }

    pub fn level_violations(&self) -> Vec<LevelViolation> {
        let levels: HashMap<i64, i64> = self
            .attributes
            .iter()
            .filter_map(|attribute| attribute.id.map(|id| (id, attribute.level_num)))
            .collect();

        self.attributes
            .iter()
            .filter_map(|attribute| match attribute.parent_id {
                None if attribute.level_num != 0 => Some(LevelViolation::RootNotZero {
                    id: attribute.id,
                    level_num: attribute.level_num,
                }),
                None => None,
                Some(parent_id) => match levels.get(&parent_id) {
                    None => Some(LevelViolation::MissingParent {
                        id: attribute.id,
                        parent_id,
                    }),
                    Some(parent_level) if attribute.level_num != parent_level + 1 => {
                        Some(LevelViolation::WrongDepth {
                            id: attribute.id,
                            level_num: attribute.level_num,
                            expected: parent_level + 1,
                        })
                    }
                    Some(_) => None,
                },
            })
            .collect()
    }

    pub fn name_of(&self, id: &AttributeId) -> String {
        self.find_by_ref(id)
            .map(|attribute| attribute.name.clone())
            .unwrap_or_else(|| format!("#{id}"))
    }

    pub fn label_for(&self, record: &TimeRecord) -> String {
        format!(
            "{} / {} / {}",
            self.name_of(&record.domain_id),
            self.name_of(&record.category_id),
            self.name_of(&record.title_id)
        )
    }

    pub fn color_of(&self, id: &AttributeId) -> Option<&str> {
        self.find_by_ref(id)
            .and_then(|attribute| attribute.color.as_deref())
    }
}
