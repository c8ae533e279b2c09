//! Inbound request model and routing classification.

use std::collections::HashMap;
use std::str::FromStr;

use serde::Deserialize;

use crate::core::{GroupFields, UnknownTerm};
use crate::error::{AppError, AppResult};

/// Longest accepted free-text attribute, in characters.
pub const MAX_TEXT_LEN: usize = 200;

pub mod keys {
    pub const NAME: &str = "name";
    pub const COUNTRY: &str = "country";
    pub const STATE: &str = "state";
    pub const CITY: &str = "city";
    pub const ACTIVITY_TYPE: &str = "activity_type";
    pub const MEETING_INTERVAL: &str = "meeting_interval";
    pub const WIFI_POLICY: &str = "wifi_policy";
    pub const ETHERNET_POLICY: &str = "ethernet_policy";
    pub const HARDWARE_POLICY: &str = "hardware_policy";
    pub const TARGET_ID: &str = "target_id";
    pub const DELETE_REQUESTED: &str = "delete_requested";
}

/// Group attributes exactly as submitted, before any validation.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct GroupForm {
    pub name: String,
    pub country: String,
    pub state: String,
    pub city: String,
    pub activity_type: String,
    pub meeting_interval: String,
    pub wifi_policy: String,
    pub ethernet_policy: String,
    pub hardware_policy: String,
}

/// A dispatch request with routing fields already typed.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct DispatchRequest {
    #[serde(default)]
    pub target_id: String,
    #[serde(default)]
    pub delete_requested: bool,
    #[serde(flatten)]
    pub form: GroupForm,
}

/// The single operation a request resolves to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Operation {
    Create(GroupFields),
    Update { target_id: String, fields: GroupFields },
    Delete { target_id: String },
}

impl Operation {
    pub fn name(&self) -> &'static str {
        match self {
            Self::Create(_) => "create",
            Self::Update { .. } => "update",
            Self::Delete { .. } => "delete",
        }
    }
}

impl DispatchRequest {
    /// Builds a request from flat query-string style fields.
    ///
    /// `delete_requested` accepts `"true"` / `"false"`; a missing or empty
    /// flag means `false`. Unknown keys are ignored.
    pub fn from_fields(fields: &HashMap<String, String>) -> AppResult<Self> {
        let text = |key: &str| fields.get(key).cloned().unwrap_or_default();

        Ok(Self {
            target_id: text(keys::TARGET_ID),
            delete_requested: parse_flag(fields.get(keys::DELETE_REQUESTED).map(String::as_str))?,
            form: GroupForm {
                name: text(keys::NAME),
                country: text(keys::COUNTRY),
                state: text(keys::STATE),
                city: text(keys::CITY),
                activity_type: text(keys::ACTIVITY_TYPE),
                meeting_interval: text(keys::MEETING_INTERVAL),
                wifi_policy: text(keys::WIFI_POLICY),
                ethernet_policy: text(keys::ETHERNET_POLICY),
                hardware_policy: text(keys::HARDWARE_POLICY),
            },
        })
    }

    /// Resolves the request to exactly one operation.
    ///
    /// Priority: delete, then update, then create. Delete only looks at the
    /// target id; create and update validate every attribute.
    pub fn classify(self) -> AppResult<Operation> {
        let target_id = self.target_id.trim().to_string();

        if self.delete_requested {
            if target_id.is_empty() {
                return Err(AppError::validation(
                    "delete requested without a target_id",
                ));
            }
            return Ok(Operation::Delete { target_id });
        }

        let fields = self.form.validate()?;
        if target_id.is_empty() {
            Ok(Operation::Create(fields))
        } else {
            Ok(Operation::Update { target_id, fields })
        }
    }
}

impl GroupForm {
    /// Trims free text and checks every value against its vocabulary.
    pub fn validate(self) -> AppResult<GroupFields> {
        Ok(GroupFields {
            name: required_text(keys::NAME, &self.name)?,
            country: required_text(keys::COUNTRY, &self.country)?,
            state: required_text(keys::STATE, &self.state)?,
            city: required_text(keys::CITY, &self.city)?,
            activity_type: term(keys::ACTIVITY_TYPE, &self.activity_type)?,
            meeting_interval: term(keys::MEETING_INTERVAL, &self.meeting_interval)?,
            wifi_policy: term(keys::WIFI_POLICY, &self.wifi_policy)?,
            ethernet_policy: term(keys::ETHERNET_POLICY, &self.ethernet_policy)?,
            hardware_policy: term(keys::HARDWARE_POLICY, &self.hardware_policy)?,
        })
    }
}

/// Parses the legacy text form of the delete flag.
pub fn parse_flag(raw: Option<&str>) -> AppResult<bool> {
    match raw.map(str::trim) {
        None | Some("") | Some("false") => Ok(false),
        Some("true") => Ok(true),
        Some(other) => Err(AppError::validation(format!(
            "{} must be \"true\" or \"false\", got \"{other}\"",
            keys::DELETE_REQUESTED
        ))),
    }
}

fn required_text(key: &str, raw: &str) -> AppResult<String> {
    let value = raw.trim();
    if value.is_empty() {
        return Err(AppError::validation(format!("{key} must not be blank")));
    }
    if value.chars().count() > MAX_TEXT_LEN {
        return Err(AppError::validation(format!(
            "{key} must be at most {MAX_TEXT_LEN} characters"
        )));
    }
    Ok(value.to_string())
}

fn term<T>(key: &str, raw: &str) -> AppResult<T>
where
    T: FromStr<Err = UnknownTerm>,
{
    // The vocabulary knows its own field name, but wifi and ethernet share one.
    raw.trim().parse::<T>().map_err(|err| {
        AppError::validation(format!("'{}' is not an allowed value for {key}", err.value))
    })
}
