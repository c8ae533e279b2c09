use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::vocabulary::{ActivityType, HardwarePolicy, MeetingInterval, NetworkPolicy};

/// The mutable attributes of a group, as collected by the form wizard.
///
/// Update replaces all of these at once; there is no partial patch.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GroupFields {
    pub name: String,
    pub country: String,
    pub state: String,
    pub city: String,
    pub activity_type: ActivityType,
    pub meeting_interval: MeetingInterval,
    pub wifi_policy: NetworkPolicy,
    pub ethernet_policy: NetworkPolicy,
    pub hardware_policy: HardwarePolicy,
}

/// Contact placeholders. Always written blank by both create and update.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContactInfo {
    pub person: String,
    pub email: String,
    pub phone: String,
    pub social: String,
}

/// One row of the group directory.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GroupRecord {
    pub id: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    #[serde(flatten)]
    pub fields: GroupFields,
    pub contact: ContactInfo,
    /// The permanent "link" token. Never changes after creation.
    pub public_token: String,
}

impl GroupRecord {
    /// Builds a brand-new record whose id and public token are both `token`.
    pub fn create(token: impl Into<String>, fields: GroupFields, now: DateTime<Utc>) -> Self {
        let token = token.into();
        Self {
            id: token.clone(),
            created_at: now,
            updated_at: now,
            fields,
            contact: ContactInfo::default(),
            public_token: token,
        }
    }

    /// Builds the full replacement for this record.
    ///
    /// `id`, `created_at` and `public_token` come from `self`; everything
    /// else comes from `fields`, contacts are reset and `updated_at` is `now`.
    pub fn replaced_with(&self, fields: GroupFields, now: DateTime<Utc>) -> Self {
        Self {
            id: self.id.clone(),
            created_at: self.created_at,
            updated_at: now,
            fields,
            contact: ContactInfo::default(),
            public_token: self.public_token.clone(),
        }
    }

    pub fn name(&self) -> &str {
        &self.fields.name
    }
}

#[cfg(test)]
pub(crate) fn sample_fields(name: &str) -> GroupFields {
    GroupFields {
        name: name.to_string(),
        country: "United States".to_string(),
        state: "CA".to_string(),
        city: "San Jose".to_string(),
        activity_type: ActivityType::Public,
        meeting_interval: MeetingInterval::Monthly,
        wifi_policy: NetworkPolicy::Public,
        ethernet_policy: NetworkPolicy::None,
        hardware_policy: HardwarePolicy::NotRestricted,
    }
}
