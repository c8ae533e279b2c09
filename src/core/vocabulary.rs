//! Fixed vocabularies for the enum-like group attributes.
//!
//! The form wizard offers these values as option lists, but the dispatcher
//! re-checks every inbound value against the same list before it touches the
//! store.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Error returned when a value is not part of a vocabulary.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("'{value}' is not an allowed value for {field}")]
pub struct UnknownTerm {
    pub field: &'static str,
    pub value: String,
}

/// Declares a vocabulary enum with its wire spellings.
///
/// The wire spelling is used for serde, `Display`, `FromStr` and the
/// database column, so all four stay in lockstep.
macro_rules! vocabulary {
    (
        $(#[$meta:meta])*
        $vis:vis enum $name:ident as $field:literal {
            $( $variant:ident => $text:literal ),+ $(,)?
        }
    ) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
        $vis enum $name {
            $(
                #[serde(rename = $text)]
                $variant,
            )+
        }

        impl $name {
            /// Every allowed value, in the order the form lists them.
            pub const ALL: &'static [$name] = &[$($name::$variant),+];

            /// Field name used in validation messages.
            pub const FIELD: &'static str = $field;

            pub fn as_str(self) -> &'static str {
                match self {
                    $($name::$variant => $text,)+
                }
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(self.as_str())
            }
        }

        impl FromStr for $name {
            type Err = UnknownTerm;

            fn from_str(raw: &str) -> Result<Self, Self::Err> {
                match raw {
                    $($text => Ok($name::$variant),)+
                    other => Err(UnknownTerm {
                        field: $field,
                        value: other.to_string(),
                    }),
                }
            }
        }
    };
}

vocabulary! {
    /// How open the group's meetings are.
    pub enum ActivityType as "activity_type" {
        Public => "Public",
        Private => "Private",
        Online => "Online",
        PublicOnline => "Public/Online",
        PrivateOnline => "Private/Online",
        Restricted => "Restricted",
        Unknown => "Unknown",
    }
}

vocabulary! {
    /// How often the group meets.
    pub enum MeetingInterval as "meeting_interval" {
        Daily => "Daily",
        Weekly => "Weekly",
        BiWeekly => "Bi-Weekly",
        Monthly => "Monthly",
        BiMonthly => "Bi-Monthly",
        Quarterly => "Quarterly",
        SemiAnnual => "Semi-Annual",
        Annual => "Annual",
        Irregular => "Irregular",
        Unknown => "Unknown",
    }
}

vocabulary! {
    /// Network access at the venue. Shared by the wifi and ethernet fields.
    pub enum NetworkPolicy as "network_policy" {
        Public => "Public",
        Private => "Private",
        Pay => "Pay",
        None => "None",
        Unknown => "Unknown",
    }
}

vocabulary! {
    /// Whether attendees may bring their own hardware.
    pub enum HardwarePolicy as "hardware_policy" {
        NotRestricted => "Not Restricted",
        Restricted => "Restricted",
        None => "None",
        Unknown => "Unknown",
    }
}
