pub mod clock;
pub mod types;
pub mod vocabulary;

pub use clock::{Clock, SystemClock};
pub use types::{ContactInfo, GroupFields, GroupRecord};
pub use vocabulary::{ActivityType, HardwarePolicy, MeetingInterval, NetworkPolicy, UnknownTerm};

#[cfg(test)]
pub(crate) use types::sample_fields;
