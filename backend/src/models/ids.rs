//! Strongly typed identifiers shared by the whole pipeline.

use serde::{Deserialize, Serialize};
use std::fmt;

crate::define_id_type!(i64, SchoolId);
crate::define_id_type!(i64, TimetableId);
crate::define_id_type!(i64, DraftId);
crate::define_id_type!(i64, DayId);
crate::define_id_type!(i64, PeriodId);
crate::define_id_type!(i64, SubjectId);
crate::define_id_type!(i64, ActivityId);
crate::define_id_type!(i64, GroupId);
crate::define_id_type!(i64, BuildingId);
crate::define_id_type!(i64, RoomId);
crate::define_id_type!(i64, ConstraintId);
crate::define_id_type!(i64, QueueEntryId);

/// Identifier of a person (teacher or student) as issued by the user store.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct UserId(pub String);

impl UserId {
    pub fn new(value: impl Into<String>) -> Self {
        UserId(value.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for UserId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for UserId {
    fn from(value: &str) -> Self {
        UserId(value.to_string())
    }
}

impl From<String> for UserId {
    fn from(value: String) -> Self {
        UserId(value)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn id_parses_from_solver_text() {
        let id: DayId = " 42 ".parse().unwrap();
        assert_eq!(id, DayId::new(42));
        assert_eq!(id.to_string(), "42");
        assert!("abc".parse::<RoomId>().is_err());
    }

    #[test]
    fn id_serializes_as_plain_number() {
        let json = serde_json::to_string(&QueueEntryId::new(7)).unwrap();
        assert_eq!(json, "7");
        let user = serde_json::to_string(&UserId::new("u-1")).unwrap();
        assert_eq!(user, "\"u-1\"");
    }
}
