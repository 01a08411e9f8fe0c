//! Typed solver constraints.
//!
//! Every constraint the solver understands is a variant of [`ConstraintKind`] that owns
//! its own parameter struct. Payloads arrive as JSON keyed by the solver's canonical
//! constraint name; [`ConstraintKind::parse`] resolves the name through a static
//! registry, deserializes the payload into the matching struct and validates it.
//!
//! Field names follow the solver's vocabulary (`Weight_Percentage`, `Activity_Id`, ...)
//! so stored payloads can be produced by forms that speak the solver format directly.

use serde::{Deserialize, Deserializer, Serialize};
use std::collections::HashSet;

use super::ids::{ConstraintId, DraftId};

/// Weight at which the solver must satisfy a constraint.
pub const HARD_WEIGHT: f64 = 100.0;

/// Weight of the preferred-room constraints synthesized for activities.
pub const PREFERRED_ROOM_WEIGHT: f64 = 95.0;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ConstraintScope {
    Time,
    Space,
}

impl std::fmt::Display for ConstraintScope {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ConstraintScope::Time => write!(f, "time"),
            ConstraintScope::Space => write!(f, "space"),
        }
    }
}

#[derive(Debug, thiserror::Error, PartialEq)]
pub enum ConstraintError {
    #[error("Unknown constraint: {0}")]
    Unknown(String),

    #[error("Malformed parameters for {name}: {message}")]
    Malformed { name: String, message: String },

    #[error("Invalid parameters for {name}: {message}")]
    Invalid { name: String, message: String },

    #[error("Constraint {name} is a {expected} constraint, not {actual}")]
    ScopeMismatch {
        name: String,
        expected: ConstraintScope,
        actual: ConstraintScope,
    },
}

fn default_true() -> bool {
    true
}

/// Accepts a solver reference written either as a number or a string.
fn de_ref<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Ref {
        Num(i64),
        Text(String),
    }

    Ok(match Ref::deserialize(deserializer)? {
        Ref::Num(n) => n.to_string(),
        Ref::Text(s) => s.trim().to_string(),
    })
}

fn de_ref_list<'de, D>(deserializer: D) -> Result<Vec<String>, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    struct Wrapped(#[serde(deserialize_with = "de_ref")] String);

    let items = Vec::<Wrapped>::deserialize(deserializer)?;
    Ok(items.into_iter().map(|w| w.0).collect())
}

fn is_blank_ref(value: &str) -> bool {
    value.is_empty() || value == "0"
}

fn check_weight(name: &str, weight: f64) -> Result<(), ConstraintError> {
    if !(1.0..=HARD_WEIGHT).contains(&weight) {
        return Err(invalid(
            name,
            format!("Weight_Percentage must be within 1..=100, got {}", weight),
        ));
    }
    Ok(())
}

fn invalid(name: &str, message: impl Into<String>) -> ConstraintError {
    ConstraintError::Invalid {
        name: name.to_string(),
        message: message.into(),
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BasicCompulsory {
    #[serde(rename = "Weight_Percentage")]
    pub weight_percentage: f64,
    #[serde(rename = "Active", default = "default_true")]
    pub active: bool,
    #[serde(rename = "Comments", default, skip_serializing_if = "Option::is_none")]
    pub comments: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TeachersMaxGapsPerWeek {
    #[serde(rename = "Weight_Percentage")]
    pub weight_percentage: f64,
    #[serde(rename = "Max_Gaps")]
    pub max_gaps: u32,
    #[serde(rename = "Active", default = "default_true")]
    pub active: bool,
    #[serde(rename = "Comments", default, skip_serializing_if = "Option::is_none")]
    pub comments: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MinDaysBetweenActivities {
    #[serde(rename = "Weight_Percentage")]
    pub weight_percentage: f64,
    #[serde(rename = "Consecutive_If_Same_Day", default = "default_true")]
    pub consecutive_if_same_day: bool,
    #[serde(rename = "Number_of_Activities")]
    pub number_of_activities: u32,
    #[serde(rename = "Activity_Id", deserialize_with = "de_ref_list")]
    pub activity_ids: Vec<String>,
    #[serde(rename = "MinDays")]
    pub min_days: u32,
    #[serde(rename = "Active", default = "default_true")]
    pub active: bool,
    #[serde(rename = "Comments", default, skip_serializing_if = "Option::is_none")]
    pub comments: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SubjectPreferredRooms {
    #[serde(rename = "Weight_Percentage")]
    pub weight_percentage: f64,
    #[serde(rename = "Subject", deserialize_with = "de_ref")]
    pub subject: String,
    #[serde(rename = "Number_of_Preferred_Rooms")]
    pub number_of_preferred_rooms: u32,
    #[serde(rename = "Preferred_Room", deserialize_with = "de_ref_list")]
    pub preferred_rooms: Vec<String>,
    #[serde(rename = "Active", default = "default_true")]
    pub active: bool,
    #[serde(rename = "Comments", default, skip_serializing_if = "Option::is_none")]
    pub comments: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TimeSlot {
    #[serde(rename = "Day", deserialize_with = "de_ref")]
    pub day: String,
    #[serde(rename = "Hour", alias = "Period", deserialize_with = "de_ref")]
    pub hour: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RoomNotAvailableTimes {
    #[serde(rename = "Weight_Percentage")]
    pub weight_percentage: f64,
    #[serde(rename = "Room", deserialize_with = "de_ref")]
    pub room: String,
    #[serde(rename = "Number_of_Not_Available_Times")]
    pub number_of_not_available_times: u32,
    #[serde(rename = "Not_Available_Time")]
    pub not_available_times: Vec<TimeSlot>,
    #[serde(rename = "Active", default = "default_true")]
    pub active: bool,
    #[serde(rename = "Comments", default, skip_serializing_if = "Option::is_none")]
    pub comments: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ActivityPreferredRooms {
    #[serde(rename = "Weight_Percentage")]
    pub weight_percentage: f64,
    #[serde(rename = "Activity_Id")]
    pub activity_id: u32,
    #[serde(rename = "Number_of_Preferred_Rooms")]
    pub number_of_preferred_rooms: u32,
    #[serde(rename = "Preferred_Room", deserialize_with = "de_ref_list")]
    pub preferred_rooms: Vec<String>,
    #[serde(rename = "Active", default = "default_true")]
    pub active: bool,
    #[serde(rename = "Comments", default, skip_serializing_if = "Option::is_none")]
    pub comments: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ActivityPreferredStartingTime {
    #[serde(rename = "Weight_Percentage")]
    pub weight_percentage: f64,
    #[serde(rename = "Activity_Id")]
    pub activity_id: u32,
    #[serde(rename = "Preferred_Day", deserialize_with = "de_ref")]
    pub preferred_day: String,
    #[serde(rename = "Preferred_Hour", deserialize_with = "de_ref")]
    pub preferred_hour: String,
    #[serde(rename = "Permanently_Locked", default)]
    pub permanently_locked: bool,
    #[serde(rename = "Active", default = "default_true")]
    pub active: bool,
    #[serde(rename = "Comments", default, skip_serializing_if = "Option::is_none")]
    pub comments: Option<String>,
}

/// A validated solver constraint.
#[derive(Debug, Clone, PartialEq)]
pub enum ConstraintKind {
    BasicCompulsoryTime(BasicCompulsory),
    BasicCompulsorySpace(BasicCompulsory),
    TeachersMaxGapsPerWeek(TeachersMaxGapsPerWeek),
    MinDaysBetweenActivities(MinDaysBetweenActivities),
    SubjectPreferredRooms(SubjectPreferredRooms),
    RoomNotAvailableTimes(RoomNotAvailableTimes),
    ActivityPreferredRooms(ActivityPreferredRooms),
    ActivityPreferredStartingTime(ActivityPreferredStartingTime),
}

type ParseFn = fn(&serde_json::Value) -> Result<ConstraintKind, ConstraintError>;

/// Registry entry binding a canonical name to its scope and parser.
pub struct ConstraintSpec {
    pub name: &'static str,
    pub scope: ConstraintScope,
    parse: ParseFn,
}

fn payload<T: serde::de::DeserializeOwned>(
    name: &str,
    value: &serde_json::Value,
) -> Result<T, ConstraintError> {
    serde_json::from_value(value.clone()).map_err(|e| ConstraintError::Malformed {
        name: name.to_string(),
        message: e.to_string(),
    })
}

/// All constraints known to the pipeline, in canonical-name order.
pub static CONSTRAINT_REGISTRY: &[ConstraintSpec] = &[
    ConstraintSpec {
        name: "ConstraintActivityPreferredRooms",
        scope: ConstraintScope::Space,
        parse: |v| {
            payload(ConstraintKind::ACTIVITY_PREFERRED_ROOMS, v)
                .map(ConstraintKind::ActivityPreferredRooms)
        },
    },
    ConstraintSpec {
        name: "ConstraintActivityPreferredStartingTime",
        scope: ConstraintScope::Time,
        parse: |v| {
            payload(ConstraintKind::ACTIVITY_PREFERRED_STARTING_TIME, v)
                .map(ConstraintKind::ActivityPreferredStartingTime)
        },
    },
    ConstraintSpec {
        name: "ConstraintBasicCompulsorySpace",
        scope: ConstraintScope::Space,
        parse: |v| {
            payload(ConstraintKind::BASIC_COMPULSORY_SPACE, v)
                .map(ConstraintKind::BasicCompulsorySpace)
        },
    },
    ConstraintSpec {
        name: "ConstraintBasicCompulsoryTime",
        scope: ConstraintScope::Time,
        parse: |v| {
            payload(ConstraintKind::BASIC_COMPULSORY_TIME, v)
                .map(ConstraintKind::BasicCompulsoryTime)
        },
    },
    ConstraintSpec {
        name: "ConstraintMinDaysBetweenActivities",
        scope: ConstraintScope::Time,
        parse: |v| {
            payload(ConstraintKind::MIN_DAYS_BETWEEN_ACTIVITIES, v)
                .map(ConstraintKind::MinDaysBetweenActivities)
        },
    },
    ConstraintSpec {
        name: "ConstraintRoomNotAvailableTimes",
        scope: ConstraintScope::Space,
        parse: |v| {
            payload(ConstraintKind::ROOM_NOT_AVAILABLE_TIMES, v)
                .map(ConstraintKind::RoomNotAvailableTimes)
        },
    },
    ConstraintSpec {
        name: "ConstraintSubjectPreferredRooms",
        scope: ConstraintScope::Space,
        parse: |v| {
            payload(ConstraintKind::SUBJECT_PREFERRED_ROOMS, v)
                .map(ConstraintKind::SubjectPreferredRooms)
        },
    },
    ConstraintSpec {
        name: "ConstraintTeachersMaxGapsPerWeek",
        scope: ConstraintScope::Time,
        parse: |v| {
            payload(ConstraintKind::TEACHERS_MAX_GAPS_PER_WEEK, v)
                .map(ConstraintKind::TeachersMaxGapsPerWeek)
        },
    },
];

/// Looks up a registry entry by canonical name.
pub fn lookup_constraint(name: &str) -> Option<&'static ConstraintSpec> {
    CONSTRAINT_REGISTRY.iter().find(|spec| spec.name == name)
}

impl ConstraintKind {
    pub const BASIC_COMPULSORY_TIME: &'static str = "ConstraintBasicCompulsoryTime";
    pub const BASIC_COMPULSORY_SPACE: &'static str = "ConstraintBasicCompulsorySpace";
    pub const TEACHERS_MAX_GAPS_PER_WEEK: &'static str = "ConstraintTeachersMaxGapsPerWeek";
    pub const MIN_DAYS_BETWEEN_ACTIVITIES: &'static str = "ConstraintMinDaysBetweenActivities";
    pub const SUBJECT_PREFERRED_ROOMS: &'static str = "ConstraintSubjectPreferredRooms";
    pub const ROOM_NOT_AVAILABLE_TIMES: &'static str = "ConstraintRoomNotAvailableTimes";
    pub const ACTIVITY_PREFERRED_ROOMS: &'static str = "ConstraintActivityPreferredRooms";
    pub const ACTIVITY_PREFERRED_STARTING_TIME: &'static str =
        "ConstraintActivityPreferredStartingTime";

    /// Resolve a canonical name and JSON payload into a validated constraint.
    pub fn parse(name: &str, parameters: &serde_json::Value) -> Result<Self, ConstraintError> {
        let spec = lookup_constraint(name).ok_or_else(|| ConstraintError::Unknown(name.to_string()))?;
        let constraint = (spec.parse)(parameters)?;
        constraint.validate()?;
        Ok(constraint)
    }

    pub fn canonical_name(&self) -> &'static str {
        match self {
            Self::BasicCompulsoryTime(_) => Self::BASIC_COMPULSORY_TIME,
            Self::BasicCompulsorySpace(_) => Self::BASIC_COMPULSORY_SPACE,
            Self::TeachersMaxGapsPerWeek(_) => Self::TEACHERS_MAX_GAPS_PER_WEEK,
            Self::MinDaysBetweenActivities(_) => Self::MIN_DAYS_BETWEEN_ACTIVITIES,
            Self::SubjectPreferredRooms(_) => Self::SUBJECT_PREFERRED_ROOMS,
            Self::RoomNotAvailableTimes(_) => Self::ROOM_NOT_AVAILABLE_TIMES,
            Self::ActivityPreferredRooms(_) => Self::ACTIVITY_PREFERRED_ROOMS,
            Self::ActivityPreferredStartingTime(_) => Self::ACTIVITY_PREFERRED_STARTING_TIME,
        }
    }

    pub fn scope(&self) -> ConstraintScope {
        match self {
            Self::BasicCompulsoryTime(_)
            | Self::TeachersMaxGapsPerWeek(_)
            | Self::MinDaysBetweenActivities(_)
            | Self::ActivityPreferredStartingTime(_) => ConstraintScope::Time,
            Self::BasicCompulsorySpace(_)
            | Self::SubjectPreferredRooms(_)
            | Self::RoomNotAvailableTimes(_)
            | Self::ActivityPreferredRooms(_) => ConstraintScope::Space,
        }
    }

    pub fn weight(&self) -> f64 {
        match self {
            Self::BasicCompulsoryTime(c) | Self::BasicCompulsorySpace(c) => c.weight_percentage,
            Self::TeachersMaxGapsPerWeek(c) => c.weight_percentage,
            Self::MinDaysBetweenActivities(c) => c.weight_percentage,
            Self::SubjectPreferredRooms(c) => c.weight_percentage,
            Self::RoomNotAvailableTimes(c) => c.weight_percentage,
            Self::ActivityPreferredRooms(c) => c.weight_percentage,
            Self::ActivityPreferredStartingTime(c) => c.weight_percentage,
        }
    }

    /// Hard constraints must hold; soft ones bound how hard the solver tries.
    pub fn is_hard(&self) -> bool {
        self.weight() >= HARD_WEIGHT
    }

    pub fn validate(&self) -> Result<(), ConstraintError> {
        let name = self.canonical_name();
        check_weight(name, self.weight())?;

        match self {
            Self::BasicCompulsoryTime(_) | Self::BasicCompulsorySpace(_) => Ok(()),
            Self::TeachersMaxGapsPerWeek(c) => {
                if c.max_gaps > 20 {
                    return Err(invalid(name, format!("Max_Gaps must be at most 20, got {}", c.max_gaps)));
                }
                Ok(())
            }
            Self::MinDaysBetweenActivities(c) => {
                if !(1..=6).contains(&c.min_days) {
                    return Err(invalid(name, format!("MinDays must be within 1..=6, got {}", c.min_days)));
                }
                if c.activity_ids.len() < 2 {
                    return Err(invalid(name, "At least two activities are required"));
                }
                if c.number_of_activities as usize != c.activity_ids.len() {
                    return Err(invalid(
                        name,
                        format!(
                            "Number_of_Activities is {} but {} activity ids were given",
                            c.number_of_activities,
                            c.activity_ids.len()
                        ),
                    ));
                }
                Ok(())
            }
            Self::SubjectPreferredRooms(c) => {
                if is_blank_ref(&c.subject) {
                    return Err(invalid(name, "Subject is required"));
                }
                check_room_list(name, c.number_of_preferred_rooms, &c.preferred_rooms)
            }
            Self::RoomNotAvailableTimes(c) => {
                if is_blank_ref(&c.room) {
                    return Err(invalid(name, "Room is required"));
                }
                if c.not_available_times.is_empty() {
                    return Err(invalid(name, "At least one time slot is required"));
                }
                if c.number_of_not_available_times as usize != c.not_available_times.len() {
                    return Err(invalid(
                        name,
                        "Number_of_Not_Available_Times does not match the listed slots",
                    ));
                }
                let mut seen = HashSet::new();
                for slot in &c.not_available_times {
                    if is_blank_ref(&slot.day) || is_blank_ref(&slot.hour) {
                        return Err(invalid(name, "Day and Hour are required for every slot"));
                    }
                    if !seen.insert(slot) {
                        return Err(invalid(name, "Duplicate time slots are not allowed"));
                    }
                }
                Ok(())
            }
            Self::ActivityPreferredRooms(c) => {
                if c.activity_id == 0 {
                    return Err(invalid(name, "Activity_Id is required"));
                }
                check_room_list(name, c.number_of_preferred_rooms, &c.preferred_rooms)
            }
            Self::ActivityPreferredStartingTime(c) => {
                if c.activity_id == 0 {
                    return Err(invalid(name, "Activity_Id is required"));
                }
                if c.preferred_day.is_empty() || c.preferred_hour.is_empty() {
                    return Err(invalid(name, "Preferred_Day and Preferred_Hour are required"));
                }
                Ok(())
            }
        }
    }

    /// The payload in its JSON form, for display and storage.
    pub fn parameters(&self) -> serde_json::Value {
        let value = match self {
            Self::BasicCompulsoryTime(c) | Self::BasicCompulsorySpace(c) => serde_json::to_value(c),
            Self::TeachersMaxGapsPerWeek(c) => serde_json::to_value(c),
            Self::MinDaysBetweenActivities(c) => serde_json::to_value(c),
            Self::SubjectPreferredRooms(c) => serde_json::to_value(c),
            Self::RoomNotAvailableTimes(c) => serde_json::to_value(c),
            Self::ActivityPreferredRooms(c) => serde_json::to_value(c),
            Self::ActivityPreferredStartingTime(c) => serde_json::to_value(c),
        };
        value.unwrap_or(serde_json::Value::Null)
    }
}

fn check_room_list(name: &str, declared: u32, rooms: &[String]) -> Result<(), ConstraintError> {
    if rooms.is_empty() {
        return Err(invalid(name, "At least one room is required"));
    }
    if rooms.iter().any(|r| is_blank_ref(r)) {
        return Err(invalid(name, "All rooms must be selected"));
    }
    if declared as usize != rooms.len() {
        return Err(invalid(
            name,
            format!(
                "Number_of_Preferred_Rooms is {} but {} rooms were given",
                declared,
                rooms.len()
            ),
        ));
    }
    Ok(())
}

/// A constraint row attached to a draft, with its payload as stored.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DraftConstraint {
    pub id: ConstraintId,
    pub draft_id: DraftId,
    pub canonical_name: String,
    pub scope: ConstraintScope,
    pub active: bool,
    /// Raw JSON text of the payload.
    pub parameters: String,
}

impl DraftConstraint {
    /// Parse the stored payload and check it against the registry.
    pub fn resolve(&self) -> Result<ConstraintKind, ConstraintError> {
        let value: serde_json::Value =
            serde_json::from_str(&self.parameters).map_err(|e| ConstraintError::Malformed {
                name: self.canonical_name.clone(),
                message: e.to_string(),
            })?;
        let constraint = ConstraintKind::parse(&self.canonical_name, &value)?;
        if constraint.scope() != self.scope {
            return Err(ConstraintError::ScopeMismatch {
                name: self.canonical_name.clone(),
                expected: constraint.scope(),
                actual: self.scope,
            });
        }
        Ok(constraint)
    }
}
