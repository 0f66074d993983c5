use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Registration lifecycle states, in lifecycle order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum RegistrationStatus {
    InProgress,
    Declared,
    Validated,
    Registered,
    Certified,
}

impl RegistrationStatus {
    pub const ALL: [RegistrationStatus; 5] = [
        Self::InProgress,
        Self::Declared,
        Self::Validated,
        Self::Registered,
        Self::Certified,
    ];

    pub fn code(self) -> &'static str {
        match self {
            Self::InProgress => "IN_PROGRESS",
            Self::Declared => "DECLARED",
            Self::Validated => "VALIDATED",
            Self::Registered => "REGISTERED",
            Self::Certified => "CERTIFIED",
        }
    }

    /// No transition may leave a terminal state.
    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Certified)
    }
}

impl fmt::Display for RegistrationStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.code())
    }
}

impl FromStr for RegistrationStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|status| status.code() == s)
            .ok_or_else(|| format!("Unknown registration status: {s}"))
    }
}

/// The vital event a registration records.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum EventType {
    Birth,
    Death,
}

impl EventType {
    pub fn code(self) -> &'static str {
        match self {
            Self::Birth => "BIRTH",
            Self::Death => "DEATH",
        }
    }

    /// Lower-case prefix used in identifier names, e.g. `birth-tracking-id`.
    pub fn slug(self) -> &'static str {
        match self {
            Self::Birth => "birth",
            Self::Death => "death",
        }
    }

    pub fn tracking_id_name(self) -> String {
        format!("{}-tracking-id", self.slug())
    }

    pub fn registration_number_name(self) -> String {
        format!("{}-registration-number", self.slug())
    }

    /// Maps a Composition type code (`birth-declaration`, `death-notification`, ...).
    pub fn from_composition_code(code: &str) -> Option<Self> {
        if code.starts_with("birth-") {
            Some(Self::Birth)
        } else if code.starts_with("death-") {
            Some(Self::Death)
        } else {
            None
        }
    }
}

impl fmt::Display for EventType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.code())
    }
}

impl FromStr for EventType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "BIRTH" => Ok(Self::Birth),
            "DEATH" => Ok(Self::Death),
            _ => Err(format!("Unknown event type: {s}")),
        }
    }
}
