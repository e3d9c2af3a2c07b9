//! Clubs, club families, and the round context supplied by the round manager.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Golf club.
///
/// Variants serialize to short bag codes (`"DR"`, `"7I"`, etc.) via serde
/// rename. `Display` returns the same code. `from_code()` parses
/// case-insensitively. `club_type()` maps to the template family.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Club {
    #[serde(rename = "DR")]
    Driver,
    #[serde(rename = "3W")]
    Wood3,
    #[serde(rename = "5W")]
    Wood5,
    #[serde(rename = "4H")]
    Hybrid4,
    #[serde(rename = "5I")]
    Iron5,
    #[serde(rename = "6I")]
    Iron6,
    #[serde(rename = "7I")]
    Iron7,
    #[serde(rename = "8I")]
    Iron8,
    #[serde(rename = "9I")]
    Iron9,
    #[serde(rename = "PW")]
    PitchingWedge,
    #[serde(rename = "SW")]
    SandWedge,
    #[serde(rename = "LW")]
    LobWedge,
    #[serde(rename = "PT")]
    Putter,
}

impl Club {
    /// All variants in bag order (driver through putter).
    pub const ALL: &[Club] = &[
        Club::Driver,
        Club::Wood3,
        Club::Wood5,
        Club::Hybrid4,
        Club::Iron5,
        Club::Iron6,
        Club::Iron7,
        Club::Iron8,
        Club::Iron9,
        Club::PitchingWedge,
        Club::SandWedge,
        Club::LobWedge,
        Club::Putter,
    ];

    /// Parse a club code case-insensitively. Returns `None` for unknown codes.
    pub fn from_code(s: &str) -> Option<Club> {
        Club::ALL
            .iter()
            .copied()
            .find(|c| c.code().eq_ignore_ascii_case(s.trim()))
    }

    pub fn code(&self) -> &'static str {
        match self {
            Club::Driver => "DR",
            Club::Wood3 => "3W",
            Club::Wood5 => "5W",
            Club::Hybrid4 => "4H",
            Club::Iron5 => "5I",
            Club::Iron6 => "6I",
            Club::Iron7 => "7I",
            Club::Iron8 => "8I",
            Club::Iron9 => "9I",
            Club::PitchingWedge => "PW",
            Club::SandWedge => "SW",
            Club::LobWedge => "LW",
            Club::Putter => "PT",
        }
    }

    /// Map this club to the template family used for pattern matching.
    pub fn club_type(&self) -> ClubType {
        match self {
            Club::Driver => ClubType::Driver,
            Club::Wood3 | Club::Wood5 => ClubType::FairwayWood,
            Club::Hybrid4 => ClubType::Hybrid,
            Club::Iron5 | Club::Iron6 | Club::Iron7 | Club::Iron8 | Club::Iron9 => ClubType::Iron,
            Club::PitchingWedge | Club::SandWedge | Club::LobWedge => ClubType::Wedge,
            Club::Putter => ClubType::Putter,
        }
    }
}

impl fmt::Display for Club {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.code())
    }
}

/// Club family. Templates, calibration, and the false-positive library work
/// at this granularity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[cfg_attr(feature = "clap", derive(clap::ValueEnum))]
#[serde(rename_all = "snake_case")]
pub enum ClubType {
    Driver,
    FairwayWood,
    Hybrid,
    Iron,
    Wedge,
    Putter,
}

impl ClubType {
    pub const ALL: &[ClubType] = &[
        ClubType::Driver,
        ClubType::FairwayWood,
        ClubType::Hybrid,
        ClubType::Iron,
        ClubType::Wedge,
        ClubType::Putter,
    ];
}

impl fmt::Display for ClubType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Driver => write!(f, "driver"),
            Self::FairwayWood => write!(f, "fairway_wood"),
            Self::Hybrid => write!(f, "hybrid"),
            Self::Iron => write!(f, "iron"),
            Self::Wedge => write!(f, "wedge"),
            Self::Putter => write!(f, "putter"),
        }
    }
}

/// Dominant hand of the golfer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[cfg_attr(feature = "clap", derive(clap::ValueEnum))]
#[serde(rename_all = "snake_case")]
pub enum Handedness {
    #[default]
    Right,
    Left,
}

impl fmt::Display for Handedness {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Right => write!(f, "RH"),
            Self::Left => write!(f, "LH"),
        }
    }
}

/// Immutable snapshot of the round context (from the round manager).
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RoundSnapshot {
    #[serde(default)]
    pub round_active: bool,
    #[serde(default)]
    pub club: Option<Club>,
    #[serde(default)]
    pub handedness: Option<Handedness>,
}
