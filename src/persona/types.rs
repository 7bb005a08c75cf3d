//! Core types for the personality system.
//!
//! A personality is a named folder of profile files. Exactly one personality
//! is live at a time; its name is recorded in the state ledger.

use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::config::ProfileSettings;
use crate::error::Error;

/// Name of the reserved fallback personality.
pub const DEFAULT_PERSONALITY: &str = "default";

const MAX_NAME_LEN: usize = 64;

// ─────────────────────────────────────────────────────────────────
// Personality Name
// ─────────────────────────────────────────────────────────────────

/// A validated, filesystem-safe personality name.
///
/// The name doubles as the directory name inside the store, so it is limited to
/// ASCII letters, digits, `-` and `_`, and must start with a letter or digit.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct PersonalityName(String);

impl PersonalityName {
    /// Parse and validate a name.
    pub fn new(name: impl Into<String>) -> Result<Self, Error> {
        let name = name.into();
        let reason = if name.is_empty() {
            Some("name must not be empty".to_string())
        } else if name.len() > MAX_NAME_LEN {
            Some(format!("name must be at most {} characters", MAX_NAME_LEN))
        } else if !name.starts_with(|c: char| c.is_ascii_alphanumeric()) {
            Some("name must start with a letter or digit".to_string())
        } else if let Some(bad) = name
            .chars()
            .find(|c| !(c.is_ascii_alphanumeric() || *c == '-' || *c == '_'))
        {
            Some(format!("character '{}' is not allowed", bad))
        } else {
            None
        };

        match reason {
            Some(reason) => Err(Error::InvalidName { name, reason }),
            None => Ok(Self(name)),
        }
    }

    /// The reserved `default` personality.
    pub fn default_personality() -> Self {
        Self(DEFAULT_PERSONALITY.to_string())
    }

    /// Whether this is the reserved `default` personality.
    pub fn is_default(&self) -> bool {
        self.0 == DEFAULT_PERSONALITY
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for PersonalityName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl FromStr for PersonalityName {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::new(s)
    }
}

impl TryFrom<String> for PersonalityName {
    type Error = Error;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl From<PersonalityName> for String {
    fn from(name: PersonalityName) -> Self {
        name.0
    }
}

impl AsRef<str> for PersonalityName {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

// ─────────────────────────────────────────────────────────────────
// Slot State Machine
// ─────────────────────────────────────────────────────────────────

/// Lifecycle state of a single personality slot.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SlotState {
    /// No folder for this name exists.
    Uninstalled,
    /// Installed but not live.
    Inactive,
    /// Installed and live in the workspace.
    Active,
}

/// Events that move a slot between states.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SlotEvent {
    Create,
    SwitchIn,
    SwitchOut,
    Delete,
}

impl SlotState {
    /// Apply an event. Returns `None` when the transition is not allowed.
    ///
    /// `Delete` is only accepted from `Inactive`: an active slot must be
    /// switched out first (see [`DeletePlan`]).
    pub fn on(self, event: SlotEvent) -> Option<SlotState> {
        match (self, event) {
            (SlotState::Uninstalled, SlotEvent::Create) => Some(SlotState::Inactive),
            (SlotState::Inactive, SlotEvent::SwitchIn) => Some(SlotState::Active),
            (SlotState::Active, SlotEvent::SwitchIn) => Some(SlotState::Active),
            (SlotState::Active, SlotEvent::SwitchOut) => Some(SlotState::Inactive),
            (SlotState::Inactive, SlotEvent::Delete) => Some(SlotState::Uninstalled),
            _ => None,
        }
    }
}

/// How a delete request is carried out.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeletePlan {
    /// The target is inactive: remove it directly.
    Remove,
    /// The target is live: switch `default` in (target goes `Inactive`), then remove.
    SwitchToDefaultThenRemove,
}

impl DeletePlan {
    /// Decide how to delete `target` given the currently active personality.
    pub fn for_target(
        target: &PersonalityName,
        active: Option<&PersonalityName>,
    ) -> Result<Self, Error> {
        if target.is_default() {
            return Err(Error::CannotDeleteDefault);
        }

        let state = if active == Some(target) {
            SlotState::Active
        } else {
            SlotState::Inactive
        };

        match state.on(SlotEvent::Delete) {
            Some(_) => Ok(DeletePlan::Remove),
            None => {
                let switched_out = state
                    .on(SlotEvent::SwitchOut)
                    .and_then(|s| s.on(SlotEvent::Delete));
                debug_assert_eq!(switched_out, Some(SlotState::Uninstalled));
                Ok(DeletePlan::SwitchToDefaultThenRemove)
            }
        }
    }
}

// ─────────────────────────────────────────────────────────────────
// Profile Layout
// ─────────────────────────────────────────────────────────────────

/// Which files make up a personality.
#[derive(Debug, Clone)]
pub struct ProfileLayout {
    /// Files mirrored into the workspace.
    pub files: Vec<String>,
    /// Files that must exist for the personality to be valid.
    pub required: Vec<String>,
    /// Metadata file kept alongside the profile files.
    pub metadata_file: String,
}

impl From<&ProfileSettings> for ProfileLayout {
    fn from(settings: &ProfileSettings) -> Self {
        Self {
            files: settings.files.clone(),
            required: settings.required.clone(),
            metadata_file: settings.metadata_file.clone(),
        }
    }
}

impl Default for ProfileLayout {
    fn default() -> Self {
        Self::from(&ProfileSettings::default())
    }
}

// ─────────────────────────────────────────────────────────────────
// Metadata & Listings
// ─────────────────────────────────────────────────────────────────

/// Optional metadata stored in each personality folder.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PersonalityMeta {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,

    pub created_at: DateTime<Utc>,

    /// Where the initial files came from ("workspace", "template", or a personality name).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created_from: Option<String>,
}

/// Summary of an installed personality.
#[derive(Debug, Clone, Serialize)]
pub struct PersonalityInfo {
    pub name: PersonalityName,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    pub state: SlotState,
    pub valid: bool,
    pub files: Vec<String>,
    pub path: PathBuf,
}

/// Where `create` takes its initial files from.
#[derive(Debug, Clone)]
pub enum CreateSource {
    /// The managed files currently in the live workspace.
    Workspace,
    /// Another installed personality.
    Personality(PersonalityName),
    /// The bundled template.
    Template,
}

impl CreateSource {
    pub fn label(&self) -> String {
        match self {
            CreateSource::Workspace => "workspace".to_string(),
            CreateSource::Personality(name) => name.to_string(),
            CreateSource::Template => "template".to_string(),
        }
    }
}

// ─────────────────────────────────────────────────────────────────
// Ledger Record
// ─────────────────────────────────────────────────────────────────

/// The persisted record of which personality is live.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ActiveState {
    pub active: PersonalityName,

    #[serde(default)]
    pub previous: Option<PersonalityName>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub switched_at: Option<DateTime<Utc>>,
}

// ─────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────
