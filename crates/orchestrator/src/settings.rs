//! Settings shared by every front end.
//!
//! Deserialized from the `[authority]` and `[orchestrator]` tables of the
//! configuration file; loading and environment overrides live with the
//! front end.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Settings {
    #[serde(default)]
    pub authority: AuthoritySettings,
    #[serde(default)]
    pub orchestrator: DeskSettings,
}

/// Where the authority lives and how to authenticate.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct AuthoritySettings {
    #[serde(default)]
    pub base_url: String,
    #[serde(default)]
    pub token: Option<String>,
}

/// Behaviour of the action desk.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct DeskSettings {
    /// Pause between commit and letter opening. The commit ordering does not
    /// depend on it.
    #[serde(default)]
    pub letter_open_delay_ms: u64,
    #[serde(default = "default_open_letters")]
    pub open_letters: bool,
}

fn default_open_letters() -> bool {
    true
}

impl Default for DeskSettings {
    fn default() -> Self {
        DeskSettings {
            letter_open_delay_ms: 0,
            open_letters: true,
        }
    }
}
