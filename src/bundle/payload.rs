//! Typed troubleshooting payloads.
//!
//! Producers of different versions add and drop fields, so every known field
//! is optional and anything unrecognised is kept in `extra`. A known field
//! with the wrong JSON type is still a decode failure.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::BTreeMap;

/// Enum-valued field written either as its numeric code or its name.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum EnumValue {
    Code(i64),
    Name(String),
}

impl std::fmt::Display for EnumValue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Code(code) => write!(f, "{code}"),
            Self::Name(name) => f.write_str(name),
        }
    }
}

// ── Launcher ──────────────────────────────────────────────────

/// Launcher state from a `TROUBLESHXLTING:` marker.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "PascalCase")]
pub struct XlTroubleshooting {
    pub when: Option<String>,
    pub is_dx11: Option<bool>,
    pub is_auto_login: Option<bool>,
    pub is_uid_cache: Option<bool>,
    pub dalamud_enabled: Option<bool>,
    pub dalamud_load_method: Option<EnumValue>,
    pub dalamud_injection_delay: Option<f64>,
    pub steam_integration: Option<bool>,
    pub encrypt_arguments: Option<bool>,
    pub launcher_version: Option<String>,
    pub launcher_hash: Option<String>,
    pub official: Option<bool>,
    pub dpi_awareness: Option<EnumValue>,
    pub platform: Option<EnumValue>,
    pub observed_game_version: Option<String>,
    pub observed_ex1_version: Option<String>,
    pub observed_ex2_version: Option<String>,
    pub observed_ex3_version: Option<String>,
    pub observed_ex4_version: Option<String>,
    pub observed_ex5_version: Option<String>,
    pub bck_match: Option<bool>,
    pub index_integrity: Option<EnumValue>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

// ── Plugin host ───────────────────────────────────────────────

/// Plugin host state from a `TROUBLESHOOTING:` marker.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "PascalCase")]
pub struct DalamudTroubleshooting {
    pub loaded_plugins: Option<Vec<PluginManifest>>,
    pub plugin_states: Option<BTreeMap<String, String>>,
    pub ever_started_loading_plugins: Option<Vec<String>>,
    pub dalamud_version: Option<String>,
    pub dalamud_git_hash: Option<String>,
    pub game_version: Option<String>,
    pub language: Option<EnumValue>,
    pub beta_key: Option<String>,
    pub do_dalamud_test: Option<bool>,
    pub do_plugin_test: Option<bool>,
    pub load_all_api_levels: Option<bool>,
    pub interface_loaded: Option<bool>,
    pub forced_min_hook: Option<bool>,
    pub has_third_repo: Option<bool>,
    pub third_repo: Option<Vec<Value>>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl DalamudTroubleshooting {
    pub fn plugins(&self) -> &[PluginManifest] {
        self.loaded_plugins.as_deref().unwrap_or_default()
    }
}

/// One entry of `LoadedPlugins`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "PascalCase")]
pub struct PluginManifest {
    pub internal_name: Option<String>,
    pub name: Option<String>,
    pub author: Option<String>,
    pub assembly_version: Option<String>,
    pub testing_assembly_version: Option<String>,
    pub repo_url: Option<String>,
    pub dalamud_api_level: Option<i64>,
    pub installed_from_url: Option<String>,
    pub disabled: Option<bool>,
    pub testing: Option<bool>,
    pub is_third_party: Option<bool>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

// ── Exception ─────────────────────────────────────────────────

/// Last unhandled exception from a `LASTEXCEPTION:` marker.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "PascalCase")]
pub struct ExceptionTroubleshooting {
    pub when: Option<String>,
    pub info: Option<String>,
    pub context: Option<String>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}
