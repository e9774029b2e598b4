//! CLI configuration

use crate::error::{CliError, CliResult};
use definer_core::{AnalyzerRegistry, GroupPolicyKind, DEFAULT_CONTEXT_TAG};
use definer_interpreter::SessionSettings;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// CLI configuration
#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq)]
#[serde(default)]
pub struct DefinerConfig {
    pub scripting: ScriptingConfig,
    pub definitions: DefinitionsConfig,
    pub matching: MatchingConfig,
    pub repl: ReplConfig,
}

/// Embedded scripting snippets
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct ScriptingConfig {
    /// The one context tag accepted in ```` ```tag ...``` ```` snippets
    pub context_tag: String,

    /// Treat the language's builtins as bound everywhere
    pub ignore_builtins: bool,
}

impl Default for ScriptingConfig {
    fn default() -> Self {
        Self {
            context_tag: DEFAULT_CONTEXT_TAG.to_string(),
            ignore_builtins: false,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq)]
#[serde(default)]
pub struct DefinitionsConfig {
    /// How groups of child definitions are judged (opaque, conjunctive)
    pub group_policy: GroupPolicyKind,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct MatchingConfig {
    /// Cap on alternatives printed by `:/flatten`
    pub max_flattened_alternatives: usize,
}

impl Default for MatchingConfig {
    fn default() -> Self {
        Self {
            max_flattened_alternatives: SessionSettings::default().max_flattened_alternatives,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct ReplConfig {
    /// Text shown before each input line
    pub prompt: String,
}

impl Default for ReplConfig {
    fn default() -> Self {
        Self {
            prompt: "> ".to_string(),
        }
    }
}

impl DefinerConfig {
    /// Load configuration from file
    pub fn load(path: Option<&str>) -> CliResult<Self> {
        let config_path = match path {
            Some(p) => PathBuf::from(p),
            None => Self::default_config_path()?,
        };

        if config_path.exists() {
            let contents = std::fs::read_to_string(&config_path)?;
            let config: DefinerConfig =
                toml::from_str(&contents).map_err(|e| CliError::Config(e.to_string()))?;
            config.analyzers()?;
            Ok(config)
        } else {
            Ok(DefinerConfig::default())
        }
    }

    /// Get the default configuration file path
    fn default_config_path() -> CliResult<PathBuf> {
        let config_dir = dirs::config_dir()
            .ok_or_else(|| CliError::Config("Cannot find config directory".into()))?;
        Ok(config_dir.join("definer").join("config.toml"))
    }

    /// Scope analyzers for a new session.
    ///
    /// Fails when the configured context tag has no analyzer.
    pub fn analyzers(&self) -> CliResult<AnalyzerRegistry> {
        let mut registry = AnalyzerRegistry::with_python(self.scripting.ignore_builtins);
        let tag = self.scripting.context_tag.as_str();
        if !tag.is_empty() && !registry.set_default(tag) {
            return Err(CliError::Config(format!(
                "unsupported scripting context tag '{}' (accepted: {})",
                tag,
                registry.accepted_tags()
            )));
        }
        Ok(registry)
    }

    pub fn session_settings(&self) -> SessionSettings {
        SessionSettings {
            group_policy: self.definitions.group_policy,
            max_flattened_alternatives: self.matching.max_flattened_alternatives,
        }
    }
}
