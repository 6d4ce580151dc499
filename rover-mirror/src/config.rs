use crate::error::{MirrorError, Result};
use serde::{Deserialize, Serialize};

const ENV_LOG_LEVEL: &str = "ROVER_MIRROR_LOG_LEVEL";
const ENV_STRING_ID_PROP: &str = "ROVER_MIRROR_STRING_ID_PROP";
const ENV_HINT_PREFIX: &str = "ROVER_MIRROR_HINT_PREFIX";

/// Settings for a mirror instance
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct MirrorConfig {
    /// Animated keys merged into typed `props`; every other key goes to `raw_props`
    pub props_routed_keys: Vec<String>,
    /// Raw prop holding the string identifier used for lookups and hints
    pub string_id_prop: String,
    /// Prefix marking an identifier that carries hints: `<prefix>a;b:id`
    pub hint_prefix: String,
    /// One of debug, info, warn, error, nope
    pub log_level: String,
}

impl Default for MirrorConfig {
    fn default() -> Self {
        Self {
            props_routed_keys: vec!["transform".to_string()],
            string_id_prop: "nativeID".to_string(),
            hint_prefix: "__native::".to_string(),
            log_level: "warn".to_string(),
        }
    }
}

impl MirrorConfig {
    pub fn from_json(source: &str) -> Result<Self> {
        let config: MirrorConfig = serde_json::from_str(source)?;
        config.validate()?;
        Ok(config)
    }

    /// Defaults overridden by `ROVER_MIRROR_*` environment variables
    pub fn from_env() -> Result<Self> {
        let mut config = Self::default();
        if let Ok(level) = std::env::var(ENV_LOG_LEVEL) {
            config.log_level = level.to_lowercase();
        }
        if let Ok(prop) = std::env::var(ENV_STRING_ID_PROP) {
            config.string_id_prop = prop;
        }
        if let Ok(prefix) = std::env::var(ENV_HINT_PREFIX) {
            config.hint_prefix = prefix;
        }
        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> Result<()> {
        match self.log_level.as_str() {
            "debug" | "info" | "warn" | "error" | "nope" => {}
            other => {
                return Err(MirrorError::InvalidConfig(format!(
                    "log_level must be one of: debug, info, warn, error, nope (got '{}')",
                    other
                )));
            }
        }
        if self.string_id_prop.is_empty() {
            return Err(MirrorError::InvalidConfig(
                "string_id_prop must not be empty".to_string(),
            ));
        }
        Ok(())
    }
}
