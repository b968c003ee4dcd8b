//! Configuration management with file persistence

use anyhow::{Context, anyhow};
use serde::{Deserialize, Serialize};
use std::env;
use std::fs;
use std::path::PathBuf;
use std::time::Duration;

use crate::prerequisites::{CyclePolicy, FoundationSet, ResolverOptions};

/// Largest depth a caller may request for a prerequisite tree
pub const MAX_RESOLUTION_DEPTH: u32 = 10;

/// Upper bound for `resolver.max_concurrency`
pub const MAX_RESOLVER_CONCURRENCY: usize = 1024;

/// Upper bound for `resolver.timeout_secs` (one day)
pub const MAX_RESOLVER_TIMEOUT_SECS: u64 = 86_400;

/// AhaTutor configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub llm: LlmConfig,
    #[serde(default)]
    pub resolver: ResolverConfig,
    #[serde(default)]
    pub knowledge: KnowledgeConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LlmConfig {
    #[serde(skip)]
    pub api_key: Option<String>,
    pub base_url: Option<String>,
    pub default_model: String,
    pub fallback_models: Vec<String>,
    pub temperature: f32,
    pub max_tokens: usize,
    pub timeout_secs: u64,
}

/// Settings for the recursive prerequisite resolver
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ResolverConfig {
    /// Concepts treated as axiomatic; recursion stops there
    pub foundation_concepts: Vec<String>,
    pub default_max_depth: u32,
    pub quick_max_depth: u32,
    pub max_concurrency: usize,
    pub timeout_secs: u64,
    pub max_prerequisites: usize,
    pub memoize: bool,
    pub cycle_policy: CyclePolicy,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct KnowledgeConfig {
    /// Curated store file; the bundled genetics store is used when unset
    pub data_path: Option<PathBuf>,
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            api_key: None,
            base_url: None,
            default_model: "anthropic/claude-sonnet-4-20250514".to_string(),
            fallback_models: vec![
                "anthropic/claude-3-5-haiku-latest".to_string(),
                "openai/gpt-4o".to_string(),
            ],
            temperature: 0.7,
            max_tokens: 4096,
            timeout_secs: 120,
        }
    }
}

impl Default for ResolverConfig {
    fn default() -> Self {
        Self {
            foundation_concepts: FoundationSet::genetics()
                .iter()
                .map(str::to_string)
                .collect(),
            default_max_depth: 3,
            quick_max_depth: 2,
            max_concurrency: 8,
            timeout_secs: 60,
            max_prerequisites: 5,
            memoize: false,
            cycle_policy: CyclePolicy::Prune,
        }
    }
}

impl ResolverConfig {
    /// Build the injected foundation set
    pub fn foundation_set(&self) -> FoundationSet {
        FoundationSet::new(self.foundation_concepts.iter().cloned())
    }

    /// Runtime options for a resolver built from this config
    pub fn options(&self) -> ResolverOptions {
        ResolverOptions {
            max_concurrency: self.max_concurrency,
            timeout: Duration::from_secs(self.timeout_secs),
            max_prerequisites: self.max_prerequisites,
            memoize: self.memoize,
            cycle_policy: self.cycle_policy,
        }
    }
}

impl LlmConfig {
    pub fn resolved_api_key(&self) -> anyhow::Result<Option<String>> {
        self.enforce_env_only()?;

        Ok(env::var("AHATUTOR_API_KEY")
            .or_else(|_| env::var("OPENROUTER_API_KEY"))
            .ok()
            .filter(|key| !key.trim().is_empty()))
    }

    pub fn redacted_api_key(&self) -> anyhow::Result<Option<String>> {
        self.resolved_api_key().map(|opt| {
            opt.map(|key| {
                if key.len() <= 4 {
                    "***".to_string()
                } else {
                    let suffix = &key[key.len() - 4..];
                    format!("***{}", suffix)
                }
            })
        })
    }

    pub fn enforce_env_only(&self) -> anyhow::Result<()> {
        if self.api_key.is_some() {
            return Err(anyhow!(
                "LLM API keys must be provided via environment variables, not stored in configuration"
            ));
        }
        Ok(())
    }
}

impl Config {
    /// Get the config directory path
    pub fn config_dir() -> anyhow::Result<PathBuf> {
        let dir = if let Ok(custom_dir) = env::var("AHATUTOR_CONFIG_DIR") {
            PathBuf::from(custom_dir)
        } else {
            dirs::config_dir()
                .ok_or_else(|| anyhow!("Could not determine config directory"))?
                .join("ahatutor")
        };
        Ok(dir)
    }

    /// Get the config file path
    pub fn config_path() -> anyhow::Result<PathBuf> {
        Ok(Self::config_dir()?.join("config.toml"))
    }

    /// Load configuration from file, or the defaults if it doesn't exist
    pub fn load() -> anyhow::Result<Self> {
        let path = Self::config_path()?;

        if path.exists() {
            let contents = fs::read_to_string(&path)
                .with_context(|| format!("Failed to read config file: {}", path.display()))?;
            Self::from_toml(&contents)
                .with_context(|| format!("Failed to parse config file: {}", path.display()))
        } else {
            Ok(Config::default())
        }
    }

    /// Parse and validate configuration from TOML text
    pub fn from_toml(contents: &str) -> anyhow::Result<Self> {
        let config: Config = toml::from_str(contents)?;
        config.validate()?;
        Ok(config)
    }

    /// Save configuration to file
    pub fn save(&self) -> anyhow::Result<()> {
        self.validate()?;

        let dir = Self::config_dir()?;
        fs::create_dir_all(&dir)
            .with_context(|| format!("Failed to create config directory: {}", dir.display()))?;

        let path = Self::config_path()?;
        let contents = toml::to_string_pretty(self).context("Failed to serialize config")?;

        fs::write(&path, contents)
            .with_context(|| format!("Failed to write config file: {}", path.display()))?;

        Ok(())
    }

    /// Validate configuration
    pub fn validate(&self) -> anyhow::Result<()> {
        self.llm.enforce_env_only()?;

        if !(0.0..=2.0).contains(&self.llm.temperature) {
            return Err(anyhow!("Temperature must be between 0.0 and 2.0"));
        }
        check_concurrency(self.resolver.max_concurrency)?;
        check_timeout(self.resolver.timeout_secs)?;
        if self.resolver.max_prerequisites == 0 {
            return Err(anyhow!("resolver.max_prerequisites must be at least 1"));
        }
        for depth in [self.resolver.default_max_depth, self.resolver.quick_max_depth] {
            if depth > MAX_RESOLUTION_DEPTH {
                return Err(anyhow!(
                    "Resolver depth {} exceeds the maximum of {}",
                    depth,
                    MAX_RESOLUTION_DEPTH
                ));
            }
        }
        Ok(())
    }

    /// Get a configuration value by key
    pub fn get(&self, key: &str) -> anyhow::Result<String> {
        match key {
            // LLM settings
            "llm.base_url" => Ok(self.llm.base_url.clone().unwrap_or_default()),
            "llm.default_model" => Ok(self.llm.default_model.clone()),
            "llm.fallback_models" => Ok(self.llm.fallback_models.join(", ")),
            "llm.temperature" => Ok(self.llm.temperature.to_string()),
            "llm.max_tokens" => Ok(self.llm.max_tokens.to_string()),
            "llm.timeout_secs" => Ok(self.llm.timeout_secs.to_string()),

            // Resolver settings
            "resolver.foundation_concepts" => Ok(self.resolver.foundation_concepts.join(", ")),
            "resolver.default_max_depth" => Ok(self.resolver.default_max_depth.to_string()),
            "resolver.quick_max_depth" => Ok(self.resolver.quick_max_depth.to_string()),
            "resolver.max_concurrency" => Ok(self.resolver.max_concurrency.to_string()),
            "resolver.timeout_secs" => Ok(self.resolver.timeout_secs.to_string()),
            "resolver.max_prerequisites" => Ok(self.resolver.max_prerequisites.to_string()),
            "resolver.memoize" => Ok(self.resolver.memoize.to_string()),
            "resolver.cycle_policy" => Ok(self.resolver.cycle_policy.to_string()),

            // Knowledge settings
            "knowledge.data_path" => Ok(self
                .knowledge
                .data_path
                .as_ref()
                .map(|p| p.display().to_string())
                .unwrap_or_else(|| "(bundled genetics store)".to_string())),

            // API key (special handling - show redacted)
            "llm.api_key" | "api_key" => match self.llm.redacted_api_key()? {
                Some(redacted) => Ok(redacted),
                None => Ok(
                    "(not set - use AHATUTOR_API_KEY or OPENROUTER_API_KEY env var)".to_string(),
                ),
            },

            _ => Err(anyhow!(
                "Unknown configuration key: {}. Use `ahatutor config list` to see available keys.",
                key
            )),
        }
    }

    /// Set a configuration value by key
    pub fn set(&mut self, key: &str, value: &str) -> anyhow::Result<()> {
        match key {
            // LLM settings
            "llm.base_url" => {
                self.llm.base_url = Some(value.to_string()).filter(|v| !v.is_empty());
            }
            "llm.default_model" => {
                self.llm.default_model = value.to_string();
            }
            "llm.fallback_models" => {
                self.llm.fallback_models = split_list(value);
            }
            "llm.temperature" => {
                let temp: f32 = value
                    .parse()
                    .with_context(|| format!("Invalid temperature value: {}", value))?;
                if !(0.0..=2.0).contains(&temp) {
                    return Err(anyhow!("Temperature must be between 0.0 and 2.0"));
                }
                self.llm.temperature = temp;
            }
            "llm.max_tokens" => {
                self.llm.max_tokens = value
                    .parse()
                    .with_context(|| format!("Invalid max_tokens value: {}", value))?;
            }
            "llm.timeout_secs" => {
                self.llm.timeout_secs = value
                    .parse()
                    .with_context(|| format!("Invalid timeout_secs value: {}", value))?;
            }

            // Resolver settings
            "resolver.foundation_concepts" => {
                self.resolver.foundation_concepts = split_list(value);
            }
            "resolver.default_max_depth" => {
                self.resolver.default_max_depth = parse_depth(value)?;
            }
            "resolver.quick_max_depth" => {
                self.resolver.quick_max_depth = parse_depth(value)?;
            }
            "resolver.max_concurrency" => {
                let limit: usize = value
                    .parse()
                    .with_context(|| format!("Invalid max_concurrency value: {}", value))?;
                self.resolver.max_concurrency = check_concurrency(limit)?;
            }
            "resolver.timeout_secs" => {
                let secs: u64 = value
                    .parse()
                    .with_context(|| format!("Invalid timeout_secs value: {}", value))?;
                self.resolver.timeout_secs = check_timeout(secs)?;
            }
            "resolver.max_prerequisites" => {
                let limit: usize = value
                    .parse()
                    .with_context(|| format!("Invalid max_prerequisites value: {}", value))?;
                if limit == 0 {
                    return Err(anyhow!("max_prerequisites must be at least 1"));
                }
                self.resolver.max_prerequisites = limit;
            }
            "resolver.memoize" => {
                self.resolver.memoize = value
                    .parse()
                    .with_context(|| format!("Invalid memoize value: {} (use true or false)", value))?;
            }
            "resolver.cycle_policy" => {
                self.resolver.cycle_policy = value.parse().map_err(|e: String| anyhow!(e))?;
            }

            // Knowledge settings
            "knowledge.data_path" => {
                self.knowledge.data_path = Some(PathBuf::from(value)).filter(|_| !value.is_empty());
            }

            // API key cannot be set via config
            "llm.api_key" | "api_key" => {
                return Err(anyhow!(
                    "API keys cannot be stored in configuration for security. \
                     Set the AHATUTOR_API_KEY or OPENROUTER_API_KEY environment variable instead."
                ));
            }

            _ => {
                return Err(anyhow!(
                    "Unknown configuration key: {}. Use `ahatutor config list` to see available keys.",
                    key
                ));
            }
        }
        Ok(())
    }

    /// List all configuration keys and their values
    pub fn list(&self) -> anyhow::Result<Vec<(String, String)>> {
        let keys = vec![
            "llm.base_url",
            "llm.default_model",
            "llm.fallback_models",
            "llm.temperature",
            "llm.max_tokens",
            "llm.timeout_secs",
            "llm.api_key",
            "resolver.foundation_concepts",
            "resolver.default_max_depth",
            "resolver.quick_max_depth",
            "resolver.max_concurrency",
            "resolver.timeout_secs",
            "resolver.max_prerequisites",
            "resolver.memoize",
            "resolver.cycle_policy",
            "knowledge.data_path",
        ];

        keys.into_iter()
            .map(|key| {
                let value = self.get(key)?;
                Ok((key.to_string(), value))
            })
            .collect()
    }

    /// Reset configuration to defaults
    pub fn reset() -> anyhow::Result<()> {
        let path = Self::config_path()?;
        if path.exists() {
            fs::remove_file(&path)
                .with_context(|| format!("Failed to remove config file: {}", path.display()))?;
        }
        Ok(())
    }
}

fn split_list(value: &str) -> Vec<String> {
    value
        .split(',')
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
        .collect()
}

fn check_concurrency(limit: usize) -> anyhow::Result<usize> {
    if !(1..=MAX_RESOLVER_CONCURRENCY).contains(&limit) {
        return Err(anyhow!(
            "resolver.max_concurrency must be between 1 and {}",
            MAX_RESOLVER_CONCURRENCY
        ));
    }
    Ok(limit)
}

fn check_timeout(secs: u64) -> anyhow::Result<u64> {
    if !(1..=MAX_RESOLVER_TIMEOUT_SECS).contains(&secs) {
        return Err(anyhow!(
            "resolver.timeout_secs must be between 1 and {}",
            MAX_RESOLVER_TIMEOUT_SECS
        ));
    }
    Ok(secs)
}

fn parse_depth(value: &str) -> anyhow::Result<u32> {
    let depth: u32 = value
        .parse()
        .with_context(|| format!("Invalid depth value: {}", value))?;
    if depth > MAX_RESOLUTION_DEPTH {
        return Err(anyhow!(
            "Depth must be at most {}",
            MAX_RESOLUTION_DEPTH
        ));
    }
    Ok(depth)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config_is_valid() {
        let config = Config::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.resolver.default_max_depth, 3);
        assert_eq!(config.resolver.quick_max_depth, 2);
        assert_eq!(config.resolver.cycle_policy, CyclePolicy::Prune);
        assert!(config.resolver.foundation_set().contains("DNA"));
    }

    #[test]
    fn test_get_and_set_roundtrip() {
        let mut config = Config::default();
        config.set("resolver.max_concurrency", "3").unwrap();
        assert_eq!(config.get("resolver.max_concurrency").unwrap(), "3");

        config.set("resolver.foundation_concepts", "atom, electron ,").unwrap();
        assert_eq!(config.resolver.foundation_concepts, vec!["atom", "electron"]);

        config.set("resolver.cycle_policy", "allow").unwrap();
        assert_eq!(config.resolver.cycle_policy, CyclePolicy::Allow);
    }

    #[test]
    fn test_set_rejects_invalid_values() {
        let mut config = Config::default();
        assert!(config.set("llm.temperature", "3.5").is_err());
        assert!(config.set("resolver.max_concurrency", "0").is_err());
        assert!(config.set("resolver.default_max_depth", "11").is_err());
        assert!(config.set("resolver.cycle_policy", "sometimes").is_err());
        assert!(config.set("llm.api_key", "sk-secret").is_err());
        assert!(config.set("no.such.key", "1").is_err());
    }

    #[test]
    fn test_resolver_limits_are_bounded() {
        let mut config = Config::default();
        let huge = u64::MAX.to_string();
        assert!(config.set("resolver.timeout_secs", &huge).is_err());
        assert!(config.set("resolver.timeout_secs", "0").is_err());
        assert!(config.set("resolver.max_concurrency", &huge).is_err());
        assert!(config.set("resolver.max_concurrency", "1025").is_err());
        assert!(config.validate().is_ok());

        config.resolver.timeout_secs = u64::MAX;
        assert!(config.validate().is_err());
        config.resolver.timeout_secs = 60;
        config.resolver.max_concurrency = usize::MAX;
        assert!(config.validate().is_err());

        let err = Config::from_toml("[resolver]\ntimeout_secs = 18446744073709551615\n");
        assert!(err.is_err());
    }

    #[test]
    fn test_from_toml_partial_sections() {
        let config = Config::from_toml(
            r#"
            [resolver]
            foundation_concepts = ["cell"]
            default_max_depth = 4
            quick_max_depth = 1
            max_concurrency = 2
            timeout_secs = 5
            max_prerequisites = 3
            memoize = true
            cycle_policy = "allow"
            "#,
        )
        .unwrap();

        assert_eq!(config.resolver.default_max_depth, 4);
        assert!(config.resolver.memoize);
        assert_eq!(config.llm.default_model, LlmConfig::default().default_model);

        let options = config.resolver.options();
        assert_eq!(options.max_concurrency, 2);
        assert_eq!(options.timeout, Duration::from_secs(5));
    }

    #[test]
    fn test_from_toml_rejects_deep_default() {
        let result = Config::from_toml(
            r#"
            [resolver]
            foundation_concepts = []
            default_max_depth = 50
            quick_max_depth = 2
            max_concurrency = 2
            timeout_secs = 5
            max_prerequisites = 3
            memoize = false
            cycle_policy = "prune"
            "#,
        );
        assert!(result.is_err());
    }

    #[test]
    fn test_list_contains_all_sections() {
        let config = Config::default();
        let keys: Vec<String> = config.list().unwrap().into_iter().map(|(k, _)| k).collect();
        assert!(keys.iter().any(|k| k.starts_with("llm.")));
        assert!(keys.iter().any(|k| k.starts_with("resolver.")));
        assert!(keys.iter().any(|k| k == "knowledge.data_path"));
    }
}
