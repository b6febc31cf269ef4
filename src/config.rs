//! Configuration management for crypto-cli

use crate::batch::Operation;
use crate::crypto::{required_key_length, SCHEME_CBC};
use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;

/// Default config location, relative to the home directory
pub const DEFAULT_CONFIG_PATH: &str = "~/.config/crypto-cli/config.yaml";

/// Logging configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Log level (trace, debug, info, warn, error)
    #[serde(default = "default_log_level")]
    pub level: String,

    /// Append logs to this file instead of stderr
    #[serde(default)]
    pub file: Option<PathBuf>,
}

fn default_log_level() -> String {
    "info".to_string()
}

impl Default for LoggingConfig {
    fn default() -> Self {
        LoggingConfig {
            level: default_log_level(),
            file: None,
        }
    }
}

/// What the inputs of a task are
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum InputType {
    #[default]
    String,
    File,
}

impl fmt::Display for InputType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            InputType::String => f.write_str("string"),
            InputType::File => f.write_str("file"),
        }
    }
}

impl FromStr for InputType {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_lowercase().as_str() {
            "string" => Ok(InputType::String),
            "file" => Ok(InputType::File),
            other => Err(Error::InvalidConfig(format!(
                "input type must be string or file, got '{}'",
                other
            ))),
        }
    }
}

/// A batch declared in the config file, run by the `config` command
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TaskConfig {
    pub mode: Operation,

    #[serde(default)]
    pub input_type: InputType,

    #[serde(default)]
    pub inputs: Vec<String>,

    /// Output file (single input) or directory
    #[serde(default)]
    pub output: Option<PathBuf>,
}

/// Main configuration structure
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Config {
    /// Scheme used when none is given on the command line
    #[serde(default = "default_scheme")]
    pub default_scheme: String,

    /// Process file batches with one worker per file
    #[serde(default)]
    pub concurrent: bool,

    /// Password for key derivation; prefer `${VAR}` over a literal
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub default_password: Option<String>,

    /// Salt for key derivation (hex)
    #[serde(default, with = "hex_serde", skip_serializing_if = "Option::is_none")]
    pub salt: Option<Vec<u8>>,

    /// Use the CBC stream pipeline for files
    #[serde(default)]
    pub stream: bool,

    /// Write and verify `.sha256` sidecars
    #[serde(default = "default_true")]
    pub checksums: bool,

    /// Write `.meta.yaml` sidecars
    #[serde(default)]
    pub metadata: bool,

    #[serde(default)]
    pub logging: LoggingConfig,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub task: Option<TaskConfig>,
}

fn default_scheme() -> String {
    SCHEME_CBC.to_string()
}

fn default_true() -> bool {
    true
}

impl Default for Config {
    fn default() -> Self {
        Config {
            default_scheme: default_scheme(),
            concurrent: false,
            default_password: None,
            salt: None,
            stream: false,
            checksums: true,
            metadata: false,
            logging: LoggingConfig::default(),
            task: None,
        }
    }
}

fn is_yaml(path: &Path) -> bool {
    matches!(
        path.extension().and_then(|s| s.to_str()),
        Some("yaml") | Some("yml")
    )
}

impl Config {
    /// Load configuration from a file (YAML or JSON), with environment variable substitution
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path_ref = path.as_ref();
        let content = std::fs::read_to_string(path_ref).map_err(|e| {
            Error::Config(format!("Failed to read config file {:?}: {}", path_ref, e))
        })?;

        let content = Self::substitute_env_vars(&content)?;

        let config: Config = if is_yaml(path_ref) {
            serde_yaml::from_str(&content)
                .map_err(|e| Error::Config(format!("Failed to parse YAML config: {}", e)))?
        } else {
            serde_json::from_str(&content)
                .map_err(|e| Error::Config(format!("Failed to parse JSON config: {}", e)))?
        };

        config.validate()?;
        Ok(config)
    }

    /// Load from `path` if given, else from the default location if it exists
    pub fn load_or_default(path: Option<&Path>) -> Result<Self> {
        if let Some(path) = path {
            return Self::load(expand_tilde(path));
        }

        match default_config_path() {
            Some(path) if path.exists() => Self::load(path),
            _ => Ok(Config::default()),
        }
    }

    /// Substitute environment variables in config content.
    /// Supports ${VAR_NAME} syntax; unset variables are left as written.
    fn substitute_env_vars(content: &str) -> Result<String> {
        let re = regex::Regex::new(r"\$\{([A-Z_][A-Z0-9_]*)\}")
            .map_err(|e| Error::Internal(format!("bad substitution pattern: {}", e)))?;

        let mut result = content.to_string();
        for cap in re.captures_iter(content) {
            let full_match = &cap[0];
            let var_name = &cap[1];

            if let Ok(value) = std::env::var(var_name) {
                result = result.replace(full_match, &value);
            }
        }

        Ok(result)
    }

    /// Apply environment variable overrides to configuration
    pub fn apply_env_overrides(&mut self) {
        if let Ok(scheme) = std::env::var("CRYPTO_CLI_SCHEME") {
            let scheme = scheme.trim().to_lowercase();
            if !scheme.is_empty() {
                self.default_scheme = scheme;
            }
        }

        if let Ok(password) = std::env::var("CRYPTO_CLI_PASSWORD") {
            if !password.is_empty() {
                self.default_password = Some(password);
            }
        }

        if let Ok(level) = std::env::var("CRYPTO_CLI_LOG_LEVEL") {
            let level = level.trim().to_string();
            if !level.is_empty() {
                self.logging.level = level;
            }
        }
    }

    /// Save configuration to a file (format determined by extension)
    pub fn save<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let path_ref = path.as_ref();

        let content = if is_yaml(path_ref) {
            serde_yaml::to_string(self).map_err(|e| {
                Error::Config(format!("Failed to serialize config to YAML: {}", e))
            })?
        } else {
            serde_json::to_string_pretty(self).map_err(|e| {
                Error::Config(format!("Failed to serialize config to JSON: {}", e))
            })?
        };

        if let Some(parent) = path_ref.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }

        std::fs::write(path_ref, content).map_err(|e| {
            Error::Config(format!("Failed to write config file: {}", e))
        })?;

        Ok(())
    }

    /// Validate the configuration
    pub fn validate(&self) -> Result<()> {
        required_key_length(&self.default_scheme).map_err(|_| {
            Error::InvalidConfig(format!("Unknown default_scheme '{}'", self.default_scheme))
        })?;

        if let Some(salt) = &self.salt {
            if salt.is_empty() {
                return Err(Error::InvalidConfig("salt must not be empty".to_string()));
            }
        }

        if self.stream && self.default_scheme != SCHEME_CBC {
            return Err(Error::InvalidConfig(format!(
                "stream mode requires the cbc scheme, not {}",
                self.default_scheme
            )));
        }

        if let Some(task) = &self.task {
            if task.inputs.is_empty() {
                return Err(Error::InvalidConfig(
                    "task.inputs must list at least one input".to_string(),
                ));
            }
            if task.inputs.len() > 1 && task.input_type == InputType::File {
                if let Some(output) = &task.output {
                    if output.is_file() {
                        return Err(Error::InvalidConfig(format!(
                            "task.output {:?} is a file but several inputs are listed",
                            output
                        )));
                    }
                }
            }
        }

        Ok(())
    }
}

/// `~/.config/crypto-cli/config.yaml`, if a home directory is known
pub fn default_config_path() -> Option<PathBuf> {
    let home = dirs::home_dir()?;
    Some(home.join(".config").join("crypto-cli").join("config.yaml"))
}

/// Expand a leading `~` to the home directory
pub fn expand_tilde(path: &Path) -> PathBuf {
    match path.strip_prefix("~") {
        Ok(rest) => match dirs::home_dir() {
            Some(home) => home.join(rest),
            None => path.to_path_buf(),
        },
        Err(_) => path.to_path_buf(),
    }
}

/// Hex serialization for an optional salt
mod hex_serde {
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S>(bytes: &Option<Vec<u8>>, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        match bytes {
            Some(bytes) => serializer.serialize_str(&hex::encode(bytes)),
            None => serializer.serialize_none(),
        }
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Option<Vec<u8>>, D::Error>
    where
        D: Deserializer<'de>,
    {
        let s = Option::<String>::deserialize(deserializer)?;
        match s.as_deref().map(str::trim) {
            None | Some("") => Ok(None),
            Some(s) => hex::decode(s).map(Some).map_err(serde::de::Error::custom),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_defaults() {
        let config = Config::default();
        assert_eq!(config.default_scheme, "cbc");
        assert!(config.checksums);
        assert!(!config.metadata);
        assert!(!config.concurrent);
        assert_eq!(config.logging.level, "info");
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_load_yaml_task() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("config.yaml");
        std::fs::write(
            &path,
            r#"
default_scheme: gcm
concurrent: true
salt: "00112233445566778899aabbccddeeff"
task:
  mode: encrypt
  input_type: file
  inputs: [a.txt, b.txt]
"#,
        )
        .unwrap();

        let config = Config::load(&path).unwrap();
        assert_eq!(config.default_scheme, "gcm");
        assert!(config.concurrent);
        assert!(config.checksums);
        assert_eq!(config.salt.as_ref().unwrap().len(), 16);

        let task = config.task.unwrap();
        assert_eq!(task.mode, Operation::Encrypt);
        assert_eq!(task.input_type, InputType::File);
        assert_eq!(task.inputs, vec!["a.txt", "b.txt"]);
    }

    #[test]
    fn test_load_json() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("config.json");
        std::fs::write(&path, r#"{"default_scheme": "chacha", "metadata": true}"#).unwrap();

        let config = Config::load(&path).unwrap();
        assert_eq!(config.default_scheme, "chacha");
        assert!(config.metadata);
    }

    #[test]
    fn test_env_substitution() {
        std::env::set_var("CRYPTO_CLI_TEST_SUBST_PW", "s3cret");
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("config.yml");
        std::fs::write(
            &path,
            "default_password: \"${CRYPTO_CLI_TEST_SUBST_PW}\"\nsalt: \"${CRYPTO_CLI_TEST_UNSET_VAR}\"\n",
        )
        .unwrap();

        // the unset variable is left alone, which is not valid hex
        assert!(Config::load(&path).is_err());

        std::fs::write(&path, "default_password: \"${CRYPTO_CLI_TEST_SUBST_PW}\"\n").unwrap();
        let config = Config::load(&path).unwrap();
        assert_eq!(config.default_password.as_deref(), Some("s3cret"));
        std::env::remove_var("CRYPTO_CLI_TEST_SUBST_PW");
    }

    #[test]
    fn test_env_overrides() {
        std::env::set_var("CRYPTO_CLI_SCHEME", "ChaCha");
        std::env::set_var("CRYPTO_CLI_LOG_LEVEL", "debug");
        let mut config = Config::default();
        config.apply_env_overrides();
        std::env::remove_var("CRYPTO_CLI_SCHEME");
        std::env::remove_var("CRYPTO_CLI_LOG_LEVEL");

        assert_eq!(config.default_scheme, "chacha");
        assert_eq!(config.logging.level, "debug");
    }

    #[test]
    fn test_validate_rejects() {
        let config = Config {
            default_scheme: "des".to_string(),
            ..Config::default()
        };
        assert!(matches!(config.validate(), Err(Error::InvalidConfig(_))));

        let config = Config {
            default_scheme: "gcm".to_string(),
            stream: true,
            ..Config::default()
        };
        assert!(config.validate().is_err());

        let config = Config {
            task: Some(TaskConfig {
                mode: Operation::Decrypt,
                input_type: InputType::String,
                inputs: vec![],
                output: None,
            }),
            ..Config::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_save_and_reload() {
        let temp_dir = TempDir::new().unwrap();
        let config = Config {
            default_scheme: "gcm".to_string(),
            salt: Some(vec![0xab; 16]),
            ..Config::default()
        };

        for name in ["nested/config.yaml", "config.json"] {
            let path = temp_dir.path().join(name);
            config.save(&path).unwrap();
            assert_eq!(Config::load(&path).unwrap(), config);
        }

        let yaml = std::fs::read_to_string(temp_dir.path().join("nested/config.yaml")).unwrap();
        assert!(yaml.contains(&"ab".repeat(16)));
    }

    #[test]
    fn test_missing_file() {
        let result = Config::load("/nonexistent/crypto-cli.yaml");
        assert!(matches!(result, Err(Error::Config(_))));
    }

    #[test]
    fn test_expand_tilde() {
        assert_eq!(expand_tilde(Path::new("/etc/x")), PathBuf::from("/etc/x"));
        if let Some(home) = dirs::home_dir() {
            assert_eq!(expand_tilde(Path::new("~/a.yaml")), home.join("a.yaml"));
        }
    }

    #[test]
    fn test_input_type_parse() {
        assert_eq!("FILE".parse::<InputType>().unwrap(), InputType::File);
        assert!("socket".parse::<InputType>().is_err());
    }
}
