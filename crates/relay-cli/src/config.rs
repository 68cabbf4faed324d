//! Configuration file support

use relay_agent::{AssistantSpec, PollConfig};
use relay_ai::{AssistantId, FileId};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

const DEFAULT_DATASET: &str = "dataset.csv";
const DEFAULT_TITLE: &str = "Data Assistant";
const DEFAULT_PLACEHOLDER: &str = "Ask a question about your data...";

/// Configuration for relay
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Model the assistant is created with
    pub model: Option<String>,
    /// OpenAI API key (prefer the environment)
    pub api_key: Option<String>,
    /// Alternative API base URL
    pub base_url: Option<String>,
    /// CSV file uploaded for the code interpreter
    pub dataset: Option<PathBuf>,
    /// Where history, the resource manifest and charts are kept
    pub data_dir: Option<PathBuf>,
    /// Chat title
    pub title: Option<String>,
    /// Input placeholder
    pub placeholder: Option<String>,
    /// Color theme (dark, light)
    pub theme: Option<String>,
    /// Whether to use TUI mode by default
    pub tui: Option<bool>,
    /// Keep only this many messages of history
    pub max_history: Option<usize>,
    /// Save charts produced by the assistant
    pub save_images: Option<bool>,
    pub assistant: AssistantSettings,
    pub poll: PollSettings,
}

/// How the assistant is created on first start
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct AssistantSettings {
    pub name: Option<String>,
    pub description: Option<String>,
    pub instructions: Option<String>,
}

/// Run polling overrides
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct PollSettings {
    pub initial_interval_ms: Option<u64>,
    pub max_interval_ms: Option<u64>,
    pub backoff_multiplier: Option<f64>,
    pub timeout_secs: Option<u64>,
    pub max_transient_errors: Option<u32>,
}

impl PollSettings {
    pub fn to_poll_config(&self) -> PollConfig {
        let defaults = PollConfig::default();
        PollConfig {
            initial_interval: self
                .initial_interval_ms
                .map(Duration::from_millis)
                .unwrap_or(defaults.initial_interval),
            max_interval: self
                .max_interval_ms
                .map(Duration::from_millis)
                .unwrap_or(defaults.max_interval),
            backoff_multiplier: self
                .backoff_multiplier
                .filter(|m| *m >= 1.0)
                .unwrap_or(defaults.backoff_multiplier),
            timeout: self
                .timeout_secs
                .map(Duration::from_secs)
                .unwrap_or(defaults.timeout),
            max_transient_errors: self
                .max_transient_errors
                .unwrap_or(defaults.max_transient_errors),
        }
    }
}

/// Values given on the command line; these win over everything else
#[derive(Debug, Clone, Default)]
pub struct Overrides {
    pub model: Option<String>,
    pub data_dir: Option<PathBuf>,
}

/// Fully resolved settings
#[derive(Debug, Clone)]
pub struct Settings {
    pub api_key: Option<String>,
    pub base_url: Option<String>,
    pub dataset: PathBuf,
    pub data_dir: PathBuf,
    pub title: String,
    pub placeholder: String,
    pub theme: String,
    pub tui: bool,
    pub max_history: Option<usize>,
    pub save_images: bool,
    pub assistant: AssistantSpec,
    pub poll: PollConfig,
    /// Pre-existing file id from the environment
    pub seed_file: Option<FileId>,
    /// Pre-existing assistant id from the environment
    pub seed_assistant: Option<AssistantId>,
}

impl Settings {
    pub fn history_path(&self) -> PathBuf {
        self.data_dir.join("history.jsonl")
    }

    pub fn manifest_path(&self) -> PathBuf {
        self.data_dir.join("resources.toml")
    }

    pub fn image_dir(&self) -> Option<PathBuf> {
        self.save_images.then(|| self.data_dir.join("images"))
    }

    pub fn log_path(&self) -> PathBuf {
        self.data_dir.join("relay.log")
    }
}

impl Config {
    /// Get the config directory
    pub fn config_dir() -> PathBuf {
        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("relay")
    }

    /// Default data directory
    pub fn default_data_dir() -> PathBuf {
        dirs::data_local_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("relay")
    }

    /// Get the config file path, honoring RELAY_CONFIG_PATH
    pub fn config_path() -> PathBuf {
        Self::config_path_with(|key| std::env::var(key).ok())
    }

    fn config_path_with(env: impl Fn(&str) -> Option<String>) -> PathBuf {
        match env("RELAY_CONFIG_PATH") {
            Some(path) if !path.is_empty() => PathBuf::from(path),
            _ => Self::config_dir().join("config.toml"),
        }
    }

    /// Load config from a file; a missing or broken file yields defaults
    pub fn load_from(path: &Path) -> Self {
        if !path.exists() {
            return Self::default();
        }

        match fs::read_to_string(path) {
            Ok(content) => match toml::from_str(&content) {
                Ok(config) => config,
                Err(e) => {
                    eprintln!("Warning: Failed to parse config file: {}", e);
                    Self::default()
                }
            },
            Err(e) => {
                eprintln!("Warning: Failed to read config file: {}", e);
                Self::default()
            }
        }
    }

    /// Write an example config file unless one exists
    pub fn init(path: &Path) -> std::io::Result<PathBuf> {
        if path.exists() {
            return Ok(path.to_path_buf());
        }
        if let Some(dir) = path.parent() {
            fs::create_dir_all(dir)?;
        }
        fs::write(path, example_config())?;
        Ok(path.to_path_buf())
    }

    /// Merge CLI overrides, environment and file values over defaults
    pub fn resolve(&self, cli: &Overrides, env: impl Fn(&str) -> Option<String>) -> Settings {
        let non_empty = |key: &str| env(key).filter(|v| !v.trim().is_empty());

        let defaults = AssistantSpec::default();
        let assistant = AssistantSpec {
            name: self.assistant.name.clone().unwrap_or(defaults.name),
            model: cli
                .model
                .clone()
                .or_else(|| self.model.clone())
                .unwrap_or(defaults.model),
            description: self
                .assistant
                .description
                .clone()
                .unwrap_or(defaults.description),
            instructions: self.assistant.instructions.clone(),
        };

        Settings {
            api_key: non_empty("OPENAI_API_KEY").or_else(|| self.api_key.clone()),
            base_url: non_empty("OPENAI_BASE_URL").or_else(|| self.base_url.clone()),
            dataset: self
                .dataset
                .clone()
                .unwrap_or_else(|| PathBuf::from(DEFAULT_DATASET)),
            data_dir: cli
                .data_dir
                .clone()
                .or_else(|| self.data_dir.clone())
                .unwrap_or_else(Self::default_data_dir),
            title: self.title.clone().unwrap_or_else(|| DEFAULT_TITLE.to_string()),
            placeholder: self
                .placeholder
                .clone()
                .unwrap_or_else(|| DEFAULT_PLACEHOLDER.to_string()),
            theme: self.theme.clone().unwrap_or_else(|| "dark".to_string()),
            tui: self.tui.unwrap_or(true),
            max_history: self.max_history.filter(|n| *n > 0),
            save_images: self.save_images.unwrap_or(true),
            assistant,
            poll: self.poll.to_poll_config(),
            seed_file: non_empty("File_ID").map(FileId::new),
            seed_assistant: non_empty("Assistant_ID").map(AssistantId::new),
        }
    }
}

/// Generate example config content
pub fn example_config() -> &'static str {
    r#"# relay configuration file
# Place at ~/.config/relay/config.toml (Linux), or point RELAY_CONFIG_PATH at it

# Model the assistant is created with
model = "gpt-4o-mini"

# CSV file uploaded for the code interpreter on first start
dataset = "dataset.csv"

# Where history, the resource manifest and saved charts live
# data_dir = "~/.local/share/relay"

title = "Data Assistant"
placeholder = "Ask a question about your data..."
theme = "dark"

# Whether to use TUI mode by default
tui = true

# Keep only the most recent messages (unbounded when unset)
# max_history = 200

# Save charts produced by the code interpreter
save_images = true

# API key (optional - OPENAI_API_KEY takes precedence)
# api_key = "sk-..."

[assistant]
name = "Data Creator"
# description = "..."
# instructions = "..."

[poll]
initial_interval_ms = 1000
max_interval_ms = 8000
backoff_multiplier = 1.5
timeout_secs = 300
max_transient_errors = 3
"#
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn env_of(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn test_defaults() {
        let settings = Config::default().resolve(&Overrides::default(), env_of(&[]));
        assert_eq!(settings.assistant.name, "Data Creator");
        assert_eq!(settings.assistant.model, "gpt-4o-mini");
        assert_eq!(settings.dataset, PathBuf::from(DEFAULT_DATASET));
        assert!(settings.tui);
        assert!(settings.api_key.is_none());
        assert_eq!(settings.poll.timeout, Duration::from_secs(300));
        assert_eq!(settings.history_path(), settings.data_dir.join("history.jsonl"));
    }

    #[test]
    fn test_precedence_cli_env_file() {
        let config = Config {
            model: Some("gpt-4o".into()),
            api_key: Some("sk-file".into()),
            data_dir: Some(PathBuf::from("/from/file")),
            ..Default::default()
        };
        let cli = Overrides {
            model: Some("gpt-4.1".into()),
            data_dir: None,
        };

        let settings = config.resolve(&cli, env_of(&[("OPENAI_API_KEY", "sk-env")]));
        assert_eq!(settings.assistant.model, "gpt-4.1");
        assert_eq!(settings.api_key.as_deref(), Some("sk-env"));
        assert_eq!(settings.data_dir, PathBuf::from("/from/file"));

        let settings = config.resolve(&Overrides::default(), env_of(&[("OPENAI_API_KEY", " ")]));
        assert_eq!(settings.assistant.model, "gpt-4o");
        assert_eq!(settings.api_key.as_deref(), Some("sk-file"));
    }

    #[test]
    fn test_env_seeds_resource_ids() {
        let settings = Config::default().resolve(
            &Overrides::default(),
            env_of(&[("File_ID", "file-abc"), ("Assistant_ID", "asst_abc")]),
        );
        assert_eq!(settings.seed_file, Some(FileId::new("file-abc")));
        assert_eq!(settings.seed_assistant, Some(AssistantId::new("asst_abc")));
    }

    #[test]
    fn test_example_config_parses() {
        let config: Config = toml::from_str(example_config()).unwrap();
        assert_eq!(config.model.as_deref(), Some("gpt-4o-mini"));
        assert_eq!(config.poll.timeout_secs, Some(300));
        let poll = config.poll.to_poll_config();
        assert_eq!(poll.max_interval, Duration::from_secs(8));
    }

    #[test]
    fn test_load_from_invalid_file_uses_defaults() {
        let dir = tempfile::TempDir::new().unwrap();
        let path = dir.path().join("config.toml");
        fs::write(&path, "model = [").unwrap();
        let config = Config::load_from(&path);
        assert!(config.model.is_none());
    }

    #[test]
    fn test_init_writes_example_once() {
        let dir = tempfile::TempDir::new().unwrap();
        let path = dir.path().join("relay").join("config.toml");
        Config::init(&path).unwrap();
        fs::write(&path, "title = \"mine\"").unwrap();
        Config::init(&path).unwrap();
        assert_eq!(Config::load_from(&path).title.as_deref(), Some("mine"));
    }

    #[test]
    fn test_config_path_env_override() {
        let path = Config::config_path_with(env_of(&[("RELAY_CONFIG_PATH", "/tmp/relay.toml")]));
        assert_eq!(path, PathBuf::from("/tmp/relay.toml"));
        let path = Config::config_path_with(env_of(&[]));
        assert!(path.ends_with("relay/config.toml"));
    }
}
