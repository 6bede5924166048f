use anyhow::{Context, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};

#[derive(Debug, Deserialize, Clone)]
pub struct Config {
    pub db: DbConfig,
    pub server: ServerConfig,
    #[serde(default)]
    pub import: ImportConfig,
    #[serde(default)]
    pub completion: CompletionConfig,
}

#[derive(Debug, Deserialize, Clone)]
pub struct DbConfig {
    pub path: PathBuf,
}

#[derive(Debug, Deserialize, Clone)]
pub struct ServerConfig {
    pub bind: String,
}

#[derive(Debug, Deserialize, Clone)]
pub struct ImportConfig {
    #[serde(default = "default_delimiter")]
    pub delimiter: char,
    /// Records per INSERT statement; bounded by the store's payload limits.
    #[serde(default = "default_batch_size")]
    pub batch_size: usize,
}

impl Default for ImportConfig {
    fn default() -> Self {
        Self {
            delimiter: default_delimiter(),
            batch_size: default_batch_size(),
        }
    }
}

fn default_delimiter() -> char {
    ','
}
fn default_batch_size() -> usize {
    500
}

#[derive(Debug, Deserialize, Clone)]
pub struct CompletionConfig {
    /// Chat-completions endpoint (OpenAI wire format).
    #[serde(default = "default_endpoint")]
    pub endpoint: String,
    #[serde(default = "default_model")]
    pub model: String,
    #[serde(default = "default_temperature")]
    pub temperature: f64,
    #[serde(default = "default_max_tokens")]
    pub max_tokens: u32,
    /// Name of the environment variable holding the bearer credential.
    #[serde(default = "default_api_key_env")]
    pub api_key_env: String,
}

impl Default for CompletionConfig {
    fn default() -> Self {
        Self {
            endpoint: default_endpoint(),
            model: default_model(),
            temperature: default_temperature(),
            max_tokens: default_max_tokens(),
            api_key_env: default_api_key_env(),
        }
    }
}

fn default_endpoint() -> String {
    "https://api.openai.com/v1/chat/completions".to_string()
}
fn default_model() -> String {
    "gpt-4o-mini".to_string()
}
fn default_temperature() -> f64 {
    0.7
}
fn default_max_tokens() -> u32 {
    2000
}
fn default_api_key_env() -> String {
    "OPENAI_API_KEY".to_string()
}

pub fn load_config(path: &Path) -> Result<Config> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read config file: {}", path.display()))?;

    let config: Config = toml::from_str(&content).with_context(|| "Failed to parse config file")?;

    // Validate import
    if config.import.batch_size == 0 {
        anyhow::bail!("import.batch_size must be > 0");
    }

    // Validate completion
    if config.completion.endpoint.is_empty() {
        anyhow::bail!("completion.endpoint must not be empty");
    }
    if config.completion.model.is_empty() {
        anyhow::bail!("completion.model must not be empty");
    }
    if config.completion.api_key_env.is_empty() {
        anyhow::bail!("completion.api_key_env must not be empty");
    }
    if !(0.0..=2.0).contains(&config.completion.temperature) {
        anyhow::bail!("completion.temperature must be in [0.0, 2.0]");
    }
    if config.completion.max_tokens == 0 {
        anyhow::bail!("completion.max_tokens must be > 0");
    }

    Ok(config)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn write_config(content: &str) -> (tempfile::TempDir, PathBuf) {
        let tmp = tempfile::TempDir::new().unwrap();
        let path = tmp.path().join("tecnobot.toml");
        std::fs::write(&path, content).unwrap();
        (tmp, path)
    }

    #[test]
    fn test_minimal_config_gets_defaults() {
        let (_tmp, path) = write_config(
            r#"
[db]
path = "data/vendas.sqlite"

[server]
bind = "127.0.0.1:8787"
"#,
        );
        let cfg = load_config(&path).unwrap();
        assert_eq!(cfg.import.delimiter, ',');
        assert_eq!(cfg.import.batch_size, 500);
        assert_eq!(cfg.completion.temperature, 0.7);
        assert_eq!(cfg.completion.max_tokens, 2000);
        assert_eq!(cfg.completion.api_key_env, "OPENAI_API_KEY");
    }

    #[test]
    fn test_zero_batch_size_rejected() {
        let (_tmp, path) = write_config(
            r#"
[db]
path = "data/vendas.sqlite"

[server]
bind = "127.0.0.1:8787"

[import]
batch_size = 0
"#,
        );
        assert!(load_config(&path).is_err());
    }

    #[test]
    fn test_out_of_range_temperature_rejected() {
        let (_tmp, path) = write_config(
            r#"
[db]
path = "data/vendas.sqlite"

[server]
bind = "127.0.0.1:8787"

[completion]
temperature = 3.5
"#,
        );
        assert!(load_config(&path).is_err());
    }
}
