use std::path::PathBuf;
use std::sync::Arc;

use arc_swap::ArcSwap;
use figment::{
    Figment,
    providers::{Env, Format, Json, Serialized},
};
use serde::{Deserialize, Serialize};
use snafu::{ResultExt, Snafu};

pub const CONFIG_DIRECTORY_NAME: &str = "parlor";
pub const CONFIG_FILE_NAME: &str = "config.json";
const ENV_PREFIX: &str = "PARLOR_";

const DEFAULT_AUTH_URL: &str = "http://localhost:1337/v1/auth";
const DEFAULT_GRAPHQL_URL: &str = "http://localhost:8080/v1/graphql";
const DEFAULT_GRAPHQL_WS_URL: &str = "ws://localhost:8080/v1/graphql";
const DEFAULT_BOT_WEBHOOK_URL: &str = "http://localhost:5678/webhook/chat-bot";

/// Backend endpoints the app talks to.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AppConfig {
    #[serde(default = "default_auth_url")]
    pub auth_url: String,
    #[serde(default = "default_graphql_url")]
    pub graphql_url: String,
    #[serde(default = "default_graphql_ws_url")]
    pub graphql_ws_url: String,
    #[serde(default = "default_bot_webhook_url")]
    pub bot_webhook_url: String,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            auth_url: default_auth_url(),
            graphql_url: default_graphql_url(),
            graphql_ws_url: default_graphql_ws_url(),
            bot_webhook_url: default_bot_webhook_url(),
        }
    }
}

impl AppConfig {
    pub fn normalized(mut self) -> Self {
        self.auth_url = normalize_url(self.auth_url, default_auth_url);
        self.graphql_url = normalize_url(self.graphql_url, default_graphql_url);
        self.graphql_ws_url = normalize_url(self.graphql_ws_url, default_graphql_ws_url);
        self.bot_webhook_url = normalize_url(self.bot_webhook_url, default_bot_webhook_url);
        self
    }
}

fn normalize_url(raw: String, fallback: fn() -> String) -> String {
    let trimmed = raw.trim().trim_end_matches('/');
    if trimmed.is_empty() {
        fallback()
    } else {
        trimmed.to_string()
    }
}

pub struct ConfigStore {
    config: Arc<ArcSwap<AppConfig>>,
    config_path: PathBuf,
}

impl ConfigStore {
    pub fn default_config_dir() -> PathBuf {
        dirs::config_dir()
            .map(|path| path.join(CONFIG_DIRECTORY_NAME))
            .unwrap_or_else(|| PathBuf::from(".parlor"))
    }

    pub fn default_config_path() -> PathBuf {
        Self::default_config_dir().join(CONFIG_FILE_NAME)
    }

    pub fn new(config_path: PathBuf) -> Self {
        let (config, file_present) = Self::load_from_disk(&config_path);
        let store = Self {
            config: Arc::new(ArcSwap::from_pointee(config)),
            config_path,
        };

        // Write the defaults on first run so users have a file to edit.
        if !file_present
            && let Err(error) = store.persist(&store.config())
        {
            tracing::warn!("failed to write initial config: {error}");
        }

        store
    }

    pub fn load() -> Self {
        Self::new(Self::default_config_path())
    }

    pub fn config(&self) -> Arc<AppConfig> {
        self.config.load_full()
    }

    fn load_from_disk(path: &PathBuf) -> (AppConfig, bool) {
        let file_present = path.exists();
        let figment = Figment::from(Serialized::defaults(AppConfig::default()))
            .merge(Json::file(path))
            .merge(Env::prefixed(ENV_PREFIX));

        match figment.extract::<AppConfig>() {
            Ok(config) => (config.normalized(), file_present),
            Err(error) => {
                tracing::warn!(
                    "failed to parse config from {:?}: {}. using defaults",
                    path,
                    error
                );
                (AppConfig::default(), file_present)
            }
        }
    }

    fn persist(&self, config: &AppConfig) -> Result<(), ConfigError> {
        if let Some(parent) = self.config_path.parent() {
            std::fs::create_dir_all(parent).context(CreateDirSnafu {
                stage: "create-config-directory",
                path: parent.to_path_buf(),
            })?;
        }

        let content = serde_json::to_string_pretty(config).context(SerializeConfigSnafu {
            stage: "serialize-config-json",
        })?;

        let temp_path = self.config_path.with_extension("json.tmp");
        std::fs::write(&temp_path, content).context(WriteFileSnafu {
            stage: "write-temporary-config-file",
            path: temp_path.clone(),
        })?;

        std::fs::rename(&temp_path, &self.config_path).context(RenameTempFileSnafu {
            stage: "rename-temporary-config-file",
            from: temp_path,
            to: self.config_path.clone(),
        })?;

        tracing::info!("saved config to {:?}", self.config_path);
        Ok(())
    }
}

#[derive(Debug, Snafu)]
#[snafu(visibility(pub(crate)))]
pub enum ConfigError {
    #[snafu(display("failed to create config directory at {path:?} on `{stage}`: {source}"))]
    CreateDir {
        stage: &'static str,
        path: PathBuf,
        source: std::io::Error,
    },
    #[snafu(display("failed to serialize config on `{stage}`: {source}"))]
    SerializeConfig {
        stage: &'static str,
        source: serde_json::Error,
    },
    #[snafu(display("failed to write config file at {path:?} on `{stage}`: {source}"))]
    WriteFile {
        stage: &'static str,
        path: PathBuf,
        source: std::io::Error,
    },
    #[snafu(display("failed to replace config file from {from:?} to {to:?} on `{stage}`: {source}"))]
    RenameTempFile {
        stage: &'static str,
        from: PathBuf,
        to: PathBuf,
        source: std::io::Error,
    },
}

fn default_auth_url() -> String {
    DEFAULT_AUTH_URL.to_string()
}

fn default_graphql_url() -> String {
    DEFAULT_GRAPHQL_URL.to_string()
}

fn default_graphql_ws_url() -> String {
    DEFAULT_GRAPHQL_WS_URL.to_string()
}

fn default_bot_webhook_url() -> String {
    DEFAULT_BOT_WEBHOOK_URL.to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn normalized_replaces_blank_urls_with_defaults() {
        let config = AppConfig {
            auth_url: "   ".to_string(),
            graphql_url: "https://gw.example.test/v1/graphql/".to_string(),
            graphql_ws_url: String::new(),
            bot_webhook_url: "https://bot.example.test/hook".to_string(),
        }
        .normalized();

        assert_eq!(config.auth_url, DEFAULT_AUTH_URL);
        assert_eq!(config.graphql_url, "https://gw.example.test/v1/graphql");
        assert_eq!(config.graphql_ws_url, DEFAULT_GRAPHQL_WS_URL);
        assert_eq!(config.bot_webhook_url, "https://bot.example.test/hook");
    }

    #[test]
    fn partial_config_file_keeps_defaults_for_missing_fields() {
        let raw = r#"{ "graphql_url": "https://gw.example.test/v1/graphql" }"#;
        let config: AppConfig = serde_json::from_str(raw).unwrap();

        assert_eq!(config.graphql_url, "https://gw.example.test/v1/graphql");
        assert_eq!(config.auth_url, DEFAULT_AUTH_URL);
        assert_eq!(config.bot_webhook_url, DEFAULT_BOT_WEBHOOK_URL);
    }
}
