use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use dynaser_dom::Address;
use dynaser_protocol::MountPoint;

use crate::error::{ServerError, ServerResult};

pub const DEFAULT_CONFIG_NAME: &str = "dynaser.config.json";

/// Server configuration file format
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Config {
    #[serde(default = "default_host")]
    pub host: String,

    #[serde(default = "default_port")]
    pub port: u16,

    /// Application served to every session (`counter` or `static`)
    #[serde(default = "default_app")]
    pub app: String,

    /// HTML file for the `static` application
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub document: Option<PathBuf>,

    /// Client wrapper element under `<body>`, e.g. `div:nth-of-type(1)`
    #[serde(default = "default_mount")]
    pub mount: String,

    /// Keep a session's document after its last connection closes.
    /// Off by default: closed sessions are discarded.
    #[serde(default = "default_keep_sessions")]
    pub keep_sessions: bool,
}

fn default_host() -> String {
    "127.0.0.1".to_string()
}

fn default_port() -> u16 {
    3000
}

fn default_app() -> String {
    "counter".to_string()
}

fn default_mount() -> String {
    "div:nth-of-type(1)".to_string()
}

fn default_keep_sessions() -> bool {
    false
}

impl Config {
    /// Load config from a directory, falling back to defaults when absent
    pub fn load(cwd: &Path) -> ServerResult<Self> {
        let config_path = cwd.join(DEFAULT_CONFIG_NAME);
        if config_path.exists() {
            Self::load_file(&config_path)
        } else {
            Ok(Config::default())
        }
    }

    pub fn load_file(path: &Path) -> ServerResult<Self> {
        let content = std::fs::read_to_string(path)?;
        let config: Config = serde_json::from_str(&content)?;
        config.mount_point()?;
        Ok(config)
    }

    pub fn addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    /// The mount segment, which must be a single `tag[:nth-of-type(n)]`
    pub fn mount_point(&self) -> ServerResult<MountPoint> {
        let address: Address = self
            .mount
            .parse()
            .map_err(|e| ServerError::Config(format!("invalid mount '{}': {}", self.mount, e)))?;
        match address.segments.as_slice() {
            [segment] => Ok(MountPoint::new(segment.clone())),
            _ => Err(ServerError::Config(format!(
                "mount '{}' must be a single segment",
                self.mount
            ))),
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            app: default_app(),
            document: None,
            mount: default_mount(),
            keep_sessions: default_keep_sessions(),
        }
    }
}
