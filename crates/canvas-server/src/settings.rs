//! Runtime configuration, deserialised from `config.toml` and `CANVAS_*`
//! environment variables.

use std::path::{Path, PathBuf};

use canvas_store_sqlite::{DefaultAdmin, StoreOptions};
use serde::Deserialize;

#[derive(Debug, Clone, Deserialize)]
pub struct ServerConfig {
  #[serde(default = "default_host")]
  pub host:           String,
  #[serde(default = "default_port")]
  pub port:           u16,
  #[serde(default = "default_store_path")]
  pub store_path:     PathBuf,
  #[serde(default)]
  pub migrations_dir: Option<PathBuf>,
  #[serde(default)]
  pub admin:          AdminConfig,
}

/// The account seeded on first boot when no admin exists.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct AdminConfig {
  pub id:       String,
  pub username: String,
  pub email:    String,
}

impl Default for AdminConfig {
  fn default() -> Self {
    let admin = DefaultAdmin::default();
    Self { id: admin.id, username: admin.username, email: admin.email }
  }
}

fn default_host() -> String { "127.0.0.1".to_owned() }

fn default_port() -> u16 { 8787 }

fn default_store_path() -> PathBuf { PathBuf::from("canvas.db") }

impl ServerConfig {
  /// Layer the optional TOML file under `CANVAS_*` environment variables.
  pub fn load(path: &Path) -> Result<Self, config::ConfigError> {
    config::Config::builder()
      .add_source(config::File::from(path).required(false))
      .add_source(config::Environment::with_prefix("CANVAS"))
      .build()?
      .try_deserialize()
  }

  pub fn address(&self) -> String { format!("{}:{}", self.host, self.port) }

  pub fn store_options(&self) -> StoreOptions {
    StoreOptions {
      migrations_dir: self.migrations_dir.as_deref().map(expand_tilde),
      default_admin:  Some(DefaultAdmin {
        id:       self.admin.id.clone(),
        username: self.admin.username.clone(),
        email:    self.admin.email.clone(),
      }),
    }
  }
}

/// Expand a leading `~` to the user's home directory.
pub fn expand_tilde(path: &Path) -> PathBuf {
  let s = path.to_string_lossy();
  if let Some(rest) = s.strip_prefix("~/")
    && let Ok(home) = std::env::var("HOME")
  {
    return PathBuf::from(home).join(rest);
  }
  path.to_path_buf()
}
