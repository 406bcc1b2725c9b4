use color_eyre::{eyre::eyre, Result};
use serde::Deserialize;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use crate::catalog::{Catalog, ResourceDescriptor};

const GWAS_BUCKET: &str = "https://ieup4.objectstorage.uk-london-1.oci.customer-oci.com/p/sigwHf-vsYcWCJ5YUAvRCxYKPzHlc4LWNljUJmyzO7beGE9n2ctwzLeCidDDG-Uh/n/ieup4/b/igd/o";

#[derive(Debug, Clone, Deserialize)]
pub struct Config {
  /// Resource loaded when none is named
  pub default_resource: Option<String>,
  /// Location of the durable store (defaults to the user data directory)
  pub store_path: Option<PathBuf>,
  #[serde(default)]
  pub http: HttpConfig,
  pub resources: BTreeMap<String, ResourceDescriptor>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct HttpConfig {
  #[serde(default = "default_user_agent")]
  pub user_agent: String,
  /// Whole-request timeout; unset leaves it to the transport
  pub timeout_secs: Option<u64>,
}

impl Default for HttpConfig {
  fn default() -> Self {
    Self {
      user_agent: default_user_agent(),
      timeout_secs: None,
    }
  }
}

fn default_user_agent() -> String {
  format!("gwasload/{}", env!("CARGO_PKG_VERSION"))
}

impl Default for Config {
  /// The built-in GWAS catalog.
  fn default() -> Self {
    let mut resources = BTreeMap::new();
    resources.insert(
      "gwasinfo".to_string(),
      ResourceDescriptor::new("gwasinfo.json", format!("{}/gwasinfo.json", GWAS_BUCKET)),
    );
    resources.insert(
      "batches".to_string(),
      ResourceDescriptor::new(
        "gwasinfo_batches.json",
        format!("{}/gwasinfo_batches.json", GWAS_BUCKET),
      ),
    );

    Self {
      default_resource: Some("gwasinfo".to_string()),
      store_path: None,
      http: HttpConfig::default(),
      resources,
    }
  }
}

impl Config {
  /// Load configuration from file.
  ///
  /// Search order:
  /// 1. Explicit path if provided
  /// 2. ./gwasload.yaml (current directory)
  /// 3. $XDG_CONFIG_HOME/gwasload/config.yaml
  ///
  /// Falls back to the built-in catalog when no file is found.
  pub fn load(explicit_path: Option<&Path>) -> Result<Self> {
    let path = if let Some(p) = explicit_path {
      if p.exists() {
        Some(p.to_path_buf())
      } else {
        return Err(eyre!("Config file not found: {}", p.display()));
      }
    } else {
      Self::find_config_file()
    };

    match path {
      Some(p) => Self::load_from_path(&p),
      None => Ok(Self::default()),
    }
  }

  fn find_config_file() -> Option<PathBuf> {
    // Check current directory
    let local = PathBuf::from("gwasload.yaml");
    if local.exists() {
      return Some(local);
    }

    // Check XDG config directory
    if let Some(config_dir) = dirs::config_dir() {
      let xdg_path = config_dir.join("gwasload").join("config.yaml");
      if xdg_path.exists() {
        return Some(xdg_path);
      }
    }

    None
  }

  fn load_from_path(path: &Path) -> Result<Self> {
    let contents = std::fs::read_to_string(path)
      .map_err(|e| eyre!("Failed to read config file {}: {}", path.display(), e))?;

    Self::from_yaml(&contents)
      .map_err(|e| eyre!("Invalid config file {}: {}", path.display(), e))
  }

  /// Parse and validate a YAML configuration.
  pub fn from_yaml(contents: &str) -> Result<Self> {
    let config: Config =
      serde_yaml::from_str(contents).map_err(|e| eyre!("Failed to parse config: {}", e))?;
    config.validate()?;
    Ok(config)
  }

  fn validate(&self) -> Result<()> {
    if self.resources.is_empty() {
      return Err(eyre!("At least one resource must be configured"));
    }

    for (name, resource) in &self.resources {
      if resource.key.trim().is_empty() {
        return Err(eyre!("Resource '{}' has an empty key", name));
      }
      url::Url::parse(&resource.url)
        .map_err(|e| eyre!("Resource '{}' has an invalid url '{}': {}", name, resource.url, e))?;
    }

    if let Some(default) = &self.default_resource {
      if !self.resources.contains_key(default) {
        return Err(eyre!("Default resource '{}' is not configured", default));
      }
    }

    Ok(())
  }

  /// The immutable resource catalog this configuration describes.
  pub fn catalog(&self) -> Catalog {
    let catalog = Catalog::new(self.resources.clone());
    match &self.default_resource {
      Some(name) => catalog.with_default(name.clone()),
      None => catalog,
    }
  }
}
