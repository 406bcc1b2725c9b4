//! Command handlers for the `gwasload` binary.

use color_eyre::{eyre::eyre, Result};
use indicatif::{ProgressBar, ProgressStyle};
use serde_json::Value;
use std::io::Write;
use std::path::Path;
use tracing::info;

use crate::cache::{Loader, SqliteStore, StoredRecord};
use crate::catalog::Catalog;
use crate::config::Config;
use crate::fetch::HttpTransport;

/// Loader wired to the real store and network.
pub type AppLoader = Loader<SqliteStore, HttpTransport>;

/// Build a loader from configuration, opening the durable store once.
pub fn open_loader(config: &Config) -> Result<AppLoader> {
  let store = match &config.store_path {
    Some(path) => SqliteStore::open(path)?,
    None => SqliteStore::open_default()?,
  };
  let transport = HttpTransport::new(&config.http)?;

  Ok(Loader::new(config.catalog(), store, transport))
}

/// Load a resource and write it as pretty JSON to `output` or stdout.
pub async fn load(
  loader: &AppLoader,
  name: Option<&str>,
  output: Option<&Path>,
  show_progress: bool,
) -> Result<()> {
  let label = name.unwrap_or("default");

  let bar = if show_progress {
    download_bar(label)
  } else {
    ProgressBar::hidden()
  };
  let mut on_progress = |percent: u64| bar.set_position(percent.min(100));

  let result = match name {
    Some(name) => loader.load_with_source(name, Some(&mut on_progress)).await,
    None => loader.load_default(Some(&mut on_progress)).await,
  };
  bar.finish_and_clear();
  let loaded = result?;

  info!(resource = label, source = %loaded.source, "Loaded resource");
  write_json(&loaded.data, output)
}

fn download_bar(name: &str) -> ProgressBar {
  let bar = ProgressBar::new(100);
  bar.set_style(
    ProgressStyle::with_template("{msg} [{bar:40.cyan/blue}] {pos:>3}%")
      .unwrap_or_else(|_| ProgressStyle::default_bar())
      .progress_chars("=> "),
  );
  bar.set_message(name.to_string());
  bar
}

fn write_json(data: &Value, output: Option<&Path>) -> Result<()> {
  let text = serde_json::to_string_pretty(data)?;
  match output {
    Some(path) => std::fs::write(path, text + "\n")
      .map_err(|e| eyre!("Failed to write {}: {}", path.display(), e))?,
    None => {
      let mut stdout = std::io::stdout().lock();
      writeln!(stdout, "{}", text)?;
    }
  }
  Ok(())
}

/// Print configured resources.
pub fn list(catalog: &Catalog) {
  print!("{}", format_catalog(catalog));
}

/// Render the catalog as an aligned table.
pub fn format_catalog(catalog: &Catalog) -> String {
  let default = catalog.default_name();
  let width = catalog
    .iter()
    .map(|(name, _)| name.len())
    .max()
    .unwrap_or(0)
    .max("NAME".len());

  let mut out = format!("  {:<width$}  {:<24}  URL\n", "NAME", "KEY", width = width);
  for (name, resource) in catalog.iter() {
    let marker = if Some(name) == default { '*' } else { ' ' };
    out.push_str(&format!(
      "{} {:<width$}  {:<24}  {}\n",
      marker,
      name,
      resource.key,
      resource.url,
      width = width
    ));
  }
  out
}

/// Print what is cached for a resource, without touching the network.
pub async fn show(loader: &AppLoader, name: Option<&str>) -> Result<()> {
  let name = match name {
    Some(name) => name,
    None => loader.default_name()?,
  };
  let stored = loader.cached(name).await?;
  print!("{}", format_cached(name, stored.as_ref()));
  Ok(())
}

/// Describe a stored record.
pub fn format_cached(name: &str, stored: Option<&StoredRecord>) -> String {
  match stored {
    Some(stored) => format!(
      "{}: cached at {}\n  validator: {}\n",
      name,
      stored.cached_at.format("%Y-%m-%d %H:%M:%S UTC"),
      stored.record.validator.as_deref().unwrap_or("(none)")
    ),
    None => format!("{}: not cached\n", name),
  }
}
