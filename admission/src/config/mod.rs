//! YAML configuration: raw file structs and the validated form.

pub mod processed;
pub mod raw;

pub use processed::{process_raw_config, LogFormat, LoggingConfig, SimulationConfig};
pub use raw::ConfigRaw;

use crate::error::{Error, Result};

use std::env;
use std::fs;
use std::path::{Path, PathBuf};

const CONFIG_BASE_NAME: &str = "fibre_admission";
const CONFIG_EXTENSION: &str = "yaml";

/// Looks for `fibre_admission.<env>.yaml`, then `fibre_admission.yaml`, in the
/// current directory. The environment comes from the argument, `FIBRE_ENV`
/// or `APP_ENV`, in that order.
pub fn find_config_file(environment_suffix: Option<&str>) -> Result<PathBuf> {
  find_config_file_in(Path::new("."), environment_suffix)
}

pub(crate) fn find_config_file_in(dir: &Path, environment_suffix: Option<&str>) -> Result<PathBuf> {
  let environment = environment_suffix
    .map(str::to_string)
    .or_else(|| env::var("FIBRE_ENV").ok())
    .or_else(|| env::var("APP_ENV").ok())
    .filter(|env| !env.is_empty());

  let candidates: Vec<PathBuf> = environment
    .iter()
    .map(|env| format!("{CONFIG_BASE_NAME}.{env}.{CONFIG_EXTENSION}"))
    .chain(std::iter::once(format!("{CONFIG_BASE_NAME}.{CONFIG_EXTENSION}")))
    .map(|name| dir.join(name))
    .collect();

  candidates
    .iter()
    .find(|path| path.is_file())
    .cloned()
    .ok_or_else(|| {
      Error::ConfigNotFound(format!(
        "none of {:?} exists; pass --config or set FIBRE_ENV/APP_ENV",
        candidates
      ))
    })
}

/// Parses YAML text into the raw form.
pub fn parse_raw(text: &str) -> Result<ConfigRaw> {
  if text.trim().is_empty() {
    return Ok(ConfigRaw::default());
  }
  serde_yaml::from_str(text).map_err(|e| Error::ConfigParse(e.to_string()))
}

/// Reads a config file into the raw form, leaving validation to the caller so
/// command-line values can be laid over it first.
pub fn load_raw(path: &Path) -> Result<ConfigRaw> {
  tracing::debug!(path = %path.display(), "Reading configuration");
  let text = fs::read_to_string(path).map_err(Error::ConfigRead)?;
  parse_raw(&text)
}

/// Reads and validates a config file.
pub fn load(path: &Path) -> Result<SimulationConfig> {
  process_raw_config(load_raw(path)?)
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn finds_environment_file_first() {
    let dir = tempfile::tempdir().unwrap();
    fs::write(dir.path().join("fibre_admission.yaml"), "").unwrap();
    fs::write(dir.path().join("fibre_admission.bench.yaml"), "").unwrap();

    let found = find_config_file_in(dir.path(), Some("bench")).unwrap();
    assert!(found.ends_with("fibre_admission.bench.yaml"));
    let found = find_config_file_in(dir.path(), Some("missing")).unwrap();
    assert!(found.ends_with("fibre_admission.yaml"));
  }

  #[test]
  fn empty_environment_uses_the_base_file() {
    let dir = tempfile::tempdir().unwrap();
    fs::write(dir.path().join("fibre_admission.yaml"), "").unwrap();
    fs::write(dir.path().join("fibre_admission..yaml"), "").unwrap();

    let found = find_config_file_in(dir.path(), Some("")).unwrap();
    assert!(found.ends_with("fibre_admission.yaml"));
  }

  #[test]
  fn reports_missing_file() {
    let dir = tempfile::tempdir().unwrap();
    let err = find_config_file_in(dir.path(), Some("x")).unwrap_err();
    assert!(matches!(err, Error::ConfigNotFound(_)));
  }
}
