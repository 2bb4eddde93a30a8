use std::fs;
use std::path::PathBuf;
use std::time::Duration;

use camino::Utf8PathBuf;
use serde::{Deserialize, Serialize};
use url::Url;

use crate::domain::GroupCode;
use crate::error::GrabError;

pub const DEFAULT_ROOT_URL: &str = "https://archive.physionet.org/challenge/2009/training-set.shtml";
pub const DEFAULT_SAMPLES_DIR: &str = "samples";
pub const DEFAULT_RECORD_COLUMN: &str = "Numerics record";
pub const DEFAULT_TIMEOUT_SECS: u64 = 60;
pub const DEFAULT_MAX_RETRIES: usize = 3;

#[derive(Debug, Default, Deserialize, Serialize)]
pub struct Config {
    #[serde(default)]
    pub root_url: Option<String>,
    #[serde(default)]
    pub samples_dir: Option<String>,
    #[serde(default)]
    pub record_column: Option<String>,
    #[serde(default)]
    pub groups: Option<GroupSelection>,
    #[serde(default)]
    pub timeout_secs: Option<u64>,
    #[serde(default)]
    pub max_retries: Option<usize>,
}

/// Group selection surface: either the first N groups in listing order,
/// or an explicit set of group codes.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum GroupSelection {
    Max(usize),
    Include(Vec<String>),
}

#[derive(Debug, Clone)]
pub enum GroupFilter {
    Max(usize),
    Include(Vec<GroupCode>),
}

#[derive(Debug, Clone)]
pub struct ResolvedConfig {
    pub root_url: Url,
    pub samples_dir: Utf8PathBuf,
    pub record_column: String,
    pub groups: GroupFilter,
    pub timeout: Duration,
    pub max_retries: usize,
}

pub struct ConfigLoader;

impl ConfigLoader {
    /// Loads `physiograb.json` from the working directory, or the explicit
    /// path when given. A missing default file resolves to the built-in
    /// defaults; an explicit path must exist.
    pub fn resolve(path: Option<&str>) -> Result<ResolvedConfig, GrabError> {
        let config_path = match path {
            Some(path) => PathBuf::from(path),
            None => PathBuf::from("physiograb.json"),
        };

        if path.is_none() && !config_path.exists() {
            return Self::resolve_config(Config::default());
        }

        let content = fs::read_to_string(&config_path)
            .map_err(|_| GrabError::ConfigRead(config_path.clone()))?;
        let config: Config = serde_json::from_str(&content)
            .map_err(|err| GrabError::ConfigParse(err.to_string()))?;

        Self::resolve_config(config)
    }

    pub fn resolve_config(config: Config) -> Result<ResolvedConfig, GrabError> {
        let root_url = config
            .root_url
            .unwrap_or_else(|| DEFAULT_ROOT_URL.to_string());
        let root_url = Url::parse(&root_url).map_err(|err| {
            GrabError::InvalidUrl(format!("root_url {root_url}: {err}"))
        })?;

        let groups = match config.groups {
            None => GroupFilter::Max(1),
            Some(GroupSelection::Max(count)) => GroupFilter::Max(count),
            Some(GroupSelection::Include(codes)) => {
                let codes = codes
                    .iter()
                    .map(|code| code.parse())
                    .collect::<Result<Vec<GroupCode>, GrabError>>()?;
                GroupFilter::Include(codes)
            }
        };

        Ok(ResolvedConfig {
            root_url,
            samples_dir: Utf8PathBuf::from(
                config
                    .samples_dir
                    .unwrap_or_else(|| DEFAULT_SAMPLES_DIR.to_string()),
            ),
            record_column: config
                .record_column
                .unwrap_or_else(|| DEFAULT_RECORD_COLUMN.to_string()),
            groups,
            timeout: Duration::from_secs(config.timeout_secs.unwrap_or(DEFAULT_TIMEOUT_SECS)),
            max_retries: config.max_retries.unwrap_or(DEFAULT_MAX_RETRIES),
        })
    }
}

#[cfg(test)]
mod tests {
    use assert_matches::assert_matches;

    use super::*;

    #[test]
    fn resolve_defaults() {
        let resolved = ConfigLoader::resolve_config(Config::default()).unwrap();
        assert_eq!(resolved.root_url.as_str(), DEFAULT_ROOT_URL);
        assert_eq!(resolved.samples_dir, Utf8PathBuf::from("samples"));
        assert_eq!(resolved.record_column, "Numerics record");
        assert_matches!(resolved.groups, GroupFilter::Max(1));
        assert_eq!(resolved.timeout, Duration::from_secs(60));
        assert_eq!(resolved.max_retries, 3);
    }

    #[test]
    fn parse_group_selection_shapes() {
        let config: Config = serde_json::from_str(r#"{"groups": {"max": 3}}"#).unwrap();
        let resolved = ConfigLoader::resolve_config(config).unwrap();
        assert_matches!(resolved.groups, GroupFilter::Max(3));

        let config: Config =
            serde_json::from_str(r#"{"groups": {"include": ["H1", "C2"]}}"#).unwrap();
        let resolved = ConfigLoader::resolve_config(config).unwrap();
        match resolved.groups {
            GroupFilter::Include(codes) => {
                assert_eq!(codes.len(), 2);
                assert_eq!(codes[0].as_str(), "H1");
            }
            other => panic!("expected include filter, got {other:?}"),
        }
    }

    #[test]
    fn reject_invalid_include_code() {
        let config: Config =
            serde_json::from_str(r#"{"groups": {"include": ["toolong"]}}"#).unwrap();
        let err = ConfigLoader::resolve_config(config).unwrap_err();
        assert_matches!(err, GrabError::InvalidGroupCode(_));
    }

    #[test]
    fn reject_malformed_root_url() {
        let config = Config {
            root_url: Some("not a url".to_string()),
            ..Config::default()
        };
        let err = ConfigLoader::resolve_config(config).unwrap_err();
        assert_matches!(err, GrabError::InvalidUrl(_));
    }
}
