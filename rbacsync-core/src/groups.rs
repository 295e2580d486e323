//! Static group membership file.
//!
//! ```yaml
//! eng@example.com:
//!   - alice@example.com
//!   - bob@example.com
//! platform@example.com:
//!   - eng@example.com      # nested group
//!   - carol@example.com
//! ```
//!
//! A member that is itself a key of the map is treated as a nested group.

use std::collections::BTreeMap;
use std::path::Path;

use crate::error::ConfigError;
use crate::types::GroupId;

pub type StaticGroups = BTreeMap<GroupId, Vec<String>>;

/// Load a static group file. Returns `ConfigError::Parse` with the path on
/// malformed YAML.
pub fn load_static_groups(path: &Path) -> Result<StaticGroups, ConfigError> {
    let contents = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    let raw: BTreeMap<String, Vec<String>> =
        serde_yaml::from_str(&contents).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })?;
    Ok(raw.into_iter().map(|(k, v)| (GroupId::from(k), v)).collect())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn loads_groups_from_yaml() {
        let dir = TempDir::new().expect("tempdir");
        let path = dir.path().join("groups.yaml");
        std::fs::write(
            &path,
            "eng@example.com:\n  - alice@example.com\n  - bob@example.com\nempty@example.com: []\n",
        )
        .expect("write");

        let groups = load_static_groups(&path).expect("load");
        assert_eq!(groups.len(), 2);
        assert_eq!(
            groups[&GroupId::from("eng@example.com")],
            vec!["alice@example.com", "bob@example.com"]
        );
    }

    #[test]
    fn malformed_yaml_reports_path() {
        let dir = TempDir::new().expect("tempdir");
        let path = dir.path().join("groups.yaml");
        std::fs::write(&path, "eng@example.com: [unterminated\n").expect("write");

        let err = load_static_groups(&path).unwrap_err();
        assert!(matches!(err, ConfigError::Parse { .. }));
        assert!(err.to_string().contains("groups.yaml"));
    }

    #[test]
    fn missing_file_is_io_error() {
        let dir = TempDir::new().expect("tempdir");
        let err = load_static_groups(&dir.path().join("absent.yaml")).unwrap_err();
        assert!(matches!(err, ConfigError::Io { .. }));
    }
}
