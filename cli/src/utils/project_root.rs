use anyhow::{anyhow, Result};
use broker::config::DEFAULT_CONFIG_PATH;
use std::env;
use std::path::{Path, PathBuf};

/// Find the broker deployment directory by looking for its configuration file
pub fn find_project_root() -> Result<PathBuf> {
    let current_dir = env::current_dir()?;

    for candidate in current_dir.ancestors() {
        if is_project_root(candidate) {
            return Ok(candidate.to_path_buf());
        }
    }

    Err(anyhow!(
        "Not in a broker deployment directory. Run brokerctl where {} exists,\n\
         or point BROKER_CONFIG at the configuration file.",
        DEFAULT_CONFIG_PATH
    ))
}

/// A deployment directory holds `config/broker.yaml`
fn is_project_root(path: &Path) -> bool {
    path.join(DEFAULT_CONFIG_PATH).is_file()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    #[test]
    fn test_is_project_root_valid() {
        let temp_dir = TempDir::new().unwrap();
        let root = temp_dir.path();

        fs::create_dir(root.join("config")).unwrap();
        fs::write(root.join("config").join("broker.yaml"), "{}").unwrap();

        assert!(is_project_root(root));
    }

    #[test]
    fn test_is_project_root_missing_config() {
        let temp_dir = TempDir::new().unwrap();
        let root = temp_dir.path();

        fs::create_dir(root.join("config")).unwrap();

        assert!(!is_project_root(root));
    }

    #[test]
    fn test_config_directory_is_not_a_file() {
        let temp_dir = TempDir::new().unwrap();
        let root = temp_dir.path();

        fs::create_dir_all(root.join("config").join("broker.yaml")).unwrap();

        assert!(!is_project_root(root));
    }
}
