use directories::ProjectDirs;
use std::path::PathBuf;

/// Centralized application directory resolution
pub struct AppDirs;

impl AppDirs {
    pub fn history_db_path() -> Option<PathBuf> {
        if let Ok(home) = std::env::var("HOME") {
            let state_dir = PathBuf::from(home)
                .join(".local")
                .join("state")
                .join("fingertrace");
            Some(state_dir.join("history.db"))
        } else {
            ProjectDirs::from("", "", "fingertrace")
                .map(|proj_dirs| proj_dirs.data_local_dir().join("history.db"))
        }
    }

    pub fn config_path() -> PathBuf {
        ProjectDirs::from("", "", "fingertrace")
            .map(|pd| pd.config_dir().join("config.json"))
            .unwrap_or_else(|| PathBuf::from("fingertrace_config.json"))
    }

    /// Default directory for exports of a session started at `stamp`
    pub fn export_dir(stamp: &str) -> PathBuf {
        ProjectDirs::from("", "", "fingertrace")
            .map(|pd| pd.data_dir().join("sessions").join(stamp))
            .unwrap_or_else(|| PathBuf::from("fingertrace_sessions").join(stamp))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn export_dir_ends_with_stamp() {
        let dir = AppDirs::export_dir("20260101T090000");
        assert!(dir.ends_with("20260101T090000"));
    }

    #[test]
    fn config_path_is_json() {
        assert_eq!(
            AppDirs::config_path().extension().and_then(|e| e.to_str()),
            Some("json")
        );
    }
}
