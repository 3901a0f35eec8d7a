//! Configuration file loading

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use config::{Config, Environment, File};
use mailsync_core::Settings;
use tracing::info;

const EXTENSIONS: [&str; 3] = ["yaml", "yml", "toml"];

/// Load settings from `explicit`, or from the first default location that
/// exists. `MAILSYNC__SECTION__KEY` variables override file values.
pub fn load(explicit: Option<&Path>) -> Result<Settings> {
    let path = match explicit {
        Some(path) => path.to_path_buf(),
        None => candidates()
            .into_iter()
            .find(|path| path.is_file())
            .context("no configuration file found, pass --config or set MAILSYNC_CONFIG")?,
    };

    info!(path = %path.display(), "Loading configuration");
    read(&path)
}

fn read(path: &Path) -> Result<Settings> {
    Config::builder()
        .add_source(File::from(path))
        .add_source(
            Environment::with_prefix("MAILSYNC")
                .prefix_separator("__")
                .separator("__"),
        )
        .build()
        .with_context(|| format!("failed to read {}", path.display()))?
        .try_deserialize()
        .with_context(|| format!("invalid configuration in {}", path.display()))
}

/// Default locations, most specific first
fn candidates() -> Vec<PathBuf> {
    let mut paths = Vec::new();
    if let Some(dir) = dirs::config_dir() {
        let dir = dir.join("mailsync");
        paths.extend(EXTENSIONS.iter().map(|ext| dir.join(format!("config.{}", ext))));
    }
    paths.extend(EXTENSIONS.iter().map(|ext| PathBuf::from(format!("mailsync.{}", ext))));
    paths
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use std::time::Duration;

    fn write_temp(name: &str, contents: &str) -> PathBuf {
        let path = std::env::temp_dir().join(format!("mailsync-{}-{}", std::process::id(), name));
        fs::write(&path, contents).unwrap();
        path
    }

    #[test]
    fn test_candidates_end_with_working_directory() {
        let paths = candidates();
        assert_eq!(
            paths[paths.len() - 3..],
            [
                PathBuf::from("mailsync.yaml"),
                PathBuf::from("mailsync.yml"),
                PathBuf::from("mailsync.toml"),
            ]
        );
    }

    #[test]
    fn test_load_yaml() {
        let path = write_temp(
            "config.yaml",
            r#"
general:
  accounts: [work]
  interval: 120
accounts:
  work:
    remote:
      host: imap.example.com
      username: me@example.com
      password: secret
      keep_alive: 30
    local:
      type: maildir
      folder: /home/me/Mail/work
    max_age: 30
"#,
        );

        let settings = load(Some(&path)).unwrap();
        fs::remove_file(&path).ok();

        assert_eq!(settings.general.accounts, vec!["work"]);
        assert_eq!(settings.general.interval(), Duration::from_secs(120));
        let work = settings.account("work").unwrap();
        assert_eq!(work.remote.port, 993);
        assert_eq!(work.max_age, 30);
        assert_eq!(work.local.kind, "maildir");
    }

    #[test]
    fn test_load_toml() {
        let path = write_temp(
            "config.toml",
            r#"
[general]
accounts = ["home"]

[accounts.home.remote]
host = "mail.example.org"
port = 143
username = "me"
password = "secret"
"#,
        );

        let settings = load(Some(&path)).unwrap();
        fs::remove_file(&path).ok();

        assert_eq!(settings.general.interval, 300);
        assert_eq!(settings.account("home").unwrap().remote.port, 143);
    }

    #[test]
    fn test_capitalized_account_name() {
        let path = write_temp(
            "capitalized.yaml",
            r#"
general:
  accounts: [Work]
accounts:
  Work:
    remote:
      host: imap.example.com
      username: me@example.com
      password: secret
"#,
        );

        let settings = load(Some(&path)).unwrap();
        fs::remove_file(&path).ok();

        assert_eq!(settings.general.accounts, vec!["Work"]);
        let work = settings.account("Work").unwrap();
        assert_eq!(work.remote.host, "imap.example.com");
    }

    #[test]
    fn test_missing_file() {
        let path = std::env::temp_dir().join("mailsync-does-not-exist.yaml");
        assert!(load(Some(&path)).is_err());
    }
}
