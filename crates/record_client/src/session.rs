//! On-disk session state.
//!
//! Login produces a short-lived store token; keeping it in
//! `~/.config/paygrid/auth.json` lets later invocations reuse the
//! session instead of prompting for credentials every time. The file
//! holds a token, not a password, but it still grants record access,
//! so it is written 0600 on Unix.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

/// A persisted Data API session.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SavedSession {
    /// Session token returned by the store on login
    pub token: String,
    /// Data API base URL for the payables database
    pub base_url: String,
    /// Username, kept only so `login` can report who is signed in
    #[serde(default)]
    pub username: Option<String>,
}

impl SavedSession {
    pub fn new(token: String, base_url: String) -> Self {
        Self {
            token,
            base_url,
            username: None,
        }
    }
}

/// Where the session file lives: `{config_dir}/paygrid/auth.json`.
pub fn session_file_path() -> Option<PathBuf> {
    dirs::config_dir().map(|c| c.join("paygrid").join("auth.json"))
}

/// Load the saved session, if any. A missing, unreadable, or
/// unparseable file all mean "not logged in".
pub fn load_session() -> Option<SavedSession> {
    read_session(&session_file_path()?)
}

/// Persist the session for later invocations.
pub fn save_session(session: &SavedSession) -> Result<(), String> {
    let path = session_file_path().ok_or("Could not determine config directory")?;
    write_session(&path, session)
}

/// Forget the saved session. Already-absent is not an error.
pub fn delete_session() -> Result<(), String> {
    let Some(path) = session_file_path() else {
        return Ok(());
    };
    if path.exists() {
        std::fs::remove_file(&path).map_err(|e| format!("Failed to delete session file: {}", e))?;
    }
    Ok(())
}

fn read_session(path: &Path) -> Option<SavedSession> {
    let contents = std::fs::read_to_string(path).ok()?;
    serde_json::from_str(&contents).ok()
}

fn write_session(path: &Path, session: &SavedSession) -> Result<(), String> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)
            .map_err(|e| format!("Failed to create config directory: {}", e))?;
    }
    let contents = serde_json::to_string_pretty(session)
        .map_err(|e| format!("Failed to serialize session: {}", e))?;
    std::fs::write(path, &contents)
        .map_err(|e| format!("Failed to write session file: {}", e))?;
    restrict_permissions(path)
}

#[cfg(unix)]
fn restrict_permissions(path: &Path) -> Result<(), String> {
    use std::os::unix::fs::PermissionsExt;
    std::fs::set_permissions(path, std::fs::Permissions::from_mode(0o600))
        .map_err(|e| format!("Failed to set file permissions: {}", e))
}

#[cfg(not(unix))]
fn restrict_permissions(_path: &Path) -> Result<(), String> {
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_write_then_read_roundtrip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("auth.json");

        let mut session = SavedSession::new("tok-123".into(), "https://fm.test".into());
        session.username = Some("alice".into());
        write_session(&path, &session).unwrap();

        let loaded = read_session(&path).unwrap();
        assert_eq!(loaded.token, "tok-123");
        assert_eq!(loaded.base_url, "https://fm.test");
        assert_eq!(loaded.username.as_deref(), Some("alice"));
    }

    #[cfg(unix)]
    #[test]
    fn test_session_file_is_owner_only() {
        use std::os::unix::fs::PermissionsExt;

        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("auth.json");
        write_session(&path, &SavedSession::new("t".into(), "u".into())).unwrap();

        let mode = std::fs::metadata(&path).unwrap().permissions().mode();
        assert_eq!(mode & 0o777, 0o600);
    }

    #[test]
    fn test_missing_username_deserializes() {
        // Files written before the username field was added
        let json = r#"{"token":"tok","base_url":"https://fm.test"}"#;
        let parsed: SavedSession = serde_json::from_str(json).unwrap();
        assert_eq!(parsed.token, "tok");
        assert!(parsed.username.is_none());
    }

    #[test]
    fn test_unparseable_file_reads_as_logged_out() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("auth.json");
        std::fs::write(&path, "not json").unwrap();
        assert!(read_session(&path).is_none());
        assert!(read_session(&dir.path().join("absent.json")).is_none());
    }

    #[test]
    fn test_session_file_path_under_app_dir() {
        let path = session_file_path().unwrap();
        assert!(path.ends_with("paygrid/auth.json"));
    }
}
