//! Session-scoped "health checks already completed" flag.
//!
//! Once set, the gate skips the health round-trip for the rest of the
//! session.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use tracing::{debug, info, warn};

/// Fixed key of the session flag.
pub const SESSION_FLAG_KEY: &str = "health-checks-completed";

pub trait SessionFlag: Send + Sync {
    fn is_complete(&self) -> bool;
    fn mark_complete(&self) -> Result<()>;
    fn clear(&self) -> Result<()>;
}

/// Flag that lives as long as the process.
#[derive(Debug, Default)]
pub struct MemorySessionFlag {
    complete: AtomicBool,
}

impl MemorySessionFlag {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn completed() -> Self {
        Self {
            complete: AtomicBool::new(true),
        }
    }
}

impl SessionFlag for MemorySessionFlag {
    fn is_complete(&self) -> bool {
        self.complete.load(Ordering::SeqCst)
    }

    fn mark_complete(&self) -> Result<()> {
        self.complete.store(true, Ordering::SeqCst);
        Ok(())
    }

    fn clear(&self) -> Result<()> {
        self.complete.store(false, Ordering::SeqCst);
        Ok(())
    }
}

/// Contents of the flag file.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct FlagFile {
    completed: bool,
    marked_at: String,
}

/// Flag persisted as `<cache dir>/health-checks-completed.json`.
pub struct FileSessionFlag {
    flag_path: PathBuf,
}

impl FileSessionFlag {
    /// # Arguments
    /// * `cache_dir` - Optional custom cache directory. Defaults to ~/.campus
    pub fn new(cache_dir: Option<String>) -> Result<Self> {
        let base_dir = match cache_dir {
            Some(dir) => PathBuf::from(dir),
            None => dirs::home_dir()
                .context("Could not determine home directory")?
                .join(".campus"),
        };

        std::fs::create_dir_all(&base_dir)
            .with_context(|| format!("Failed to create cache directory: {:?}", base_dir))?;

        Ok(Self {
            flag_path: base_dir.join(format!("{}.json", SESSION_FLAG_KEY)),
        })
    }

    pub fn flag_path(&self) -> &PathBuf {
        &self.flag_path
    }
}

impl SessionFlag for FileSessionFlag {
    fn is_complete(&self) -> bool {
        let content = match std::fs::read_to_string(&self.flag_path) {
            Ok(content) => content,
            Err(_) => return false,
        };
        match serde_json::from_str::<FlagFile>(&content) {
            Ok(flag) => flag.completed,
            Err(e) => {
                warn!("Ignoring unreadable session flag {:?}: {}", self.flag_path, e);
                false
            }
        }
    }

    fn mark_complete(&self) -> Result<()> {
        let flag = FlagFile {
            completed: true,
            marked_at: chrono::Utc::now().to_rfc3339(),
        };
        let content =
            serde_json::to_string_pretty(&flag).context("Failed to serialize session flag")?;
        std::fs::write(&self.flag_path, content)
            .with_context(|| format!("Failed to write session flag: {:?}", self.flag_path))?;
        debug!("Session flag saved to {:?}", self.flag_path);
        Ok(())
    }

    fn clear(&self) -> Result<()> {
        if self.flag_path.exists() {
            std::fs::remove_file(&self.flag_path).with_context(|| {
                format!("Failed to remove session flag: {:?}", self.flag_path)
            })?;
            info!("Session flag cleared");
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_memory_flag() {
        let flag = MemorySessionFlag::new();
        assert!(!flag.is_complete());
        flag.mark_complete().unwrap();
        assert!(flag.is_complete());
        flag.clear().unwrap();
        assert!(!flag.is_complete());
        assert!(MemorySessionFlag::completed().is_complete());
    }

    #[test]
    fn test_file_flag_round_trip() {
        let tmp = tempdir().unwrap();
        let flag = FileSessionFlag::new(Some(tmp.path().to_string_lossy().to_string())).unwrap();
        assert!(!flag.is_complete());

        flag.mark_complete().unwrap();
        assert!(flag.flag_path().exists());
        assert!(flag.flag_path().ends_with("health-checks-completed.json"));

        // A fresh handle on the same directory sees the flag.
        let again = FileSessionFlag::new(Some(tmp.path().to_string_lossy().to_string())).unwrap();
        assert!(again.is_complete());

        again.clear().unwrap();
        assert!(!flag.is_complete());
    }

    #[test]
    fn test_corrupt_flag_is_not_complete() {
        let tmp = tempdir().unwrap();
        let flag = FileSessionFlag::new(Some(tmp.path().to_string_lossy().to_string())).unwrap();
        std::fs::write(flag.flag_path(), "{not json").unwrap();
        assert!(!flag.is_complete());
    }
}
