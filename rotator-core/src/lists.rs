//! Server list files: one opaque identifier per line, order-significant,
//! duplicates allowed.
//!
//! Lists are edited by the CLI (or by hand) while the daemon runs, so the daemon
//! reads them through [`ServerListProvider`] on every tick instead of caching.

use std::path::{Path, PathBuf};

use crate::error::{io_err, CoreError};
use crate::paths::{config_root, list_file};
use crate::store::write_atomic;
use crate::types::ListId;

const EXAMPLE_LIST_A: &[&str] = &["US-FREE#1", "CA#5", "NL-FREE#1"];
const EXAMPLE_LIST_B: &[&str] = &["JP#3", "SG#5", "HK#2"];

/// Read seam used by the scheduler.
pub trait ServerListProvider: Send + Sync {
    fn servers(&self, list: ListId) -> Result<Vec<String>, CoreError>;
}

/// Both list files under the rotator state directory.
#[derive(Debug, Clone)]
pub struct ListFiles {
    home: PathBuf,
}

impl ListFiles {
    pub fn at(home: &Path) -> Self {
        Self {
            home: home.to_path_buf(),
        }
    }

    pub fn path(&self, list: ListId) -> PathBuf {
        list_file(&self.home, list)
    }

    /// Trimmed, non-blank entries in file order. A missing file is an empty list.
    pub fn read(&self, list: ListId) -> Result<Vec<String>, CoreError> {
        let Some(contents) = self.read_raw(list)? else {
            return Ok(vec![]);
        };
        Ok(contents
            .lines()
            .map(str::trim)
            .filter(|line| !line.is_empty())
            .map(str::to_owned)
            .collect())
    }

    /// Replace the whole list.
    pub fn overwrite(&self, list: ListId, servers: &[String]) -> Result<(), CoreError> {
        let mut contents = servers.join("\n");
        if !contents.is_empty() {
            contents.push('\n');
        }
        write_atomic(&self.path(list), contents.as_bytes())
    }

    /// Entries containing `pattern`, case-insensitively.
    pub fn search(&self, list: ListId, pattern: &str) -> Result<Vec<String>, CoreError> {
        let needle = pattern.to_lowercase();
        Ok(self
            .read(list)?
            .into_iter()
            .filter(|server| server.to_lowercase().contains(&needle))
            .collect())
    }

    /// Replace every occurrence of `find` in the raw file text. Returns whether
    /// the file changed.
    pub fn replace(&self, list: ListId, find: &str, replace: &str) -> Result<bool, CoreError> {
        if find.is_empty() {
            return Ok(false);
        }
        let Some(contents) = self.read_raw(list)? else {
            return Ok(false);
        };
        let updated = contents.replace(find, replace);
        if updated == contents {
            return Ok(false);
        }
        write_atomic(&self.path(list), updated.as_bytes())?;
        Ok(true)
    }

    pub fn add(&self, list: ListId, server: &str) -> Result<(), CoreError> {
        let mut servers = self.read(list)?;
        servers.push(server.trim().to_string());
        self.overwrite(list, &servers)
    }

    /// Remove the first entry equal to `server`. Returns `false` if absent.
    pub fn remove(&self, list: ListId, server: &str) -> Result<bool, CoreError> {
        let mut servers = self.read(list)?;
        let Some(pos) = servers.iter().position(|s| s == server.trim()) else {
            return Ok(false);
        };
        servers.remove(pos);
        self.overwrite(list, &servers)?;
        Ok(true)
    }

    /// Write the example lists for any list file that does not exist yet.
    pub fn seed_examples(&self) -> Result<(), CoreError> {
        let root = config_root(&self.home);
        if !root.exists() {
            std::fs::create_dir_all(&root).map_err(|e| io_err(&root, e))?;
        }
        for (list, entries) in [(ListId::A, EXAMPLE_LIST_A), (ListId::B, EXAMPLE_LIST_B)] {
            if self.path(list).exists() {
                continue;
            }
            let servers: Vec<String> = entries.iter().map(|s| s.to_string()).collect();
            self.overwrite(list, &servers)?;
        }
        Ok(())
    }

    fn read_raw(&self, list: ListId) -> Result<Option<String>, CoreError> {
        let path = self.path(list);
        match std::fs::read_to_string(&path) {
            Ok(contents) => Ok(Some(contents)),
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(err) => Err(io_err(&path, err)),
        }
    }
}

impl ServerListProvider for ListFiles {
    fn servers(&self, list: ListId) -> Result<Vec<String>, CoreError> {
        self.read(list)
    }
}
