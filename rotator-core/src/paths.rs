//! On-disk layout of the rotator state directory.
//!
//! ```text
//! ~/.config/pvpn-rotator/
//!   config.json   (snapshot, mode 0600)
//!   list_a.txt    (one server id per line)
//!   list_b.txt
//! ```
//!
//! Every helper takes an explicit `home`; tests pass a `TempDir`, binaries pass
//! [`home`].

use std::path::{Path, PathBuf};

use crate::error::CoreError;
use crate::types::ListId;

pub const APP_DIR: &str = "pvpn-rotator";
pub const CONFIG_FILE: &str = "config.json";

/// `<home>/.config/pvpn-rotator/`
pub fn config_root(home: &Path) -> PathBuf {
    home.join(".config").join(APP_DIR)
}

/// `<home>/.config/pvpn-rotator/config.json`
pub fn config_file(home: &Path) -> PathBuf {
    config_root(home).join(CONFIG_FILE)
}

/// `<home>/.config/pvpn-rotator/list_<a|b>.txt`
pub fn list_file(home: &Path, list: ListId) -> PathBuf {
    let name = match list {
        ListId::A => "list_a.txt",
        ListId::B => "list_b.txt",
    };
    config_root(home).join(name)
}

pub fn home() -> Result<PathBuf, CoreError> {
    dirs::home_dir().ok_or(CoreError::HomeNotFound)
}
