use std::{env, path::PathBuf};

/// Returns the user's home directory.
///
/// Uses `HOME` when set. Without it the current directory is used, so
/// relative lookups stay next to where the process was started.
pub fn home_dir() -> PathBuf {
    env::var("HOME")
        .ok()
        .filter(|home| !home.is_empty())
        .map(PathBuf::from)
        .unwrap_or_else(|| env::current_dir().unwrap_or_else(|_| PathBuf::from(".")))
}

/// Returns the user's config directory following the XDG Base Directory
/// Specification: `XDG_CONFIG_HOME`, or `$HOME/.config` when unset.
pub fn xdg_config_home() -> PathBuf {
    env::var("XDG_CONFIG_HOME")
        .ok()
        .filter(|dir| !dir.is_empty())
        .map(PathBuf::from)
        .unwrap_or_else(|| home_dir().join(".config"))
}
