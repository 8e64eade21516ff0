use std::path::PathBuf;

/// Root data directory for taproot.
///
/// Everything taproot persists is machine-local operator state — the
/// rotation work directory, state file, and audit log. None of it should
/// roam across machines.
///
/// - Linux: `~/.taproot/`
/// - macOS: `~/Library/Application Support/taproot/`
/// - Windows: `%LOCALAPPDATA%\taproot\`
pub fn taproot_data_dir() -> PathBuf {
    if let Some(dir) = std::env::var_os("TAPROOT_DATA_DIR") {
        return PathBuf::from(dir);
    }

    #[cfg(target_os = "macos")]
    {
        if let Some(home) = std::env::var_os("HOME") {
            return PathBuf::from(home)
                .join("Library")
                .join("Application Support")
                .join("taproot");
        }
    }

    #[cfg(windows)]
    {
        if let Some(local) = std::env::var_os("LOCALAPPDATA") {
            return PathBuf::from(local).join("taproot");
        }
    }

    #[cfg(not(any(target_os = "macos", windows)))]
    {
        if let Some(home) = std::env::var_os("HOME") {
            return PathBuf::from(home).join(".taproot");
        }
    }

    // Fallback
    PathBuf::from(".taproot")
}

/// Default rotation work directory when `--workdir` is not given.
pub fn default_workdir() -> PathBuf {
    taproot_data_dir().join("rotation")
}
