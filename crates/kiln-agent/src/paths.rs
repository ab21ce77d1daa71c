use std::path::{Path, PathBuf};

/// Resolves a tool-supplied path against the working directory.
///
/// Purely syntactic: nothing is checked against the filesystem.
///
/// - empty or `"."` resolves to `cwd`
/// - a leading `~` expands to the user's home directory
/// - an absolute path is returned unchanged
/// - anything else is joined onto `cwd`
pub fn resolve_path(path: &str, cwd: &Path) -> PathBuf {
    if path.is_empty() || path == "." {
        return cwd.to_path_buf();
    }

    if let Some(rest) = strip_home_prefix(path) {
        if let Some(home) = dirs::home_dir() {
            return if rest.is_empty() {
                home
            } else {
                home.join(rest)
            };
        }
    }

    let candidate = Path::new(path);
    if candidate.is_absolute() {
        return candidate.to_path_buf();
    }
    cwd.join(candidate)
}

fn strip_home_prefix(path: &str) -> Option<&str> {
    path.strip_prefix('~')
        .map(|rest| rest.trim_start_matches(['/', '\\']))
}

/// Renders `path` relative to `cwd` when it lives underneath it.
pub fn display_path(path: &Path, cwd: &Path) -> String {
    path.strip_prefix(cwd)
        .unwrap_or(path)
        .to_string_lossy()
        .into_owned()
}
