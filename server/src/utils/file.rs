//! Path helpers

use std::path::PathBuf;

/// Expand a user-supplied path to an absolute path.
///
/// `~` and `~/rest` resolve against the home directory. Anything relative is
/// joined onto the current working directory. Absolute paths pass through.
pub fn expand_path(path: &str) -> PathBuf {
    let path = path.trim();

    if path.is_empty() {
        return std::env::current_dir().unwrap_or_else(|_| PathBuf::from("."));
    }

    let expanded = if path == "~" {
        dirs::home_dir().unwrap_or_else(|| PathBuf::from(path))
    } else if let Some(rest) = path.strip_prefix("~/") {
        dirs::home_dir()
            .map(|home| home.join(rest))
            .unwrap_or_else(|| PathBuf::from(path))
    } else {
        PathBuf::from(path)
    };

    if expanded.is_relative() {
        std::env::current_dir()
            .map(|cwd| cwd.join(&expanded))
            .unwrap_or(expanded)
    } else {
        expanded
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    #[cfg(unix)]
    fn test_expand_path_absolute() {
        assert_eq!(expand_path("/var/lib/botboard"), PathBuf::from("/var/lib/botboard"));
    }

    #[test]
    fn test_expand_path_relative_joins_cwd() {
        let cwd = std::env::current_dir().unwrap();
        assert_eq!(expand_path("./data"), cwd.join("./data"));
        assert_eq!(expand_path("botboard.json"), cwd.join("botboard.json"));
    }

    #[test]
    fn test_expand_path_tilde() {
        if let Some(home) = dirs::home_dir() {
            assert_eq!(expand_path("~"), home);
            assert_eq!(expand_path("~/.botboard"), home.join(".botboard"));
        }
    }

    #[test]
    fn test_expand_path_blank_is_cwd() {
        let cwd = std::env::current_dir().unwrap();
        assert_eq!(expand_path("   "), cwd);
    }
}
