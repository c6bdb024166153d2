//! Detection of the current git branch.

use std::path::Path;
use std::process::Command;
use tracing::debug;

use crate::error::{ConfigError, Result};

/// Returns the branch checked out in `dir`.
///
/// # Errors
///
/// Returns an error if git cannot be run or reports no branch.
pub fn current_git_branch(dir: impl AsRef<Path>) -> Result<String> {
    let output = Command::new("git")
        .args(["status", "--branch", "--porcelain"])
        .current_dir(dir.as_ref())
        .output()
        .map_err(|e| ConfigError::GitBranch {
            message: format!("failed to run git: {e}"),
        })?;

    if !output.status.success() {
        return Err(ConfigError::GitBranch {
            message: String::from_utf8_lossy(&output.stderr).trim().to_string(),
        }
        .into());
    }

    let stdout = String::from_utf8_lossy(&output.stdout);
    let branch = stdout
        .lines()
        .next()
        .and_then(parse_porcelain_branch)
        .ok_or_else(|| ConfigError::GitBranch {
            message: String::from("no branch line in git status output"),
        })?;

    debug!("Current git branch is {branch}");
    Ok(branch)
}

/// Extracts the branch name from a `## <branch>...<upstream>` status line.
#[must_use]
pub fn parse_porcelain_branch(line: &str) -> Option<String> {
    let rest = line.strip_prefix("## ")?;
    let rest = rest.strip_prefix("No commits yet on ").unwrap_or(rest);
    let branch = rest
        .split("...")
        .next()
        .unwrap_or(rest)
        .split_whitespace()
        .next()?;
    if branch.is_empty() || branch == "HEAD" {
        return None;
    }
    Some(branch.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_branch_with_upstream() {
        assert_eq!(
            parse_porcelain_branch("## main...origin/main [ahead 1]"),
            Some(String::from("main"))
        );
    }

    #[test]
    fn test_branch_without_upstream() {
        assert_eq!(
            parse_porcelain_branch("## feature/login"),
            Some(String::from("feature/login"))
        );
    }

    #[test]
    fn test_fresh_repository() {
        assert_eq!(
            parse_porcelain_branch("## No commits yet on main"),
            Some(String::from("main"))
        );
    }

    #[test]
    fn test_detached_head_and_garbage() {
        assert_eq!(parse_porcelain_branch("## HEAD (no branch)"), None);
        assert_eq!(parse_porcelain_branch(" M src/lib.rs"), None);
    }
}
