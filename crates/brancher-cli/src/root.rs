use std::path::{Path, PathBuf};

/// Resolve the repository root.
///
/// Priority:
/// 1. `--root` flag / `BRANCHER_ROOT` env var (passed in as `explicit`)
/// 2. Walk upward from `cwd` looking for `.git`
/// 3. Fall back to `cwd`
pub fn resolve_root(explicit: Option<&Path>) -> PathBuf {
    if let Some(p) = explicit {
        return p.to_path_buf();
    }
    let cwd = std::env::current_dir().unwrap_or_else(|_| PathBuf::from("."));
    find_git_root(&cwd).unwrap_or(cwd)
}

/// Nearest ancestor of `start` (inclusive) containing `.git`. Worktrees and
/// submodules use a `.git` file, so any entry counts.
fn find_git_root(start: &Path) -> Option<PathBuf> {
    start
        .ancestors()
        .find(|dir| dir.join(".git").exists())
        .map(Path::to_path_buf)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn explicit_root_wins() {
        let dir = TempDir::new().unwrap();
        let result = resolve_root(Some(dir.path()));
        assert_eq!(result, dir.path());
    }

    #[test]
    fn finds_git_dir_from_subdirectory() {
        let dir = TempDir::new().unwrap();
        std::fs::create_dir_all(dir.path().join(".git")).unwrap();
        let subdir = dir.path().join("scripts/templates");
        std::fs::create_dir_all(&subdir).unwrap();
        assert_eq!(find_git_root(&subdir).unwrap(), dir.path());
    }

    #[test]
    fn git_file_counts_as_root() {
        let dir = TempDir::new().unwrap();
        std::fs::write(dir.path().join(".git"), "gitdir: ../main/.git/worktrees/x\n").unwrap();
        assert_eq!(find_git_root(dir.path()).unwrap(), dir.path());
    }
}
