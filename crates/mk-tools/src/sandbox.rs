// sandbox.rs — Filesystem boundary for dispatched capabilities.
//
// Every capability execution is confined to the monorepo working tree.
// Containment is checked lexically: `..` components are resolved without
// touching the filesystem, so a path that would escape is rejected even
// if it does not exist yet.

use std::path::{Component, Path, PathBuf};

use crate::error::ToolError;

/// The filesystem boundary all dispatched capabilities must stay within.
#[derive(Debug, Clone)]
pub struct Sandbox {
    root: PathBuf,
}

impl Sandbox {
    /// Create a sandbox rooted at `root`. The root must exist — it is the
    /// working tree capabilities run in.
    pub fn new(root: impl AsRef<Path>) -> Result<Self, ToolError> {
        let root = root.as_ref().canonicalize()?;
        Ok(Self { root })
    }

    /// The sandbox root directory.
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Whether `path` stays within the sandbox. Relative paths are
    /// resolved against the root.
    pub fn contains(&self, path: &Path) -> bool {
        let absolute = if path.is_absolute() {
            normalize(path)
        } else {
            normalize(&self.root.join(path))
        };
        absolute.starts_with(&self.root)
    }

    /// Reject the call if any requested path falls outside the root.
    pub fn check(&self, tool: &str, paths: &[PathBuf]) -> Result<(), ToolError> {
        for path in paths {
            if !self.contains(path) {
                return Err(ToolError::SandboxViolation {
                    tool: tool.to_string(),
                    path: path.clone(),
                });
            }
        }
        Ok(())
    }
}

/// Lexically resolve `.` and `..` components.
fn normalize(path: &Path) -> PathBuf {
    let mut out = PathBuf::new();
    for component in path.components() {
        match component {
            Component::CurDir => {}
            Component::ParentDir => {
                out.pop();
            }
            other => out.push(other),
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn contains_paths_under_root() {
        let dir = tempdir().unwrap();
        let sandbox = Sandbox::new(dir.path()).unwrap();
        assert!(sandbox.contains(Path::new("src/main.rs")));
        assert!(sandbox.contains(&sandbox.root().join("nested/dir")));
        assert!(sandbox.contains(Path::new(".")));
    }

    #[test]
    fn rejects_absolute_paths_outside_root() {
        let dir = tempdir().unwrap();
        let sandbox = Sandbox::new(dir.path()).unwrap();
        assert!(!sandbox.contains(Path::new("/etc/passwd")));
    }

    #[test]
    fn rejects_parent_dir_escapes() {
        let dir = tempdir().unwrap();
        let sandbox = Sandbox::new(dir.path()).unwrap();
        assert!(!sandbox.contains(Path::new("../sibling")));
        assert!(!sandbox.contains(Path::new("ok/../../escape")));
        // A `..` that stays inside is fine.
        assert!(sandbox.contains(Path::new("a/../b")));
    }

    #[test]
    fn check_names_the_offending_path() {
        let dir = tempdir().unwrap();
        let sandbox = Sandbox::new(dir.path()).unwrap();
        let err = sandbox
            .check("safe_shell", &[PathBuf::from("/tmp/elsewhere")])
            .unwrap_err();
        assert!(matches!(err, ToolError::SandboxViolation { .. }));
    }
}
