//! Engine installation lookup and process launch.
//!
//! An installation root is the nearest directory, starting at a given path
//! and walking upward, that contains [`MARKER_FILE`]. The engine executable
//! lives at a platform-specific path below that root.

use crate::error::ClientError;
use std::path::{Path, PathBuf};
use std::process::Stdio;
use tokio::process::Command;

/// Relative path whose presence identifies an installation root.
pub const MARKER_FILE: &str = "data/ofiq_config.jaxn";

#[cfg(windows)]
const EXECUTABLE_CANDIDATES: &[&str] = &[
    "install_x86_64/Release/bin/OFIQ_zmq_app.exe",
    "install_x86_64/Release/bin/OFIQ_zmq_app",
];

#[cfg(not(windows))]
const EXECUTABLE_CANDIDATES: &[&str] = &["install_x86_64_linux/Release/bin/OFIQ_zmq_app"];

/// Executable paths tried below an installation root on this platform, in order.
pub fn executable_candidates() -> &'static [&'static str] {
    EXECUTABLE_CANDIDATES
}

/// A located engine installation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Installation {
    root: PathBuf,
    executable: PathBuf,
}

impl Installation {
    /// Resolves `path`, which is either a directory inside an installation or
    /// the engine executable itself.
    pub fn locate(path: impl AsRef<Path>) -> Result<Self, ClientError> {
        let input = path.as_ref();
        let resolved =
            std::fs::canonicalize(input).map_err(|_| ClientError::InstallationNotFound {
                path: input.to_path_buf(),
                marker: MARKER_FILE,
            })?;

        let installation = if resolved.is_dir() {
            let root = find_root(&resolved)?;
            let executable = find_executable(&root)?;
            Self { root, executable }
        } else {
            let root = find_root(&resolved)?;
            Self {
                root,
                executable: resolved,
            }
        };

        tracing::debug!(
            "Located installation at {} (executable {})",
            installation.root.display(),
            installation.executable.display()
        );
        Ok(installation)
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn executable(&self) -> &Path {
        &self.executable
    }
}

/// Walks upward from `start` to the first directory containing [`MARKER_FILE`].
pub fn find_root(start: &Path) -> Result<PathBuf, ClientError> {
    start
        .ancestors()
        .find(|dir| dir.join(MARKER_FILE).is_file())
        .map(Path::to_path_buf)
        .ok_or_else(|| ClientError::InstallationNotFound {
            path: start.to_path_buf(),
            marker: MARKER_FILE,
        })
}

/// Returns the first existing executable candidate below `root`.
pub fn find_executable(root: &Path) -> Result<PathBuf, ClientError> {
    executable_candidates()
        .iter()
        .map(|candidate| root.join(candidate))
        .find(|path| path.is_file())
        .ok_or_else(|| ClientError::ExecutableNotFound {
            root: root.to_path_buf(),
        })
}

/// Starts an engine process.
pub trait Launcher: Send + Sync {
    /// Starts the engine and returns without waiting for it to become ready.
    fn launch(&self) -> Result<(), ClientError>;
}

/// Launches the engine executable of an [`Installation`].
///
/// The process runs detached: it gets no arguments, runs with the
/// installation root as working directory, and is not killed when the
/// client goes away.
#[derive(Debug, Clone)]
pub struct EngineLauncher {
    installation: Installation,
}

impl EngineLauncher {
    pub fn new(installation: Installation) -> Self {
        Self { installation }
    }

    pub fn installation(&self) -> &Installation {
        &self.installation
    }
}

impl Launcher for EngineLauncher {
    fn launch(&self) -> Result<(), ClientError> {
        let executable = self.installation.executable();
        tracing::info!(
            "Starting engine {} in {}",
            executable.display(),
            self.installation.root().display()
        );

        let child = Command::new(executable)
            .current_dir(self.installation.root())
            .stdin(Stdio::null())
            .spawn()
            .map_err(|source| ClientError::Spawn {
                path: executable.to_path_buf(),
                source,
            })?;

        tracing::debug!("Engine process started (pid {:?})", child.id());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn make_installation(dir: &Path) -> PathBuf {
        let root = dir.join("ofiq");
        std::fs::create_dir_all(root.join("data")).unwrap();
        std::fs::write(root.join(MARKER_FILE), "{}").unwrap();
        root
    }

    fn make_executable(root: &Path, contents: &str) -> PathBuf {
        let path = root.join(executable_candidates()[0]);
        std::fs::create_dir_all(path.parent().unwrap()).unwrap();
        std::fs::write(&path, contents).unwrap();
        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            std::fs::set_permissions(&path, std::fs::Permissions::from_mode(0o755)).unwrap();
        }
        path
    }

    #[test]
    fn test_find_root_walks_upward() {
        let dir = TempDir::new().unwrap();
        let root = make_installation(dir.path());
        let nested = root.join("build").join("deep");
        std::fs::create_dir_all(&nested).unwrap();

        assert_eq!(find_root(&nested).unwrap(), root);
        assert_eq!(find_root(&root).unwrap(), root);
    }

    #[test]
    fn test_find_root_missing_marker() {
        let dir = TempDir::new().unwrap();
        let err = find_root(dir.path()).unwrap_err();
        assert!(matches!(err, ClientError::InstallationNotFound { .. }));
    }

    #[test]
    fn test_locate_from_directory() {
        let dir = TempDir::new().unwrap();
        let root = make_installation(dir.path());
        let executable = make_executable(&root, "");

        let installation = Installation::locate(root.join("data")).unwrap();
        assert_eq!(installation.root(), root.canonicalize().unwrap());
        assert_eq!(
            installation.executable(),
            executable.canonicalize().unwrap()
        );
    }

    #[test]
    fn test_locate_from_executable() {
        let dir = TempDir::new().unwrap();
        let root = make_installation(dir.path());
        let custom = root.join("bin").join("engine");
        std::fs::create_dir_all(custom.parent().unwrap()).unwrap();
        std::fs::write(&custom, "").unwrap();

        let installation = Installation::locate(&custom).unwrap();
        assert_eq!(installation.root(), root.canonicalize().unwrap());
        assert_eq!(installation.executable(), custom.canonicalize().unwrap());
    }

    #[test]
    fn test_locate_without_executable() {
        let dir = TempDir::new().unwrap();
        let root = make_installation(dir.path());

        let err = Installation::locate(&root).unwrap_err();
        assert!(matches!(err, ClientError::ExecutableNotFound { .. }));
    }

    #[test]
    fn test_locate_nonexistent_path() {
        let err = Installation::locate("/nonexistent/ofiq/build").unwrap_err();
        assert!(matches!(err, ClientError::InstallationNotFound { .. }));
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_launch_runs_in_root() {
        let dir = TempDir::new().unwrap();
        let root = make_installation(dir.path());
        make_executable(&root, "#!/bin/sh\ntouch launched\n");

        let launcher = EngineLauncher::new(Installation::locate(&root).unwrap());
        launcher.launch().unwrap();

        let marker = root.join("launched");
        for _ in 0..100 {
            if marker.exists() {
                break;
            }
            tokio::time::sleep(std::time::Duration::from_millis(50)).await;
        }
        assert!(marker.exists());
    }

    #[tokio::test]
    async fn test_launch_failure_reports_path() {
        let dir = TempDir::new().unwrap();
        let root = make_installation(dir.path());
        let missing = root.join("gone");
        let installation = Installation {
            root: root.clone(),
            executable: missing.clone(),
        };

        let err = EngineLauncher::new(installation).launch().unwrap_err();
        match err {
            ClientError::Spawn { path, .. } => assert_eq!(path, missing),
            other => panic!("unexpected error: {other}"),
        }
    }
}
