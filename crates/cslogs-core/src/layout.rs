//! On-disk layout of application and host logs
//!
//! ```text
//! {base}/applications/{application}/{container}/stdout
//! {base}/applications/{application}/{container}/stderr
//! {base}/containership.log
//! ```

use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;

use crate::constants::{APPLICATIONS_DIR, HOST_LOG_FILE};
use crate::error::{Error, Result};

/// Output stream of a container
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum StreamKind {
    #[default]
    Stdout,
    Stderr,
}

impl StreamKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            StreamKind::Stdout => "stdout",
            StreamKind::Stderr => "stderr",
        }
    }
}

impl fmt::Display for StreamKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for StreamKind {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "stdout" => Ok(StreamKind::Stdout),
            "stderr" => Ok(StreamKind::Stderr),
            other => Err(Error::InvalidStreamKind(other.to_string())),
        }
    }
}

/// Resolves URL parameters to log file paths under a base directory
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LogLayout {
    base_dir: PathBuf,
}

impl LogLayout {
    pub fn new(base_dir: impl Into<PathBuf>) -> Self {
        Self {
            base_dir: base_dir.into(),
        }
    }

    pub fn base_dir(&self) -> &Path {
        &self.base_dir
    }

    /// Directory holding a container's logs.
    ///
    /// Segments must be single, non-empty path components; `..` and embedded
    /// separators are rejected so a request can never leave the base dir.
    pub fn container_dir(&self, application: &str, container: &str) -> Result<PathBuf> {
        validate_segment(application)?;
        validate_segment(container)?;

        Ok(self
            .base_dir
            .join(APPLICATIONS_DIR)
            .join(application)
            .join(container))
    }

    /// Path of a container's stdout or stderr log
    pub fn container_log(
        &self,
        application: &str,
        container: &str,
        kind: StreamKind,
    ) -> Result<PathBuf> {
        Ok(self
            .container_dir(application, container)?
            .join(kind.as_str()))
    }

    /// Path of the combined host log.
    ///
    /// Hosts currently share a single file regardless of name.
    pub fn host_log(&self) -> PathBuf {
        self.base_dir.join(HOST_LOG_FILE)
    }
}

fn validate_segment(segment: &str) -> Result<()> {
    let invalid = segment.is_empty()
        || segment == "."
        || segment == ".."
        || segment.contains('/')
        || segment.contains('\\')
        || segment.contains('\0');

    if invalid {
        return Err(Error::InvalidSegment(segment.to_string()));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_stream_kind_parse() {
        assert_eq!("stdout".parse::<StreamKind>().unwrap(), StreamKind::Stdout);
        assert_eq!("stderr".parse::<StreamKind>().unwrap(), StreamKind::Stderr);
        assert!(matches!(
            "bogus".parse::<StreamKind>(),
            Err(Error::InvalidStreamKind(s)) if s == "bogus"
        ));
        assert!("STDOUT".parse::<StreamKind>().is_err());
    }

    #[test]
    fn test_stream_kind_default_is_stdout() {
        assert_eq!(StreamKind::default(), StreamKind::Stdout);
        assert_eq!(StreamKind::Stderr.to_string(), "stderr");
    }

    #[test]
    fn test_container_log_path() {
        let layout = LogLayout::new("/var/log/cs");
        let path = layout
            .container_log("app1", "c1", StreamKind::Stderr)
            .unwrap();
        assert_eq!(path, PathBuf::from("/var/log/cs/applications/app1/c1/stderr"));
    }

    #[test]
    fn test_host_log_path() {
        let layout = LogLayout::new("/var/log/cs");
        assert_eq!(layout.host_log(), PathBuf::from("/var/log/cs/containership.log"));
    }

    #[test]
    fn test_rejects_traversal_segments() {
        let layout = LogLayout::new("/var/log/cs");
        for bad in ["", ".", "..", "a/b", "a\\b"] {
            assert!(
                matches!(
                    layout.container_log(bad, "c1", StreamKind::Stdout),
                    Err(Error::InvalidSegment(_))
                ),
                "application {:?} should be rejected",
                bad
            );
            assert!(layout.container_log("app", bad, StreamKind::Stdout).is_err());
        }
    }
}
