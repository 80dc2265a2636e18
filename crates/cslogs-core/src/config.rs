//! Process configuration for cslogs
//!
//! The base log directory comes from the environment, in priority order:
//! - `CS_PROC_OPTS`: a JSON object whose `base-log-dir` field names the dir
//! - `CSHIP_LOG_PATH`: a plain path
//!
//! An unparseable `CS_PROC_OPTS` is logged and skipped rather than fatal.

use serde::Deserialize;
use std::net::SocketAddr;
use std::path::PathBuf;
use tracing::warn;

use crate::constants::*;
use crate::error::{Error, Result};
use crate::layout::LogLayout;

/// Process options blob handed over by the host agent
#[derive(Debug, Deserialize, Default)]
pub struct ProcOpts {
    #[serde(rename = "base-log-dir")]
    pub base_log_dir: Option<String>,
}

impl ProcOpts {
    pub fn parse(raw: &str) -> Result<Self> {
        Ok(serde_json::from_str(raw)?)
    }
}

/// Pick the base log dir from the raw `CS_PROC_OPTS` and `CSHIP_LOG_PATH` values
pub fn resolve_base_log_dir(proc_opts: Option<&str>, log_path: Option<&str>) -> Result<PathBuf> {
    let from_opts = proc_opts.and_then(|raw| match ProcOpts::parse(raw) {
        Ok(opts) => opts.base_log_dir,
        Err(e) => {
            warn!("Could not parse {}: {}", PROC_OPTS_ENV, e);
            None
        }
    });

    from_opts
        .into_iter()
        .chain(log_path.map(str::to_string))
        .find(|dir| !dir.trim().is_empty())
        .map(PathBuf::from)
        .ok_or_else(|| {
            Error::config(format!(
                "no base log directory: set `{}` in {} or {}",
                BASE_LOG_DIR_KEY, PROC_OPTS_ENV, LOG_PATH_ENV
            ))
        })
}

/// Tuning for a single tailed file
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TailConfig {
    /// Maximum bytes requested per read
    pub chunk_size: usize,
    /// Chunks buffered ahead of the consumer before reads pause
    pub buffer_chunks: usize,
}

impl Default for TailConfig {
    fn default() -> Self {
        Self {
            chunk_size: DEFAULT_CHUNK_SIZE,
            buffer_chunks: DEFAULT_BUFFER_CHUNKS,
        }
    }
}

impl TailConfig {
    pub fn new(chunk_size: usize, buffer_chunks: usize) -> Self {
        Self {
            chunk_size,
            buffer_chunks,
        }
    }

    pub fn validate(&self) -> Result<()> {
        if self.chunk_size == 0 {
            return Err(Error::config("chunk size must be greater than zero"));
        }
        if self.buffer_chunks == 0 {
            return Err(Error::config("buffer depth must be greater than zero"));
        }
        Ok(())
    }
}

/// Resolved server configuration
#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    pub base_log_dir: PathBuf,
    pub tail: TailConfig,
}

impl ServerConfig {
    pub fn new(base_log_dir: impl Into<PathBuf>) -> Self {
        Self {
            host: DEFAULT_HOST.to_string(),
            port: DEFAULT_PORT,
            base_log_dir: base_log_dir.into(),
            tail: TailConfig::default(),
        }
    }

    pub fn bind_addr(&self) -> Result<SocketAddr> {
        format!("{}:{}", self.host, self.port)
            .parse()
            .map_err(|e| Error::config(format!("invalid bind address {}:{}: {}", self.host, self.port, e)))
    }

    pub fn layout(&self) -> LogLayout {
        LogLayout::new(self.base_log_dir.clone())
    }

    pub fn validate(&self) -> Result<()> {
        self.tail.validate()?;
        self.bind_addr()?;
        Ok(())
    }
}
