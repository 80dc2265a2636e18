//! CLI argument definitions

use clap::Parser;
use cslogs_core::{
    resolve_base_log_dir, Result, ServerConfig, TailConfig, DEFAULT_BUFFER_CHUNKS,
    DEFAULT_CHUNK_SIZE, DEFAULT_HOST, DEFAULT_PORT,
};

#[derive(Parser, Debug)]
#[command(name = "cslogsd")]
#[command(version, about = "Stream container and host log files over HTTP")]
pub struct Cli {
    /// Address to listen on
    #[arg(long, env = "HOST", default_value = DEFAULT_HOST)]
    pub host: String,

    /// Port to listen on
    #[arg(short, long, env = "PORT", default_value_t = DEFAULT_PORT)]
    pub port: u16,

    /// JSON process options; `base-log-dir` names the log directory
    #[arg(long, env = "CS_PROC_OPTS")]
    pub proc_opts: Option<String>,

    /// Base log directory, used when the process options don't name one
    #[arg(long, env = "CSHIP_LOG_PATH")]
    pub log_path: Option<String>,

    /// Maximum bytes per streamed chunk
    #[arg(long, default_value_t = DEFAULT_CHUNK_SIZE)]
    pub chunk_size: usize,

    /// Chunks buffered per client before reading pauses
    #[arg(long, default_value_t = DEFAULT_BUFFER_CHUNKS)]
    pub buffer_chunks: usize,

    /// Increase verbosity (-v, -vv)
    #[arg(short, long, action = clap::ArgAction::Count)]
    pub verbose: u8,
}

impl Cli {
    pub fn log_level(&self) -> &'static str {
        match self.verbose {
            0 => "info",
            1 => "debug",
            _ => "trace",
        }
    }

    pub fn server_config(&self) -> Result<ServerConfig> {
        let base_log_dir =
            resolve_base_log_dir(self.proc_opts.as_deref(), self.log_path.as_deref())?;

        let config = ServerConfig {
            host: self.host.clone(),
            port: self.port,
            base_log_dir,
            tail: TailConfig::new(self.chunk_size, self.buffer_chunks),
        };
        config.validate()?;
        Ok(config)
    }
}
