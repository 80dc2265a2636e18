//! Constants and default values for cslogs

/// Environment variable holding the JSON process options blob
pub const PROC_OPTS_ENV: &str = "CS_PROC_OPTS";

/// Environment variable holding the plain base log directory
pub const LOG_PATH_ENV: &str = "CSHIP_LOG_PATH";

/// Field of the process options blob naming the base log directory
pub const BASE_LOG_DIR_KEY: &str = "base-log-dir";

/// Default listening port
pub const DEFAULT_PORT: u16 = 3000;

/// Default listening host
pub const DEFAULT_HOST: &str = "0.0.0.0";

/// Directory under the base log dir holding per-application logs
pub const APPLICATIONS_DIR: &str = "applications";

/// Combined host log file name
pub const HOST_LOG_FILE: &str = "containership.log";

/// Default bytes requested per read from a tailed file (64KB)
pub const DEFAULT_CHUNK_SIZE: usize = 64 * 1024;

/// Default number of chunks buffered ahead of a slow consumer
pub const DEFAULT_BUFFER_CHUNKS: usize = 16;
