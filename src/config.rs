use std::net::SocketAddr;
use std::path::PathBuf;

pub const DEFAULT_ADDR: &str = "127.0.0.1:3000";
pub const DEFAULT_STATIC_DIR: &str = "static";

/// Server settings, taken from the command line
#[derive(Clone, Debug, PartialEq)]
pub struct ServerConfig {
    /// Address the HTTP listener binds to
    pub addr: SocketAddr,

    /// Directory served under `/static`
    pub static_dir: PathBuf,

    /// Default chart image size when a request does not give one
    pub chart_width: u32,
    pub chart_height: u32,

    /// Largest accepted request body; a data URI is about 4/3 of the file
    pub max_upload_bytes: usize,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            addr: SocketAddr::from(([127, 0, 0, 1], 3000)),
            static_dir: PathBuf::from(DEFAULT_STATIC_DIR),
            chart_width: 800,
            chart_height: 600,
            max_upload_bytes: 10 * 1024 * 1024,
        }
    }
}

impl ServerConfig {
    /// Builds the config from `[addr] [static_dir]` (program name already skipped)
    ///
    /// A value that does not parse is ignored with a warning and the default
    /// is kept.
    ///
    /// # Examples
    /// ```
    /// use clinic_dashboard::config::ServerConfig;
    ///
    /// let config = ServerConfig::from_args(vec!["0.0.0.0:8080".to_string()]);
    /// assert_eq!(config.addr.port(), 8080);
    /// ```
    pub fn from_args<I: IntoIterator<Item = String>>(args: I) -> Self {
        let mut config = Self::default();
        let mut args = args.into_iter();

        if let Some(addr) = args.next() {
            match addr.parse() {
                Ok(addr) => config.addr = addr,
                Err(_) => log::warn!("Invalid listen address {:?}, using {}", addr, config.addr),
            }
        }

        if let Some(dir) = args.next() {
            config.static_dir = PathBuf::from(dir);
        }

        config
    }
}
