use std::{env, net::SocketAddr, path::PathBuf};

use thiserror::Error;

#[derive(Debug, Clone)]
pub struct Config {
    pub bind_addr: String,
    pub bind_port: u16,
    /// Explicit widget bundle directory; located heuristically when unset.
    pub assets_dir: Option<PathBuf>,
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("BIND_PORT must be a valid u16")]
    InvalidPort,
    #[error("invalid bind address or port")]
    InvalidSocket,
    #[error("WIDGET_ASSETS_DIR must point to an existing directory")]
    MissingAssetsDir,
}

impl Config {
    pub fn from_env() -> Result<Self, ConfigError> {
        let bind_addr = env::var("BIND_ADDR").unwrap_or_else(|_| "0.0.0.0".to_string());
        let bind_port = env::var("BIND_PORT")
            .ok()
            .map(|value| value.parse::<u16>().map_err(|_| ConfigError::InvalidPort))
            .transpose()?
            .unwrap_or(8000);
        let assets_dir = env::var("WIDGET_ASSETS_DIR")
            .ok()
            .map(|value| value.trim().to_string())
            .filter(|value| !value.is_empty())
            .map(PathBuf::from)
            .map(|path| {
                if path.is_dir() {
                    Ok(path)
                } else {
                    Err(ConfigError::MissingAssetsDir)
                }
            })
            .transpose()?;

        let config = Self {
            bind_addr,
            bind_port,
            assets_dir,
        };

        let _ = config.bind_socket()?;
        Ok(config)
    }

    pub fn bind_socket(&self) -> Result<SocketAddr, ConfigError> {
        format!("{}:{}", self.bind_addr, self.bind_port)
            .parse::<SocketAddr>()
            .map_err(|_| ConfigError::InvalidSocket)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    // Environment variables are process-global; keep every case in one test.
    #[test]
    fn parses_environment() {
        env::remove_var("BIND_ADDR");
        env::remove_var("BIND_PORT");
        env::remove_var("WIDGET_ASSETS_DIR");

        let config = Config::from_env().expect("defaults should parse");
        assert_eq!(config.bind_addr, "0.0.0.0");
        assert_eq!(config.bind_port, 8000);
        assert!(config.assets_dir.is_none());

        env::set_var("BIND_PORT", "not-a-port");
        let err = Config::from_env().expect_err("expected invalid port");
        assert!(matches!(err, ConfigError::InvalidPort));

        env::set_var("BIND_PORT", "9001");
        env::set_var("BIND_ADDR", "127.0.0.1");
        let config = Config::from_env().expect("explicit bind should parse");
        assert_eq!(
            config.bind_socket().expect("socket"),
            "127.0.0.1:9001".parse().expect("valid addr")
        );

        env::set_var("BIND_ADDR", "not an address");
        let err = Config::from_env().expect_err("expected invalid socket");
        assert!(matches!(err, ConfigError::InvalidSocket));
        env::remove_var("BIND_ADDR");

        env::set_var("WIDGET_ASSETS_DIR", "/definitely/not/here");
        let err = Config::from_env().expect_err("expected missing assets dir");
        assert!(matches!(err, ConfigError::MissingAssetsDir));

        env::remove_var("WIDGET_ASSETS_DIR");
        env::remove_var("BIND_PORT");
    }
}
