//! Launcher configuration parsed from environment variables.

use std::path::PathBuf;

pub const DEFAULT_BACKEND_DIR: &str = "backend";
pub const DEFAULT_FRONTEND_DIR: &str = "frontend";
pub const DEFAULT_BACKEND_PORT: u16 = 8000;
pub const DEFAULT_FRONTEND_PORT: u16 = 5173;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LauncherConfig {
    /// Directory holding the backend app (`main.py`).
    pub backend_dir: PathBuf,
    /// Directory holding the frontend package (`package.json`).
    pub frontend_dir: PathBuf,
    pub backend_port: u16,
    pub frontend_port: u16,
}

impl Default for LauncherConfig {
    fn default() -> Self {
        Self {
            backend_dir: PathBuf::from(DEFAULT_BACKEND_DIR),
            frontend_dir: PathBuf::from(DEFAULT_FRONTEND_DIR),
            backend_port: DEFAULT_BACKEND_PORT,
            frontend_port: DEFAULT_FRONTEND_PORT,
        }
    }
}

impl LauncherConfig {
    /// Build launcher config from environment variables.
    ///
    /// Optional:
    /// - `LITFLIX_BACKEND_DIR`: default `backend`
    /// - `LITFLIX_FRONTEND_DIR`: default `frontend`
    /// - `LITFLIX_BACKEND_PORT`: default 8000
    /// - `LITFLIX_FRONTEND_PORT`: default 5173
    #[must_use]
    pub fn from_env() -> Self {
        Self {
            backend_dir: env_path("LITFLIX_BACKEND_DIR", DEFAULT_BACKEND_DIR),
            frontend_dir: env_path("LITFLIX_FRONTEND_DIR", DEFAULT_FRONTEND_DIR),
            backend_port: env_port("LITFLIX_BACKEND_PORT", DEFAULT_BACKEND_PORT),
            frontend_port: env_port("LITFLIX_FRONTEND_PORT", DEFAULT_FRONTEND_PORT),
        }
    }

    #[must_use]
    pub fn backend_url(&self) -> String {
        format!("http://localhost:{}", self.backend_port)
    }

    #[must_use]
    pub fn frontend_url(&self) -> String {
        format!("http://localhost:{}", self.frontend_port)
    }
}

fn env_path(key: &str, default: &str) -> PathBuf {
    std::env::var(key)
        .ok()
        .filter(|v| !v.trim().is_empty())
        .map_or_else(|| PathBuf::from(default), PathBuf::from)
}

fn env_port(key: &str, default: u16) -> u16 {
    std::env::var(key)
        .ok()
        .and_then(|v| v.trim().parse::<u16>().ok())
        .filter(|p| *p != 0)
        .unwrap_or(default)
}

#[cfg(test)]
#[path = "config_test.rs"]
mod tests;
