use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::errors::AppError;
use crate::gate::{DEFAULT_MAX_BODY_BYTES, DEFAULT_SUBJECT_HEADER};

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct Settings {
    pub server: Server,
    pub gate: Gate,
    pub authz: Authz,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Server {
    pub host: String,
    pub port: u16,
    /// Directory served for every path other than `/graphql`
    pub static_dir: PathBuf,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Gate {
    /// Request header carrying the caller identity asserted upstream
    pub subject_header: String,
    /// Largest request body the gate will buffer
    pub max_body_bytes: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Authz {
    /// Directory holding `.kdl` policy files
    pub policies_dir: PathBuf,
    /// Serve the policy check API on a separate listener
    #[serde(default)]
    pub api_enabled: bool,
    /// Policy check API port (defaults to server port + 1)
    pub api_port: Option<u16>,
}

impl Default for Server {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 8080,
            static_dir: PathBuf::from("static"),
        }
    }
}

impl Default for Gate {
    fn default() -> Self {
        Self {
            subject_header: DEFAULT_SUBJECT_HEADER.to_string(),
            max_body_bytes: DEFAULT_MAX_BODY_BYTES,
        }
    }
}

impl Default for Authz {
    fn default() -> Self {
        Self {
            policies_dir: PathBuf::from("policies"),
            api_enabled: false,
            api_port: None,
        }
    }
}

impl Settings {
    pub fn load(path: &str) -> Result<Self, AppError> {
        // Environment overrides: FIELDGATE__SERVER__PORT=9090, etc.
        Self::load_with_env(
            path,
            config::Environment::with_prefix("FIELDGATE").separator("__"),
        )
    }

    fn load_with_env(path: &str, env: config::Environment) -> Result<Self, AppError> {
        let mut builder = config::Config::builder()
            .set_default("server.host", Server::default().host)?
            .set_default("server.port", Server::default().port)?
            .set_default(
                "server.static_dir",
                Server::default().static_dir.to_string_lossy().to_string(),
            )?
            .set_default("gate.subject_header", Gate::default().subject_header)?
            .set_default("gate.max_body_bytes", Gate::default().max_body_bytes as u64)?
            .set_default(
                "authz.policies_dir",
                Authz::default().policies_dir.to_string_lossy().to_string(),
            )?
            .set_default("authz.api_enabled", false)?;

        // Optional file
        if Path::new(path).exists() {
            builder = builder.add_source(config::File::with_name(path));
        }

        builder = builder.add_source(env);

        let cfg = builder.build()?;
        let mut s: Settings = cfg.try_deserialize()?;

        // Normalize directories to be relative to current dir
        if s.server.static_dir.is_relative() {
            s.server.static_dir = std::env::current_dir()?.join(&s.server.static_dir);
        }
        if s.authz.policies_dir.is_relative() {
            s.authz.policies_dir = std::env::current_dir()?.join(&s.authz.policies_dir);
        }

        Ok(s)
    }

    pub fn api_port(&self) -> Result<u16, AppError> {
        match self.authz.api_port {
            Some(port) => Ok(port),
            None => self.server.port.checked_add(1).ok_or_else(|| {
                AppError::Addr(format!(
                    "no port above {} for the policy check API; set authz.api_port",
                    self.server.port
                ))
            }),
        }
    }
}
