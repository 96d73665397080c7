use miette::Diagnostic;
use thiserror::Error;

use crate::authz::AuthzError;

#[derive(Debug, Error, Diagnostic)]
pub enum AppError {
    #[error("I/O error: {0}")]
    #[diagnostic(code(fieldgate::io))]
    Io(#[from] std::io::Error),

    #[error("Config error: {0}")]
    #[diagnostic(code(fieldgate::config))]
    Config(#[from] config::ConfigError),

    #[error(transparent)]
    #[diagnostic(transparent)]
    Authz(#[from] AuthzError),

    #[error("Invalid subject header `{0}`")]
    #[diagnostic(
        code(fieldgate::invalid_header),
        help("gate.subject_header must be a valid HTTP header name, e.g. X-Subject")
    )]
    InvalidHeader(String),

    #[error("Bad listen address: {0}")]
    #[diagnostic(code(fieldgate::addr))]
    Addr(String),
}
