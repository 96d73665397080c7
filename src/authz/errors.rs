use miette::Diagnostic;
use thiserror::Error;

#[derive(Debug, Error, Diagnostic)]
pub enum AuthzError {
    #[error("Failed to load policy file `{path}`")]
    #[diagnostic(
        code(fieldgate::authz::policy_load),
        help("Check that the file exists and contains valid KDL syntax")
    )]
    PolicyLoadError {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Invalid policy: {0}")]
    #[diagnostic(
        code(fieldgate::authz::invalid_policy),
        help("Each policy file must contain `grant` or `member` KDL nodes")
    )]
    InvalidPolicy(String),

    #[error("Invalid grant: {0}")]
    #[diagnostic(
        code(fieldgate::authz::invalid_grant),
        help("Grant syntax: grant \"field\" action=\"Query\" to=\"subject\"")
    )]
    InvalidGrant(String),

    #[error("Invalid membership: {0}")]
    #[diagnostic(
        code(fieldgate::authz::invalid_membership),
        help("Membership syntax: member \"identity\" of=\"group\"")
    )]
    InvalidMembership(String),

    #[error("Unknown action `{0}`")]
    #[diagnostic(
        code(fieldgate::authz::unknown_action),
        help("Actions are case-sensitive and must be either \"Query\" or \"Mutation\"")
    )]
    UnknownAction(String),

    #[error("KDL parse error: {0}")]
    #[diagnostic(
        code(fieldgate::authz::kdl_parse),
        help("Check your KDL file syntax — see https://kdl.dev for the specification")
    )]
    KdlParse(String),

    #[error("I/O error: {0}")]
    #[diagnostic(code(fieldgate::authz::io))]
    Io(#[from] std::io::Error),
}
