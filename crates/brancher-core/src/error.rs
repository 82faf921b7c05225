use thiserror::Error;

#[derive(Debug, Error)]
pub enum BrancherError {
    #[error("validation failed: {0}")]
    Validation(String),

    #[error("invalid version format '{0}': expected a leading major number")]
    InvalidVersionFormat(String),

    #[error("malformed settings document: {0}")]
    SettingsFormat(String),

    #[error("release history too short: need {required} snapshots, found {found}")]
    InsufficientHistory { required: usize, found: usize },

    #[error("malformed workflow template: {0}")]
    MalformedWorkflow(String),

    #[error("git executable not found on PATH")]
    GitNotFound,

    #[error("`{command}` failed: {stderr}")]
    GitCommand { command: String, stderr: String },

    #[error("{operation} failed with status {status}: {body}")]
    Http {
        operation: String,
        status: u16,
        body: String,
    },

    #[error("invalid configuration: {0}")]
    Config(String),

    #[error(transparent)]
    Transport(#[from] reqwest::Error),

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Yaml(#[from] serde_yaml::Error),

    #[error(transparent)]
    Json(#[from] serde_json::Error),
}

pub type Result<T> = std::result::Result<T, BrancherError>;
