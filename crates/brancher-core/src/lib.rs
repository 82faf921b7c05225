pub mod config;
pub mod content;
pub mod error;
pub mod event;
pub mod git;
pub mod github;
mod http;
pub mod io;
pub mod jira;
pub mod naming;
pub mod projects;
pub mod release;
pub mod scripts;
pub mod settings;
pub mod tracker;
pub mod version;
pub mod workflow;

pub use error::{BrancherError, Result};
