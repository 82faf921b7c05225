use crate::error::Result;
use std::path::Path;

pub const RELEASE_VERSION_TOKEN: &str = "{{RELEASE_VERSION}}";

/// Replace every `{{RELEASE_VERSION}}` in `template` with `release_version`.
pub fn adapt_content(template: &str, release_version: &str) -> String {
    template.replace(RELEASE_VERSION_TOKEN, release_version)
}

pub fn adapt_content_file(
    workspace: &Path,
    content_path: &str,
    release_version: &str,
) -> Result<String> {
    let data = std::fs::read_to_string(workspace.join(content_path))?;
    Ok(adapt_content(&data, release_version))
}
