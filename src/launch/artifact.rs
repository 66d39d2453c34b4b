// src/launch/artifact.rs

use std::path::PathBuf;

use chrono::Local;
use tracing::{debug, warn};

use crate::fs::FileSystem;
use crate::launch::options::Directive;
use crate::sink::entry::TIMESTAMP_FORMAT;

/// Rendered config file for the config-file launch strategy.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConfigArtifact {
    pub path: PathBuf,
    pub contents: String,
}

impl ConfigArtifact {
    /// Render `directives` one per line under a comment header.
    ///
    /// The first header line carries the generation time; it is the only
    /// part of the output that varies between identical inputs.
    pub fn render(path: impl Into<PathBuf>, directives: &[Directive]) -> Self {
        let mut contents = format!(
            "# generated by mirrorctl at {}\n# rewritten on every start; edits are lost\n",
            Local::now().format(TIMESTAMP_FORMAT)
        );
        for directive in directives {
            contents.push_str(&directive.to_line());
            contents.push('\n');
        }
        Self {
            path: path.into(),
            contents,
        }
    }

    /// Non-comment lines, in file order.
    pub fn directive_lines(&self) -> impl Iterator<Item = &str> {
        self.contents
            .lines()
            .filter(|line| !line.trim_start().starts_with('#') && !line.trim().is_empty())
    }
}

/// Write the artifact, replacing any previous file.
///
/// Returns `false` instead of an error so the caller can decide whether a
/// stale config is acceptable.
pub fn persist(fs: &dyn FileSystem, artifact: &ConfigArtifact) -> bool {
    match fs.write(&artifact.path, artifact.contents.as_bytes()) {
        Ok(()) => {
            debug!(path = %artifact.path.display(), "wrote backend config");
            true
        }
        Err(err) => {
            warn!(path = %artifact.path.display(), error = %err, "failed to write backend config");
            false
        }
    }
}
