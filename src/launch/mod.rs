// src/launch/mod.rs

//! Config materializer: settings in, launch parameters out.
//!
//! - [`options`] maps individual settings to marker tokens.
//! - [`spec`] holds the resulting [`LaunchSpec`].
//! - [`artifact`] renders and persists the config file used by the
//!   config-file strategy.

pub mod artifact;
pub mod options;
pub mod spec;

use std::path::{Path, PathBuf};

use tracing::{debug, warn};

use crate::settings::{keys, user_config_dir, Settings};
use crate::types::LaunchStrategy;

pub use artifact::{persist, ConfigArtifact};
pub use options::{directives, Directive};
pub use spec::LaunchSpec;

/// Pass-through launcher that forces line-buffered stdout in the child.
pub const LINE_BUFFER_WRAPPER: [&str; 2] = ["stdbuf", "-oL"];

/// Environment variable through which the backend finds its config file.
pub const CONFIG_ENV_VAR: &str = "UXPLAYRC";

/// Output of one materialization.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Materialized {
    pub spec: LaunchSpec,
    /// Present only for [`LaunchStrategy::ConfigFile`]; must be persisted
    /// before spawning.
    pub artifact: Option<ConfigArtifact>,
}

/// Build the launch parameters for `settings` using `strategy`.
///
/// Pure apart from reading the clock for the artifact header.
pub fn materialize(
    settings: &Settings,
    strategy: LaunchStrategy,
    artifact_path: &Path,
) -> Materialized {
    let directives = options::directives(settings);
    let binary = settings.string(keys::BINARY).to_string();

    let mut argv: Vec<String> = Vec::new();
    if settings.boolean(keys::LINE_BUFFERING) {
        argv.extend(LINE_BUFFER_WRAPPER.iter().map(|s| s.to_string()));
    }
    argv.push(binary);

    let (env, artifact) = match strategy {
        LaunchStrategy::Arguments => {
            argv.extend(directives.iter().flat_map(Directive::to_args));
            (Vec::new(), None)
        }
        LaunchStrategy::ConfigFile => {
            let artifact = ConfigArtifact::render(artifact_path, &directives);
            let env = vec![(
                CONFIG_ENV_VAR.to_string(),
                artifact_path.display().to_string(),
            )];
            (env, Some(artifact))
        }
    };

    let mut argv = argv.into_iter();
    let program = argv.next().unwrap_or_default();
    let spec = LaunchSpec::new(program, argv.collect(), env);
    debug!(%strategy, %spec, "materialized launch spec");

    Materialized { spec, artifact }
}

/// [`materialize`] with strategy and artifact path taken from `settings`.
pub fn materialize_from_settings(settings: &Settings) -> Materialized {
    materialize(settings, strategy_of(settings), &artifact_path(settings))
}

/// Launch strategy named by the settings; unparsable values fall back to the
/// default.
pub fn strategy_of(settings: &Settings) -> LaunchStrategy {
    settings
        .string(keys::LAUNCH_STRATEGY)
        .parse()
        .unwrap_or_else(|err: String| {
            warn!(error = %err, "using default launch strategy");
            LaunchStrategy::default()
        })
}

/// `config-file-path` when set, else `<user config dir>/mirrorctl/uxplayrc`.
pub fn artifact_path(settings: &Settings) -> PathBuf {
    match settings.string(keys::CONFIG_FILE_PATH) {
        "" => user_config_dir().join("uxplayrc"),
        custom => PathBuf::from(custom),
    }
}
