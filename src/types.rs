use std::fmt;
use std::str::FromStr;

/// Lifecycle state of the supervised backend process.
///
/// Exactly one state holds at a time. `Unavailable` is entered only at
/// construction (backend binary missing from `PATH`) and never left.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RunState {
    Stopped,
    Starting,
    Running,
    Stopping,
    Unavailable,
}

impl RunState {
    /// Whether a live process handle can exist in this state.
    pub fn has_process(self) -> bool {
        matches!(self, RunState::Running | RunState::Stopping)
    }
}

impl fmt::Display for RunState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            RunState::Stopped => "Stopped",
            RunState::Starting => "Starting",
            RunState::Running => "Running",
            RunState::Stopping => "Stopping",
            RunState::Unavailable => "Unavailable",
        };
        f.write_str(s)
    }
}

/// Which output channel of the child a line came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StreamSource {
    Stdout,
    Stderr,
}

impl StreamSource {
    /// Tag used in rendered log lines.
    pub fn label(self) -> &'static str {
        match self {
            StreamSource::Stdout => "STDOUT",
            StreamSource::Stderr => "STDERR",
        }
    }
}

impl fmt::Display for StreamSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StreamSource::Stdout => f.write_str("stdout"),
            StreamSource::Stderr => f.write_str("stderr"),
        }
    }
}

/// How the generated configuration reaches the backend.
///
/// - `Arguments`: every option becomes command-line tokens (default).
/// - `ConfigFile`: options are rendered into a config file whose path is
///   passed through an environment variable; the argument vector only names
///   the binary.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LaunchStrategy {
    Arguments,
    ConfigFile,
}

impl Default for LaunchStrategy {
    fn default() -> Self {
        LaunchStrategy::Arguments
    }
}

impl FromStr for LaunchStrategy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "arguments" | "args" => Ok(LaunchStrategy::Arguments),
            "config-file" | "config_file" => Ok(LaunchStrategy::ConfigFile),
            other => Err(format!(
                "invalid launch-strategy: {other} (expected \"arguments\" or \"config-file\")"
            )),
        }
    }
}

impl fmt::Display for LaunchStrategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LaunchStrategy::Arguments => f.write_str("arguments"),
            LaunchStrategy::ConfigFile => f.write_str("config-file"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn launch_strategy_parses_aliases() {
        assert_eq!("arguments".parse(), Ok(LaunchStrategy::Arguments));
        assert_eq!(" Config-File ".parse(), Ok(LaunchStrategy::ConfigFile));
        assert!("env".parse::<LaunchStrategy>().is_err());
    }

    #[test]
    fn only_running_and_stopping_hold_a_process() {
        assert!(RunState::Running.has_process());
        assert!(RunState::Stopping.has_process());
        assert!(!RunState::Starting.has_process());
        assert!(!RunState::Unavailable.has_process());
    }
}
