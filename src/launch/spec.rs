// src/launch/spec.rs

use std::fmt;

/// Everything needed to spawn the backend once.
///
/// Built fresh by the materializer on every start and never mutated
/// afterwards.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LaunchSpec {
    program: String,
    args: Vec<String>,
    env: Vec<(String, String)>,
}

impl LaunchSpec {
    pub fn new(program: impl Into<String>, args: Vec<String>, env: Vec<(String, String)>) -> Self {
        Self {
            program: program.into(),
            args,
            env,
        }
    }

    /// Executable to run (the line-buffering wrapper when enabled).
    pub fn program(&self) -> &str {
        &self.program
    }

    pub fn args(&self) -> &[String] {
        &self.args
    }

    /// Environment overrides applied on top of the inherited environment.
    pub fn env(&self) -> &[(String, String)] {
        &self.env
    }

    /// Full argument vector including the program.
    pub fn argv(&self) -> Vec<&str> {
        std::iter::once(self.program.as_str())
            .chain(self.args.iter().map(String::as_str))
            .collect()
    }

    /// Whether `token` (without the leading `-`) appears as an argument.
    pub fn has_flag(&self, token: &str) -> bool {
        self.args
            .iter()
            .any(|arg| arg.strip_prefix('-') == Some(token))
    }

    /// Value following `-token`, if present.
    pub fn flag_value(&self, token: &str) -> Option<&str> {
        let pos = self
            .args
            .iter()
            .position(|arg| arg.strip_prefix('-') == Some(token))?;
        self.args.get(pos + 1).map(String::as_str)
    }
}

fn quote(word: &str) -> String {
    if !word.is_empty()
        && word
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || "-_./=@:,+".contains(c))
    {
        word.to_string()
    } else {
        format!("'{}'", word.replace('\'', r"'\''"))
    }
}

impl fmt::Display for LaunchSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (key, value) in &self.env {
            write!(f, "{}={} ", key, quote(value))?;
        }
        let words: Vec<String> = self.argv().into_iter().map(quote).collect();
        f.write_str(&words.join(" "))
    }
}
