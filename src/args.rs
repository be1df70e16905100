//! Flag schema and argument values shared by every component build entry point
//!
//! Flags are keyed by their underscore spelling (`skip_path`); on the command line
//! they are written with dashes (`--skip-path`). Both spellings are accepted when
//! parsing.

use crate::error::{BuildError, Result};
use clap::parser::ValueSource;
use clap::{Arg, ArgAction, ArgMatches, Command};
use std::fmt;

pub const FLAG_MAKE: &str = "make";
pub const FLAG_TEST: &str = "test";
pub const FLAG_CHECK: &str = "check";
pub const FLAG_RELEASE: &str = "release";
pub const FLAG_RUN: &str = "run";
pub const FLAG_VERSION: &str = "version";
pub const FLAG_FORCE: &str = "force";
pub const FLAG_SKIP_PATH: &str = "skip_path";
pub const FLAG_TEST_MARKER: &str = "test_marker";
pub const FLAG_SANITIZED: &str = "_sanitized";

/// Test marker selecting slow tests
pub const TEST_MARKER_SLOW: &str = "slow";

/// Normalize a flag name to its key spelling: dashes become underscores
pub fn flag_key(name: &str) -> String {
    name.trim().trim_start_matches("--").replace('-', "_")
}

/// Command-line spelling of a key: underscores become dashes, leading underscores stay
pub fn flag_name(key: &str) -> String {
    let body = key.trim_start_matches('_');
    let leading = &key[..key.len() - body.len()];
    format!("{}{}", leading, body.replace('_', "-"))
}

fn is_truthy(value: &str) -> bool {
    matches!(
        value.trim().to_ascii_lowercase().as_str(),
        "true" | "1" | "yes" | "on"
    )
}

/// How a flag takes values
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FlagKind {
    /// Presence flag (`--make`)
    Switch,
    /// Single string value (`--version=1.0.0`)
    Value,
    /// Repeatable string value (`--skip-path=a --skip-path=b`)
    List,
}

/// A recognized command-line flag
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FlagSpec {
    pub key: String,
    pub kind: FlagKind,
    pub help: String,
    pub default: Option<String>,
    pub hidden: bool,
}

impl FlagSpec {
    fn new(name: &str, kind: FlagKind, help: &str) -> Self {
        FlagSpec {
            key: flag_key(name),
            kind,
            help: help.to_string(),
            default: None,
            hidden: false,
        }
    }

    pub fn switch(name: &str, help: &str) -> Self {
        Self::new(name, FlagKind::Switch, help)
    }

    pub fn value(name: &str, help: &str) -> Self {
        Self::new(name, FlagKind::Value, help)
    }

    pub fn list(name: &str, help: &str) -> Self {
        Self::new(name, FlagKind::List, help)
    }

    /// Default for a value flag when neither the command line nor the environment sets it
    pub fn with_default(mut self, default: impl Into<String>) -> Self {
        self.default = Some(default.into());
        self
    }

    pub fn hidden(mut self) -> Self {
        self.hidden = true;
        self
    }

    /// Flag spelling on the command line, without the leading `--`
    pub fn long(&self) -> String {
        flag_name(&self.key)
    }

    /// Environment variable that may provide this flag's value
    pub fn env_var(&self) -> String {
        self.key.to_uppercase()
    }

    fn to_arg(&self) -> Arg {
        let arg = Arg::new(self.key.clone())
            .long(self.long())
            .help(self.help.clone())
            .hide(self.hidden);

        match self.kind {
            FlagKind::Switch => arg.action(ArgAction::SetTrue),
            FlagKind::Value => {
                let arg = arg.action(ArgAction::Set).num_args(1);
                match &self.default {
                    Some(default) => arg.default_value(default.clone()),
                    None => arg,
                }
            }
            FlagKind::List => arg.action(ArgAction::Append).num_args(1),
        }
    }
}

/// Value of a single flag
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ArgValue {
    Bool(bool),
    Str(String),
    List(Vec<String>),
}

impl fmt::Display for ArgValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ArgValue::Bool(b) => write!(f, "{}", b),
            ArgValue::Str(s) => write!(f, "{:?}", s),
            ArgValue::List(items) => write!(f, "{:?}", items),
        }
    }
}

/// Ordered mapping from flag key to value.
///
/// Equality compares the mapping and ignores the order of the entries.
#[derive(Debug, Clone, Default)]
pub struct ArgumentSet {
    entries: Vec<(String, ArgValue)>,
}

impl PartialEq for ArgumentSet {
    fn eq(&self, other: &Self) -> bool {
        self.len() == other.len()
            && self
                .iter()
                .all(|(key, value)| other.get(key) == Some(value))
    }
}

impl Eq for ArgumentSet {}

impl ArgumentSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, key: &str) -> Option<&ArgValue> {
        let key = flag_key(key);
        self.entries
            .iter()
            .find(|(k, _)| *k == key)
            .map(|(_, value)| value)
    }

    pub fn contains_key(&self, key: &str) -> bool {
        self.get(key).is_some()
    }

    /// Boolean value of a switch; absent or non-boolean values are `false`
    pub fn flag(&self, key: &str) -> bool {
        matches!(self.get(key), Some(ArgValue::Bool(true)))
    }

    /// String value of a flag, if set
    pub fn value(&self, key: &str) -> Option<&str> {
        match self.get(key) {
            Some(ArgValue::Str(s)) => Some(s.as_str()),
            _ => None,
        }
    }

    /// List value of a repeatable flag; empty when absent
    pub fn list(&self, key: &str) -> &[String] {
        match self.get(key) {
            Some(ArgValue::List(items)) => items,
            _ => &[],
        }
    }

    /// Set `key`, keeping its position if it already exists
    pub fn insert(&mut self, key: &str, value: ArgValue) {
        let key = flag_key(key);
        match self.entries.iter_mut().find(|(k, _)| *k == key) {
            Some(entry) => entry.1 = value,
            None => self.entries.push((key, value)),
        }
    }

    /// Builder-style [`insert`](Self::insert)
    pub fn with(mut self, key: &str, value: ArgValue) -> Self {
        self.insert(key, value);
        self
    }

    pub fn remove(&mut self, key: &str) -> Option<ArgValue> {
        let key = flag_key(key);
        let index = self.entries.iter().position(|(k, _)| *k == key)?;
        Some(self.entries.remove(index).1)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &ArgValue)> {
        self.entries.iter().map(|(k, v)| (k.as_str(), v))
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl FromIterator<(String, ArgValue)> for ArgumentSet {
    fn from_iter<I: IntoIterator<Item = (String, ArgValue)>>(iter: I) -> Self {
        let mut set = ArgumentSet::new();
        for (key, value) in iter {
            set.insert(&key, value);
        }
        set
    }
}

impl fmt::Display for ArgumentSet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{{")?;
        for (i, (key, value)) in self.iter().enumerate() {
            if i > 0 {
                write!(f, ", ")?;
            }
            write!(f, "{}: {}", key, value)?;
        }
        write!(f, "}}")
    }
}

/// Result of parsing raw command-line tokens
#[derive(Debug, Clone, Default)]
pub struct ParsedArgs {
    pub args: ArgumentSet,
    /// Keys set explicitly on the command line
    pub explicit: Vec<String>,
    /// Tokens not recognized by the schema
    pub ignored: Vec<String>,
}

impl ParsedArgs {
    pub fn is_explicit(&self, key: &str) -> bool {
        let key = flag_key(key);
        self.explicit.iter().any(|k| *k == key)
    }
}

/// The set of flags a build entry point recognizes
#[derive(Debug, Clone)]
pub struct Schema {
    flags: Vec<FlagSpec>,
}

impl Default for Schema {
    fn default() -> Self {
        Self::base()
    }
}

impl Schema {
    /// Flags every component build entry point understands
    pub fn base() -> Self {
        Schema {
            flags: vec![
                FlagSpec::switch(FLAG_MAKE, "Make/compile/package all artifacts"),
                FlagSpec::switch(FLAG_TEST, "Run unit and integration tests"),
                FlagSpec::switch(FLAG_CHECK, "Run linting and style checks"),
                FlagSpec::switch(
                    FLAG_RELEASE,
                    "Release all artifacts (e.g. to registries like DockerHub or NPM)",
                ),
                FlagSpec::switch(
                    FLAG_RUN,
                    "Run the component in development mode (e.g. dev server)",
                ),
                FlagSpec::value(FLAG_VERSION, "Version of the build (MAJOR.MINOR.PATCH-TAG)"),
                FlagSpec::switch(FLAG_FORCE, "Ignore all enforcements and warnings"),
                FlagSpec::list(
                    FLAG_SKIP_PATH,
                    "Skips the build phases for all (sub)paths provided here",
                ),
                FlagSpec::list(
                    FLAG_TEST_MARKER,
                    "Custom markers for testing. The default marker for slow tests is `slow`",
                ),
                FlagSpec::switch(
                    FLAG_SANITIZED,
                    "Set by a parent build when the arguments were already validated",
                )
                .hidden(),
            ],
        }
    }

    /// Add component-specific flags. A flag whose key is already known replaces it.
    pub fn extend<I: IntoIterator<Item = FlagSpec>>(mut self, flags: I) -> Self {
        for flag in flags {
            match self.flags.iter_mut().find(|f| f.key == flag.key) {
                Some(existing) => *existing = flag,
                None => self.flags.push(flag),
            }
        }
        self
    }

    pub fn flags(&self) -> &[FlagSpec] {
        &self.flags
    }

    pub fn get(&self, key: &str) -> Option<&FlagSpec> {
        let key = flag_key(key);
        self.flags.iter().find(|f| f.key == key)
    }

    fn command(&self) -> Command {
        Command::new("build")
            .no_binary_name(true)
            .disable_help_flag(true)
            .disable_version_flag(true)
            .args_override_self(true)
            .args(self.flags.iter().map(FlagSpec::to_arg))
    }

    /// Bring recognized tokens into canonical `--long[=value]` form; everything else is ignored.
    fn canonical_tokens<I, S>(&self, tokens: I) -> (Vec<String>, Vec<String>)
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let tokens: Vec<String> = tokens.into_iter().map(|t| t.as_ref().to_string()).collect();
        let mut canonical = Vec::new();
        let mut ignored = Vec::new();

        let mut iter = tokens.into_iter().peekable();
        while let Some(token) = iter.next() {
            let Some(body) = token.strip_prefix("--").filter(|b| !b.is_empty()) else {
                ignored.push(token);
                continue;
            };

            let (name, inline_value) = match body.split_once('=') {
                Some((name, value)) => (name, Some(value.to_string())),
                None => (body, None),
            };

            let Some(spec) = self.get(name) else {
                ignored.push(token);
                continue;
            };

            match (spec.kind, inline_value) {
                (FlagKind::Switch, None) => canonical.push(format!("--{}", spec.long())),
                (FlagKind::Switch, Some(value)) => {
                    if is_truthy(&value) {
                        canonical.push(format!("--{}", spec.long()));
                    }
                }
                (_, Some(value)) => canonical.push(format!("--{}={}", spec.long(), value)),
                (_, None) => match iter.next_if(|next| !next.starts_with("--")) {
                    Some(value) => canonical.push(format!("--{}={}", spec.long(), value)),
                    // Missing value; clap reports it
                    None => canonical.push(format!("--{}", spec.long())),
                },
            }
        }

        (canonical, ignored)
    }

    /// Parse raw tokens (without the program name).
    ///
    /// Every switch is present in the result (`false` when not given), every list
    /// flag is present (possibly empty) and value flags are present when given or
    /// defaulted.
    pub fn parse<I, S>(&self, tokens: I) -> Result<ParsedArgs>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let (canonical, ignored) = self.canonical_tokens(tokens);
        let matches = self
            .command()
            .try_get_matches_from(canonical)
            .map_err(|e| BuildError::arguments(e.to_string().trim().to_string()))?;

        Ok(self.collect(&matches, ignored))
    }

    fn collect(&self, matches: &ArgMatches, ignored: Vec<String>) -> ParsedArgs {
        let mut args = ArgumentSet::new();
        let mut explicit = Vec::new();

        for spec in &self.flags {
            let key = spec.key.as_str();
            if matches.value_source(key) == Some(ValueSource::CommandLine) {
                explicit.push(spec.key.clone());
            }

            match spec.kind {
                FlagKind::Switch => args.insert(key, ArgValue::Bool(matches.get_flag(key))),
                FlagKind::Value => {
                    if let Some(value) = matches.get_one::<String>(key) {
                        args.insert(key, ArgValue::Str(value.clone()));
                    }
                }
                FlagKind::List => {
                    let items = matches
                        .get_many::<String>(key)
                        .map(|values| values.cloned().collect())
                        .unwrap_or_default();
                    args.insert(key, ArgValue::List(items));
                }
            }
        }

        ParsedArgs {
            args,
            explicit,
            ignored,
        }
    }
}
