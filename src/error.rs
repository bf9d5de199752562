//! Compile-time and configuration errors.
//!
//! Matching never fails. Everything that can go wrong happens while a pattern
//! is being compiled, and a failed compile leaves the published automaton
//! untouched.

use thiserror::Error;

/// A regular expression that could not be parsed.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{message} at offset {offset}")]
pub struct RegexpError {
    pub message: String,
    pub offset: usize,
}

impl RegexpError {
    pub(crate) fn new(message: impl Into<String>, offset: usize) -> Self {
        Self {
            message: message.into(),
            offset,
        }
    }
}

/// Errors raised while compiling a pattern into an automaton.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CompileError {
    /// Shell-style patterns allow at most one `*`.
    #[error("shell-style pattern has more than one '*'")]
    MultipleGlobs,

    /// Wildcard patterns may not contain `**`.
    #[error("wildcard pattern has adjacent '*' at offset {offset}")]
    AdjacentGlobs { offset: usize },

    /// A `\` with nothing after it.
    #[error("wildcard pattern ends with an unescaped '\\'")]
    TrailingEscape,

    /// Only `\*` and `\\` are valid wildcard escapes.
    #[error("invalid escape '\\{escaped}' at offset {offset}")]
    InvalidEscape { escaped: char, offset: usize },

    /// A rune range whose low end is above its high end.
    #[error("invalid rune range U+{lo:04X}-U+{hi:04X}")]
    InvalidRuneRange { lo: u32, hi: u32 },

    /// A regular expression feature this engine does not implement.
    #[error("unsupported regexp feature: {0}")]
    Unsupported(String),

    /// `*`, `+` or `{m,}` applied to something that can match nothing.
    #[error("quantified atom can match the empty string")]
    DegenerateClosure,

    /// A `{m,n}` bound above the configured maximum.
    #[error("quantifier bound {bound} exceeds the maximum of {max}")]
    QuantifierTooLarge { bound: u32, max: u32 },

    /// Nested repetitions that would unroll into too many copies.
    #[error("repetitions expand to {copies} copies, more than the maximum of {max}")]
    ExpansionTooLarge { copies: u64, max: u32 },

    /// The regular expression itself did not parse.
    #[error("regexp syntax error: {0}")]
    Regexp(#[from] RegexpError),

    /// Pattern values are matched as UTF-8.
    #[error("pattern value is not valid UTF-8")]
    InvalidUtf8,
}

/// Errors raised while loading an `EngineConfig`.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("config parse error: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("config error: {message}")]
    Invalid { message: String },
}

/// Result type for pattern compilation.
pub type Result<T> = std::result::Result<T, CompileError>;
