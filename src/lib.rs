//! quamina-core: byte-level finite automata for value pattern matching
//!
//! Patterns (exact strings, prefixes, shell-style globs, wildcards,
//! case-insensitive literals, anything-but lists, rune ranges and a subset of
//! I-Regexp) compile into automata over UTF-8 bytes. Automata for many
//! patterns merge into one, which is determinized when that stays within
//! budget, so matching a value costs one walk no matter how many patterns
//! were added.
//!
//! ```
//! use quamina_core::{Pattern, ValueMatcher};
//!
//! let matcher = ValueMatcher::new();
//! matcher.add_pattern(&Pattern::ShellStyle(b"\"*.txt\"".to_vec()), "text").unwrap();
//! matcher.add_pattern(&Pattern::regexp("[a-z]+~.rs").unwrap(), "rust").unwrap();
//!
//! assert_eq!(matcher.matches(b"\"notes.txt\""), vec!["text"]);
//! assert_eq!(matcher.matches(b"\"main.rs\""), vec!["rust"]);
//! assert!(matcher.matches(b"\"Main.rs\"").is_empty());
//! ```

pub mod automaton;
pub mod config;
pub mod error;
pub mod regexp;

pub use automaton::{Automaton, Pattern, ValueMatcher};
pub use config::EngineConfig;
pub use error::{CompileError, ConfigError, RegexpError, Result};
