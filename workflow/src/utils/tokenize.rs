//! Shell-like tokenizer for agent-issued shell commands.
//!
//! The coordinator needs to know whether a bash command *is* a particular
//! invocation (for example `br close <id>`), not merely whether it mentions
//! one. This module splits the leading simple command of a shell string into
//! words so callers can compare a prefix of words exactly.
//!
//! # Quoting Rules
//!
//! - Double quotes (`"`) group characters together
//! - Single quotes (`'`) group characters together
//! - Backslash (`\`) escapes the next character outside single quotes
//! - Unquoted words are terminated by whitespace
//! - An unquoted `;`, `&`, `|` or newline ends the leading command
//! - A word starting with `#` begins a comment and ends the command
//!
//! # Example
//!
//! ```
//! use beads_workflow::utils::tokenize::leading_words;
//!
//! assert_eq!(leading_words("br close bd-1"), vec!["br", "close", "bd-1"]);
//! assert_eq!(leading_words("git add . && git commit"), vec!["git", "add", "."]);
//! assert_eq!(leading_words("bash -lc 'br close x'"), vec!["bash", "-lc", "br close x"]);
//! assert!(leading_words("# git commit").is_empty());
//! ```

/// Splits the leading simple command of `command` into unquoted words.
///
/// Everything after the first unquoted command separator is ignored.
/// An unclosed quote consumes the rest of the input as one word.
#[must_use]
pub fn leading_words(command: &str) -> Vec<String> {
    let mut words = Vec::new();
    let mut current = String::new();
    let mut in_word = false;
    let mut chars = command.chars().peekable();

    while let Some(ch) = chars.next() {
        match ch {
            '\'' => {
                in_word = true;
                for inner in chars.by_ref() {
                    if inner == '\'' {
                        break;
                    }
                    current.push(inner);
                }
            }
            '"' => {
                in_word = true;
                while let Some(inner) = chars.next() {
                    match inner {
                        '"' => break,
                        '\\' => {
                            if let Some(&next) = chars.peek() {
                                if next == '"' || next == '\\' {
                                    current.push(next);
                                    chars.next();
                                    continue;
                                }
                            }
                            current.push(inner);
                        }
                        other => current.push(other),
                    }
                }
            }
            '\\' => {
                in_word = true;
                if let Some(next) = chars.next() {
                    current.push(next);
                }
            }
            '#' if !in_word => break,
            ';' | '&' | '|' | '\n' => break,
            c if c.is_whitespace() => {
                if in_word {
                    words.push(std::mem::take(&mut current));
                    in_word = false;
                }
            }
            other => {
                in_word = true;
                current.push(other);
            }
        }
    }

    if in_word {
        words.push(current);
    }

    words
}

/// Returns `true` if the leading command starts with exactly `prefix`.
///
/// ```
/// use beads_workflow::utils::tokenize::starts_with_words;
///
/// assert!(starts_with_words("  git commit -m 'x'", &["git", "commit"]));
/// assert!(!starts_with_words("echo git commit", &["git", "commit"]));
/// ```
#[must_use]
pub fn starts_with_words(command: &str, prefix: &[&str]) -> bool {
    let words = leading_words(command);
    words.len() >= prefix.len() && words.iter().zip(prefix).all(|(word, want)| word == want)
}
