// src/core/parser.rs

//! Turns one input line into a [`Pipeline`].
//!
//! Grammar, in order of application:
//! - the line is split on every `|` (there is no way to escape it);
//! - each stage is tokenized on whitespace outside `"..."` spans;
//! - unquoted `<` / `>` tokens (standalone or attached, `>out.txt`) are pulled out
//!   as redirects; quoted ones stay ordinary arguments;
//! - arguments and redirect targets starting with `$` are replaced by environment values.

use std::fmt;

use thiserror::Error;

use crate::core::interpolator;
use crate::models::{Pipeline, Redirects, Stage, StageKind};

/// Which side of a stage a redirect overrides.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RedirectKind {
    Input,
    Output,
}

impl RedirectKind {
    fn operator(self) -> char {
        match self {
            Self::Input => '<',
            Self::Output => '>',
        }
    }
}

impl fmt::Display for RedirectKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Input => f.write_str("input"),
            Self::Output => f.write_str("output"),
        }
    }
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ParseError {
    #[error("unterminated quote in '{0}'")]
    UnterminatedQuote(String),
    #[error("can't set multiple {0} redirects")]
    DuplicateRedirect(RedirectKind),
    #[error("'{operator}' must be followed by a file name")]
    MissingRedirectTarget { operator: char },
    #[error("unsupported redirect operator in '{0}'")]
    UnsupportedRedirect(String),
    #[error("empty command in pipeline")]
    EmptyStage,
}

/// One word of a stage. `quoted` is set when any part of it came from a `"..."` span.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Token {
    pub text: String,
    pub quoted: bool,
}

impl Token {
    fn new(text: String, quoted: bool) -> Self {
        Self { text, quoted }
    }

    /// The redirect this token opens, if it is an unquoted `<...` or `>...`.
    fn redirect_kind(&self) -> Option<RedirectKind> {
        if self.quoted {
            return None;
        }
        match self.text.chars().next() {
            Some('<') => Some(RedirectKind::Input),
            Some('>') => Some(RedirectKind::Output),
            _ => None,
        }
    }
}

/// Splits a line into trimmed stage strings on every `|`.
pub fn split_pipeline(line: &str) -> Vec<&str> {
    line.split('|').map(str::trim).collect()
}

/// True when any stage of the line is exactly `exit`.
pub fn contains_exit(line: &str) -> bool {
    split_pipeline(line)
        .iter()
        .any(|stage| *stage == crate::constants::EXIT_STAGE)
}

/// Splits a stage string into tokens.
///
/// A `"` toggles quoted mode and is itself dropped; whitespace inside quotes is
/// kept literally. Runs of unquoted whitespace separate tokens and never produce
/// empty tokens. There is no escape for a literal `"`.
pub fn tokenize(stage: &str) -> Result<Vec<Token>, ParseError> {
    let mut tokens = Vec::new();
    let mut current = String::new();
    let mut quoted = false;
    let mut in_quotes = false;

    for ch in stage.chars() {
        if ch == '"' {
            if in_quotes {
                // The closing quote also ends the token.
                if !current.is_empty() {
                    tokens.push(Token::new(std::mem::take(&mut current), true));
                }
                quoted = false;
            } else {
                quoted = true;
            }
            in_quotes = !in_quotes;
        } else if ch.is_whitespace() && !in_quotes {
            if !current.is_empty() {
                tokens.push(Token::new(std::mem::take(&mut current), quoted));
            }
            quoted = false;
        } else {
            current.push(ch);
        }
    }

    if in_quotes {
        return Err(ParseError::UnterminatedQuote(stage.to_string()));
    }
    if !current.is_empty() {
        tokens.push(Token::new(current, quoted));
    }
    Ok(tokens)
}

/// Removes redirect operators and their targets from `tokens`.
///
/// Returns the remaining arguments and the redirects found. Only unquoted
/// tokens are operators. Each direction may appear at most once per stage, and
/// doubled operators such as `>>` are rejected.
pub fn extract_redirects(tokens: Vec<Token>) -> Result<(Vec<String>, Redirects), ParseError> {
    let mut args = Vec::with_capacity(tokens.len());
    let mut redirects = Redirects::default();
    let mut tokens = tokens.into_iter();

    while let Some(token) = tokens.next() {
        let Some(kind) = token.redirect_kind() else {
            args.push(token.text);
            continue;
        };

        let attached = token.text.get(1..).unwrap_or_default();
        if attached.starts_with(['<', '>']) {
            return Err(ParseError::UnsupportedRedirect(token.text));
        }

        let target = if attached.is_empty() {
            match tokens.next() {
                Some(next) if next.redirect_kind().is_none() => next.text,
                _ => {
                    return Err(ParseError::MissingRedirectTarget {
                        operator: kind.operator(),
                    });
                }
            }
        } else {
            attached.to_string()
        };

        let slot = match kind {
            RedirectKind::Input => &mut redirects.input,
            RedirectKind::Output => &mut redirects.output,
        };
        if slot.is_some() {
            return Err(ParseError::DuplicateRedirect(kind));
        }
        *slot = Some(target);
    }

    Ok((args, redirects))
}

/// Parses one stage string, substituting `$NAME` tokens through `lookup`.
pub fn parse_stage<F>(stage: &str, lookup: &F) -> Result<Stage, ParseError>
where
    F: Fn(&str) -> Option<String>,
{
    let tokens = tokenize(stage)?;
    let (mut words, redirects) = extract_redirects(tokens)?;
    if words.is_empty() {
        return Err(ParseError::EmptyStage);
    }

    let name = words.remove(0);
    let args = interpolator::substitute_env(words, lookup);
    let redirects = Redirects {
        input: redirects.input.map(|t| interpolator::substitute_token(t, lookup)),
        output: redirects.output.map(|t| interpolator::substitute_token(t, lookup)),
    };

    Ok(Stage {
        kind: StageKind::resolve(&name),
        name,
        args,
        redirects,
    })
}

/// Parses a full line into a pipeline.
pub fn parse_pipeline<F>(line: &str, lookup: &F) -> Result<Pipeline, ParseError>
where
    F: Fn(&str) -> Option<String>,
{
    let stages = split_pipeline(line)
        .into_iter()
        .map(|stage| parse_stage(stage, lookup))
        .collect::<Result<Vec<_>, _>>()?;
    Ok(Pipeline { stages })
}

// MARK: --- UNIT TESTS ---

#[cfg(test)]
mod tests {
    use super::*;
    use crate::builtins::Builtin;

    fn no_env(_: &str) -> Option<String> {
        None
    }

    fn strings(items: &[&str]) -> Vec<String> {
        items.iter().map(|s| s.to_string()).collect()
    }

    fn texts(tokens: &[Token]) -> Vec<String> {
        tokens.iter().map(|t| t.text.clone()).collect()
    }

    fn unquoted(items: &[&str]) -> Vec<Token> {
        items.iter().map(|s| Token::new(s.to_string(), false)).collect()
    }

    // --- `tokenize` Tests ---
    #[test]
    fn test_tokenize_quoted_space() {
        let tokens = tokenize("cut -d \" \" -f1").unwrap();
        assert_eq!(texts(&tokens), strings(&["cut", "-d", " ", "-f1"]));
        assert_eq!(
            tokens.iter().map(|t| t.quoted).collect::<Vec<_>>(),
            vec![false, false, true, false]
        );
    }

    #[test]
    fn test_tokenize_collapses_whitespace() {
        let tokens = tokenize("  echo   a\t b  ").unwrap();
        assert_eq!(texts(&tokens), strings(&["echo", "a", "b"]));
    }

    #[test]
    fn test_tokenize_quote_glued_to_word() {
        let tokens = tokenize("echo sss\"home1 ohome2\" \"home3\"").unwrap();
        assert_eq!(texts(&tokens), strings(&["echo", "ssshome1 ohome2", "home3"]));
    }

    #[test]
    fn test_tokenize_unterminated_quote() {
        let result = tokenize("echo \"open");
        assert_eq!(result, Err(ParseError::UnterminatedQuote("echo \"open".to_string())));
    }

    // --- `split_pipeline` Tests ---
    #[test]
    fn test_split_pipeline_trims_stages() {
        assert_eq!(split_pipeline("ps | grep x |wc -l"), vec!["ps", "grep x", "wc -l"]);
    }

    #[test]
    fn test_contains_exit_anywhere() {
        assert!(contains_exit("echo a | exit"));
        assert!(contains_exit(" exit "));
        assert!(!contains_exit("echo exit"));
    }

    // --- `extract_redirects` Tests ---
    #[test]
    fn test_extract_standalone_redirects() {
        let (args, redirects) =
            extract_redirects(unquoted(&["sort", "<", "in.txt", "-r", ">", "out.txt"])).unwrap();
        assert_eq!(args, strings(&["sort", "-r"]));
        assert_eq!(redirects.input.as_deref(), Some("in.txt"));
        assert_eq!(redirects.output.as_deref(), Some("out.txt"));
    }

    #[test]
    fn test_extract_attached_redirect() {
        let (args, redirects) = extract_redirects(unquoted(&["cat", "<notes.md"])).unwrap();
        assert_eq!(args, strings(&["cat"]));
        assert_eq!(redirects.input.as_deref(), Some("notes.md"));
    }

    #[test]
    fn test_duplicate_output_redirect_fails() {
        let result = extract_redirects(unquoted(&["ls", ">", "a", ">", "b"]));
        assert_eq!(result, Err(ParseError::DuplicateRedirect(RedirectKind::Output)));
    }

    #[test]
    fn test_redirect_without_target_fails() {
        let result = extract_redirects(unquoted(&["ls", ">"]));
        assert_eq!(result, Err(ParseError::MissingRedirectTarget { operator: '>' }));

        let result = extract_redirects(unquoted(&["cat", ">", "<"]));
        assert_eq!(result, Err(ParseError::MissingRedirectTarget { operator: '>' }));
    }

    #[test]
    fn test_quoted_operators_stay_arguments() {
        let (args, redirects) = extract_redirects(tokenize("echo \"<b>\"").unwrap()).unwrap();
        assert_eq!(args, strings(&["echo", "<b>"]));
        assert_eq!(redirects, Redirects::default());

        let (args, redirects) =
            extract_redirects(tokenize("grep \">\" file.txt").unwrap()).unwrap();
        assert_eq!(args, strings(&["grep", ">", "file.txt"]));
        assert_eq!(redirects, Redirects::default());
    }

    #[test]
    fn test_quoted_redirect_target_is_accepted() {
        let (args, redirects) =
            extract_redirects(tokenize("sort > \"my file.txt\"").unwrap()).unwrap();
        assert_eq!(args, strings(&["sort"]));
        assert_eq!(redirects.output.as_deref(), Some("my file.txt"));
    }

    #[test]
    fn test_append_operator_is_rejected() {
        let result = extract_redirects(unquoted(&["ls", ">>", "log.txt"]));
        assert_eq!(result, Err(ParseError::UnsupportedRedirect(">>".to_string())));

        let result = extract_redirects(unquoted(&["ls", ">>log.txt"]));
        assert_eq!(result, Err(ParseError::UnsupportedRedirect(">>log.txt".to_string())));
    }

    // --- `parse_pipeline` Tests ---
    #[test]
    fn test_parse_pipeline_resolves_kinds() {
        let pipeline = parse_pipeline("echo hello | wc -c", &no_env).unwrap();
        assert_eq!(pipeline.len(), 2);
        assert_eq!(pipeline.stages[0].kind, StageKind::Builtin(Builtin::Echo));
        assert_eq!(
            pipeline.stages[1].kind,
            StageKind::External {
                program: "wc".to_string()
            }
        );
        assert_eq!(pipeline.stages[1].args, strings(&["-c"]));
    }

    #[test]
    fn test_parse_pipeline_substitutes_env() {
        let lookup = |name: &str| (name == "OS").then(|| "Windows_NT".to_string());
        let pipeline = parse_pipeline("echo $OS $MISSING", &lookup).unwrap();
        assert_eq!(pipeline.stages[0].args, strings(&["Windows_NT", ""]));
    }

    #[test]
    fn test_parse_pipeline_substitutes_redirect_target() {
        let lookup = |name: &str| (name == "OUT").then(|| "/tmp/result.txt".to_string());
        let pipeline = parse_pipeline("ps > $OUT", &lookup).unwrap();
        assert_eq!(
            pipeline.stages[0].redirects.output.as_deref(),
            Some("/tmp/result.txt")
        );
    }

    #[test]
    fn test_parse_pipeline_rejects_empty_stage() {
        assert_eq!(parse_pipeline("echo a | | wc", &no_env), Err(ParseError::EmptyStage));
        assert_eq!(parse_pipeline("echo a |", &no_env), Err(ParseError::EmptyStage));
    }

    #[test]
    fn test_parse_pipeline_duplicate_redirect_in_any_stage() {
        let result = parse_pipeline("echo a | cat > x > y", &no_env);
        assert_eq!(result, Err(ParseError::DuplicateRedirect(RedirectKind::Output)));
    }
}
