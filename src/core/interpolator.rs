// src/core/interpolator.rs

//! `$NAME` substitution for stage arguments.
//!
//! A token that starts with `$` is replaced as a whole by the value of the named
//! environment variable, or by an empty string when the variable is unset.
//! Tokens that merely contain a `$` further in are left alone.

/// Looks a variable up in the process environment.
pub fn env_lookup(name: &str) -> Option<String> {
    std::env::var(name).ok()
}

/// Substitutes a single token.
pub fn substitute_token<F>(token: String, lookup: &F) -> String
where
    F: Fn(&str) -> Option<String>,
{
    match token.strip_prefix('$') {
        Some(name) => {
            let value = lookup(name).unwrap_or_default();
            log::trace!("Substituted ${} -> '{}'", name, value);
            value
        }
        None => token,
    }
}

/// Substitutes every token of an argument list.
pub fn substitute_env<F>(tokens: Vec<String>, lookup: &F) -> Vec<String>
where
    F: Fn(&str) -> Option<String>,
{
    tokens
        .into_iter()
        .map(|token| substitute_token(token, lookup))
        .collect()
}
