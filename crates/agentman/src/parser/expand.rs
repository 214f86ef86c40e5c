//! `${NAME}` / `$NAME` expansion against an explicit environment snapshot.

use std::collections::HashMap;

use once_cell::sync::Lazy;
use regex::{Captures, Regex};

/// Environment mapping used for expansion.
pub type Environment = HashMap<String, String>;

static VAR_REF: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"\$\{([A-Za-z_][A-Za-z0-9_]*)\}|\$([A-Za-z_][A-Za-z0-9_]*)")
        .expect("variable reference pattern compiles")
});

/// Replace every known variable reference in `value`.
///
/// Unknown names are left exactly as written. Replacement values are not
/// scanned again.
pub fn expand_env_vars(value: &str, env: &Environment) -> String {
    if !value.contains('$') {
        return value.to_string();
    }
    VAR_REF
        .replace_all(value, |caps: &Captures<'_>| {
            let name = caps
                .get(1)
                .or_else(|| caps.get(2))
                .map(|m| m.as_str())
                .unwrap_or_default();
            match env.get(name) {
                Some(v) => v.clone(),
                None => caps[0].to_string(),
            }
        })
        .into_owned()
}
