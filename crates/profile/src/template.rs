// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Parameter substitution for command and artifact templates.

use crate::profile::CommandDef;
use regex::Regex;
use std::collections::{BTreeSet, HashMap};
use std::sync::LazyLock;

/// Regex pattern for {parameter_name} placeholders
// Allow expect here as the regex is compile-time verified to be valid
#[allow(clippy::expect_used)]
static PARAM_PATTERN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"\{([A-Za-z0-9_]+)\}").expect("constant regex pattern is valid")
});

/// Replace every `{name}` placeholder whose name is in `params`.
///
/// Unknown placeholders are left verbatim, so substitution with an empty
/// map is the identity and repeated substitution is safe.
pub fn substitute(template: &str, params: &HashMap<String, String>) -> String {
    PARAM_PATTERN
        .replace_all(template, |caps: &regex::Captures| match params.get(&caps[1]) {
            Some(value) => value.clone(),
            None => caps[0].to_string(),
        })
        .to_string()
}

/// Parameter names referenced by a template, sorted and deduplicated.
pub fn extract_parameters(template: &str) -> Vec<String> {
    let names: BTreeSet<String> = PARAM_PATTERN
        .captures_iter(template)
        .map(|caps| caps[1].to_string())
        .collect();
    names.into_iter().collect()
}

/// All parameter names a command references, across its command string
/// and every artifact template. Sorted and deduplicated.
pub fn command_parameters(cmd: &CommandDef) -> Vec<String> {
    let mut names: BTreeSet<String> = extract_parameters(&cmd.command).into_iter().collect();
    for artifact in &cmd.artifacts {
        names.extend(extract_parameters(artifact));
    }
    names.into_iter().collect()
}

#[cfg(test)]
#[path = "template_tests.rs"]
mod tests;
