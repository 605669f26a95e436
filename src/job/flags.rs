//! Flag declaration resolution.
//!
//! A job's flag list is a set of tokens like `norecurse` or `verbose`,
//! accepted either as a YAML list or one comma-separated string. The
//! resolver produces a fully-populated [`FlagSet`], rejecting unknown
//! tokens and contradictory declarations with the complete offender list.

use serde::Deserialize;
use std::collections::HashMap;

use crate::error::{Error, Result};

/// Raw flag declaration from the document.
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum FlagSpec {
    List(Vec<String>),
    Csv(String),
}

impl FlagSpec {
    pub fn tokens(&self) -> Vec<String> {
        let raw: Vec<&str> = match self {
            FlagSpec::List(items) => items.iter().map(|s| s.as_str()).collect(),
            FlagSpec::Csv(text) => text.split(',').collect(),
        };
        raw.iter()
            .map(|t| t.trim().to_ascii_lowercase())
            .filter(|t| !t.is_empty())
            .collect()
    }
}

/// Fully resolved option set. Exactly one of `quiet`/`changes`/`verbose`
/// is true in any value the resolver returns.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FlagSet {
    pub quiet: bool,
    pub changes: bool,
    pub verbose: bool,
    pub recurse: bool,
    pub forced: bool,
    pub deref: bool,
    pub create: bool,
    pub traverse: bool,
}

impl Default for FlagSet {
    fn default() -> Self {
        Self {
            quiet: true,
            changes: false,
            verbose: false,
            recurse: true,
            forced: false,
            deref: true,
            create: false,
            traverse: false,
        }
    }
}

impl FlagSet {
    /// The chown/chgrp/chmod verbosity flag matching the resolved output
    /// flag.
    pub fn verbosity_flag(&self) -> &'static str {
        if self.verbose {
            "-v"
        } else if self.changes {
            "-c"
        } else {
            "-f"
        }
    }
}

/// Output-reporting flags have no meaningful negation.
const OUTPUT_FLAGS: [&str; 3] = ["quiet", "changes", "verbose"];
const NEGATABLE_FLAGS: [&str; 5] = ["recurse", "forced", "deref", "create", "traverse"];

enum Parsed {
    Output(&'static str),
    Toggle(&'static str, bool),
}

fn parse_token(token: &str) -> Option<Parsed> {
    for name in OUTPUT_FLAGS {
        if token == name {
            return Some(Parsed::Output(name));
        }
    }
    for name in NEGATABLE_FLAGS {
        if token == name {
            return Some(Parsed::Toggle(name, true));
        }
    }
    if let Some(base) = token.strip_prefix("no") {
        for name in NEGATABLE_FLAGS {
            if base == name {
                return Some(Parsed::Toggle(name, false));
            }
        }
    }
    // Unknown name, or a negation of an output flag ("noquiet" etc).
    None
}

/// Resolve a token list into a complete flag set.
pub fn resolve(tokens: &[String]) -> Result<FlagSet> {
    let mut invalid: Vec<String> = Vec::new();
    let mut occurrences: HashMap<&'static str, Vec<String>> = HashMap::new();
    let mut toggles: Vec<(&'static str, bool)> = Vec::new();
    let mut outputs: Vec<&'static str> = Vec::new();

    for token in tokens {
        match parse_token(token) {
            Some(Parsed::Output(name)) => {
                occurrences.entry(name).or_default().push(token.clone());
                outputs.push(name);
            }
            Some(Parsed::Toggle(name, value)) => {
                occurrences.entry(name).or_default().push(token.clone());
                toggles.push((name, value));
            }
            None => {
                if !invalid.contains(token) {
                    invalid.push(token.clone());
                }
            }
        }
    }

    if !invalid.is_empty() {
        return Err(Error::InvalidFlag(invalid));
    }

    let mut duplicated: Vec<String> = Vec::new();
    for token in tokens {
        if let Some(Parsed::Output(name) | Parsed::Toggle(name, _)) = parse_token(token) {
            if occurrences[name].len() > 1 && !duplicated.contains(token) {
                duplicated.push(token.clone());
            }
        }
    }
    if !duplicated.is_empty() {
        return Err(Error::DuplicateFlag(duplicated));
    }

    let mut flags = FlagSet::default();
    for (name, value) in toggles {
        match name {
            "recurse" => flags.recurse = value,
            "forced" => flags.forced = value,
            "deref" => flags.deref = value,
            "create" => flags.create = value,
            "traverse" => flags.traverse = value,
            _ => unreachable!(),
        }
    }

    // Last-declared output flag wins; the group stays mutually exclusive.
    if let Some(winner) = outputs.last() {
        flags.quiet = *winner == "quiet";
        flags.changes = *winner == "changes";
        flags.verbose = *winner == "verbose";
    }

    Ok(flags)
}
