//! Reference name validation following git-style conventions.
//!
//! Names are checked locally before any external call. A name is rejected
//! if it:
//! - is empty or only whitespace, or starts with `-`
//! - contains an ASCII control character, a space, or any of `~ ^ : ? * [ \`
//! - contains `..`, `//` or `@{`
//! - has a component starting with `.`, or ends with `/`, `.` or `.lock`

use crate::error::{RefError, Result};

/// Characters that are forbidden anywhere in a reference name.
const FORBIDDEN_CHARS: &[char] = &[' ', '~', '^', ':', '?', '*', '[', '\\'];

/// Validate a reference name (branch, tag, or remote branch short name).
///
/// ```
/// use replica_refs::names::validate_reference_name;
///
/// assert!(validate_reference_name("feature/auth").is_ok());
/// assert!(validate_reference_name("-x").is_err());
/// assert!(validate_reference_name("bad..name").is_err());
/// ```
pub fn validate_reference_name(name: &str) -> Result<()> {
    if name.trim().is_empty() {
        return Err(RefError::invalid_name(name, "name must not be empty"));
    }

    if name.starts_with('-') {
        return Err(RefError::invalid_name(name, "must not start with '-'"));
    }

    if let Some(ch) = name.chars().find(|c| c.is_ascii_control()) {
        return Err(RefError::invalid_name(
            name,
            format!("contains control character: {ch:?}"),
        ));
    }

    if let Some(ch) = name.chars().find(|c| FORBIDDEN_CHARS.contains(c)) {
        return Err(RefError::invalid_name(
            name,
            format!("contains forbidden character: {ch:?}"),
        ));
    }

    for sequence in ["..", "//", "@{"] {
        if name.contains(sequence) {
            return Err(RefError::invalid_name(
                name,
                format!("must not contain '{sequence}'"),
            ));
        }
    }

    if name.ends_with('/') || name.ends_with('.') {
        return Err(RefError::invalid_name(name, "must not end with '/' or '.'"));
    }

    if name.ends_with(".lock") {
        return Err(RefError::invalid_name(name, "must not end with '.lock'"));
    }

    for component in name.split('/') {
        if component.is_empty() {
            return Err(RefError::invalid_name(
                name,
                "path components must not be empty",
            ));
        }
        if component.starts_with('.') {
            return Err(RefError::invalid_name(
                name,
                format!("component must not start with '.': {component:?}"),
            ));
        }
    }

    Ok(())
}

pub fn validate_branch_name(name: &str) -> Result<()> {
    validate_reference_name(name)
}

pub fn validate_tag_name(name: &str) -> Result<()> {
    validate_reference_name(name)
}

/// Validate a remote name. Same rules, and no `/`.
pub fn validate_remote_name(name: &str) -> Result<()> {
    validate_reference_name(name)?;
    if name.contains('/') {
        return Err(RefError::invalid_name(name, "remote name must not contain '/'"));
    }
    Ok(())
}

/// Validate a remote branch short name of the form `remote/branch`.
pub fn validate_remote_branch_name(name: &str) -> Result<()> {
    validate_reference_name(name)?;
    match name.split_once('/') {
        Some((remote, branch)) => {
            validate_remote_name(remote)?;
            validate_reference_name(branch)
        }
        None => Err(RefError::invalid_name(
            name,
            "remote branch name must be of the form 'remote/branch'",
        )),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn valid_names() {
        assert!(validate_branch_name("main").is_ok());
        assert!(validate_branch_name("my-branch").is_ok());
        assert!(validate_branch_name("v1.0").is_ok());
        assert!(validate_branch_name("feature/deep/nested").is_ok());
        assert!(validate_tag_name("release-2024").is_ok());
    }

    #[test]
    fn reject_empty_and_blank() {
        assert!(validate_branch_name("").is_err());
        assert!(validate_branch_name("   ").is_err());
    }

    #[test]
    fn reject_leading_dash() {
        assert!(validate_branch_name("-f").is_err());
    }

    #[test]
    fn reject_control_characters() {
        assert!(validate_branch_name("has\ttab").is_err());
        assert!(validate_branch_name("bell\u{7}").is_err());
        assert!(validate_branch_name("del\u{7f}").is_err());
    }

    #[test]
    fn reject_forbidden_chars() {
        for name in ["a b", "a~b", "a^b", "a:b", "a?b", "a*b", "a[b", "a\\b"] {
            assert!(validate_branch_name(name).is_err(), "{name} accepted");
        }
    }

    #[test]
    fn reject_sequences() {
        assert!(validate_branch_name("a..b").is_err());
        assert!(validate_branch_name("a//b").is_err());
        assert!(validate_branch_name("ref@{0}").is_err());
    }

    #[test]
    fn reject_bad_endings() {
        assert!(validate_branch_name("trailing/").is_err());
        assert!(validate_branch_name("trailing.").is_err());
        assert!(validate_branch_name("main.lock").is_err());
    }

    #[test]
    fn reject_dot_components() {
        assert!(validate_branch_name(".hidden").is_err());
        assert!(validate_branch_name("feature/.hidden").is_err());
        assert!(validate_branch_name("/leading").is_err());
    }

    #[test]
    fn error_carries_reason() {
        let err = validate_branch_name("a b").unwrap_err();
        assert!(matches!(err, RefError::InvalidName { ref reason, .. } if reason.contains("' '")));
    }

    #[test]
    fn remote_names() {
        assert!(validate_remote_name("origin").is_ok());
        assert!(validate_remote_name("up/stream").is_err());
        assert!(validate_remote_branch_name("origin/feature/x").is_ok());
        assert!(validate_remote_branch_name("origin").is_err());
    }
}
