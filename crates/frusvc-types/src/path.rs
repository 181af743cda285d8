//! Object path helpers.
//!
//! An object path is an absolute, '/'-delimited string such as
//! `/system/slot1/dev0`. The child of `parent` named `name` always lives at
//! `parent + "/" + name`.

use crate::FruError;

/// Path separator.
pub const SEPARATOR: char = '/';

/// Path of the child `name` under `parent`.
pub fn join(parent: &str, name: &str) -> String {
    let mut path = String::with_capacity(parent.len() + 1 + name.len());
    path.push_str(parent);
    path.push(SEPARATOR);
    path.push_str(name);
    path
}

/// Split `path` into its parent path and final segment.
///
/// Returns `None` for a single-segment path (`/system`), which has no
/// parent path.
pub fn split_parent(path: &str) -> Option<(&str, &str)> {
    let idx = path.rfind(SEPARATOR)?;
    if idx == 0 {
        return None;
    }
    Some((&path[..idx], &path[idx + 1..]))
}

/// Check that `name` can be used as a single path segment.
pub fn validate_name(name: &str) -> Result<(), FruError> {
    if name.is_empty() {
        return Err(FruError::InvalidDescription("node name is empty".into()));
    }
    if name == "." || name == ".." {
        return Err(FruError::InvalidDescription(format!(
            "node name '{name}' is reserved"
        )));
    }
    if name.contains(SEPARATOR) {
        return Err(FruError::InvalidDescription(format!(
            "node name '{name}' contains '{SEPARATOR}'"
        )));
    }
    if name.chars().any(char::is_control) {
        return Err(FruError::InvalidDescription(format!(
            "node name {name:?} contains control characters"
        )));
    }
    Ok(())
}

/// Check that `path` is a well-formed absolute object path.
pub fn validate_path(path: &str) -> Result<(), FruError> {
    let Some(rest) = path.strip_prefix(SEPARATOR) else {
        return Err(FruError::InvalidDescription(format!(
            "path '{path}' is not absolute"
        )));
    };
    if rest.is_empty() {
        return Err(FruError::InvalidDescription(
            "path '/' does not name an object".into(),
        ));
    }
    for segment in rest.split(SEPARATOR) {
        validate_name(segment)
            .map_err(|e| FruError::InvalidDescription(format!("path '{path}': {}", e.reason())))?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn join_appends_segment() {
        assert_eq!(join("/system", "slot1"), "/system/slot1");
        assert_eq!(join("/system/slot1", "dev0"), "/system/slot1/dev0");
    }

    #[test]
    fn split_parent_returns_last_segment() {
        assert_eq!(
            split_parent("/system/slot1/dev0"),
            Some(("/system/slot1", "dev0"))
        );
        assert_eq!(split_parent("/system"), None);
    }

    #[test]
    fn valid_names_pass() {
        for name in ["slot1", "dev_0", "psu-a", "fan.3"] {
            assert!(validate_name(name).is_ok(), "{name} should be valid");
        }
    }

    #[test]
    fn invalid_names_are_rejected() {
        for name in ["", ".", "..", "a/b", "tab\there"] {
            assert!(
                matches!(validate_name(name), Err(FruError::InvalidDescription(_))),
                "{name:?} should be rejected"
            );
        }
    }

    #[test]
    fn validate_path_accepts_absolute_paths() {
        assert!(validate_path("/system").is_ok());
        assert!(validate_path("/org/openbmc/frus").is_ok());
    }

    #[test]
    fn validate_path_rejects_malformed_paths() {
        for path in ["", "/", "system", "/system/", "//system", "/a//b"] {
            assert!(validate_path(path).is_err(), "{path:?} should be rejected");
        }
    }
}
