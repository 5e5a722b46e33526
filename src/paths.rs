//! Path safety and on-disk layout helpers
//! --------------------------------------
//! Every caller-supplied name (uid, login, collection, document id) passes
//! through `validate_component` before it is joined onto a tenant root, and
//! every joined path is re-checked with `contained_join` so nothing resolves
//! outside the owning subtree.

use std::path::{Path, PathBuf};

use path_absolutize::Absolutize;
use unicode_normalization::UnicodeNormalization;

use crate::error::{AppError, AppResult};

pub const USERS_DIR: &str = "users";
pub const LOGINS_DIR: &str = "logins";
/// Half-built user trees, outside the uid namespace.
pub const STAGING_DIR: &str = ".staging";
pub const USER_META: &str = "meta.json";
pub const ASSETS_COLLECTION: &str = "assets";
pub const PROJECTS_COLLECTION: &str = "projects";

/// Sub-collections created with every user and removed on user delete.
pub const USER_COLLECTIONS: [&str; 2] = [ASSETS_COLLECTION, PROJECTS_COLLECTION];

/// Normalize a UTF-8 string to NFC.
pub fn normalize_nfc(input: &str) -> String {
    input.nfc().collect::<String>()
}

/// Validate a single path component:
/// - non-empty, no NUL
/// - no '/' or '\' separators
/// - not '.' or '..'
pub fn validate_component(kind: &str, name: &str) -> AppResult<()> {
    if name.is_empty() {
        return Err(AppError::invalid("invalid_path", format!("{} cannot be empty", kind)));
    }
    if name.chars().any(|c| c == '\u{0000}') {
        return Err(AppError::invalid("invalid_path", format!("{} cannot contain NUL characters", kind)));
    }
    if name.contains('/') || name.contains('\\') {
        return Err(AppError::invalid("invalid_path", format!("{} '{}' cannot contain path separators", kind, name)));
    }
    if name == "." || name == ".." {
        return Err(AppError::invalid("invalid_path", format!("{} cannot be '.' or '..'", kind)));
    }
    Ok(())
}

/// Validate then NFC-normalize a component. Login names and ids are stored
/// normalized so composed/decomposed spellings share one index entry.
pub fn normalized_component(kind: &str, name: &str) -> AppResult<String> {
    validate_component(kind, name)?;
    Ok(normalize_nfc(name))
}

/// Validate a relative, '/'-separated folder path below a tenant root.
/// The empty string names the root itself.
pub fn validate_relative(path: &str) -> AppResult<()> {
    if path.is_empty() {
        return Ok(());
    }
    if path.starts_with('/') || path.starts_with('\\') || Path::new(path).is_absolute() {
        return Err(AppError::invalid("invalid_path", format!("absolute path '{}' is not allowed", path)));
    }
    for seg in path.split('/') {
        validate_component("path segment", seg)?;
    }
    Ok(())
}

/// Join `rel` onto `root` and verify the lexically absolutized result is still
/// inside `root`. Symlinks are not followed here; the login index is the only
/// place links are created and it lives under the same root.
pub fn contained_join(root: &Path, rel: &Path) -> AppResult<PathBuf> {
    let root_abs = root
        .absolutize()
        .map_err(|e| AppError::invalid("invalid_path", format!("cannot absolutize '{}': {}", root.display(), e)))?
        .to_path_buf();
    let joined = root_abs.join(rel);
    let abs = joined
        .absolutize()
        .map_err(|e| AppError::invalid("invalid_path", format!("cannot absolutize '{}': {}", joined.display(), e)))?
        .to_path_buf();
    if !abs.starts_with(&root_abs) {
        return Err(AppError::invalid(
            "path_escape",
            format!("'{}' resolves outside '{}'", rel.display(), root_abs.display()),
        ));
    }
    Ok(abs)
}

/// Resolve `rel` against `base` unless it is already absolute.
pub fn resolve_against(base: &Path, rel: &str) -> PathBuf {
    let p = Path::new(rel);
    let joined = if p.is_absolute() { p.to_path_buf() } else { base.join(p) };
    match joined.absolutize() {
        Ok(abs) => abs.to_path_buf(),
        Err(_) => joined,
    }
}

#[inline]
pub fn users_dir(data_root: &Path) -> PathBuf { data_root.join(USERS_DIR) }

#[inline]
pub fn logins_dir(data_root: &Path) -> PathBuf { data_root.join(LOGINS_DIR) }

#[inline]
pub fn user_dir(data_root: &Path, uid: &str) -> PathBuf { users_dir(data_root).join(uid) }

#[inline]
pub fn login_entry(data_root: &Path, login: &str) -> PathBuf { logins_dir(data_root).join(login) }

#[inline]
pub fn staging_dir(data_root: &Path) -> PathBuf { data_root.join(STAGING_DIR) }

/// Where a new user's tree is assembled before it is renamed into `users/`.
#[inline]
pub fn user_staging_dir(data_root: &Path, uid: &str) -> PathBuf { staging_dir(data_root).join(uid) }

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_invalid_components() {
        assert!(validate_component("uid", "").is_err());
        assert!(validate_component("uid", ".").is_err());
        assert!(validate_component("uid", "..").is_err());
        assert!(validate_component("uid", "a/b").is_err());
        assert!(validate_component("uid", "a\\b").is_err());
        assert!(validate_component("uid", "a\u{0000}b").is_err());
        validate_component("uid", "u1").unwrap();
        validate_component("doc", "logo.png").unwrap();
    }

    #[test]
    fn test_relative_paths() {
        validate_relative("").unwrap();
        validate_relative("users").unwrap();
        validate_relative("users/u1").unwrap();
        assert!(validate_relative("/etc").is_err());
        assert!(validate_relative("users/../..").is_err());
        assert!(validate_relative("users//u1").is_err());
    }

    #[test]
    fn test_contained_join_rejects_escape() {
        let root = Path::new("/srv/site/data");
        let ok = contained_join(root, Path::new("users/u1")).unwrap();
        assert!(ok.ends_with("users/u1"));
        assert!(contained_join(root, Path::new("../other")).is_err());
        assert!(contained_join(root, Path::new("users/../../x")).is_err());
    }

    #[test]
    fn test_nfc_login_normalization() {
        let composed = normalized_component("login", "Caf\u{00e9}").unwrap();
        let decomposed = normalized_component("login", "Cafe\u{0301}").unwrap();
        assert_eq!(composed, decomposed);
    }

    #[test]
    fn test_layout_helpers() {
        let root = Path::new("/srv/site/data");
        assert_eq!(user_dir(root, "u1"), PathBuf::from("/srv/site/data/users/u1"));
        assert_eq!(login_entry(root, "bob"), PathBuf::from("/srv/site/data/logins/bob"));
        assert_eq!(user_staging_dir(root, "u1"), PathBuf::from("/srv/site/data/.staging/u1"));
        assert!(!user_staging_dir(root, ".u1.staging").starts_with(users_dir(root)));
    }
}
