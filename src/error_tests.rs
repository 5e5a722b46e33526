use super::*;

#[test]
fn http_status_mapping() {
    assert_eq!(AppError::invalid("bad_input", "oops").http_status(), 400);
    assert_eq!(AppError::not_found("not_found", "missing").http_status(), 404);
    assert_eq!(AppError::conflict("login_taken", "dup").http_status(), 409);
    assert_eq!(AppError::parse("json_error", "bad json").http_status(), 422);
    assert_eq!(AppError::io("io", "disk").http_status(), 503);
    assert_eq!(AppError::unavailable("storage_disabled", "off").http_status(), 503);
    assert_eq!(AppError::internal("internal", "panic").http_status(), 500);
}

#[test]
fn display_is_code_then_message() {
    let e = AppError::invalid("invalid_path", "empty component");
    assert_eq!(e.to_string(), "invalid_path: empty component");
    assert_eq!(e.code_str(), "invalid_path");
    assert_eq!(e.message(), "empty component");
}

#[test]
fn io_error_kinds_map_to_taxonomy() {
    let nf: AppError = std::io::Error::new(std::io::ErrorKind::NotFound, "gone").into();
    assert!(nf.is_not_found());
    let exists: AppError = std::io::Error::new(std::io::ErrorKind::AlreadyExists, "there").into();
    assert_eq!(exists.http_status(), 409);
    let denied: AppError = std::io::Error::new(std::io::ErrorKind::PermissionDenied, "nope").into();
    assert!(matches!(denied, AppError::Io { .. }));
}

#[test]
fn json_errors_are_parse_failures() {
    let err = serde_json::from_str::<serde_json::Value>("{ nope").unwrap_err();
    let app: AppError = err.into();
    assert!(matches!(app, AppError::Parse { .. }));
}
