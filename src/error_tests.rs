use super::*;

#[test]
fn class_mapping() {
    assert_eq!(
        FsError::PathTraversal { attempted_path: "../x".into() }.class(),
        ErrorClass::Invalid
    );
    assert_eq!(
        FsError::AbsolutePath { absolute_path: "/x".into() }.class(),
        ErrorClass::Invalid
    );
    assert_eq!(FsError::file_not_found("a.txt").class(), ErrorClass::NotFound);
    assert_eq!(FsError::directory_not_found("d").class(), ErrorClass::NotFound);
    assert_eq!(
        FsError::DirectoryNotEmpty { dir_path: "d".into() }.class(),
        ErrorClass::Forbidden
    );
    assert_eq!(FsError::NotDirectory { path: "f".into() }.class(), ErrorClass::Forbidden);
    assert_eq!(FsError::adapter("memory", "boom").class(), ErrorClass::Adapter);
    assert_eq!(
        FsError::unsupported(Operation::Commit, "memory").class(),
        ErrorClass::Adapter
    );
}

#[test]
fn is_not_found_covers_both_variants() {
    assert!(FsError::file_not_found("a").is_not_found());
    assert!(FsError::directory_not_found("a").is_not_found());
    assert!(!FsError::adapter("memory", "x").is_not_found());
}

#[test]
fn display_names_the_operation_and_adapter() {
    let msg = FsError::unsupported(Operation::WriteVersion, "table").to_string();
    assert!(msg.contains("write_version"));
    assert!(msg.contains("table"));
}

#[test]
fn io_error_folds_into_taxonomy() {
    use std::io::{Error, ErrorKind};
    let e: FsError = Error::new(ErrorKind::NotFound, "gone").into();
    assert!(e.is_not_found());
    let e: FsError = Error::new(ErrorKind::PermissionDenied, "no").into();
    assert_eq!(e.class(), ErrorClass::Forbidden);
    let e: FsError = Error::new(ErrorKind::Other, "weird").into();
    assert_eq!(e.class(), ErrorClass::Unknown);
}

#[test]
fn unknown_preserves_source() {
    use std::error::Error as _;
    let inner = std::io::Error::new(std::io::ErrorKind::Other, "root cause");
    let e = FsError::unknown("wrapped", inner);
    assert!(e.source().is_some());
}
