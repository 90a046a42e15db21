//! Tests to verify that public types are Send + Sync.

use caviar_core::*;

const fn assert_send_sync<T: Send + Sync>() {}

#[test]
fn test_schema_types_are_send_sync() {
    assert_send_sync::<Manifest>();
    assert_send_sync::<Object>();
    assert_send_sync::<BundleOptions>();
    assert_send_sync::<ExtractionMode>();
}

#[test]
fn test_container_is_send_sync() {
    assert_send_sync::<Container>();
    assert_send_sync::<VerifyReport>();
}

#[test]
fn test_error_is_send_sync() {
    assert_send_sync::<Error>();
    assert_send_sync::<IntegrityScope>();
}
