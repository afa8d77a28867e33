//! Shared constants for integration tests.
//!
//! Integration tests are compiled as separate crates (one per top-level file in
//! `tests/`). Placing shared constants under `tests/common/` avoids creating an
//! additional integration test binary while still allowing reuse via:
//!
//! ```rust
//! #[path = "common/test_constants.rs"]
//! mod test_constants;
//! ```

/// Provider identifier every integration test declares as supported.
pub const TEST_PROVIDER: &str = "aws-ec2";

/// Supported provider set used by integration tests.
pub const SUPPORTED_PROVIDERS: [&str; 2] = [TEST_PROVIDER, "openstack-nova"];
