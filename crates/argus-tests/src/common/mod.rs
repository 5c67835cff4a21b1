// SPDX-License-Identifier: PolyForm-Noncommercial-1.0.0
// Copyright (c) 2025 Sylvex. All rights reserved.

//! # Common Test Utilities
//!
//! Shared utilities for the ARGUS integration tests.
//!
//! - `mocks`: A scriptable mock session implementing `UaSession`
//! - `builders`: Builders for definitions and runtime configs
//! - `fixtures`: Pre-wired client harnesses and event helpers

pub mod builders;
pub mod fixtures;
pub mod mocks;

// Re-exports for convenience
pub use builders::*;
pub use fixtures::*;
pub use mocks::*;

use std::sync::Once;
use tracing_subscriber::EnvFilter;

static INIT_TRACING: Once = Once::new();

/// Installs a test tracing subscriber once per process.
///
/// Controlled by `RUST_LOG`; silent by default.
pub fn init_test_tracing() {
    INIT_TRACING.call_once(|| {
        let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));
        let _ = tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_test_writer()
            .try_init();
    });
}
