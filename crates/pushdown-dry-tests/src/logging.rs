// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>
//! Log capture for tests.

use tracing_subscriber::EnvFilter;

/// Routes `tracing` events to the test harness's captured output.
///
/// Honours `RUST_LOG`; defaults to `warn`. Safe to call from every test: only
/// the first call in a process installs the subscriber.
pub fn init_test_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_test_writer()
        .try_init();
}
