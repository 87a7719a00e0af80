//! Shared fixtures for the `borgsnap` integration tests.
//!
//! [`fakes`] stands in for the snapshot tools, the mounter and the archive
//! child; [`builders`] produces validated configs whose lock file lives in a
//! test-owned directory.

pub mod builders;
pub mod fakes;

use std::future::Future;
use std::sync::Once;
use std::time::Duration;

use tracing_subscriber::{EnvFilter, fmt};

/// Filter used when `RUST_LOG` is unset: phase transitions and teardown steps
/// of the crate under test, warnings from everything else.
const DEFAULT_TEST_FILTER: &str = "warn,borgsnap=debug,borgsnap_test_utils=debug";

/// Upper bound for one orchestrator run in tests. The slowest cases are the
/// cancellation scenarios, which wait on a delayed cancel and then on a real
/// `sleep` child receiving SIGINT; anything past this is a hang in teardown.
pub const RUN_TIMEOUT: Duration = Duration::from_secs(10);

static INIT: Once = Once::new();

/// Install a test-writer subscriber once per test binary, so the phase log of
/// a failing scenario is printed next to its assertion.
pub fn init_tracing() {
    INIT.call_once(|| {
        let filter = EnvFilter::try_from_default_env()
            .unwrap_or_else(|_| EnvFilter::new(DEFAULT_TEST_FILTER));

        fmt()
            .with_env_filter(filter)
            .with_test_writer()
            .with_target(false)
            .init();
    });
}

/// Await `fut`, failing the test if it outlives [`RUN_TIMEOUT`].
pub async fn with_timeout<F, T>(fut: F) -> T
where
    F: Future<Output = T>,
{
    match tokio::time::timeout(RUN_TIMEOUT, fut).await {
        Ok(value) => value,
        Err(_) => panic!("run did not finish within {RUN_TIMEOUT:?}; teardown is likely stuck"),
    }
}
