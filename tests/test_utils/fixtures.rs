//! Fixtures shared by the end-to-end handler tests.

use logship::{BackoffOverrides, LogstashHandlerBuilder};
use rstest::fixture;

use super::FakeLogstash;

/// A running fake collector on an ephemeral port.
#[fixture]
pub fn server() -> FakeLogstash {
    FakeLogstash::start()
}

/// Builder pointed at `server` with test-friendly timings.
pub fn builder_for(server: &FakeLogstash) -> LogstashHandlerBuilder {
    LogstashHandlerBuilder::new()
        .with_tcp("127.0.0.1", server.port())
        .with_backoff(
            BackoffOverrides::new()
                .with_initial_ms(10)
                .with_max_ms(50),
        )
        .with_drain_timeout_ms(2_000)
}
