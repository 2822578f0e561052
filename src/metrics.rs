//! Query metrics and tracing spans.
//!
//! With the `metrics` feature every round trip is counted and timed through
//! the OpenTelemetry global meter, so whichever exporter the application
//! installs picks them up. The `tracing` feature wraps each round trip in a
//! span carrying the SQL text.

#[cfg(feature = "metrics")]
pub use otel::{RelmapMetrics, METRICS};

#[cfg(feature = "metrics")]
mod otel {
    use once_cell::sync::Lazy;
    use opentelemetry::{
        global,
        metrics::{Counter, Histogram},
    };
    use std::time::Duration;

    pub static METRICS: Lazy<RelmapMetrics> = Lazy::new(RelmapMetrics::init);

    pub struct RelmapMetrics {
        pub queries_total: Counter<u64>,
        pub query_errors_total: Counter<u64>,
        pub slow_queries_total: Counter<u64>,
        pub query_duration: Histogram<f64>,
    }

    impl RelmapMetrics {
        pub fn init() -> Self {
            let meter = global::meter("relmap");

            let queries_total = meter
                .u64_counter("relmap_queries_total")
                .with_description("Total queries executed")
                .build();

            let query_errors_total = meter
                .u64_counter("relmap_query_errors_total")
                .with_description("Queries that failed in the transport")
                .build();

            let slow_queries_total = meter
                .u64_counter("relmap_slow_queries_total")
                .with_description("Queries slower than the configured threshold")
                .build();

            let query_duration = meter
                .f64_histogram("relmap_query_duration_seconds")
                .with_description("Duration of queries")
                .build();

            Self {
                queries_total,
                query_errors_total,
                slow_queries_total,
                query_duration,
            }
        }

        pub fn record_query(&self, elapsed: Duration) {
            self.queries_total.add(1, &[]);
            self.query_duration.record(elapsed.as_secs_f64(), &[]);
        }

        pub fn record_query_error(&self) {
            self.query_errors_total.add(1, &[]);
        }

        pub fn record_slow_query(&self) {
            self.slow_queries_total.add(1, &[]);
        }
    }
}

#[cfg(feature = "tracing")]
pub mod tracing_helpers {
    /// Span covering one SQL round trip
    pub fn execute_query_span(sql: &str) -> tracing::Span {
        tracing::debug_span!("relmap.query", sql = %sql)
    }
}
