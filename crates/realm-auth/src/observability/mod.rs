//! Observability for realm authentication.
//!
//! Metrics are emitted through the `metrics` facade. The embedding service
//! is responsible for installing a recorder (e.g. Prometheus); without one
//! every call is a no-op.

pub mod metrics;
