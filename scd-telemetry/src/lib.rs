//! Tracing setup shared by the merger binary and the test suites.

pub mod tracing;
