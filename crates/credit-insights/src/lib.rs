//! Aggregation engine behind the credit application dashboard.
//!
//! Raw application rows and classifier score events are read from a
//! [`RecordStore`](workflows::dashboard::RecordStore), validated at the
//! boundary, collapsed to one effective score per application, and folded into
//! the risk distribution, monthly trend, and period comparison views.

pub mod config;
pub mod error;
pub mod telemetry;
pub mod workflows;
