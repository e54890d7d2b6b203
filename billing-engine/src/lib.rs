pub mod aggregate;
pub mod billing;
pub mod calendar;
pub mod chart;
pub mod config;
pub mod customers;
pub mod history;
pub mod invoice;
pub mod ledger;
pub mod metrics_export;
pub mod observability;
pub mod pipeline;
pub mod sources;
pub mod transform;

pub use pipeline::{BillingError, BillingPipeline, BillingReport, BillingRequest};
