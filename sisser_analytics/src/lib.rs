pub mod aggregator;
pub mod boundary;
pub mod columns;
pub mod correlation;
pub mod data_loader;
pub mod error;
pub mod geo_join;
pub mod models;
pub mod normalize;
pub mod report;
pub mod state_view;
pub mod stats;

pub use aggregator::compute_aggregates;
pub use boundary::GeoBoundary;
pub use data_loader::DataLoader;
pub use error::PipelineError;
pub use geo_join::{join_boundaries, JoinedBoundaries};
pub use models::{AggregateBundle, AnalysisMode, CompanyMetric, StateView};
pub use report::{ReportConfig, ReportWriter};
pub use state_view::state_view;
