//! Electrochemical storage project evaluation: parameter validation, the
//! year-by-year cash-flow table and the metrics derived from it.

pub mod cash_flow;
pub mod depreciation;
pub mod metrics;
pub mod params;
pub mod policy;
pub mod project;
pub mod revenue;
pub mod tax;

#[cfg(feature = "statements")]
pub mod statements;

#[cfg(feature = "sensitivity")]
pub mod sensitivity;

pub use cash_flow::{build_cash_flow_table, CashFlowTable, YearField, YearPhase, YearRecord};
pub use metrics::{extract_metrics, Metrics};
pub use params::{AncillaryService, ParameterSet, ProjectInput, ReplacementTreatment, RevenueMode};
pub use project::{evaluate, evaluate_project, ProjectEvaluation, StorageProject};
