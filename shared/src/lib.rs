pub mod deadline;
pub mod metrics_defs;
