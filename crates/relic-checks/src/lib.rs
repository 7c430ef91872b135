//! Time-windowed condition checks against New Relic data.
//!
//! `relic-checks` holds the logic behind the extension's check actions. It is
//! transport agnostic: data comes in through the [`WorkloadStatusApi`] and
//! [`IncidentsApi`] traits, and each poll produces a [`CheckResult`].
//!
//! # Checks
//!
//! - **Workload check**: compares a workload's status against a set of
//!   expected states
//! - **Incident check**: counts active incidents matching a priority and
//!   entity tag filter
//!
//! Both run for a fixed window and combine polls according to a
//! [`ConditionMode`].
//!
//! # Example
//!
//! ```rust
//! use chrono::{TimeDelta, Utc};
//! use relic_checks::{evaluate, CheckWindow, ConditionMode, ConditionSuccessFlag, Violation};
//! use std::time::Duration;
//!
//! let start = Utc::now();
//! let window = CheckWindow::starting_at(start, Duration::from_secs(60)).unwrap();
//! let mut flag = ConditionSuccessFlag::new();
//!
//! // Not satisfied mid-window: AtLeastOnce keeps waiting.
//! let eval = evaluate(start, &window, ConditionMode::AtLeastOnce, false, &mut flag, &());
//! assert!(!eval.is_failure());
//!
//! // Still not satisfied when the window ends: the check fails.
//! let end = start + TimeDelta::seconds(60);
//! let eval = evaluate(end, &window, ConditionMode::AtLeastOnce, false, &mut flag, &());
//! assert_eq!(eval.violation, Some(Violation::NeverSatisfied));
//! ```

#![forbid(unsafe_code)]
#![warn(missing_docs)]
#![warn(rustdoc::missing_crate_level_docs)]

pub mod api;
pub mod error;
pub mod evaluator;
pub mod filter;
pub mod incident;
pub mod types;
pub mod workload;

// Re-export main types at crate root
pub use api::{EntityTags, IncidentsApi, WorkloadStatusApi};
pub use error::{CheckError, FetchError, Result};
pub use evaluator::{
    evaluate, ConditionMemory, ConditionSuccessFlag, Evaluation, ObservedStateSet, Violation,
};
pub use filter::{filter_incidents, tag_mismatch, EntityTagFilter, TagMismatch};
pub use incident::{
    incident_metric, IncidentCheck, IncidentCheckConfig, INCIDENT_FETCH_FAILED,
    INCIDENT_METRIC_NAME,
};
pub use types::{
    status, CheckResult, CheckWindow, ColorState, ConditionMode, DisplayMetric, FailureDetail,
    IncidentCondition, IncidentRecord,
};
pub use workload::{
    workload_metric, WorkloadCheck, WorkloadCheckConfig, WorkloadTarget, WORKLOAD_FETCH_FAILED,
    WORKLOAD_METRIC_NAME,
};
