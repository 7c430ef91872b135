//! Timed condition evaluation shared by all checks.
//!
//! A check polls its data source repeatedly. Each poll yields a boolean
//! "does the data satisfy the declared condition" which [`evaluate`] combines
//! with the check window and the [`ConditionMode`]:
//!
//! - [`ConditionMode::AllTheTime`]: every unsatisfied poll is a violation,
//!   whether or not the window has ended. Nothing is remembered.
//! - [`ConditionMode::AtLeastOnce`]: polls are recorded in a
//!   [`ConditionMemory`]. A violation is only possible on a poll at or after
//!   the window end, and only if no poll was ever satisfied.
//!
//! The evaluator never formats titles; checks turn a [`Violation`] into a
//! [`FailureDetail`] with [`Evaluation::failure_with`].

use std::collections::BTreeSet;

use chrono::{DateTime, Utc};

use crate::types::{CheckWindow, ConditionMode, FailureDetail};

/// Per-instance memory of an `AtLeastOnce` check.
pub trait ConditionMemory {
    /// What a single poll observed.
    type Observation: ?Sized;

    /// Records one poll.
    fn record(&mut self, observation: &Self::Observation, satisfied: bool);

    /// Whether any recorded poll satisfied the condition.
    fn ever_satisfied(&self) -> bool;
}

/// The set of workload states observed so far.
///
/// Grows monotonically for the lifetime of one check instance.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ObservedStateSet {
    states: BTreeSet<String>,
    matched: bool,
}

impl ObservedStateSet {
    /// Creates an empty set.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the observed states in sorted order.
    pub fn states(&self) -> impl Iterator<Item = &str> {
        self.states.iter().map(String::as_str)
    }

    /// Returns true if nothing was observed yet.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.states.is_empty()
    }
}

impl ConditionMemory for ObservedStateSet {
    type Observation = str;

    fn record(&mut self, observation: &str, satisfied: bool) {
        if !self.states.contains(observation) {
            self.states.insert(observation.to_string());
        }
        self.matched |= satisfied;
    }

    fn ever_satisfied(&self) -> bool {
        self.matched
    }
}

/// A flag latched the first time the condition holds.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ConditionSuccessFlag(bool);

impl ConditionSuccessFlag {
    /// Creates an unset flag.
    #[must_use]
    pub const fn new() -> Self {
        Self(false)
    }

    /// Returns whether the flag is set.
    #[must_use]
    pub const fn is_set(&self) -> bool {
        self.0
    }
}

impl ConditionMemory for ConditionSuccessFlag {
    type Observation = ();

    fn record(&mut self, _observation: &(), satisfied: bool) {
        if satisfied {
            self.0 = true;
        }
    }

    fn ever_satisfied(&self) -> bool {
        self.0
    }
}

/// Why a poll violated its condition.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Violation {
    /// `AllTheTime`: this poll did not satisfy the condition.
    Unsatisfied,
    /// `AtLeastOnce`: the window ended without a satisfying poll.
    NeverSatisfied,
}

/// The verdict for one poll.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Evaluation {
    /// Whether the window has ended.
    pub completed: bool,
    /// The violation, if the poll failed.
    pub violation: Option<Violation>,
}

impl Evaluation {
    /// Returns true if the poll failed.
    #[must_use]
    pub const fn is_failure(&self) -> bool {
        self.violation.is_some()
    }

    /// Turns the violation into a user-facing failure.
    pub fn failure_with<F>(&self, title: F) -> Option<FailureDetail>
    where
        F: FnOnce(Violation) -> String,
    {
        self.violation.map(|v| FailureDetail::new(title(v)))
    }
}

/// Evaluates one poll.
///
/// In `AtLeastOnce` mode the observation is recorded before the completion
/// check, so a satisfying final poll still counts.
pub fn evaluate<M>(
    now: DateTime<Utc>,
    window: &CheckWindow,
    mode: ConditionMode,
    satisfied: bool,
    memory: &mut M,
    observation: &M::Observation,
) -> Evaluation
where
    M: ConditionMemory + ?Sized,
{
    let completed = window.is_complete_at(now);

    let violation = match mode {
        ConditionMode::AllTheTime => (!satisfied).then_some(Violation::Unsatisfied),
        ConditionMode::AtLeastOnce => {
            memory.record(observation, satisfied);
            (completed && !memory.ever_satisfied()).then_some(Violation::NeverSatisfied)
        }
    };

    Evaluation {
        completed,
        violation,
    }
}
