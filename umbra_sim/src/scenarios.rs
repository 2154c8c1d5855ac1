//! End-to-end scenarios exercising the engine through the sandbox.

use crate::error::SimError;

/// Scenario identifiers
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ScenarioId {
    /// E2E-001: construct a Counter, increment twice, read 2
    CounterIncrement,

    /// E2E-002: unshadowed Mystery.doThing() returns 0
    DefaultValue,

    /// E2E-003: 100ms / 50ms / 50ms tasks observed across advances
    DelayedTasks,

    /// SCH-001: (deadline, enqueue order) ordering
    TaskOrdering,

    /// SCH-002: zero-delay follow-ups run inside the same advance
    FixedPointDrain,

    /// SCH-003: cancelled tasks never run
    Cancellation,

    /// SCH-004: paused contexts queue zero-delay posts
    PauseResume,

    /// SHD-001: a TextView shadow is usable as a View shadow
    ShadowHierarchy,

    /// SHD-002: static calls routed to shadow statics
    StaticDispatch,

    /// CTX-001: background context posting into main, independent clocks
    CrossContext,

    /// CTX-002: reset leaves nothing behind
    ResetIsolation,
}

impl ScenarioId {
    /// Returns a list of all scenarios.
    pub fn all() -> Vec<ScenarioId> {
        vec![
            ScenarioId::CounterIncrement,
            ScenarioId::DefaultValue,
            ScenarioId::DelayedTasks,
            ScenarioId::TaskOrdering,
            ScenarioId::FixedPointDrain,
            ScenarioId::Cancellation,
            ScenarioId::PauseResume,
            ScenarioId::ShadowHierarchy,
            ScenarioId::StaticDispatch,
            ScenarioId::CrossContext,
            ScenarioId::ResetIsolation,
        ]
    }

    /// Returns the scenario name.
    pub fn name(&self) -> &'static str {
        match self {
            ScenarioId::CounterIncrement => "counter_increment",
            ScenarioId::DefaultValue => "default_value",
            ScenarioId::DelayedTasks => "delayed_tasks",
            ScenarioId::TaskOrdering => "task_ordering",
            ScenarioId::FixedPointDrain => "fixed_point_drain",
            ScenarioId::Cancellation => "cancellation",
            ScenarioId::PauseResume => "pause_resume",
            ScenarioId::ShadowHierarchy => "shadow_hierarchy",
            ScenarioId::StaticDispatch => "static_dispatch",
            ScenarioId::CrossContext => "cross_context",
            ScenarioId::ResetIsolation => "reset_isolation",
        }
    }

    /// Returns the short code used in logs.
    pub fn code(&self) -> &'static str {
        match self {
            ScenarioId::CounterIncrement => "E2E-001",
            ScenarioId::DefaultValue => "E2E-002",
            ScenarioId::DelayedTasks => "E2E-003",
            ScenarioId::TaskOrdering => "SCH-001",
            ScenarioId::FixedPointDrain => "SCH-002",
            ScenarioId::Cancellation => "SCH-003",
            ScenarioId::PauseResume => "SCH-004",
            ScenarioId::ShadowHierarchy => "SHD-001",
            ScenarioId::StaticDispatch => "SHD-002",
            ScenarioId::CrossContext => "CTX-001",
            ScenarioId::ResetIsolation => "CTX-002",
        }
    }

    /// Returns a description of the scenario.
    pub fn description(&self) -> &'static str {
        match self {
            ScenarioId::CounterIncrement => "ShadowCounter: new, increment x2, get() == 2",
            ScenarioId::DefaultValue => "Unregistered Mystery.doThing() returns 0 without failing",
            ScenarioId::DelayedTasks => "Tasks at 100/50/50ms run in deadline then post order",
            ScenarioId::TaskOrdering => "T1@5, T2@5, T3@3 run as T3, T1, T2",
            ScenarioId::FixedPointDrain => "A task posting a zero-delay follow-up sees it run in the same advance",
            ScenarioId::Cancellation => "Cancelled tasks and removed callbacks never run",
            ScenarioId::PauseResume => "Paused post(0) waits for advance; resume does not drain",
            ScenarioId::ShadowHierarchy => "TextView shadow answers View operations and state checks",
            ScenarioId::StaticDispatch => "SystemClock statics follow the main context clock",
            ScenarioId::CrossContext => "Worker context posts into main; clocks stay independent",
            ScenarioId::ResetIsolation => "After reset no bindings, tasks, overrides or time remain",
        }
    }
}

impl std::fmt::Display for ScenarioId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.name())
    }
}

impl std::str::FromStr for ScenarioId {
    type Err = SimError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let wanted = s.to_lowercase();
        ScenarioId::all()
            .into_iter()
            .find(|id| id.name() == wanted || id.code().eq_ignore_ascii_case(&wanted))
            .ok_or_else(|| SimError::UnknownScenario(s.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_by_name_and_code() {
        assert_eq!("delayed_tasks".parse::<ScenarioId>().unwrap(), ScenarioId::DelayedTasks);
        assert_eq!("sch-003".parse::<ScenarioId>().unwrap(), ScenarioId::Cancellation);
        assert_eq!("Counter_Increment".parse::<ScenarioId>().unwrap(), ScenarioId::CounterIncrement);
        assert!(matches!(
            "nope".parse::<ScenarioId>(),
            Err(SimError::UnknownScenario(name)) if name == "nope"
        ));
    }

    #[test]
    fn test_names_unique() {
        let all = ScenarioId::all();
        let names: std::collections::HashSet<_> = all.iter().map(|s| s.name()).collect();
        assert_eq!(names.len(), all.len());
    }
}
