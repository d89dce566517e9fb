//! Execution plans shared by agents during a turn.
//!
//! A plan is an ordered list of tasks with a status each. Agents resend the
//! whole plan on every change; clients replace their copy rather than
//! patching it.

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

/// The agent's current plan for the active turn.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct Plan {
    /// Complete list of plan entries, in execution order.
    pub entries: Vec<PlanEntry>,
}

/// One task within a plan.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct PlanEntry {
    /// Human-readable description of the task.
    pub content: String,
    pub priority: PlanEntryPriority,
    pub status: PlanEntryStatus,
}

/// Relative importance of a plan entry.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, JsonSchema, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum PlanEntryPriority {
    High,
    Medium,
    Low,
}

/// Progress of a plan entry.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, JsonSchema, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum PlanEntryStatus {
    Pending,
    InProgress,
    Completed,
}
