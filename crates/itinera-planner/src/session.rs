use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::slots::Slots;

/// Which downstream path a turn takes once it leaves slot gathering.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PlanMode {
    #[default]
    NewPlan,
    RevisionPlan,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    Assistant,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TurnRecord {
    pub role: Role,
    pub content: String,
}

/// Results written by the research and synthesis stages.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StageOutputs {
    pub flight_info: Option<String>,
    pub accommodation_info: Option<String>,
    pub previous_plan: Option<String>,
}

/// Everything remembered about one conversation.
///
/// Only the workflow mutates this; `all_details_complete` is written
/// together with `slots` from the result of [`crate::merge`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SessionState {
    pub key: String,
    pub slots: Slots,
    pub all_details_complete: bool,
    pub mode: PlanMode,
    pub stage_outputs: StageOutputs,
    pub history: Vec<TurnRecord>,
    pub created_at: DateTime<Utc>,
    pub last_active: DateTime<Utc>,
}

impl SessionState {
    pub fn new(key: impl Into<String>) -> Self {
        let now = Utc::now();
        Self {
            key: key.into(),
            slots: Slots::default(),
            all_details_complete: false,
            mode: PlanMode::default(),
            stage_outputs: StageOutputs::default(),
            history: Vec::new(),
            created_at: now,
            last_active: now,
        }
    }

    pub fn push_history(&mut self, role: Role, content: impl Into<String>) {
        self.history.push(TurnRecord {
            role,
            content: content.into(),
        });
    }

    /// The last `window` records, oldest first.
    pub fn recent_history(&self, window: usize) -> &[TurnRecord] {
        let start = self.history.len().saturating_sub(window);
        &self.history[start..]
    }

    pub fn touch(&mut self) {
        self.last_active = Utc::now();
    }

    pub fn idle_for(&self, now: DateTime<Utc>) -> chrono::Duration {
        now - self.last_active
    }
}
