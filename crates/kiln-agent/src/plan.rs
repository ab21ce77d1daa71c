use serde::{Deserialize, Serialize};
use std::sync::{Arc, Mutex, MutexGuard};

use crate::ToolError;

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PlanStepStatus {
    #[default]
    Pending,
    InProgress,
    Completed,
}

impl PlanStepStatus {
    fn marker(self) -> &'static str {
        match self {
            Self::Pending => "[ ]",
            Self::InProgress => "[~]",
            Self::Completed => "[x]",
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlanStep {
    pub title: String,
    pub status: PlanStepStatus,
}

impl PlanStep {
    pub fn new(title: impl Into<String>, status: PlanStepStatus) -> Self {
        Self {
            title: title.into(),
            status,
        }
    }
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlanSnapshot {
    pub steps: Vec<PlanStep>,
}

impl PlanSnapshot {
    pub fn completed(&self) -> usize {
        self.steps
            .iter()
            .filter(|step| step.status == PlanStepStatus::Completed)
            .count()
    }

    pub fn render(&self) -> String {
        self.steps
            .iter()
            .map(|step| format!("- {} {}", step.status.marker(), step.title))
            .collect::<Vec<_>>()
            .join("\n")
    }
}

/// Shared plan handle. Each run creates its own store and passes it to the
/// tools that need it; clones observe the same plan.
#[derive(Clone, Debug, Default)]
pub struct PlanStore {
    inner: Arc<Mutex<Vec<PlanStep>>>,
}

impl PlanStore {
    pub fn replace(&self, steps: Vec<PlanStep>) -> PlanSnapshot {
        let mut guard = self.lock();
        *guard = steps;
        PlanSnapshot {
            steps: guard.clone(),
        }
    }

    pub fn set_status(
        &self,
        index: usize,
        status: PlanStepStatus,
    ) -> Result<PlanSnapshot, ToolError> {
        let mut guard = self.lock();
        let step_count = guard.len();
        let step = guard.get_mut(index).ok_or_else(|| {
            ToolError::Validation(format!(
                "plan step {} does not exist; the plan has {} step(s)",
                index + 1,
                step_count
            ))
        })?;
        step.status = status;
        Ok(PlanSnapshot {
            steps: guard.clone(),
        })
    }

    pub fn snapshot(&self) -> PlanSnapshot {
        PlanSnapshot {
            steps: self.lock().clone(),
        }
    }

    pub fn clear(&self) {
        self.lock().clear();
    }

    fn lock(&self) -> MutexGuard<'_, Vec<PlanStep>> {
        // A poisoned plan is still a valid list of steps.
        self.inner
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

/// Parses a markdown checklist (`- [ ] a`, `- [~] b`, `- [x] c`) into plan
/// steps. Bullet lines without a checkbox are pending steps.
pub fn parse_plan_steps(body: &str) -> Result<Vec<PlanStep>, ToolError> {
    let mut steps = Vec::new();
    for line in body.lines().map(str::trim).filter(|line| !line.is_empty()) {
        let item = line
            .strip_prefix("- ")
            .or_else(|| line.strip_prefix("* "))
            .unwrap_or(line)
            .trim_start();

        let (status, title) = if let Some(rest) = item.strip_prefix("[ ]") {
            (PlanStepStatus::Pending, rest)
        } else if let Some(rest) = item.strip_prefix("[~]") {
            (PlanStepStatus::InProgress, rest)
        } else if let Some(rest) = item
            .strip_prefix("[x]")
            .or_else(|| item.strip_prefix("[X]"))
        {
            (PlanStepStatus::Completed, rest)
        } else {
            (PlanStepStatus::Pending, item)
        };

        let title = title.trim();
        if title.is_empty() {
            return Err(ToolError::Validation(format!(
                "plan line '{line}' has no step title"
            )));
        }
        steps.push(PlanStep::new(title, status));
    }

    if steps.is_empty() {
        return Err(ToolError::Validation(
            "plan body is empty; provide one '- [ ] step' line per step".to_string(),
        ));
    }
    Ok(steps)
}
