use chrono::{DateTime, Utc};

use cdp_domain::error::Result;

use super::FromValue;
use crate::value::{expect_record, Value};

/// Task type of a scheduled policy run.
pub const TASK_TYPE_POLICY: &str = "DATA_PROTECTION_POLICY";

pub const TASK_STATE_FINISHED: &str = "FINISHED";
pub const TASK_STATE_RUNNING: &str = "RUNNING";

/// One entry of the task history.
#[derive(Debug, Clone, PartialEq)]
pub struct TaskExecutionContext {
    pub id: String,
    pub task_type: String,
    pub task_state: String,
    pub execution_time: Option<DateTime<Utc>>,
}

impl TaskExecutionContext {
    pub fn is_policy_run(&self) -> bool {
        self.task_type == TASK_TYPE_POLICY
    }

    pub fn is_finished(&self) -> bool {
        self.task_state == TASK_STATE_FINISHED
    }

    pub fn is_running(&self) -> bool {
        self.task_state == TASK_STATE_RUNNING
    }
}

impl FromValue for TaskExecutionContext {
    fn from_value(value: Value) -> Result<Self> {
        let raw = expect_record(value, "task execution context")?;
        Ok(Self {
            id: raw.opt_str("id").unwrap_or_default(),
            task_type: raw.opt_str("taskType").unwrap_or_default(),
            task_state: raw.opt_str("taskState").unwrap_or_default(),
            execution_time: raw.opt_datetime("executionTime"),
        })
    }
}
