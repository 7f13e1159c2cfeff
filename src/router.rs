//! Router — claims and completes one stage of a job's route at a time
//!
//! Idle ⇄ Active(index). `start()` claims the first unfinished descriptor of
//! the requested type; `complete()` stamps it finished, reports the index of
//! the following descriptor (if any) and always returns to Idle.
//!
//! The route lives inside the job, so the router keeps only an index and
//! applies every stamp to the job it is handed. Stamps are therefore part of
//! whatever the job serializes to afterwards.

use crate::error::{SiftError, SiftResult};
use crate::job::{JobRecord, RoutingStage};
use chrono::Utc;
use serde_json::Value;
use tracing::debug;

const PID: &str = "pid";
const START: &str = "start";
const FINISHED: &str = "finished";

/// Per-invocation route state machine.
#[derive(Debug)]
pub struct Router {
    vpid: String,
    active: Option<usize>,
}

impl Router {
    pub fn new(vpid: impl Into<String>) -> Self {
        Self {
            vpid: vpid.into(),
            active: None,
        }
    }

    pub fn vpid(&self) -> &str {
        &self.vpid
    }

    /// Claim the first unfinished descriptor whose type is `stage_type`.
    ///
    /// Stamps `pid` and `start` on it and becomes Active. Returns false and
    /// stays Idle when nothing matches; a job without that stage is valid.
    pub fn start(&mut self, job: &mut JobRecord, stage_type: &str) -> bool {
        let claimed = (0..job.route().len()).find(|&index| {
            job.stage(index)
                .is_some_and(|s| s.stage_type() == stage_type && !s.is_finished())
        });

        let Some(index) = claimed else {
            debug!(job_id = %job.id(), stage = stage_type, "no unfinished stage to claim");
            return false;
        };

        if let Some(entry) = job.route_entry_mut(index) {
            entry.insert(PID.to_string(), Value::String(self.vpid.clone()));
            entry.insert(START.to_string(), now_timestamp());
        }
        debug!(job_id = %job.id(), stage = stage_type, index, "stage claimed");
        self.active = Some(index);
        true
    }

    pub fn has_current(&self) -> bool {
        self.active.is_some()
    }

    pub fn started(&self) -> bool {
        self.has_current()
    }

    /// The active descriptor, or `None` while Idle.
    pub fn current_stage<'a>(&self, job: &'a JobRecord) -> Option<RoutingStage<'a>> {
        self.active.and_then(|index| job.stage(index))
    }

    /// First descriptor of type `name`, regardless of router state.
    pub fn get_stage<'a>(&self, job: &'a JobRecord, name: &str) -> Option<RoutingStage<'a>> {
        (0..job.route().len())
            .filter_map(|index| job.stage(index))
            .find(|s| s.stage_type() == name)
    }

    /// Finish the active stage.
    ///
    /// Returns the index of the next descriptor when the route has one.
    /// Read it with [`JobRecord::stage`]. Calling this while Idle is an
    /// `IllegalState` error.
    pub fn complete(&mut self, job: &mut JobRecord) -> SiftResult<Option<usize>> {
        let index = self.active.take().ok_or_else(|| {
            SiftError::IllegalState("complete() called with no active stage".to_string())
        })?;

        if let Some(entry) = job.route_entry_mut(index) {
            entry.insert(FINISHED.to_string(), now_timestamp());
        }

        let next = index + 1;
        debug!(job_id = %job.id(), index, has_next = next < job.route().len(), "stage completed");
        Ok((next < job.route().len()).then_some(next))
    }
}

/// Seconds since the Unix epoch with millisecond resolution.
fn now_timestamp() -> Value {
    Value::from(Utc::now().timestamp_millis() as f64 / 1000.0)
}
