//! Extraction worker: runs one job through resolve → extract → route
//!
//! `run_job` claims the job's `EXTRACT` stage, resolves the input to a
//! local path, lets the extractor fill in fields, then either forwards the
//! job to the next stage or prints it as the terminal result.
//!
//! Failures split two ways. Content problems (file missing, unreadable,
//! extractor rejected the bytes) are written onto the job and the job still
//! travels on, so downstream consumers see them. Structural problems
//! (malformed request, unaddressable next stage, unimplemented extractor)
//! abort the invocation with a `SiftError`.

use crate::control::{ControlChannel, NullChannel, GET_LOCAL_FILE};
use crate::error::{SiftError, SiftResult};
use crate::extract::Extractor;
use crate::forward::{Forwarder, TcpTransport, Transport};
use crate::job::{value_text, ErrorCode, JobRecord, RoutingStage, STAGE_EXTRACT};
use crate::router::Router;
use crate::status::{StatusWriter, WorkerState};
use serde_json::{Map, Value};
use std::io::{self, Write};
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{debug, info, warn};

const EXTRACTOR: &str = "extractor";
const FILE: &str = "file";
const DESCRIPTION: &str = "description";

/// Keys copied from the job into a `GET_LOCAL_FILE` request
const LOCATION_KEYS: [&str; 3] = ["path", "location", "parts"];

/// Orchestrates one job at a time. Only the forwarding connection is kept
/// between jobs.
pub struct ExtractionWorker {
    vpid: String,
    extractor: Arc<dyn Extractor>,
    control: Arc<dyn ControlChannel>,
    forwarder: Forwarder,
    status: StatusWriter,
    output: Box<dyn Write + Send>,
}

impl ExtractionWorker {
    /// A worker with no control channel, TCP forwarding, status on stderr
    /// and results on stdout.
    pub fn new(vpid: impl Into<String>, extractor: Arc<dyn Extractor>) -> Self {
        Self {
            vpid: vpid.into(),
            extractor,
            control: Arc::new(NullChannel),
            forwarder: Forwarder::new(Arc::new(TcpTransport::new())),
            status: StatusWriter::stderr(),
            output: Box::new(io::stdout()),
        }
    }

    pub fn with_control_channel(mut self, control: Arc<dyn ControlChannel>) -> Self {
        self.control = control;
        self
    }

    pub fn with_transport(mut self, transport: Arc<dyn Transport>) -> Self {
        self.forwarder = Forwarder::new(transport);
        self
    }

    pub fn with_status(mut self, status: StatusWriter) -> Self {
        self.status = status;
        self
    }

    /// Where terminal results are printed.
    pub fn with_output(mut self, output: Box<dyn Write + Send>) -> Self {
        self.output = output;
        self
    }

    pub fn vpid(&self) -> &str {
        &self.vpid
    }

    pub fn status(&mut self) -> &mut StatusWriter {
        &mut self.status
    }

    /// Process one job end to end.
    ///
    /// Returns `Ok(true)` when everything succeeded and `Ok(false)` when the
    /// job was delivered carrying recorded failures. Structural errors are
    /// returned as `Err` and nothing is delivered.
    pub async fn run_job(&mut self, job: &mut JobRecord) -> SiftResult<bool> {
        let job_id = job.id();
        note_status(self.status.job_started(
            &job_id,
            job.get_timeout(),
            job.get_str(DESCRIPTION),
        ));

        match self.process(job).await {
            Ok(ok) => {
                let state = if ok {
                    WorkerState::Success
                } else {
                    WorkerState::Failed
                };
                info!(job_id = %job_id, ok, "job finished");
                note_status(self.status.send_state(state));
                Ok(ok)
            }
            Err(e) => {
                warn!(job_id = %job_id, error = %e, "job aborted");
                note_status(self.status.send_state(WorkerState::Failed));
                Err(e)
            }
        }
    }

    async fn process(&mut self, job: &mut JobRecord) -> SiftResult<bool> {
        let mut router = Router::new(self.vpid.clone());

        let extractor = match job.get(EXTRACTOR) {
            Some(Value::String(name)) if !name.is_empty() => name.clone(),
            Some(Value::String(_)) | Some(Value::Null) | None => {
                return Err(SiftError::JobSpec("job names no extractor".to_string()))
            }
            Some(other) => {
                return Err(SiftError::JobSpec(format!(
                    "extractor must be a string, got {}",
                    other
                )))
            }
        };

        if !self.extractor.accept(&extractor) {
            return Err(SiftError::JobSpec(format!("unknown extractor: {}", extractor)));
        }

        let mut ok = true;
        router.start(job, STAGE_EXTRACT);

        match self.resolve_path(job).await {
            Some(path) => {
                debug!(job_id = %job.id(), extractor = %extractor, path = %path.display(), "extracting");
                if let Err(e) = self.extractor.extract(&path, job, &extractor).await {
                    if !e.is_soft() {
                        return Err(SiftError::IllegalState(e.to_string()));
                    }
                    warn!(job_id = %job.id(), extractor = %extractor, error = %e, "extraction failed");
                    job.error(ErrorCode::ExtractionFail, e.to_string());
                    ok = false;
                }
            }
            None => {
                warn!(job_id = %job.id(), "input resolution failed");
                job.error(ErrorCode::ResolutionFail, "resolution failed");
                ok = false;
            }
        }

        self.route_result(&mut router, job).await?;
        Ok(ok)
    }

    /// Finish the claimed stage and deliver the job to wherever the route says.
    async fn route_result(&mut self, router: &mut Router, job: &mut JobRecord) -> SiftResult<()> {
        if !router.has_current() {
            debug!(job_id = %job.id(), "job has no {} stage, printing result", STAGE_EXTRACT);
            return self.emit_result(job);
        }

        let Some(index) = router.complete(job)? else {
            return self.emit_result(job);
        };

        let stage = job.stage(index).ok_or_else(|| {
            SiftError::Route(format!("route entry {} is not a stage descriptor", index))
        })?;
        if stage.is_nop() {
            return self.emit_result(job);
        }
        self.forward_result(job, stage).await
    }

    /// Resolve the job's input to an existing local file.
    ///
    /// Uses `file` when present, otherwise asks the control channel.
    /// Failures are appended to the job's error trace and yield `None`.
    pub async fn resolve_path(&mut self, job: &mut JobRecord) -> Option<PathBuf> {
        let direct = job
            .get(FILE)
            .filter(|v| !v.is_null())
            .map(value_text)
            .filter(|s| !s.is_empty());

        let candidate = match direct {
            Some(file) => PathBuf::from(file),
            None => self.request_local_file(job).await?,
        };

        if !candidate.exists() {
            job.error_trace(format!("file not found: {}", candidate.display()));
            return None;
        }

        note_status(
            self.status
                .send_message(&format!("reading {}", candidate.display())),
        );
        Some(candidate)
    }

    async fn request_local_file(&self, job: &mut JobRecord) -> Option<PathBuf> {
        let mut args = Map::new();
        for key in LOCATION_KEYS {
            if let Some(value) = job.get(key) {
                args.insert(key.to_string(), value.clone());
            }
        }

        match self
            .control
            .exec_command(GET_LOCAL_FILE, &Value::Object(args))
            .await
        {
            Ok(Some(answer)) => Some(PathBuf::from(answer)),
            Ok(None) => {
                job.error_trace(format!("{} returned no path", GET_LOCAL_FILE));
                None
            }
            Err(e) => {
                job.error_trace(format!("{} failed: {}", GET_LOCAL_FILE, e));
                None
            }
        }
    }

    /// Send the compact job JSON to `stage`'s address over the cached connection.
    pub async fn forward_result(&mut self, job: &JobRecord, stage: RoutingStage<'_>) -> SiftResult<()> {
        if !stage.is_routable() {
            return Err(SiftError::Route(format!(
                "stage {} ({}) has no address",
                stage.index(),
                stage.stage_type()
            )));
        }

        let payload = job.serialize(None)?;
        self.forwarder.send(stage.address(), &payload).await?;
        info!(
            job_id = %job.id(),
            stage = stage.stage_type(),
            address = stage.address(),
            "job forwarded"
        );
        Ok(())
    }

    /// Close the forwarding connection, if one is open.
    pub async fn shutdown(&mut self) {
        self.forwarder.close().await;
    }

    fn emit_result(&mut self, job: &JobRecord) -> SiftResult<()> {
        let text = job.serialize(Some(2))?;
        writeln!(self.output, "{}", text)?;
        self.output.flush()?;
        info!(job_id = %job.id(), "job result printed");
        Ok(())
    }
}

/// Status lines are best-effort; a closed supervisor pipe must not fail a job.
fn note_status(result: io::Result<()>) {
    if let Err(e) = result {
        warn!(error = %e, "status write failed");
    }
}

impl std::fmt::Debug for ExtractionWorker {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ExtractionWorker")
            .field("vpid", &self.vpid)
            .field("forwarder", &self.forwarder)
            .finish()
    }
}
