// WorkFactory backed by configured pipeline commands

use crate::command_work::{CommandWork, DEFAULT_TERMINATE_GRACE};
use crate::pipeline::{filter_env, PipelineCommand, Placeholders};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::debug;
use verba_core::domain::{JobError, JobKind};
use verba_core::port::{UnitOfWork, WorkFactory};

pub struct CommandWorkFactory {
    pipelines: HashMap<JobKind, PipelineCommand>,
    output_dir: PathBuf,
    terminate_grace: Duration,
}

impl CommandWorkFactory {
    pub fn new(
        pipelines: HashMap<JobKind, PipelineCommand>,
        output_dir: impl Into<PathBuf>,
    ) -> Self {
        Self {
            pipelines,
            output_dir: output_dir.into(),
            terminate_grace: DEFAULT_TERMINATE_GRACE,
        }
    }

    pub fn with_terminate_grace(mut self, grace: Duration) -> Self {
        self.terminate_grace = grace;
        self
    }

    pub fn configured_kinds(&self) -> Vec<JobKind> {
        JobKind::ALL
            .into_iter()
            .filter(|kind| self.pipelines.contains_key(kind))
            .collect()
    }
}

impl WorkFactory for CommandWorkFactory {
    fn build(
        &self,
        kind: JobKind,
        input: &str,
        settings: &serde_json::Value,
    ) -> Result<Box<dyn UnitOfWork>, JobError> {
        let pipeline = self
            .pipelines
            .get(&kind)
            .ok_or_else(|| {
                JobError::validation(format!("No pipeline configured for {kind} jobs"))
            })?;

        if !Path::new(input).is_file() {
            return Err(JobError::validation(format!("File not found: {input}")));
        }

        let placeholders = Placeholders::for_input(input, &self.output_dir, &pipeline.output_ext);
        let args = pipeline
            .args
            .iter()
            .map(|arg| placeholders.render(arg))
            .collect();
        let env = filter_env(std::env::vars(), &pipeline.allowlist());

        debug!(kind = %kind, input = %input, program = %pipeline.command, "Built pipeline command");
        let work = CommandWork::new(input, placeholders.output, &pipeline.command, args)
            .with_env(env)
            .with_settings(settings.clone())
            .with_timeout(pipeline.timeout_secs.map(Duration::from_secs))
            .with_terminate_grace(self.terminate_grace);
        Ok(Box::new(work))
    }
}
