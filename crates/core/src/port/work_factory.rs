// Work Factory Port
// Builds one unit of work per input. Adapter-level validation happens here,
// before any Job exists.

use crate::domain::{JobError, JobKind};
use crate::port::UnitOfWork;

pub trait WorkFactory: Send + Sync {
    /// # Errors
    /// `ErrorKind::Validation` when the input cannot be processed at all
    /// (missing file, no pipeline configured for `kind`, ...).
    fn build(
        &self,
        kind: JobKind,
        input: &str,
        settings: &serde_json::Value,
    ) -> Result<Box<dyn UnitOfWork>, JobError>;
}

// ============================================================================
// Mock Implementations for Testing
// ============================================================================

pub mod mocks {
    use super::*;
    use crate::port::{ProgressReporter, WorkResult};
    use async_trait::async_trait;
    use serde_json::json;
    use std::collections::{HashMap, HashSet};
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    /// One scripted action
    #[derive(Debug, Clone)]
    pub enum Step {
        Progress(i64, String),
        Sleep(Duration),
        Fail(JobError),
        /// Actually panic (for panic isolation testing)
        Panic(String),
        /// Park until cancellation is requested, then fail with CANCELLED
        WaitForCancel,
        /// Finish early with this value
        Return(serde_json::Value),
    }

    impl Step {
        pub fn progress(percent: i64, message: impl Into<String>) -> Self {
            Step::Progress(percent, message.into())
        }

        pub fn sleep_ms(ms: u64) -> Self {
            Step::Sleep(Duration::from_millis(ms))
        }
    }

    /// Unit of work that replays a script against its reporter
    pub struct ScriptedWork {
        input: String,
        steps: Vec<Step>,
    }

    impl ScriptedWork {
        pub fn new(input: impl Into<String>, steps: Vec<Step>) -> Self {
            Self {
                input: input.into(),
                steps,
            }
        }
    }

    #[async_trait]
    impl UnitOfWork for ScriptedWork {
        async fn run(self: Box<Self>, progress: ProgressReporter) -> WorkResult {
            for step in self.steps {
                match step {
                    Step::Progress(pct, msg) => progress.report(pct, msg),
                    Step::Sleep(d) => tokio::time::sleep(d).await,
                    Step::Fail(err) => return Err(err),
                    Step::Panic(msg) => panic!("{}", msg),
                    Step::WaitForCancel => {
                        progress.cancelled().await;
                        return Err(JobError::cancelled("stopped on request"));
                    }
                    Step::Return(value) => return Ok(value),
                }
            }
            Ok(json!({ "type": "single", "input": self.input }))
        }
    }

    /// Factory handing out `ScriptedWork`, with per-input overrides
    pub struct ScriptedWorkFactory {
        default_steps: Vec<Step>,
        per_input: HashMap<String, Vec<Step>>,
        invalid: HashSet<String>,
        built: AtomicUsize,
    }

    impl ScriptedWorkFactory {
        pub fn new(default_steps: Vec<Step>) -> Self {
            Self {
                default_steps,
                per_input: HashMap::new(),
                invalid: HashSet::new(),
                built: AtomicUsize::new(0),
            }
        }

        pub fn with_input(mut self, input: impl Into<String>, steps: Vec<Step>) -> Self {
            self.per_input.insert(input.into(), steps);
            self
        }

        /// `build` fails with VALIDATION for this input
        pub fn with_invalid_input(mut self, input: impl Into<String>) -> Self {
            self.invalid.insert(input.into());
            self
        }

        pub fn built_count(&self) -> usize {
            self.built.load(Ordering::SeqCst)
        }
    }

    impl WorkFactory for ScriptedWorkFactory {
        fn build(
            &self,
            _kind: JobKind,
            input: &str,
            _settings: &serde_json::Value,
        ) -> Result<Box<dyn UnitOfWork>, JobError> {
            if self.invalid.contains(input) {
                return Err(JobError::validation(format!("File not found: {input}")));
            }
            self.built.fetch_add(1, Ordering::SeqCst);
            let steps = self
                .per_input
                .get(input)
                .cloned()
                .unwrap_or_else(|| self.default_steps.clone());
            Ok(Box::new(ScriptedWork::new(input, steps)))
        }
    }
}
