use std::fmt;

use grey_core::Sample;
use serde::{Deserialize, Serialize};

use crate::error::ScriptError;
use crate::sandbox::ProbeSandbox;
use crate::trace::TraceContext;

/// Output recorded on every evaluation that ran to completion.
pub const EXIT_CODE_OUTPUT: &str = "script.exit_code";

/// How the probe source is evaluated.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ScriptKind {
    /// ES module: may `import` the bridge and use top-level `await`.
    #[default]
    Module,
    /// Classic script: bridge functions are reached through globals only.
    Classic,
}

/// A JavaScript probe target.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScriptTarget {
    pub code: String,
    #[serde(default)]
    pub args: Vec<String>,
    #[serde(default)]
    pub kind: ScriptKind,
}

impl ScriptTarget {
    pub fn new(code: impl Into<String>) -> Self {
        Self {
            code: code.into(),
            ..Self::default()
        }
    }

    #[must_use]
    pub fn with_args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.args = args.into_iter().map(Into::into).collect();
        self
    }

    #[must_use]
    pub fn with_kind(mut self, kind: ScriptKind) -> Self {
        self.kind = kind;
        self
    }

    /// Evaluate the script under the current span's trace context.
    #[tracing::instrument(name = "target.script", skip(self), fields(script.kind = ?self.kind), err)]
    pub async fn run(&self) -> Result<Sample, ScriptError> {
        self.run_with_trace(TraceContext::current()).await
    }

    /// Evaluate the script on a blocking worker thread.
    ///
    /// The interpreter is `!Send`, so it is created, used and dropped on that
    /// thread.
    pub async fn run_with_trace(&self, trace: Option<TraceContext>) -> Result<Sample, ScriptError> {
        let target = self.clone();
        tokio::task::spawn_blocking(move || target.run_blocking(trace))
            .await
            .map_err(|e| ScriptError::Worker(e.to_string()))?
    }

    /// Evaluate the script on the calling thread.
    ///
    /// A successful run also records [`EXIT_CODE_OUTPUT`] as `0`, replacing
    /// any value the script gave it.
    pub fn run_blocking(&self, trace: Option<TraceContext>) -> Result<Sample, ScriptError> {
        let mut sample = ProbeSandbox::new(&self.args, trace)?.evaluate(&self.code, self.kind)?;
        sample.set(EXIT_CODE_OUTPUT, 0_i64);
        Ok(sample)
    }
}

impl fmt::Display for ScriptTarget {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let args = self
            .args
            .iter()
            .map(|a| serde_json::to_string(a).unwrap_or_else(|_| format!("\"{a}\"")))
            .collect::<Vec<_>>();
        write!(f, "probe.script({})", args.join(", "))
    }
}
