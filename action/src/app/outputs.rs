//! Run outputs and job summaries

use async_trait::async_trait;
use tracing::{info, warn};

use crate::filesys::file::File;

pub const PACKAGE_PATH: &str = "packagePath";
pub const PACKAGE_ID: &str = "packageId";
pub const DEPLOYMENT_TASK_ID: &str = "deploymentTaskId";
pub const ROLLBACK_TASK_ID: &str = "rollbackTaskId";

/// A titled block of key/value lines for the job summary
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Summary {
    pub heading: String,
    pub rows: Vec<(String, String)>,
}

impl Summary {
    pub fn new(heading: impl Into<String>) -> Self {
        Self {
            heading: heading.into(),
            rows: Vec::new(),
        }
    }

    pub fn row(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.rows.push((key.into(), value.into()));
        self
    }

    /// Render as Markdown
    pub fn to_markdown(&self) -> String {
        let mut out = format!("## {}\n\n---\n\n```\n", self.heading);
        for (key, value) in &self.rows {
            out.push_str(&format!("{}: {}\n", key, value));
        }
        out.push_str("```\n\n");
        out
    }
}

/// `::error::` workflow command marking the run as failed
pub fn error_annotation(message: &str) -> String {
    let escaped = message
        .replace('%', "%25")
        .replace('\r', "%0D")
        .replace('\n', "%0A");
    format!("::error::{}", escaped)
}

/// Sink for values an external monitor reads while the run is in progress.
/// Reporting never fails the run.
#[async_trait]
pub trait Reporter: Send + Sync {
    async fn set_output(&self, name: &str, value: &str);

    async fn summary(&self, summary: Summary);
}

/// Reporter writing to the GitHub Actions output and step summary files
#[derive(Debug, Clone, Default)]
pub struct ActionReporter {
    output_file: Option<File>,
    summary_file: Option<File>,
}

impl ActionReporter {
    pub fn new(output_file: Option<File>, summary_file: Option<File>) -> Self {
        Self {
            output_file,
            summary_file,
        }
    }

    /// Use `GITHUB_OUTPUT` and `GITHUB_STEP_SUMMARY` when the runner sets them
    pub fn from_env() -> Self {
        let file_from = |var: &str| {
            std::env::var(var)
                .ok()
                .filter(|path| !path.is_empty())
                .map(File::new)
        };
        Self::new(file_from("GITHUB_OUTPUT"), file_from("GITHUB_STEP_SUMMARY"))
    }
}

#[async_trait]
impl Reporter for ActionReporter {
    async fn set_output(&self, name: &str, value: &str) {
        info!("Output {} = {}", name, value);
        if let Some(file) = &self.output_file {
            if let Err(e) = file.append_string(&format!("{}={}\n", name, value)).await {
                warn!("Unable to write output {}: {}", name, e);
            }
        }
    }

    async fn summary(&self, summary: Summary) {
        for (key, value) in &summary.rows {
            info!("{}: {}", key, value);
        }
        if let Some(file) = &self.summary_file {
            if let Err(e) = file.append_string(&summary.to_markdown()).await {
                warn!("Unable to write job summary: {}", e);
            }
        }
    }
}
