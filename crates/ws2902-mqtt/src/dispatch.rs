//! Ingest dispatcher: one station report in, one publish pair per known field out.

use crate::publisher::Publisher;
use crate::registry::SensorRegistry;
use crate::sensor::HandleError;
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;
use thiserror::Error;

/// One inbound batch of station key/value pairs.
pub type Report = HashMap<String, String>;

/// Collect query pairs into a `Report`. A repeated key keeps its first value.
pub fn report_from_pairs(pairs: impl IntoIterator<Item = (String, String)>) -> Report {
    let mut report = Report::new();
    for (key, value) in pairs {
        report.entry(key).or_insert(value);
    }
    report
}

/// A recognized field whose handling failed.
#[derive(Debug)]
pub struct FieldFailure {
    pub field: &'static str,
    pub error: HandleError,
}

impl fmt::Display for FieldFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.field, self.error)
    }
}

/// At least one recognized field in a report could not be published.
#[derive(Debug, Error)]
#[error("{} field(s) failed: {}", .failures.len(), join_failures(.failures))]
pub struct DispatchError {
    pub failures: Vec<FieldFailure>,
}

fn join_failures(failures: &[FieldFailure]) -> String {
    failures
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join("; ")
}

impl DispatchError {
    /// True when the station sent a value we could not normalize.
    pub fn has_transform_failure(&self) -> bool {
        self.failures
            .iter()
            .any(|f| matches!(f.error, HandleError::Transform(_)))
    }
}

/// Routes report fields to their sensor descriptors.
pub struct Dispatcher<P: Publisher> {
    registry: Arc<SensorRegistry>,
    publisher: Arc<P>,
    topic_prefix: String,
}

impl<P: Publisher> Dispatcher<P> {
    pub fn new(registry: Arc<SensorRegistry>, publisher: Arc<P>, topic_prefix: impl Into<String>) -> Self {
        Self {
            registry,
            publisher,
            topic_prefix: topic_prefix.into(),
        }
    }

    pub fn registry(&self) -> &SensorRegistry {
        &self.registry
    }

    pub fn topic_prefix(&self) -> &str {
        &self.topic_prefix
    }

    /// Handle every registered field present in `report`, in registry order.
    ///
    /// Unknown keys are skipped. A failing field does not stop the others;
    /// all failures are returned together. On success returns the number of
    /// fields handled, which may be zero.
    pub async fn dispatch(&self, report: &Report) -> Result<usize, DispatchError> {
        let mut handled = 0;
        let mut failures = Vec::new();

        for (field, sensor) in self.registry.iter() {
            let Some(value) = report.get(field) else {
                continue;
            };
            match sensor
                .handle(self.publisher.as_ref(), &self.topic_prefix, value)
                .await
            {
                Ok(()) => handled += 1,
                Err(error) => failures.push(FieldFailure { field, error }),
            }
        }

        if failures.is_empty() {
            Ok(handled)
        } else {
            Err(DispatchError { failures })
        }
    }
}
