//! Output schemas: the result of transforming an input schema.
//!
//! Processing an output schema can end two different ways that callers
//! usually want to tell apart. A transform can fail outright, or every
//! transform can complete while some rows are flagged with data errors.
//! Both signals are exposed separately, and [`outcome`] combines them.

use serde_json::Value;

use crate::error::PublishResult;
use crate::poll::{self, PollOptions};
use crate::resource::model::Resource;

/// Where the processing of an output schema stands
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProcessingOutcome {
    /// Still transforming and validating
    Pending,
    /// At least one column transform failed
    Failed,
    /// Finished, but this many rows had data errors
    CompletedWithErrors(u64),
    /// Finished without errors
    Completed,
}

/// Whether any column transform of the output schema has failed
pub fn any_failed(output_schema: &Resource) -> bool {
    output_schema
        .attribute("output_columns")
        .and_then(Value::as_array)
        .map(|columns| {
            columns.iter().any(|column| {
                column
                    .get("transform")
                    .and_then(|transform| transform.get("failed_at"))
                    .is_some_and(|failed_at| !failed_at.is_null())
            })
        })
        .unwrap_or(false)
}

/// Number of rows flagged with data errors
pub fn error_count(output_schema: &Resource) -> u64 {
    output_schema
        .attribute("error_count")
        .and_then(Value::as_u64)
        .unwrap_or(0)
}

/// Whether processing flagged any data errors
pub fn any_errors(output_schema: &Resource) -> bool {
    error_count(output_schema) > 0
}

pub fn is_complete(output_schema: &Resource) -> bool {
    output_schema.is_set("completed_at")
}

/// Combines the failure and data error signals
pub fn outcome(output_schema: &Resource) -> ProcessingOutcome {
    if any_failed(output_schema) {
        ProcessingOutcome::Failed
    } else if !is_complete(output_schema) {
        ProcessingOutcome::Pending
    } else if any_errors(output_schema) {
        ProcessingOutcome::CompletedWithErrors(error_count(output_schema))
    } else {
        ProcessingOutcome::Completed
    }
}

/// Waits until every transform has completed.
///
/// A failed transform ends the wait with
/// [`PublishError::ResourceFailed`](crate::error::PublishError::ResourceFailed).
/// Data errors do not; check [`any_errors`] afterwards.
pub async fn wait_for_finish<'o, P>(
    output_schema: &'o mut Resource,
    progress: P,
    options: &PollOptions,
) -> PublishResult<&'o mut Resource>
where
    P: FnMut(&Resource),
{
    poll::wait_for_finish(output_schema, is_complete, any_failed, progress, options).await
}
