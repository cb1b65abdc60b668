use serde_json::Value;

use crate::error::PublishResult;
use crate::poll::{self, PollOptions};
use crate::resource::model::Resource;

/// Whether the job entered the approval queue instead of running
pub fn submitted_for_approval(job: &Resource) -> bool {
    job.attribute("key").and_then(Value::as_str) == Some("approval_submitted")
}

/// The job's status. Jobs waiting for approval report
/// `submitted_for_approval`.
pub fn status(job: &Resource) -> Option<&str> {
    if submitted_for_approval(job) {
        return Some("submitted_for_approval");
    }

    job.attribute("status").and_then(Value::as_str)
}

/// Whether the job has succeeded, failed or been submitted for approval
pub fn is_complete(job: &Resource) -> bool {
    matches!(
        status(job),
        Some("successful" | "failure" | "submitted_for_approval")
    )
}

/// Waits for the job to finish.
///
/// A job in the approval queue counts as finished right away. A job whose
/// status turns to `failure` ends the wait with
/// [`PublishError::ResourceFailed`](crate::error::PublishError::ResourceFailed).
pub async fn wait_for_finish<'j, P>(
    job: &'j mut Resource,
    progress: P,
    options: &PollOptions,
) -> PublishResult<&'j mut Resource>
where
    P: FnMut(&Resource),
{
    if submitted_for_approval(job) {
        return Ok(job);
    }

    poll::wait_for_finish(
        job,
        |j| j.is_set("finished_at") || submitted_for_approval(j),
        |j| status(j) == Some("failure"),
        progress,
        options,
    )
    .await
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;
    use crate::error::PublishError;
    use crate::resource::kind::ResourceKind;
    use crate::test_utils::{envelope, ScriptedTransport};

    const JOB: &str = "/api/publishing/v1/job/77";

    fn job(attributes: Value) -> Value {
        envelope(attributes, json!({"show": JOB}))
    }

    #[test]
    fn test_status() {
        let running = Resource::from_response(
            ResourceKind::Job,
            ScriptedTransport::unreachable(),
            job(json!({"status": "in_progress", "finished_at": null})),
            None,
        )
        .unwrap();
        let queued = Resource::from_response(
            ResourceKind::Job,
            ScriptedTransport::unreachable(),
            job(json!({"status": "initializing", "key": "approval_submitted"})),
            None,
        )
        .unwrap();

        assert_eq!(status(&running), Some("in_progress"));
        assert!(!is_complete(&running));
        assert_eq!(status(&queued), Some("submitted_for_approval"));
        assert!(is_complete(&queued));
    }

    #[tokio::test]
    async fn test_approval_queue_does_not_poll() {
        let mut queued = Resource::from_response(
            ResourceKind::Job,
            ScriptedTransport::unreachable(),
            job(json!({"status": "initializing", "key": "approval_submitted"})),
            None,
        )
        .unwrap();

        let result = wait_for_finish(&mut queued, poll::noop, &PollOptions::default()).await;

        assert!(result.is_ok());
    }

    #[tokio::test(start_paused = true)]
    async fn test_waits_until_finished() {
        let transport = ScriptedTransport::new(|_| {
            Ok(job(json!({"status": "successful", "finished_at": "2024-01-01T00:00:00Z"})))
        });
        let mut running = Resource::from_response(
            ResourceKind::Job,
            transport.clone(),
            job(json!({"status": "in_progress", "finished_at": null})),
            None,
        )
        .unwrap();
        let mut seen = Vec::new();

        wait_for_finish(
            &mut running,
            |j| seen.push(status(j).map(str::to_string)),
            &PollOptions::default(),
        )
        .await
        .unwrap();

        assert_eq!(seen, vec![Some("successful".to_string())]);
        assert!(is_complete(&running));
        assert_eq!(transport.requests().len(), 1);
    }

    #[tokio::test]
    async fn test_failed_job() {
        let transport = ScriptedTransport::new(|_| {
            Ok(job(json!({"status": "failure", "finished_at": null})))
        });
        let mut running = Resource::from_response(
            ResourceKind::Job,
            transport,
            job(json!({"status": "in_progress", "finished_at": null})),
            None,
        )
        .unwrap();

        let error = wait_for_finish(&mut running, poll::noop, &PollOptions::default())
            .await
            .unwrap_err();

        match error {
            PublishError::ResourceFailed { body } => assert_eq!(body["status"], json!("failure")),
            other => panic!("Unexpected error: {other:?}"),
        }
    }
}
