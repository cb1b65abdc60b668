//! Waiting for asynchronous server work.
//!
//! Output schemas, jobs and sources all finish their work in the background.
//! [`wait_for_finish`] re-fetches such a resource until a caller-supplied
//! predicate says it is done, riding out short outages of the service.

use std::time::Duration;

use serde_json::Value;
use tokio::time::Instant;

use crate::config::ClientConfig;
use crate::error::{PublishError, PublishResult};
use crate::resource::model::Resource;

/// Timing policy for [`wait_for_finish`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PollOptions {
    /// Give up after this long. `None` waits forever.
    pub timeout: Option<Duration>,
    /// Pause between successful fetches
    pub interval: Duration,
    /// Pause after a transient fetch failure
    pub retry_pause: Duration,
    /// Transient failures tolerated in a row before giving up
    pub max_consecutive_failures: u32,
}

impl Default for PollOptions {
    fn default() -> Self {
        Self::from(&ClientConfig::new(""))
    }
}

impl From<&ClientConfig> for PollOptions {
    fn from(config: &ClientConfig) -> Self {
        Self {
            timeout: config.poll.timeout_secs.map(Duration::from_secs),
            interval: Duration::from_secs(config.poll.interval_secs),
            retry_pause: Duration::from_millis(config.poll.retry_pause_millis),
            max_consecutive_failures: config.poll.max_consecutive_failures,
        }
    }
}

impl PollOptions {
    pub fn with_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn with_interval(mut self, interval: Duration) -> Self {
        self.interval = interval;
        self
    }

    pub fn with_retry_pause(mut self, retry_pause: Duration) -> Self {
        self.retry_pause = retry_pause;
        self
    }

    pub fn with_max_consecutive_failures(mut self, max: u32) -> Self {
        self.max_consecutive_failures = max;
        self
    }
}

/// A progress hook that does nothing
pub fn noop(_: &Resource) {}

/// Polls `resource` until `finished` holds.
///
/// Each round re-fetches the resource with `show()`. After every successful
/// fetch `progress` is called and `failed` is evaluated; a failed resource
/// ends the wait with [`PublishError::ResourceFailed`] carrying its last
/// attributes.
///
/// Transient fetch failures (connection errors, 5xx) are retried after
/// `options.retry_pause` without calling `progress`. More than
/// `options.max_consecutive_failures` of them in a row re-raises the last
/// one. Any other failure propagates immediately.
///
/// # Arguments
/// * `resource` - The resource to wait on; it holds the final state on return
/// * `finished` - Whether the remote work is done
/// * `failed` - Whether the remote work reported failure
/// * `progress` - Called with every freshly fetched state
/// * `options` - Timing policy
///
/// # Returns
/// The finished resource, or the error that ended the wait.
pub async fn wait_for_finish<'r, F, X, P>(
    resource: &'r mut Resource,
    finished: F,
    failed: X,
    mut progress: P,
    options: &PollOptions,
) -> PublishResult<&'r mut Resource>
where
    F: Fn(&Resource) -> bool,
    X: Fn(&Resource) -> bool,
    P: FnMut(&Resource),
{
    let started = Instant::now();
    let mut failures = 0u32;

    loop {
        if finished(resource) {
            return Ok(resource);
        }

        let elapsed = started.elapsed();
        if options.timeout.is_some_and(|timeout| elapsed > timeout) {
            return Err(PublishError::Timeout {
                elapsed,
                resource: resource.kind().to_string(),
                body: Value::Object(resource.attributes().clone()),
            });
        }

        tracing::debug!(kind = %resource.kind(), ?elapsed, "Polling");

        match resource.show().await {
            Ok(_) => failures = 0,
            Err(error) if error.is_transient() => {
                failures += 1;
                if failures > options.max_consecutive_failures {
                    return Err(error);
                }

                tracing::warn!(
                    kind = %resource.kind(),
                    failures,
                    %error,
                    "Transient failure while polling, retrying"
                );
                tokio::time::sleep(options.retry_pause).await;
                continue;
            }
            Err(error) => return Err(error),
        }

        progress(resource);

        if failed(resource) {
            return Err(PublishError::ResourceFailed {
                body: Value::Object(resource.attributes().clone()),
            });
        }

        if !finished(resource) {
            tokio::time::sleep(options.interval).await;
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    use reqwest::Method;
    use serde_json::json;

    use super::*;
    use crate::resource::kind::ResourceKind;
    use crate::test_utils::{envelope, server_error, ScriptedTransport};

    const SHOW: &str = "/api/publishing/v1/job/7";

    fn job(status: &str) -> Value {
        envelope(json!({"id": 7, "status": status}), json!({"show": SHOW}))
    }

    fn is_done(resource: &Resource) -> bool {
        resource.attribute("status") == Some(&json!("successful"))
    }

    fn is_failed(resource: &Resource) -> bool {
        resource.attribute("status") == Some(&json!("failed"))
    }

    fn options() -> PollOptions {
        PollOptions::default()
            .with_interval(Duration::from_secs(1))
            .with_retry_pause(Duration::from_millis(500))
    }

    fn start(transport: Arc<ScriptedTransport>) -> Resource {
        Resource::from_response(ResourceKind::Job, transport, job("in_progress"), None).unwrap()
    }

    #[tokio::test(start_paused = true)]
    async fn test_finishes_after_three_fetches() {
        let fetches = Arc::new(AtomicUsize::new(0));
        let counter = fetches.clone();
        let transport = ScriptedTransport::new(move |_| {
            let n = counter.fetch_add(1, Ordering::SeqCst) + 1;
            Ok(job(if n == 3 { "successful" } else { "in_progress" }))
        });
        let mut resource = start(transport.clone());
        let mut progress_calls = 0;

        wait_for_finish(
            &mut resource,
            is_done,
            is_failed,
            |_| progress_calls += 1,
            &options(),
        )
        .await
        .expect("Failed to wait");

        assert_eq!(transport.count(Method::GET, SHOW), 3);
        assert_eq!(progress_calls, 3);
        assert!(is_done(&resource));
    }

    #[tokio::test(start_paused = true)]
    async fn test_already_finished_does_not_fetch() {
        let transport = ScriptedTransport::unreachable();
        let mut resource =
            Resource::from_response(ResourceKind::Job, transport, job("successful"), None)
                .unwrap();

        let result = wait_for_finish(&mut resource, is_done, is_failed, noop, &options()).await;

        assert!(result.is_ok());
    }

    #[tokio::test(start_paused = true)]
    async fn test_failed_resource_raises_on_first_fetch() {
        let transport = ScriptedTransport::new(|_| Ok(job("failed")));
        let mut resource = start(transport.clone());

        let error = wait_for_finish(&mut resource, is_done, is_failed, noop, &options())
            .await
            .expect_err("Expected the resource to fail");

        match error {
            PublishError::ResourceFailed { body } => assert_eq!(body["status"], json!("failed")),
            other => panic!("Unexpected error: {other:?}"),
        }
        assert_eq!(transport.requests().len(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_times_out() {
        let transport = ScriptedTransport::new(|_| Ok(job("in_progress")));
        let mut resource = start(transport);
        let options = options().with_timeout(Some(Duration::from_secs(2)));

        let started = Instant::now();
        let error = wait_for_finish(&mut resource, is_done, is_failed, noop, &options)
            .await
            .expect_err("Expected a timeout");

        match error {
            PublishError::Timeout {
                elapsed,
                resource,
                body,
            } => {
                assert!(elapsed > Duration::from_secs(2));
                assert!(elapsed < Duration::from_millis(3100));
                assert_eq!(resource, "Job");
                assert_eq!(body["status"], json!("in_progress"));
            }
            other => panic!("Unexpected error: {other:?}"),
        }
        assert!(started.elapsed() < Duration::from_millis(3100));
    }

    #[tokio::test(start_paused = true)]
    async fn test_consecutive_transient_failures_are_reraised() {
        let transport = ScriptedTransport::new(|_| Err(server_error(503)));
        let mut resource = start(transport.clone());
        let mut progress_calls = 0;

        let error = wait_for_finish(
            &mut resource,
            is_done,
            is_failed,
            |_| progress_calls += 1,
            &options(),
        )
        .await
        .expect_err("Expected the outage to surface");

        assert_eq!(error.status(), Some(503));
        assert_eq!(transport.requests().len(), 6);
        assert_eq!(progress_calls, 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_transient_failures_reset_after_success() {
        // Five failures, one success, five failures, then done
        let fetches = Arc::new(AtomicUsize::new(0));
        let counter = fetches.clone();
        let transport = ScriptedTransport::new(move |_| {
            let n = counter.fetch_add(1, Ordering::SeqCst) + 1;
            match n {
                6 => Ok(job("in_progress")),
                12 => Ok(job("successful")),
                _ => Err(server_error(502)),
            }
        });
        let mut resource = start(transport.clone());

        let result = wait_for_finish(&mut resource, is_done, is_failed, noop, &options()).await;

        assert!(result.is_ok());
        assert_eq!(transport.requests().len(), 12);
    }

    #[tokio::test(start_paused = true)]
    async fn test_client_error_propagates_immediately() {
        let transport = ScriptedTransport::new(|_| Err(server_error(404)));
        let mut resource = start(transport.clone());

        let error = wait_for_finish(&mut resource, is_done, is_failed, noop, &options())
            .await
            .expect_err("Expected a client error");

        assert_eq!(error.status(), Some(404));
        assert_eq!(transport.requests().len(), 1);
    }

    #[test]
    fn test_options_from_config() {
        let config = ClientConfig::new("https://data.example.org").with_poll_timeout(None);
        let options = PollOptions::from(&config);

        assert_eq!(options.timeout, None);
        assert_eq!(options.interval, Duration::from_secs(1));
        assert_eq!(options.retry_pause, Duration::from_millis(500));
        assert_eq!(options.max_consecutive_failures, 5);
    }
}
