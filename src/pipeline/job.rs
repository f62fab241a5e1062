//! Job stage: create the processing job and poll it until it settles.
//!
//! ## Polling policy
//!
//! The loop sleeps one poll interval, reads the status, reports it, and
//! repeats. It is strictly sequential: a slow status request delays the next
//! poll instead of overlapping it. After `max_polls` reads without a
//! terminal status the run fails with [`D2xError::PollTimeout`]; no extra
//! read is made past the limit.
//!
//! Displayed progress ramps linearly from 45 % towards 95 % over the poll
//! budget (see [`processing_percentage`]) so the bar keeps moving while the
//! server gives no finer-grained progress.

use crate::api::ApiClient;
use crate::config::ClientConfig;
use crate::error::D2xError;
use crate::model::{DocumentType, Job, JobResponse, JobStatus};
use crate::progress::ConversionProgressCallback;
use tokio::time::sleep;
use tracing::{debug, info, warn};

/// Percentage reported right after job creation, before the first poll.
pub const PROCESSING_START_PERCENT: f64 = 45.0;

/// Ceiling of the polling ramp; the last 5 % belong to the download step.
pub const PROCESSING_CAP_PERCENT: f64 = 95.0;

/// Create a job for an uploaded object.
pub async fn create_job(
    client: &ApiClient,
    input_file_key: &str,
    document_type: DocumentType,
) -> Result<JobResponse, D2xError> {
    let job = client.create_job(input_file_key, document_type).await?;
    info!("Created {} job {} ({})", document_type, job.job_id, job.status);
    Ok(job)
}

/// Displayed percentage after `poll_count` polls:
/// `min(45 + poll_count / max_polls · 50, 95)`.
pub fn processing_percentage(poll_count: u32, max_polls: u32) -> f64 {
    let ramp = (poll_count as f64 / max_polls.max(1) as f64) * 50.0;
    (PROCESSING_START_PERCENT + ramp).min(PROCESSING_CAP_PERCENT)
}

/// Poll `job_id` until it is COMPLETED.
///
/// Reports `(status, percentage)` after every read. Returns the final job
/// on COMPLETED, [`D2xError::ProcessingFailed`] on FAILED (with the server's
/// message, or "Processing failed"), and [`D2xError::PollTimeout`] when the
/// poll budget runs out.
pub async fn poll_until_complete(
    client: &ApiClient,
    job_id: &str,
    config: &ClientConfig,
    progress: &dyn ConversionProgressCallback,
) -> Result<Job, D2xError> {
    let interval = config.poll_interval();
    let max_polls = config.max_polls;

    for poll_count in 1..=max_polls {
        sleep(interval).await;

        let job = client.job_status(job_id).await?;
        let percentage = processing_percentage(poll_count, max_polls);
        debug!(
            "Job {} poll {}/{}: {:?} ({:.1}%)",
            job_id, poll_count, max_polls, job.status, percentage
        );
        progress.on_progress(job.status.into(), percentage);

        match job.status {
            JobStatus::Completed => {
                info!("Job {} completed after {} polls", job_id, poll_count);
                return Ok(job);
            }
            JobStatus::Failed => {
                let message = job
                    .error
                    .clone()
                    .filter(|m| !m.is_empty())
                    .unwrap_or_else(|| "Processing failed".to_string());
                warn!("Job {} failed: {}", job_id, message);
                return Err(D2xError::ProcessingFailed {
                    job_id: job_id.to_string(),
                    message,
                });
            }
            JobStatus::Pending | JobStatus::Processing => {}
        }
    }

    warn!("Job {} timed out after {} polls", job_id, max_polls);
    Err(D2xError::PollTimeout {
        job_id: job_id.to_string(),
        polls: max_polls,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn first_poll_is_45_and_a_half() {
        assert_eq!(processing_percentage(1, 100), 45.5);
    }

    #[test]
    fn last_poll_is_capped_at_95() {
        assert_eq!(processing_percentage(100, 100), 95.0);
        assert_eq!(processing_percentage(150, 100), 95.0);
    }

    #[test]
    fn ramp_is_linear_and_non_decreasing() {
        let mut prev = PROCESSING_START_PERCENT;
        for n in 1..=100 {
            let p = processing_percentage(n, 100);
            assert_eq!(p, (45.0 + n as f64 * 0.5).min(95.0));
            assert!(p >= prev);
            prev = p;
        }
    }

    #[test]
    fn ramp_scales_with_budget() {
        assert_eq!(processing_percentage(5, 10), 70.0);
        assert_eq!(processing_percentage(0, 0), 45.0);
    }
}
