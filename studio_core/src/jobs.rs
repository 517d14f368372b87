// Generation orchestration: direct image transforms and long-running video jobs.
// Video jobs are polled at a fixed interval, every remote call goes through the
// retry policy, and results below the requested resolution are regenerated.

use std::cell::Cell;
use std::rc::Rc;
use std::time::Duration;

use crate::error::{ServiceError, StudioError};
use crate::retry::{with_retry, RetryPolicy};
use crate::service::{GenerationService, JobHandle, Timer, VideoArtifact, VideoConfig};
use crate::types::{AssetContent, GeneratedAsset, ImagePayload, ProjectState, StudioConfig};

/// Cooperative cancellation signal for a running generation.
///
/// Clones observe the same flag. Cancelling stops the orchestration at its
/// next checkpoint; the remote job itself keeps running on the service.
#[derive(Debug, Clone, Default)]
pub struct CancellationToken {
    cancelled: Rc<Cell<bool>>,
}

impl CancellationToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.cancelled.set(true);
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancelled.get()
    }
}

/// Drives the generation service for one studio session.
pub struct Generator<'a, S: ?Sized, C: ?Sized> {
    service: &'a S,
    timer: &'a C,
    retry: RetryPolicy,
    poll_interval: Duration,
    max_quality_attempts: u32,
}

impl<'a, S, C> Generator<'a, S, C>
where
    S: GenerationService + ?Sized,
    C: Timer + ?Sized,
{
    pub fn new(service: &'a S, timer: &'a C, config: &StudioConfig) -> Self {
        Generator {
            service,
            timer,
            retry: RetryPolicy::from(&config.retry),
            poll_interval: Duration::from_millis(config.poll_interval_ms),
            max_quality_attempts: config.quality.max_attempts.max(1),
        }
    }

    /// Run the state's active mode against its source image.
    ///
    /// Image modes return an inline asset; `Video` runs a full job with the
    /// given options. Commit the returned asset with [`ProjectState::with_asset`].
    pub async fn generate(
        &self,
        state: &ProjectState,
        video: &VideoConfig,
        cancel: Option<&CancellationToken>,
    ) -> Result<GeneratedAsset, StudioError> {
        let source = state.source.as_ref().ok_or(StudioError::NoSourceImage)?;
        let directive = state.directive();

        let content = if state.mode.is_long_running() {
            let artifact = self.generate_video(source, &directive, video, cancel).await?;
            AssetContent::Video {
                locator: artifact.locator,
                resolution: artifact.resolution,
            }
        } else {
            check_cancelled(cancel)?;
            let image = self.generate_image(source, &directive).await?;
            AssetContent::Image { image }
        };

        Ok(GeneratedAsset {
            mode: state.mode,
            directive,
            content,
        })
    }

    /// Single transform call, retried on transient failures.
    pub async fn generate_image(
        &self,
        source: &ImagePayload,
        directive: &str,
    ) -> Result<ImagePayload, StudioError> {
        log::info!("Requesting image transform ({} chars)", directive.len());
        let image = with_retry(&self.retry, self.timer, "transform", || {
            self.service.transform(source, directive)
        })
        .await?;
        Ok(image)
    }

    /// Submit, poll to completion, download, and check resolution.
    /// Regenerates from scratch when the result is below the requested quality.
    pub async fn generate_video(
        &self,
        source: &ImagePayload,
        directive: &str,
        config: &VideoConfig,
        cancel: Option<&CancellationToken>,
    ) -> Result<VideoArtifact, StudioError> {
        let required = config.quality.required_resolution();
        let mut attempt = 1;
        loop {
            let artifact = self.run_video_job(source, directive, config, cancel).await?;
            if artifact.resolution.satisfies(required) {
                log::info!(
                    "Video accepted at {} on attempt {}",
                    artifact.resolution,
                    attempt
                );
                return Ok(artifact);
            }
            if attempt >= self.max_quality_attempts {
                return Err(StudioError::QualityGate {
                    actual: artifact.resolution,
                    required,
                    attempts: attempt,
                });
            }
            log::warn!(
                "Video came back at {}, below {}; regenerating ({}/{})",
                artifact.resolution,
                required,
                attempt + 1,
                self.max_quality_attempts
            );
            attempt += 1;
        }
    }

    async fn run_video_job(
        &self,
        source: &ImagePayload,
        directive: &str,
        config: &VideoConfig,
        cancel: Option<&CancellationToken>,
    ) -> Result<VideoArtifact, StudioError> {
        check_cancelled(cancel)?;
        let mut handle = with_retry(&self.retry, self.timer, "submit video job", || {
            self.service.submit_video_job(source, directive, config)
        })
        .await?;
        log::info!("Video job {} submitted", handle.name);

        let mut polls = 0u32;
        while !handle.done {
            check_cancelled(cancel)?;
            self.timer.sleep(self.poll_interval).await;
            check_cancelled(cancel)?;

            let refreshed = with_retry(&self.retry, self.timer, "poll video job", || {
                self.service.poll_job(&handle)
            })
            .await?;
            handle = refreshed;
            polls += 1;
            log::debug!("Video job {} poll {}: done={}", handle.name, polls, handle.done);
        }

        let locator = finished_locator(&handle)?;
        let artifact = with_retry(&self.retry, self.timer, "fetch video", || {
            self.service.fetch_artifact(&locator)
        })
        .await?;
        Ok(artifact)
    }
}

fn check_cancelled(cancel: Option<&CancellationToken>) -> Result<(), StudioError> {
    match cancel {
        Some(token) if token.is_cancelled() => Err(StudioError::Cancelled),
        _ => Ok(()),
    }
}

/// Result locator of a finished job, or the job's own failure.
fn finished_locator(handle: &JobHandle) -> Result<String, StudioError> {
    if let Some(message) = &handle.error {
        return Err(ServiceError::classify(message.clone()).into());
    }
    handle
        .result
        .clone()
        .ok_or_else(|| StudioError::MissingResult(handle.name.clone()))
}

#[cfg(test)]
pub(crate) mod test_support {
    use std::cell::RefCell;
    use std::collections::VecDeque;

    use crate::error::{ServiceError, ServiceErrorKind};
    use crate::service::{
        GenerationService, JobHandle, ServiceFuture, VideoArtifact, VideoConfig,
    };
    use crate::types::{ImagePayload, Resolution};

    /// Scripted generation service. Each call pops the next outcome for its method.
    #[derive(Default)]
    pub struct FakeService {
        pub transforms: RefCell<VecDeque<Result<ImagePayload, ServiceError>>>,
        pub submits: RefCell<VecDeque<Result<JobHandle, ServiceError>>>,
        pub polls: RefCell<VecDeque<Result<JobHandle, ServiceError>>>,
        pub artifacts: RefCell<VecDeque<Result<VideoArtifact, ServiceError>>>,
        pub directives: RefCell<Vec<String>>,
        pub poll_count: RefCell<u32>,
    }

    fn next<T>(queue: &RefCell<VecDeque<Result<T, ServiceError>>>) -> Result<T, ServiceError> {
        queue
            .borrow_mut()
            .pop_front()
            .unwrap_or_else(|| Err(ServiceError::new(ServiceErrorKind::Other, "script exhausted")))
    }

    impl FakeService {
        /// One job that finishes after `polls` polls at `resolution`.
        pub fn push_job(&self, name: &str, polls: usize, resolution: Resolution) {
            let locator = format!("https://cdn.videos.test/{name}.mp4");
            self.submits
                .borrow_mut()
                .push_back(Ok(JobHandle::pending(name)));
            for i in 0..polls {
                let mut handle = JobHandle::pending(name);
                if i + 1 == polls {
                    handle.done = true;
                    handle.result = Some(locator.clone());
                }
                self.polls.borrow_mut().push_back(Ok(handle));
            }
            self.artifacts
                .borrow_mut()
                .push_back(Ok(VideoArtifact { locator, resolution }));
        }
    }

    impl GenerationService for FakeService {
        fn transform<'a>(
            &'a self,
            _image: &'a ImagePayload,
            directive: &'a str,
        ) -> ServiceFuture<'a, ImagePayload> {
            self.directives.borrow_mut().push(directive.to_string());
            let outcome = next(&self.transforms);
            Box::pin(async move { outcome })
        }

        fn submit_video_job<'a>(
            &'a self,
            _image: &'a ImagePayload,
            directive: &'a str,
            _config: &'a VideoConfig,
        ) -> ServiceFuture<'a, JobHandle> {
            self.directives.borrow_mut().push(directive.to_string());
            let outcome = next(&self.submits);
            Box::pin(async move { outcome })
        }

        fn poll_job<'a>(&'a self, _job: &'a JobHandle) -> ServiceFuture<'a, JobHandle> {
            *self.poll_count.borrow_mut() += 1;
            let outcome = next(&self.polls);
            Box::pin(async move { outcome })
        }

        fn fetch_artifact<'a>(&'a self, _locator: &'a str) -> ServiceFuture<'a, VideoArtifact> {
            let outcome = next(&self.artifacts);
            Box::pin(async move { outcome })
        }
    }
}
