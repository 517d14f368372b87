// Contracts for the external generation service and the timer that paces it.
// Futures are boxed and not Send: in the browser they hold JS promises.

use std::future::Future;
use std::pin::Pin;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::ServiceError;
use crate::types::{ImagePayload, Resolution};

/// A boxed future returning a service `Result`.
pub type ServiceFuture<'a, T> = Pin<Box<dyn Future<Output = Result<T, ServiceError>> + 'a>>;

/// Output resolution requested for a video job.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
pub enum VideoQuality {
    #[default]
    #[serde(rename = "720p")]
    Hd720,
    #[serde(rename = "1080p")]
    Hd1080,
}

impl VideoQuality {
    /// Minimum landscape resolution a result must reach.
    pub fn required_resolution(&self) -> Resolution {
        match self {
            VideoQuality::Hd720 => Resolution::new(1280, 720),
            VideoQuality::Hd1080 => Resolution::new(1920, 1080),
        }
    }
}

/// Frame orientation of a video job.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
pub enum AspectRatio {
    #[default]
    #[serde(rename = "16:9")]
    Landscape,
    #[serde(rename = "9:16")]
    Portrait,
}

/// Video job options forwarded to the service.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct VideoConfig {
    #[serde(default)]
    pub quality: VideoQuality,
    #[serde(default)]
    pub aspect_ratio: AspectRatio,
}

/// Opaque handle for a long-running job, refreshed on every poll.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct JobHandle {
    pub name: String,
    #[serde(default)]
    pub done: bool,
    /// Result locator, present once the job finished successfully.
    #[serde(default)]
    pub result: Option<String>,
    /// Failure reported by the job itself.
    #[serde(default)]
    pub error: Option<String>,
}

impl JobHandle {
    pub fn pending(name: impl Into<String>) -> Self {
        JobHandle {
            name: name.into(),
            done: false,
            result: None,
            error: None,
        }
    }
}

/// A downloaded video and its intrinsic resolution.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VideoArtifact {
    pub locator: String,
    pub resolution: Resolution,
}

/// The generative-AI service. Implemented in JS for the browser, and by
/// scripted fakes in tests.
pub trait GenerationService {
    /// Apply a directive to an image and return the edited image.
    fn transform<'a>(
        &'a self,
        image: &'a ImagePayload,
        directive: &'a str,
    ) -> ServiceFuture<'a, ImagePayload>;

    /// Start a video job.
    fn submit_video_job<'a>(
        &'a self,
        image: &'a ImagePayload,
        directive: &'a str,
        config: &'a VideoConfig,
    ) -> ServiceFuture<'a, JobHandle>;

    /// Fetch the latest state of a job.
    fn poll_job<'a>(&'a self, job: &'a JobHandle) -> ServiceFuture<'a, JobHandle>;

    /// Download a finished job's artifact and report its resolution.
    fn fetch_artifact<'a>(&'a self, locator: &'a str) -> ServiceFuture<'a, VideoArtifact>;
}

/// Source of delays. Injected so polling and backoff are testable without waiting.
pub trait Timer {
    fn sleep(&self, duration: Duration) -> Pin<Box<dyn Future<Output = ()> + '_>>;
}
