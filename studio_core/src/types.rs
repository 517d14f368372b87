// Strong typing over strings. Newtypes for ids, pixel sizes and image payloads.
// Config structs carry serde defaults so JS can pass partial JSON.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::modes::GenerationMode;

/// Anonymous user identity. Newtype for type safety.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct UserId(String);

impl UserId {
    pub fn new(id: impl Into<String>) -> Self {
        UserId(id.into())
    }

    pub fn generate() -> Self {
        UserId(uuid::Uuid::new_v4().to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

/// Project identifier. Newtype for type safety.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ProjectId(String);

impl ProjectId {
    pub fn new(id: impl Into<String>) -> Self {
        ProjectId(id.into())
    }

    pub fn generate() -> Self {
        ProjectId(uuid::Uuid::new_v4().to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

/// Pixel dimensions of an image or video.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
pub struct Resolution {
    pub width: u32,
    pub height: u32,
}

impl Resolution {
    pub fn new(width: u32, height: u32) -> Self {
        Resolution { width, height }
    }

    pub fn short_edge(&self) -> u32 {
        self.width.min(self.height)
    }

    pub fn long_edge(&self) -> u32 {
        self.width.max(self.height)
    }

    /// Whether this resolution is at least `required`, ignoring orientation.
    /// A 720x1280 portrait video satisfies a 1280x720 requirement.
    pub fn satisfies(&self, required: Resolution) -> bool {
        self.short_edge() >= required.short_edge() && self.long_edge() >= required.long_edge()
    }

    /// Scale down to fit within a `max_edge` square, preserving aspect ratio.
    /// Never upscales. Each side stays at least 1px.
    pub fn fit_within(&self, max_edge: u32) -> Resolution {
        let long = self.long_edge();
        if long <= max_edge || long == 0 {
            return *self;
        }
        let scale = max_edge as f64 / long as f64;
        let scaled = |side: u32| ((side as f64 * scale).round() as u32).clamp(1, max_edge.max(1));
        Resolution::new(scaled(self.width), scaled(self.height))
    }
}

impl fmt::Display for Resolution {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}x{}", self.width, self.height)
    }
}

/// Encoded image ready to send to the generation service.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ImagePayload {
    pub mime_type: String,
    /// Base64 body, without the data-URL prefix.
    pub data: String,
}

impl ImagePayload {
    pub fn new(mime_type: impl Into<String>, data: impl Into<String>) -> Self {
        ImagePayload {
            mime_type: mime_type.into(),
            data: data.into(),
        }
    }

    /// Parse a `data:<mime>;base64,<body>` URL as produced by canvas/FileReader.
    pub fn from_data_url(url: &str) -> Option<Self> {
        let rest = url.strip_prefix("data:")?;
        let (header, body) = rest.split_once(',')?;
        let mime_type = header.strip_suffix(";base64")?;
        if mime_type.is_empty() || body.is_empty() {
            return None;
        }
        Some(ImagePayload::new(mime_type, body))
    }

    pub fn to_data_url(&self) -> String {
        format!("data:{};base64,{}", self.mime_type, self.data)
    }
}

/// Where a generated asset's content lives.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum AssetContent {
    /// Inline image returned synchronously.
    Image { image: ImagePayload },
    /// Remote video located by URI.
    Video { locator: String, resolution: Resolution },
}

/// One generation result kept in the project.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GeneratedAsset {
    pub mode: GenerationMode,
    pub directive: String,
    pub content: AssetContent,
}

/// A markup annotation drawn on the edit canvas (normalized 0-1 coordinates).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Annotation {
    pub x: f32,
    pub y: f32,
    #[serde(default)]
    pub label: String,
}

/// Everything the editor can undo. This is the snapshot type kept in history.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct ProjectState {
    #[serde(default)]
    pub source: Option<ImagePayload>,
    #[serde(default)]
    pub mode: GenerationMode,
    #[serde(default)]
    pub notes: String,
    #[serde(default)]
    pub assets: Vec<GeneratedAsset>,
    #[serde(default)]
    pub selected: Option<usize>,
    #[serde(default)]
    pub markup: Vec<Annotation>,
}

impl ProjectState {
    pub fn selected_asset(&self) -> Option<&GeneratedAsset> {
        self.selected.and_then(|i| self.assets.get(i))
    }

    /// Full directive for the active mode, including notes and markup.
    pub fn directive(&self) -> String {
        match self.mode {
            GenerationMode::Markup => self.mode.markup_directive(&self.notes, &self.markup),
            mode => mode.directive(&self.notes),
        }
    }

    /// Append an asset and select it.
    pub fn with_asset(&self, asset: GeneratedAsset) -> ProjectState {
        let mut next = self.clone();
        next.assets.push(asset);
        next.selected = Some(next.assets.len() - 1);
        next
    }
}

/// A saved project: the editor state plus ownership and timestamps.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Project {
    pub id: ProjectId,
    pub owner_id: UserId,
    pub name: String,
    pub created_at_ms: u64,
    pub updated_at_ms: u64,
    pub state: ProjectState,
}

/// Studio configuration passed from JS.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StudioConfig {
    /// Fixed wait between video job status checks (milliseconds).
    #[serde(default = "default_poll_interval_ms")]
    pub poll_interval_ms: u64,
    #[serde(default)]
    pub retry: RetrySettings,
    #[serde(default)]
    pub quality: QualitySettings,
    #[serde(default)]
    pub upload: UploadSettings,
}

impl Default for StudioConfig {
    fn default() -> Self {
        StudioConfig {
            poll_interval_ms: default_poll_interval_ms(),
            retry: RetrySettings::default(),
            quality: QualitySettings::default(),
            upload: UploadSettings::default(),
        }
    }
}

fn default_poll_interval_ms() -> u64 {
    5_000
}

/// Retry behavior for transient service failures.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RetrySettings {
    /// Retries after the first attempt.
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,
    /// First backoff delay; doubles on each retry (milliseconds).
    #[serde(default = "default_base_delay_ms")]
    pub base_delay_ms: u64,
}

impl Default for RetrySettings {
    fn default() -> Self {
        RetrySettings {
            max_retries: default_max_retries(),
            base_delay_ms: default_base_delay_ms(),
        }
    }
}

fn default_max_retries() -> u32 {
    3
}

fn default_base_delay_ms() -> u64 {
    2_000
}

/// Resolution QA gate for generated videos.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QualitySettings {
    /// Total generations allowed before giving up on a sub-threshold result.
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,
}

impl Default for QualitySettings {
    fn default() -> Self {
        QualitySettings {
            max_attempts: default_max_attempts(),
        }
    }
}

fn default_max_attempts() -> u32 {
    3
}

/// Upload normalization bounds.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UploadSettings {
    /// Longest allowed edge of a normalized upload (pixels).
    #[serde(default = "default_max_edge")]
    pub max_edge: u32,
}

impl Default for UploadSettings {
    fn default() -> Self {
        UploadSettings {
            max_edge: default_max_edge(),
        }
    }
}

fn default_max_edge() -> u32 {
    1536
}
