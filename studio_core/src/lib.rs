// studio_core: Rust/WASM core for the product studio.
// Owns the edit history, generation orchestration and persistence contracts.
// JS renders and calls the SDK; everything stateful lives here.

mod bridge;
mod error;
mod history;
mod jobs;
mod modes;
mod normalize;
mod retry;
mod service;
mod session;
mod store;
mod types;

use wasm_bindgen::prelude::*;

pub use bridge::{generate_asset, BrowserTimer, JsGenerationService};
pub use error::{ServiceError, ServiceErrorKind, StudioError};
pub use history::{History, HistoryHandle};
pub use jobs::{CancellationToken, Generator};
pub use modes::GenerationMode;
pub use normalize::{ingest_upload, target_resolution, ImageNormalizer, UploadedFile};
pub use retry::{with_retry, RetryPolicy};
pub use service::{
    AspectRatio, GenerationService, JobHandle, ServiceFuture, Timer, VideoArtifact, VideoConfig,
    VideoQuality,
};
pub use session::{ensure_api_key, HostCapabilities, Session};
pub use store::{Collection, MemoryStore, ProjectRepository, Store, StoreError, StoreFuture};
pub use types::*;

/// Initialize panic hook and console logging for the browser.
#[wasm_bindgen(start)]
pub fn init() {
    #[cfg(feature = "console_error_panic_hook")]
    console_error_panic_hook::set_once();

    #[cfg(target_arch = "wasm32")]
    {
        // A second init (hot reload) leaves the existing logger in place.
        let _ = console_log::init_with_level(log::Level::Info);
    }
}

/// Identity of the project the editor is working on.
#[derive(Debug, Clone)]
struct OpenProject {
    id: ProjectId,
    created_at_ms: u64,
}

/// Editor state exposed to JavaScript: one session, one history.
/// State crosses the boundary as `ProjectState` JSON.
#[wasm_bindgen]
pub struct Studio {
    config: StudioConfig,
    session: Session,
    history: History<ProjectState>,
    project: Option<OpenProject>,
}

#[wasm_bindgen]
impl Studio {
    /// Create a studio for an established session.
    ///
    /// # Arguments
    /// * `config_json` - `StudioConfig` JSON (may be `{}`)
    /// * `session_json` - `Session` JSON as stored in the users collection
    #[wasm_bindgen(constructor)]
    pub fn new(config_json: &str, session_json: &str) -> Result<Studio, JsValue> {
        let config: StudioConfig = serde_json::from_str(config_json)
            .map_err(|e| JsValue::from_str(&format!("Invalid config: {}", e)))?;
        let session: Session = serde_json::from_str(session_json)
            .map_err(|e| JsValue::from_str(&format!("Invalid session: {}", e)))?;

        Ok(Studio::with_session(config, session))
    }

    /// Commit a new editor state. Returns `false` if it matches the current one.
    pub fn commit(&mut self, state_json: &str, overwrite: bool) -> Result<bool, JsValue> {
        let state = parse_state(state_json)?;
        Ok(self.history.commit(state, overwrite))
    }

    /// Append a generated asset (JSON from `generate_asset`) and select it.
    pub fn add_asset(&mut self, asset_json: &str) -> Result<bool, JsValue> {
        let asset: GeneratedAsset = serde_json::from_str(asset_json)
            .map_err(|e| JsValue::from_str(&format!("Invalid asset: {}", e)))?;
        Ok(self
            .history
            .commit_with(|current| current.with_asset(asset), false))
    }

    /// Switch the active generation mode.
    pub fn set_mode(&mut self, mode_json: &str) -> Result<bool, JsValue> {
        let mode: GenerationMode = serde_json::from_str(mode_json)
            .map_err(|e| JsValue::from_str(&format!("Unknown mode: {}", e)))?;
        Ok(self.history.commit_with(
            |current| ProjectState {
                mode,
                ..current.clone()
            },
            false,
        ))
    }

    pub fn undo(&mut self) -> bool {
        self.history.undo()
    }

    pub fn redo(&mut self) -> bool {
        self.history.redo()
    }

    pub fn can_undo(&self) -> bool {
        self.history.can_undo()
    }

    pub fn can_redo(&self) -> bool {
        self.history.can_redo()
    }

    pub fn history_len(&self) -> usize {
        self.history.len()
    }

    pub fn cursor(&self) -> usize {
        self.history.cursor()
    }

    /// Current editor state as JSON.
    pub fn current(&self) -> Result<String, JsValue> {
        serde_json::to_string(self.history.current())
            .map_err(|e| JsValue::from_str(&format!("Serialization error: {}", e)))
    }

    /// Directive the current state would send to the service.
    pub fn directive(&self) -> String {
        self.history.current().directive()
    }

    pub fn user_id(&self) -> String {
        self.session.user_id.as_str().to_string()
    }

    /// Open a saved project.
    ///
    /// # Arguments
    /// * `project_json` - `Project` JSON from the projects collection
    /// * `reset_history` - Drop all prior history even when reloading the open project
    pub fn load_project(&mut self, project_json: &str, reset_history: bool) -> Result<(), JsValue> {
        let project: Project = serde_json::from_str(project_json)
            .map_err(|e| JsValue::from_str(&format!("Invalid project: {}", e)))?;
        self.open(project, reset_history);
        Ok(())
    }

    /// Snapshot the current state as a `Project` record for the store.
    ///
    /// # Arguments
    /// * `name` - Display name
    /// * `now_ms` - Current time in milliseconds since the epoch
    ///
    /// # Returns
    /// `Project` JSON ready to `put` into the projects collection
    pub fn save_project(&mut self, name: &str, now_ms: u64) -> Result<String, JsValue> {
        let project = self.snapshot(name, now_ms);
        serde_json::to_string(&project)
            .map_err(|e| JsValue::from_str(&format!("Serialization error: {}", e)))
    }
}

impl Studio {
    pub fn with_session(config: StudioConfig, session: Session) -> Studio {
        Studio {
            config,
            session,
            history: History::new(ProjectState::default()),
            project: None,
        }
    }

    pub fn config(&self) -> &StudioConfig {
        &self.config
    }

    pub fn session(&self) -> &Session {
        &self.session
    }

    pub fn history(&self) -> &History<ProjectState> {
        &self.history
    }

    pub fn history_mut(&mut self) -> &mut History<ProjectState> {
        &mut self.history
    }

    /// Make `project` the open project and its state current.
    ///
    /// The open project's id lives outside the undo history, so switching
    /// projects always starts a fresh history. Without `reset_history`, reloading
    /// the project that is already open is a single undoable step.
    pub fn open(&mut self, project: Project, reset_history: bool) {
        if project.owner_id != self.session.user_id {
            log::warn!(
                "Opening project {} owned by another user",
                project.id.as_str()
            );
        }
        let same_project = self
            .project
            .as_ref()
            .map_or(false, |open| open.id == project.id);
        self.project = Some(OpenProject {
            id: project.id,
            created_at_ms: project.created_at_ms,
        });
        if reset_history || !same_project {
            self.history = History::new(project.state);
        } else {
            self.history.commit(project.state, false);
        }
    }

    /// Build a `Project` record from the current state. The first snapshot
    /// assigns a fresh id; later ones keep it.
    pub fn snapshot(&mut self, name: &str, now_ms: u64) -> Project {
        let open = self.project.get_or_insert_with(|| OpenProject {
            id: ProjectId::generate(),
            created_at_ms: now_ms,
        });
        Project {
            id: open.id.clone(),
            owner_id: self.session.user_id.clone(),
            name: name.to_string(),
            created_at_ms: open.created_at_ms,
            updated_at_ms: now_ms,
            state: self.history.current().clone(),
        }
    }
}

fn parse_state(state_json: &str) -> Result<ProjectState, JsValue> {
    serde_json::from_str(state_json)
        .map_err(|e| JsValue::from_str(&format!("Invalid state: {}", e)))
}
