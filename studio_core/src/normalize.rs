// Upload normalization.
// Decoding and re-encoding happen in the host (canvas); this side decides the
// target size and turns a fresh upload into the start of a new edit history.

use std::future::Future;
use std::pin::Pin;

use serde::{Deserialize, Serialize};

use crate::error::StudioError;
use crate::history::History;
use crate::types::{ImagePayload, ProjectState, Resolution, UploadSettings};

/// A file picked by the user, as described by the host.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UploadedFile {
    pub name: String,
    pub mime_type: String,
    pub resolution: Resolution,
}

/// Re-encodes an upload at a bounded resolution.
pub trait ImageNormalizer {
    fn normalize<'a>(
        &'a self,
        file: &'a UploadedFile,
        target: Resolution,
    ) -> Pin<Box<dyn Future<Output = Result<ImagePayload, StudioError>> + 'a>>;
}

/// Size an upload should be re-encoded at.
pub fn target_resolution(file: &UploadedFile, settings: &UploadSettings) -> Resolution {
    file.resolution.fit_within(settings.max_edge)
}

/// Normalize an upload and make it the source of a fresh history.
///
/// The previous history is always discarded, even when the new state equals
/// the current one: undo never crosses into another photo's session. Generated assets and markup are cleared,
/// the active mode and notes carry over.
pub async fn ingest_upload<N>(
    normalizer: &N,
    file: &UploadedFile,
    settings: &UploadSettings,
    history: &mut History<ProjectState>,
) -> Result<ImagePayload, StudioError>
where
    N: ImageNormalizer + ?Sized,
{
    let target = target_resolution(file, settings);
    log::info!(
        "Normalizing {} from {} to {}",
        file.name,
        file.resolution,
        target
    );
    let payload = normalizer.normalize(file, target).await?;

    let current = history.current();
    let next = ProjectState {
        source: Some(payload.clone()),
        mode: current.mode,
        notes: current.notes.clone(),
        ..ProjectState::default()
    };
    *history = History::new(next);
    Ok(payload)
}

#[cfg(test)]
mod tests {
    use std::cell::RefCell;

    use futures::executor::block_on;

    use super::*;
    use crate::modes::GenerationMode;

    #[derive(Default)]
    struct FakeNormalizer {
        targets: RefCell<Vec<Resolution>>,
    }

    impl ImageNormalizer for FakeNormalizer {
        fn normalize<'a>(
            &'a self,
            _file: &'a UploadedFile,
            target: Resolution,
        ) -> Pin<Box<dyn Future<Output = Result<ImagePayload, StudioError>> + 'a>> {
            self.targets.borrow_mut().push(target);
            Box::pin(async move { Ok(ImagePayload::new("image/jpeg", format!("{target}"))) })
        }
    }

    fn upload(width: u32, height: u32) -> UploadedFile {
        UploadedFile {
            name: "sneaker.jpg".to_string(),
            mime_type: "image/jpeg".to_string(),
            resolution: Resolution::new(width, height),
        }
    }

    #[test]
    fn target_is_bounded_by_max_edge() {
        let settings = UploadSettings::default();
        assert_eq!(
            target_resolution(&upload(3072, 2048), &settings),
            Resolution::new(1536, 1024)
        );
        assert_eq!(
            target_resolution(&upload(640, 480), &settings),
            Resolution::new(640, 480)
        );
    }

    #[test]
    fn upload_resets_history_and_keeps_mode() {
        let normalizer = FakeNormalizer::default();
        let mut history = History::new(ProjectState::default());
        history.commit(
            ProjectState {
                mode: GenerationMode::Lifestyle,
                notes: "beach".to_string(),
                ..ProjectState::default()
            },
            false,
        );

        let payload = block_on(ingest_upload(
            &normalizer,
            &upload(3072, 2048),
            &UploadSettings::default(),
            &mut history,
        ))
        .unwrap();

        assert_eq!(payload.data, "1536x1024");
        assert_eq!(history.len(), 1);
        assert!(!history.can_undo());
        assert_eq!(history.current().mode, GenerationMode::Lifestyle);
        assert_eq!(history.current().notes, "beach");
        assert_eq!(history.current().source.as_ref(), Some(&payload));
        assert_eq!(*normalizer.targets.borrow(), vec![Resolution::new(1536, 1024)]);
    }

    #[test]
    fn reingesting_the_same_upload_still_resets_history() {
        let normalizer = FakeNormalizer::default();
        let settings = UploadSettings::default();
        let mut history = History::new(ProjectState::default());
        let payload = block_on(ingest_upload(
            &normalizer,
            &upload(640, 480),
            &settings,
            &mut history,
        ))
        .unwrap();

        history.commit(
            ProjectState {
                notes: "draft".to_string(),
                ..history.current().clone()
            },
            false,
        );
        history.commit(
            ProjectState {
                source: Some(payload.clone()),
                ..ProjectState::default()
            },
            false,
        );
        assert_eq!(history.len(), 3);

        block_on(ingest_upload(
            &normalizer,
            &upload(640, 480),
            &settings,
            &mut history,
        ))
        .unwrap();
        assert_eq!(history.len(), 1);
        assert!(!history.can_undo());
        assert_eq!(history.current().source.as_ref(), Some(&payload));
    }
}
