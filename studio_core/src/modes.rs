// Generation modes and their directive templates.
// Every mode must have a template: the lookup is an exhaustive match, and
// unknown mode names from JS fail to deserialize rather than falling back.

use serde::{Deserialize, Serialize};

use crate::types::Annotation;

/// Workflow step that decides what the generation service is asked to do.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum GenerationMode {
    /// Top-down studio flat-lay photo.
    #[default]
    FlatLay,
    /// Product placed on a 3D mockup.
    Mockup,
    /// Product staged in a lifestyle scene.
    Lifestyle,
    /// Apply the user's canvas markup as edit instructions.
    Markup,
    /// Short animated product video (long-running job).
    Video,
}

impl GenerationMode {
    pub const ALL: [GenerationMode; 5] = [
        GenerationMode::FlatLay,
        GenerationMode::Mockup,
        GenerationMode::Lifestyle,
        GenerationMode::Markup,
        GenerationMode::Video,
    ];

    pub fn template(&self) -> &'static str {
        match self {
            GenerationMode::FlatLay => {
                "Create a studio-quality top-down flat-lay photograph of the product on a clean background with soft, even lighting."
            }
            GenerationMode::Mockup => {
                "Place the product on a realistic 3D mockup with accurate perspective, materials and shadows."
            }
            GenerationMode::Lifestyle => {
                "Stage the product in a natural lifestyle scene that matches its use, keeping the product unchanged."
            }
            GenerationMode::Markup => {
                "Edit the image according to the marked regions, leaving everything outside them unchanged."
            }
            GenerationMode::Video => {
                "Animate the product in a short, smooth showcase video with a slow camera move."
            }
        }
    }

    /// Whether this mode runs as a long-running job rather than a direct transform.
    pub fn is_long_running(&self) -> bool {
        matches!(self, GenerationMode::Video)
    }

    /// Compose the full directive: template, then the user's notes if any.
    pub fn directive(&self, notes: &str) -> String {
        let notes = notes.trim();
        if notes.is_empty() {
            self.template().to_string()
        } else {
            format!("{} {}", self.template(), notes)
        }
    }

    /// Directive for markup edits, listing each annotation's position and label.
    pub fn markup_directive(&self, notes: &str, markup: &[Annotation]) -> String {
        let mut directive = self.directive(notes);
        for (i, mark) in markup.iter().enumerate() {
            directive.push_str(&format!(
                "\nMark {} at ({:.2}, {:.2})",
                i + 1,
                mark.x,
                mark.y
            ));
            let label = mark.label.trim();
            if !label.is_empty() {
                directive.push_str(": ");
                directive.push_str(label);
            }
        }
        directive
    }
}
