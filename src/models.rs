use serde::{Serialize, Deserialize};
use serde_with::skip_serializing_none;
use chrono::{DateTime, Utc};
use uuid::Uuid;
use std::fmt;

use crate::error::WorkflowError;

/// Fixed message stored on a record whose image generation failed.
pub const GENERATION_FAILED_MESSAGE: &str = "Failed to generate image";

#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[serde(rename_all = "kebab-case")]
pub enum OutfitConcept {
    Casual,
    Business,
    NightOut,
    Custom,
}

impl OutfitConcept {
    /// Concepts requested on every run, in materialization order.
    pub const FIXED: [OutfitConcept; 3] = [OutfitConcept::Casual, OutfitConcept::Business, OutfitConcept::NightOut];

    pub fn title(&self) -> &'static str {
        match self {
            OutfitConcept::Casual => "Casual",
            OutfitConcept::Business => "Business",
            OutfitConcept::NightOut => "Night Out",
            OutfitConcept::Custom => "Custom",
        }
    }

    /// Run-local identifier assigned at materialization.
    pub fn position(&self) -> usize {
        match self {
            OutfitConcept::Casual => 1,
            OutfitConcept::Business => 2,
            OutfitConcept::NightOut => 3,
            OutfitConcept::Custom => 4,
        }
    }
}

impl fmt::Display for OutfitConcept {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.title())
    }
}

/// Generation lifecycle of one record. Only `Complete` carries an image and
/// only `Error` carries a message.
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Eq)]
#[serde(tag = "state", rename_all = "kebab-case")]
pub enum GenerationState {
    Pending,
    Generating,
    Complete { generated_image: String },
    Error { error_message: String },
}

impl GenerationState {
    pub fn label(&self) -> &'static str {
        match self {
            GenerationState::Pending => "pending",
            GenerationState::Generating => "generating",
            GenerationState::Complete { .. } => "complete",
            GenerationState::Error { .. } => "error",
        }
    }
}

#[skip_serializing_none]
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Eq)]
pub struct OutfitRecord {
    pub id: String,
    pub concept: OutfitConcept,
    pub custom_label: Option<String>,
    pub description: String,
    #[serde(default)]
    pub accessory_suggestions: Vec<String>,
    pub source_image: Option<String>,
    #[serde(flatten)]
    pub state: GenerationState,
    pub saved_at: Option<i64>,
}

impl OutfitRecord {
    /// Builds a record fresh out of analysis. `custom_label` is only kept for
    /// the custom concept.
    pub fn materialize(
        concept: OutfitConcept,
        custom_label: Option<&str>,
        description: String,
        accessory_suggestions: Vec<String>,
        source_image: &str,
    ) -> Self {
        let custom_label = match concept {
            OutfitConcept::Custom => custom_label.map(str::to_string),
            _ => None,
        };
        Self {
            id: concept.position().to_string(),
            concept,
            custom_label,
            description,
            accessory_suggestions,
            source_image: Some(source_image.to_string()),
            state: GenerationState::Pending,
            saved_at: None,
        }
    }

    /// Display title: the user's occasion for custom looks, the concept name otherwise.
    pub fn title(&self) -> &str {
        match (&self.concept, &self.custom_label) {
            (OutfitConcept::Custom, Some(label)) => label,
            (concept, _) => concept.title(),
        }
    }

    pub fn generated_image(&self) -> Option<&str> {
        match &self.state {
            GenerationState::Complete { generated_image } => Some(generated_image),
            _ => None,
        }
    }

    pub fn is_generating(&self) -> bool {
        matches!(self.state, GenerationState::Generating)
    }

    pub fn complete(&mut self, generated_image: String) {
        self.state = GenerationState::Complete { generated_image };
    }

    pub fn fail(&mut self, message: impl Into<String>) {
        self.state = GenerationState::Error { error_message: message.into() };
    }

    /// Moves the record into `generating` for another attempt. Leaves the
    /// record untouched when there is no source image to generate from.
    pub fn begin_generation(&mut self) -> Result<(), WorkflowError> {
        if self.source_image.is_none() {
            return Err(WorkflowError::MissingSourceImage);
        }
        self.state = GenerationState::Generating;
        Ok(())
    }
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Eq, Default)]
pub struct TrendSource {
    pub uri: String,
    pub title: String,
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Eq, Default)]
pub struct TrendInfo {
    pub text: String,
    #[serde(default)]
    pub sources: Vec<TrendSource>,
}

/// Run-level summary shown next to the outfits.
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Eq)]
pub struct StylingAnalysis {
    pub item_name: String,
    pub color_palette: Vec<String>,
    pub style_keywords: Vec<String>,
    pub trending: TrendInfo,
}

#[skip_serializing_none]
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct RunSnapshot {
    pub id: Uuid,
    pub custom_occasion: Option<String>,
    pub analysis: StylingAnalysis,
    pub outfits: Vec<OutfitRecord>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl RunSnapshot {
    pub fn outfit(&self, outfit_id: &str) -> Option<&OutfitRecord> {
        self.outfits.iter().find(|o| o.id == outfit_id)
    }

    pub fn outfit_mut(&mut self, outfit_id: &str) -> Option<&mut OutfitRecord> {
        self.outfits.iter_mut().find(|o| o.id == outfit_id)
    }
}

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct StartStylingRequest {
    pub source_image: String,
    #[serde(default)]
    pub custom_occasion: Option<String>,
}

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct EditRequest {
    pub instruction: String,
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn record(concept: OutfitConcept, label: Option<&str>) -> OutfitRecord {
        OutfitRecord::materialize(concept, label, "a look".into(), vec!["belt".into()], "data:image/jpeg;base64,AAAA")
    }

    #[test]
    fn custom_label_only_kept_for_custom_concept() {
        assert_eq!(record(OutfitConcept::Casual, Some("Wedding")).custom_label, None);
        let custom = record(OutfitConcept::Custom, Some("Wedding"));
        assert_eq!(custom.custom_label.as_deref(), Some("Wedding"));
        assert_eq!(custom.title(), "Wedding");
        assert_eq!(custom.id, "4");
    }

    #[test]
    fn state_is_flattened_into_record_json() {
        let mut r = record(OutfitConcept::NightOut, None);
        r.complete("data:image/png;base64,BBBB".into());
        let json = serde_json::to_value(&r).unwrap();
        assert_eq!(json["state"], "complete");
        assert_eq!(json["concept"], "night-out");
        assert_eq!(json["generated_image"], "data:image/png;base64,BBBB");
        assert!(json.get("error_message").is_none());
        assert!(json.get("saved_at").is_none());

        let back: OutfitRecord = serde_json::from_value(json).unwrap();
        assert_eq!(back, r);
    }

    #[test]
    fn begin_generation_requires_source_image() {
        let mut r = record(OutfitConcept::Business, None);
        r.fail(GENERATION_FAILED_MESSAGE);
        r.source_image = None;
        assert!(matches!(r.begin_generation(), Err(WorkflowError::MissingSourceImage)));
        assert_eq!(r.state.label(), "error");
    }
}
