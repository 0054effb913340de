//! Outfit generation orchestration: analyze once, reveal every look right
//! away, then resolve each look's image on its own schedule.

use std::sync::Arc;
use tokio::sync::mpsc;
use tracing::{info, warn, error};

use crate::error::WorkflowError;
use crate::image::preview;
use crate::models::{OutfitConcept, OutfitRecord, StylingAnalysis, TrendInfo, GENERATION_FAILED_MESSAGE};
use crate::provider::{ItemAnalysis, StylingProvider};

/// Trend text substituted when the lookup fails.
pub const TREND_UNAVAILABLE_TEXT: &str = "Could not fetch trends right now.";

/// Result of the blocking part of a run. `outfits` are already `generating`;
/// `updates` yields each look once its image attempt resolves, in completion
/// order. Dropping `updates` discards interest in the pending results.
pub struct StylingRun {
    pub analysis: StylingAnalysis,
    pub outfits: Vec<OutfitRecord>,
    pub updates: mpsc::UnboundedReceiver<OutfitRecord>,
}

#[derive(Clone)]
pub struct Stylist {
    provider: Arc<dyn StylingProvider>,
}

impl Stylist {
    pub fn new(provider: Arc<dyn StylingProvider>) -> Self {
        Self { provider }
    }

    pub fn provider(&self) -> &Arc<dyn StylingProvider> {
        &self.provider
    }

    pub async fn run_styling(&self, source_image: &str, custom_occasion: Option<&str>) -> Result<StylingRun, WorkflowError> {
        let custom_occasion = custom_occasion.map(str::trim).filter(|o| !o.is_empty());

        info!(occasion = ?custom_occasion, "🚀 Analyzing clothing item");
        let item = self.provider
            .analyze(source_image, custom_occasion)
            .await
            .map_err(WorkflowError::AnalysisFailed)?;

        let trending = match self.provider.trend_lookup(&item.item_name).await {
            Ok(trend) => trend,
            Err(e) => {
                warn!(error = %e, item = %item.item_name, "Trend lookup failed, continuing without it");
                TrendInfo { text: TREND_UNAVAILABLE_TEXT.to_string(), sources: Vec::new() }
            }
        };

        let mut outfits = materialize(&item, source_image, custom_occasion);
        for outfit in &mut outfits {
            outfit.begin_generation()?;
        }
        info!(item = %item.item_name, looks = outfits.len(), "✅ Looks materialized, generating images");

        let (tx, updates) = mpsc::unbounded_channel();
        for outfit in outfits.iter().cloned() {
            let provider = Arc::clone(&self.provider);
            let tx = tx.clone();
            tokio::spawn(async move {
                let resolved = resolve_generation(provider.as_ref(), outfit).await;
                // A closed channel means the run was discarded.
                let _ = tx.send(resolved);
            });
        }

        Ok(StylingRun {
            analysis: StylingAnalysis {
                item_name: item.item_name,
                color_palette: item.color_palette,
                style_keywords: item.style_keywords,
                trending,
            },
            outfits,
            updates,
        })
    }

    /// Another generation attempt for one look. Errors only on a missing
    /// source image, in which case nothing about `record` changes; generation
    /// failures come back as a record in the `error` state.
    pub async fn regenerate(&self, record: &OutfitRecord) -> Result<OutfitRecord, WorkflowError> {
        let mut attempt = record.clone();
        attempt.begin_generation()?;
        info!(outfit = %attempt.id, concept = %attempt.concept, "🔄 Regenerating look");
        Ok(resolve_generation(self.provider.as_ref(), attempt).await)
    }

    /// Applies an edit instruction to the look's generated image. On any
    /// failure the caller keeps its current record.
    pub async fn edit(&self, record: &OutfitRecord, instruction: &str) -> Result<OutfitRecord, WorkflowError> {
        let instruction = instruction.trim();
        if instruction.is_empty() {
            return Err(WorkflowError::InvalidInput("edit instruction must not be empty".into()));
        }
        let current = record.generated_image().ok_or(WorkflowError::MissingGeneratedImage)?;

        info!(outfit = %record.id, instruction, "✏️ Editing look");
        match self.provider.edit_image(current, instruction).await {
            Ok(Some(image)) => {
                let mut edited = record.clone();
                edited.complete(image);
                Ok(edited)
            }
            Ok(None) => {
                warn!(outfit = %record.id, "Edit returned no image");
                Err(WorkflowError::EditReturnedNoImage)
            }
            Err(e) => Err(WorkflowError::EditFailed(e)),
        }
    }
}

/// One record per concept: the three fixed looks always, the custom look only
/// when an occasion was given and analysis produced a prompt for it.
pub fn materialize(item: &ItemAnalysis, source_image: &str, custom_occasion: Option<&str>) -> Vec<OutfitRecord> {
    let mut outfits: Vec<OutfitRecord> = OutfitConcept::FIXED.iter().map(|&concept| {
        let (description, accessories) = item.brief(concept)
            .map(|b| (b.description.clone(), b.accessory_suggestions.clone()))
            .unwrap_or_default();
        OutfitRecord::materialize(concept, None, description, accessories, source_image)
    }).collect();

    if let Some(occasion) = custom_occasion {
        match item.brief(OutfitConcept::Custom) {
            Some(brief) if !brief.description.trim().is_empty() => outfits.push(OutfitRecord::materialize(
                OutfitConcept::Custom,
                Some(occasion),
                brief.description.clone(),
                brief.accessory_suggestions.clone(),
                source_image,
            )),
            _ => warn!(occasion, "Analysis returned no prompt for the custom occasion, skipping it"),
        }
    }
    outfits
}

/// Runs one generation attempt and settles the record as complete or error.
pub async fn resolve_generation(provider: &dyn StylingProvider, mut record: OutfitRecord) -> OutfitRecord {
    let Some(source_image) = record.source_image.clone() else {
        record.fail(GENERATION_FAILED_MESSAGE);
        return record;
    };

    match provider.generate_image(&source_image, &record.description).await {
        Ok(Some(image)) => {
            info!(outfit = %record.id, concept = %record.concept, "✅ Look image generated: {}", preview(&image));
            record.complete(image);
        }
        Ok(None) => {
            warn!(outfit = %record.id, concept = %record.concept, "⚠️ Generation returned no image");
            record.fail(GENERATION_FAILED_MESSAGE);
        }
        Err(e) => {
            error!(outfit = %record.id, concept = %record.concept, error = %e, "❌ Look image generation failed");
            record.fail(GENERATION_FAILED_MESSAGE);
        }
    }
    record
}
