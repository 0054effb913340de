//! Contract for the external vision/generation service.

use async_trait::async_trait;

use crate::error::ProviderError;
use crate::models::{OutfitConcept, TrendInfo};

/// What analysis proposes for one outfit concept.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConceptBrief {
    pub concept: OutfitConcept,
    pub description: String,
    pub accessory_suggestions: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct ItemAnalysis {
    pub item_name: String,
    pub color_palette: Vec<String>,
    pub style_keywords: Vec<String>,
    pub briefs: Vec<ConceptBrief>,
}

impl ItemAnalysis {
    pub fn brief(&self, concept: OutfitConcept) -> Option<&ConceptBrief> {
        self.briefs.iter().find(|b| b.concept == concept)
    }
}

/// Images cross this boundary as data URLs; adapters strip and re-add the
/// prefix themselves. `Ok(None)` means the call succeeded but no image came back.
#[async_trait]
pub trait StylingProvider: Send + Sync {
    async fn analyze(&self, source_image: &str, occasion: Option<&str>) -> Result<ItemAnalysis, ProviderError>;

    async fn trend_lookup(&self, item_name: &str) -> Result<TrendInfo, ProviderError>;

    async fn generate_image(&self, source_image: &str, description: &str) -> Result<Option<String>, ProviderError>;

    async fn edit_image(&self, generated_image: &str, instruction: &str) -> Result<Option<String>, ProviderError>;

    /// True when the provider serves canned results instead of calling out.
    fn is_demo(&self) -> bool {
        false
    }
}
