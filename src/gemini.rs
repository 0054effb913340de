use async_trait::async_trait;
use base64::Engine;
use reqwest::Client;
use serde::Deserialize;
use serde_json::{json, Value};
use tracing::{info, warn, error};

use crate::config::GeminiSettings;
use crate::error::ProviderError;
use crate::image::{inline_parts, preview, to_data_url, DEFAULT_GENERATED_MIME};
use crate::models::{OutfitConcept, TrendInfo, TrendSource};
use crate::provider::{ConceptBrief, ItemAnalysis, StylingProvider};

/// Trend text used when the search answer came back empty.
pub const NO_TREND_TEXT: &str = "No trend information found.";

/// Renders request or response JSON for logs, with inline image payloads
/// cut down to a preview.
fn loggable(body: &Value) -> String {
    fn shorten_inline_data(value: &mut Value) {
        match value {
            Value::Object(map) => {
                for (key, val) in map.iter_mut() {
                    match val {
                        Value::String(data) if key == "data" && data.len() > 100 => *data = preview(data),
                        other => shorten_inline_data(other),
                    }
                }
            }
            Value::Array(items) => items.iter_mut().for_each(shorten_inline_data),
            _ => {}
        }
    }

    let mut copy = body.clone();
    shorten_inline_data(&mut copy);
    copy.to_string()
}

pub struct GeminiClient {
    client: Client,
    settings: GeminiSettings,
}

impl GeminiClient {
    pub fn new(settings: GeminiSettings) -> Result<Self, ProviderError> {
        let client = Client::builder()
            .timeout(settings.timeout)
            .build()
            .map_err(|e| ProviderError::Other(e.to_string()))?;
        Ok(Self { client, settings })
    }

    async fn generate_content(&self, model: &str, body: &Value) -> Result<GeminiResponse, ProviderError> {
        let api_key = self.settings.api_key.as_deref().unwrap_or_default();
        let url = format!("{}/models/{}:generateContent?key={}", self.settings.base_url, model, api_key);

        info!(model, "🔗 Calling Gemini generateContent");
        tracing::debug!("📤 Request body: {}", loggable(body));

        let response = self.client
            .post(&url)
            .json(body)
            .send()
            .await
            .map_err(|e| ProviderError::Http(e.to_string()))?;

        let status = response.status();
        let response_text = response.text().await.map_err(|e| ProviderError::Http(e.to_string()))?;

        if !status.is_success() {
            error!(model, %status, "❌ Gemini API error response: {}", response_text);
            return Err(ProviderError::Http(format!("status={} body={}", status, response_text)));
        }

        let parsed: GeminiResponse = serde_json::from_str(&response_text)
            .map_err(|e| ProviderError::Parse(format!("{}: {}", e, preview(&response_text))))?;

        if let Ok(json_value) = serde_json::from_str::<Value>(&response_text) {
            tracing::debug!("📥 Raw Gemini API response: {}", loggable(&json_value));
        }
        Ok(parsed)
    }

    fn build_analysis_prompt(&self, occasion: Option<&str>) -> String {
        let mut prompt = String::from(
            "Analyze this clothing item. Identify its name, color palette and style. \
             Then describe 3 distinct complete looks (Casual, Business, Night Out) that include this item.",
        );
        if let Some(occasion) = occasion {
            prompt.push_str(&format!(" Also describe a distinct look for the specific occasion: \"{occasion}\"."));
        }
        prompt.push_str(&format!(
            " Also give 1-2 specific accessory or shoe recommendations for each look to complete it. \
             Respond in {}. Return the data as JSON.",
            self.settings.language
        ));
        prompt
    }

    fn build_analysis_body(&self, source_image: &str, occasion: Option<&str>) -> Value {
        let (mime_type, data) = inline_parts(source_image);
        json!({
            "contents": [{
                "parts": [
                    {"inlineData": {"mimeType": mime_type, "data": data}},
                    {"text": self.build_analysis_prompt(occasion)}
                ]
            }],
            "systemInstruction": {
                "parts": [{"text": format!(
                    "You are a high-end fashion stylist. Be specific about materials, colors and complementary pieces. Always answer in {}.",
                    self.settings.language
                )}]
            },
            "generationConfig": {
                "responseMimeType": "application/json",
                "responseSchema": analysis_schema(occasion)
            }
        })
    }

    async fn image_call(&self, image: &str, text: String, extra_config: Value) -> Result<Option<String>, ProviderError> {
        let (mime_type, data) = inline_parts(image);
        let mut generation_config = json!({ "responseModalities": ["TEXT", "IMAGE"] });
        if let (Some(target), Value::Object(extra)) = (generation_config.as_object_mut(), extra_config) {
            target.extend(extra);
        }
        let body = json!({
            "contents": [{
                "parts": [
                    {"inlineData": {"mimeType": mime_type, "data": data}},
                    {"text": text}
                ]
            }],
            "generationConfig": generation_config
        });

        let parsed = self.generate_content(&self.settings.image_model, &body).await?;
        let image = extract_first_image(&parsed);
        match &image {
            Some(data_url) => info!("🖼️ Extracted image from API response: {}", preview(data_url)),
            None => warn!("⚠️ No image data found in API response"),
        }
        Ok(image)
    }

    fn demo_analysis(occasion: Option<&str>) -> ItemAnalysis {
        let mut briefs: Vec<ConceptBrief> = OutfitConcept::FIXED.iter().map(|concept| {
            let (description, accessories) = match concept {
                OutfitConcept::Casual => ("Flat-lay of the item with straight-leg light denim, a white tee and clean canvas sneakers.", vec!["White canvas sneakers", "Woven tote bag"]),
                OutfitConcept::Business => ("Flat-lay of the item with tailored charcoal trousers, a crisp shirt and leather loafers.", vec!["Leather loafers", "Minimal steel watch"]),
                _ => ("Flat-lay of the item with a black slip skirt, strappy heels and gold jewelry.", vec!["Strappy heels", "Gold hoop earrings"]),
            };
            ConceptBrief {
                concept: *concept,
                description: description.to_string(),
                accessory_suggestions: accessories.into_iter().map(String::from).collect(),
            }
        }).collect();
        if let Some(occasion) = occasion {
            briefs.push(ConceptBrief {
                concept: OutfitConcept::Custom,
                description: format!("Flat-lay of the item styled for {occasion}, with pieces chosen for the setting."),
                accessory_suggestions: vec!["Structured clutch".to_string()],
            });
        }
        ItemAnalysis {
            item_name: "Demo clothing item".to_string(),
            color_palette: vec!["Navy".to_string(), "Ivory".to_string()],
            style_keywords: vec!["Classic".to_string(), "Versatile".to_string()],
            briefs,
        }
    }

    fn generate_placeholder_image(&self, prompt: &str) -> String {
        let colors = [
            "#3B82F6", // Blue
            "#EF4444", // Red
            "#10B981", // Green
            "#F59E0B", // Yellow
            "#8B5CF6", // Purple
        ];

        let color = colors[prompt.len() % colors.len()];
        let lower = prompt.to_lowercase();
        let title = if lower.contains("sneakers") || lower.contains("casual") { "👟 Casual" }
                   else if lower.contains("loafers") || lower.contains("business") { "💼 Business" }
                   else if lower.contains("heels") || lower.contains("night") { "🌙 Night Out" }
                   else if lower.starts_with("edit") { "✏️ Edited Look" }
                   else { "✨ Your Look" };

        let svg = format!(r#"<svg width="300" height="400" xmlns="http://www.w3.org/2000/svg">
            <defs>
                <linearGradient id="grad" x1="0%" y1="0%" x2="100%" y2="100%">
                    <stop offset="0%" style="stop-color:{};stop-opacity:1" />
                    <stop offset="100%" style="stop-color:{};stop-opacity:0.6" />
                </linearGradient>
            </defs>
            <rect width="300" height="400" fill="url(#grad)" />
            <text x="150" y="200" font-family="Arial, sans-serif" font-size="24" font-weight="bold"
                  text-anchor="middle" fill="white">
                {}
            </text>
            <text x="150" y="240" font-family="Arial, sans-serif" font-size="12"
                  text-anchor="middle" fill="white" opacity="0.8">
                Virtual Stylist demo look
            </text>
        </svg>"#, color, color, title);

        to_data_url("image/svg+xml", &base64::engine::general_purpose::STANDARD.encode(svg.as_bytes()))
    }
}

#[async_trait]
impl StylingProvider for GeminiClient {
    async fn analyze(&self, source_image: &str, occasion: Option<&str>) -> Result<ItemAnalysis, ProviderError> {
        if self.is_demo() {
            info!("Using demo mode - canned analysis");
            return Ok(Self::demo_analysis(occasion));
        }

        let body = self.build_analysis_body(source_image, occasion);
        let parsed = self.generate_content(&self.settings.analysis_model, &body).await?;
        let text = parsed.text();
        if text.trim().is_empty() {
            return Err(ProviderError::Parse("empty analysis response".into()));
        }
        let raw: RawAnalysis = serde_json::from_str(strip_code_fence(&text))
            .map_err(|e| ProviderError::Parse(format!("analysis JSON: {e}")))?;
        let analysis = raw.into_analysis(occasion);
        info!(item = %analysis.item_name, looks = analysis.briefs.len(), "✅ Item analyzed");
        Ok(analysis)
    }

    async fn trend_lookup(&self, item_name: &str) -> Result<TrendInfo, ProviderError> {
        if self.is_demo() {
            return Ok(TrendInfo {
                text: format!("Demo trend tip: {item_name} pairs well with relaxed tailoring this season."),
                sources: Vec::new(),
            });
        }

        let body = json!({
            "contents": [{
                "parts": [{"text": format!(
                    "What are the current fashion trends for wearing {item_name}? Give a short style tip and where to buy similar pieces. Respond in {}.",
                    self.settings.language
                )}]
            }],
            "tools": [{"googleSearch": {}}]
        });

        let parsed = self.generate_content(&self.settings.trend_model, &body).await?;
        let text = parsed.text();
        Ok(TrendInfo {
            text: if text.trim().is_empty() { NO_TREND_TEXT.to_string() } else { text.trim().to_string() },
            sources: parsed.grounding_sources(),
        })
    }

    async fn generate_image(&self, source_image: &str, description: &str) -> Result<Option<String>, ProviderError> {
        if self.is_demo() {
            info!("Using demo mode - no real images generated");
            return Ok(Some(self.generate_placeholder_image(description)));
        }

        let text = format!(
            "Create a high-fashion flat-lay photography image based on this description (translate if needed): {description}. \
             Ensure the main clothing item from the input image is the centerpiece. White background. High quality."
        );
        self.image_call(source_image, text, json!({ "imageConfig": { "aspectRatio": "3:4" } })).await
    }

    async fn edit_image(&self, generated_image: &str, instruction: &str) -> Result<Option<String>, ProviderError> {
        if self.is_demo() {
            return Ok(Some(self.generate_placeholder_image(&format!("edit {instruction}"))));
        }

        self.image_call(generated_image, format!("Edit this image: {instruction}"), json!({})).await
    }

    fn is_demo(&self) -> bool {
        self.settings.api_key.is_none()
    }
}

fn analysis_schema(occasion: Option<&str>) -> Value {
    let string_list = |description: String| json!({ "type": "ARRAY", "items": { "type": "STRING" }, "description": description });
    let look_prompt = |look: &str| json!({
        "type": "STRING",
        "description": format!("A detailed prompt to generate a flat-lay image of a {look} look featuring this item.")
    });
    let accessories = |look: &str| string_list(format!("1-2 specific accessory or shoe recommendations for the {look} look."));

    let mut properties = json!({
        "itemName": { "type": "STRING" },
        "colorPalette": { "type": "ARRAY", "items": { "type": "STRING" } },
        "styleKeywords": { "type": "ARRAY", "items": { "type": "STRING" } },
        "casualPrompt": look_prompt("casual"),
        "casualAccessories": accessories("casual"),
        "businessPrompt": look_prompt("business / work"),
        "businessAccessories": accessories("business"),
        "nightOutPrompt": look_prompt("night out / party"),
        "nightOutAccessories": accessories("night out"),
    });
    let mut required = vec![
        "itemName", "colorPalette", "styleKeywords",
        "casualPrompt", "casualAccessories",
        "businessPrompt", "businessAccessories",
        "nightOutPrompt", "nightOutAccessories",
    ];

    if let (Some(occasion), Some(map)) = (occasion, properties.as_object_mut()) {
        map.insert("customPrompt".into(), look_prompt(occasion));
        map.insert("customAccessories".into(), accessories(occasion));
        required.extend(["customPrompt", "customAccessories"]);
    }

    json!({ "type": "OBJECT", "properties": properties, "required": required })
}

fn strip_code_fence(text: &str) -> &str {
    let trimmed = text.trim();
    trimmed
        .strip_prefix("```json")
        .or_else(|| trimmed.strip_prefix("```"))
        .and_then(|rest| rest.strip_suffix("```"))
        .map(str::trim)
        .unwrap_or(trimmed)
}

// --- Response Parsing Helpers ---

/// Analysis payload as the schema names it. Any field may be missing or null.
#[derive(Debug, Deserialize, Default)]
#[serde(rename_all = "camelCase", default)]
struct RawAnalysis {
    item_name: Option<String>,
    color_palette: Option<Vec<String>>,
    style_keywords: Option<Vec<String>>,
    casual_prompt: Option<String>,
    casual_accessories: Option<Vec<String>>,
    business_prompt: Option<String>,
    business_accessories: Option<Vec<String>>,
    night_out_prompt: Option<String>,
    night_out_accessories: Option<Vec<String>>,
    custom_prompt: Option<String>,
    custom_accessories: Option<Vec<String>>,
}

impl RawAnalysis {
    fn into_analysis(self, occasion: Option<&str>) -> ItemAnalysis {
        let brief = |concept, prompt: Option<String>, accessories: Option<Vec<String>>| ConceptBrief {
            concept,
            description: prompt.unwrap_or_default(),
            accessory_suggestions: accessories.unwrap_or_default(),
        };
        let mut briefs = vec![
            brief(OutfitConcept::Casual, self.casual_prompt, self.casual_accessories),
            brief(OutfitConcept::Business, self.business_prompt, self.business_accessories),
            brief(OutfitConcept::NightOut, self.night_out_prompt, self.night_out_accessories),
        ];
        if occasion.is_some() {
            if let Some(prompt) = self.custom_prompt {
                briefs.push(brief(OutfitConcept::Custom, Some(prompt), self.custom_accessories));
            }
        }
        ItemAnalysis {
            item_name: self.item_name.unwrap_or_default(),
            color_palette: self.color_palette.unwrap_or_default(),
            style_keywords: self.style_keywords.unwrap_or_default(),
            briefs,
        }
    }
}

#[derive(Debug, Deserialize)]
struct GeminiResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct Candidate {
    #[serde(default)]
    content: Content,
    #[serde(default)]
    grounding_metadata: Option<GroundingMetadata>,
}

#[derive(Debug, Deserialize, Default)]
struct Content { #[serde(default)] parts: Vec<Part> }

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum Part {
    Inline {
        #[serde(rename = "inlineData")]
        inline_data: InlineData
    },
    Text { text: String },
    Other(#[allow(dead_code)] Value)
}

#[derive(Debug, Deserialize)]
struct InlineData {
    data: String,
    #[serde(rename = "mimeType", default)]
    mime_type: Option<String>,
}

#[derive(Debug, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
struct GroundingMetadata {
    #[serde(default)]
    grounding_chunks: Vec<GroundingChunk>,
}

#[derive(Debug, Deserialize)]
struct GroundingChunk {
    #[serde(default)]
    web: Option<WebChunk>,
}

#[derive(Debug, Deserialize)]
struct WebChunk {
    #[serde(default)]
    uri: Option<String>,
    #[serde(default)]
    title: Option<String>,
}

impl GeminiResponse {
    /// Concatenated text parts of the first candidate.
    fn text(&self) -> String {
        self.candidates
            .first()
            .map(|c| c.content.parts.iter().filter_map(|p| match p {
                Part::Text { text } => Some(text.as_str()),
                _ => None,
            }).collect::<String>())
            .unwrap_or_default()
    }

    fn grounding_sources(&self) -> Vec<TrendSource> {
        self.candidates
            .first()
            .and_then(|c| c.grounding_metadata.as_ref())
            .map(|meta| meta.grounding_chunks.iter()
                .filter_map(|chunk| chunk.web.as_ref())
                .filter_map(|web| web.uri.clone().map(|uri| TrendSource {
                    title: web.title.clone().unwrap_or_else(|| uri.clone()),
                    uri,
                }))
                .collect())
            .unwrap_or_default()
    }
}

fn extract_first_image(resp: &GeminiResponse) -> Option<String> {
    resp.candidates.first()?.content.parts.iter().find_map(|p| match p {
        Part::Inline { inline_data } => {
            let mime = inline_data.mime_type.as_deref().unwrap_or(DEFAULT_GENERATED_MIME);
            Some(to_data_url(mime, &inline_data.data))
        }
        _ => None,
    })
}
