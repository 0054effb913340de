//! Shared fixtures: a scripted styling provider and router helpers.

#![allow(dead_code)]

use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use axum::body::Body;
use axum::http::{Method, Request, StatusCode};
use axum::Router;
use http_body_util::BodyExt;
use parking_lot::Mutex;
use serde_json::Value;
use tokio::sync::Semaphore;
use tower::ServiceExt;

use virtual_stylist::error::ProviderError;
use virtual_stylist::models::{OutfitConcept, TrendInfo, TrendSource};
use virtual_stylist::provider::{ConceptBrief, ItemAnalysis, StylingProvider};
use virtual_stylist::routes::{router, AppState};
use virtual_stylist::session::StylingSessions;
use virtual_stylist::store::MemoryRecordStore;
use virtual_stylist::workflow::Stylist;

/// 1x1 PNG, as a browser would upload it.
pub const SOURCE_IMAGE: &str = "data:image/png;base64,iVBORw0KGgoAAAANSUhEUgAAAAEAAAABCAYAAAAfFcSJAAAADUlEQVR42mNkYPhfDwAChwGA60e6kgAAAABJRU5ErkJggg==";

pub const CASUAL: &str = "casual look with denim";
pub const BUSINESS: &str = "business look with trousers";
pub const NIGHT_OUT: &str = "night look with heels";
pub const CUSTOM: &str = "wedding guest look";

#[derive(Debug, Clone)]
pub enum Outcome {
    Image(String),
    Empty,
    Fail,
}

pub fn image_for(description: &str) -> String {
    format!("data:image/png;base64,{}", description.replace(' ', "_"))
}

pub fn analysis(custom: Option<&str>) -> ItemAnalysis {
    let brief = |concept, description: &str, accessory: &str| ConceptBrief {
        concept,
        description: description.to_string(),
        accessory_suggestions: vec![accessory.to_string()],
    };
    let mut briefs = vec![
        brief(OutfitConcept::Casual, CASUAL, "white sneakers"),
        brief(OutfitConcept::Business, BUSINESS, "leather loafers"),
        brief(OutfitConcept::NightOut, NIGHT_OUT, "gold hoops"),
    ];
    if let Some(description) = custom {
        briefs.push(brief(OutfitConcept::Custom, description, "straw hat"));
    }
    ItemAnalysis {
        item_name: "Linen blazer".into(),
        color_palette: vec!["Sand".into()],
        style_keywords: vec!["Relaxed".into()],
        briefs,
    }
}

/// Provider whose answers are set up per test. Generation succeeds with
/// `image_for(description)` unless overridden for that description.
pub struct ScriptedProvider {
    analysis: Mutex<Result<ItemAnalysis, String>>,
    trend: Mutex<Result<TrendInfo, String>>,
    generation: Mutex<HashMap<String, Outcome>>,
    edit: Mutex<Outcome>,
    generation_gate: Option<Arc<Semaphore>>,
    edit_gate: Option<Arc<Semaphore>>,
    pub generate_calls: AtomicUsize,
    pub edit_calls: AtomicUsize,
}

impl ScriptedProvider {
    pub fn new() -> Self {
        Self {
            analysis: Mutex::new(Ok(analysis(None))),
            trend: Mutex::new(Ok(TrendInfo {
                text: "Linen is everywhere this season.".into(),
                sources: vec![TrendSource { uri: "https://example.com/linen".into(), title: "Linen edit".into() }],
            })),
            generation: Mutex::new(HashMap::new()),
            edit: Mutex::new(Outcome::Image("data:image/png;base64,EDITED".into())),
            generation_gate: None,
            edit_gate: None,
            generate_calls: AtomicUsize::new(0),
            edit_calls: AtomicUsize::new(0),
        }
    }

    pub fn with_analysis(self, analysis: ItemAnalysis) -> Self {
        *self.analysis.lock() = Ok(analysis);
        self
    }

    pub fn failing_analysis(self) -> Self {
        *self.analysis.lock() = Err("vision model unavailable".into());
        self
    }

    pub fn failing_trend(self) -> Self {
        *self.trend.lock() = Err("search quota exceeded".into());
        self
    }

    pub fn with_generation(self, description: &str, outcome: Outcome) -> Self {
        self.set_generation(description, outcome);
        self
    }

    pub fn set_generation(&self, description: &str, outcome: Outcome) {
        self.generation.lock().insert(description.to_string(), outcome);
    }

    pub fn with_edit(self, outcome: Outcome) -> Self {
        *self.edit.lock() = outcome;
        self
    }

    /// Generation calls block until permits are added to the returned gate.
    pub fn gated_generation(mut self) -> (Self, Arc<Semaphore>) {
        let gate = Arc::new(Semaphore::new(0));
        self.generation_gate = Some(Arc::clone(&gate));
        (self, gate)
    }

    pub fn gated_edit(mut self) -> (Self, Arc<Semaphore>) {
        let gate = Arc::new(Semaphore::new(0));
        self.edit_gate = Some(Arc::clone(&gate));
        (self, gate)
    }
}

fn settle(outcome: Outcome) -> Result<Option<String>, ProviderError> {
    match outcome {
        Outcome::Image(image) => Ok(Some(image)),
        Outcome::Empty => Ok(None),
        Outcome::Fail => Err(ProviderError::Http("status=500 body=boom".into())),
    }
}

#[async_trait]
impl StylingProvider for ScriptedProvider {
    async fn analyze(&self, _source_image: &str, _occasion: Option<&str>) -> Result<ItemAnalysis, ProviderError> {
        self.analysis.lock().clone().map_err(ProviderError::Other)
    }

    async fn trend_lookup(&self, _item_name: &str) -> Result<TrendInfo, ProviderError> {
        self.trend.lock().clone().map_err(ProviderError::Http)
    }

    async fn generate_image(&self, _source_image: &str, description: &str) -> Result<Option<String>, ProviderError> {
        self.generate_calls.fetch_add(1, Ordering::SeqCst);
        if let Some(gate) = &self.generation_gate {
            gate.acquire().await.expect("gate closed").forget();
        }
        let outcome = self.generation.lock().get(description).cloned()
            .unwrap_or_else(|| Outcome::Image(image_for(description)));
        settle(outcome)
    }

    async fn edit_image(&self, _generated_image: &str, _instruction: &str) -> Result<Option<String>, ProviderError> {
        self.edit_calls.fetch_add(1, Ordering::SeqCst);
        if let Some(gate) = &self.edit_gate {
            gate.acquire().await.expect("gate closed").forget();
        }
        let outcome = self.edit.lock().clone();
        settle(outcome)
    }
}

pub struct TestApp {
    pub router: Router,
    pub sessions: StylingSessions,
    pub store: Arc<MemoryRecordStore>,
    pub provider: Arc<ScriptedProvider>,
}

pub fn build_test_app(provider: ScriptedProvider) -> TestApp {
    let provider = Arc::new(provider);
    let store = Arc::new(MemoryRecordStore::new());
    let sessions = StylingSessions::new(Stylist::new(provider.clone()), store.clone());
    let router = router(AppState { sessions: sessions.clone() }, 20 * 1024 * 1024);
    TestApp { router, sessions, store, provider }
}

pub async fn send(app: &Router, method: Method, uri: &str, body: Option<Value>) -> (StatusCode, Value) {
    let mut builder = Request::builder().method(method).uri(uri);
    let body = match body {
        Some(json) => {
            builder = builder.header("content-type", "application/json");
            Body::from(json.to_string())
        }
        None => Body::empty(),
    };
    let response = app.clone().oneshot(builder.body(body).unwrap()).await.unwrap();
    let status = response.status();
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    let json = if bytes.is_empty() { Value::Null } else { serde_json::from_slice(&bytes).unwrap() };
    (status, json)
}

/// Polls a run until no look is still generating.
pub async fn wait_until_settled(app: &Router, run_id: &str) -> Value {
    for _ in 0..200 {
        let (status, run) = send(app, Method::GET, &format!("/api/styling/{run_id}"), None).await;
        assert_eq!(status, StatusCode::OK);
        let settled = run["outfits"].as_array().unwrap().iter().all(|o| o["state"] != "generating");
        if settled {
            return run;
        }
        tokio::time::sleep(Duration::from_millis(5)).await;
    }
    panic!("run {run_id} never settled");
}
