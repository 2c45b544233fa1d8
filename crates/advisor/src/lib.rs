#![deny(warnings)]

//! Generative-AI advisor: special-offer selection, wish pricing, and
//! flashcard drafting.
//!
//! The advisor is an optional collaborator. Without an API key it runs in
//! offline mode, and every call fails closed to an empty or default result;
//! the economy never blocks on or crashes from this service.

use std::env;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::warn;

use cerebro_core::{Reward, RewardId, UserProfile};
use cerebro_econ::{DiscountPicker, MAX_ACTIVE_DISCOUNTS};

const DEFAULT_MODEL: &str = "gemini-3-flash-preview";
const DEFAULT_BASE_URL: &str = "https://generativelanguage.googleapis.com/v1beta";
const REQUEST_TIMEOUT_SECS: u64 = 20;

const FALLBACK_WISH_COST: u64 = 500;
const FALLBACK_WISH_RATIONALE: &str = "Standard pricing.";
const FALLBACK_WISH_ICON: &str = "🎁";
const MIN_WISH_COST: u64 = 100;
const MAX_WISH_COST: u64 = 5_000;

/// Errors from the advisor transport. These never escape the public calls;
/// they are logged and replaced by defaults.
#[derive(Debug, Error)]
pub enum AdvisorError {
    /// GEMINI_API_KEY is absent or empty.
    #[error("GEMINI_API_KEY is not set")]
    MissingApiKey,
    /// Transport-level failure.
    #[error("http error: {0}")]
    Http(String),
    /// The service answered with something unusable.
    #[error("malformed response: {0}")]
    BadResponse(String),
}

/// Connection settings, resolved from the environment.
#[derive(Clone, Debug)]
pub struct AdvisorConfig {
    pub api_key: String,
    pub model: String,
    pub base_url: String,
    pub timeout: Duration,
}

impl AdvisorConfig {
    pub fn from_env() -> Result<Self, AdvisorError> {
        let api_key = env::var("GEMINI_API_KEY")
            .ok()
            .filter(|key| !key.trim().is_empty())
            .ok_or(AdvisorError::MissingApiKey)?;
        let model = env::var("CEREBRO_AI_MODEL").unwrap_or_else(|_| DEFAULT_MODEL.to_string());
        let base_url =
            env::var("CEREBRO_AI_URL").unwrap_or_else(|_| DEFAULT_BASE_URL.to_string());
        Ok(Self {
            api_key,
            model,
            base_url,
            timeout: Duration::from_secs(REQUEST_TIMEOUT_SECS),
        })
    }
}

/// A priced wish, ready to become a catalog entry.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct WishQuote {
    pub cost: u64,
    pub rationale: String,
    pub icon: String,
}

impl Default for WishQuote {
    fn default() -> Self {
        Self {
            cost: FALLBACK_WISH_COST,
            rationale: FALLBACK_WISH_RATIONALE.to_string(),
            icon: FALLBACK_WISH_ICON.to_string(),
        }
    }
}

/// An AI-drafted flashcard front/back pair.
#[derive(Clone, Debug, PartialEq, Eq, Deserialize)]
pub struct CardDraft {
    pub front: String,
    pub back: String,
}

enum Mode {
    Live(LiveClient),
    Offline,
}

/// The AI collaborator. Construct with [`Advisor::from_env`]; a missing or
/// unusable configuration degrades to offline mode with a warning.
pub struct Advisor {
    mode: Mode,
}

impl Advisor {
    pub fn from_env() -> Self {
        match AdvisorConfig::from_env() {
            Ok(config) => match LiveClient::new(config) {
                Ok(client) => Self {
                    mode: Mode::Live(client),
                },
                Err(err) => {
                    warn!("advisor HTTP client unavailable ({err}); running offline");
                    Self { mode: Mode::Offline }
                }
            },
            Err(AdvisorError::MissingApiKey) => {
                warn!("GEMINI_API_KEY not set; advisor running offline");
                Self { mode: Mode::Offline }
            }
            Err(err) => {
                warn!("advisor configuration failed ({err}); running offline");
                Self { mode: Mode::Offline }
            }
        }
    }

    /// Forced offline instance for tests and local-only operation.
    pub fn offline() -> Self {
        Self { mode: Mode::Offline }
    }

    pub fn is_live(&self) -> bool {
        matches!(self.mode, Mode::Live(_))
    }

    /// Pick up to two catalog items to put on special offer for a lapsed
    /// user. Offline or on any failure: no offers.
    pub fn pick_discounts(&self, profile: &UserProfile, catalog: &[Reward]) -> Vec<RewardId> {
        let Mode::Live(client) = &self.mode else {
            return Vec::new();
        };
        match client.generate_json(&discount_prompt(profile, catalog)) {
            Ok(text) => parse_discount_ids(&text, catalog),
            Err(err) => {
                warn!("discount selection failed ({err}); no offers");
                Vec::new()
            }
        }
    }

    /// Price an arbitrary named wish against the user's goals. Offline or on
    /// any failure: the standard quote.
    pub fn price_wish(&self, wish: &str, goals: &str) -> WishQuote {
        let Mode::Live(client) = &self.mode else {
            return WishQuote::default();
        };
        match client.generate_json(&wish_prompt(wish, goals)) {
            Ok(text) => parse_wish_quote(&text),
            Err(err) => {
                warn!("wish pricing failed ({err}); using standard quote");
                WishQuote::default()
            }
        }
    }

    /// Draft flashcards for a topic. Offline or on any failure: empty.
    pub fn draft_flashcards(&self, topic: &str, quantity: usize) -> Vec<CardDraft> {
        let Mode::Live(client) = &self.mode else {
            return Vec::new();
        };
        match client.generate_json(&flashcard_prompt(topic, quantity)) {
            Ok(text) => parse_card_drafts(&text),
            Err(err) => {
                warn!("flashcard drafting failed ({err}); no cards");
                Vec::new()
            }
        }
    }
}

impl DiscountPicker for Advisor {
    fn pick_discounts(&self, profile: &UserProfile, catalog: &[Reward]) -> Vec<RewardId> {
        Advisor::pick_discounts(self, profile, catalog)
    }
}

/// Turn a priced wish into a general catalog entry with a fresh id. The
/// quote's rationale becomes the item's effect text.
pub fn reward_from_wish(wish: &str, quote: &WishQuote) -> Reward {
    let mut reward = Reward::custom(wish, quote.cost.max(1), quote.icon.clone());
    reward.effect = Some(quote.rationale.clone());
    reward
}

// --- Prompts ---

fn discount_prompt(profile: &UserProfile, catalog: &[Reward]) -> String {
    let ids: Vec<&str> = catalog.iter().map(|r| r.id.0.as_str()).collect();
    let owned: Vec<&str> = profile.inventory.keys().map(String::as_str).collect();
    format!(
        "The user has been inactive. Goals: \"{}\". Owned items: [{}]. \
         Catalog ids: [{}]. Select up to {} catalog ids to put on special \
         offer to win the user back. \
         Respond with JSON: {{\"discountedIds\": [\"id\"]}}",
        profile.goals,
        owned.join(", "),
        ids.join(", "),
        MAX_ACTIVE_DISCOUNTS
    )
}

fn wish_prompt(wish: &str, goals: &str) -> String {
    format!(
        "Price this wish in credits ({MIN_WISH_COST}-{MAX_WISH_COST}): \"{wish}\". \
         The user's goals: \"{goals}\". Counterproductive wishes get a very \
         high price; supportive ones a moderate one. \
         Respond with JSON: {{\"cost\": 0, \"rationale\": \"short reason\", \"icon\": \"emoji\"}}"
    )
}

fn flashcard_prompt(topic: &str, quantity: usize) -> String {
    format!(
        "Write {quantity} flashcards about \"{topic}\". \
         Respond with a JSON array: [{{\"front\": \"question\", \"back\": \"answer\"}}]"
    )
}

// --- Response parsing (pure, fail-closed) ---

#[derive(Deserialize)]
struct DiscountPayload {
    #[serde(default, rename = "discountedIds")]
    discounted_ids: Vec<String>,
}

fn parse_discount_ids(text: &str, catalog: &[Reward]) -> Vec<RewardId> {
    let payload: DiscountPayload = match serde_json::from_str(text) {
        Ok(payload) => payload,
        Err(err) => {
            warn!("discount payload unparsable ({err}); no offers");
            return Vec::new();
        }
    };
    payload
        .discounted_ids
        .into_iter()
        .map(RewardId)
        .filter(|id| catalog.iter().any(|r| &r.id == id))
        .take(MAX_ACTIVE_DISCOUNTS)
        .collect()
}

#[derive(Deserialize)]
struct WishPayload {
    cost: Option<i64>,
    rationale: Option<String>,
    icon: Option<String>,
}

fn parse_wish_quote(text: &str) -> WishQuote {
    let payload: WishPayload = match serde_json::from_str(text) {
        Ok(payload) => payload,
        Err(err) => {
            warn!("wish payload unparsable ({err}); using standard quote");
            return WishQuote::default();
        }
    };
    let cost = payload
        .cost
        .unwrap_or(FALLBACK_WISH_COST as i64)
        .clamp(MIN_WISH_COST as i64, MAX_WISH_COST as i64) as u64;
    WishQuote {
        cost,
        rationale: payload
            .rationale
            .filter(|r| !r.trim().is_empty())
            .unwrap_or_else(|| FALLBACK_WISH_RATIONALE.to_string()),
        icon: payload
            .icon
            .filter(|i| !i.trim().is_empty())
            .unwrap_or_else(|| FALLBACK_WISH_ICON.to_string()),
    }
}

fn parse_card_drafts(text: &str) -> Vec<CardDraft> {
    let drafts: Vec<CardDraft> = match serde_json::from_str(text) {
        Ok(drafts) => drafts,
        Err(err) => {
            warn!("flashcard payload unparsable ({err}); no cards");
            return Vec::new();
        }
    };
    drafts
        .into_iter()
        .filter(|d| !d.front.trim().is_empty() && !d.back.trim().is_empty())
        .collect()
}

// --- HTTP transport ---

struct LiveClient {
    http: reqwest::blocking::Client,
    config: AdvisorConfig,
}

impl LiveClient {
    fn new(config: AdvisorConfig) -> Result<Self, AdvisorError> {
        let http = reqwest::blocking::Client::builder()
            .timeout(config.timeout)
            .build()
            .map_err(|err| AdvisorError::Http(err.to_string()))?;
        Ok(Self { http, config })
    }

    /// One generateContent round-trip in JSON mode, returning the raw text
    /// of the first non-empty candidate part.
    fn generate_json(&self, prompt: &str) -> Result<String, AdvisorError> {
        let url = format!(
            "{}/models/{}:generateContent",
            self.config.base_url, self.config.model
        );
        let payload = GenerateRequest {
            contents: vec![Content {
                parts: vec![Part {
                    text: prompt.to_string(),
                }],
            }],
            generation_config: GenerationConfig {
                response_mime_type: "application/json",
            },
        };
        let response = self
            .http
            .post(url)
            .query(&[("key", self.config.api_key.as_str())])
            .json(&payload)
            .send()
            .map_err(|err| AdvisorError::Http(err.to_string()))?;
        let status = response.status();
        if !status.is_success() {
            return Err(AdvisorError::Http(format!("HTTP {status}")));
        }
        let body: GenerateResponse = response
            .json()
            .map_err(|err| AdvisorError::BadResponse(err.to_string()))?;
        body.candidates
            .into_iter()
            .find_map(|c| c.content.parts.into_iter().find_map(|p| p.text))
            .map(|text| text.trim().to_string())
            .filter(|text| !text.is_empty())
            .ok_or_else(|| AdvisorError::BadResponse("empty completion".to_string()))
    }
}

#[derive(Debug, Serialize)]
struct GenerateRequest {
    contents: Vec<Content>,
    #[serde(rename = "generationConfig")]
    generation_config: GenerationConfig,
}

#[derive(Debug, Serialize)]
struct Content {
    parts: Vec<Part>,
}

#[derive(Debug, Serialize)]
struct Part {
    text: String,
}

#[derive(Debug, Serialize)]
struct GenerationConfig {
    #[serde(rename = "responseMimeType")]
    response_mime_type: &'static str,
}

#[derive(Debug, Deserialize)]
struct GenerateResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
}

#[derive(Debug, Deserialize)]
struct Candidate {
    content: CandidateContent,
}

#[derive(Debug, Deserialize)]
struct CandidateContent {
    #[serde(default)]
    parts: Vec<ResponsePart>,
}

#[derive(Debug, Deserialize)]
struct ResponsePart {
    text: Option<String>,
}
