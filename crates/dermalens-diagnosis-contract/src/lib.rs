#![warn(missing_docs)]
//! # dermalens-diagnosis-contract
//!
//! ## Purpose
//! Defines the skin-analysis response schema, the chat exchange types, and
//! strict client-side parsing.
//!
//! ## Responsibilities
//! - Declare the response schema sent to the generative service.
//! - Parse model output into a complete [`DiagnosticResult`] or fail.
//! - Hold the fixed instruction texts the service is prompted with.
//!
//! ## Data flow
//! Model response text -> [`parse_diagnostic_result`] -> [`DiagnosticResult`]
//! -> latest-diagnosis container and report projection.
//!
//! ## Ownership and lifetimes
//! Parsed values are owned structs; nothing borrows from transient network
//! buffers.
//!
//! ## Error model
//! Empty text, invalid JSON, missing or mistyped fields, and out-of-range
//! scores return [`SchemaError`]. An empty object is never a valid result.
//!
//! ## Security and privacy notes
//! This crate handles model output only; it never sees images or api keys.

use serde::{Deserialize, Serialize};
use serde_json::{Value, json};
use thiserror::Error;

/// Instruction sent with every diagnostic image.
pub const DIAGNOSIS_INSTRUCTION: &str = "Act as a Board-Certified Dermatologist. Analyze this \
skin image for damage (sun damage, barrier irritation, acne, etc.). Provide a professional \
diagnosis. Include: 1) Personalized clinical advice, 2) Safe home remedies, 3) Recommended \
active skincare ingredients, 4) General recommendations. Format as structured JSON with \
metrics for inflammation, hydration, and pigmentation.";

/// System instruction for follow-up chat.
pub const CHAT_SYSTEM_INSTRUCTION: &str = "You are Monica, an expert AI Dermatologist. You are \
friendly, concise, and helpful. You provide evidence-based skincare advice. If users ask for \
recent news, use Google Search.";

/// Reply shown when the chat service returns no text.
pub const CHAT_FALLBACK_REPLY: &str = "I'm sorry, I couldn't process that. Can you rephrase?";

/// Top-level fields every diagnostic result must carry, in wire naming.
pub const REQUIRED_RESULT_FIELDS: [&str; 9] = [
    "classification",
    "confidence",
    "severity",
    "description",
    "dermatologistAdvice",
    "homeRemedies",
    "skincareIngredients",
    "recommendations",
    "metrics",
];

/// Validated analysis of one skin image.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DiagnosticResult {
    /// Condition name, for example `Mild Acne`.
    pub classification: String,
    /// Model confidence on either a `[0, 1]` or a `[0, 100]` scale.
    pub confidence: f64,
    /// Overall severity.
    pub severity: Severity,
    /// Plain-language description.
    pub description: String,
    /// Personalized clinical advice.
    pub dermatologist_advice: String,
    /// Ordered home remedies.
    pub home_remedies: Vec<HomeRemedy>,
    /// Ordered active ingredients.
    pub skincare_ingredients: Vec<SkincareIngredient>,
    /// Ordered general recommendations.
    pub recommendations: Vec<String>,
    /// Skin metric scores.
    pub metrics: SkinMetrics,
}

impl DiagnosticResult {
    /// Returns confidence as a percentage in `[0, 100]`.
    ///
    /// Values up to `1.0` are treated as fractions.
    pub fn confidence_percent(&self) -> f64 {
        if self.confidence <= 1.0 {
            self.confidence * 100.0
        } else {
            self.confidence
        }
    }
}

/// Severity levels accepted by the schema.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Severity {
    /// Low severity.
    Low,
    /// Moderate severity.
    Moderate,
    /// High severity.
    High,
}

impl Severity {
    /// Wire and display label.
    pub fn label(self) -> &'static str {
        match self {
            Self::Low => "Low",
            Self::Moderate => "Moderate",
            Self::High => "High",
        }
    }
}

/// One home remedy.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HomeRemedy {
    /// Remedy title.
    pub title: String,
    /// How to apply it.
    pub instructions: String,
}

/// One recommended active ingredient.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SkincareIngredient {
    /// Ingredient name.
    pub name: String,
    /// Why it helps.
    pub benefit: String,
}

/// Numeric skin metric scores.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SkinMetrics {
    /// Inflammation score.
    pub inflammation: f64,
    /// Hydration score.
    pub hydration: f64,
    /// Pigmentation score.
    pub pigmentation: f64,
}

/// Speaker of one chat turn.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChatRole {
    /// The person using the app.
    User,
    /// The model.
    Model,
}

/// One prior chat turn, supplied by the caller in conversation order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatTurn {
    /// Speaker.
    pub role: ChatRole,
    /// Message text.
    pub text: String,
}

impl ChatTurn {
    /// Creates a user turn.
    pub fn user(text: impl Into<String>) -> Self {
        Self {
            role: ChatRole::User,
            text: text.into(),
        }
    }

    /// Creates a model turn.
    pub fn model(text: impl Into<String>) -> Self {
        Self {
            role: ChatRole::Model,
            text: text.into(),
        }
    }
}

/// Web source cited by a search-augmented reply.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GroundingReference {
    /// Source URL.
    pub uri: String,
    /// Source title, when reported.
    pub title: Option<String>,
}

/// Chat reply text plus citations.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatReply {
    /// Reply text.
    pub text: String,
    /// Cited sources, possibly empty.
    pub grounding: Vec<GroundingReference>,
}

/// Returns the response schema declared to the generative service.
pub fn diagnostic_response_schema() -> Value {
    json!({
        "type": "OBJECT",
        "properties": {
            "classification": { "type": "STRING" },
            "confidence": { "type": "NUMBER" },
            "severity": { "type": "STRING", "enum": ["Low", "Moderate", "High"] },
            "description": { "type": "STRING" },
            "dermatologistAdvice": { "type": "STRING" },
            "homeRemedies": {
                "type": "ARRAY",
                "items": {
                    "type": "OBJECT",
                    "properties": {
                        "title": { "type": "STRING" },
                        "instructions": { "type": "STRING" }
                    },
                    "required": ["title", "instructions"]
                }
            },
            "skincareIngredients": {
                "type": "ARRAY",
                "items": {
                    "type": "OBJECT",
                    "properties": {
                        "name": { "type": "STRING" },
                        "benefit": { "type": "STRING" }
                    },
                    "required": ["name", "benefit"]
                }
            },
            "recommendations": {
                "type": "ARRAY",
                "items": { "type": "STRING" }
            },
            "metrics": {
                "type": "OBJECT",
                "properties": {
                    "inflammation": { "type": "NUMBER" },
                    "hydration": { "type": "NUMBER" },
                    "pigmentation": { "type": "NUMBER" }
                },
                "required": ["inflammation", "hydration", "pigmentation"]
            }
        },
        "required": REQUIRED_RESULT_FIELDS,
    })
}

/// Parses model output into a complete diagnostic result.
///
/// # Errors
/// - [`SchemaError::EmptyResponse`] for blank text.
/// - [`SchemaError::Decode`] for invalid JSON or a missing/mistyped field.
/// - [`SchemaError::InvalidContract`] for blank classification or scores
///   outside their ranges.
pub fn parse_diagnostic_result(raw: &str) -> Result<DiagnosticResult, SchemaError> {
    if raw.trim().is_empty() {
        return Err(SchemaError::EmptyResponse);
    }

    let parsed: DiagnosticResult = serde_json::from_str(raw)?;

    if parsed.classification.trim().is_empty() {
        return Err(SchemaError::InvalidContract(
            "classification is empty".to_string(),
        ));
    }

    if !parsed.confidence.is_finite() || !(0.0..=100.0).contains(&parsed.confidence) {
        return Err(SchemaError::InvalidContract(format!(
            "confidence {} is outside [0, 100]",
            parsed.confidence
        )));
    }

    let metrics = parsed.metrics;
    for (name, value) in [
        ("inflammation", metrics.inflammation),
        ("hydration", metrics.hydration),
        ("pigmentation", metrics.pigmentation),
    ] {
        if !value.is_finite() || value < 0.0 {
            return Err(SchemaError::InvalidContract(format!(
                "metric {name} has invalid score {value}"
            )));
        }
    }

    Ok(parsed)
}

/// Diagnostic response contract errors.
#[derive(Debug, Error)]
pub enum SchemaError {
    /// The service returned no text.
    #[error("analysis response is empty")]
    EmptyResponse,
    /// JSON decode failure, including missing or mistyped fields.
    #[error("analysis decode failure: {0}")]
    Decode(#[from] serde_json::Error),
    /// Parsed payload violates contract invariants.
    #[error("analysis contract violation: {0}")]
    InvalidContract(String),
}
