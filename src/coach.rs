use crate::error::CoachError;
use crate::session::SessionStats;
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::io;
use std::sync::mpsc::Sender;
use std::sync::Arc;
use std::time::Duration;

pub const FALLBACK_TEXT: &str = "Keep practicing. Precision is the key to victory.";
pub const FALLBACK_RATING: &str = "TRAINEE";
/// Below this accuracy the review leans towards tough love.
pub const TOUGH_LOVE_BELOW: u32 = 60;

const DEFAULT_ENDPOINT: &str = "https://generativelanguage.googleapis.com/v1beta/models";
const DEFAULT_MODEL: &str = "gemini-3-pro-preview";
const DEFAULT_TIMEOUT: Duration = Duration::from_secs(15);

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CoachFeedback {
    pub text: String,
    pub rating: String,
}

impl CoachFeedback {
    pub fn fallback() -> Self {
        Self {
            text: FALLBACK_TEXT.to_string(),
            rating: FALLBACK_RATING.to_string(),
        }
    }
}

/// Produces the end-of-session review.
pub trait Coach: Send + Sync {
    fn review(&self, stats: &SessionStats) -> Result<CoachFeedback, CoachError>;
}

/// Review the session, substituting the fixed fallback for any failure.
pub fn review_or_fallback(coach: &dyn Coach, stats: &SessionStats) -> CoachFeedback {
    match coach.review(stats) {
        Ok(feedback) => feedback,
        Err(e) => {
            log::warn!("coach feedback failed, using fallback: {}", e);
            CoachFeedback::fallback()
        }
    }
}

/// Feedback tagged with the session it was requested for.
#[derive(Debug, Clone, PartialEq)]
pub struct CoachReply {
    pub session: u64,
    pub feedback: CoachFeedback,
}

/// Run the review on a worker thread and send the tagged reply back.
///
/// `stats` is a snapshot; the live session keeps mutating independently.
pub fn dispatch(coach: Arc<dyn Coach>, session: u64, stats: SessionStats, tx: Sender<CoachReply>) {
    dispatch_on(
        |job| {
            std::thread::Builder::new()
                .name("aimrange-coach".into())
                .spawn(job)
                .map(|_| ())
        },
        coach,
        session,
        stats,
        tx,
    );
}

/// Like [`dispatch`], with the worker started by `spawn`. If it cannot be
/// started the fallback is sent straight away.
fn dispatch_on<S>(
    spawn: S,
    coach: Arc<dyn Coach>,
    session: u64,
    stats: SessionStats,
    tx: Sender<CoachReply>,
) where
    S: FnOnce(Box<dyn FnOnce() + Send>) -> io::Result<()>,
{
    let worker_tx = tx.clone();
    let job = Box::new(move || {
        let feedback = review_or_fallback(coach.as_ref(), &stats);
        // receiver gone means the engine was dropped
        let _ = worker_tx.send(CoachReply { session, feedback });
    });

    if let Err(e) = spawn(job) {
        log::warn!("could not spawn coach worker, using fallback: {}", e);
        let _ = tx.send(CoachReply {
            session,
            feedback: CoachFeedback::fallback(),
        });
    }
}

pub fn build_prompt(stats: &SessionStats) -> String {
    let accuracy = stats.accuracy();
    let tone = if accuracy < TOUGH_LOVE_BELOW {
        "Accuracy is below 60%, so give a bit of a \"tough love\" roast."
    } else {
        "Accuracy is 60% or better, so be motivational."
    };

    format!(
        "Act as an elite eSports aim coach.\n\
         Analyze these session stats:\n\
         - Score: {}\n\
         - Hits: {}\n\
         - Misses: {}\n\
         - Accuracy: {}%\n\n\
         Provide a concise (2 sentences max) performance review. {}\n\
         Also provide a one-word skill rating (e.g., BRONZE, GOLD, RADIANT, BOT).",
        stats.score, stats.hits, stats.misses, accuracy, tone
    )
}

/// Validate the model's JSON answer: both fields present and non-empty.
pub fn parse_feedback(raw: &str) -> Result<CoachFeedback, CoachError> {
    let feedback: CoachFeedback =
        serde_json::from_str(raw.trim()).map_err(|e| CoachError::Malformed(e.to_string()))?;

    let text = feedback.text.trim();
    let rating = feedback.rating.trim();
    if text.is_empty() || rating.is_empty() {
        return Err(CoachError::Malformed("empty text or rating".into()));
    }

    Ok(CoachFeedback {
        text: text.to_string(),
        rating: rating.to_string(),
    })
}

#[derive(Debug, Default, Deserialize)]
struct GenerateResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
}

#[derive(Debug, Default, Deserialize)]
struct Candidate {
    #[serde(default)]
    content: Content,
}

#[derive(Debug, Default, Deserialize)]
struct Content {
    #[serde(default)]
    parts: Vec<Part>,
}

#[derive(Debug, Default, Deserialize)]
struct Part {
    #[serde(default)]
    text: Option<String>,
}

/// Coach backed by the Gemini `generateContent` REST API.
#[derive(Clone)]
pub struct GeminiCoach {
    client: reqwest::blocking::Client,
    api_key: String,
    endpoint: String,
    model: String,
}

impl GeminiCoach {
    pub fn new(api_key: impl Into<String>) -> Result<Self, CoachError> {
        let client = reqwest::blocking::Client::builder()
            .timeout(DEFAULT_TIMEOUT)
            .build()?;
        Ok(Self {
            client,
            api_key: api_key.into(),
            endpoint: DEFAULT_ENDPOINT.to_string(),
            model: DEFAULT_MODEL.to_string(),
        })
    }

    /// Key from `GEMINI_API_KEY`, falling back to `API_KEY`.
    pub fn from_env() -> Result<Self, CoachError> {
        let key = std::env::var("GEMINI_API_KEY")
            .or_else(|_| std::env::var("API_KEY"))
            .ok()
            .filter(|k| !k.trim().is_empty())
            .ok_or_else(|| CoachError::Unavailable("no GEMINI_API_KEY or API_KEY set".into()))?;
        Self::new(key)
    }

    pub fn with_endpoint(mut self, endpoint: impl Into<String>) -> Self {
        self.endpoint = endpoint.into();
        self
    }

    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model = model.into();
        self
    }

    fn request_body(stats: &SessionStats) -> serde_json::Value {
        json!({
            "contents": [{ "parts": [{ "text": build_prompt(stats) }] }],
            "generationConfig": {
                "responseMimeType": "application/json",
                "responseSchema": {
                    "type": "OBJECT",
                    "properties": {
                        "text": { "type": "STRING" },
                        "rating": { "type": "STRING" }
                    },
                    "required": ["text", "rating"]
                }
            }
        })
    }
}

impl Coach for GeminiCoach {
    fn review(&self, stats: &SessionStats) -> Result<CoachFeedback, CoachError> {
        let url = format!(
            "{}/{}:generateContent",
            self.endpoint.trim_end_matches('/'),
            self.model
        );
        let response = self
            .client
            .post(url)
            .header("x-goog-api-key", &self.api_key)
            .json(&Self::request_body(stats))
            .send()?;

        if !response.status().is_success() {
            return Err(CoachError::Status(response.status().as_u16()));
        }

        let body: GenerateResponse = response
            .json()
            .map_err(|e| CoachError::Malformed(e.to_string()))?;
        let raw = body
            .candidates
            .into_iter()
            .flat_map(|c| c.content.parts)
            .find_map(|p| p.text)
            .ok_or_else(|| CoachError::Malformed("no text in response".into()))?;

        parse_feedback(&raw)
    }
}

/// Coach for offline runs; every review falls back.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoCoach;

impl Coach for NoCoach {
    fn review(&self, _stats: &SessionStats) -> Result<CoachFeedback, CoachError> {
        Err(CoachError::Unavailable("offline".into()))
    }
}
