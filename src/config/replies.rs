use log::info;
use once_cell::sync::Lazy;
use serde::{ Deserialize, Serialize };
use std::fmt;
use std::fs;
use std::path::{ Path, PathBuf };
use std::sync::Arc;
use std::time::SystemTime;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum RepliesError {
    #[error("Failed to read replies file '{path}': {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("Failed to parse replies file '{path}': {source}")]
    Json {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
    #[error("Reply rule '{0}' has no keywords")]
    EmptyKeywords(Intent),
    #[error("Reply rule '{0}' has an empty response")]
    EmptyResponse(Intent),
    #[error("Replies file must define at least one rule")]
    NoRules,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Deserialize, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Intent {
    Greeting,
    Medicine,
    Order,
    Prescription,
    Emergency,
    Consultation,
    Location,
    Fallback,
}

impl Intent {
    pub fn as_str(&self) -> &'static str {
        match self {
            Intent::Greeting => "greeting",
            Intent::Medicine => "medicine",
            Intent::Order => "order",
            Intent::Prescription => "prescription",
            Intent::Emergency => "emergency",
            Intent::Consultation => "consultation",
            Intent::Location => "location",
            Intent::Fallback => "fallback",
        }
    }
}

impl fmt::Display for Intent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Fires when the lower-cased utterance contains any of `keywords`.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ReplyRule {
    pub intent: Intent,
    pub keywords: Vec<String>,
    pub response: String,
}

impl ReplyRule {
    fn new(intent: Intent, keywords: &[&str], response: &str) -> Self {
        Self {
            intent,
            keywords: keywords
                .iter()
                .map(|k| k.to_string())
                .collect(),
            response: response.to_string(),
        }
    }

    pub fn matches(&self, normalized: &str) -> bool {
        self.keywords.iter().any(|k| normalized.contains(k.as_str()))
    }
}

/// Ordered keyword table. Rules are tried top to bottom; the first hit wins.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ReplyTable {
    pub greeting: String,
    pub fallback: String,
    #[serde(default)]
    pub quick_actions: Vec<String>,
    pub rules: Vec<ReplyRule>,
    #[serde(skip)]
    pub last_loaded: Option<SystemTime>,
}

pub const OPENING_GREETING: &str =
    "Hello! I'm your AI health assistant. How can I help you today?";

pub const FALLBACK_REPLY: &str =
    "I understand you need help. Could you please be more specific about what you're looking for? I can assist with medicines, orders, prescriptions, and general health queries.";

static DEFAULT_TABLE: Lazy<Arc<ReplyTable>> = Lazy::new(|| {
    Arc::new(ReplyTable {
        greeting: OPENING_GREETING.to_string(),
        fallback: FALLBACK_REPLY.to_string(),
        quick_actions: [
            "Check medicine availability",
            "Track my order",
            "Prescription upload",
            "Emergency delivery",
            "Health consultation",
            "Store locations",
        ]
            .iter()
            .map(|s| s.to_string())
            .collect(),
        rules: vec![
            ReplyRule::new(
                Intent::Greeting,
                &["hello", "hi"],
                "Hello! I'm here to help with your healthcare needs. What can I assist you with today?"
            ),
            ReplyRule::new(
                Intent::Medicine,
                &["medicine", "drug", "tablet"],
                "I can help you check medicine availability, prices, and alternatives. What medication are you looking for?"
            ),
            ReplyRule::new(
                Intent::Order,
                &["order", "track"],
                "To track your order, please provide your order number. You can also check your order status in your account dashboard."
            ),
            ReplyRule::new(
                Intent::Prescription,
                &["prescription", "upload"],
                "You can upload your prescription by clicking the attachment icon or taking a photo. Our pharmacists will verify it within 30 minutes."
            ),
            ReplyRule::new(
                Intent::Emergency,
                &["emergency", "urgent"],
                "For emergency deliveries, we offer same-day delivery for urgent medications. Call our 24/7 hotline at +91 9876543210."
            ),
            ReplyRule::new(
                Intent::Consultation,
                &["consultation", "doctor", "advice"],
                "Our AI can provide basic health information, but for medical advice, please consult with our qualified pharmacists or your doctor."
            ),
            ReplyRule::new(
                Intent::Location,
                &["location", "store", "address"],
                "Our main store is at 123 Health Street, Mumbai. We also offer delivery across the city. Would you like to see nearby pickup points?"
            )
        ],
        last_loaded: None,
    })
});

pub fn default_table() -> Arc<ReplyTable> {
    Arc::clone(&DEFAULT_TABLE)
}

impl ReplyTable {
    /// Lower-cases keywords and rejects rules that could never fire or
    /// would answer with nothing.
    fn normalize(mut self) -> Result<Self, RepliesError> {
        if self.rules.is_empty() {
            return Err(RepliesError::NoRules);
        }
        for rule in &mut self.rules {
            rule.keywords = rule.keywords
                .iter()
                .map(|k| k.trim().to_lowercase())
                .filter(|k| !k.is_empty())
                .collect();
            if rule.keywords.is_empty() {
                return Err(RepliesError::EmptyKeywords(rule.intent));
            }
            if rule.response.trim().is_empty() {
                return Err(RepliesError::EmptyResponse(rule.intent));
            }
        }
        Ok(self)
    }
}

pub fn load_replies<P: AsRef<Path>>(path: P) -> Result<Arc<ReplyTable>, RepliesError> {
    let path = path.as_ref();
    let file_content = fs::read_to_string(path).map_err(|source| RepliesError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    let table: ReplyTable = serde_json
        ::from_str(&file_content)
        .map_err(|source| RepliesError::Json { path: path.to_path_buf(), source })?;
    let mut table = table.normalize()?;
    table.last_loaded = Some(SystemTime::now());
    Ok(Arc::new(table))
}

pub fn reload_replies_if_changed<P: AsRef<Path>>(
    path: P,
    current: &Arc<ReplyTable>
) -> Result<Option<Arc<ReplyTable>>, RepliesError> {
    let path = path.as_ref();
    let metadata = fs::metadata(path).map_err(|source| RepliesError::Io {
        path: path.to_path_buf(),
        source,
    })?;

    if let Ok(modified) = metadata.modified() {
        match current.last_loaded {
            Some(last_loaded) if modified <= last_loaded => {}
            Some(_) => {
                info!("Replies file changed, reloading...");
                return load_replies(path).map(Some);
            }
            None => {
                info!("No last_loaded timestamp, loading replies from {}", path.display());
                return load_replies(path).map(Some);
            }
        }
    }
    Ok(None)
}
