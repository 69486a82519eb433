use serde::{ Deserialize, Serialize };

/// Raw contact-form fields as posted by the landing page.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct ContactForm {
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub email: String,
    #[serde(default)]
    pub phone: String,
    #[serde(default)]
    pub subject: String,
    #[serde(default)]
    pub message: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Subject {
    General,
    Order,
    Partnership,
    Technical,
    Emergency,
}

impl Subject {
    pub fn from_value(value: &str) -> Option<Self> {
        match value {
            "general" => Some(Subject::General),
            "order" => Some(Subject::Order),
            "partnership" => Some(Subject::Partnership),
            "technical" => Some(Subject::Technical),
            "emergency" => Some(Subject::Emergency),
            _ => None,
        }
    }

    pub fn title(&self) -> &'static str {
        match self {
            Subject::General => "General Inquiry",
            Subject::Order => "Order Support",
            Subject::Partnership => "Hospital Partnership",
            Subject::Technical => "Technical Support",
            Subject::Emergency => "Emergency Supply",
        }
    }
}

/// A contact request that passed validation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ContactRequest {
    pub name: String,
    pub email: String,
    pub phone: Option<String>,
    pub subject: Subject,
    pub message: String,
}
