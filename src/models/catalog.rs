use serde::{ Deserialize, Serialize };
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

/// Selector label that matches every category.
pub const ALL_CATEGORIES: &str = "All";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Deserialize, Serialize)]
pub enum Category {
    Medicines,
    Supplements,
    Equipment,
    #[serde(rename = "Personal Care")]
    PersonalCare,
}

impl Category {
    pub const ALL: [Category; 4] = [
        Category::Medicines,
        Category::Supplements,
        Category::Equipment,
        Category::PersonalCare,
    ];

    pub fn label(&self) -> &'static str {
        match self {
            Category::Medicines => "Medicines",
            Category::Supplements => "Supplements",
            Category::Equipment => "Equipment",
            Category::PersonalCare => "Personal Care",
        }
    }
}

impl fmt::Display for Category {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

#[derive(Debug, Error, PartialEq, Eq)]
#[error("Unknown product category: '{0}'")]
pub struct ParseCategoryError(pub String);

impl FromStr for Category {
    type Err = ParseCategoryError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Category::ALL
            .into_iter()
            .find(|c| c.label() == s)
            .ok_or_else(|| ParseCategoryError(s.to_string()))
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Product {
    pub id: u32,
    pub name: String,
    pub category: Category,
    /// Whole rupees.
    pub price: u32,
    pub original_price: u32,
    pub rating: f32,
    pub review_count: u32,
    pub in_stock: bool,
    pub prescription_required: bool,
    pub image: String,
}

impl Product {
    /// Markdown from the original price, rounded to the nearest percent.
    pub fn discount_percent(&self) -> u32 {
        if self.original_price == 0 || self.price >= self.original_price {
            return 0;
        }
        let saved = (self.original_price - self.price) as f64;
        ((saved / (self.original_price as f64)) * 100.0).round() as u32
    }

    pub fn display_price(&self) -> String {
        format_rupees(self.price)
    }

    pub fn display_original_price(&self) -> String {
        format_rupees(self.original_price)
    }
}

/// Renders `1299` as `₹1,299`.
pub fn format_rupees(amount: u32) -> String {
    let digits = amount.to_string();
    let mut grouped = String::with_capacity(digits.len() + digits.len() / 3);
    for (i, ch) in digits.chars().enumerate() {
        if i > 0 && (digits.len() - i) % 3 == 0 {
            grouped.push(',');
        }
        grouped.push(ch);
    }
    format!("₹{}", grouped)
}
