//! User preference validation and normalization.
//!
//! Every enumerated field is restricted to a closed set of lower-cased,
//! underscore-normalized tokens. Inputs are normalized first (so "AI
//! Startups" becomes `ai_startups`), then checked against the sets. The
//! branding map is allow-listed; `other` is free-form.

pub mod handlers;

use serde::Deserialize;
use serde_json::Value;

pub const THEMES: &[&str] = &["light", "dark", "system"];

pub const LANGUAGES: &[&str] = &["en", "es", "fr", "de", "zh", "ja", "ru", "ar", "pt", "hi"];

pub const INDUSTRIES: &[&str] = &[
    "technology",
    "healthcare",
    "finance",
    "education",
    "entertainment",
    "retail",
    "hospitality",
    "manufacturing",
    "real_estate",
    "transportation",
    "consulting",
    "marketing",
    "legal",
    "non_profit",
    "government",
    "other",
];

pub const NICHES: &[&str] = &[
    "ai_startups",
    "ecommerce",
    "saas",
    "freelancing",
    "blogging",
    "digital_marketing",
    "health_and_wellness",
    "personal_finance",
    "education_technology",
    "real_estate_investment",
    "travel_and_tourism",
    "food_and_beverage",
    "fashion_and_beauty",
    "gaming",
    "environmental_sustainability",
    "other",
];

pub const TEMPLATE_STYLES: &[&str] = &[
    "casual",
    "professional",
    "modern",
    "classic",
    "minimalist",
    "creative",
    "elegant",
    "bold",
    "vibrant",
    "sleek",
    "simple",
    "colorful",
    "monochrome",
];

pub const TONES: &[&str] = &[
    "professional",
    "casual",
    "friendly",
    "formal",
    "humorous",
    "concise",
    "detailed",
    "enthusiastic",
    "persuasive",
    "informative",
    "empathetic",
    "authoritative",
    "optimistic",
];

pub const OUTPUT_FORMATS: &[&str] = &["pdf", "docx"];

pub const ALLOWED_BRANDING_KEYS: &[&str] = &["primary", "secondary", "logo_url"];

/// Incoming preference attributes. All fields optional so the same shape
/// serves both create and partial update.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct PreferenceInput {
    pub theme: Option<String>,
    pub language: Option<String>,
    pub industry: Option<String>,
    pub niche: Option<String>,
    pub template_style: Option<String>,
    pub tone_of_voice: Option<String>,
    pub default_output_format: Option<String>,
    pub branding: Option<Value>,
    pub other: Option<Value>,
}

impl PreferenceInput {
    /// Lower-cases every enumerated field and replaces spaces with
    /// underscores where the token sets use them.
    pub fn normalize(&mut self) {
        normalize_field(&mut self.theme, false);
        normalize_field(&mut self.language, false);
        normalize_field(&mut self.industry, true);
        normalize_field(&mut self.niche, true);
        normalize_field(&mut self.template_style, false);
        normalize_field(&mut self.tone_of_voice, false);
        normalize_field(&mut self.default_output_format, false);
    }

    /// Checks every present field against its closed set and the branding
    /// map against the key allowlist. All violations are reported together.
    pub fn validate(&self) -> Result<(), Vec<String>> {
        let mut errors = Vec::new();

        check_token("theme", self.theme.as_deref(), THEMES, &mut errors);
        check_token("language", self.language.as_deref(), LANGUAGES, &mut errors);
        check_token(
            "industry",
            self.industry.as_deref(),
            INDUSTRIES,
            &mut errors,
        );
        check_token("niche", self.niche.as_deref(), NICHES, &mut errors);
        check_token(
            "template_style",
            self.template_style.as_deref(),
            TEMPLATE_STYLES,
            &mut errors,
        );
        check_token(
            "tone_of_voice",
            self.tone_of_voice.as_deref(),
            TONES,
            &mut errors,
        );
        check_token(
            "default_output_format",
            self.default_output_format.as_deref(),
            OUTPUT_FORMATS,
            &mut errors,
        );

        if let Some(branding) = &self.branding {
            match branding.as_object() {
                Some(map) => {
                    let unknown: Vec<&str> = map
                        .keys()
                        .map(String::as_str)
                        .filter(|key| !ALLOWED_BRANDING_KEYS.contains(key))
                        .collect();
                    if !unknown.is_empty() {
                        errors.push(format!(
                            "branding contains unknown keys: {}",
                            unknown.join(", ")
                        ));
                    }
                }
                None => errors.push("branding must be an object".to_string()),
            }
        }

        if let Some(other) = &self.other {
            if !other.is_object() {
                errors.push("other must be an object".to_string());
            }
        }

        if errors.is_empty() {
            Ok(())
        } else {
            Err(errors)
        }
    }
}

fn normalize_field(field: &mut Option<String>, underscore_spaces: bool) {
    if let Some(value) = field {
        let mut normalized = value.trim().to_lowercase();
        if underscore_spaces {
            normalized = normalized.replace(' ', "_");
        }
        *field = Some(normalized);
    }
}

fn check_token(name: &str, value: Option<&str>, allowed: &[&str], errors: &mut Vec<String>) {
    if let Some(value) = value {
        if !allowed.contains(&value) {
            errors.push(format!("{name} is not a valid value: '{value}'"));
        }
    }
}
