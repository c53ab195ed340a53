//! User profile normalization and validation.
//!
//! Incoming fields are polished before persisting: names are title-cased,
//! URLs get a scheme, skills are trimmed/deduped. Validation mirrors the
//! column constraints (required first name, length caps, http(s) URLs).

pub mod handlers;

use serde::Deserialize;

pub const MAX_HEADLINE_LEN: usize = 120;
pub const MAX_SUMMARY_LEN: usize = 2000;

/// Incoming profile attributes (text parts of the multipart body).
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ProfileInput {
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub full_name: Option<String>,
    pub headline: Option<String>,
    pub job_title: Option<String>,
    pub company: Option<String>,
    pub location: Option<String>,
    pub website: Option<String>,
    pub linkedin_url: Option<String>,
    pub summary: Option<String>,
    pub skills: Option<Vec<String>>,
}

impl ProfileInput {
    pub fn normalize(&mut self) {
        for field in [
            &mut self.first_name,
            &mut self.last_name,
            &mut self.headline,
            &mut self.job_title,
            &mut self.company,
            &mut self.location,
        ] {
            if let Some(value) = field {
                *field = Some(titleize(value.trim()));
            }
        }

        // full_name: derive from the name parts when absent, polish otherwise.
        match &self.full_name {
            Some(name) if !name.trim().is_empty() => {
                self.full_name = Some(titleize(name.trim()));
            }
            _ => {
                let composed = [self.first_name.as_deref(), self.last_name.as_deref()]
                    .into_iter()
                    .flatten()
                    .collect::<Vec<_>>()
                    .join(" ");
                if !composed.trim().is_empty() {
                    self.full_name = Some(composed.trim().to_string());
                }
            }
        }

        if let Some(url) = &self.website {
            self.website = Some(normalize_url(url));
        }
        if let Some(url) = &self.linkedin_url {
            self.linkedin_url = Some(normalize_url(url));
        }
        if let Some(summary) = &self.summary {
            self.summary = Some(summary.trim().to_string());
        }
        if let Some(skills) = &self.skills {
            self.skills = Some(normalize_skills(skills));
        }
    }

    /// `require_first_name` is true on create; updates may omit it.
    pub fn validate(&self, require_first_name: bool) -> Result<(), Vec<String>> {
        let mut errors = Vec::new();

        if require_first_name && self.first_name.as_deref().unwrap_or("").trim().is_empty() {
            errors.push("first_name can't be blank".to_string());
        }
        if let Some(headline) = &self.headline {
            if headline.chars().count() > MAX_HEADLINE_LEN {
                errors.push(format!(
                    "headline is too long (maximum is {MAX_HEADLINE_LEN} characters)"
                ));
            }
        }
        if let Some(summary) = &self.summary {
            if summary.chars().count() > MAX_SUMMARY_LEN {
                errors.push(format!(
                    "summary is too long (maximum is {MAX_SUMMARY_LEN} characters)"
                ));
            }
        }
        for (name, value) in [
            ("website", self.website.as_deref()),
            ("linkedin_url", self.linkedin_url.as_deref()),
        ] {
            if let Some(url) = value {
                if !url.is_empty() && !is_http_url(url) {
                    errors.push(format!("{name} must be a valid URL"));
                }
            }
        }

        if errors.is_empty() {
            Ok(())
        } else {
            Err(errors)
        }
    }
}

/// Capitalizes the first letter of each whitespace-separated word.
pub fn titleize(text: &str) -> String {
    text.split_whitespace()
        .map(|word| {
            let mut chars = word.chars();
            match chars.next() {
                None => String::new(),
                Some(first) => first.to_uppercase().collect::<String>() + chars.as_str(),
            }
        })
        .collect::<Vec<_>>()
        .join(" ")
}

/// Prepends `https://` when the value has no scheme.
pub fn normalize_url(url: &str) -> String {
    let url = url.trim();
    if url.is_empty() || url.contains("://") {
        url.to_string()
    } else {
        format!("https://{url}")
    }
}

fn is_http_url(url: &str) -> bool {
    url.starts_with("http://") || url.starts_with("https://")
}

/// Trim, drop empties, titleize, dedupe preserving order.
pub fn normalize_skills(skills: &[String]) -> Vec<String> {
    let mut seen = std::collections::HashSet::new();
    skills
        .iter()
        .map(|s| s.trim())
        .filter(|s| !s.is_empty())
        .map(titleize)
        .filter(|s| seen.insert(s.clone()))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_titleize() {
        assert_eq!(titleize("ada lovelace"), "Ada Lovelace");
        assert_eq!(titleize("  spaced   out "), "Spaced Out");
        assert_eq!(titleize(""), "");
    }

    #[test]
    fn test_normalize_url_adds_scheme() {
        assert_eq!(normalize_url("acme.test"), "https://acme.test");
        assert_eq!(normalize_url("http://acme.test"), "http://acme.test");
        assert_eq!(normalize_url(""), "");
    }

    #[test]
    fn test_normalize_skills_dedupes_and_titleizes() {
        let skills = vec![
            " rust ".to_string(),
            String::new(),
            "rust".to_string(),
            "event sourcing".to_string(),
        ];
        assert_eq!(
            normalize_skills(&skills),
            vec!["Rust".to_string(), "Event Sourcing".to_string()]
        );
    }

    #[test]
    fn test_full_name_derived_from_parts() {
        let mut input = ProfileInput {
            first_name: Some("ada".to_string()),
            last_name: Some("lovelace".to_string()),
            ..Default::default()
        };
        input.normalize();
        assert_eq!(input.full_name.as_deref(), Some("Ada Lovelace"));
    }

    #[test]
    fn test_explicit_full_name_wins() {
        let mut input = ProfileInput {
            first_name: Some("ada".to_string()),
            full_name: Some("countess of lovelace".to_string()),
            ..Default::default()
        };
        input.normalize();
        assert_eq!(input.full_name.as_deref(), Some("Countess Of Lovelace"));
    }

    #[test]
    fn test_first_name_required_on_create() {
        let input = ProfileInput::default();
        assert!(input.validate(true).is_err());
        assert!(input.validate(false).is_ok());
    }

    #[test]
    fn test_headline_length_cap() {
        let input = ProfileInput {
            headline: Some("x".repeat(MAX_HEADLINE_LEN + 1)),
            first_name: Some("Ada".to_string()),
            ..Default::default()
        };
        let errors = input.validate(true).unwrap_err();
        assert!(errors[0].contains("headline"));
    }

    #[test]
    fn test_invalid_url_rejected_after_normalization() {
        let mut input = ProfileInput {
            first_name: Some("Ada".to_string()),
            website: Some("ftp://files.acme.test".to_string()),
            ..Default::default()
        };
        input.normalize();
        assert!(input.validate(true).is_err());
    }

    #[test]
    fn test_schemeless_url_becomes_valid() {
        let mut input = ProfileInput {
            first_name: Some("Ada".to_string()),
            website: Some("acme.test".to_string()),
            ..Default::default()
        };
        input.normalize();
        assert!(input.validate(true).is_ok());
    }
}
