//! Prompt construction for proposal generation.
//!
//! Pure functions: same proposal + preferences in, same prompt out. The
//! system instruction always carries the full required JSON schema — the
//! parser downstream depends on it.

use crate::models::preference::UserPreferenceRow;
use crate::models::proposal::ProposalRow;

/// System instruction sent on every generation attempt. Names the exact
/// required schema and per-field length/format constraints.
pub const SYSTEM_INSTRUCTION: &str = r#"You are an expert business proposal writer.
Output VALID JSON ONLY (no markdown, no code fences, no commentary).
Do NOT include keys outside the required schema.
Keep language formal, concise, and client-appropriate.

Return exactly this structure:
{
  "project_title": "...",
  "introduction": "...",
  "objectives": ["..."],
  "problem_statement": "...",
  "proposed_system": "...",
  "main_modules": ["..."],
  "expected_outcomes": "...",
  "tools_and_technology": "..."
}

Rules:
- project_title: <= 12 words.
- introduction: 120-200 words.
- objectives: array of 3-5 items, each <= 18 words, start with a verb.
- problem_statement: 90-150 words.
- proposed_system: 120-220 words.
- main_modules: array of 4-7 items; each item is "Module Name: 1 sentence function".
- expected_outcomes: 80-140 words.
- tools_and_technology: 1 paragraph OR a comma-separated list.
- Keep it formal and aligned with a professional proposal template."#;

/// Extra constraint block prepended on the single retry after a
/// parse/schema failure. Paired with lower-temperature sampling.
pub const STRICT_RETRY_INSTRUCTION: &str = "IMPORTANT: Your previous response was invalid or truncated JSON.\n\
Return ONLY a single valid JSON object that matches the exact schema.\n\
Do not include markdown. Do not include extra text.";

/// Builds the user-content block from the proposal's fields and humanized
/// preference values. Absent preferences fall back to readable defaults.
pub fn build_user_prompt(proposal: &ProposalRow, pref: Option<&UserPreferenceRow>) -> String {
    let tone = humanized_or(pref.and_then(|p| p.tone_of_voice.as_deref()), "Professional");
    let niche = humanized_or(pref.and_then(|p| p.niche.as_deref()), "General Development");
    let template = humanized_or(pref.and_then(|p| p.template_style.as_deref()), "Formal");

    let mut writer_settings = vec![
        format!("- Tone: {tone}"),
        format!("- Niche: {niche}"),
        format!("- Template Style: {template}"),
    ];
    writer_settings.extend(branding_lines(pref));

    format!(
        "Generate a formal business proposal using the required JSON schema.\n\
         \n\
         Client Name: {}\n\
         Project Requirements: {}\n\
         Scope of Work: {}\n\
         Timeline: {}\n\
         Pricing/Budget: {}\n\
         \n\
         Writer Settings:\n\
         {}\n\
         \n\
         Quality checklist (must satisfy):\n\
         - Mention the client name in Introduction.\n\
         - Objectives must be measurable and action-oriented.\n\
         - Main Modules must look like a software architecture breakdown.\n\
         - Tools & Technology should match the client's stated constraints where given.",
        proposal.client_name,
        proposal.client_requirements.as_deref().unwrap_or(""),
        proposal.scope_of_work,
        proposal.timeline.as_deref().unwrap_or(""),
        proposal.pricing.as_deref().unwrap_or(""),
        writer_settings.join("\n"),
    )
}

/// Composes the full first-attempt prompt. The provider takes a single user
/// turn, so the system instruction is embedded ahead of the content block.
pub fn compose_prompt(proposal: &ProposalRow, pref: Option<&UserPreferenceRow>) -> String {
    format!(
        "{SYSTEM_INSTRUCTION}\n\n---\n\n{}",
        build_user_prompt(proposal, pref)
    )
}

/// Composes the retry prompt with the strict JSON-only constraint added.
pub fn compose_strict_prompt(proposal: &ProposalRow, pref: Option<&UserPreferenceRow>) -> String {
    format!(
        "{SYSTEM_INSTRUCTION}\n\n{STRICT_RETRY_INSTRUCTION}\n\n---\n\n{}",
        build_user_prompt(proposal, pref)
    )
}

/// Branding hints, included only when the preference carries them.
fn branding_lines(pref: Option<&UserPreferenceRow>) -> Vec<String> {
    let Some(pref) = pref else { return vec![] };
    let Some(branding) = pref.branding.as_object() else {
        return vec![];
    };

    let mut lines = Vec::new();
    let primary = branding.get("primary").and_then(|v| v.as_str());
    let secondary = branding.get("secondary").and_then(|v| v.as_str());
    if primary.is_some() || secondary.is_some() {
        lines.push(format!(
            "- Brand Colors: primary={}, secondary={}",
            primary.unwrap_or(""),
            secondary.unwrap_or("")
        ));
    }
    if let Some(logo) = branding.get("logo_url").and_then(|v| v.as_str()) {
        if !logo.is_empty() {
            lines.push(format!("- Logo URL: {logo}"));
        }
    }
    lines
}

/// `ai_startups` → `Ai startups`: underscores to spaces, first letter
/// upper-cased. Matches how stored tokens are presented to the model.
pub fn humanize(token: &str) -> String {
    let spaced = token.replace('_', " ");
    let mut chars = spaced.chars();
    match chars.next() {
        None => String::new(),
        Some(first) => first.to_uppercase().collect::<String>() + chars.as_str(),
    }
}

fn humanized_or(token: Option<&str>, default: &str) -> String {
    match token {
        Some(t) if !t.is_empty() => humanize(t),
        _ => default.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use serde_json::json;
    use uuid::Uuid;

    fn proposal() -> ProposalRow {
        ProposalRow {
            id: Uuid::new_v4(),
            user_id: Uuid::new_v4(),
            client_name: "Acme Corp".to_string(),
            client_requirements: Some("Inventory tracking".to_string()),
            scope_of_work: "Build X".to_string(),
            timeline: Some("8 weeks".to_string()),
            pricing: Some("$12,000".to_string()),
            status: "draft".to_string(),
            user_preference_id: None,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    fn preference(branding: serde_json::Value) -> UserPreferenceRow {
        UserPreferenceRow {
            id: Uuid::new_v4(),
            user_id: Uuid::new_v4(),
            theme: None,
            language: None,
            industry: None,
            niche: Some("ai_startups".to_string()),
            template_style: Some("modern".to_string()),
            tone_of_voice: Some("persuasive".to_string()),
            default_output_format: None,
            branding,
            other: json!({}),
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    #[test]
    fn test_system_instruction_names_every_required_key() {
        for key in crate::generation::parser::REQUIRED_KEYS {
            assert!(
                SYSTEM_INSTRUCTION.contains(key),
                "schema description missing key {key}"
            );
        }
    }

    #[test]
    fn test_defaults_when_no_preference() {
        let prompt = build_user_prompt(&proposal(), None);
        assert!(prompt.contains("- Tone: Professional"));
        assert!(prompt.contains("- Niche: General Development"));
        assert!(prompt.contains("- Template Style: Formal"));
    }

    #[test]
    fn test_preference_values_are_humanized() {
        let pref = preference(json!({}));
        let prompt = build_user_prompt(&proposal(), Some(&pref));
        assert!(prompt.contains("- Tone: Persuasive"));
        assert!(prompt.contains("- Niche: Ai startups"));
        assert!(prompt.contains("- Template Style: Modern"));
    }

    #[test]
    fn test_proposal_fields_are_interpolated() {
        let prompt = build_user_prompt(&proposal(), None);
        assert!(prompt.contains("Client Name: Acme Corp"));
        assert!(prompt.contains("Scope of Work: Build X"));
        assert!(prompt.contains("Timeline: 8 weeks"));
        assert!(prompt.contains("Pricing/Budget: $12,000"));
    }

    #[test]
    fn test_branding_lines_present_only_when_set() {
        let without = build_user_prompt(&proposal(), Some(&preference(json!({}))));
        assert!(!without.contains("Brand Colors"));
        assert!(!without.contains("Logo URL"));

        let with = build_user_prompt(
            &proposal(),
            Some(&preference(
                json!({"primary": "#102030", "logo_url": "https://acme.test/logo.png"}),
            )),
        );
        assert!(with.contains("Brand Colors: primary=#102030"));
        assert!(with.contains("Logo URL: https://acme.test/logo.png"));
    }

    #[test]
    fn test_compose_prompt_always_carries_schema() {
        let prompt = compose_prompt(&proposal(), None);
        assert!(prompt.contains("\"project_title\""));
        assert!(prompt.contains("Return exactly this structure"));
    }

    #[test]
    fn test_strict_prompt_adds_retry_constraint() {
        let first = compose_prompt(&proposal(), None);
        let strict = compose_strict_prompt(&proposal(), None);
        assert!(!first.contains("previous response was invalid"));
        assert!(strict.contains("previous response was invalid"));
        // The retry never drops the schema.
        assert!(strict.contains("\"main_modules\""));
    }

    #[test]
    fn test_humanize() {
        assert_eq!(humanize("professional"), "Professional");
        assert_eq!(humanize("ai_startups"), "Ai startups");
        assert_eq!(humanize(""), "");
    }

    #[test]
    fn test_prompt_is_deterministic() {
        let p = proposal();
        assert_eq!(compose_prompt(&p, None), compose_prompt(&p, None));
    }
}
