//! Input fingerprinting for generation idempotence.
//!
//! A SHA-256 hex digest over the generation-relevant fields of a proposal
//! and its preference. If the digest matches the one stored with the latest
//! generated version, regeneration is skipped (unless forced).

use serde::Serialize;
use sha2::{Digest, Sha256};

use crate::models::preference::UserPreferenceRow;
use crate::models::proposal::ProposalRow;

/// The exact tuple hashed for idempotence. Field order is fixed by the
/// struct definition, which keeps the serialized form — and the digest —
/// stable across calls.
#[derive(Debug, Serialize)]
struct FingerprintInputs<'a> {
    client_name: &'a str,
    client_requirements: Option<&'a str>,
    scope_of_work: &'a str,
    timeline: Option<&'a str>,
    pricing: Option<&'a str>,
    tone: Option<&'a str>,
    niche: Option<&'a str>,
    template_style: Option<&'a str>,
}

/// Computes the fingerprint for a proposal and its (optional) preference.
pub fn generation_fingerprint(
    proposal: &ProposalRow,
    pref: Option<&UserPreferenceRow>,
) -> String {
    let inputs = FingerprintInputs {
        client_name: &proposal.client_name,
        client_requirements: proposal.client_requirements.as_deref(),
        scope_of_work: &proposal.scope_of_work,
        timeline: proposal.timeline.as_deref(),
        pricing: proposal.pricing.as_deref(),
        tone: pref.and_then(|p| p.tone_of_voice.as_deref()),
        niche: pref.and_then(|p| p.niche.as_deref()),
        template_style: pref.and_then(|p| p.template_style.as_deref()),
    };

    // Serializing a struct of string fields cannot fail.
    let payload = serde_json::to_string(&inputs).unwrap_or_default();
    format!("{:x}", Sha256::digest(payload.as_bytes()))
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

    fn preference() -> UserPreferenceRow {
        UserPreferenceRow {
            id: Uuid::new_v4(),
            user_id: Uuid::new_v4(),
            theme: Some("dark".to_string()),
            language: Some("en".to_string()),
            industry: Some("technology".to_string()),
            niche: Some("saas".to_string()),
            template_style: Some("modern".to_string()),
            tone_of_voice: Some("persuasive".to_string()),
            default_output_format: Some("pdf".to_string()),
            branding: json!({}),
            other: json!({}),
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    #[test]
    fn test_fingerprint_is_deterministic() {
        let p = proposal();
        let pref = preference();
        assert_eq!(
            generation_fingerprint(&p, Some(&pref)),
            generation_fingerprint(&p, Some(&pref))
        );
    }

    #[test]
    fn test_fingerprint_is_hex_sha256() {
        let fp = generation_fingerprint(&proposal(), None);
        assert_eq!(fp.len(), 64);
        assert!(fp.chars().all(|c| c.is_ascii_hexdigit()));
    }

    #[test]
    fn test_scope_of_work_change_changes_fingerprint() {
        let p1 = proposal();
        let mut p2 = proposal();
        p2.scope_of_work = "Build X and Y".to_string();
        assert_ne!(
            generation_fingerprint(&p1, None),
            generation_fingerprint(&p2, None)
        );
    }

    #[test]
    fn test_tone_change_changes_fingerprint() {
        let p = proposal();
        let pref1 = preference();
        let mut pref2 = preference();
        pref2.tone_of_voice = Some("formal".to_string());
        assert_ne!(
            generation_fingerprint(&p, Some(&pref1)),
            generation_fingerprint(&p, Some(&pref2))
        );
    }

    #[test]
    fn test_non_tuple_fields_do_not_affect_fingerprint() {
        let p = proposal();
        let pref1 = preference();
        let mut pref2 = preference();
        pref2.theme = Some("light".to_string());
        pref2.default_output_format = Some("docx".to_string());
        pref2.branding = json!({"primary": "#123456"});
        assert_eq!(
            generation_fingerprint(&p, Some(&pref1)),
            generation_fingerprint(&p, Some(&pref2))
        );
    }

    #[test]
    fn test_status_does_not_affect_fingerprint() {
        let p1 = proposal();
        let mut p2 = proposal();
        p2.status = "generated".to_string();
        assert_eq!(
            generation_fingerprint(&p1, None),
            generation_fingerprint(&p2, None)
        );
    }

    #[test]
    fn test_missing_preference_differs_from_present() {
        let p = proposal();
        let pref = preference();
        assert_ne!(
            generation_fingerprint(&p, None),
            generation_fingerprint(&p, Some(&pref))
        );
    }
}
