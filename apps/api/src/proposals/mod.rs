//! Proposal resource: input validation and payload shaping.

pub mod handlers;

use serde::{Deserialize, Deserializer};

use crate::models::proposal::PROPOSAL_STATUSES;

/// Incoming proposal attributes. All fields optional so the same shape
/// serves both create (with presence checks) and partial update.
///
/// Nullable columns use the double-`Option` shape: the outer `None` means
/// the field was absent (keep the stored value on update), `Some(None)`
/// means an explicit JSON null (clear it).
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ProposalInput {
    pub client_name: Option<String>,
    #[serde(default, deserialize_with = "explicit_null")]
    pub client_requirements: Option<Option<String>>,
    pub scope_of_work: Option<String>,
    #[serde(default, deserialize_with = "explicit_null")]
    pub timeline: Option<Option<String>>,
    #[serde(default, deserialize_with = "explicit_null")]
    pub pricing: Option<Option<String>>,
    pub status: Option<String>,
    #[serde(default, deserialize_with = "explicit_null")]
    pub user_preference_id: Option<Option<uuid::Uuid>>,
}

/// Any present value (including null) becomes `Some(..)`; absent fields fall
/// back to the `default` attribute's `None`.
fn explicit_null<'de, T, D>(deserializer: D) -> Result<Option<Option<T>>, D::Error>
where
    T: Deserialize<'de>,
    D: Deserializer<'de>,
{
    Option::deserialize(deserializer).map(Some)
}

impl ProposalInput {
    /// `require_presence` is true on create: client_name and scope_of_work
    /// must be present and non-blank.
    pub fn validate(&self, require_presence: bool) -> Result<(), Vec<String>> {
        let mut errors = Vec::new();

        if require_presence {
            if self.client_name.as_deref().unwrap_or("").trim().is_empty() {
                errors.push("client_name can't be blank".to_string());
            }
            if self.scope_of_work.as_deref().unwrap_or("").trim().is_empty() {
                errors.push("scope_of_work can't be blank".to_string());
            }
        } else {
            // Updates may omit fields but not blank out the required ones.
            if matches!(self.client_name.as_deref(), Some(v) if v.trim().is_empty()) {
                errors.push("client_name can't be blank".to_string());
            }
            if matches!(self.scope_of_work.as_deref(), Some(v) if v.trim().is_empty()) {
                errors.push("scope_of_work can't be blank".to_string());
            }
        }

        if let Some(status) = self.status.as_deref() {
            if !PROPOSAL_STATUSES.contains(&status) {
                errors.push(format!("status is not a valid value: '{status}'"));
            }
        }

        if errors.is_empty() {
            Ok(())
        } else {
            Err(errors)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_create_requires_client_name_and_scope() {
        let errors = ProposalInput::default().validate(true).unwrap_err();
        assert_eq!(errors.len(), 2);

        let input = ProposalInput {
            client_name: Some("Acme Corp".to_string()),
            scope_of_work: Some("Build X".to_string()),
            ..Default::default()
        };
        assert!(input.validate(true).is_ok());
    }

    #[test]
    fn test_update_allows_omission_but_not_blanking() {
        assert!(ProposalInput::default().validate(false).is_ok());

        let input = ProposalInput {
            client_name: Some("   ".to_string()),
            ..Default::default()
        };
        assert!(input.validate(false).is_err());
    }

    #[test]
    fn test_absent_and_null_fields_are_distinguished() {
        let absent: ProposalInput = serde_json::from_str(r#"{}"#).unwrap();
        assert_eq!(absent.timeline, None);
        assert_eq!(absent.user_preference_id, None);

        let nulled: ProposalInput =
            serde_json::from_str(r#"{"timeline": null, "user_preference_id": null}"#).unwrap();
        assert_eq!(nulled.timeline, Some(None));
        assert_eq!(nulled.user_preference_id, Some(None));

        let set: ProposalInput = serde_json::from_str(r#"{"timeline": "8 weeks"}"#).unwrap();
        assert_eq!(set.timeline, Some(Some("8 weeks".to_string())));
    }

    #[test]
    fn test_status_must_be_known() {
        let input = ProposalInput {
            client_name: Some("Acme".to_string()),
            scope_of_work: Some("Build X".to_string()),
            status: Some("archived".to_string()),
            ..Default::default()
        };
        let errors = input.validate(true).unwrap_err();
        assert!(errors[0].contains("status"));

        for status in ["draft", "generated", "completed"] {
            let input = ProposalInput {
                client_name: Some("Acme".to_string()),
                scope_of_work: Some("Build X".to_string()),
                status: Some(status.to_string()),
                ..Default::default()
            };
            assert!(input.validate(true).is_ok());
        }
    }
}
