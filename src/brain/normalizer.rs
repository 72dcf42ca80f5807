//! Turns raw model text into a [`Decision`]
//!
//! The top-level shape is strict: the text must parse as a JSON object that
//! carries all of `reasoning`, `action`, `ux_audit` and `goal_achieved`.
//! Nested fields are soft and handled by [`Decision::from_object`].

use serde_json::Value;

use super::{BrainError, Decision};

/// Keys every response object must carry
pub const REQUIRED_FIELDS: [&str; 4] = ["reasoning", "action", "ux_audit", "goal_achieved"];

const FENCE: &str = "```";

/// Parse and validate a raw model reply in one go
pub fn normalize(raw: &str) -> Result<Decision, BrainError> {
    let parsed = parse_object(raw)?;
    validate(&parsed)
}

/// Parse the raw reply into a JSON object, stripping a surrounding code fence.
pub fn parse_object(raw: &str) -> Result<Value, BrainError> {
    if raw.trim().is_empty() {
        return Err(BrainError::MalformedResponse(
            "Empty response from model".to_string(),
        ));
    }

    let content = strip_fences(raw);
    let parsed: Value = serde_json::from_str(&content)
        .map_err(|e| BrainError::MalformedResponse(format!("Invalid JSON response: {}", e)))?;

    if !parsed.is_object() {
        return Err(BrainError::MalformedResponse(
            "Response is not a JSON object".to_string(),
        ));
    }
    Ok(parsed)
}

/// Check the required top-level keys and build the decision
pub fn validate(parsed: &Value) -> Result<Decision, BrainError> {
    for field in REQUIRED_FIELDS {
        if parsed.get(field).is_none() {
            return Err(BrainError::MalformedResponse(format!(
                "Missing required field: {}",
                field
            )));
        }
    }
    Ok(Decision::from_object(parsed))
}

/// Keep only the lines inside fence pairs when the reply opens with a fence.
///
/// Text that does not start with a fence is returned trimmed and untouched.
pub fn strip_fences(raw: &str) -> String {
    let content = raw.trim();
    if !content.starts_with(FENCE) {
        return content.to_string();
    }

    let mut inside = false;
    let mut kept = Vec::new();
    for line in content.lines() {
        if line.starts_with(FENCE) {
            inside = !inside;
            continue;
        }
        if inside {
            kept.push(line);
        }
    }
    kept.join("\n")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::brain::{Action, UxStatus};

    const VALID: &str = r#"{"reasoning":"Login button visible","action":{"type":"tap","value":"Login"},"ux_audit":{"status":"PASS","issue":null},"goal_achieved":false}"#;

    #[test]
    fn test_normalize_plain_json() {
        let decision = normalize(VALID).unwrap();
        assert_eq!(decision.reasoning, "Login button visible");
        assert_eq!(decision.action, Action::Tap { text: "Login".into() });
        assert_eq!(decision.ux_audit.status, UxStatus::Pass);
        assert!(!decision.goal_achieved);
    }

    #[test]
    fn test_fenced_json_matches_interior() {
        let fenced = format!("```json\n{}\n```", VALID);
        assert_eq!(normalize(&fenced).unwrap(), normalize(VALID).unwrap());

        // Stripping an already-stripped payload changes nothing
        let once = strip_fences(&fenced);
        assert_eq!(strip_fences(&once), once);
    }

    #[test]
    fn test_empty_response_rejected() {
        assert!(matches!(normalize(""), Err(BrainError::MalformedResponse(_))));
        assert!(matches!(normalize("   \n"), Err(BrainError::MalformedResponse(_))));
    }

    #[test]
    fn test_non_json_rejected() {
        for raw in [
            "Sure! I'll tap the login button.",
            "{\"reasoning\": \"cut off",
            "[1, 2, 3]",
            "\"just a string\"",
            "```\nnot json\n```",
        ] {
            assert!(
                matches!(normalize(raw), Err(BrainError::MalformedResponse(_))),
                "expected rejection for {:?}",
                raw
            );
        }
    }

    #[test]
    fn test_missing_required_field_rejected() {
        let full: Value = serde_json::from_str(VALID).unwrap();
        for field in REQUIRED_FIELDS {
            let mut partial = full.clone();
            partial.as_object_mut().unwrap().remove(field);
            let err = normalize(&partial.to_string()).unwrap_err();
            assert!(err.to_string().contains(field), "{}", err);
        }
    }

    #[test]
    fn test_unknown_nested_action_is_soft() {
        let raw = r#"{"reasoning":"r","action":{"type":"shake"},"ux_audit":{"status":"WARN"},"goal_achieved":false}"#;
        let decision = normalize(raw).unwrap();
        assert!(matches!(decision.action, Action::Unrecognized { .. }));
        assert_eq!(decision.ux_audit.status, UxStatus::Warn);
        assert_eq!(decision.ux_audit.issue, None);
    }
}
