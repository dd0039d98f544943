//! Per-connection parameter resolution

use serde_json::Value;

use crate::error::LoadError;

/// Replaced by the connection id in every parameter template
pub const CONNECTION_ID_TOKEN: &str = "%%ConnectionId%%";

/// Resolve invocation arguments for one connection.
///
/// Templates that contain `{` are decoded as JSON after substitution, all
/// others are passed as plain strings. The templates themselves are not
/// modified, so every connection resolves from the same originals.
pub fn resolve_parameters(templates: &[String], connection_id: &str) -> Result<Vec<Value>, LoadError> {
    templates
        .iter()
        .enumerate()
        .map(|(index, template)| {
            let text = template.replace(CONNECTION_ID_TOKEN, connection_id);
            if text.contains('{') {
                serde_json::from_str(&text).map_err(|source| LoadError::Parameter { index, source })
            } else {
                Ok(Value::String(text))
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_plain_templates_become_strings() {
        let templates = vec!["hello".to_string(), "from %%ConnectionId%%".to_string()];
        let params = resolve_parameters(&templates, "c-1").unwrap();
        assert_eq!(params, vec![json!("hello"), json!("from c-1")]);
    }

    #[test]
    fn test_object_templates_are_decoded() {
        let templates = vec![r#"{"sender": "%%ConnectionId%%", "n": 3}"#.to_string()];
        let params = resolve_parameters(&templates, "abc").unwrap();
        assert_eq!(params, vec![json!({"sender": "abc", "n": 3})]);
    }

    #[test]
    fn test_every_token_occurrence_is_replaced() {
        let templates = vec!["%%ConnectionId%%/%%ConnectionId%%".to_string()];
        let params = resolve_parameters(&templates, "x").unwrap();
        assert_eq!(params, vec![json!("x/x")]);
    }

    #[test]
    fn test_templates_resolve_independently() {
        let templates = vec!["%%ConnectionId%%".to_string()];
        let first = resolve_parameters(&templates, "one").unwrap();
        let second = resolve_parameters(&templates, "two").unwrap();
        assert_eq!(first, vec![json!("one")]);
        assert_eq!(second, vec![json!("two")]);
        assert_eq!(templates[0], CONNECTION_ID_TOKEN);
    }

    #[test]
    fn test_broken_json_reports_template_index() {
        let templates = vec!["ok".to_string(), "{not json".to_string()];
        match resolve_parameters(&templates, "x") {
            Err(LoadError::Parameter { index, .. }) => assert_eq!(index, 1),
            other => panic!("unexpected result {:?}", other),
        }
    }

    #[test]
    fn test_no_templates_no_arguments() {
        assert!(resolve_parameters(&[], "x").unwrap().is_empty());
    }
}
