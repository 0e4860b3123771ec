use crate::errors::AutomationError;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::HashMap;
use std::fmt;
use tracing::warn;

/// A field as shown in the field grid, or one to be created.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FieldRecord {
    pub name: String,
    #[serde(rename = "type", default)]
    pub field_type: String,
    #[serde(default)]
    pub comment: String,
}

impl FieldRecord {
    pub fn new(name: &str, field_type: &str) -> Self {
        Self {
            name: name.to_string(),
            field_type: field_type.to_string(),
            comment: String::new(),
        }
    }

    pub fn parsed_type(&self) -> FieldType {
        FieldType::from_label(&self.field_type)
    }
}

/// One rename instruction.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FieldFix {
    pub old_name: String,
    /// Empty means "keep the old name".
    #[serde(default)]
    pub new_name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub new_type: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub comment: Option<String>,
}

impl FieldFix {
    pub fn rename(old_name: &str, new_name: &str) -> Self {
        Self {
            old_name: old_name.to_string(),
            new_name: new_name.to_string(),
            ..Default::default()
        }
    }

    pub fn target_name(&self) -> &str {
        if self.new_name.trim().is_empty() {
            &self.old_name
        } else {
            &self.new_name
        }
    }

    pub fn target_type(&self) -> Option<FieldType> {
        self.new_type
            .as_deref()
            .filter(|t| !t.trim().is_empty())
            .map(FieldType::from_label)
    }
}

/// A proposal produced by the external name generator.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FieldSuggestion {
    pub old_name: String,
    #[serde(default)]
    pub new_name: String,
    #[serde(default)]
    pub old_type: String,
    #[serde(default)]
    pub new_type: String,
    #[serde(default)]
    pub comment: String,
    #[serde(default)]
    pub should_fix: bool,
}

impl FieldSuggestion {
    /// `None` unless the generator recommends the change. The type is carried
    /// only when it actually changes.
    pub fn into_fix(self) -> Option<FieldFix> {
        if !self.should_fix {
            return None;
        }
        let type_changes = !self.new_type.trim().is_empty()
            && match (FieldType::parse(&self.old_type), FieldType::parse(&self.new_type)) {
                (Some(old), Some(new)) => old != new,
                _ => self.old_type.trim() != self.new_type.trim(),
            };
        Some(FieldFix {
            old_name: self.old_name,
            new_name: self.new_name,
            new_type: type_changes.then_some(self.new_type),
            comment: (!self.comment.trim().is_empty()).then_some(self.comment),
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum FieldType {
    Text,
    Number,
    Date,
    Time,
    Timestamp,
    Container,
    Calculation,
    Summary,
}

impl FieldType {
    /// Parse an English (any case) or Japanese type label.
    pub fn parse(label: &str) -> Option<Self> {
        let label = label.trim();
        let t = match label.to_lowercase().as_str() {
            "text" | "テキスト" => FieldType::Text,
            "number" | "数値" | "数字" => FieldType::Number,
            "date" | "日付" => FieldType::Date,
            "time" | "時刻" => FieldType::Time,
            "timestamp" | "タイムスタンプ" => FieldType::Timestamp,
            "container" | "オブジェクト" => FieldType::Container,
            "calculation" | "計算" => FieldType::Calculation,
            "summary" | "集計" => FieldType::Summary,
            _ => return None,
        };
        Some(t)
    }

    /// Like `parse`, but unknown labels become `Text`.
    pub fn from_label(label: &str) -> Self {
        Self::parse(label).unwrap_or_else(|| {
            warn!("unknown field type '{}', using Text", label);
            FieldType::Text
        })
    }

    /// Calculation and Summary fields open an options dialog when created.
    pub fn opens_options_dialog(&self) -> bool {
        matches!(self, FieldType::Calculation | FieldType::Summary)
    }
}

impl fmt::Display for FieldType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(self, f)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum NameConflict {
    /// Two fixes produce the same name.
    DuplicateTarget {
        name: String,
        first: String,
        second: String,
    },
    /// A fix produces the name of a field that still exists at that point.
    ExistingField { name: String, old_name: String },
}

fn name_key(name: &str) -> String {
    name.trim().to_lowercase()
}

/// Check a batch of fixes against the current field names. Names compare
/// case-insensitively. A field renamed by an earlier fix frees its old name.
pub fn validate_fixes(existing: &[String], fixes: &[FieldFix]) -> Vec<NameConflict> {
    let mut conflicts = Vec::new();
    let mut live: HashMap<String, String> = existing
        .iter()
        .map(|n| (name_key(n), n.clone()))
        .collect();
    let mut targets: HashMap<String, String> = HashMap::new();

    for fix in fixes {
        let old_key = name_key(&fix.old_name);
        let new_key = name_key(fix.target_name());

        if let Some(first) = targets.get(&new_key) {
            conflicts.push(NameConflict::DuplicateTarget {
                name: fix.target_name().to_string(),
                first: first.clone(),
                second: fix.old_name.clone(),
            });
        } else {
            targets.insert(new_key.clone(), fix.old_name.clone());
        }

        if new_key != old_key && live.contains_key(&new_key) {
            conflicts.push(NameConflict::ExistingField {
                name: fix.target_name().to_string(),
                old_name: fix.old_name.clone(),
            });
        }

        if new_key != old_key {
            live.remove(&old_key);
            live.insert(new_key, fix.target_name().to_string());
        }
    }
    conflicts
}

/// Accepts an array of fixes, an array of suggestions, or an object with a
/// `fixes` or `suggestions` array. Suggestions not marked `should_fix` are
/// dropped.
pub fn parse_fixes(value: Value) -> Result<Vec<FieldFix>, AutomationError> {
    let items = match value {
        Value::Array(items) => items,
        Value::Object(mut map) => match map.remove("fixes").or_else(|| map.remove("suggestions")) {
            Some(Value::Array(items)) => items,
            _ => {
                return Err(AutomationError::InvalidArgument(
                    "expected an array or an object with 'fixes' or 'suggestions'".to_string(),
                ))
            }
        },
        _ => {
            return Err(AutomationError::InvalidArgument(
                "fix input must be a JSON array or object".to_string(),
            ))
        }
    };

    let mut fixes = Vec::new();
    for item in items {
        let is_suggestion = item.get("should_fix").is_some();
        if is_suggestion {
            let suggestion: FieldSuggestion = serde_json::from_value(item)
                .map_err(|e| AutomationError::InvalidArgument(format!("bad suggestion: {e}")))?;
            fixes.extend(suggestion.into_fix());
        } else {
            let fix: FieldFix = serde_json::from_value(item)
                .map_err(|e| AutomationError::InvalidArgument(format!("bad fix: {e}")))?;
            fixes.push(fix);
        }
    }
    Ok(fixes)
}

/// Accepts an array of records or a single record.
pub fn parse_records(value: Value) -> Result<Vec<FieldRecord>, AutomationError> {
    let records = match value {
        Value::Array(_) => serde_json::from_value(value),
        Value::Object(_) => serde_json::from_value(value).map(|r| vec![r]),
        _ => {
            return Err(AutomationError::InvalidArgument(
                "field input must be a JSON array or object".to_string(),
            ))
        }
    }
    .map_err(|e| AutomationError::InvalidArgument(format!("bad field record: {e}")))?;
    Ok(records)
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ReadReport {
    pub success: bool,
    pub fields: Vec<FieldRecord>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct FixReport {
    pub success: bool,
    pub total: usize,
    pub succeeded: usize,
    /// Old names of the fixes that failed.
    pub errors: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub aborted: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CreateReport {
    pub success: bool,
    pub count: usize,
    pub failed: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub aborted: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ResetReport {
    pub success: bool,
    pub deleted: usize,
}

/// Result of operations that only report success.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct StatusReport {
    pub success: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl StatusReport {
    pub fn ok() -> Self {
        Self {
            success: true,
            error: None,
        }
    }

    pub fn failed(error: impl fmt::Display) -> Self {
        Self {
            success: false,
            error: Some(error.to_string()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn parses_english_and_japanese_labels() {
        assert_eq!(FieldType::parse("Text"), Some(FieldType::Text));
        assert_eq!(FieldType::parse("TIMESTAMP"), Some(FieldType::Timestamp));
        assert_eq!(FieldType::parse("計算"), Some(FieldType::Calculation));
        assert_eq!(FieldType::parse("数字"), Some(FieldType::Number));
        assert_eq!(FieldType::parse("オブジェクト"), Some(FieldType::Container));
        assert_eq!(FieldType::parse("Blob"), None);
        assert_eq!(FieldType::from_label("Blob"), FieldType::Text);
        assert!(FieldType::Summary.opens_options_dialog());
        assert!(!FieldType::Date.opens_options_dialog());
    }

    #[test]
    fn suggestions_keep_only_recommended_changes() {
        let keep = FieldSuggestion {
            old_name: "fld1".into(),
            new_name: "CustomerName".into(),
            old_type: "テキスト".into(),
            new_type: "Text".into(),
            comment: "".into(),
            should_fix: true,
        };
        let fix = keep.into_fix().unwrap();
        assert_eq!(fix.new_name, "CustomerName");
        assert_eq!(fix.new_type, None);
        assert_eq!(fix.comment, None);

        let retype = FieldSuggestion {
            old_name: "amount".into(),
            new_name: "Amount".into(),
            old_type: "Text".into(),
            new_type: "Number".into(),
            comment: "price".into(),
            should_fix: true,
        };
        let fix = retype.into_fix().unwrap();
        assert_eq!(fix.target_type(), Some(FieldType::Number));
        assert_eq!(fix.comment.as_deref(), Some("price"));

        let skip = FieldSuggestion {
            old_name: "ok".into(),
            should_fix: false,
            ..Default::default()
        };
        assert!(skip.into_fix().is_none());
    }

    #[test]
    fn new_name_defaults_to_old_name() {
        let fix: FieldFix = serde_json::from_value(json!({"old_name": "a"})).unwrap();
        assert_eq!(fix.target_name(), "a");
    }

    #[test]
    fn detects_duplicate_targets_and_existing_names() {
        let existing = vec!["Name".to_string(), "Phone".to_string(), "Mail".to_string()];
        let fixes = vec![
            FieldFix::rename("Phone", "Tel"),
            FieldFix::rename("Mail", "tel"),
            FieldFix::rename("Name", "Phone"),
        ];
        let conflicts = validate_fixes(&existing, &fixes);
        assert_eq!(
            conflicts,
            vec![
                NameConflict::DuplicateTarget {
                    name: "tel".into(),
                    first: "Phone".into(),
                    second: "Mail".into(),
                },
                NameConflict::ExistingField {
                    name: "tel".into(),
                    old_name: "Mail".into(),
                },
            ]
        );
    }

    #[test]
    fn renaming_onto_an_untouched_field_conflicts() {
        let existing = vec!["A".to_string(), "B".to_string()];
        let conflicts = validate_fixes(&existing, &[FieldFix::rename("A", "b")]);
        assert_eq!(conflicts.len(), 1);
        assert!(validate_fixes(&existing, &[FieldFix::rename("A", "a")]).is_empty());
    }

    #[test]
    fn parses_fix_inputs_in_every_shape() {
        let fixes = parse_fixes(json!([{"old_name": "a", "new_name": "b"}])).unwrap();
        assert_eq!(fixes, vec![FieldFix::rename("a", "b")]);

        let fixes = parse_fixes(json!({"suggestions": [
            {"old_name": "a", "new_name": "b", "old_type": "Text", "new_type": "Text", "should_fix": true},
            {"old_name": "c", "new_name": "d", "should_fix": false}
        ]}))
        .unwrap();
        assert_eq!(fixes, vec![FieldFix::rename("a", "b")]);

        assert!(parse_fixes(json!("nope")).is_err());
        assert!(parse_fixes(json!({"other": []})).is_err());
    }

    #[test]
    fn parses_single_and_multiple_records() {
        let one = parse_records(json!({"name": "Total", "type": "計算"})).unwrap();
        assert_eq!(one.len(), 1);
        assert_eq!(one[0].parsed_type(), FieldType::Calculation);
        let many = parse_records(json!([{"name": "a"}, {"name": "b", "type": "Date"}])).unwrap();
        assert_eq!(many[1].parsed_type(), FieldType::Date);
    }

    #[test]
    fn reports_serialize_with_success_flag() {
        let report = FixReport {
            success: true,
            total: 2,
            succeeded: 1,
            errors: vec!["x".into()],
            aborted: None,
        };
        assert_eq!(
            serde_json::to_value(&report).unwrap(),
            json!({"success": true, "total": 2, "succeeded": 1, "errors": ["x"]})
        );
        assert_eq!(
            serde_json::to_value(StatusReport::failed("boom")).unwrap(),
            json!({"success": false, "error": "boom"})
        );
    }
}
