/// Represents ways to locate a UI element
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Selector {
    /// Select by role and optional name (name matches as a case-insensitive substring)
    Role { role: String, name: Option<String> },
    /// Select by exact name/label
    Name(String),
    /// Select by native automation id (`AutomationId` on Windows)
    NativeId(String),
    /// Select by class name
    ClassName(String),
    /// Filter by visibility on screen
    Visible(bool),
    /// Chain multiple selectors, each searching inside the previous match
    Chain(Vec<Selector>),
    /// Represents an invalid selector string, with a reason.
    Invalid(String),
}

impl Selector {
    pub fn role(role: &str) -> Self {
        Selector::Role {
            role: role.to_string(),
            name: None,
        }
    }

    pub fn role_named(role: &str, name: &str) -> Self {
        Selector::Role {
            role: role.to_string(),
            name: Some(name.to_string()),
        }
    }

    pub fn native_id(id: &str) -> Self {
        Selector::NativeId(id.to_string())
    }

    /// Checks a single element against this selector's own criteria.
    ///
    /// Chains are resolved by the engines, so a chain never matches directly.
    pub fn matches(&self, attrs: &crate::UIElementAttributes, role: &str) -> bool {
        match self {
            Selector::Role { role: want, name } => {
                roles_equal(want, role)
                    && name.as_ref().map_or(true, |n| {
                        attrs
                            .name
                            .as_deref()
                            .unwrap_or_default()
                            .to_lowercase()
                            .contains(&n.to_lowercase())
                    })
            }
            Selector::Name(name) => attrs.name.as_deref() == Some(name.as_str()),
            Selector::NativeId(id) => attrs.automation_id.as_deref() == Some(id.as_str()),
            Selector::ClassName(class) => attrs.class_name.as_deref() == Some(class.as_str()),
            Selector::Visible(visible) => attrs.is_visible == *visible,
            Selector::Chain(_) | Selector::Invalid(_) => false,
        }
    }
}

/// Generic role aliases accepted in selectors ("dialog" finds windows, "data" finds data items).
pub(crate) fn canonical_role(role: &str) -> String {
    match role.to_lowercase().as_str() {
        "dialog" | "window" => "window".to_string(),
        "data" | "dataitem" | "row" => "dataitem".to_string(),
        "grid" | "datagrid" => "datagrid".to_string(),
        "textfield" | "input" | "edit" => "edit".to_string(),
        "combo" | "combobox" => "combobox".to_string(),
        "tab" | "tabitem" => "tabitem".to_string(),
        other => other.to_string(),
    }
}

pub(crate) fn roles_equal(a: &str, b: &str) -> bool {
    canonical_role(a) == canonical_role(b)
}

impl std::fmt::Display for Selector {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{self:?}")
    }
}

impl From<&str> for Selector {
    fn from(s: &str) -> Self {
        // Handle chained selectors first
        let parts: Vec<&str> = s.split(">>").map(|p| p.trim()).collect();
        if parts.len() > 1 {
            return Selector::Chain(parts.into_iter().map(Selector::from).collect());
        }

        // role|name is the precise form
        if let Some((role_part, name_part)) = s.split_once('|') {
            let role_part = role_part.trim();
            let name_part = name_part.trim();
            let role = role_part.strip_prefix("role:").unwrap_or(role_part);
            let name = name_part.strip_prefix("name:").unwrap_or(name_part);
            return Selector::role_named(role, name);
        }

        let lower = s.to_lowercase();
        match s {
            _ if s.starts_with("role:") => Selector::role(&s[5..]),
            "window" | "dialog" | "button" | "edit" | "combobox" | "datagrid" | "dataitem"
            | "text" | "tabitem" => Selector::role(s),
            _ if lower.starts_with("name:") => Selector::Name(s[5..].to_string()),
            _ if lower.starts_with("classname:") => Selector::ClassName(s[10..].to_string()),
            _ if lower.starts_with("nativeid:") => Selector::NativeId(s[9..].trim().to_string()),
            _ if lower.starts_with("visible:") => {
                Selector::Visible(s[8..].trim().eq_ignore_ascii_case("true"))
            }
            _ if s.starts_with('#') => Selector::NativeId(s[1..].to_string()),
            _ => Selector::Invalid(format!(
                "Unknown selector format: \"{s}\". Use prefixes like 'role:', 'name:', 'nativeid:', 'classname:' or 'visible:'."
            )),
        }
    }
}

impl From<String> for Selector {
    fn from(s: String) -> Self {
        Selector::from(s.as_str())
    }
}
