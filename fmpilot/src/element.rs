use crate::errors::AutomationError;
use crate::keys::{Key, KeyChord, Modifier};
use crate::selector::Selector;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::fmt::Debug;
use tracing::{debug, warn};

/// Attributes associated with a UI element
#[derive(Clone, Serialize, Deserialize, Default, PartialEq)]
pub struct UIElementAttributes {
    #[serde(default, skip_serializing_if = "is_empty_string")]
    pub name: Option<String>,
    #[serde(default, skip_serializing_if = "is_empty_string")]
    pub automation_id: Option<String>,
    #[serde(default, skip_serializing_if = "is_empty_string")]
    pub class_name: Option<String>,
    #[serde(default, skip_serializing_if = "is_empty_string")]
    pub value: Option<String>,
    #[serde(default, skip_serializing_if = "is_empty_string")]
    pub process_name: Option<String>,
    #[serde(default)]
    pub is_visible: bool,
    #[serde(default)]
    pub is_enabled: bool,
}

fn is_empty_string(opt: &Option<String>) -> bool {
    match opt {
        Some(s) => s.is_empty(),
        None => true,
    }
}

impl fmt::Debug for UIElementAttributes {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut debug_struct = f.debug_struct("UIElementAttributes");
        for (label, field) in [
            ("name", &self.name),
            ("automation_id", &self.automation_id),
            ("class_name", &self.class_name),
            ("value", &self.value),
            ("process_name", &self.process_name),
        ] {
            if let Some(v) = field.as_deref().filter(|v| !v.is_empty()) {
                debug_struct.field(label, &v);
            }
        }
        if !self.is_visible {
            debug_struct.field("is_visible", &false);
        }
        if !self.is_enabled {
            debug_struct.field("is_enabled", &false);
        }
        debug_struct.finish()
    }
}

/// Interface for platform-specific element implementations
pub trait UIElementImpl: Send + Sync + Debug {
    fn object_id(&self) -> usize;
    fn role(&self) -> String;
    fn attributes(&self) -> UIElementAttributes;
    fn children(&self) -> Result<Vec<UIElement>, AutomationError>;
    fn click(&self) -> Result<(), AutomationError>;
    fn focus(&self) -> Result<(), AutomationError>;
    /// Restore the containing window if it is minimized and bring it to the foreground.
    fn activate_window(&self) -> Result<(), AutomationError>;
    fn type_text(&self, text: &str) -> Result<(), AutomationError>;
    fn set_value(&self, value: &str) -> Result<(), AutomationError>;
    /// Send a chord to this element; implementations focus it first.
    fn press_key(&self, chord: &KeyChord) -> Result<(), AutomationError>;
    fn is_enabled(&self) -> Result<bool, AutomationError>;
    fn is_visible(&self) -> Result<bool, AutomationError>;
    fn is_selected(&self) -> Result<bool, AutomationError>;
    /// Close the element if it's a window. Does nothing for other controls.
    fn close(&self) -> Result<(), AutomationError>;
    fn clone_box(&self) -> Box<dyn UIElementImpl>;
    fn as_any(&self) -> &dyn std::any::Any;
}

/// Represents a UI element in a desktop application
#[derive(Debug)]
pub struct UIElement {
    inner: Box<dyn UIElementImpl>,
}

impl UIElement {
    pub fn new(inner: Box<dyn UIElementImpl>) -> Self {
        Self { inner }
    }

    pub fn object_id(&self) -> usize {
        self.inner.object_id()
    }

    pub fn role(&self) -> String {
        self.inner.role()
    }

    pub fn attributes(&self) -> UIElementAttributes {
        self.inner.attributes()
    }

    /// Name of the element, empty when it has none.
    pub fn name(&self) -> String {
        self.inner.attributes().name.unwrap_or_default()
    }

    pub fn process_name(&self) -> Option<String> {
        self.inner.attributes().process_name
    }

    pub fn children(&self) -> Result<Vec<UIElement>, AutomationError> {
        self.inner.children()
    }

    pub fn click(&self) -> Result<(), AutomationError> {
        self.inner.click()
    }

    pub fn focus(&self) -> Result<(), AutomationError> {
        self.inner.focus()
    }

    pub fn activate_window(&self) -> Result<(), AutomationError> {
        self.inner.activate_window()
    }

    pub fn type_text(&self, text: &str) -> Result<(), AutomationError> {
        self.inner.type_text(text)
    }

    pub fn set_value(&self, value: &str) -> Result<(), AutomationError> {
        self.inner.set_value(value)
    }

    pub fn press_key(&self, chord: &KeyChord) -> Result<(), AutomationError> {
        self.inner.press_key(chord)
    }

    pub fn is_enabled(&self) -> Result<bool, AutomationError> {
        self.inner.is_enabled()
    }

    pub fn is_visible(&self) -> Result<bool, AutomationError> {
        self.inner.is_visible()
    }

    pub fn is_selected(&self) -> Result<bool, AutomationError> {
        self.inner.is_selected()
    }

    pub fn close(&self) -> Result<(), AutomationError> {
        self.inner.close()
    }

    pub fn as_any(&self) -> &dyn std::any::Any {
        self.inner.as_any()
    }

    /// All descendants matching `selector`, in document order.
    ///
    /// Subtrees that fail to enumerate (for example a row that vanished while
    /// the list scrolled) are skipped.
    pub fn descendants(&self, selector: &Selector) -> Vec<UIElement> {
        let mut found = Vec::new();
        let mut stack = match self.children() {
            Ok(children) => children,
            Err(e) => {
                debug!("children unavailable for '{}': {}", self.name(), e);
                return found;
            }
        };
        stack.reverse();

        while let Some(el) = stack.pop() {
            if selector.matches(&el.attributes(), &el.role()) {
                found.push(el.clone());
            }
            match el.children() {
                Ok(mut children) => {
                    children.reverse();
                    stack.extend(children);
                }
                Err(e) => debug!("skipping detached subtree: {}", e),
            }
        }
        found
    }

    pub fn first_descendant(&self, selector: &Selector) -> Option<UIElement> {
        self.descendants(selector).into_iter().next()
    }

    /// Direct children matching `selector`.
    pub fn children_matching(&self, selector: &Selector) -> Result<Vec<UIElement>, AutomationError> {
        Ok(self
            .children()?
            .into_iter()
            .filter(|c| selector.matches(&c.attributes(), &c.role()))
            .collect())
    }

    /// Concatenated names of every Text descendant.
    pub fn text_content(&self) -> String {
        self.descendants(&Selector::role("text"))
            .iter()
            .map(UIElement::name)
            .collect()
    }

    /// Focus, select everything, erase, then type `text`.
    pub fn clear_and_type(&self, text: &str) -> Result<(), AutomationError> {
        self.focus()?;
        self.press_key(&KeyChord::new([Modifier::Ctrl], Key::Char('a')))?;
        self.press_key(&KeyChord::key(Key::Backspace))?;
        if text.is_empty() {
            return Ok(());
        }
        self.type_text(text).or_else(|e| {
            warn!("typing failed ({}), setting value directly", e);
            self.set_value(text)
        })
    }
}

impl PartialEq for UIElement {
    fn eq(&self, other: &Self) -> bool {
        self.inner.object_id() == other.inner.object_id()
    }
}

impl Eq for UIElement {}

impl std::hash::Hash for UIElement {
    fn hash<H: std::hash::Hasher>(&self, state: &mut H) {
        self.inner.object_id().hash(state);
    }
}

impl Clone for UIElement {
    fn clone(&self) -> Self {
        Self {
            inner: self.inner.clone_box(),
        }
    }
}
