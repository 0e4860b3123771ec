use super::input;
use super::types::{ThreadSafeWinUIAutomation, ThreadSafeWinUIElement};
use super::utils::{element_id, process_name_by_pid};
use crate::element::{UIElementAttributes, UIElementImpl};
use crate::keys::KeyChord;
use crate::{AutomationError, UIElement};
use std::fmt::Debug;
use std::sync::Arc;
use tracing::debug;
use uiautomation::controls::ControlType;
use uiautomation::patterns;
use uiautomation::types::{TreeScope, WindowVisualState};

pub struct WindowsUIElement {
    pub(crate) element: ThreadSafeWinUIElement,
    pub(crate) automation: ThreadSafeWinUIAutomation,
}

impl WindowsUIElement {
    #[allow(clippy::arc_with_non_send_sync)]
    pub(crate) fn new(element: uiautomation::UIElement, automation: ThreadSafeWinUIAutomation) -> Self {
        Self {
            element: ThreadSafeWinUIElement(Arc::new(element)),
            automation,
        }
    }

    pub(crate) fn wrap(
        element: uiautomation::UIElement,
        automation: &ThreadSafeWinUIAutomation,
    ) -> UIElement {
        UIElement::new(Box::new(Self::new(element, automation.clone())))
    }

    /// Get the raw UI element for direct automation
    pub fn get_raw_element(&self) -> &uiautomation::UIElement {
        &self.element.0
    }

    fn control_type(&self) -> Result<ControlType, AutomationError> {
        self.element.0.get_control_type().map_err(|e| {
            AutomationError::PlatformError(format!("Failed to get control type: {e}"))
        })
    }

    fn invoke(&self) -> Result<(), AutomationError> {
        let invoke_pat = self
            .element
            .0
            .get_pattern::<patterns::UIInvokePattern>()
            .map_err(|e| {
                AutomationError::UnsupportedOperation(format!(
                    "Element does not support InvokePattern: {e}"
                ))
            })?;
        invoke_pat
            .invoke()
            .map_err(|e| AutomationError::PlatformError(e.to_string()))
    }
}

impl Debug for WindowsUIElement {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WindowsUIElement")
            .field("name", &self.element.0.get_name().unwrap_or_default())
            .finish()
    }
}

impl UIElementImpl for WindowsUIElement {
    fn object_id(&self) -> usize {
        element_id(&self.element.0)
    }

    fn role(&self) -> String {
        self.element
            .0
            .get_control_type()
            .map(|ct| ct.to_string())
            .unwrap_or_else(|_| "unknown".to_string())
    }

    fn attributes(&self) -> UIElementAttributes {
        fn filter_empty_string(s: Option<String>) -> Option<String> {
            s.filter(|s| !s.is_empty())
        }

        let el = &self.element.0;
        let value = el
            .get_pattern::<patterns::UIValuePattern>()
            .ok()
            .and_then(|p| p.get_value().ok());
        let process_name = el
            .get_process_id()
            .ok()
            .and_then(|pid| process_name_by_pid(pid as u32));

        UIElementAttributes {
            name: filter_empty_string(el.get_name().ok()),
            automation_id: filter_empty_string(el.get_automation_id().ok()),
            class_name: filter_empty_string(el.get_classname().ok()),
            value: filter_empty_string(value),
            process_name,
            is_visible: el.is_offscreen().map(|off| !off).unwrap_or(false),
            is_enabled: el.is_enabled().unwrap_or(false),
        }
    }

    fn children(&self) -> Result<Vec<UIElement>, AutomationError> {
        let true_condition = self.automation.0.create_true_condition().map_err(|e| {
            AutomationError::PlatformError(format!("Failed to create true condition: {e}"))
        })?;
        let children = self
            .element
            .0
            .find_all(TreeScope::Children, &true_condition)
            .map_err(|e| AutomationError::ElementDetached(format!("Failed to get children: {e}")))?;

        Ok(children
            .into_iter()
            .map(|ele| Self::wrap(ele, &self.automation))
            .collect())
    }

    fn click(&self) -> Result<(), AutomationError> {
        self.element.0.try_focus();
        debug!("attempting to click element: {:?}", self);

        match self.element.0.click() {
            Ok(()) => Ok(()),
            Err(e) => {
                debug!("mouse click failed ({}), trying InvokePattern", e);
                self.invoke()
            }
        }
    }

    fn focus(&self) -> Result<(), AutomationError> {
        self.element
            .0
            .set_focus()
            .map_err(|e| AutomationError::PlatformError(e.to_string()))
    }

    fn activate_window(&self) -> Result<(), AutomationError> {
        if let Ok(window_pattern) = self.element.0.get_pattern::<patterns::UIWindowPattern>() {
            if matches!(
                window_pattern.get_window_visual_state(),
                Ok(WindowVisualState::Minimized)
            ) {
                debug!("Window is minimized, restoring it");
                window_pattern
                    .set_window_visual_state(WindowVisualState::Normal)
                    .map_err(|e| {
                        AutomationError::PlatformError(format!("Failed to restore window: {e}"))
                    })?;
            }
        }
        self.focus()
    }

    fn type_text(&self, text: &str) -> Result<(), AutomationError> {
        self.element.0.try_focus();
        // Unicode events survive IME and layout differences; send_text is the fallback.
        input::send_unicode_text(text).or_else(|e| {
            debug!("unicode input failed ({}), using send_text", e);
            self.element
                .0
                .send_text(text, 10)
                .map_err(|e| AutomationError::PlatformError(e.to_string()))
        })
    }

    fn set_value(&self, value: &str) -> Result<(), AutomationError> {
        debug!("setting value {:?} on {:?}", value, self);
        let value_par = self
            .element
            .0
            .get_pattern::<patterns::UIValuePattern>()
            .map_err(|e| {
                AutomationError::UnsupportedOperation(format!(
                    "Element does not support ValuePattern: {e}"
                ))
            })?;
        value_par
            .set_value(value)
            .map_err(|e| AutomationError::PlatformError(e.to_string()))
    }

    fn press_key(&self, chord: &KeyChord) -> Result<(), AutomationError> {
        debug!(
            "pressing {} with control_type: {:?}",
            chord,
            self.control_type().ok()
        );
        self.element.0.try_focus();
        input::send_chord(chord)
    }

    fn is_enabled(&self) -> Result<bool, AutomationError> {
        self.element
            .0
            .is_enabled()
            .map_err(|e| AutomationError::ElementDetached(e.to_string()))
    }

    fn is_visible(&self) -> Result<bool, AutomationError> {
        self.element
            .0
            .is_offscreen()
            .map(|is_offscreen| !is_offscreen)
            .map_err(|e| AutomationError::ElementDetached(e.to_string()))
    }

    fn is_selected(&self) -> Result<bool, AutomationError> {
        match self
            .element
            .0
            .get_pattern::<patterns::UISelectionItemPattern>()
        {
            Ok(pattern) => pattern
                .is_selected()
                .map_err(|e| AutomationError::PlatformError(e.to_string())),
            Err(_) => Ok(false),
        }
    }

    fn close(&self) -> Result<(), AutomationError> {
        match self.control_type()? {
            ControlType::Window | ControlType::Pane => {
                match self.element.0.get_pattern::<patterns::UIWindowPattern>() {
                    Ok(window_pattern) => window_pattern.close().map_err(|e| {
                        AutomationError::PlatformError(format!("Failed to close window: {e}"))
                    }),
                    Err(_) => {
                        debug!("WindowPattern not supported, falling back to Alt+F4");
                        self.element.0.try_focus();
                        self.element.0.send_keys("%{F4}", 10).map_err(|e| {
                            AutomationError::PlatformError(format!(
                                "Failed to close window with Alt+F4: {e}"
                            ))
                        })
                    }
                }
            }
            _ => {
                debug!("close() ignored for non-window element");
                Ok(())
            }
        }
    }

    fn clone_box(&self) -> Box<dyn UIElementImpl> {
        Box::new(WindowsUIElement {
            element: self.element.clone(),
            automation: self.automation.clone(),
        })
    }

    fn as_any(&self) -> &dyn std::any::Any {
        self
    }
}
