use super::element::WindowsUIElement;
use super::input;
use super::types::ThreadSafeWinUIAutomation;
use super::utils::{create_ui_automation_with_com_init, map_generic_role_to_win_roles};
use crate::keys::KeyChord;
use crate::platforms::{search_tree, AccessibilityEngine, DEFAULT_SEARCH_DEPTH};
use crate::{AutomationError, Selector, UIElement};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, instrument};

const DEFAULT_FIND_TIMEOUT: Duration = Duration::from_millis(5000);

pub struct WindowsEngine {
    automation: ThreadSafeWinUIAutomation,
}

impl WindowsEngine {
    pub fn new() -> Result<Self, AutomationError> {
        let automation = create_ui_automation_with_com_init()?;
        #[allow(clippy::arc_with_non_send_sync)]
        let automation = ThreadSafeWinUIAutomation(Arc::new(automation));
        Ok(Self { automation })
    }

    fn root_raw(&self) -> Result<uiautomation::UIElement, AutomationError> {
        self.automation.0.get_root_element().map_err(|e| {
            AutomationError::PlatformError(format!("Failed to get desktop element: {e}"))
        })
    }

    fn resolve_root(&self, root: Option<&UIElement>) -> Result<uiautomation::UIElement, AutomationError> {
        match root.and_then(|el| el.as_any().downcast_ref::<WindowsUIElement>()) {
            Some(ele) => Ok(ele.get_raw_element().clone()),
            None => self.root_raw(),
        }
    }

    /// A matcher for the selectors UIA can evaluate natively; `None` for the
    /// rest, which are walked with `search_tree`.
    fn matcher(
        &self,
        selector: &Selector,
        root: &uiautomation::UIElement,
        depth: usize,
        timeout: Duration,
    ) -> Option<uiautomation::core::UIMatcher> {
        let base = self
            .automation
            .0
            .create_matcher()
            .from_ref(root)
            .depth(depth as u32)
            .timeout(timeout.as_millis() as u64);

        match selector {
            Selector::Role { role, name } => {
                let mut matcher = base.control_type(map_generic_role_to_win_roles(role));
                if let Some(name) = name {
                    let wanted = name.to_lowercase();
                    matcher = matcher.filter_fn(Box::new(move |e: &uiautomation::UIElement| {
                        Ok(e.get_name()
                            .map(|n| n.to_lowercase().contains(&wanted))
                            .unwrap_or(false))
                    }));
                }
                Some(matcher)
            }
            Selector::NativeId(id) => {
                let target = id.clone();
                Some(base.filter_fn(Box::new(move |e: &uiautomation::UIElement| {
                    Ok(e.get_automation_id().map(|a| a == target).unwrap_or(false))
                })))
            }
            Selector::Name(name) => {
                let target = name.clone();
                Some(base.filter_fn(Box::new(move |e: &uiautomation::UIElement| {
                    Ok(e.get_name().map(|n| n == target).unwrap_or(false))
                })))
            }
            Selector::ClassName(class) => Some(base.classname(class)),
            Selector::Visible(_) | Selector::Chain(_) | Selector::Invalid(_) => None,
        }
    }
}

impl AccessibilityEngine for WindowsEngine {
    fn get_root_element(&self) -> Result<UIElement, AutomationError> {
        Ok(WindowsUIElement::wrap(self.root_raw()?, &self.automation))
    }

    #[instrument(skip(self, root))]
    fn find_element(
        &self,
        selector: &Selector,
        root: Option<&UIElement>,
        timeout: Option<Duration>,
    ) -> Result<UIElement, AutomationError> {
        let root_ele = self.resolve_root(root)?;
        let timeout = timeout.unwrap_or(DEFAULT_FIND_TIMEOUT);

        let Some(matcher) = self.matcher(selector, &root_ele, DEFAULT_SEARCH_DEPTH, timeout) else {
            let wrapped = WindowsUIElement::wrap(root_ele, &self.automation);
            let deadline = std::time::Instant::now() + timeout;
            loop {
                if let Some(found) = search_tree(&wrapped, selector, DEFAULT_SEARCH_DEPTH)?
                    .into_iter()
                    .next()
                {
                    return Ok(found);
                }
                if std::time::Instant::now() >= deadline {
                    return Err(AutomationError::ElementNotFound(format!("{selector}")));
                }
                std::thread::sleep(Duration::from_millis(100));
            }
        };

        let element = matcher
            .find_first()
            .map_err(|e| AutomationError::ElementNotFound(format!("{selector}, Err: {e}")))?;
        Ok(WindowsUIElement::wrap(element, &self.automation))
    }

    #[instrument(skip(self, root))]
    fn find_elements(
        &self,
        selector: &Selector,
        root: Option<&UIElement>,
        timeout: Option<Duration>,
        depth: Option<usize>,
    ) -> Result<Vec<UIElement>, AutomationError> {
        let root_ele = self.resolve_root(root)?;
        let depth = depth.unwrap_or(DEFAULT_SEARCH_DEPTH);
        let timeout = timeout.unwrap_or(Duration::ZERO);

        let Some(matcher) = self.matcher(selector, &root_ele, depth, timeout) else {
            let wrapped = WindowsUIElement::wrap(root_ele, &self.automation);
            return search_tree(&wrapped, selector, depth);
        };

        match matcher.find_all() {
            Ok(elements) => {
                debug!("found {} elements for {}", elements.len(), selector);
                Ok(elements
                    .into_iter()
                    .map(|ele| WindowsUIElement::wrap(ele, &self.automation))
                    .collect())
            }
            Err(e) => {
                // The matcher reports an empty result as an error.
                debug!("no elements for {}: {}", selector, e);
                Ok(Vec::new())
            }
        }
    }

    fn send_keys(&self, chord: &KeyChord) -> Result<(), AutomationError> {
        input::send_chord(chord)
    }

    fn block_input(&self, block: bool) -> Result<bool, AutomationError> {
        input::block_input(block)
    }

}
