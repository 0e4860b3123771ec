use crate::keys::KeyChord;
use crate::{AutomationError, Selector, UIElement};
use std::sync::Arc;
use std::time::Duration;

pub mod mock;
#[cfg(target_os = "windows")]
pub mod windows;

/// Depth used when a search does not specify one.
pub const DEFAULT_SEARCH_DEPTH: usize = 50;

/// The common trait that all platform-specific engines must implement
pub trait AccessibilityEngine: Send + Sync {
    /// Get the root UI element (the desktop)
    fn get_root_element(&self) -> Result<UIElement, AutomationError>;

    /// All top-level windows, in z-order as reported by the platform
    fn top_level_windows(&self) -> Result<Vec<UIElement>, AutomationError> {
        let root = self.get_root_element()?;
        root.children_matching(&Selector::role("window"))
    }

    /// Top-level windows owned by the process with the given executable name.
    ///
    /// The name is compared case-insensitively and without the `.exe` suffix.
    fn application_windows(&self, process_name: &str) -> Result<Vec<UIElement>, AutomationError> {
        let wanted = normalize_process_name(process_name);
        Ok(self
            .top_level_windows()?
            .into_iter()
            .filter(|w| {
                w.process_name()
                    .map(|p| normalize_process_name(&p) == wanted)
                    .unwrap_or(false)
            })
            .collect())
    }

    /// Find the first element matching a selector, polling until the timeout
    fn find_element(
        &self,
        selector: &Selector,
        root: Option<&UIElement>,
        timeout: Option<Duration>,
    ) -> Result<UIElement, AutomationError>;

    /// Find all elements matching a selector; an empty result is not an error
    fn find_elements(
        &self,
        selector: &Selector,
        root: Option<&UIElement>,
        timeout: Option<Duration>,
        depth: Option<usize>,
    ) -> Result<Vec<UIElement>, AutomationError>;

    /// Send a key chord to whatever currently has keyboard focus
    fn send_keys(&self, chord: &KeyChord) -> Result<(), AutomationError>;

    /// Lock or unlock user keyboard and mouse input.
    ///
    /// Returns `Ok(false)` when the platform refused (usually missing
    /// elevation); callers treat that as a warning.
    fn block_input(&self, block: bool) -> Result<bool, AutomationError>;
}

/// Lowercased executable name without directory or `.exe` suffix.
pub fn normalize_process_name(name: &str) -> String {
    let base = name.rsplit(['\\', '/']).next().unwrap_or(name);
    let lower = base.trim().to_lowercase();
    lower
        .strip_suffix(".exe")
        .map(str::to_string)
        .unwrap_or(lower)
}

/// Tree-walking search shared by engines that have no native matcher.
pub(crate) fn search_tree(
    root: &UIElement,
    selector: &Selector,
    depth: usize,
) -> Result<Vec<UIElement>, AutomationError> {
    match selector {
        Selector::Invalid(reason) => Err(AutomationError::InvalidSelector(reason.clone())),
        Selector::Chain(parts) => {
            let mut scopes = vec![root.clone()];
            for part in parts {
                let mut next = Vec::new();
                for scope in &scopes {
                    for found in search_tree(scope, part, depth)? {
                        if !next.contains(&found) {
                            next.push(found);
                        }
                    }
                }
                scopes = next;
                if scopes.is_empty() {
                    break;
                }
            }
            Ok(scopes)
        }
        _ => {
            let mut found = Vec::new();
            let mut level = root.children().unwrap_or_default();
            let mut current_depth = 1;
            while !level.is_empty() && current_depth <= depth {
                let mut next_level = Vec::new();
                for el in level {
                    if selector.matches(&el.attributes(), &el.role()) {
                        found.push(el.clone());
                    }
                    next_level.extend(el.children().unwrap_or_default());
                }
                level = next_level;
                current_depth += 1;
            }
            Ok(found)
        }
    }
}

/// Create the appropriate engine for the current platform
pub fn create_engine() -> Result<Arc<dyn AccessibilityEngine>, AutomationError> {
    #[cfg(target_os = "windows")]
    {
        Ok(Arc::new(windows::WindowsEngine::new()?))
    }
    #[cfg(not(target_os = "windows"))]
    {
        Err(AutomationError::UnsupportedPlatform(
            "UI Automation of the target application is only available on Windows".to_string(),
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn normalizes_process_names() {
        assert_eq!(normalize_process_name("FileMaker Pro.exe"), "filemaker pro");
        assert_eq!(
            normalize_process_name(r"C:\Program Files\FileMaker\FileMaker Pro.EXE"),
            "filemaker pro"
        );
        assert_eq!(normalize_process_name("FileMaker Pro"), "filemaker pro");
    }
}
