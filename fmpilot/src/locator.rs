use tracing::{debug, instrument};

use crate::element::UIElement;
use crate::errors::AutomationError;
use crate::platforms::AccessibilityEngine;
use crate::selector::Selector;
use std::sync::Arc;
use std::time::Duration;
use tokio::task;

const DEFAULT_WAIT: Duration = Duration::from_secs(5);

/// A selector bound to an engine and an optional search root. Dialog
/// controls are looked up by `nativeid:`; chains narrow by role and name.
#[derive(Clone)]
pub struct Locator {
    engine: Arc<dyn AccessibilityEngine>,
    selector: Selector,
    root: Option<UIElement>,
}

impl Locator {
    pub(crate) fn new(engine: Arc<dyn AccessibilityEngine>, selector: Selector) -> Self {
        Self {
            engine,
            selector,
            root: None,
        }
    }

    /// Search only below `element`.
    pub fn within(mut self, element: UIElement) -> Self {
        self.root = Some(element);
        self
    }

    /// Narrow the match to `selector` below the current one.
    pub fn locator(&self, selector: impl Into<Selector>) -> Locator {
        let mut chain = match self.selector.clone() {
            Selector::Chain(parts) => parts,
            s => vec![s],
        };
        match selector.into() {
            Selector::Chain(mut parts) => chain.append(&mut parts),
            s => chain.push(s),
        }
        Locator {
            engine: self.engine.clone(),
            selector: Selector::Chain(chain),
            root: self.root.clone(),
        }
    }

    /// `None` when nothing matched before the timeout.
    pub async fn try_first(
        &self,
        timeout: Option<Duration>,
    ) -> Result<Option<UIElement>, AutomationError> {
        match self.wait(timeout).await {
            Ok(el) => Ok(Some(el)),
            Err(AutomationError::Timeout(_)) | Err(AutomationError::ElementNotFound(_)) => Ok(None),
            Err(e) => Err(e),
        }
    }

    /// Poll for the first match. A miss becomes `Timeout`.
    #[instrument(level = "debug", skip(self, timeout))]
    pub async fn wait(&self, timeout: Option<Duration>) -> Result<UIElement, AutomationError> {
        let timeout = timeout.unwrap_or(DEFAULT_WAIT);
        debug!("waiting up to {:?} for {}", timeout, self.selector);

        // The engine polls synchronously.
        let engine = self.engine.clone();
        let selector = self.selector.clone();
        let root = self.root.clone();
        let found = task::spawn_blocking(move || {
            engine.find_element(&selector, root.as_ref(), Some(timeout))
        })
        .await
        .map_err(|e| AutomationError::PlatformError(format!("lookup task failed: {e}")))?;

        found.map_err(|e| match e {
            AutomationError::ElementNotFound(msg) => AutomationError::Timeout(format!(
                "{} not found within {timeout:?}: {msg}",
                self.selector
            )),
            e => e,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::platforms::mock::{MockEngine, MockNode};

    fn engine_with_button() -> MockEngine {
        let engine = MockEngine::new();
        {
            let mut s = engine.state();
            let root = s.root();
            let win = s.add(root, MockNode::new("Window", "Form"));
            s.add(win, MockNode::new("Button", "OK"));
        }
        engine
    }

    #[tokio::test]
    async fn wait_finds_nested_elements() {
        let engine = Arc::new(engine_with_button());
        let locator = Locator::new(engine, Selector::from("window|Form")).locator("button|OK");
        let el = locator.wait(Some(Duration::ZERO)).await.unwrap();
        assert_eq!(el.name(), "OK");
    }

    #[tokio::test]
    async fn missing_elements_time_out() {
        let engine = Arc::new(engine_with_button());
        let locator = Locator::new(engine, Selector::from("button|Cancel"));
        let err = locator.wait(Some(Duration::ZERO)).await.unwrap_err();
        assert!(matches!(err, AutomationError::Timeout(_)));
        assert!(locator.try_first(Some(Duration::ZERO)).await.unwrap().is_none());
    }
}
