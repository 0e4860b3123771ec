//! In-memory accessibility engine.
//!
//! A `MockEngine` holds a tree of `MockNode`s behind a mutex. Behaviour is
//! attached with handlers that receive every click, key chord, typed text and
//! close request dispatched to a node or one of its descendants, so a test can
//! script how a foreign application reacts without a real desktop.
//!
//! Handlers run while the state lock is held and receive `&mut MockState`;
//! they must never call back into the engine or an element.

use super::{search_tree, AccessibilityEngine, DEFAULT_SEARCH_DEPTH};
use crate::element::{UIElementAttributes, UIElementImpl};
use crate::keys::{Key, KeyChord, Modifier};
use crate::{AutomationError, Selector, UIElement};
use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::{Duration, Instant};
use tracing::debug;

pub type NodeId = usize;

const POLL_INTERVAL: Duration = Duration::from_millis(5);

#[derive(Debug, Clone)]
pub struct MockNode {
    pub role: String,
    pub name: String,
    pub automation_id: String,
    pub class_name: String,
    pub value: String,
    pub process_name: String,
    pub visible: bool,
    pub enabled: bool,
    pub selected: bool,
    pub minimized: bool,
    parent: Option<NodeId>,
    children: Vec<NodeId>,
    alive: bool,
    select_all: bool,
}

impl MockNode {
    pub fn new(role: &str, name: &str) -> Self {
        Self {
            role: role.to_string(),
            name: name.to_string(),
            automation_id: String::new(),
            class_name: String::new(),
            value: String::new(),
            process_name: String::new(),
            visible: true,
            enabled: true,
            selected: false,
            minimized: false,
            parent: None,
            children: Vec::new(),
            alive: true,
            select_all: false,
        }
    }

    pub fn with_id(mut self, automation_id: &str) -> Self {
        self.automation_id = automation_id.to_string();
        self
    }

    pub fn with_process(mut self, process_name: &str) -> Self {
        self.process_name = process_name.to_string();
        self
    }

    pub fn with_value(mut self, value: &str) -> Self {
        self.value = value.to_string();
        self
    }

    pub fn disabled(mut self) -> Self {
        self.enabled = false;
        self
    }

    pub fn hidden(mut self) -> Self {
        self.visible = false;
        self
    }

    pub fn minimized(mut self) -> Self {
        self.minimized = true;
        self
    }

    pub fn parent(&self) -> Option<NodeId> {
        self.parent
    }

    pub fn is_alive(&self) -> bool {
        self.alive
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum MockEvent {
    Click,
    Key(KeyChord),
    Text(String),
    Close,
}

/// One dispatched event, kept for assertions.
#[derive(Debug, Clone, PartialEq)]
pub struct MockRecord {
    pub target: Option<NodeId>,
    pub event: MockEvent,
}

/// Returns `true` when the event was consumed and must not bubble further.
pub type MockHandler = Arc<dyn Fn(&mut MockState, NodeId, &MockEvent) -> bool + Send + Sync>;

pub struct MockState {
    nodes: Vec<MockNode>,
    handlers: HashMap<NodeId, MockHandler>,
    focused: Option<NodeId>,
    records: Vec<MockRecord>,
    input_blocked: bool,
    allow_input_block: bool,
}

impl MockState {
    fn new() -> Self {
        let mut root = MockNode::new("pane", "Desktop");
        root.process_name = "explorer".to_string();
        Self {
            nodes: vec![root],
            handlers: HashMap::new(),
            focused: None,
            records: Vec::new(),
            input_blocked: false,
            allow_input_block: true,
        }
    }

    pub fn root(&self) -> NodeId {
        0
    }

    /// Append `node` as the last child of `parent`. Children inherit the
    /// parent's process name when they have none.
    pub fn add(&mut self, parent: NodeId, mut node: MockNode) -> NodeId {
        let id = self.nodes.len();
        if node.process_name.is_empty() && parent != self.root() {
            node.process_name = self.nodes[parent].process_name.clone();
        }
        node.parent = Some(parent);
        node.children.clear();
        node.alive = true;
        self.nodes.push(node);
        self.nodes[parent].children.push(id);
        id
    }

    /// Detach `id` and everything below it. Elements still pointing at the
    /// removed nodes report `ElementDetached`.
    pub fn remove(&mut self, id: NodeId) {
        if id == self.root() || !self.is_alive(id) {
            return;
        }
        if let Some(parent) = self.nodes[id].parent {
            self.nodes[parent].children.retain(|c| *c != id);
        }
        let mut stack = vec![id];
        while let Some(n) = stack.pop() {
            self.nodes[n].alive = false;
            self.handlers.remove(&n);
            if self.focused == Some(n) {
                self.focused = None;
            }
            stack.extend(self.nodes[n].children.iter().copied());
        }
    }

    pub fn clear_children(&mut self, id: NodeId) {
        for child in self.children(id) {
            self.remove(child);
        }
    }

    pub fn is_alive(&self, id: NodeId) -> bool {
        self.nodes.get(id).map(|n| n.alive).unwrap_or(false)
    }

    pub fn node(&self, id: NodeId) -> Option<&MockNode> {
        self.nodes.get(id).filter(|n| n.alive)
    }

    pub fn node_mut(&mut self, id: NodeId) -> Option<&mut MockNode> {
        self.nodes.get_mut(id).filter(|n| n.alive)
    }

    pub fn children(&self, id: NodeId) -> Vec<NodeId> {
        self.node(id).map(|n| n.children.clone()).unwrap_or_default()
    }

    pub fn on(&mut self, id: NodeId, handler: MockHandler) {
        self.handlers.insert(id, handler);
    }

    pub fn focused(&self) -> Option<NodeId> {
        self.focused
    }

    /// Focus a node and raise its top-level window to the front.
    pub fn set_focus(&mut self, id: NodeId) {
        if !self.is_alive(id) {
            return;
        }
        self.focused = Some(id);
        if let Some(window) = self.window_of(id) {
            self.raise(window);
        }
    }

    /// Move a top-level window to the front of the z-order.
    pub fn raise(&mut self, window: NodeId) {
        let root = self.root();
        let siblings = &mut self.nodes[root].children;
        if let Some(pos) = siblings.iter().position(|c| *c == window) {
            let w = siblings.remove(pos);
            siblings.insert(0, w);
        }
    }

    /// The top-level window containing `id`.
    pub fn window_of(&self, id: NodeId) -> Option<NodeId> {
        let mut current = id;
        loop {
            let parent = self.node(current)?.parent?;
            if parent == self.root() {
                return Some(current);
            }
            current = parent;
        }
    }

    pub fn find_by_automation_id(&self, automation_id: &str) -> Option<NodeId> {
        self.nodes
            .iter()
            .position(|n| n.alive && n.automation_id == automation_id)
    }

    pub fn find_by_name(&self, name: &str) -> Option<NodeId> {
        self.nodes.iter().position(|n| n.alive && n.name == name)
    }

    pub fn records(&self) -> &[MockRecord] {
        &self.records
    }

    /// Number of times `chord` was dispatched.
    pub fn key_count(&self, chord: &KeyChord) -> usize {
        self.records
            .iter()
            .filter(|r| matches!(&r.event, MockEvent::Key(k) if k == chord))
            .count()
    }

    pub fn input_blocked(&self) -> bool {
        self.input_blocked
    }

    /// Make `block_input` report that the OS refused the lock.
    pub fn deny_input_block(&mut self) {
        self.allow_input_block = false;
    }

    /// Deliver an event to `target`, bubbling through ancestors until a
    /// handler consumes it. Built-in edit behaviour runs first.
    pub fn dispatch(&mut self, target: Option<NodeId>, event: MockEvent) -> bool {
        self.records.push(MockRecord {
            target,
            event: event.clone(),
        });
        let Some(target) = target.filter(|t| self.is_alive(*t)) else {
            return false;
        };
        if self.default_action(target, &event) {
            return true;
        }

        let mut current = Some(target);
        while let Some(id) = current {
            if let Some(handler) = self.handlers.get(&id).cloned() {
                if handler(self, target, &event) {
                    return true;
                }
            }
            current = self.node(id).and_then(|n| n.parent);
        }

        if event == MockEvent::Close {
            if let Some(node) = self.node(target) {
                if node.role.eq_ignore_ascii_case("window") {
                    self.remove(target);
                    return true;
                }
            }
        }
        false
    }

    fn default_action(&mut self, target: NodeId, event: &MockEvent) -> bool {
        let Some(node) = self.node_mut(target) else {
            return false;
        };
        let editable = node.role.eq_ignore_ascii_case("edit");
        if !editable {
            return false;
        }
        match event {
            MockEvent::Key(chord) if chord.has(Modifier::Ctrl) && chord.main_key() == Key::Char('a') => {
                node.select_all = true;
                true
            }
            MockEvent::Key(chord) if chord.is_plain(Key::Backspace) => {
                if node.select_all {
                    node.value.clear();
                    node.select_all = false;
                } else {
                    node.value.pop();
                }
                true
            }
            MockEvent::Text(text) => {
                if node.select_all {
                    node.value.clear();
                    node.select_all = false;
                }
                node.value.push_str(text);
                true
            }
            _ => false,
        }
    }
}

/// Engine over a shared in-memory tree. Clones share the same state.
#[derive(Clone)]
pub struct MockEngine {
    state: Arc<Mutex<MockState>>,
}

impl Default for MockEngine {
    fn default() -> Self {
        Self::new()
    }
}

impl MockEngine {
    pub fn new() -> Self {
        Self {
            state: Arc::new(Mutex::new(MockState::new())),
        }
    }

    /// Lock the state for building or inspecting the tree.
    pub fn state(&self) -> MutexGuard<'_, MockState> {
        self.state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    pub fn element(&self, id: NodeId) -> UIElement {
        UIElement::new(Box::new(MockElement {
            state: self.state.clone(),
            id,
        }))
    }
}

impl AccessibilityEngine for MockEngine {
    fn get_root_element(&self) -> Result<UIElement, AutomationError> {
        Ok(self.element(0))
    }

    fn find_element(
        &self,
        selector: &Selector,
        root: Option<&UIElement>,
        timeout: Option<Duration>,
    ) -> Result<UIElement, AutomationError> {
        let deadline = Instant::now() + timeout.unwrap_or_default();
        loop {
            if let Some(found) = self
                .find_elements(selector, root, None, None)?
                .into_iter()
                .next()
            {
                return Ok(found);
            }
            if Instant::now() >= deadline {
                return Err(AutomationError::ElementNotFound(format!(
                    "{selector} (mock desktop)"
                )));
            }
            std::thread::sleep(POLL_INTERVAL);
        }
    }

    fn find_elements(
        &self,
        selector: &Selector,
        root: Option<&UIElement>,
        _timeout: Option<Duration>,
        depth: Option<usize>,
    ) -> Result<Vec<UIElement>, AutomationError> {
        let root = match root {
            Some(r) => r.clone(),
            None => self.get_root_element()?,
        };
        search_tree(&root, selector, depth.unwrap_or(DEFAULT_SEARCH_DEPTH))
    }

    fn send_keys(&self, chord: &KeyChord) -> Result<(), AutomationError> {
        let mut state = self.state();
        let target = state.focused();
        debug!("mock: key {} -> {:?}", chord, target);
        state.dispatch(target, MockEvent::Key(chord.clone()));
        Ok(())
    }

    fn block_input(&self, block: bool) -> Result<bool, AutomationError> {
        let mut state = self.state();
        if !state.allow_input_block {
            return Ok(false);
        }
        state.input_blocked = block;
        Ok(true)
    }

}

struct MockElement {
    state: Arc<Mutex<MockState>>,
    id: NodeId,
}

impl std::fmt::Debug for MockElement {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MockElement").field("id", &self.id).finish()
    }
}

impl MockElement {
    fn lock(&self) -> MutexGuard<'_, MockState> {
        self.state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn wrap(&self, id: NodeId) -> UIElement {
        UIElement::new(Box::new(MockElement {
            state: self.state.clone(),
            id,
        }))
    }

    /// Run `f` against the live node, or fail if it has been removed.
    fn with_node<R>(
        &self,
        f: impl FnOnce(&mut MockState, NodeId) -> R,
    ) -> Result<R, AutomationError> {
        let mut state = self.lock();
        if !state.is_alive(self.id) {
            return Err(AutomationError::ElementDetached(format!(
                "mock node {}",
                self.id
            )));
        }
        Ok(f(&mut state, self.id))
    }
}

impl UIElementImpl for MockElement {
    fn object_id(&self) -> usize {
        self.id
    }

    fn role(&self) -> String {
        self.lock()
            .node(self.id)
            .map(|n| n.role.clone())
            .unwrap_or_else(|| "unknown".to_string())
    }

    fn attributes(&self) -> UIElementAttributes {
        let state = self.lock();
        let Some(node) = state.node(self.id) else {
            return UIElementAttributes::default();
        };
        let non_empty = |s: &str| (!s.is_empty()).then(|| s.to_string());
        UIElementAttributes {
            name: non_empty(&node.name),
            automation_id: non_empty(&node.automation_id),
            class_name: non_empty(&node.class_name),
            value: non_empty(&node.value),
            process_name: non_empty(&node.process_name),
            is_visible: node.visible && !node.minimized,
            is_enabled: node.enabled,
        }
    }

    fn children(&self) -> Result<Vec<UIElement>, AutomationError> {
        let ids = self.with_node(|state, id| state.children(id))?;
        Ok(ids.into_iter().map(|id| self.wrap(id)).collect())
    }

    fn click(&self) -> Result<(), AutomationError> {
        self.with_node(|state, id| {
            if state.node(id).map(|n| n.enabled).unwrap_or(false) {
                state.set_focus(id);
                state.dispatch(Some(id), MockEvent::Click);
            }
        })
    }

    fn focus(&self) -> Result<(), AutomationError> {
        self.with_node(|state, id| state.set_focus(id))
    }

    fn activate_window(&self) -> Result<(), AutomationError> {
        self.with_node(|state, id| {
            if let Some(window) = state.window_of(id) {
                if let Some(node) = state.node_mut(window) {
                    node.minimized = false;
                }
            }
            state.set_focus(id);
        })
    }

    fn type_text(&self, text: &str) -> Result<(), AutomationError> {
        self.with_node(|state, id| {
            state.set_focus(id);
            state.dispatch(Some(id), MockEvent::Text(text.to_string()));
        })
    }

    fn set_value(&self, value: &str) -> Result<(), AutomationError> {
        self.with_node(|state, id| {
            if let Some(node) = state.node_mut(id) {
                node.value = value.to_string();
            }
        })
    }

    fn press_key(&self, chord: &KeyChord) -> Result<(), AutomationError> {
        self.with_node(|state, id| {
            state.set_focus(id);
            state.dispatch(Some(id), MockEvent::Key(chord.clone()));
        })
    }

    fn is_enabled(&self) -> Result<bool, AutomationError> {
        self.with_node(|state, id| state.node(id).map(|n| n.enabled).unwrap_or(false))
    }

    fn is_visible(&self) -> Result<bool, AutomationError> {
        self.with_node(|state, id| {
            state
                .node(id)
                .map(|n| n.visible && !n.minimized)
                .unwrap_or(false)
        })
    }

    fn is_selected(&self) -> Result<bool, AutomationError> {
        self.with_node(|state, id| state.node(id).map(|n| n.selected).unwrap_or(false))
    }

    fn close(&self) -> Result<(), AutomationError> {
        self.with_node(|state, id| {
            state.dispatch(Some(id), MockEvent::Close);
        })
    }

    fn clone_box(&self) -> Box<dyn UIElementImpl> {
        Box::new(MockElement {
            state: self.state.clone(),
            id: self.id,
        })
    }

    fn as_any(&self) -> &dyn std::any::Any {
        self
    }
}
