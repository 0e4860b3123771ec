//! Best-effort automation of a database application's schema dialog
//!
//! The crate drives FileMaker Pro's "Manage Database" dialog (or any
//! application described by an [`AppProfile`]) through the platform
//! accessibility tree: it finds the dialog, walks its virtualized field list
//! with the keyboard and applies renames, type changes and comments.

use std::sync::Arc;
use tracing::instrument;

pub mod batch;
pub mod dialog;
pub mod editor;
pub mod element;
pub mod errors;
pub mod field_list;
pub mod input_lock;
pub mod keys;
pub mod locator;
pub mod model;
pub mod platforms;
pub mod popups;
pub mod profile;
pub mod retry;
pub mod selector;
pub mod status;

pub use batch::BatchRunner;
pub use element::{UIElement, UIElementAttributes, UIElementImpl};
pub use errors::AutomationError;
pub use field_list::FieldGrid;
pub use keys::{Key, KeyChord, Modifier};
pub use locator::Locator;
pub use model::{
    CreateReport, FieldFix, FieldRecord, FieldSuggestion, FieldType, FixReport, ReadReport,
    ResetReport,
};
pub use profile::AppProfile;
pub use selector::Selector;
pub use status::StatusFile;

/// The main entry point for UI automation
#[derive(Clone)]
pub struct Desktop {
    engine: Arc<dyn platforms::AccessibilityEngine>,
}

impl Desktop {
    /// Connect to the platform accessibility engine.
    #[instrument]
    pub fn new() -> Result<Self, AutomationError> {
        let engine = platforms::create_engine()?;
        Ok(Self { engine })
    }

    /// Use an existing engine, such as the in-memory mock.
    pub fn with_engine(engine: Arc<dyn platforms::AccessibilityEngine>) -> Self {
        Self { engine }
    }

    #[instrument(skip(self, selector))]
    pub fn locator(&self, selector: impl Into<Selector>) -> Locator {
        Locator::new(self.engine.clone(), selector.into())
    }

    pub fn top_level_windows(&self) -> Result<Vec<UIElement>, AutomationError> {
        self.engine.top_level_windows()
    }

    #[instrument(skip(self))]
    pub fn application_windows(&self, process_name: &str) -> Result<Vec<UIElement>, AutomationError> {
        self.engine.application_windows(process_name)
    }

    pub fn send_keys(&self, chord: &KeyChord) -> Result<(), AutomationError> {
        self.engine.send_keys(chord)
    }

    pub fn block_input(&self, block: bool) -> Result<bool, AutomationError> {
        self.engine.block_input(block)
    }
}
