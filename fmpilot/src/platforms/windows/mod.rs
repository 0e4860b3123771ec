//! Windows platform implementation for UI automation
//!
//! Elements and searches go through the Windows UI Automation API via the
//! uiautomation crate; keyboard chords and the input lock go through Win32.

pub mod element;
pub mod engine;
pub mod input;
pub mod types;
pub mod utils;

pub use element::WindowsUIElement;
pub use engine::WindowsEngine;
