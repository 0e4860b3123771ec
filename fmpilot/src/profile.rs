//! Application profile: every title keyword, automation id, shortcut and
//! delay the routines depend on. Defaults describe FileMaker Pro with a
//! Japanese or English UI.

use crate::errors::AutomationError;
use crate::keys::KeyChord;
use crate::model::FieldType;
use serde::{Deserialize, Serialize};
use std::path::Path;
use tracing::debug;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct AppProfile {
    /// Title of the main window and of its alert boxes.
    pub app_title: String,
    /// Executable that owns the windows.
    pub process_name: String,
    pub dialog: DialogRules,
    pub controls: ControlIds,
    pub shortcuts: Shortcuts,
    pub popups: PopupRules,
    pub type_keys: TypeKeys,
    pub timing: Timing,
    pub limits: Limits,
    /// Comment written by fixes that do not carry one.
    pub default_comment: String,
}

impl Default for AppProfile {
    fn default() -> Self {
        Self {
            app_title: "FileMaker Pro".to_string(),
            process_name: "FileMaker Pro.exe".to_string(),
            dialog: DialogRules::default(),
            controls: ControlIds::default(),
            shortcuts: Shortcuts::default(),
            popups: PopupRules::default(),
            type_keys: TypeKeys::default(),
            timing: Timing::default(),
            limits: Limits::default(),
            default_comment: "ClubMaker最適化".to_string(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct DialogRules {
    pub priority: Vec<String>,
    pub fallback: Vec<String>,
    pub exclude: Vec<String>,
    /// Caption of the tab that shows the field grid.
    pub fields_tab: String,
}

impl Default for DialogRules {
    fn default() -> Self {
        Self {
            priority: strings(&["データベースの管理", "Manage Database"]),
            fallback: strings(&["Database", "の管理"]),
            exclude: strings(&["レイアウト", "Layout", "スクリプト", "Script"]),
            fields_tab: "フィールド".to_string(),
        }
    }
}

/// Automation ids of the controls on the fields tab.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct ControlIds {
    pub field_list: String,
    pub name_edit: String,
    pub type_combo: String,
    pub comment_edit: String,
    pub save_button: String,
    pub delete_button: String,
}

impl Default for ControlIds {
    fn default() -> Self {
        Self {
            field_list: "IDC_DEFFIELDS_FIELD_LIST".to_string(),
            name_edit: "IDC_DEFFIELDS_FIELDNAME_EDIT".to_string(),
            type_combo: "IDC_FIELD_TYPE_MENU".to_string(),
            comment_edit: "IDC_DEFFIELDS_FIELDCOMMENT_EDIT".to_string(),
            save_button: "IDC_DEFFIELDS_SAVE_BUTTON".to_string(),
            delete_button: "IDC_DEFFIELDS_DELETE_BUTTON".to_string(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct Shortcuts {
    pub open_dialog: KeyChord,
    pub fields_tab: KeyChord,
    pub save: KeyChord,
    pub create: KeyChord,
    pub dismiss: KeyChord,
    pub confirm: KeyChord,
    pub list_home: KeyChord,
    pub list_step: KeyChord,
    pub list_page: KeyChord,
}

impl Default for Shortcuts {
    fn default() -> Self {
        use crate::keys::{Key, Modifier::*};
        Self {
            open_dialog: KeyChord::new([Ctrl, Shift], Key::Char('d')),
            fields_tab: KeyChord::new([Alt], Key::Char('f')),
            save: KeyChord::new([Alt], Key::Char('a')),
            create: KeyChord::new([Shift, Alt], Key::Char('e')),
            dismiss: KeyChord::key(Key::Escape),
            confirm: KeyChord::key(Key::Enter),
            list_home: KeyChord::key(Key::Home),
            list_step: KeyChord::key(Key::Down),
            list_page: KeyChord::key(Key::PageDown),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct PopupRules {
    /// Windows whose title contains one of these are closed on sight.
    pub close_keywords: Vec<String>,
    /// Never closed, even when a close keyword matches.
    pub protected_keywords: Vec<String>,
    pub cancel_buttons: Vec<String>,
    pub ok_buttons: Vec<String>,
    /// Buttons accepted on delete confirmations.
    pub confirm_buttons: Vec<String>,
    pub discard_markers: Vec<String>,
    pub duplicate_markers: Vec<String>,
}

impl Default for PopupRules {
    fn default() -> Self {
        Self {
            close_keywords: strings(&[
                "オプション",
                "Options",
                "計算",
                "Calculation",
                "集計",
                "Summary",
                "指定",
                "Specify",
            ]),
            protected_keywords: strings(&["データベース", "Database"]),
            cancel_buttons: strings(&["キャンセル", "Cancel"]),
            ok_buttons: strings(&["OK"]),
            confirm_buttons: strings(&["OK", "削除", "はい", "Delete", "Yes"]),
            discard_markers: strings(&["破棄", "Discard"]),
            duplicate_markers: strings(&[
                "既に存在",
                "すでに存在",
                "同じ名前",
                "already exists",
                "already in use",
                "duplicate",
            ]),
        }
    }
}

/// Letters that select each type in the type combo box.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct TypeKeys {
    pub text: char,
    pub number: char,
    pub date: char,
    pub time: char,
    pub timestamp: char,
    pub container: char,
    pub calculation: char,
    pub summary: char,
}

impl Default for TypeKeys {
    fn default() -> Self {
        Self {
            text: 't',
            number: 'n',
            date: 'd',
            time: 'i',
            timestamp: 'm',
            container: 'r',
            calculation: 'c',
            summary: 's',
        }
    }
}

impl TypeKeys {
    pub fn key_for(&self, field_type: FieldType) -> char {
        match field_type {
            FieldType::Text => self.text,
            FieldType::Number => self.number,
            FieldType::Date => self.date,
            FieldType::Time => self.time,
            FieldType::Timestamp => self.timestamp,
            FieldType::Container => self.container,
            FieldType::Calculation => self.calculation,
            FieldType::Summary => self.summary,
        }
    }
}

/// Delays in milliseconds.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct Timing {
    pub element_timeout_ms: u64,
    pub after_focus_ms: u64,
    pub after_escape_ms: u64,
    pub after_open_dialog_ms: u64,
    pub attempt_backoff_ms: u64,
    pub after_tab_ms: u64,
    pub list_step_ms: u64,
    pub after_select_ms: u64,
    pub after_save_ms: u64,
    pub after_create_ms: u64,
    pub options_dialog_ms: u64,
    pub after_delete_ms: u64,
    pub between_items_ms: u64,
    pub popup_round_ms: u64,
    pub alert_round_ms: u64,
}

impl Default for Timing {
    fn default() -> Self {
        Self {
            element_timeout_ms: 2000,
            after_focus_ms: 200,
            after_escape_ms: 500,
            after_open_dialog_ms: 2000,
            attempt_backoff_ms: 1000,
            after_tab_ms: 500,
            list_step_ms: 50,
            after_select_ms: 300,
            after_save_ms: 1000,
            after_create_ms: 500,
            options_dialog_ms: 500,
            after_delete_ms: 500,
            between_items_ms: 500,
            popup_round_ms: 1000,
            alert_round_ms: 500,
        }
    }
}

impl Timing {
    /// Every delay set to zero, for simulated desktops.
    pub fn immediate() -> Self {
        Self {
            element_timeout_ms: 0,
            after_focus_ms: 0,
            after_escape_ms: 0,
            after_open_dialog_ms: 0,
            attempt_backoff_ms: 0,
            after_tab_ms: 0,
            list_step_ms: 0,
            after_select_ms: 0,
            after_save_ms: 0,
            after_create_ms: 0,
            options_dialog_ms: 0,
            after_delete_ms: 0,
            between_items_ms: 0,
            popup_round_ms: 0,
            alert_round_ms: 0,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct Limits {
    pub ensure_attempts: u32,
    pub popup_rounds: u32,
    pub alert_rounds: u32,
    pub max_scroll_steps: u32,
    /// Consecutive list scans without new rows that mean "end of list".
    pub stall_limit: u32,
    pub max_deletions: u32,
}

impl Default for Limits {
    fn default() -> Self {
        Self {
            ensure_attempts: 5,
            popup_rounds: 3,
            alert_rounds: 3,
            max_scroll_steps: 1000,
            stall_limit: 3,
            max_deletions: 1000,
        }
    }
}

impl AppProfile {
    /// Load a profile; `.json` files are parsed as JSON, anything else as YAML.
    /// Missing keys keep their defaults.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, AutomationError> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path).map_err(|e| {
            AutomationError::Config(format!("cannot read profile {}: {e}", path.display()))
        })?;
        let is_json = path
            .extension()
            .map(|ext| ext.eq_ignore_ascii_case("json"))
            .unwrap_or(false);
        let profile = if is_json {
            Self::from_json(&content)?
        } else {
            Self::from_yaml(&content)?
        };
        debug!("loaded profile from {}", path.display());
        Ok(profile)
    }

    pub fn from_yaml(content: &str) -> Result<Self, AutomationError> {
        let profile: Self = serde_yaml::from_str(content)
            .map_err(|e| AutomationError::Config(format!("invalid YAML profile: {e}")))?;
        profile.validate()?;
        Ok(profile)
    }

    pub fn from_json(content: &str) -> Result<Self, AutomationError> {
        let profile: Self = serde_json::from_str(content)
            .map_err(|e| AutomationError::Config(format!("invalid JSON profile: {e}")))?;
        profile.validate()?;
        Ok(profile)
    }

    pub fn to_yaml(&self) -> Result<String, AutomationError> {
        serde_yaml::to_string(self)
            .map_err(|e| AutomationError::Config(format!("cannot serialize profile: {e}")))
    }

    pub fn validate(&self) -> Result<(), AutomationError> {
        if self.dialog.priority.iter().all(|k| k.trim().is_empty()) {
            return Err(AutomationError::Config(
                "dialog.priority needs at least one keyword".to_string(),
            ));
        }
        if self.app_title.trim().is_empty() {
            return Err(AutomationError::Config("app_title is empty".to_string()));
        }
        if self.limits.ensure_attempts == 0 || self.limits.stall_limit == 0 {
            return Err(AutomationError::Config(
                "limits.ensure_attempts and limits.stall_limit must be positive".to_string(),
            ));
        }
        Ok(())
    }

    /// Same profile with every delay removed.
    pub fn without_delays(mut self) -> Self {
        self.timing = Timing::immediate();
        self
    }
}

fn strings(items: &[&str]) -> Vec<String> {
    items.iter().map(|s| s.to_string()).collect()
}
