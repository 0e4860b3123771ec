//! Utility functions and type conversions for Windows platform

use crate::selector::canonical_role;
use crate::AutomationError;
use std::collections::hash_map::DefaultHasher;
use std::collections::HashMap;
use std::hash::{Hash, Hasher};
use std::sync::{Mutex, OnceLock};
use sysinfo::{Pid, ProcessesToUpdate, System};
use tracing::debug;
use uiautomation::controls::ControlType;
use uiautomation::UIAutomation;
use windows::core::HRESULT;
use windows::Win32::System::Com::{CoInitializeEx, COINIT_MULTITHREADED};

const RPC_E_CHANGED_MODE: HRESULT = HRESULT(0x80010106u32 as i32);

/// Initialize COM for the calling thread; "already initialized" is fine.
pub(crate) fn init_com() -> Result<(), AutomationError> {
    unsafe {
        let hr = CoInitializeEx(None, COINIT_MULTITHREADED);
        if hr.is_err() && hr != RPC_E_CHANGED_MODE {
            return Err(AutomationError::PlatformError(format!(
                "Failed to initialize COM in multithreaded mode: {hr}"
            )));
        }
        if hr == RPC_E_CHANGED_MODE {
            debug!("COM already initialized in this thread");
        }
    }
    Ok(())
}

pub(crate) fn create_ui_automation_with_com_init() -> Result<UIAutomation, AutomationError> {
    init_com()?;
    UIAutomation::new_direct().map_err(|e| AutomationError::PlatformError(e.to_string()))
}

/// Identity of an element within this session, from its runtime id.
pub(crate) fn element_id(element: &uiautomation::UIElement) -> usize {
    let mut hasher = DefaultHasher::new();
    match element.get_runtime_id() {
        Ok(runtime_id) => runtime_id.hash(&mut hasher),
        Err(_) => {
            // No runtime id: fall back to the properties that usually identify it.
            element.get_automation_id().unwrap_or_default().hash(&mut hasher);
            element.get_name().unwrap_or_default().hash(&mut hasher);
            element.get_classname().unwrap_or_default().hash(&mut hasher);
            if let Ok(rect) = element.get_bounding_rectangle() {
                (rect.get_left(), rect.get_top(), rect.get_width(), rect.get_height())
                    .hash(&mut hasher);
            }
        }
    }
    hasher.finish() as usize
}

/// Maps generic role strings to Windows ControlType enums
pub(crate) fn map_generic_role_to_win_roles(role: &str) -> ControlType {
    match canonical_role(role).as_str() {
        "pane" => ControlType::Pane,
        "window" => ControlType::Window,
        "button" => ControlType::Button,
        "checkbox" => ControlType::CheckBox,
        "text" => ControlType::Text,
        "dataitem" => ControlType::DataItem,
        "datagrid" => ControlType::DataGrid,
        "list" => ControlType::List,
        "listitem" => ControlType::ListItem,
        "combobox" => ControlType::ComboBox,
        "tabitem" => ControlType::TabItem,
        "edit" => ControlType::Edit,
        "header" => ControlType::Header,
        "headeritem" => ControlType::HeaderItem,
        "table" => ControlType::Table,
        "group" => ControlType::Group,
        "scrollbar" => ControlType::ScrollBar,
        _ => ControlType::Custom,
    }
}

fn process_names() -> &'static Mutex<HashMap<u32, String>> {
    static NAMES: OnceLock<Mutex<HashMap<u32, String>>> = OnceLock::new();
    NAMES.get_or_init(|| Mutex::new(HashMap::new()))
}

/// Executable name for a pid, cached for the life of the process.
pub(crate) fn process_name_by_pid(pid: u32) -> Option<String> {
    let mut cache = process_names().lock().ok()?;
    if let Some(name) = cache.get(&pid) {
        return Some(name.clone());
    }

    let mut system = System::new();
    system.refresh_processes(ProcessesToUpdate::All, true);
    for (p, process) in system.processes() {
        cache.insert(p.as_u32(), process.name().to_string_lossy().to_string());
    }
    system
        .process(Pid::from_u32(pid))
        .map(|p| p.name().to_string_lossy().to_string())
}
