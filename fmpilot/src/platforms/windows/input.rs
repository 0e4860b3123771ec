//! Keyboard synthesis and the input lock, through SendInput and BlockInput.
//!
//! Everything here goes to the foreground window; callers focus first.

use crate::keys::{Key, KeyChord, Modifier};
use crate::AutomationError;
use std::mem;
use tracing::{debug, warn};
use windows::Win32::UI::Input::KeyboardAndMouse::{
    BlockInput, SendInput, VkKeyScanW, INPUT, INPUT_0, INPUT_KEYBOARD, KEYBDINPUT,
    KEYBD_EVENT_FLAGS, KEYEVENTF_EXTENDEDKEY, KEYEVENTF_KEYUP, KEYEVENTF_UNICODE, VIRTUAL_KEY,
    VK_BACK, VK_CONTROL, VK_DELETE, VK_DOWN, VK_END, VK_ESCAPE, VK_F1, VK_HOME, VK_LEFT,
    VK_LWIN, VK_MENU, VK_NEXT, VK_PRIOR, VK_RETURN, VK_RIGHT, VK_SHIFT, VK_SPACE, VK_TAB,
    VK_UP,
};

fn is_extended_key(vk: VIRTUAL_KEY) -> bool {
    matches!(
        vk,
        VK_UP | VK_DOWN | VK_LEFT | VK_RIGHT | VK_HOME | VK_END | VK_PRIOR | VK_NEXT | VK_DELETE
    )
}

fn keyboard_input(vk: VIRTUAL_KEY, scan: u16, flags: KEYBD_EVENT_FLAGS) -> INPUT {
    INPUT {
        r#type: INPUT_KEYBOARD,
        Anonymous: INPUT_0 {
            ki: KEYBDINPUT {
                wVk: vk,
                wScan: scan,
                dwFlags: flags,
                time: 0,
                dwExtraInfo: 0,
            },
        },
    }
}

fn vk_event(vk: VIRTUAL_KEY, up: bool) -> INPUT {
    let ext = if is_extended_key(vk) {
        KEYEVENTF_EXTENDEDKEY
    } else {
        KEYBD_EVENT_FLAGS(0)
    };
    let flags = if up { ext | KEYEVENTF_KEYUP } else { ext };
    keyboard_input(vk, 0, flags)
}

fn modifier_vk(modifier: Modifier) -> VIRTUAL_KEY {
    match modifier {
        Modifier::Ctrl => VK_CONTROL,
        Modifier::Alt => VK_MENU,
        Modifier::Shift => VK_SHIFT,
        Modifier::Win => VK_LWIN,
    }
}

/// Virtual key for a main key. Characters go through the active layout;
/// `None` means the layout has no key for it.
fn key_vk(key: Key) -> Option<VIRTUAL_KEY> {
    let vk = match key {
        Key::Char(c) => {
            let mut units = [0u16; 2];
            let encoded = c.encode_utf16(&mut units);
            if encoded.len() != 1 {
                return None;
            }
            let scan = unsafe { VkKeyScanW(encoded[0]) };
            if scan == -1 {
                return None;
            }
            VIRTUAL_KEY((scan as u16) & 0xff)
        }
        Key::Enter => VK_RETURN,
        Key::Escape => VK_ESCAPE,
        Key::Tab => VK_TAB,
        Key::Space => VK_SPACE,
        Key::Backspace => VK_BACK,
        Key::Delete => VK_DELETE,
        Key::Home => VK_HOME,
        Key::End => VK_END,
        Key::PageUp => VK_PRIOR,
        Key::PageDown => VK_NEXT,
        Key::Up => VK_UP,
        Key::Down => VK_DOWN,
        Key::Left => VK_LEFT,
        Key::Right => VK_RIGHT,
        Key::F(n) if (1..=24).contains(&n) => VIRTUAL_KEY(VK_F1.0 + u16::from(n) - 1),
        Key::F(_) => return None,
    };
    Some(vk)
}

fn send(inputs: &[INPUT]) -> Result<(), AutomationError> {
    if inputs.is_empty() {
        return Ok(());
    }
    let sent = unsafe { SendInput(inputs, mem::size_of::<INPUT>() as i32) };
    if sent as usize != inputs.len() {
        return Err(AutomationError::PlatformError(format!(
            "SendInput injected {sent} of {} events",
            inputs.len()
        )));
    }
    Ok(())
}

/// Press the modifiers, tap the main key, release the modifiers in reverse.
pub(crate) fn send_chord(chord: &KeyChord) -> Result<(), AutomationError> {
    let key = chord.main_key();
    let vk = key_vk(key).ok_or_else(|| {
        AutomationError::InvalidArgument(format!("no virtual key for '{chord}'"))
    })?;
    debug!("sending chord {}", chord);

    let mut inputs = Vec::with_capacity(chord.modifiers().len() * 2 + 2);
    for m in chord.modifiers() {
        inputs.push(vk_event(modifier_vk(*m), false));
    }
    inputs.push(vk_event(vk, false));
    inputs.push(vk_event(vk, true));
    for m in chord.modifiers().iter().rev() {
        inputs.push(vk_event(modifier_vk(*m), true));
    }
    send(&inputs)
}

/// Type text as Unicode key events, independent of the keyboard layout.
pub(crate) fn send_unicode_text(text: &str) -> Result<(), AutomationError> {
    let inputs: Vec<INPUT> = text
        .encode_utf16()
        .flat_map(|unit| {
            [
                keyboard_input(VIRTUAL_KEY(0), unit, KEYEVENTF_UNICODE),
                keyboard_input(VIRTUAL_KEY(0), unit, KEYEVENTF_UNICODE | KEYEVENTF_KEYUP),
            ]
        })
        .collect();
    send(&inputs)
}

/// `Ok(false)` when Windows refuses, which happens without elevation.
pub(crate) fn block_input(block: bool) -> Result<bool, AutomationError> {
    match unsafe { BlockInput(block) } {
        Ok(()) => Ok(true),
        Err(e) => {
            warn!("BlockInput({}) failed: {}", block, e);
            Ok(false)
        }
    }
}
