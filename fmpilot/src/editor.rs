//! Edits on the fields tab: rename/retype/comment, create and delete.

use crate::errors::AutomationError;
use crate::field_list::FieldGrid;
use crate::keys::{Key, KeyChord};
use crate::model::{FieldFix, FieldRecord, FieldType};
use crate::popups::{check_after_edit, find_button};
use crate::profile::AppProfile;
use crate::retry::pause;
use crate::selector::Selector;
use crate::{Desktop, UIElement};
use std::time::Duration;
use tracing::{debug, info, instrument, warn};

/// A control of the dialog by automation id, waiting up to the profile's
/// element timeout.
pub async fn find_control(
    desktop: &Desktop,
    dialog: &UIElement,
    automation_id: &str,
    profile: &AppProfile,
) -> Result<UIElement, AutomationError> {
    desktop
        .locator(Selector::native_id(automation_id))
        .within(dialog.clone())
        .wait(Some(Duration::from_millis(profile.timing.element_timeout_ms)))
        .await
}

async fn try_control(
    desktop: &Desktop,
    dialog: &UIElement,
    automation_id: &str,
    profile: &AppProfile,
) -> Result<Option<UIElement>, AutomationError> {
    desktop
        .locator(Selector::native_id(automation_id))
        .within(dialog.clone())
        .try_first(Some(Duration::from_millis(profile.timing.element_timeout_ms)))
        .await
}

/// Replace the text of an edit and commit it with the confirm key.
async fn replace_text(
    edit: &UIElement,
    text: &str,
    profile: &AppProfile,
) -> Result<(), AutomationError> {
    edit.clear_and_type(text)?;
    edit.press_key(&profile.shortcuts.confirm)?;
    pause(profile.timing.after_select_ms).await;
    Ok(())
}

/// Type the accelerator of `field_type` into the type combo. Returns the
/// combo so the caller can commit the choice.
async fn press_type_key(
    desktop: &Desktop,
    dialog: &UIElement,
    field_type: FieldType,
    profile: &AppProfile,
) -> Result<UIElement, AutomationError> {
    let combo = find_control(desktop, dialog, &profile.controls.type_combo, profile).await?;
    let key = profile.type_keys.key_for(field_type);
    debug!("type {} via key '{}'", field_type, key);
    combo.press_key(&KeyChord::key(Key::Char(key.to_ascii_lowercase())))?;
    Ok(combo)
}

async fn choose_type(
    desktop: &Desktop,
    dialog: &UIElement,
    field_type: FieldType,
    profile: &AppProfile,
) -> Result<(), AutomationError> {
    let combo = press_type_key(desktop, dialog, field_type, profile).await?;
    combo.press_key(&profile.shortcuts.confirm)?;
    pause(profile.timing.after_select_ms).await;
    Ok(())
}

/// Click Save when it is enabled, otherwise send the save shortcut to the
/// dialog.
async fn save_changes(
    desktop: &Desktop,
    dialog: &UIElement,
    profile: &AppProfile,
) -> Result<(), AutomationError> {
    let save = try_control(desktop, dialog, &profile.controls.save_button, profile).await?;
    match save {
        Some(button) if button.is_enabled().unwrap_or(false) => {
            debug!("Save button is enabled, clicking");
            button.click()?;
        }
        _ => {
            info!(
                "Save button is disabled or missing, sending {}",
                profile.shortcuts.save
            );
            dialog.focus()?;
            desktop.send_keys(&profile.shortcuts.save)?;
        }
    }
    pause(profile.timing.after_save_ms).await;
    Ok(())
}

/// Rename, optionally retype, and comment one field.
#[instrument(skip_all, fields(old = %fix.old_name, new = %fix.target_name()))]
pub async fn apply_fix(
    desktop: &Desktop,
    dialog: &UIElement,
    grid: &FieldGrid,
    fix: &FieldFix,
    profile: &AppProfile,
) -> Result<(), AutomationError> {
    info!("Fixing: {} -> {}", fix.old_name, fix.target_name());
    grid.select(&fix.old_name, profile).await?;

    let name_edit = find_control(desktop, dialog, &profile.controls.name_edit, profile).await?;
    replace_text(&name_edit, fix.target_name(), profile).await?;

    if let Some(field_type) = fix.target_type() {
        choose_type(desktop, dialog, field_type, profile).await?;
    }

    let comment = fix
        .comment
        .as_deref()
        .filter(|c| !c.trim().is_empty())
        .unwrap_or(&profile.default_comment);
    let comment_edit =
        find_control(desktop, dialog, &profile.controls.comment_edit, profile).await?;
    replace_text(&comment_edit, comment, profile).await?;

    save_changes(desktop, dialog, profile).await?;
    check_after_edit(desktop, profile, &fix.old_name).await
}

/// Create one field. The type key is always sent so a type left selected by
/// a previous creation does not carry over.
#[instrument(skip_all, fields(name = %record.name))]
pub async fn create_field(
    desktop: &Desktop,
    dialog: &UIElement,
    record: &FieldRecord,
    profile: &AppProfile,
) -> Result<(), AutomationError> {
    if record.name.trim().is_empty() {
        return Err(AutomationError::InvalidArgument(
            "field name is empty".to_string(),
        ));
    }
    info!("Creating '{}'", record.name);
    let field_type = record.parsed_type();

    let name_edit = find_control(desktop, dialog, &profile.controls.name_edit, profile).await?;
    name_edit.clear_and_type(&record.name)?;

    // Key only; the create shortcut commits the field.
    match press_type_key(desktop, dialog, field_type, profile).await {
        Ok(_) => pause(profile.timing.after_select_ms).await,
        Err(e) => warn!("could not set type {}: {}", field_type, e),
    }

    if !record.comment.trim().is_empty() {
        let comment_edit =
            find_control(desktop, dialog, &profile.controls.comment_edit, profile).await?;
        comment_edit.clear_and_type(&record.comment)?;
    }

    name_edit.focus()?;
    desktop.send_keys(&profile.shortcuts.create)?;
    pause(profile.timing.after_create_ms).await;

    if field_type.opens_options_dialog() {
        pause(profile.timing.options_dialog_ms).await;
        desktop.send_keys(&profile.shortcuts.confirm)?;
    }

    check_after_edit(desktop, profile, &record.name).await
}

/// Press Delete for the selected row and get through the confirmations.
async fn delete_selected(
    desktop: &Desktop,
    dialog: &UIElement,
    profile: &AppProfile,
) -> Result<(), AutomationError> {
    let delete = find_control(desktop, dialog, &profile.controls.delete_button, profile).await?;
    if !delete.is_enabled().unwrap_or(false) {
        return Err(AutomationError::ElementNotEnabled(
            profile.controls.delete_button.clone(),
        ));
    }
    delete.click()?;
    pause(profile.timing.after_delete_ms).await;

    desktop.send_keys(&profile.shortcuts.confirm)?;
    pause(profile.timing.after_delete_ms).await;

    // Some confirmations ignore Enter; click whatever accept button is left.
    for window in desktop.top_level_windows()? {
        if !window.name().contains(profile.app_title.as_str()) {
            continue;
        }
        if let Some(button) = find_button(&window, &profile.popups.confirm_buttons) {
            debug!("confirming '{}' in '{}'", button.name(), window.name());
            button.click()?;
            pause(profile.timing.after_focus_ms).await;
        }
    }
    Ok(())
}

#[instrument(skip(desktop, dialog, grid, profile))]
pub async fn delete_field(
    desktop: &Desktop,
    dialog: &UIElement,
    grid: &FieldGrid,
    name: &str,
    profile: &AppProfile,
) -> Result<(), AutomationError> {
    grid.select(name, profile).await?;
    delete_selected(desktop, dialog, profile).await
}

/// Delete whatever row is at the top of the list. `None` when the list is
/// empty.
pub async fn delete_first(
    desktop: &Desktop,
    dialog: &UIElement,
    grid: &FieldGrid,
    profile: &AppProfile,
) -> Result<Option<String>, AutomationError> {
    let Some(row) = grid.visible_rows().into_iter().next() else {
        return Ok(None);
    };
    info!("Deleting: {}", row.record.name);
    row.element.click()?;
    pause(profile.timing.after_select_ms).await;
    delete_selected(desktop, dialog, profile).await?;
    Ok(Some(row.record.name))
}
