//! Recovery from windows that get in the way: option dialogs left open by
//! field creation and the application's alert boxes.

use crate::errors::AutomationError;
use crate::profile::AppProfile;
use crate::retry::pause;
use crate::selector::Selector;
use crate::{Desktop, UIElement};
use tracing::{debug, info, instrument, warn};

/// First button below `window` whose caption equals one of `captions`,
/// trying the captions in order.
pub fn find_button(window: &UIElement, captions: &[String]) -> Option<UIElement> {
    let buttons = window.descendants(&Selector::role("button"));
    captions
        .iter()
        .find_map(|caption| buttons.iter().find(|b| b.name() == *caption).cloned())
}

fn is_unwanted(title: &str, profile: &AppProfile) -> bool {
    let rules = &profile.popups;
    !title.is_empty()
        && rules.close_keywords.iter().any(|k| title.contains(k.as_str()))
        && !rules
            .protected_keywords
            .iter()
            .any(|k| title.contains(k.as_str()))
}

/// Close option and calculation dialogs, leaving the database dialog alone.
/// Returns how many windows were closed.
#[instrument(skip_all)]
pub async fn close_unwanted_popups(
    desktop: &Desktop,
    profile: &AppProfile,
) -> Result<usize, AutomationError> {
    let mut closed = 0;
    for round in 0..profile.limits.popup_rounds {
        let windows = match desktop.top_level_windows() {
            Ok(w) => w,
            Err(e) => {
                warn!("round {}: cannot list windows: {}", round + 1, e);
                pause(profile.timing.popup_round_ms).await;
                continue;
            }
        };

        for window in windows {
            let title = window.name();
            if !window.is_visible().unwrap_or(false) || !is_unwanted(&title, profile) {
                continue;
            }
            info!("Found popup: '{}' - closing", title);
            if let Err(e) = window.focus() {
                debug!("could not focus '{}': {}", title, e);
            }
            pause(profile.timing.after_focus_ms).await;

            let result = match find_button(&window, &profile.popups.cancel_buttons) {
                Some(cancel) => cancel.click(),
                None => window.close(),
            };
            match result {
                Ok(()) => closed += 1,
                Err(e) => warn!("Error closing '{}': {}", title, e),
            }
            pause(profile.timing.alert_round_ms).await;
        }
        pause(profile.timing.popup_round_ms).await;
    }
    info!("Popup cleanup finished, {} closed", closed);
    Ok(closed)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AlertKind {
    /// "Discard changes?" style prompt. Accepting it would throw work away.
    Discard,
    DuplicateName,
    Other,
}

#[derive(Debug, Clone)]
pub struct Alert {
    pub window: UIElement,
    pub text: String,
    pub kind: AlertKind,
}

pub fn classify_alert(text: &str, profile: &AppProfile) -> AlertKind {
    let lower = text.to_lowercase();
    let mentions = |markers: &[String]| {
        markers
            .iter()
            .any(|m| !m.is_empty() && lower.contains(&m.to_lowercase()))
    };
    if mentions(&profile.popups.discard_markers) {
        AlertKind::Discard
    } else if mentions(&profile.popups.duplicate_markers) {
        AlertKind::DuplicateName
    } else {
        AlertKind::Other
    }
}

/// The first visible top-level window titled exactly like the application.
pub fn inspect_alert(
    desktop: &Desktop,
    profile: &AppProfile,
) -> Result<Option<Alert>, AutomationError> {
    let window = desktop
        .top_level_windows()?
        .into_iter()
        .find(|w| w.name() == profile.app_title && w.is_visible().unwrap_or(false));

    Ok(window.map(|window| {
        let text = window.text_content();
        let kind = classify_alert(&text, profile);
        Alert { window, text, kind }
    }))
}

/// Cancel discard prompts so the dialog stays open; accept anything else.
pub async fn dismiss_alert(
    desktop: &Desktop,
    alert: &Alert,
    profile: &AppProfile,
) -> Result<(), AutomationError> {
    let preview: String = alert.text.chars().take(30).collect();
    info!("Popup detected ({:?}): '{}'", alert.kind, preview);

    if let Err(e) = alert.window.focus() {
        debug!("could not focus alert: {}", e);
    }
    match alert.kind {
        AlertKind::Discard => match find_button(&alert.window, &profile.popups.cancel_buttons) {
            Some(cancel) => cancel.click()?,
            None => desktop.send_keys(&profile.shortcuts.dismiss)?,
        },
        AlertKind::DuplicateName | AlertKind::Other => {
            desktop.send_keys(&profile.shortcuts.confirm)?
        }
    }
    pause(profile.timing.alert_round_ms).await;
    Ok(())
}

/// Handle up to `alert_rounds` alerts in a row. Returns the ones seen.
#[instrument(skip_all)]
pub async fn dismiss_alerts(
    desktop: &Desktop,
    profile: &AppProfile,
) -> Result<Vec<Alert>, AutomationError> {
    let mut seen = Vec::new();
    for _ in 0..profile.limits.alert_rounds {
        let Some(alert) = inspect_alert(desktop, profile)? else {
            break;
        };
        dismiss_alert(desktop, &alert, profile).await?;
        seen.push(alert);
    }
    Ok(seen)
}

/// Look for alerts raised by the edit to `field`. A duplicate-name alert is
/// dismissed and reported as `DuplicateName`.
pub async fn check_after_edit(
    desktop: &Desktop,
    profile: &AppProfile,
    field: &str,
) -> Result<(), AutomationError> {
    let alerts = dismiss_alerts(desktop, profile).await?;
    if let Some(dup) = alerts.iter().find(|a| a.kind == AlertKind::DuplicateName) {
        return Err(AutomationError::DuplicateName(format!(
            "'{field}': {}",
            dup.text
        )));
    }
    for alert in &alerts {
        warn!("alert after editing '{}': {}", field, alert.text);
    }
    Ok(())
}
