//! Finding, opening and recovering the target dialog.

use crate::errors::AutomationError;
use crate::profile::{AppProfile, DialogRules};
use crate::retry::{pause, retry_bounded};
use crate::selector::Selector;
use crate::{Desktop, UIElement};
use tracing::{debug, info, instrument, warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TitleMatch {
    Priority,
    Fallback,
}

/// Priority keywords always win; fallback keywords count only when no
/// exclude keyword is present.
pub fn classify_title(title: &str, rules: &DialogRules) -> Option<TitleMatch> {
    let contains_any = |keywords: &[String]| {
        keywords
            .iter()
            .any(|k| !k.is_empty() && title.contains(k.as_str()))
    };
    if contains_any(&rules.priority) {
        Some(TitleMatch::Priority)
    } else if contains_any(&rules.fallback) && !contains_any(&rules.exclude) {
        Some(TitleMatch::Fallback)
    } else {
        None
    }
}

/// Windows of the target process, or every top-level window when the
/// process has none.
fn candidate_windows(
    desktop: &Desktop,
    profile: &AppProfile,
) -> Result<Vec<UIElement>, AutomationError> {
    let windows = desktop.application_windows(&profile.process_name)?;
    if !windows.is_empty() {
        return Ok(windows);
    }
    debug!(
        "no windows for process '{}', scanning all top-level windows",
        profile.process_name
    );
    desktop.top_level_windows()
}

/// First window whose title matches one of `wanted`, searching top-level
/// windows before their child windows and earlier kinds before later ones.
/// `skip` is never picked, though its child windows are searched.
pub fn pick_dialog(
    windows: &[UIElement],
    rules: &DialogRules,
    wanted: &[TitleMatch],
    skip: Option<&UIElement>,
) -> Option<UIElement> {
    let child_windows: Vec<UIElement> = windows
        .iter()
        .flat_map(|w| {
            w.children_matching(&Selector::role("window"))
                .unwrap_or_default()
        })
        .collect();

    for kind in wanted {
        for pool in [windows, child_windows.as_slice()] {
            if let Some(found) = pool
                .iter()
                .filter(|w| Some(*w) != skip)
                .find(|w| classify_title(&w.name(), rules) == Some(*kind))
            {
                return Some(found.clone());
            }
        }
    }
    None
}

/// The dialog by priority or fallback title. The application's main window
/// is never returned, whatever its title.
pub fn find_dialog(
    desktop: &Desktop,
    profile: &AppProfile,
) -> Result<Option<UIElement>, AutomationError> {
    let windows = candidate_windows(desktop, profile)?;
    let main = find_main_window(desktop, profile)?;
    Ok(pick_dialog(
        &windows,
        &profile.dialog,
        &[TitleMatch::Priority, TitleMatch::Fallback],
        main.as_ref(),
    ))
}

/// The dialog by priority title only. Recovery and every edit go through
/// this one.
pub fn find_priority_dialog(
    desktop: &Desktop,
    profile: &AppProfile,
) -> Result<Option<UIElement>, AutomationError> {
    let windows = candidate_windows(desktop, profile)?;
    Ok(pick_dialog(
        &windows,
        &profile.dialog,
        &[TitleMatch::Priority],
        None,
    ))
}

/// A visible top-level window whose title carries a priority keyword.
pub fn find_visible_dialog(
    desktop: &Desktop,
    profile: &AppProfile,
) -> Result<Option<UIElement>, AutomationError> {
    Ok(desktop.top_level_windows()?.into_iter().find(|w| {
        w.is_visible().unwrap_or(false)
            && classify_title(&w.name(), &profile.dialog) == Some(TitleMatch::Priority)
    }))
}

/// The application's main window: its first titled window that is not the
/// dialog, else any top-level window whose title contains the app title.
pub fn find_main_window(
    desktop: &Desktop,
    profile: &AppProfile,
) -> Result<Option<UIElement>, AutomationError> {
    let is_dialog =
        |w: &UIElement| classify_title(&w.name(), &profile.dialog) == Some(TitleMatch::Priority);

    let own = desktop.application_windows(&profile.process_name)?;
    if let Some(main) = own.into_iter().find(|w| !w.name().is_empty() && !is_dialog(w)) {
        return Ok(Some(main));
    }

    Ok(desktop
        .top_level_windows()?
        .into_iter()
        .find(|w| w.name().contains(profile.app_title.as_str()) && !is_dialog(w)))
}

/// Make sure the dialog is open and focused, opening it with the shortcut
/// when needed.
#[instrument(skip_all)]
pub async fn ensure_dialog(
    desktop: &Desktop,
    profile: &AppProfile,
) -> Result<UIElement, AutomationError> {
    let timing = &profile.timing;
    let found = retry_bounded(
        "ensure dialog",
        profile.limits.ensure_attempts,
        timing.attempt_backoff_ms,
        |attempt| async move {
            if let Some(dialog) = find_priority_dialog(desktop, profile)? {
                dialog.activate_window()?;
                dialog.focus()?;
                info!("Found and focused '{}'", dialog.name());
                return Ok(Some(dialog));
            }

            let Some(main) = find_main_window(desktop, profile)? else {
                return Err(AutomationError::ElementNotFound(format!(
                    "main window of '{}'",
                    profile.app_title
                )));
            };
            debug!("main window: '{}'", main.name());

            if attempt > 0 {
                info!("Sending {} to clear obstructions", profile.shortcuts.dismiss);
                if let Err(e) = main.activate_window() {
                    debug!("could not focus main window: {}", e);
                }
                pause(timing.after_focus_ms).await;
                desktop.send_keys(&profile.shortcuts.dismiss)?;
                pause(timing.after_escape_ms).await;
            }

            info!("Sending {} to open the dialog", profile.shortcuts.open_dialog);
            main.activate_window()?;
            pause(timing.after_focus_ms).await;
            desktop.send_keys(&profile.shortcuts.open_dialog)?;
            pause(timing.after_open_dialog_ms).await;

            match find_priority_dialog(desktop, profile)? {
                Some(dialog) => {
                    dialog.focus()?;
                    Ok(Some(dialog))
                }
                None => Ok(None),
            }
        },
    )
    .await;

    match found {
        Ok(Some(dialog)) => Ok(dialog),
        Ok(None) => Err(AutomationError::DialogNotFound(format!(
            "no window matching {:?} after {} attempts",
            profile.dialog.priority, profile.limits.ensure_attempts
        ))),
        Err(e) => {
            warn!("giving up on the dialog: {}", e);
            Err(AutomationError::DialogNotFound(e.to_string()))
        }
    }
}

/// Bring up the tab that shows the field grid.
#[instrument(skip_all)]
pub async fn select_fields_tab(
    desktop: &Desktop,
    dialog: &UIElement,
    profile: &AppProfile,
) -> Result<(), AutomationError> {
    let tab = dialog.first_descendant(&Selector::role_named(
        "tabitem",
        &profile.dialog.fields_tab,
    ));
    match tab {
        Some(tab) => {
            debug!("clicking tab '{}'", tab.name());
            tab.click()?;
        }
        None => {
            debug!("tab '{}' not found, using shortcut", profile.dialog.fields_tab);
            dialog.focus()?;
            desktop.send_keys(&profile.shortcuts.fields_tab)?;
        }
    }
    pause(profile.timing.after_tab_ms).await;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn priority_beats_exclusions() {
        let rules = DialogRules::default();
        assert_eq!(
            classify_title("データベースの管理 \"Sales\"", &rules),
            Some(TitleMatch::Priority)
        );
        assert_eq!(
            classify_title("Manage Database for \"Layout Test\"", &rules),
            Some(TitleMatch::Priority)
        );
    }

    #[test]
    fn fallback_respects_exclusions() {
        let rules = DialogRules::default();
        assert_eq!(
            classify_title("Database Options", &rules),
            Some(TitleMatch::Fallback)
        );
        assert_eq!(classify_title("レイアウトの管理", &rules), None);
        assert_eq!(classify_title("Script Workspace Database", &rules), None);
        assert_eq!(classify_title("FileMaker Pro", &rules), None);
    }
}
