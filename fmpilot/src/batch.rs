//! Batch operations over the dialog. Each one holds the input lock and the
//! overlay status for its whole duration and releases both on every exit
//! path.

use crate::dialog::{
    ensure_dialog, find_priority_dialog, find_visible_dialog, select_fields_tab,
};
use crate::editor::{apply_fix, create_field, delete_first};
use crate::errors::AutomationError;
use crate::field_list::FieldGrid;
use crate::input_lock::InputLock;
use crate::model::{
    validate_fixes, CreateReport, FieldFix, FieldRecord, FixReport, ReadReport, ResetReport,
};
use crate::popups::{close_unwanted_popups, dismiss_alerts, find_button};
use crate::profile::AppProfile;
use crate::retry::pause;
use crate::status::{StatusFile, StatusSession};
use crate::{Desktop, UIElement};
use tracing::{error, info, instrument, warn};

pub struct BatchRunner {
    desktop: Desktop,
    profile: AppProfile,
    status: Option<StatusFile>,
    lock_input: bool,
}

impl BatchRunner {
    pub fn new(desktop: Desktop, profile: AppProfile) -> Self {
        Self {
            desktop,
            profile,
            status: None,
            lock_input: true,
        }
    }

    pub fn with_status_file(mut self, status: StatusFile) -> Self {
        self.status = Some(status);
        self
    }

    pub fn with_input_lock(mut self, lock_input: bool) -> Self {
        self.lock_input = lock_input;
        self
    }

    pub fn profile(&self) -> &AppProfile {
        &self.profile
    }

    pub fn desktop(&self) -> &Desktop {
        &self.desktop
    }

    fn lock(&self) -> InputLock {
        if self.lock_input {
            InputLock::acquire(&self.desktop)
        } else {
            InputLock::disabled(&self.desktop)
        }
    }

    fn session(&self) -> Option<StatusSession> {
        self.status.as_ref().map(StatusFile::session)
    }

    /// The dialog if it is already open, otherwise opened through the
    /// recovery routine.
    async fn dialog(&self) -> Result<UIElement, AutomationError> {
        match find_priority_dialog(&self.desktop, &self.profile)? {
            Some(dialog) => {
                dialog.activate_window()?;
                dialog.focus()?;
                Ok(dialog)
            }
            None => ensure_dialog(&self.desktop, &self.profile).await,
        }
    }

    async fn fields_tab(&self) -> Result<(UIElement, FieldGrid), AutomationError> {
        let dialog = self.dialog().await?;
        select_fields_tab(&self.desktop, &dialog, &self.profile).await?;
        let grid = FieldGrid::locate(&dialog, &self.profile)?;
        Ok((dialog, grid))
    }

    /// Open the dialog on the fields tab.
    #[instrument(skip_all)]
    pub async fn open_dialog(&self) -> Result<UIElement, AutomationError> {
        let dialog = ensure_dialog(&self.desktop, &self.profile).await?;
        select_fields_tab(&self.desktop, &dialog, &self.profile).await?;
        Ok(dialog)
    }

    #[instrument(skip_all)]
    pub async fn read_fields(&self) -> Result<ReadReport, AutomationError> {
        let session = self.session();
        if let Some(s) = &session {
            s.update("FileMakerからフィールドを読み取っています...");
        }
        let (_dialog, grid) = self.fields_tab().await?;
        let fields = grid.read_all(&self.profile).await?;
        if let Some(s) = &session {
            s.update(&format!("読み取り完了: {}件", fields.len()));
        }
        Ok(ReadReport {
            success: true,
            fields,
            error: None,
        })
    }

    /// Apply fixes one by one. A failing fix is recorded and skipped; a
    /// duplicate-name alert stops the batch. With `strict`, the current
    /// field names are read first and any name conflict refuses the batch.
    #[instrument(skip_all, fields(count = fixes.len()))]
    pub async fn apply_fixes(
        &self,
        fixes: &[FieldFix],
        strict: bool,
    ) -> Result<FixReport, AutomationError> {
        info!("=== Starting batch fix: {} fields ===", fixes.len());
        let _lock = self.lock();
        let session = self.session();
        let (dialog, grid) = self.fields_tab().await?;

        let existing: Vec<String> = if strict {
            grid.read_all(&self.profile)
                .await?
                .into_iter()
                .map(|f| f.name)
                .collect()
        } else {
            Vec::new()
        };
        let conflicts = validate_fixes(&existing, fixes);
        if !conflicts.is_empty() {
            if strict {
                return Err(AutomationError::InvalidArgument(format!(
                    "name conflicts: {}",
                    serde_json::to_string(&conflicts).unwrap_or_default()
                )));
            }
            warn!("fixes contain name conflicts: {:?}", conflicts);
        }

        let mut report = FixReport {
            total: fixes.len(),
            ..Default::default()
        };
        for (i, fix) in fixes.iter().enumerate() {
            if let Some(s) = &session {
                s.update(&format!("修正中: {} / {} ({})", i + 1, fixes.len(), fix.old_name));
            }
            match apply_fix(&self.desktop, &dialog, &grid, fix, &self.profile).await {
                Ok(()) => report.succeeded += 1,
                Err(e) if e.aborts_batch() => {
                    error!("aborting batch at '{}': {}", fix.old_name, e);
                    report.errors.push(fix.old_name.clone());
                    report.aborted = Some(e.to_string());
                    break;
                }
                Err(e) => {
                    warn!("Error fixing {}: {}", fix.old_name, e);
                    report.errors.push(fix.old_name.clone());
                }
            }
            pause(self.profile.timing.between_items_ms).await;
        }

        report.success = report.aborted.is_none();
        info!(
            "=== Batch fix complete: {}/{} succeeded ===",
            report.succeeded, report.total
        );
        Ok(report)
    }

    #[instrument(skip_all, fields(count = records.len()))]
    pub async fn create_fields(
        &self,
        records: &[FieldRecord],
    ) -> Result<CreateReport, AutomationError> {
        info!("--- Batch create: {} fields ---", records.len());
        let _lock = self.lock();
        let session = self.session();
        let (dialog, _grid) = self.fields_tab().await?;

        let mut report = CreateReport::default();
        for (i, record) in records.iter().enumerate() {
            if let Some(s) = &session {
                s.update(&format!("生成中: {} / {} ({})", i + 1, records.len(), record.name));
            }
            match create_field(&self.desktop, &dialog, record, &self.profile).await {
                Ok(()) => report.count += 1,
                Err(e) if e.aborts_batch() => {
                    error!("aborting batch at '{}': {}", record.name, e);
                    report.failed.push(record.name.clone());
                    report.aborted = Some(e.to_string());
                    break;
                }
                Err(e) => {
                    warn!("Error creating {}: {}", record.name, e);
                    report.failed.push(record.name.clone());
                }
            }
        }
        report.success = report.aborted.is_none();
        Ok(report)
    }

    /// Delete every field, top row first.
    #[instrument(skip_all)]
    pub async fn reset_fields(&self) -> Result<ResetReport, AutomationError> {
        let _lock = self.lock();
        let session = self.session();
        let (dialog, grid) = self.fields_tab().await?;

        let mut deleted = 0;
        let mut failures = 0;
        for _ in 0..self.profile.limits.max_deletions {
            match delete_first(&self.desktop, &dialog, &grid, &self.profile).await {
                Ok(Some(name)) => {
                    deleted += 1;
                    failures = 0;
                    if let Some(s) = &session {
                        s.update(&format!("削除中: {name}"));
                    }
                }
                Ok(None) => {
                    info!("All fields deleted.");
                    break;
                }
                Err(e) => {
                    warn!("delete failed: {}", e);
                    failures += 1;
                    if failures >= self.profile.limits.stall_limit {
                        break;
                    }
                }
            }
        }

        Ok(ResetReport {
            success: grid.visible_rows().is_empty(),
            deleted,
        })
    }

    /// Clear alerts, then press OK on the dialog so the schema changes are
    /// committed. A dialog that is already gone counts as success.
    #[instrument(skip_all)]
    pub async fn finalize(&self) -> Result<(), AutomationError> {
        info!("--- Finalize & save changes ---");
        dismiss_alerts(&self.desktop, &self.profile).await?;

        let Some(dialog) = find_visible_dialog(&self.desktop, &self.profile)? else {
            info!("dialog not found, nothing to finalize");
            return Ok(());
        };
        info!("Finalizing: {}", dialog.name());
        dialog.focus()?;

        match find_button(&dialog, &self.profile.popups.ok_buttons) {
            Some(ok) => {
                ok.click()?;
                info!("Clicked '{}'", ok.name());
            }
            None => {
                info!("OK button not found, falling back to {}", self.profile.shortcuts.confirm);
                self.desktop.send_keys(&self.profile.shortcuts.confirm)?;
            }
        }
        pause(self.profile.timing.after_save_ms).await;
        Ok(())
    }

    pub async fn close_popups(&self) -> Result<usize, AutomationError> {
        close_unwanted_popups(&self.desktop, &self.profile).await
    }
}
