//! The field grid of the dialog.
//!
//! The grid is virtualized: only the rows currently scrolled into view exist
//! in the accessibility tree. Reading and selecting therefore move through
//! the list with the keyboard and rescan after every step.

use crate::errors::AutomationError;
use crate::model::FieldRecord;
use crate::profile::AppProfile;
use crate::retry::pause;
use crate::selector::{roles_equal, Selector};
use crate::UIElement;
use std::collections::HashSet;
use tracing::{debug, info, instrument};

#[derive(Debug, Clone)]
pub struct FieldRow {
    pub record: FieldRecord,
    pub element: UIElement,
    pub selected: bool,
}

#[derive(Debug, Clone)]
pub struct FieldGrid {
    element: UIElement,
}

fn cell_text(cell: Option<&UIElement>) -> String {
    cell.and_then(|c| c.first_descendant(&Selector::role("text")))
        .map(|t| t.name().trim().to_string())
        .unwrap_or_default()
}

/// What the list shows right now; used to notice when keys stop moving it.
#[derive(Debug, PartialEq, Eq)]
struct ViewSignature {
    selected: Option<String>,
    names: Vec<String>,
}

impl FieldGrid {
    /// The grid with the profile's automation id, else the first data grid
    /// in the dialog.
    pub fn locate(dialog: &UIElement, profile: &AppProfile) -> Result<Self, AutomationError> {
        let by_id = dialog
            .descendants(&Selector::native_id(&profile.controls.field_list))
            .into_iter()
            .find(|el| roles_equal(&el.role(), "datagrid"));
        let element = match by_id {
            Some(el) => el,
            None => {
                debug!(
                    "'{}' not found, falling back to the first data grid",
                    profile.controls.field_list
                );
                dialog
                    .first_descendant(&Selector::role("datagrid"))
                    .ok_or_else(|| {
                        AutomationError::ElementNotFound(format!(
                            "field list '{}' in '{}'",
                            profile.controls.field_list,
                            dialog.name()
                        ))
                    })?
            }
        };
        Ok(Self { element })
    }

    pub fn element(&self) -> &UIElement {
        &self.element
    }

    /// Rows currently materialized, top to bottom. Rows without a name are
    /// skipped.
    pub fn visible_rows(&self) -> Vec<FieldRow> {
        self.element
            .descendants(&Selector::role("dataitem"))
            .into_iter()
            .filter_map(|item| {
                let cells = item.children().unwrap_or_default();
                let name = cell_text(cells.first());
                if name.is_empty() {
                    return None;
                }
                let record = FieldRecord {
                    name,
                    field_type: cell_text(cells.get(1)),
                    comment: cell_text(cells.get(2)),
                };
                let selected = item.is_selected().unwrap_or(false);
                Some(FieldRow {
                    record,
                    element: item,
                    selected,
                })
            })
            .collect()
    }

    pub fn find_visible(&self, name: &str) -> Option<FieldRow> {
        self.visible_rows()
            .into_iter()
            .find(|row| row.record.name == name)
    }

    fn signature(rows: &[FieldRow]) -> ViewSignature {
        ViewSignature {
            selected: rows
                .iter()
                .find(|r| r.selected)
                .map(|r| r.record.name.clone()),
            names: rows.iter().map(|r| r.record.name.clone()).collect(),
        }
    }

    /// Every field in list order, paging down until nothing new shows up.
    #[instrument(skip_all)]
    pub async fn read_all(&self, profile: &AppProfile) -> Result<Vec<FieldRecord>, AutomationError> {
        let timing = &profile.timing;
        let limits = &profile.limits;

        self.element.press_key(&profile.shortcuts.list_home)?;
        pause(timing.list_step_ms).await;

        let mut seen = HashSet::new();
        let mut fields = Vec::new();
        let mut collect = |rows: Vec<FieldRow>| {
            let mut added = 0;
            for row in rows {
                if seen.insert(row.record.name.clone()) {
                    fields.push(row.record);
                    added += 1;
                }
            }
            added
        };

        collect(self.visible_rows());
        let mut stalls = 0;
        for _ in 0..limits.max_scroll_steps {
            self.element.press_key(&profile.shortcuts.list_page)?;
            pause(timing.list_step_ms).await;
            if collect(self.visible_rows()) == 0 {
                stalls += 1;
                if stalls >= limits.stall_limit {
                    break;
                }
            } else {
                stalls = 0;
            }
        }

        info!("Read {} fields", fields.len());
        Ok(fields)
    }

    /// Click the row named `name`, scrolling one row at a time until it is
    /// materialized.
    #[instrument(skip(self, profile))]
    pub async fn select(&self, name: &str, profile: &AppProfile) -> Result<FieldRow, AutomationError> {
        let timing = &profile.timing;
        let limits = &profile.limits;

        if let Some(row) = self.find_visible(name) {
            return self.click_row(row, profile).await;
        }

        self.element.press_key(&profile.shortcuts.list_home)?;
        pause(timing.list_step_ms).await;

        let mut rows = self.visible_rows();
        let mut last = Self::signature(&rows);
        let mut stalls = 0;
        for step in 0..limits.max_scroll_steps {
            if let Some(row) = rows.into_iter().find(|r| r.record.name == name) {
                debug!("'{}' visible after {} steps", name, step);
                return self.click_row(row, profile).await;
            }

            self.element.press_key(&profile.shortcuts.list_step)?;
            pause(timing.list_step_ms).await;

            rows = self.visible_rows();
            let current = Self::signature(&rows);
            // Without a reported selection, the view only moves once the
            // cursor passes the last visible row.
            let allowed = if current.selected.is_none() {
                limits.stall_limit as usize + current.names.len()
            } else {
                limits.stall_limit as usize
            };
            if current == last {
                stalls += 1;
                if stalls >= allowed {
                    debug!("list stopped moving after {} steps", step + 1);
                    break;
                }
            } else {
                stalls = 0;
                last = current;
            }
        }

        if let Some(row) = rows.into_iter().find(|r| r.record.name == name) {
            return self.click_row(row, profile).await;
        }
        Err(AutomationError::FieldNotFound(name.to_string()))
    }

    async fn click_row(&self, row: FieldRow, profile: &AppProfile) -> Result<FieldRow, AutomationError> {
        row.element.click()?;
        pause(profile.timing.after_select_ms).await;
        Ok(row)
    }
}
