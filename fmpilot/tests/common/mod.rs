//! A scripted FileMaker Pro on the in-memory engine.
//!
//! The main window opens the Manage Database dialog on ctrl+shift+d. The
//! dialog's field grid only materializes `page` rows around the cursor, the
//! way the real virtualized list does, and is rebuilt after every key or
//! click. Save, create and delete change `FmModel::fields`; name clashes pop
//! up the application's alert box.

#![allow(dead_code)]

use fmpilot::keys::{Key, KeyChord, Modifier};
use fmpilot::platforms::mock::{MockEngine, MockEvent, MockNode, MockState, NodeId};
use fmpilot::{AppProfile, BatchRunner, Desktop, FieldRecord};
use std::sync::{Arc, Mutex, MutexGuard};

pub const PROCESS: &str = "FileMaker Pro.exe";
pub const MAIN_TITLE: &str = "FileMaker Pro Advanced - [Sales]";
pub const DIALOG_TITLE: &str = "データベースの管理 \"Sales\"";
pub const ALERT_TITLE: &str = "FileMaker Pro";

pub const FIELD_LIST: &str = "IDC_DEFFIELDS_FIELD_LIST";
pub const NAME_EDIT: &str = "IDC_DEFFIELDS_FIELDNAME_EDIT";
pub const TYPE_COMBO: &str = "IDC_FIELD_TYPE_MENU";
pub const COMMENT_EDIT: &str = "IDC_DEFFIELDS_FIELDCOMMENT_EDIT";
pub const SAVE_BUTTON: &str = "IDC_DEFFIELDS_SAVE_BUTTON";
pub const DELETE_BUTTON: &str = "IDC_DEFFIELDS_DELETE_BUTTON";

#[derive(Debug, Clone, Copy)]
pub struct DialogIds {
    pub dialog: NodeId,
    pub fields_tab: NodeId,
    pub grid: NodeId,
    pub name_edit: NodeId,
    pub type_combo: NodeId,
    pub comment_edit: NodeId,
    pub save_button: NodeId,
    pub delete_button: NodeId,
    pub ok_button: NodeId,
}

#[derive(Debug)]
pub struct FmModel {
    pub fields: Vec<FieldRecord>,
    pub cursor: Option<usize>,
    pub top: usize,
    /// Rows materialized at once.
    pub page: usize,
    /// Whether rows expose their selection state.
    pub report_selection: bool,
    pub save_enabled: bool,
    /// Open-dialog shortcuts swallowed before the dialog appears.
    pub ignore_open: usize,
    /// Delete confirmations that only react to a click.
    pub confirm_ignores_enter: bool,
    pub committed: bool,
    pub saves: usize,
    pub created: usize,
    /// Input lock state seen by each save.
    pub locked_during_save: Vec<bool>,
    pub fields_tab_selected: bool,
    pub dialog: Option<DialogIds>,
    pending_type: Option<String>,
    rows: Vec<(NodeId, usize)>,
}

impl FmModel {
    fn new(fields: &[(&str, &str)]) -> Self {
        Self {
            fields: fields
                .iter()
                .map(|(name, ty)| FieldRecord::new(name, ty))
                .collect(),
            cursor: None,
            top: 0,
            page: 8,
            report_selection: true,
            save_enabled: true,
            ignore_open: 0,
            confirm_ignores_enter: false,
            committed: false,
            saves: 0,
            created: 0,
            locked_during_save: Vec::new(),
            fields_tab_selected: false,
            dialog: None,
            pending_type: None,
            rows: Vec::new(),
        }
    }

    pub fn names(&self) -> Vec<String> {
        self.fields.iter().map(|f| f.name.clone()).collect()
    }

    pub fn field(&self, name: &str) -> Option<&FieldRecord> {
        self.fields.iter().find(|f| f.name == name)
    }

    fn name_taken(&self, name: &str, except: Option<usize>) -> bool {
        self.fields
            .iter()
            .enumerate()
            .any(|(i, f)| Some(i) != except && f.name.eq_ignore_ascii_case(name))
    }

    fn scroll_to_cursor(&mut self) {
        let Some(cursor) = self.cursor else {
            self.top = 0;
            return;
        };
        if cursor < self.top {
            self.top = cursor;
        } else if cursor >= self.top + self.page {
            self.top = cursor + 1 - self.page;
        }
    }

    fn move_cursor(&mut self, delta: usize) {
        if self.fields.is_empty() {
            self.cursor = None;
            return;
        }
        let last = self.fields.len() - 1;
        self.cursor = Some(match self.cursor {
            Some(c) => (c + delta).min(last),
            None => 0,
        });
        self.scroll_to_cursor();
    }
}

pub type Model = Arc<Mutex<FmModel>>;

fn lock(model: &Model) -> MutexGuard<'_, FmModel> {
    model.lock().unwrap_or_else(|p| p.into_inner())
}

fn type_label(key: char) -> Option<&'static str> {
    Some(match key {
        't' => "Text",
        'n' => "Number",
        'd' => "Date",
        'i' => "Time",
        'm' => "Timestamp",
        'r' => "Container",
        'c' => "Calculation",
        's' => "Summary",
        _ => return None,
    })
}

fn value_of(state: &MockState, id: NodeId) -> String {
    state.node(id).map(|n| n.value.clone()).unwrap_or_default()
}

fn set_value(state: &mut MockState, id: NodeId, value: &str) {
    if let Some(n) = state.node_mut(id) {
        n.value = value.to_string();
    }
}

/// Rebuild the materialized rows and the detail controls from the model.
fn render(state: &mut MockState, m: &mut FmModel) {
    let Some(ids) = m.dialog else { return };
    if !state.is_alive(ids.grid) {
        return;
    }
    state.clear_children(ids.grid);
    m.rows.clear();

    let end = (m.top + m.page).min(m.fields.len());
    for idx in m.top..end {
        let field = m.fields[idx].clone();
        let mut row = MockNode::new("DataItem", "");
        row.selected = m.report_selection && m.cursor == Some(idx);
        let row_id = state.add(ids.grid, row);
        for text in [&field.name, &field.field_type, &field.comment] {
            let cell = state.add(row_id, MockNode::new("Custom", ""));
            state.add(cell, MockNode::new("Text", text));
        }
        m.rows.push((row_id, idx));
    }

    let selected = m.cursor.and_then(|c| m.fields.get(c)).cloned();
    if let Some(n) = state.node_mut(ids.delete_button) {
        n.enabled = selected.is_some();
    }
    if let Some(n) = state.node_mut(ids.save_button) {
        n.enabled = m.save_enabled;
    }
    let field = selected.unwrap_or_default();
    set_value(state, ids.name_edit, &field.name);
    set_value(state, ids.type_combo, &field.field_type);
    set_value(state, ids.comment_edit, &field.comment);
    m.pending_type = None;
}

fn show_alert(state: &mut MockState, text: &str) -> NodeId {
    let root = state.root();
    let alert = state.add(
        root,
        MockNode::new("Window", ALERT_TITLE).with_process(PROCESS),
    );
    state.add(alert, MockNode::new("Text", text));
    let ok = state.add(alert, MockNode::new("Button", "OK"));
    state.on(
        alert,
        Arc::new(|state: &mut MockState, target: NodeId, event: &MockEvent| {
            let Some(alert) = state.window_of(target) else {
                return false;
            };
            match event {
                MockEvent::Key(k) if k.is_plain(Key::Enter) || k.is_plain(Key::Escape) => {
                    state.remove(alert);
                    true
                }
                MockEvent::Click => {
                    state.remove(alert);
                    true
                }
                _ => false,
            }
        }),
    );
    state.set_focus(ok);
    alert
}

fn save(state: &mut MockState, m: &mut FmModel) {
    let Some(ids) = m.dialog else { return };
    let Some(cursor) = m.cursor else { return };
    m.saves += 1;
    m.locked_during_save.push(state.input_blocked());

    let name = value_of(state, ids.name_edit);
    if m.name_taken(&name, Some(cursor)) {
        show_alert(state, "このフィールド名は既に存在します。別の名前を入力してください。");
        return;
    }
    let field_type = m
        .pending_type
        .clone()
        .unwrap_or_else(|| m.fields[cursor].field_type.clone());
    let comment = value_of(state, ids.comment_edit);
    m.fields[cursor] = FieldRecord {
        name,
        field_type,
        comment,
    };
    render(state, m);
}

fn create(state: &mut MockState, m: &mut FmModel) {
    let Some(ids) = m.dialog else { return };
    let name = value_of(state, ids.name_edit);
    if name.is_empty() {
        return;
    }
    if m.name_taken(&name, None) {
        show_alert(state, &format!("The field name \"{name}\" already exists."));
        return;
    }
    let field_type = m.pending_type.clone().unwrap_or_else(|| "Text".to_string());
    let opens_options = field_type == "Calculation" || field_type == "Summary";
    m.fields.push(FieldRecord {
        name: name.clone(),
        field_type,
        comment: value_of(state, ids.comment_edit),
    });
    m.created += 1;
    m.cursor = Some(m.fields.len() - 1);
    m.scroll_to_cursor();
    render(state, m);
    set_value(state, ids.name_edit, "");
    set_value(state, ids.comment_edit, "");

    if opens_options {
        let root = state.root();
        let options = state.add(
            root,
            MockNode::new("Window", &format!("計算式の指定 \"{name}\"")).with_process(PROCESS),
        );
        let ok = state.add(options, MockNode::new("Button", "OK"));
        state.add(options, MockNode::new("Button", "キャンセル"));
        state.on(
            options,
            Arc::new(|state: &mut MockState, target: NodeId, event: &MockEvent| {
                let Some(window) = state.window_of(target) else {
                    return false;
                };
                let accept = matches!(event, MockEvent::Key(k) if k.is_plain(Key::Enter))
                    || *event == MockEvent::Click;
                if accept {
                    state.remove(window);
                }
                accept
            }),
        );
        state.set_focus(ok);
    }
}

fn confirm_delete(state: &mut MockState, model: &Model) {
    let m = lock(model);
    let Some(cursor) = m.cursor else { return };
    let name = m.fields[cursor].name.clone();
    let ignores_enter = m.confirm_ignores_enter;
    drop(m);

    let root = state.root();
    let confirm = state.add(
        root,
        MockNode::new("Window", ALERT_TITLE).with_process(PROCESS),
    );
    state.add(
        confirm,
        MockNode::new("Text", &format!("フィールド「{name}」を完全に削除しますか？")),
    );
    let delete = state.add(confirm, MockNode::new("Button", "削除"));
    let cancel = state.add(confirm, MockNode::new("Button", "キャンセル"));

    let model = model.clone();
    state.on(
        confirm,
        Arc::new(move |state: &mut MockState, target: NodeId, event: &MockEvent| {
            let Some(window) = state.window_of(target) else {
                return false;
            };
            let accept = match event {
                MockEvent::Key(k) if k.is_plain(Key::Enter) => !ignores_enter,
                MockEvent::Click => target == delete,
                _ => false,
            };
            let reject = matches!(event, MockEvent::Key(k) if k.is_plain(Key::Escape))
                || (*event == MockEvent::Click && target == cancel);
            if !accept && !reject {
                return false;
            }
            state.remove(window);
            if accept {
                let mut m = lock(&model);
                if let Some(cursor) = m.cursor {
                    m.fields.remove(cursor);
                    m.cursor = if m.fields.is_empty() {
                        None
                    } else {
                        Some(cursor.min(m.fields.len() - 1))
                    };
                    m.scroll_to_cursor();
                }
                render(state, &mut m);
            }
            true
        }),
    );
    state.set_focus(delete);
}

/// Field index of the row containing `target`.
fn row_index(state: &MockState, rows: &[(NodeId, usize)], target: NodeId) -> Option<usize> {
    let mut current = Some(target);
    while let Some(id) = current {
        if let Some((_, idx)) = rows.iter().find(|(row, _)| *row == id) {
            return Some(*idx);
        }
        current = state.node(id).and_then(|n| n.parent());
    }
    None
}

fn build_dialog(state: &mut MockState, model: &Model, parent: NodeId, minimized: bool) -> DialogIds {
    let mut node = MockNode::new("Window", DIALOG_TITLE).with_process(PROCESS);
    node.minimized = minimized;
    let dialog = state.add(parent, node);
    state.add(dialog, MockNode::new("TabItem", "テーブル"));
    let fields_tab = state.add(dialog, MockNode::new("TabItem", "フィールド"));
    state.add(dialog, MockNode::new("TabItem", "リレーションシップ"));
    let grid = state.add(dialog, MockNode::new("DataGrid", "").with_id(FIELD_LIST));
    let name_edit = state.add(dialog, MockNode::new("Edit", "フィールド名").with_id(NAME_EDIT));
    let type_combo = state.add(dialog, MockNode::new("ComboBox", "タイプ").with_id(TYPE_COMBO));
    let comment_edit = state.add(dialog, MockNode::new("Edit", "コメント").with_id(COMMENT_EDIT));
    state.add(dialog, MockNode::new("Button", "作成"));
    let save_button = state.add(dialog, MockNode::new("Button", "保存").with_id(SAVE_BUTTON));
    let delete_button =
        state.add(dialog, MockNode::new("Button", "削除").with_id(DELETE_BUTTON));
    let ok_button = state.add(dialog, MockNode::new("Button", "OK"));
    state.add(dialog, MockNode::new("Button", "キャンセル"));

    let ids = DialogIds {
        dialog,
        fields_tab,
        grid,
        name_edit,
        type_combo,
        comment_edit,
        save_button,
        delete_button,
        ok_button,
    };

    let handler_model = model.clone();
    state.on(
        dialog,
        Arc::new(move |state: &mut MockState, target: NodeId, event: &MockEvent| {
            let mut m = lock(&handler_model);
            let row = row_index(state, &m.rows, target);
            let in_grid = target == ids.grid || row.is_some();

            match event {
                MockEvent::Click if target == ids.fields_tab => {
                    m.fields_tab_selected = true;
                    true
                }
                MockEvent::Click if row.is_some() => {
                    m.cursor = row;
                    render(state, &mut m);
                    true
                }
                MockEvent::Click if target == ids.save_button => {
                    save(state, &mut m);
                    true
                }
                MockEvent::Click if target == ids.delete_button => {
                    drop(m);
                    confirm_delete(state, &handler_model);
                    true
                }
                MockEvent::Click if target == ids.ok_button => {
                    m.committed = true;
                    state.remove(ids.dialog);
                    m.dialog = None;
                    true
                }
                MockEvent::Key(k) if in_grid => {
                    let page = m.page;
                    match k.main_key() {
                        Key::Home => {
                            m.cursor = None;
                            m.move_cursor(0);
                        }
                        Key::Down => m.move_cursor(1),
                        Key::PageDown => m.move_cursor(page),
                        _ => return false,
                    }
                    render(state, &mut m);
                    true
                }
                MockEvent::Key(k) if target == ids.type_combo => {
                    if let Key::Char(c) = k.main_key() {
                        if let Some(label) = type_label(c) {
                            m.pending_type = Some(label.to_string());
                            set_value(state, ids.type_combo, label);
                        }
                    }
                    true
                }
                MockEvent::Key(k) if *k == KeyChord::new([Modifier::Alt], Key::Char('a')) => {
                    save(state, &mut m);
                    true
                }
                MockEvent::Key(k)
                    if *k == KeyChord::new([Modifier::Alt, Modifier::Shift], Key::Char('e')) =>
                {
                    create(state, &mut m);
                    true
                }
                MockEvent::Key(k) if *k == KeyChord::new([Modifier::Alt], Key::Char('f')) => {
                    m.fields_tab_selected = true;
                    true
                }
                MockEvent::Key(k) if k.is_plain(Key::Enter) => {
                    if target == ids.dialog {
                        m.committed = true;
                        state.remove(ids.dialog);
                        m.dialog = None;
                    }
                    true
                }
                _ => false,
            }
        }),
    );

    let mut m = lock(model);
    m.dialog = Some(ids);
    render(state, &mut m);
    ids
}

pub struct FileMakerSim {
    pub engine: MockEngine,
    pub model: Model,
    pub main: NodeId,
}

impl FileMakerSim {
    /// Main window only; the dialog opens on the shortcut.
    pub fn new(fields: &[(&str, &str)]) -> Self {
        let engine = MockEngine::new();
        let model: Model = Arc::new(Mutex::new(FmModel::new(fields)));
        let main = {
            let mut state = engine.state();
            let root = state.root();
            let main = state.add(root, MockNode::new("Window", MAIN_TITLE).with_process(PROCESS));
            let handler_model = model.clone();
            state.on(
                main,
                Arc::new(move |state: &mut MockState, _target: NodeId, event: &MockEvent| {
                    let open = KeyChord::new([Modifier::Ctrl, Modifier::Shift], Key::Char('d'));
                    if *event != MockEvent::Key(open) {
                        return false;
                    }
                    {
                        let mut m = lock(&handler_model);
                        if m.dialog.is_some() {
                            return true;
                        }
                        if m.ignore_open > 0 {
                            m.ignore_open -= 1;
                            return true;
                        }
                    }
                    let root = state.root();
                    let ids = build_dialog(state, &handler_model, root, false);
                    state.set_focus(ids.dialog);
                    true
                }),
            );
            main
        };
        Self {
            engine,
            model,
            main,
        }
    }

    /// Main window plus an already open dialog.
    pub fn with_dialog(fields: &[(&str, &str)]) -> Self {
        let sim = Self::new(fields);
        sim.open_dialog();
        sim
    }

    pub fn open_dialog(&self) -> DialogIds {
        let mut state = self.engine.state();
        let root = state.root();
        build_dialog(&mut state, &self.model, root, false)
    }

    /// Open the dialog as a child window of the main window.
    pub fn open_dialog_inside_main(&self) -> DialogIds {
        let mut state = self.engine.state();
        build_dialog(&mut state, &self.model, self.main, false)
    }

    pub fn open_minimized_dialog(&self) -> DialogIds {
        let mut state = self.engine.state();
        let root = state.root();
        build_dialog(&mut state, &self.model, root, true)
    }

    pub fn desktop(&self) -> Desktop {
        Desktop::with_engine(Arc::new(self.engine.clone()))
    }

    pub fn profile() -> AppProfile {
        AppProfile::default().without_delays()
    }

    pub fn runner(&self) -> BatchRunner {
        BatchRunner::new(self.desktop(), Self::profile())
    }

    pub fn model(&self) -> MutexGuard<'_, FmModel> {
        lock(&self.model)
    }

    pub fn names(&self) -> Vec<String> {
        self.model().names()
    }

    /// A top-level window of the application with the given buttons.
    pub fn add_window(&self, title: &str, buttons: &[&str]) -> NodeId {
        let mut state = self.engine.state();
        let root = state.root();
        let window = state.add(root, MockNode::new("Window", title).with_process(PROCESS));
        let mut button_ids = Vec::new();
        for caption in buttons {
            button_ids.push(state.add(window, MockNode::new("Button", caption)));
        }
        if !button_ids.is_empty() {
            state.on(
                window,
                Arc::new(move |state: &mut MockState, target: NodeId, event: &MockEvent| {
                    if *event == MockEvent::Click && button_ids.contains(&target) {
                        if let Some(window) = state.window_of(target) {
                            state.remove(window);
                        }
                        return true;
                    }
                    false
                }),
            );
        }
        window
    }

    /// An application alert box showing `text`. Any button, Enter or
    /// Escape closes it.
    pub fn add_alert(&self, text: &str, buttons: &[&str]) -> NodeId {
        let mut state = self.engine.state();
        let root = state.root();
        let window = state.add(root, MockNode::new("Window", ALERT_TITLE).with_process(PROCESS));
        state.add(window, MockNode::new("Text", text));
        let button_ids: Vec<NodeId> = buttons
            .iter()
            .map(|caption| state.add(window, MockNode::new("Button", caption)))
            .collect();
        state.on(
            window,
            Arc::new(move |state: &mut MockState, target: NodeId, event: &MockEvent| {
                let close = match event {
                    MockEvent::Click => button_ids.contains(&target),
                    MockEvent::Key(k) => k.is_plain(Key::Enter) || k.is_plain(Key::Escape),
                    _ => false,
                };
                if close {
                    state.remove(window);
                }
                close
            }),
        );
        window
    }

    pub fn set_main_title(&self, title: &str) {
        if let Some(main) = self.engine.state().node_mut(self.main) {
            main.name = title.to_string();
        }
    }

    pub fn is_alive(&self, id: NodeId) -> bool {
        self.engine.state().is_alive(id)
    }

    pub fn key_count(&self, chord: &KeyChord) -> usize {
        self.engine.state().key_count(chord)
    }
}

/// `count` fields named `F01`, `F02`, ...
pub fn numbered_fields(count: usize) -> Vec<(String, String)> {
    (1..=count)
        .map(|i| (format!("F{i:02}"), "Text".to_string()))
        .collect()
}

pub fn as_refs(fields: &[(String, String)]) -> Vec<(&str, &str)> {
    fields
        .iter()
        .map(|(n, t)| (n.as_str(), t.as_str()))
        .collect()
}
