mod common;

use common::{FileMakerSim, DIALOG_TITLE};
use fmpilot::dialog::{ensure_dialog, find_dialog, find_main_window, select_fields_tab};
use fmpilot::keys::{Key, KeyChord, Modifier};
use fmpilot::platforms::mock::{MockEngine, MockNode};
use fmpilot::{AutomationError, Desktop};
use std::sync::Arc;

fn open_chord() -> KeyChord {
    KeyChord::new([Modifier::Ctrl, Modifier::Shift], Key::Char('d'))
}

fn escape() -> KeyChord {
    KeyChord::key(Key::Escape)
}

#[tokio::test]
async fn opens_dialog_with_shortcut_without_escape() {
    let sim = FileMakerSim::new(&[("id", "Number")]);
    let desktop = sim.desktop();

    let dialog = ensure_dialog(&desktop, &FileMakerSim::profile())
        .await
        .expect("dialog should open");

    assert_eq!(dialog.name(), DIALOG_TITLE);
    assert_eq!(sim.key_count(&open_chord()), 1);
    assert_eq!(sim.key_count(&escape()), 0);
}

#[tokio::test]
async fn already_open_dialog_is_reused() {
    let sim = FileMakerSim::with_dialog(&[("id", "Number")]);
    let dialog = ensure_dialog(&sim.desktop(), &FileMakerSim::profile())
        .await
        .unwrap();

    assert_eq!(dialog.name(), DIALOG_TITLE);
    assert_eq!(sim.key_count(&open_chord()), 0);
}

#[tokio::test]
async fn retries_send_escape_before_the_shortcut() {
    let sim = FileMakerSim::new(&[("id", "Number")]);
    sim.model().ignore_open = 2;

    let dialog = ensure_dialog(&sim.desktop(), &FileMakerSim::profile())
        .await
        .expect("third attempt should succeed");

    assert_eq!(dialog.name(), DIALOG_TITLE);
    assert_eq!(sim.key_count(&open_chord()), 3);
    assert_eq!(sim.key_count(&escape()), 2);
}

#[tokio::test]
async fn gives_up_after_the_attempt_limit() {
    let sim = FileMakerSim::new(&[("id", "Number")]);
    sim.model().ignore_open = 100;
    let profile = FileMakerSim::profile();

    let err = ensure_dialog(&sim.desktop(), &profile).await.unwrap_err();

    assert!(matches!(err, AutomationError::DialogNotFound(_)), "{err:?}");
    assert_eq!(
        sim.key_count(&open_chord()),
        profile.limits.ensure_attempts as usize
    );
}

#[tokio::test]
async fn missing_application_is_reported_as_dialog_not_found() {
    let desktop = Desktop::with_engine(Arc::new(MockEngine::new()));
    let err = ensure_dialog(&desktop, &FileMakerSim::profile())
        .await
        .unwrap_err();
    assert!(matches!(err, AutomationError::DialogNotFound(_)), "{err:?}");
}

#[tokio::test]
async fn minimized_dialog_is_restored() {
    let sim = FileMakerSim::new(&[("id", "Number")]);
    let ids = sim.open_minimized_dialog();

    let dialog = ensure_dialog(&sim.desktop(), &FileMakerSim::profile())
        .await
        .unwrap();

    assert_eq!(dialog.object_id(), ids.dialog);
    assert!(dialog.is_visible().unwrap());
}

#[tokio::test]
async fn main_window_with_a_database_title_is_not_taken_for_the_dialog() {
    let sim = FileMakerSim::new(&[("id", "Number")]);
    sim.set_main_title("Customer Database");

    let dialog = ensure_dialog(&sim.desktop(), &FileMakerSim::profile())
        .await
        .unwrap();

    assert_eq!(dialog.name(), DIALOG_TITLE);
    assert_ne!(dialog.object_id(), sim.main);
    assert_eq!(sim.key_count(&open_chord()), 1);
}

#[test]
fn fallback_search_skips_the_main_window() {
    let sim = FileMakerSim::new(&[("id", "Number")]);
    sim.set_main_title("会員の管理");

    let found = find_dialog(&sim.desktop(), &FileMakerSim::profile()).unwrap();
    assert!(found.is_none(), "{:?}", found.map(|w| w.name()));

    let ids = sim.open_dialog_inside_main();
    let found = find_dialog(&sim.desktop(), &FileMakerSim::profile())
        .unwrap()
        .unwrap();
    assert_eq!(found.object_id(), ids.dialog);
}

#[test]
fn dialog_owned_by_the_main_window_is_found() {
    let sim = FileMakerSim::new(&[("id", "Number")]);
    let ids = sim.open_dialog_inside_main();

    let found = find_dialog(&sim.desktop(), &FileMakerSim::profile())
        .unwrap()
        .expect("child dialog");
    assert_eq!(found.object_id(), ids.dialog);
}

#[test]
fn priority_child_beats_fallback_top_level() {
    let sim = FileMakerSim::new(&[("id", "Number")]);
    let decoy = sim.add_window("Database Info", &[]);
    let ids = sim.open_dialog_inside_main();

    let found = find_dialog(&sim.desktop(), &FileMakerSim::profile())
        .unwrap()
        .unwrap();
    assert_eq!(found.object_id(), ids.dialog);
    assert_ne!(found.object_id(), decoy);
}

#[test]
fn fallback_title_is_used_when_nothing_better_exists() {
    let sim = FileMakerSim::new(&[("id", "Number")]);
    sim.add_window("レイアウトの管理", &[]);
    let fallback = sim.add_window("Database Info", &[]);

    let found = find_dialog(&sim.desktop(), &FileMakerSim::profile())
        .unwrap()
        .unwrap();
    assert_eq!(found.object_id(), fallback);
}

#[test]
fn windows_of_other_processes_are_considered_when_the_app_has_none() {
    let engine = MockEngine::new();
    let dialog = {
        let mut state = engine.state();
        let root = state.root();
        state.add(
            root,
            MockNode::new("Window", "Manage Database for \"Invoices\"").with_process("fmpa.exe"),
        )
    };
    let desktop = Desktop::with_engine(Arc::new(engine));

    let found = find_dialog(&desktop, &FileMakerSim::profile())
        .unwrap()
        .unwrap();
    assert_eq!(found.object_id(), dialog);
}

#[test]
fn main_window_is_never_the_dialog() {
    let sim = FileMakerSim::with_dialog(&[]);
    let main = find_main_window(&sim.desktop(), &FileMakerSim::profile())
        .unwrap()
        .unwrap();
    assert_eq!(main.object_id(), sim.main);
}

#[tokio::test]
async fn fields_tab_is_clicked() {
    let sim = FileMakerSim::new(&[("id", "Number")]);
    let desktop = sim.desktop();
    let profile = FileMakerSim::profile();
    let dialog = ensure_dialog(&desktop, &profile).await.unwrap();

    select_fields_tab(&desktop, &dialog, &profile).await.unwrap();

    assert!(sim.model().fields_tab_selected);
    assert_eq!(
        sim.key_count(&KeyChord::new([Modifier::Alt], Key::Char('f'))),
        0
    );
}

#[tokio::test]
async fn fields_tab_falls_back_to_shortcut() {
    let sim = FileMakerSim::new(&[("id", "Number")]);
    let desktop = sim.desktop();
    let mut profile = FileMakerSim::profile();
    profile.dialog.fields_tab = "Fields".to_string();
    let dialog = ensure_dialog(&desktop, &profile).await.unwrap();

    select_fields_tab(&desktop, &dialog, &profile).await.unwrap();

    assert!(sim.model().fields_tab_selected);
    assert_eq!(
        sim.key_count(&KeyChord::new([Modifier::Alt], Key::Char('f'))),
        1
    );
}
