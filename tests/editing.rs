//! Editor session behaviour: history, debounced saves, read-only sessions.

use std::sync::Arc;
use std::time::Duration;

use canvaskeep::autosave::SAVE_FAILED;
use canvaskeep::codec;
use canvaskeep::scene::{LockFlags, Scene, ShapeKind};
use canvaskeep::session::{LOAD_FAILED, REDO_FAILED, UNDO_FAILED};
use canvaskeep::{
    AccessMode, DocumentLink, EditorConfig, EditorSession, MemorySurface, SceneSurface, Tool,
};
use canvaskeep_store::{DocumentRecord, DocumentStore, MemoryStore};

const DOC: &str = "doc-1";

async fn open(store: &Arc<MemoryStore>, link: &str) -> EditorSession<MemorySurface> {
    let gateway: Arc<dyn DocumentStore> = store.clone();
    EditorSession::open(
        DocumentLink::parse(link).unwrap(),
        gateway,
        MemorySurface::new(),
        EditorConfig::default(),
    )
    .await
    .unwrap()
}

fn seed(store: &MemoryStore, scene: &Scene) {
    let snapshot = codec::encode(scene).unwrap();
    store.insert(DOC, DocumentRecord::new(snapshot.to_value()));
}

fn scene_of(shapes: &[ShapeKind]) -> Scene {
    let mut scene = Scene::empty();
    scene.elements.extend(shapes.iter().map(|s| s.build()));
    scene
}

async fn settle() {
    tokio::time::sleep(Duration::from_millis(600)).await;
}

// --- Baseline ---

#[tokio::test(start_paused = true)]
async fn new_document_starts_with_one_baseline() {
    let store = Arc::new(MemoryStore::new());
    let session = open(&store, DOC).await;

    assert_eq!(session.history().undo_stack().len(), 1);
    assert!(session.history().redo_stack().is_empty());
    assert!(session.surface().scene().is_empty());
    assert!(session.notices().current().is_none());
}

#[tokio::test(start_paused = true)]
async fn loading_does_not_record_history_or_save() {
    let store = Arc::new(MemoryStore::new());
    seed(&store, &scene_of(&[ShapeKind::Rectangle, ShapeKind::Circle]));

    let session = open(&store, DOC).await;
    assert_eq!(session.surface().scene().len(), 2);
    assert_eq!(session.history().undo_stack().len(), 1);
    assert_eq!(
        session.history().current().unwrap(),
        &codec::encode(session.surface().scene()).unwrap()
    );

    settle().await;
    assert_eq!(store.write_count(), 0);
    assert!(!session.autosave().pending());
}

#[tokio::test(start_paused = true)]
async fn failed_load_reports_and_starts_empty() {
    let store = Arc::new(MemoryStore::new());
    seed(&store, &scene_of(&[ShapeKind::Rectangle]));
    store.set_fail_reads(true);

    let session = open(&store, DOC).await;
    assert!(session.surface().scene().is_empty());
    assert_eq!(session.history().undo_stack().len(), 1);
    assert_eq!(session.notices().current().as_deref(), Some(LOAD_FAILED));

    tokio::time::sleep(Duration::from_secs(4)).await;
    assert!(session.notices().current().is_none());
}

// --- Undo / redo ---

#[tokio::test(start_paused = true)]
async fn undo_then_redo_restores_each_state() {
    let store = Arc::new(MemoryStore::new());
    let mut session = open(&store, DOC).await;

    session.add_shape(ShapeKind::Rectangle).unwrap();
    let after_first = session.surface().scene().clone();
    session.add_shape(ShapeKind::Circle).unwrap();
    let after_second = session.surface().scene().clone();
    assert_eq!(session.history().undo_stack().len(), 3);

    assert!(session.undo().await.unwrap());
    assert_eq!(session.surface().scene(), &after_first);
    assert_eq!(session.history().undo_stack().len(), 2);
    assert_eq!(session.history().redo_stack().len(), 1);

    assert!(session.redo().await.unwrap());
    assert_eq!(session.surface().scene(), &after_second);
    assert_eq!(session.history().undo_stack().len(), 3);
    assert!(session.history().redo_stack().is_empty());
}

#[tokio::test(start_paused = true)]
async fn undo_at_baseline_is_a_no_op() {
    let store = Arc::new(MemoryStore::new());
    let mut session = open(&store, DOC).await;

    assert!(!session.undo().await.unwrap());
    assert!(!session.redo().await.unwrap());
    assert_eq!(store.write_count(), 0);
}

#[tokio::test(start_paused = true)]
async fn new_edit_discards_redo() {
    let store = Arc::new(MemoryStore::new());
    let mut session = open(&store, DOC).await;

    session.add_shape(ShapeKind::Rectangle).unwrap();
    session.undo().await.unwrap();
    assert_eq!(session.history().redo_count(), 1);

    session.add_shape(ShapeKind::Text).unwrap();
    assert_eq!(session.history().redo_count(), 0);
    assert!(!session.redo().await.unwrap());
}

#[tokio::test(start_paused = true)]
async fn replay_events_are_not_captured() {
    let store = Arc::new(MemoryStore::new());
    let mut session = open(&store, DOC).await;
    for shape in [ShapeKind::Rectangle, ShapeKind::Circle, ShapeKind::Text] {
        session.add_shape(shape).unwrap();
    }

    session.undo().await.unwrap();
    assert!(!session.history().is_replaying());
    assert_eq!(session.history().undo_stack().len(), 3);

    // Nothing left over for the next drain either
    assert_eq!(session.process_events().unwrap(), 0);
    assert_eq!(session.history().undo_stack().len(), 3);
}

#[tokio::test(start_paused = true)]
async fn undo_writes_immediately_and_supersedes_pending_save() {
    let store = Arc::new(MemoryStore::new());
    let mut session = open(&store, DOC).await;

    session.add_shape(ShapeKind::Rectangle).unwrap();
    session.add_shape(ShapeKind::Circle).unwrap();
    settle().await;
    assert_eq!(store.write_count(), 1);

    session.add_shape(ShapeKind::Text).unwrap();
    assert!(session.autosave().pending());

    session.undo().await.unwrap();
    assert_eq!(store.write_count(), 2);
    let record = store.record(DOC).unwrap();
    assert_eq!(&record.canvas, session.history().current().unwrap().value());
    assert!(!session.autosave().pending());

    settle().await;
    assert_eq!(store.write_count(), 2);
}

#[tokio::test(start_paused = true)]
async fn redo_writes_immediately() {
    let store = Arc::new(MemoryStore::new());
    let mut session = open(&store, DOC).await;

    session.add_shape(ShapeKind::Rectangle).unwrap();
    session.add_shape(ShapeKind::Circle).unwrap();
    settle().await;
    assert_eq!(store.write_count(), 1);

    session.undo().await.unwrap();
    assert_eq!(store.write_count(), 2);

    assert!(session.redo().await.unwrap());
    assert_eq!(store.write_count(), 3);
    let record = store.record(DOC).unwrap();
    assert_eq!(&record.canvas, session.history().current().unwrap().value());
    assert_eq!(codec::decode(&codec::SceneSnapshot::from_value(record.canvas)).unwrap().len(), 2);
    assert!(!session.autosave().pending());

    settle().await;
    assert_eq!(store.write_count(), 3);
}

#[tokio::test(start_paused = true)]
async fn failed_undo_reports_and_still_writes() {
    let store = Arc::new(MemoryStore::new());
    let mut session = open(&store, DOC).await;
    session.add_shape(ShapeKind::Rectangle).unwrap();
    settle().await;

    session.surface_mut().reject_next_apply();
    assert!(!session.undo().await.unwrap());
    assert_eq!(session.notices().current().as_deref(), Some(UNDO_FAILED));
    assert!(!session.history().is_replaying());
    assert_eq!(store.write_count(), 2);
}

#[tokio::test(start_paused = true)]
async fn failed_redo_drops_the_entry() {
    let store = Arc::new(MemoryStore::new());
    let mut session = open(&store, DOC).await;
    session.add_shape(ShapeKind::Rectangle).unwrap();
    session.undo().await.unwrap();

    session.surface_mut().reject_next_apply();
    assert!(!session.redo().await.unwrap());
    assert_eq!(session.notices().current().as_deref(), Some(REDO_FAILED));
    assert_eq!(session.history().undo_stack().len(), 1);
    assert_eq!(session.history().redo_count(), 0);
    assert!(!session.history().is_replaying());
}

#[tokio::test(start_paused = true)]
async fn pen_tool_survives_undo() {
    let store = Arc::new(MemoryStore::new());
    let mut session = open(&store, DOC).await;

    assert!(session.enable_pen());
    session.complete_stroke(&[(0.0, 0.0), (5.0, 5.0)]).unwrap();
    session.complete_stroke(&[(10.0, 0.0), (15.0, 5.0)]).unwrap();
    session.undo().await.unwrap();

    assert_eq!(session.tool(), Tool::Pen);
    assert!(session.surface().is_drawing());
    assert_eq!(session.surface().scene().len(), 1);
}

// --- Debounced saves ---

#[tokio::test(start_paused = true)]
async fn burst_of_edits_saves_once_with_last_state() {
    let store = Arc::new(MemoryStore::new());
    let mut session = open(&store, DOC).await;

    for _ in 0..10 {
        session.add_shape(ShapeKind::Rectangle).unwrap();
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    assert_eq!(store.write_count(), 0);
    assert!(session.status().saving);

    settle().await;
    assert_eq!(store.write_count(), 1);
    let record = store.record(DOC).unwrap();
    let saved = codec::SceneSnapshot::from_value(record.canvas);
    assert_eq!(saved.object_count(), 10);
    assert_eq!(&saved, session.history().current().unwrap());
    assert!(!session.status().saving);
}

#[tokio::test(start_paused = true)]
async fn stroke_is_captured_once() {
    let store = Arc::new(MemoryStore::new());
    let mut session = open(&store, DOC).await;

    session.enable_pen();
    session
        .complete_stroke(&[(0.0, 0.0), (10.0, 10.0), (20.0, 0.0)])
        .unwrap()
        .unwrap();
    assert_eq!(session.history().undo_stack().len(), 2);
}

#[tokio::test(start_paused = true)]
async fn surface_edits_are_picked_up_by_process_events() {
    let store = Arc::new(MemoryStore::new());
    let mut session = open(&store, DOC).await;

    session.surface_mut().add_element(ShapeKind::Circle.build());
    session.surface_mut().add_element(ShapeKind::Circle.build());
    assert_eq!(session.process_events().unwrap(), 2);
    assert_eq!(session.history().undo_stack().len(), 2);
}

#[tokio::test(start_paused = true)]
async fn failed_save_clears_pending_and_reports() {
    let store = Arc::new(MemoryStore::new());
    let mut session = open(&store, DOC).await;
    store.set_fail_writes(true);

    session.add_shape(ShapeKind::Rectangle).unwrap();
    settle().await;

    assert!(!session.autosave().pending());
    assert_eq!(session.notices().current().as_deref(), Some(SAVE_FAILED));
    assert!(store.record(DOC).is_none());

    tokio::time::sleep(Duration::from_secs(3)).await;
    assert!(session.notices().current().is_none());
}

// --- Locking ---

#[tokio::test(start_paused = true)]
async fn toggle_lock_flips_all_flags_with_one_entry() {
    let store = Arc::new(MemoryStore::new());
    let mut session = open(&store, DOC).await;
    let id = session.add_shape(ShapeKind::Rectangle).unwrap().unwrap();
    let before = session.surface().scene().get(id).unwrap().locks;
    assert_eq!(before, LockFlags::UNLOCKED);

    assert!(session.toggle_lock().unwrap());
    assert_eq!(session.history().undo_stack().len(), 3);
    assert_eq!(session.surface().scene().get(id).unwrap().locks, before.toggled());
    assert_eq!(session.surface().selected(), None);

    assert!(session.select(Some(id)));
    assert!(session.toggle_lock().unwrap());
    assert_eq!(session.history().undo_stack().len(), 4);
    assert_eq!(session.surface().scene().get(id).unwrap().locks, before);
    assert_eq!(session.surface().selected(), Some(id));
}

#[tokio::test(start_paused = true)]
async fn toggle_lock_records_undrained_edits_first() {
    let store = Arc::new(MemoryStore::new());
    let mut session = open(&store, DOC).await;

    let id = session.surface_mut().add_element(ShapeKind::Rectangle.build());
    assert!(session.select(Some(id)));
    assert!(session.toggle_lock().unwrap());
    assert_eq!(session.history().undo_stack().len(), 3);
    assert_eq!(session.process_events().unwrap(), 0);

    assert!(session.undo().await.unwrap());
    let el = session.surface().scene().get(id).unwrap();
    assert_eq!(el.locks, LockFlags::UNLOCKED);
}

#[tokio::test(start_paused = true)]
async fn locked_elements_refuse_delete_recolor_and_move() {
    let store = Arc::new(MemoryStore::new());
    let mut session = open(&store, DOC).await;
    let id = session.add_shape(ShapeKind::Circle).unwrap().unwrap();
    session.toggle_lock().unwrap();
    session.select(Some(id));
    let entries = session.history().undo_stack().len();

    assert!(!session.delete_selected().unwrap());
    assert!(!session.change_color("#000000").unwrap());
    assert!(!session.move_selected(40.0, 40.0).unwrap());
    assert_eq!(session.surface().scene().get(id).unwrap().fill.as_deref(), Some("#55ff55"));
    assert_eq!(session.history().undo_stack().len(), entries);
}

#[tokio::test(start_paused = true)]
async fn unlocked_elements_can_be_edited() {
    let store = Arc::new(MemoryStore::new());
    let mut session = open(&store, DOC).await;
    let id = session.add_shape(ShapeKind::Rectangle).unwrap().unwrap();

    assert!(session.change_color("#123456").unwrap());
    assert!(session.move_selected(47.0, 51.0).unwrap());
    let el = session.surface().scene().get(id).unwrap();
    assert_eq!(el.fill.as_deref(), Some("#123456"));
    assert_eq!((el.left, el.top), (40.0, 60.0));

    assert!(session.delete_selected().unwrap());
    assert!(session.surface().scene().is_empty());
    assert_eq!(session.history().undo_stack().len(), 5);
}

// --- Read-only ---

#[tokio::test(start_paused = true)]
async fn view_only_session_locks_everything_and_never_writes() {
    let store = Arc::new(MemoryStore::new());
    seed(&store, &scene_of(&[ShapeKind::Rectangle, ShapeKind::Text]));

    let mut session = open(&store, &format!("/canvas/{}?viewOnly=true", DOC)).await;
    assert_eq!(session.access(), AccessMode::ReadOnly);
    assert!(!session.surface().is_interactive());
    assert!(!session.surface().finds_targets());
    for el in &session.surface().scene().elements {
        assert_eq!(el.locks, LockFlags::LOCKED);
        assert_eq!(el.hover_cursor.as_deref(), Some("default"));
    }

    assert!(session.add_shape(ShapeKind::Circle).unwrap().is_none());
    assert!(!session.select(Some(session.surface().scene().elements[0].id)));
    assert!(!session.delete_selected().unwrap());
    assert!(!session.change_color("#000000").unwrap());
    assert!(!session.toggle_lock().unwrap());
    assert!(!session.enable_pen());
    assert!(session.complete_stroke(&[(0.0, 0.0), (1.0, 1.0)]).unwrap().is_none());
    assert!(!session.undo().await.unwrap());
    assert!(!session.redo().await.unwrap());

    session.surface_mut().add_element(ShapeKind::Circle.build());
    session.process_events().unwrap();
    session.flush_now().await.unwrap();
    settle().await;

    assert_eq!(session.history().undo_stack().len(), 1);
    assert!(session.history().redo_stack().is_empty());
    assert_eq!(store.write_count(), 0);
}

// --- Session surface ---

#[tokio::test(start_paused = true)]
async fn close_deregisters_from_surface() {
    let store = Arc::new(MemoryStore::new());
    let mut session = open(&store, DOC).await;
    assert_eq!(session.surface_mut().listener_count(), 1);

    let mut surface = session.close();
    assert_eq!(surface.listener_count(), 0);
}

#[tokio::test(start_paused = true)]
async fn share_links_reopen_with_matching_access() {
    let store = Arc::new(MemoryStore::new());
    let session = open(&store, DOC).await;

    let view = session.share_url("https://canvas.example", AccessMode::ReadOnly);
    assert_eq!(view, "https://canvas.example/canvas/doc-1?viewOnly=true");
    let reopened = open(&store, &view).await;
    assert!(reopened.is_read_only());

    let edit = session.share_url("https://canvas.example", AccessMode::Editable);
    assert!(!open(&store, &edit).await.is_read_only());
}
