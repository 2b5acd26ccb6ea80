use clap::Parser;
use sortling::cli::{Args, run_cli};
use sortling::config::{ConfigStore, CoreConfig};
use sortling::plugin::{Plugin, PluginHost, PluginInfo, PluginRegistry, PluginResult, PluginState};
use sortling::session::{HostContext, Panel, Session, SessionEvent};
use sortling::{AssignmentError, AssignmentStore};
/// Integration tests for sortling
///
/// These tests drive the library the way the shell does: open a source
/// folder, register destinations, assign, undo, apply, and load plugins.
///
/// Test categories:
/// 1. Filtering and listing
/// 2. Assignment and destination rules
/// 3. Apply semantics
/// 4. Undo / redo
/// 5. Plugins
/// 6. End-to-end shell runs with persisted configuration
use std::fs;
use std::io::Cursor;
use std::path::{Path, PathBuf};
use tempfile::TempDir;

// ============================================================================
// Test Utilities
// ============================================================================

/// A source folder plus any number of destination folders, all temporary.
struct TestFixture {
    root: TempDir,
}

impl TestFixture {
    fn new() -> Self {
        let root = TempDir::new().expect("Failed to create temp directory");
        fs::create_dir(root.path().join("source")).expect("Failed to create source");
        TestFixture { root }
    }

    fn source(&self) -> PathBuf {
        self.root.path().join("source")
    }

    /// Creates (if needed) and returns a destination folder.
    fn dest(&self, name: &str) -> PathBuf {
        let path = self.root.path().join(name);
        if !path.exists() {
            fs::create_dir(&path).expect("Failed to create destination");
        }
        path
    }

    fn create_file(&self, name: &str) -> PathBuf {
        let path = self.source().join(name);
        fs::write(&path, name).expect("Failed to write file");
        path
    }

    fn create_files(&self, names: &[&str]) {
        for name in names {
            self.create_file(name);
        }
    }

    fn session(&self) -> Session {
        let mut session = Session::default();
        session
            .open_source(Some(&self.source()))
            .expect("Failed to open source");
        session
    }

    fn assert_file_exists(&self, path: &Path) {
        assert!(path.is_file(), "File should exist: {}", path.display());
    }

    fn assert_file_not_exists(&self, path: &Path) {
        assert!(!path.exists(), "File should not exist: {}", path.display());
    }
}

fn names(files: &[PathBuf]) -> Vec<String> {
    files
        .iter()
        .map(|p| p.file_name().unwrap().to_string_lossy().to_string())
        .collect()
}

// ============================================================================
// 1. Filtering and listing
// ============================================================================

#[test]
fn test_filter_yields_matching_subset_in_order() {
    let fixture = TestFixture::new();
    fixture.create_files(&["d.jpg", "a.png", "c.txt", "b.webp", "e.PNG"]);

    let mut store = AssignmentStore::new();
    store.set_source_folder(Some(&fixture.source())).unwrap();
    let all = names(store.source_files());

    for pattern in [r".*\.(png|webp)$", r"^[ab]", r"(?i)\.png$", "zzz"] {
        store.set_filter(pattern).unwrap();
        store.refresh().unwrap();

        let regex = regex::Regex::new(pattern).unwrap();
        let expected: Vec<String> = all.iter().filter(|n| regex.is_match(n)).cloned().collect();
        assert_eq!(names(store.source_files()), expected, "pattern {}", pattern);
    }
}

#[test]
fn test_refresh_picks_up_new_files() {
    let fixture = TestFixture::new();
    fixture.create_file("a.png");
    let mut session = fixture.session();
    assert_eq!(session.source_files().len(), 1);

    fixture.create_file("b.png");
    session.refresh().unwrap();
    assert_eq!(session.source_files().len(), 2);
}

#[test]
fn test_invalid_source_leaves_state_unchanged() {
    let fixture = TestFixture::new();
    let file = fixture.create_file("a.png");
    let mut session = fixture.session();

    let result = session.open_source(Some(&file));

    assert!(matches!(result, Err(AssignmentError::InvalidSource { .. })));
    assert_eq!(session.store().source_folder(), Some(fixture.source().as_path()));
    assert_eq!(session.history().undo_len(), 1);
}

// ============================================================================
// 2. Assignment and destination rules
// ============================================================================

#[test]
fn test_assign_toggle_and_replace() {
    let fixture = TestFixture::new();
    let a = fixture.create_file("a.png");
    let mut session = fixture.session();
    let d1 = fixture.dest("d1");
    let d2 = fixture.dest("d2");
    session.add_destination(&d1).unwrap();
    session.add_destination(&d2).unwrap();

    session.toggle_assignment(&d1).unwrap();
    session.toggle_assignment(&d1).unwrap();
    assert_eq!(session.assignment(&a), None);

    session.toggle_assignment(&d1).unwrap();
    session.toggle_assignment(&d2).unwrap();
    assert_eq!(session.assignment(&a), Some(d2.as_path()));
}

#[test]
fn test_remove_destination_fails_iff_in_use() {
    let fixture = TestFixture::new();
    fixture.create_files(&["a.png", "b.png"]);
    let mut session = fixture.session();
    let d1 = fixture.dest("d1");
    let d2 = fixture.dest("d2");
    session.add_destination(&d1).unwrap();
    session.add_destination(&d2).unwrap();
    session.toggle_assignment(&d1).unwrap();

    let result = session.remove_destination(&d1);
    assert!(matches!(
        result,
        Err(AssignmentError::DestinationInUse { .. })
    ));
    assert_eq!(session.store().destinations().len(), 2);

    assert!(session.remove_destination(&d2).unwrap());
    assert_eq!(session.store().destinations(), &[d1.clone()]);
}

#[test]
fn test_add_destination_rejects_missing_folder() {
    let fixture = TestFixture::new();
    let mut session = fixture.session();

    let result = session.add_destination(&fixture.root.path().join("missing"));
    assert!(matches!(
        result,
        Err(AssignmentError::InvalidDestination { .. })
    ));
}

// ============================================================================
// 3. Apply semantics
// ============================================================================

#[test]
fn test_scenario_filter_assign_apply() {
    let fixture = TestFixture::new();
    fixture.create_files(&["a.png", "b.webp", "c.txt"]);
    let dest1 = fixture.dest("dest1");
    let mut session = fixture.session();
    session.add_destination(&dest1).unwrap();

    session.set_filter(r".*\.(png|webp)$").unwrap();
    assert_eq!(names(session.source_files()), vec!["a.png", "b.webp"]);

    session.toggle_assignment(&dest1).unwrap();
    let report = session.apply(|_| {}).unwrap();

    assert_eq!(report.moved_count(), 1);
    fixture.assert_file_exists(&dest1.join("a.png"));
    fixture.assert_file_not_exists(&fixture.source().join("a.png"));
    assert_eq!(session.store().assignment_count(), 0);
    assert_eq!(names(session.source_files()), vec!["b.webp"]);
}

#[test]
fn test_apply_two_destinations() {
    let fixture = TestFixture::new();
    let a = fixture.create_file("a.png");
    let b = fixture.create_file("b.png");
    let d1 = fixture.dest("d1");
    let d2 = fixture.dest("d2");

    let mut store = AssignmentStore::new();
    store.set_source_folder(Some(&fixture.source())).unwrap();
    store.add_destination(&d1).unwrap();
    store.add_destination(&d2).unwrap();
    store.assign(&a, &d1).unwrap();
    store.assign(&b, &d2).unwrap();

    store.apply_assignments().unwrap();
    store.clear_assignments();

    fixture.assert_file_exists(&d1.join("a.png"));
    fixture.assert_file_exists(&d2.join("b.png"));
    assert_eq!(store.assignments().count(), 0);
}

#[test]
fn test_apply_conflict_is_partial_and_keeps_failed_assignment() {
    let fixture = TestFixture::new();
    let a = fixture.create_file("a.png");
    let b = fixture.create_file("b.png");
    let d1 = fixture.dest("d1");
    let d2 = fixture.dest("d2");
    fs::write(d2.join("b.png"), "already here").unwrap();

    let mut session = fixture.session();
    session.add_destination(&d1).unwrap();
    session.add_destination(&d2).unwrap();
    session.toggle_assignment(&d1).unwrap();
    session.next();
    session.toggle_assignment(&d2).unwrap();

    let result = session.apply(|_| {});

    match result {
        Err(AssignmentError::MoveConflict { file, target }) => {
            assert_eq!(file, b);
            assert_eq!(target, d2.join("b.png"));
        }
        other => panic!("expected MoveConflict, got {:?}", other),
    }
    fixture.assert_file_exists(&d1.join("a.png"));
    fixture.assert_file_not_exists(&a);
    fixture.assert_file_exists(&b);
    assert_eq!(fs::read_to_string(d2.join("b.png")).unwrap(), "already here");
    assert_eq!(session.store().assignment(&b), Some(d2.as_path()));
    // A failed apply keeps the history so the user can still undo.
    assert!(session.history().can_undo());
}

// ============================================================================
// 4. Undo / redo
// ============================================================================

#[test]
fn test_undo_restores_each_kind_of_mutation() {
    let fixture = TestFixture::new();
    fixture.create_files(&["a.png", "b.txt"]);
    let d1 = fixture.dest("d1");
    let mut session = fixture.session();
    let a = fixture.source().join("a.png");

    session.add_destination(&d1).unwrap();
    session.toggle_assignment(&d1).unwrap();
    session.set_filter(r"\.png$").unwrap();
    session.clear_assignments();

    session.undo().unwrap();
    assert_eq!(session.assignment(&a), Some(d1.as_path()));

    session.undo().unwrap();
    assert_eq!(session.source_files().len(), 2);

    session.undo().unwrap();
    assert_eq!(session.assignment(&a), None);

    session.undo().unwrap();
    assert!(session.store().destinations().is_empty());

    session.undo().unwrap();
    assert!(session.store().source_folder().is_none());
    assert!(session.source_files().is_empty());

    assert_eq!(session.undo().unwrap(), None);
}

#[test]
fn test_redo_after_undo_and_new_action_discards_redo() {
    let fixture = TestFixture::new();
    let a = fixture.create_file("a.png");
    let d1 = fixture.dest("d1");
    let d2 = fixture.dest("d2");
    let mut session = fixture.session();
    session.add_destination(&d1).unwrap();
    session.add_destination(&d2).unwrap();

    session.toggle_assignment(&d1).unwrap();
    session.undo().unwrap();
    session.redo().unwrap();
    assert_eq!(session.assignment(&a), Some(d1.as_path()));

    session.undo().unwrap();
    session.toggle_assignment(&d2).unwrap();
    assert_eq!(session.redo().unwrap(), None);
    assert_eq!(session.assignment(&a), Some(d2.as_path()));
}

#[test]
fn test_undo_then_redo_destination_removal() {
    let fixture = TestFixture::new();
    let d1 = fixture.dest("d1");
    let d2 = fixture.dest("d2");
    let mut session = fixture.session();
    session.add_destination(&d1).unwrap();
    session.add_destination(&d2).unwrap();

    session.remove_destination(&d1).unwrap();
    session.undo().unwrap();
    assert_eq!(session.store().destinations(), &[d1.clone(), d2.clone()]);

    session.redo().unwrap();
    assert_eq!(session.store().destinations(), &[d2.clone()]);
}

// ============================================================================
// 5. Plugins
// ============================================================================

/// Assigns every listed file to the first panel action's destination.
struct Tagger {
    destination: PathBuf,
}

impl Plugin for Tagger {
    fn info(&self) -> PluginInfo {
        PluginInfo {
            name: "Tagger".to_string(),
            description: "Assigns everything".to_string(),
        }
    }

    fn init(&mut self, ctx: &mut dyn HostContext) -> PluginResult<()> {
        ctx.register_panel(Panel {
            plugin: "tagger".to_string(),
            title: "Tagger".to_string(),
            description: String::new(),
            actions: vec!["tag-all".to_string()],
        });
        Ok(())
    }

    fn invoke(&mut self, _action: &str, ctx: &mut dyn HostContext) -> PluginResult<()> {
        let files = ctx.source_files().to_vec();
        for file in files {
            ctx.assign(&file, &self.destination)?;
        }
        ctx.request_reload();
        Ok(())
    }
}

struct Failing;

impl Plugin for Failing {
    fn info(&self) -> PluginInfo {
        PluginInfo {
            name: "Failing".to_string(),
            description: String::new(),
        }
    }

    fn init(&mut self, _ctx: &mut dyn HostContext) -> PluginResult<()> {
        Err(sortling::PluginError::Action("boom".to_string()))
    }
}

fn tagger() -> Box<dyn Plugin> {
    Box::new(Tagger {
        destination: std::env::temp_dir(),
    })
}

fn failing() -> Box<dyn Plugin> {
    Box::new(Failing)
}

#[test]
fn test_load_all_skips_broken_plugins_and_loads_the_rest() {
    let fixture = TestFixture::new();
    let plugin_dir = fixture.dest("plugins");
    fs::write(plugin_dir.join("a_missing.toml"), "description = \"no entry\"\n").unwrap();
    fs::write(plugin_dir.join("b_failing.toml"), "entry_point = \"failing\"\n").unwrap();
    fs::write(plugin_dir.join("c_tagger.toml"), "name = \"tagger\"\nentry_point = \"tagger\"\n").unwrap();
    fs::write(plugin_dir.join("d_webp.toml"), "entry_point = \"webp_to_png\"\n").unwrap();

    let mut registry = PluginRegistry::builtin();
    registry.register("tagger", tagger);
    registry.register("failing", failing);
    let mut host = PluginHost::new(&plugin_dir, registry);
    let mut session = fixture.session();

    let loaded = host.load_all(&mut session);

    assert_eq!(loaded, vec!["tagger", "d_webp"]);
    assert_eq!(session.panels().len(), 2);
    assert_eq!(host.state("b_failing"), None);

    host.unload_all(&mut session);
    assert!(host
        .plugins()
        .iter()
        .all(|(_, state, _)| *state == PluginState::Unloaded));
}

#[test]
fn test_plugin_mutates_assignments_through_context() {
    let fixture = TestFixture::new();
    fixture.create_files(&["a.png", "b.png"]);
    let plugin_dir = fixture.dest("plugins");
    fs::write(plugin_dir.join("tagger.toml"), "entry_point = \"tagger\"\n").unwrap();

    let mut registry = PluginRegistry::new();
    registry.register("tagger", tagger);
    let mut host = PluginHost::new(&plugin_dir, registry);
    let mut session = fixture.session();
    session.add_destination(&std::env::temp_dir()).unwrap();
    host.load_all(&mut session);

    host.invoke("tagger", "tag-all", &mut session).unwrap();

    assert_eq!(session.store().assignment_count(), 2);
    let events = session.take_events();
    assert!(events.contains(&SessionEvent::FullReload));
    host.notify(&events, &mut session);
}

// ============================================================================
// 6. End-to-end shell runs
// ============================================================================

fn args_for(fixture: &TestFixture, extra: &[&str]) -> Args {
    let source = fixture.source();
    let config = fixture.root.path().join("config");
    let plugins = fixture.root.path().join("plugins");
    let mut argv: Vec<String> = vec![
        "sortling".to_string(),
        source.to_string_lossy().to_string(),
        "--config-dir".to_string(),
        config.to_string_lossy().to_string(),
        "--plugin-dir".to_string(),
        plugins.to_string_lossy().to_string(),
    ];
    argv.extend(extra.iter().map(|s| s.to_string()));
    Args::parse_from(argv)
}

#[test]
fn test_shell_assign_and_apply() {
    let fixture = TestFixture::new();
    fixture.create_files(&["a.png", "b.webp", "c.txt"]);
    let keep = fixture.dest("keep");
    let args = args_for(
        &fixture,
        &["-d", &keep.to_string_lossy(), "--filter", r".*\.(png|webp)$"],
    );

    let mut input = Cursor::new("1\napply\ny\nquit\n");
    run_cli(&args, &mut input).unwrap();

    fixture.assert_file_exists(&keep.join("a.png"));
    fixture.assert_file_exists(&fixture.source().join("b.webp"));
    fixture.assert_file_exists(&fixture.source().join("c.txt"));
}

#[test]
fn test_shell_persists_filter_and_zoom() {
    let fixture = TestFixture::new();
    fixture.create_file("a.png");
    let args = args_for(&fixture, &[]);

    let mut input = Cursor::new("filter \\.png$\n+\n+\n");
    run_cli(&args, &mut input).unwrap();

    let store = ConfigStore::open(fixture.root.path().join("config")).unwrap();
    let core = CoreConfig::load_or_default(&store).unwrap();
    assert_eq!(core.filter, r"\.png$");
    assert!((core.zoom - 1.44).abs() < 1e-4);

    // The saved filter is used on the next run.
    fixture.create_file("b.txt");
    let mut input = Cursor::new("quit\n");
    run_cli(&args, &mut input).unwrap();
    let core = CoreConfig::load_or_default(&store).unwrap();
    assert_eq!(core.filter, r"\.png$");
}

#[test]
fn test_shell_delete_requires_confirmation() {
    let fixture = TestFixture::new();
    let a = fixture.create_file("a.png");
    let args = args_for(&fixture, &[]);

    let mut input = Cursor::new("delete\nno\n");
    run_cli(&args, &mut input).unwrap();
    fixture.assert_file_exists(&a);

    let mut input = Cursor::new("delete\ny\n");
    run_cli(&args, &mut input).unwrap();
    fixture.assert_file_not_exists(&a);
}

#[test]
fn test_shell_rejects_invalid_source() {
    let fixture = TestFixture::new();
    let file = fixture.create_file("a.png");
    let args = Args::parse_from([
        "sortling".to_string(),
        file.to_string_lossy().to_string(),
        "--config-dir".to_string(),
        fixture.root.path().join("config").to_string_lossy().to_string(),
    ]);

    let mut input = Cursor::new("quit\n");
    assert!(run_cli(&args, &mut input).is_err());
}
