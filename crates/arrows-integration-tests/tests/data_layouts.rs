//! Cross-crate tests: layouts loaded through `arrows-data` and simulated by
//! `arrows-core` under both models.

use std::fs;
use std::path::{Path, PathBuf};

use arrows_core::engine::Engine;
use arrows_core::sim::SimulationMode;
use arrows_core::test_utils::*;
use arrows_core::validate::check_invariants;
use arrows_data::layout::save_layout;
use arrows_data::{ArrowSpec, DataLoadError, LayoutFile, load_engine};
use proptest::prelude::*;

// ===========================================================================
// Helpers
// ===========================================================================

fn make_test_dir(suffix: &str) -> PathBuf {
    let dir = std::env::temp_dir().join(format!(
        "arrows_integration_{suffix}_{}",
        std::process::id()
    ));
    let _ = fs::remove_dir_all(&dir);
    fs::create_dir_all(&dir).unwrap();
    dir
}

fn cleanup(dir: &Path) {
    let _ = fs::remove_dir_all(dir);
}

fn write_mode(dir: &Path, mode: SimulationMode) {
    let name = match mode {
        SimulationMode::Cellular => "cellular",
        SimulationMode::Compressed => "compressed",
    };
    fs::write(
        dir.join("engine.toml"),
        format!("mode = \"{name}\"\nvalidate_edits = true\n"),
    )
    .unwrap();
}

/// Load the same layout text into one engine per model.
fn load_both(suffix: &str, file_name: &str, layout: &str) -> (Engine, Engine) {
    let mut engines = Vec::new();
    for mode in [SimulationMode::Cellular, SimulationMode::Compressed] {
        let dir = make_test_dir(&format!("{suffix}_{mode:?}"));
        fs::write(dir.join(file_name), layout).unwrap();
        write_mode(&dir, mode);
        engines.push(load_engine(&dir).unwrap());
        cleanup(&dir);
    }
    let compressed = engines.pop().unwrap();
    let cellular = engines.pop().unwrap();
    (cellular, compressed)
}

fn assert_lockstep(cellular: &mut Engine, compressed: &mut Engine, ticks: u64) {
    for _ in 0..ticks {
        cellular.advance();
        compressed.advance();
        assert_eq!(cellular.active_cells(), compressed.active_cells());
    }
}

// ===========================================================================
// Ring oscillator with a tap
// ===========================================================================
//
// A ten-cell loop closed through an inverter at (0,0). The corner at (3,0)
// is a mirrored fork that also feeds a six-cell output line heading east.

const OSCILLATOR: &str = r#"(
    arrows: [
        (x: 0, y: 0, shape: 1, rotation: 1, logic: 2),
        (x: 1, y: 0, shape: 1, rotation: 1),
        (x: 2, y: 0, shape: 1, rotation: 1),
        (x: 3, y: 0, shape: 2, rotation: 2, mirrored: true),
        (x: 3, y: 1, shape: 1, rotation: 2),
        (x: 3, y: 2, shape: 1, rotation: 3),
        (x: 2, y: 2, shape: 1, rotation: 3),
        (x: 1, y: 2, shape: 1, rotation: 3),
        (x: 0, y: 2, shape: 1, rotation: 0),
        (x: 0, y: 1, shape: 1, rotation: 0),
        (x: 4, y: 0, shape: 1, rotation: 1),
        (x: 5, y: 0, shape: 1, rotation: 1),
        (x: 6, y: 0, shape: 1, rotation: 1),
        (x: 7, y: 0, shape: 1, rotation: 1),
        (x: 8, y: 0, shape: 1, rotation: 1),
        (x: 9, y: 0, shape: 1, rotation: 1),
    ],
)"#;

#[test]
fn oscillator_layout_runs_identically_in_both_models() {
    let (mut cellular, mut compressed) = load_both("oscillator", "layout.ron", OSCILLATOR);
    assert_eq!(cellular.mode(), SimulationMode::Cellular);
    assert_eq!(compressed.mode(), SimulationMode::Compressed);
    assert_eq!(compressed.cell_count(), 16);
    check_invariants(&compressed.grid, compressed.graph()).unwrap();

    // Inverter up to the fork, the loop back, the output line.
    assert_eq!(compressed.graph().size_histogram(), vec![4, 6, 6]);

    assert_lockstep(&mut cellular, &mut compressed, 60);
}

#[test]
fn oscillator_output_line_carries_the_square_wave() {
    let (mut cellular, _) = load_both("square_wave", "layout.ron", OSCILLATOR);
    let mut fired = Vec::new();
    for _ in 0..40 {
        let report = cellular.advance();
        if cellular.cell_view(9, 0).is_some_and(|v| v.active) {
            fired.push(report.tick);
        }
    }
    // The inverter output reaches the fork after three ticks and the line
    // end six ticks later; the loop takes ten ticks to come back inverted.
    assert_eq!(fired, (10..20).chain(30..40).collect::<Vec<_>>());
}

// ===========================================================================
// Capture, save, reload
// ===========================================================================

#[test]
fn captured_state_resumes_in_the_other_model() {
    let mut edits = mesh(20, 8);
    edits.extend((0..8).map(|y| activate(0, y)));
    let mut source = engine_with(SimulationMode::Compressed, &edits);
    source.advance_by(9);

    let dir = make_test_dir("capture_resume");
    save_layout(&dir.join("layout.json"), &LayoutFile::capture(&source)).unwrap();
    write_mode(&dir, SimulationMode::Cellular);
    let mut resumed = load_engine(&dir).unwrap();
    cleanup(&dir);

    assert_eq!(resumed.active_cells(), source.active_cells());
    assert_lockstep(&mut resumed, &mut source, 25);
}

#[test]
fn loaded_engine_survives_snapshot() {
    let (_, mut compressed) = load_both("snapshot", "layout.ron", OSCILLATOR);
    compressed.advance_by(13);

    let mut restored = Engine::deserialize(&compressed.serialize().unwrap()).unwrap();
    assert_eq!(restored.state_hash(), compressed.state_hash());
    assert_eq!(restored.mode(), SimulationMode::Compressed);

    compressed.advance_by(7);
    restored.advance_by(7);
    assert_eq!(restored.state_hash(), compressed.state_hash());
}

#[test]
fn invalid_logic_id_points_at_entry() {
    let dir = make_test_dir("invalid_logic");
    fs::write(
        dir.join("layout.json"),
        r#"{"arrows": [{"x": 0, "y": 0, "shape": 1}, {"x": 1, "y": 0, "shape": 1, "logic": 42}]}"#,
    )
    .unwrap();

    let err = load_engine(&dir).unwrap_err();
    cleanup(&dir);
    assert!(matches!(err, DataLoadError::InvalidArrow { index: 1, .. }));
}

// ===========================================================================
// Properties
// ===========================================================================

fn arb_spec() -> impl Strategy<Value = ArrowSpec> {
    (
        -6..6i32,
        -4..4i32,
        1..14u8,
        0..4u8,
        any::<bool>(),
        0..7u8,
        any::<bool>(),
    )
        .prop_map(|(x, y, shape, rotation, mirrored, logic, active)| ArrowSpec {
            x,
            y,
            shape,
            rotation,
            mirrored,
            logic,
            active,
        })
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(30))]

    /// Any valid layout simulates identically under both models.
    #[test]
    fn random_layouts_agree(arrows in proptest::collection::vec(arb_spec(), 1..60)) {
        let layout = serde_json::to_string(&LayoutFile { arrows }).unwrap();
        let (mut cellular, mut compressed) = load_both("random", "layout.json", &layout);
        for _ in 0..20 {
            cellular.advance();
            compressed.advance();
            prop_assert_eq!(cellular.active_cells(), compressed.active_cells());
        }
    }
}
