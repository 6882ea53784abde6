//! Tests for the command stack: undo restores prior state exactly, redo
//! restores the post-command state, and new edits clear the redo stack

use sheetflow::{
    CellAddress, CellComment, CellError, CellRange, CellValue, ConditionalFormatRule, Engine,
    ProtectionRegion,
};

/// Undo of a value write restores the prior value; redo reapplies it
#[test]
fn test_undo_redo_value_write() {
    let mut engine = Engine::new();

    engine.set_value(0, "A1", 1.0).unwrap();
    engine.set_value(0, "A1", 2.0).unwrap();

    assert!(engine.undo());
    assert_eq!(
        engine.display_value(0, "A1").unwrap(),
        CellValue::Number(1.0)
    );

    assert!(engine.redo());
    assert_eq!(
        engine.display_value(0, "A1").unwrap(),
        CellValue::Number(2.0)
    );

    // Two undos reach the blank sheet; a third has nothing left
    assert!(engine.undo());
    assert!(engine.undo());
    assert_eq!(engine.display_value(0, "A1").unwrap(), CellValue::Empty);
    assert!(!engine.undo());
}

/// Undoing a formula write restores dependents and dependency edges
#[test]
fn test_undo_formula_write_restores_dependencies() {
    let mut engine = Engine::new();

    engine.set_value(0, "A1", 3.0).unwrap();
    engine.set_formula(0, "B1", "=A1*2").unwrap();
    engine.set_value(0, "B1", 100.0).unwrap();

    // B1 is a literal now; A1 edits do not touch it
    engine.set_value(0, "A1", 4.0).unwrap();
    assert_eq!(
        engine.display_value(0, "B1").unwrap(),
        CellValue::Number(100.0)
    );

    // Undo the A1 edit and the literal overwrite: B1 is a live formula again
    assert!(engine.undo());
    assert!(engine.undo());
    assert_eq!(
        engine.display_value(0, "B1").unwrap(),
        CellValue::Number(6.0)
    );
    engine.set_value(0, "A1", 5.0).unwrap();
    assert_eq!(
        engine.display_value(0, "B1").unwrap(),
        CellValue::Number(10.0)
    );
}

/// A new edit clears the redo stack
#[test]
fn test_new_edit_clears_redo() {
    let mut engine = Engine::new();

    engine.set_value(0, "A1", 1.0).unwrap();
    engine.set_value(0, "A1", 2.0).unwrap();
    assert!(engine.undo());

    engine.set_value(0, "A1", 9.0).unwrap();
    assert!(!engine.redo());
    assert_eq!(
        engine.display_value(0, "A1").unwrap(),
        CellValue::Number(9.0)
    );
}

/// Undo of a row deletion restores cells, formulas, and their values
#[test]
fn test_undo_delete_rows_restores_content() {
    let mut engine = Engine::new();

    engine.set_value(0, "A3", 5.0).unwrap();
    engine.set_formula(0, "B1", "=A3+1").unwrap();

    engine.delete_rows(0, 2, 1).unwrap();
    assert_eq!(
        engine.display_value(0, "B1").unwrap(),
        CellValue::Error(CellError::Ref)
    );

    assert!(engine.undo());
    assert_eq!(
        engine.display_value(0, "A3").unwrap(),
        CellValue::Number(5.0)
    );
    assert_eq!(engine.value(0, "B1").unwrap().formula_text(), Some("=A3+1"));
    assert_eq!(
        engine.display_value(0, "B1").unwrap(),
        CellValue::Number(6.0)
    );

    // Redo repeats the deletion exactly
    assert!(engine.redo());
    assert_eq!(engine.display_value(0, "A3").unwrap(), CellValue::Empty);
    assert_eq!(
        engine.display_value(0, "B1").unwrap(),
        CellValue::Error(CellError::Ref)
    );

    // And undo still works after the redo
    assert!(engine.undo());
    assert_eq!(
        engine.display_value(0, "B1").unwrap(),
        CellValue::Number(6.0)
    );
}

/// Undo of a structural edit restores comments and merged regions
#[test]
fn test_undo_delete_restores_comments_and_merges() {
    let mut engine = Engine::new();

    engine.set_value(0, "A2", 1.0).unwrap();
    engine
        .set_comment(0, "A2", CellComment::new("reviewer", "keep an eye on this"))
        .unwrap();
    engine
        .merge_cells(0, &CellRange::parse("B2:C2").unwrap())
        .unwrap();

    engine.delete_rows(0, 1, 1).unwrap();
    assert!(engine.sheet(0).unwrap().comment_at(1, 0).is_none());
    assert!(engine.sheet(0).unwrap().merged_regions().is_empty());

    assert!(engine.undo());
    let sheet = engine.sheet(0).unwrap();
    assert_eq!(
        sheet.comment_at(1, 0).map(|c| c.text.as_str()),
        Some("keep an eye on this")
    );
    assert_eq!(sheet.merged_regions(), &[CellRange::parse("B2:C2").unwrap()]);
}

/// Undo of a structural edit restores conditional-format ranges and
/// protection regions exactly
#[test]
fn test_undo_restores_rules_and_protection() {
    let mut engine = Engine::new();

    engine
        .add_conditional_format(
            0,
            ConditionalFormatRule::cell_is_greater_than(0.0)
                .with_range(CellRange::parse("A1:A5").unwrap())
                .with_style_index(2),
        )
        .unwrap();
    engine.protect_sheet(0).unwrap();
    engine
        .add_protection_region(
            0,
            ProtectionRegion::unlocked(CellRange::parse("A1:A5").unwrap()),
        )
        .unwrap();

    engine.insert_rows(0, 2, 4).unwrap();
    assert_eq!(
        engine.sheet(0).unwrap().conditional_formats()[0].ranges[0].to_string(),
        "A1:A9"
    );

    assert!(engine.undo());
    let sheet = engine.sheet(0).unwrap();
    assert_eq!(
        sheet.conditional_formats()[0].ranges[0].to_string(),
        "A1:A5"
    );
    assert_eq!(sheet.protection().regions()[0].range.to_string(), "A1:A5");
    assert!(sheet.protection().enabled);
}

/// Undo of a region move restores both the moved cells and the overwritten
/// destination
#[test]
fn test_undo_shift_range_restores_destination() {
    let mut engine = Engine::new();

    engine.set_value(0, "A1", 1.0).unwrap();
    engine.set_value(0, "A3", 99.0).unwrap();

    engine
        .shift_range(
            0,
            &CellRange::parse("A1").unwrap(),
            &CellAddress::parse("A3").unwrap(),
        )
        .unwrap();
    assert_eq!(
        engine.display_value(0, "A3").unwrap(),
        CellValue::Number(1.0)
    );

    assert!(engine.undo());
    assert_eq!(
        engine.display_value(0, "A1").unwrap(),
        CellValue::Number(1.0)
    );
    assert_eq!(
        engine.display_value(0, "A3").unwrap(),
        CellValue::Number(99.0)
    );
}

/// Undo of a protection change restores the prior protection state
#[test]
fn test_undo_protection_toggle() {
    let mut engine = Engine::new();

    engine.protect_sheet(0).unwrap();
    assert!(engine.is_locked(0, "A1").unwrap());

    assert!(engine.undo());
    assert!(!engine.is_locked(0, "A1").unwrap());

    assert!(engine.redo());
    assert!(engine.is_locked(0, "A1").unwrap());
}

/// Undo leaves unrelated regions untouched
#[test]
fn test_undo_is_local() {
    let mut engine = Engine::new();

    engine.set_value(0, "A1", 1.0).unwrap();
    engine.set_value(0, "Z99", 2.0).unwrap();
    engine.set_value(0, "A1", 3.0).unwrap();
    engine.take_events();

    assert!(engine.undo());
    let events = engine.take_events();
    assert_eq!(events.len(), 1);
    assert_eq!(events[0].address().to_string(), "A1");
    assert_eq!(
        engine.display_value(0, "Z99").unwrap(),
        CellValue::Number(2.0)
    );
}

/// The undo list is bounded by the configured limit
#[test]
fn test_undo_limit() {
    let mut engine = Engine::with_config(sheetflow::EngineConfig {
        undo_limit: 3,
        ..Default::default()
    });

    for i in 0..5 {
        engine.set_value(0, "A1", i as f64).unwrap();
    }
    assert_eq!(engine.undo_depth(), 3);

    assert!(engine.undo());
    assert!(engine.undo());
    assert!(engine.undo());
    assert!(!engine.undo());
    // The two oldest writes fell off the stack
    assert_eq!(
        engine.display_value(0, "A1").unwrap(),
        CellValue::Number(1.0)
    );
}
