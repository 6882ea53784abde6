//! Tests for row/column insert, delete, and region move: cell relocation,
//! reference rewriting, and the consistency of every cell-anchored table

use sheetflow::{
    CellAddress, CellError, CellRange, CellValue, ConditionalFormatRule, Engine, ProtectionRegion,
};

/// Deleting the row a formula references turns its value into #REF!
#[test]
fn test_delete_referenced_row_gives_ref_error() {
    let mut engine = Engine::new();

    engine.set_value(0, "A3", 5.0).unwrap();
    engine.set_formula(0, "B1", "=A3+1").unwrap();
    assert_eq!(
        engine.display_value(0, "B1").unwrap(),
        CellValue::Number(6.0)
    );

    engine.delete_rows(0, 2, 1).unwrap();

    assert_eq!(
        engine.value(0, "B1").unwrap().formula_text(),
        Some("=#REF!+1")
    );
    assert_eq!(
        engine.display_value(0, "B1").unwrap(),
        CellValue::Error(CellError::Ref)
    );
}

/// Deleting an unrelated row leaves the formula's text and value unchanged
#[test]
fn test_delete_unrelated_row_is_invisible() {
    let mut engine = Engine::new();

    engine.set_value(0, "A3", 5.0).unwrap();
    engine.set_formula(0, "B1", "=A3+1").unwrap();
    engine.take_events();

    engine.delete_rows(0, 9, 1).unwrap();

    assert_eq!(engine.value(0, "B1").unwrap().formula_text(), Some("=A3+1"));
    assert_eq!(
        engine.display_value(0, "B1").unwrap(),
        CellValue::Number(6.0)
    );
    assert!(engine.take_events().is_empty());
}

/// Inserting rows shifts cells and rewrites references, preserving values
#[test]
fn test_insert_rows_shifts_cells_and_references() {
    let mut engine = Engine::new();

    engine.set_value(0, "A1", 1.0).unwrap();
    engine.set_value(0, "A2", 2.0).unwrap();
    engine.set_formula(0, "B2", "=A2*10").unwrap();

    engine.insert_rows(0, 1, 2).unwrap();

    // A2 moved to A4, the formula to B4, and its reference followed
    assert_eq!(engine.display_value(0, "A2").unwrap(), CellValue::Empty);
    assert_eq!(
        engine.display_value(0, "A4").unwrap(),
        CellValue::Number(2.0)
    );
    assert_eq!(engine.value(0, "B4").unwrap().formula_text(), Some("=A4*10"));
    assert_eq!(
        engine.display_value(0, "B4").unwrap(),
        CellValue::Number(20.0)
    );
}

/// Absolute markers survive reference rewriting
#[test]
fn test_absolute_references_keep_markers() {
    let mut engine = Engine::new();

    engine.set_value(0, "A2", 3.0).unwrap();
    engine.set_formula(0, "C1", "=$A$2+A2").unwrap();

    engine.insert_rows(0, 0, 1).unwrap();

    assert_eq!(
        engine.value(0, "C2").unwrap().formula_text(),
        Some("=$A$3+A3")
    );
}

/// A SUM range grows when rows are inserted inside it and shrinks when rows
/// are deleted from it
#[test]
fn test_range_resizes_with_edits() {
    let mut engine = Engine::new();

    for (addr, value) in [("A1", 1.0), ("A2", 2.0), ("A3", 3.0)] {
        engine.set_value(0, addr, value).unwrap();
    }
    engine.set_formula(0, "B1", "=SUM(A1:A3)").unwrap();

    engine.insert_rows(0, 1, 1).unwrap();
    assert_eq!(engine.value(0, "B1").unwrap().formula_text(), Some("=SUM(A1:A4)"));
    assert_eq!(
        engine.display_value(0, "B1").unwrap(),
        CellValue::Number(6.0)
    );

    // Fill the inserted gap; the grown range picks it up
    engine.set_value(0, "A2", 10.0).unwrap();
    assert_eq!(
        engine.display_value(0, "B1").unwrap(),
        CellValue::Number(16.0)
    );

    engine.delete_rows(0, 1, 1).unwrap();
    assert_eq!(engine.value(0, "B1").unwrap().formula_text(), Some("=SUM(A1:A3)"));
    assert_eq!(
        engine.display_value(0, "B1").unwrap(),
        CellValue::Number(6.0)
    );
}

/// Insert then delete of the same rows restores the original formula text
#[test]
fn test_insert_delete_round_trip() {
    let mut engine = Engine::new();

    engine.set_value(0, "A5", 1.0).unwrap();
    engine.set_formula(0, "C1", "=SUM($A$5:A9)*A5").unwrap();
    let original = engine.value(0, "C1").unwrap().formula_text().unwrap().to_string();

    engine.insert_rows(0, 2, 3).unwrap();
    engine.delete_rows(0, 2, 3).unwrap();

    assert_eq!(
        engine.value(0, "C1").unwrap().formula_text(),
        Some(original.as_str())
    );
}

/// Column edits mirror row edits
#[test]
fn test_column_insert_and_delete() {
    let mut engine = Engine::new();

    engine.set_value(0, "B1", 5.0).unwrap();
    engine.set_formula(0, "D1", "=B1*2").unwrap();

    engine.insert_cols(0, 0, 1).unwrap();
    assert_eq!(engine.value(0, "E1").unwrap().formula_text(), Some("=C1*2"));
    assert_eq!(
        engine.display_value(0, "E1").unwrap(),
        CellValue::Number(10.0)
    );

    engine.delete_cols(0, 2, 1).unwrap();
    assert_eq!(engine.value(0, "D1").unwrap().formula_text(), Some("=#REF!*2"));
    assert_eq!(
        engine.display_value(0, "D1").unwrap(),
        CellValue::Error(CellError::Ref)
    );
}

/// Deleting a row deletes everything in it, including error indicators
#[test]
fn test_delete_row_removes_error_state() {
    let mut engine = Engine::new();

    engine.set_formula(0, "A2", "=SUM(").unwrap();
    assert_eq!(
        engine.display_value(0, "A2").unwrap(),
        CellValue::Error(CellError::InvalidFormula)
    );

    engine.delete_rows(0, 1, 1).unwrap();

    assert_eq!(engine.display_value(0, "A2").unwrap(), CellValue::Empty);
    assert_eq!(engine.sheet(0).unwrap().cell_count(), 0);
}

/// Moving a region carries cell content and retargets references into it
#[test]
fn test_shift_range_moves_cells_and_references() {
    let mut engine = Engine::new();

    engine.set_value(0, "A1", 7.0).unwrap();
    engine.set_formula(0, "C1", "=A1*2").unwrap();

    // Move A1 down to A3
    engine
        .shift_range(
            0,
            &CellRange::parse("A1").unwrap(),
            &CellAddress::parse("A3").unwrap(),
        )
        .unwrap();

    assert_eq!(engine.display_value(0, "A1").unwrap(), CellValue::Empty);
    assert_eq!(
        engine.display_value(0, "A3").unwrap(),
        CellValue::Number(7.0)
    );
    // The reference followed the moved cell
    assert_eq!(engine.value(0, "C1").unwrap().formula_text(), Some("=A3*2"));
    assert_eq!(
        engine.display_value(0, "C1").unwrap(),
        CellValue::Number(14.0)
    );
}

/// Cross-sheet: edits on one sheet rewrite qualified references from others
#[test]
fn test_edit_rewrites_other_sheets_references() {
    let mut engine = Engine::new();
    let data = engine.add_sheet("Data").unwrap();

    engine.set_value(data, "A3", 9.0).unwrap();
    engine.set_formula(0, "A1", "=Data!A3+1").unwrap();

    engine.insert_rows(data, 0, 2).unwrap();

    assert_eq!(
        engine.value(0, "A1").unwrap().formula_text(),
        Some("=Data!A5+1")
    );
    assert_eq!(
        engine.display_value(0, "A1").unwrap(),
        CellValue::Number(10.0)
    );

    // An unqualified reference on the main sheet is untouched by the edit
    engine.set_formula(0, "B1", "=A1").unwrap();
    engine.insert_rows(data, 0, 1).unwrap();
    assert_eq!(engine.value(0, "B1").unwrap().formula_text(), Some("=A1"));
}

/// Conditional-format ranges and protection regions relocate with the edit
#[test]
fn test_tables_follow_structural_edits() {
    let mut engine = Engine::new();

    engine
        .add_conditional_format(
            0,
            ConditionalFormatRule::cell_is_greater_than(10.0)
                .with_range(CellRange::parse("A2:A4").unwrap())
                .with_style_index(5),
        )
        .unwrap();
    engine.protect_sheet(0).unwrap();
    engine
        .add_protection_region(
            0,
            ProtectionRegion::unlocked(CellRange::parse("B2:B4").unwrap()),
        )
        .unwrap();

    engine.insert_rows(0, 0, 3).unwrap();

    let sheet = engine.sheet(0).unwrap();
    assert_eq!(
        sheet.conditional_formats()[0].ranges[0].to_string(),
        "A5:A7"
    );
    assert_eq!(
        sheet.protection().regions()[0].range.to_string(),
        "B5:B7"
    );
    assert!(!sheet.is_locked(4, 1)); // B5 unlocked
    assert!(sheet.is_locked(1, 1)); // B2 locked again (outside the moved region)
}

/// Comments and merged regions relocate too
#[test]
fn test_comments_and_merges_follow_edits() {
    let mut engine = Engine::new();

    engine.set_value(0, "A2", 1.0).unwrap();
    engine
        .set_comment(0, "A2", sheetflow::CellComment::new("qa", "check"))
        .unwrap();
    engine
        .merge_cells(0, &CellRange::parse("B2:C2").unwrap())
        .unwrap();

    engine.insert_rows(0, 0, 1).unwrap();

    let sheet = engine.sheet(0).unwrap();
    assert!(sheet.comment_at(2, 0).is_some());
    assert!(sheet.comment_at(1, 0).is_none());
    assert_eq!(sheet.merged_regions()[0].to_string(), "B3:C3");
}
