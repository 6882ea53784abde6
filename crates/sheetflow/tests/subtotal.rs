//! Tests for SUBTOTAL aggregation and its nested-subtotal exclusion

use sheetflow::{CellValue, Engine};

/// The canonical stacked-subtotal fixture: an outer SUBTOTAL skips the
/// inner SUBTOTAL cell inside its range
#[test]
fn test_subtotal_excludes_nested_subtotal() {
    let mut engine = Engine::new();

    engine.set_value(0, "A1", 10.0).unwrap();
    engine.set_value(0, "A2", 20.0).unwrap();
    engine.set_formula(0, "A3", "=SUBTOTAL(9,A1:A2)").unwrap();
    engine.set_value(0, "A4", 30.0).unwrap();
    engine.set_value(0, "A5", 40.0).unwrap();
    engine.set_formula(0, "A6", "=SUBTOTAL(9,A1:A5)").unwrap();

    assert_eq!(
        engine.display_value(0, "A3").unwrap(),
        CellValue::Number(30.0)
    );
    // 10 + 20 + 30 + 40, excluding A3's own 30
    assert_eq!(
        engine.display_value(0, "A6").unwrap(),
        CellValue::Number(100.0)
    );
}

/// The exclusion tracks edits: changing an input updates both subtotals
/// without double counting
#[test]
fn test_subtotal_recalculates_without_double_counting() {
    let mut engine = Engine::new();

    engine.set_value(0, "A1", 10.0).unwrap();
    engine.set_value(0, "A2", 20.0).unwrap();
    engine.set_formula(0, "A3", "=SUBTOTAL(9,A1:A2)").unwrap();
    engine.set_value(0, "A4", 5.0).unwrap();
    engine.set_formula(0, "A5", "=SUBTOTAL(9,A1:A4)").unwrap();

    assert_eq!(
        engine.display_value(0, "A5").unwrap(),
        CellValue::Number(35.0)
    );

    engine.set_value(0, "A1", 100.0).unwrap();
    assert_eq!(
        engine.display_value(0, "A3").unwrap(),
        CellValue::Number(120.0)
    );
    assert_eq!(
        engine.display_value(0, "A5").unwrap(),
        CellValue::Number(125.0)
    );
}

/// Replacing a SUBTOTAL with a plain SUM clears its exclusion tag: the
/// outer aggregate now counts that cell
#[test]
fn test_exclusion_tag_follows_formula_changes() {
    let mut engine = Engine::new();

    engine.set_value(0, "A1", 10.0).unwrap();
    engine.set_value(0, "A2", 20.0).unwrap();
    engine.set_formula(0, "A3", "=SUBTOTAL(9,A1:A2)").unwrap();
    engine.set_formula(0, "A4", "=SUBTOTAL(9,A1:A3)").unwrap();

    assert_eq!(
        engine.display_value(0, "A4").unwrap(),
        CellValue::Number(30.0)
    );

    // A3 becomes an ordinary SUM; it is no longer excluded
    engine.set_formula(0, "A3", "=SUM(A1:A2)").unwrap();
    assert_eq!(
        engine.display_value(0, "A4").unwrap(),
        CellValue::Number(60.0)
    );
}

/// SUBTOTAL supports the classic aggregation codes
#[test]
fn test_subtotal_codes_through_engine() {
    let mut engine = Engine::new();

    engine.set_value(0, "A1", 2.0).unwrap();
    engine.set_value(0, "A2", 4.0).unwrap();
    engine.set_value(0, "A3", "note").unwrap();

    engine.set_formula(0, "B1", "=SUBTOTAL(1,A1:A3)").unwrap();
    engine.set_formula(0, "B2", "=SUBTOTAL(2,A1:A3)").unwrap();
    engine.set_formula(0, "B3", "=SUBTOTAL(3,A1:A3)").unwrap();
    engine.set_formula(0, "B4", "=SUBTOTAL(6,A1:A2)").unwrap();

    assert_eq!(
        engine.display_value(0, "B1").unwrap(),
        CellValue::Number(3.0)
    );
    assert_eq!(
        engine.display_value(0, "B2").unwrap(),
        CellValue::Number(2.0)
    );
    assert_eq!(
        engine.display_value(0, "B3").unwrap(),
        CellValue::Number(3.0)
    );
    assert_eq!(
        engine.display_value(0, "B4").unwrap(),
        CellValue::Number(8.0)
    );
}

/// SUBTOTAL cells keep their exclusion across structural edits
#[test]
fn test_subtotal_exclusion_survives_row_insert() {
    let mut engine = Engine::new();

    engine.set_value(0, "A1", 10.0).unwrap();
    engine.set_value(0, "A2", 20.0).unwrap();
    engine.set_formula(0, "A3", "=SUBTOTAL(9,A1:A2)").unwrap();
    engine.set_formula(0, "A4", "=SUBTOTAL(9,A1:A3)").unwrap();

    engine.insert_rows(0, 0, 2).unwrap();

    assert_eq!(
        engine.value(0, "A5").unwrap().formula_text(),
        Some("=SUBTOTAL(9,A3:A4)")
    );
    assert_eq!(
        engine.display_value(0, "A6").unwrap(),
        CellValue::Number(30.0)
    );
}
