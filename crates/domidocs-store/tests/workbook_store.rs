//! Integration tests for the Workbook Store
//!
//! Every test writes a real .xlsx into a temp dir and reads it back with
//! calamine, so column order and cell types are checked as stored on disk.

use chrono::NaiveDate;
use domidocs_core::{CellValue, FieldValue, Fields, FormBatch, Schema, Table};
use domidocs_store::{ensure_schema, Book, Sheet, WorkbookStore};
use pretty_assertions::assert_eq;
use rust_xlsxwriter::{Format, Formula, Workbook};
use tempfile::tempdir;

fn fields(pairs: &[(&str, FieldValue)]) -> Fields {
    pairs.iter().map(|(k, v)| ((*k).to_string(), v.clone())).collect()
}

fn canonical_headers(table: Table) -> Vec<String> {
    table.columns().iter().map(|c| (*c).to_string()).collect()
}

fn date(y: i32, m: u32, d: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(y, m, d).unwrap()
}

// =============================================================================
// ensure_schema
// =============================================================================

#[test]
fn ensure_schema_creates_all_sheets_with_headers() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("base.xlsx");

    assert!(ensure_schema(&path, &Schema::canonical()).unwrap());

    let book = Book::load(&path).unwrap();
    assert_eq!(book.sheet_names(), vec!["Societes", "Associes", "Contrats"]);
    for table in Table::ALL {
        let sheet = book.sheet(table.sheet_name()).unwrap();
        assert_eq!(sheet.headers, canonical_headers(table));
        assert!(sheet.rows.is_empty());
    }
}

#[test]
fn ensure_schema_adds_only_missing_sheets() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("base.xlsx");

    let mut book = Book::new();
    let mut societes = Sheet::new("Societes", vec!["ID_SOCIETE".into(), "DEN_STE".into()]);
    societes.rows.push(vec![CellValue::Number(1.0), CellValue::Text("OLD".into())]);
    book.push(societes);
    book.save(&path, &Schema::canonical()).unwrap();

    assert!(ensure_schema(&path, &Schema::canonical()).unwrap());
    assert!(!ensure_schema(&path, &Schema::canonical()).unwrap());

    let book = Book::load(&path).unwrap();
    assert_eq!(book.sheet_names(), vec!["Societes", "Associes", "Contrats"]);
    let societes = book.sheet("Societes").unwrap();
    assert_eq!(societes.headers, vec!["ID_SOCIETE".to_string(), "DEN_STE".to_string()]);
    assert_eq!(societes.rows.len(), 1);
}

// =============================================================================
// write_records
// =============================================================================

#[test]
fn companies_receive_incrementing_ids_and_numeric_capital() {
    let dir = tempdir().unwrap();
    let store = WorkbookStore::new(dir.path().join("base.xlsx")).unwrap();

    let first = store
        .write_records(&FormBatch::new().company(fields(&[
            ("denomination", "ACME".into()),
            ("capital", "10 000".into()),
        ])))
        .unwrap();
    let second = store
        .write_records(&FormBatch::new().company(fields(&[("denomination", "BETA".into())])))
        .unwrap();

    assert_eq!(first.company_id, Some(1));
    assert_eq!(second.company_id, Some(2));

    let rows = store.read_table(Table::Company).unwrap();
    assert_eq!(rows.len(), 2);
    assert_eq!(rows[0].id(), Some(1));
    assert_eq!(rows[1].id(), Some(2));
    assert_eq!(rows[0].get("DEN_STE"), Some(&CellValue::Text("ACME".into())));
    assert_eq!(rows[0].get("CAPITAL"), Some(&CellValue::Number(10000.0)));
    assert_eq!(rows[1].get("CAPITAL"), Some(&CellValue::Empty));
}

#[test]
fn associates_and_contract_reference_the_new_company() {
    let dir = tempdir().unwrap();
    let store = WorkbookStore::new(dir.path().join("base.xlsx")).unwrap();

    let batch = FormBatch::new()
        .company(fields(&[("denomination", "ACME".into())]))
        .associate(fields(&[
            ("nom", "Alaoui".into()),
            ("date_naiss", "05/11/1980".into()),
            ("est_gerant", true.into()),
            ("parts", "500".into()),
        ]))
        .associate(fields(&[("nom", "Bennani".into()), ("est_gerant", false.into())]))
        .contract(fields(&[
            ("date_debut", "01/02/2024".into()),
            ("period", "12".into()),
            ("prix_mensuel", "1 500,50".into()),
        ]));
    let outcome = store.write_records(&batch).unwrap();

    assert_eq!(outcome.company_id, Some(1));
    assert_eq!(outcome.associate_ids, vec![1, 2]);
    assert_eq!(outcome.contract_id, Some(1));

    let associates = store.read_table(Table::Associate).unwrap();
    assert_eq!(associates.len(), 2);
    assert!(associates.iter().all(|a| a.company_id() == Some(1)));
    assert_eq!(associates[0].get("DATE_NAISS"), Some(&CellValue::Date(date(1980, 11, 5))));
    assert_eq!(associates[0].get("IS_GERANT"), Some(&CellValue::Number(1.0)));
    assert_eq!(associates[1].get("IS_GERANT"), Some(&CellValue::Number(0.0)));
    assert_eq!(associates[0].get("PARTS"), Some(&CellValue::Number(500.0)));

    let contracts = store.read_table(Table::Contract).unwrap();
    assert_eq!(contracts.len(), 1);
    assert_eq!(contracts[0].company_id(), Some(1));
    assert_eq!(contracts[0].get("DATE_DEBUT"), Some(&CellValue::Date(date(2024, 2, 1))));
    assert_eq!(contracts[0].get("DATE_FIN"), Some(&CellValue::Date(date(2025, 2, 1))));
    assert_eq!(contracts[0].get("PRIX_CONTRAT"), Some(&CellValue::Number(1500.5)));
}

#[test]
fn identifiers_stay_monotonic_across_calls() {
    let dir = tempdir().unwrap();
    let store = WorkbookStore::new(dir.path().join("base.xlsx")).unwrap();

    let mut ids = Vec::new();
    for n in 0..5 {
        let outcome = store
            .write_records(
                &FormBatch::new()
                    .company(fields(&[("denomination", format!("STE {n}").into())]))
                    .associate(fields(&[("nom", "A".into())])),
            )
            .unwrap();
        ids.push(outcome.company_id.unwrap());
    }
    assert_eq!(ids, vec![1, 2, 3, 4, 5]);
    assert_eq!(store.next_identifier(Table::Company).unwrap(), 6);
    assert_eq!(store.next_identifier(Table::Associate).unwrap(), 6);
    assert_eq!(store.next_identifier(Table::Contract).unwrap(), 1);
}

#[test]
fn ids_continue_after_existing_max() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("base.xlsx");

    let mut book = Book::new();
    let mut societes = Sheet::new("Societes", canonical_headers(Table::Company));
    let mut row = vec![CellValue::Empty; societes.headers.len()];
    row[0] = CellValue::Number(41.0);
    societes.rows.push(row);
    book.push(societes);
    book.save(&path, &Schema::canonical()).unwrap();

    let store = WorkbookStore::new(&path).unwrap();
    let outcome = store
        .write_records(&FormBatch::new().company(fields(&[("denomination", "NEXT".into())])))
        .unwrap();
    assert_eq!(outcome.company_id, Some(42));
}

#[test]
fn shuffled_sheet_is_rewritten_in_canonical_order() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("base.xlsx");

    // Existing sheet with columns out of order and an unknown extra column
    let mut book = Book::new();
    let mut societes = Sheet::new(
        "Societes",
        vec!["DEN_STE".into(), "NOTES".into(), "ID_SOCIETE".into(), "CAPITAL".into()],
    );
    societes.rows.push(vec![
        CellValue::Text("OLD".into()),
        CellValue::Text("legacy note".into()),
        CellValue::Number(1.0),
        CellValue::Number(5000.0),
    ]);
    book.push(societes);
    book.save(&path, &Schema::canonical()).unwrap();

    let store = WorkbookStore::new(&path).unwrap();
    store
        .write_records(&FormBatch::new().company(fields(&[
            ("denomination", "NEW".into()),
            ("capital", "7000".into()),
        ])))
        .unwrap();

    let book = Book::load(&path).unwrap();
    let sheet = book.sheet("Societes").unwrap();
    assert_eq!(sheet.headers, canonical_headers(Table::Company));

    let rows = store.read_table(Table::Company).unwrap();
    assert_eq!(rows[0].get("DEN_STE"), Some(&CellValue::Text("OLD".into())));
    assert_eq!(rows[0].get("CAPITAL"), Some(&CellValue::Number(5000.0)));
    assert_eq!(rows[1].id(), Some(2));
    assert_eq!(rows[1].get("CAPITAL"), Some(&CellValue::Number(7000.0)));
}

#[test]
fn associates_without_company_have_no_reference() {
    let dir = tempdir().unwrap();
    let store = WorkbookStore::new(dir.path().join("base.xlsx")).unwrap();

    let outcome = store
        .write_records(&FormBatch::new().associate(fields(&[("nom", "Seul".into())])))
        .unwrap();
    assert_eq!(outcome.company_id, None);
    assert_eq!(outcome.associate_ids, vec![1]);

    let associates = store.read_table(Table::Associate).unwrap();
    assert_eq!(associates[0].company_id(), None);
    assert!(store.read_table(Table::Company).unwrap().is_empty());
}

#[test]
fn invalid_dates_are_stored_empty() {
    let dir = tempdir().unwrap();
    let store = WorkbookStore::new(dir.path().join("base.xlsx")).unwrap();

    store
        .write_records(&FormBatch::new().company(fields(&[
            ("denomination", "ACME".into()),
            ("date_ice", "32/13/2024".into()),
        ])))
        .unwrap();
    let rows = store.read_table(Table::Company).unwrap();
    assert_eq!(rows[0].get("DATE_ICE"), Some(&CellValue::Empty));
}

#[test]
fn phone_numbers_keep_leading_zero() {
    let dir = tempdir().unwrap();
    let store = WorkbookStore::new(dir.path().join("base.xlsx")).unwrap();

    store
        .write_records(&FormBatch::new().associate(fields(&[("telephone", "0612345678".into())])))
        .unwrap();
    let rows = store.read_table(Table::Associate).unwrap();
    assert_eq!(rows[0].get("PHONE"), Some(&CellValue::Text("0612345678".into())));
}

#[test]
fn company_bundle_collects_related_rows() {
    let dir = tempdir().unwrap();
    let store = WorkbookStore::new(dir.path().join("base.xlsx")).unwrap();

    store
        .write_records(
            &FormBatch::new()
                .company(fields(&[("denomination", "ACME".into())]))
                .associate(fields(&[("nom", "Alaoui".into())])),
        )
        .unwrap();
    store
        .write_records(
            &FormBatch::new()
                .company(fields(&[("denomination", "BETA".into())]))
                .associate(fields(&[("nom", "Bennani".into())]))
                .contract(fields(&[("period", "6".into())])),
        )
        .unwrap();

    let bundle = store.company_bundle(2).unwrap().unwrap();
    assert_eq!(bundle.company.get("DEN_STE"), Some(&CellValue::Text("BETA".into())));
    assert_eq!(bundle.associates.len(), 1);
    assert_eq!(bundle.associates[0].get("NOM"), Some(&CellValue::Text("Bennani".into())));
    assert!(bundle.contract.is_some());
    assert!(store.company_bundle(9).unwrap().is_none());
}

#[test]
fn read_table_on_missing_workbook_is_empty() {
    let dir = tempdir().unwrap();
    let store = WorkbookStore::new(dir.path().join("absent.xlsx")).unwrap();
    assert!(store.read_table(Table::Contract).unwrap().is_empty());
    assert!(!dir.path().join("absent.xlsx").exists());
}

#[test]
fn sheets_outside_the_schema_survive_rewrites() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("base.xlsx");

    let mut workbook = Workbook::new();
    let societes = workbook.add_worksheet().set_name("Societes").unwrap();
    for (col, header) in Table::Company.columns().iter().enumerate() {
        societes.write_string(0, col as u16, *header).unwrap();
    }
    let notes = workbook.add_worksheet().set_name("Notes").unwrap();
    notes.write_string(0, 0, "Base").unwrap();
    notes.write_string(0, 1, "Total").unwrap();
    notes.write_number(0, 4, 2024.0).unwrap();
    notes.write_number(1, 0, 2.0).unwrap();
    notes.write_formula(1, 1, Formula::new("=A2*10").set_result("20")).unwrap();
    let stamp = Format::new().set_num_format("dd/mm/yyyy hh:mm");
    notes.write_number_with_format(1, 2, NOTE_STAMP, &stamp).unwrap();
    notes.write_boolean(1, 3, true).unwrap();
    // Blank row 3 and an indented cell on row 4 keep their place
    notes.write_string(3, 2, "fin").unwrap();
    workbook.save(&path).unwrap();

    assert!(ensure_schema(&path, &Schema::canonical()).unwrap());
    WorkbookStore::new(&path)
        .unwrap()
        .write_records(&FormBatch::new().company(fields(&[("denomination", "ACME".into())])))
        .unwrap();

    let book = Book::load(&path).unwrap();
    let notes = book.sheet("Notes").unwrap();
    assert_eq!(notes.headers, vec!["Base", "Total", "", "", "2024"]);
    assert_eq!(notes.header_row[4], CellValue::Number(2024.0));
    let row = &notes.rows[0];
    assert_eq!(row[0], CellValue::Number(2.0));
    assert_eq!(
        row[1],
        CellValue::Formula {
            formula: "A2*10".into(),
            result: Box::new(CellValue::Number(20.0)),
        }
    );
    match row[2] {
        CellValue::DateTime(serial) => assert!((serial - NOTE_STAMP).abs() < 1e-9, "{serial}"),
        ref other => panic!("expected a datetime, got {other:?}"),
    }
    assert_eq!(row[2].to_string(), "01/03/2024 14:30");
    assert_eq!(row[3], CellValue::Bool(true));

    assert_eq!(notes.rows.len(), 3);
    assert!(notes.rows[1].iter().all(CellValue::is_empty));
    assert_eq!(notes.rows[2][2], CellValue::Text("fin".into()));
}

/// 2024-03-01 14:30 as an Excel serial
const NOTE_STAMP: f64 = 45352.0 + 14.5 / 24.0;
