mod common;

use common::{seed_class, seed_students, str_field, temp_dir, Sidecar};
use serde_json::json;
use std::io::Read;
use std::path::Path;

fn sheet_xml(path: &Path) -> String {
    let file = std::fs::File::open(path).expect("open export");
    let mut archive = zip::ZipArchive::new(file).expect("read xlsx zip");
    assert!(archive.by_name("[Content_Types].xml").is_ok());
    assert!(archive.by_name("xl/workbook.xml").is_ok());
    let mut sheet = archive
        .by_name("xl/worksheets/sheet1.xml")
        .expect("sheet1 entry");
    let mut xml = String::new();
    sheet.read_to_string(&mut xml).expect("read sheet xml");
    xml
}

fn text(s: &str) -> String {
    format!(r#"<t xml:space="preserve">{s}</t>"#)
}

#[test]
fn export_covers_every_row_not_just_the_page() {
    let (mut sidecar, workspace) = Sidecar::with_workspace("registrard-export-all");
    let class_id = seed_class(&mut sidecar, "4D");
    seed_students(&mut sidecar, &class_id, 14);

    let snap = sidecar.ok("screen.open", json!({ "kind": "students" }));
    let screen = str_field(&snap, "screenId").to_string();
    sidecar.ok("screen.loadPage", json!({ "screenId": screen, "page": 2 }));

    let snap = sidecar.ok(
        "screen.export",
        json!({ "screenId": screen, "outPath": "students.xlsx" }),
    );
    let out = workspace.join("exports").join("students.xlsx");
    assert_eq!(snap["export"]["rows"], 14);
    assert_eq!(snap["export"]["path"], json!(out.to_string_lossy()));
    // Exporting does not move the screen.
    assert_eq!(snap["currentPage"], 2);
    assert_eq!(snap["items"].as_array().map(|a| a.len()), Some(4));

    let xml = sheet_xml(&out);
    assert!(xml.contains(&text("Student No")));
    assert!(xml.contains(&text("Student001")));
    assert!(xml.contains(&text("Student014")));
    // References export as labels.
    assert!(xml.contains(&text("4D")));
    assert!(!xml.contains(&class_id));
}

#[test]
fn visible_columns_persist_and_restrict_export() {
    let (mut sidecar, _) = Sidecar::with_workspace("registrard-export-columns");
    sidecar.ok("faculties.create", json!({ "code": "ART", "name": "Arts & Crafts" }));

    let snap = sidecar.ok("screen.open", json!({ "kind": "faculties" }));
    let screen = str_field(&snap, "screenId").to_string();
    assert!(snap["columns"].is_null());

    let e = sidecar.fails(
        "screen.columns.set",
        json!({ "screenId": screen, "columns": ["name", "shoeSize"] }),
    );
    assert_eq!(e["code"], "bad_params");

    let snap = sidecar.ok(
        "screen.columns.set",
        json!({ "screenId": screen, "columns": ["name"] }),
    );
    assert_eq!(snap["columns"], json!(["name"]));

    // A second screen of the same kind picks the setting up.
    let other = sidecar.ok("screen.open", json!({ "kind": "faculties" }));
    assert_eq!(other["columns"], json!(["name"]));

    let out = temp_dir("registrard-export-columns-out").join("faculties.xlsx");
    sidecar.ok(
        "screen.export",
        json!({ "screenId": screen, "outPath": out.to_string_lossy() }),
    );
    let xml = sheet_xml(&out);
    assert!(xml.contains(&text("Faculty")));
    assert!(xml.contains(&text("Arts &amp; Crafts")));
    assert!(!xml.contains(&text("Code")));
    assert!(!xml.contains(&text("ART")));

    let e = sidecar.fails("screen.export", json!({ "screenId": screen }));
    assert_eq!(e["code"], "bad_params");
}

#[test]
fn export_directory_comes_from_the_environment() {
    let workspace = temp_dir("registrard-export-env-ws");
    let export_dir = temp_dir("registrard-export-env-out");
    let ws = workspace.to_string_lossy().to_string();
    let dir = export_dir.to_string_lossy().to_string();
    let mut sidecar = Sidecar::spawn_with_env(&[
        ("REGISTRARD_WORKSPACE", ws.as_str()),
        ("REGISTRARD_EXPORT_DIR", dir.as_str()),
    ]);

    let snap = sidecar.ok("screen.open", json!({ "kind": "stats.faculties" }));
    let screen = str_field(&snap, "screenId").to_string();
    let snap = sidecar.ok(
        "screen.export",
        json!({ "screenId": screen, "outPath": "stats.xlsx" }),
    );
    assert_eq!(snap["export"]["rows"], 0);
    let xml = sheet_xml(&export_dir.join("stats.xlsx"));
    assert!(xml.contains("<sheetData>"));
}
