use crate::collection::Lookups;
use anyhow::Context;
use std::io::{Cursor, Write};
use zip::write::FileOptions;
use zip::{CompressionMethod, ZipWriter};

const CONTENT_TYPES_ENTRY: &str = "[Content_Types].xml";
const ROOT_RELS_ENTRY: &str = "_rels/.rels";
const WORKBOOK_ENTRY: &str = "xl/workbook.xml";
const WORKBOOK_RELS_ENTRY: &str = "xl/_rels/workbook.xml.rels";
const SHEET_ENTRY: &str = "xl/worksheets/sheet1.xml";

const CONTENT_TYPES_XML: &str = r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>
<Types xmlns="http://schemas.openxmlformats.org/package/2006/content-types"><Default Extension="rels" ContentType="application/vnd.openxmlformats-package.relationships+xml"/><Default Extension="xml" ContentType="application/xml"/><Override PartName="/xl/workbook.xml" ContentType="application/vnd.openxmlformats-officedocument.spreadsheetml.sheet.main+xml"/><Override PartName="/xl/worksheets/sheet1.xml" ContentType="application/vnd.openxmlformats-officedocument.spreadsheetml.worksheet+xml"/></Types>"#;

const ROOT_RELS_XML: &str = r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>
<Relationships xmlns="http://schemas.openxmlformats.org/package/2006/relationships"><Relationship Id="rId1" Type="http://schemas.openxmlformats.org/officeDocument/2006/relationships/officeDocument" Target="xl/workbook.xml"/></Relationships>"#;

const WORKBOOK_RELS_XML: &str = r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>
<Relationships xmlns="http://schemas.openxmlformats.org/package/2006/relationships"><Relationship Id="rId1" Type="http://schemas.openxmlformats.org/officeDocument/2006/relationships/worksheet" Target="worksheets/sheet1.xml"/></Relationships>"#;

/// Sheet names are capped at 31 characters by Excel.
const MAX_SHEET_NAME: usize = 31;

#[derive(Debug, Clone, PartialEq)]
pub enum Cell {
    Text(String),
    Number(f64),
    Bool(bool),
    Empty,
}

impl From<&str> for Cell {
    fn from(s: &str) -> Self {
        Cell::Text(s.to_string())
    }
}

impl From<Option<&str>> for Cell {
    fn from(s: Option<&str>) -> Self {
        s.map(Cell::from).unwrap_or(Cell::Empty)
    }
}

/// One exported column: stable key (matches the wire field), header text, and
/// how to read the cell from a row.
pub struct Column<T> {
    pub key: &'static str,
    pub header: &'static str,
    pub value: fn(&T, &Lookups) -> Cell,
}

impl<T> Column<T> {
    pub fn new(key: &'static str, header: &'static str, value: fn(&T, &Lookups) -> Cell) -> Self {
        Self { key, header, value }
    }
}

/// Keeps only the columns named in `visible`, in column order. `None` keeps
/// everything.
pub fn visible_columns<T>(columns: Vec<Column<T>>, visible: Option<&[String]>) -> Vec<Column<T>> {
    match visible {
        None => columns,
        Some(keys) => columns
            .into_iter()
            .filter(|c| keys.iter().any(|k| k == c.key))
            .collect(),
    }
}

/// Encodes `rows` as a single-sheet .xlsx workbook. The first row holds the
/// column headers.
pub fn encode_xlsx<T>(
    sheet_name: &str,
    columns: &[Column<T>],
    rows: &[T],
    lookups: &Lookups,
) -> anyhow::Result<Vec<u8>> {
    let mut zip = ZipWriter::new(Cursor::new(Vec::new()));
    let opts = FileOptions::default().compression_method(CompressionMethod::Deflated);

    let entries = [
        (CONTENT_TYPES_ENTRY, CONTENT_TYPES_XML.to_string()),
        (ROOT_RELS_ENTRY, ROOT_RELS_XML.to_string()),
        (WORKBOOK_ENTRY, workbook_xml(sheet_name)),
        (WORKBOOK_RELS_ENTRY, WORKBOOK_RELS_XML.to_string()),
        (SHEET_ENTRY, sheet_xml(columns, rows, lookups)),
    ];
    for (name, body) in entries {
        zip.start_file(name, opts)
            .with_context(|| format!("failed to start {name}"))?;
        zip.write_all(body.as_bytes())
            .with_context(|| format!("failed to write {name}"))?;
    }

    let cursor = zip.finish().context("failed to finalize workbook")?;
    Ok(cursor.into_inner())
}

fn workbook_xml(sheet_name: &str) -> String {
    let name: String = sheet_name
        .chars()
        .filter(|c| !matches!(*c, '[' | ']' | ':' | '*' | '?' | '/' | '\\'))
        .take(MAX_SHEET_NAME)
        .collect();
    let name = if name.trim().is_empty() { "Sheet1".to_string() } else { name };
    format!(
        r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>
<workbook xmlns="http://schemas.openxmlformats.org/spreadsheetml/2006/main" xmlns:r="http://schemas.openxmlformats.org/officeDocument/2006/relationships"><sheets><sheet name="{}" sheetId="1" r:id="rId1"/></sheets></workbook>"#,
        escape_xml(&name)
    )
}

fn sheet_xml<T>(columns: &[Column<T>], rows: &[T], lookups: &Lookups) -> String {
    let mut out = String::from(
        r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>
<worksheet xmlns="http://schemas.openxmlformats.org/spreadsheetml/2006/main"><sheetData>"#,
    );

    let header: Vec<Cell> = columns.iter().map(|c| Cell::from(c.header)).collect();
    push_row(&mut out, 1, &header);
    for (i, row) in rows.iter().enumerate() {
        let cells: Vec<Cell> = columns.iter().map(|c| (c.value)(row, lookups)).collect();
        push_row(&mut out, i + 2, &cells);
    }

    out.push_str("</sheetData></worksheet>");
    out
}

fn push_row(out: &mut String, row_no: usize, cells: &[Cell]) {
    out.push_str(&format!(r#"<row r="{row_no}">"#));
    for (col, cell) in cells.iter().enumerate() {
        let r = format!("{}{}", column_letters(col), row_no);
        match cell {
            Cell::Text(s) => out.push_str(&format!(
                r#"<c r="{r}" t="inlineStr"><is><t xml:space="preserve">{}</t></is></c>"#,
                escape_xml(s)
            )),
            Cell::Number(n) if n.is_finite() => {
                out.push_str(&format!(r#"<c r="{r}"><v>{n}</v></c>"#))
            }
            Cell::Bool(b) => out.push_str(&format!(
                r#"<c r="{r}" t="b"><v>{}</v></c>"#,
                if *b { 1 } else { 0 }
            )),
            Cell::Number(_) | Cell::Empty => {}
        }
    }
    out.push_str("</row>");
}

/// 0 -> A, 25 -> Z, 26 -> AA.
fn column_letters(mut idx: usize) -> String {
    let mut letters = Vec::new();
    loop {
        letters.push((b'A' + (idx % 26) as u8) as char);
        if idx < 26 {
            break;
        }
        idx = idx / 26 - 1;
    }
    letters.iter().rev().collect()
}

fn escape_xml(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    for c in s.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&apos;"),
            // Control characters other than tab/newline are not legal XML 1.0.
            c if (c as u32) < 0x20 && !matches!(c, '\t' | '\n' | '\r') => {}
            c => out.push(c),
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::collection::Lookup;
    use std::io::Read;
    use zip::ZipArchive;

    struct Row {
        name: String,
        credits: i64,
        active: bool,
        faculty_id: String,
    }

    fn columns() -> Vec<Column<Row>> {
        vec![
            Column::new("name", "Name", |r, _| Cell::Text(r.name.clone())),
            Column::new("credits", "Credits", |r, _| Cell::Number(r.credits as f64)),
            Column::new("active", "Active", |r, _| Cell::Bool(r.active)),
            Column::new("facultyId", "Faculty", |r, l| {
                Cell::from(l.get("faculties").and_then(|f| f.label(&r.faculty_id)))
            }),
        ]
    }

    fn read_entry(bytes: &[u8], name: &str) -> String {
        let mut archive = ZipArchive::new(Cursor::new(bytes)).expect("open workbook");
        let mut text = String::new();
        archive
            .by_name(name)
            .expect("entry present")
            .read_to_string(&mut text)
            .expect("read entry");
        text
    }

    #[test]
    fn workbook_holds_header_and_escaped_rows() {
        let rows = vec![
            Row {
                name: "Tom & <Jerry>".into(),
                credits: 3,
                active: true,
                faculty_id: "f1".into(),
            },
            Row {
                name: "Plain".into(),
                credits: 4,
                active: false,
                faculty_id: "gone".into(),
            },
        ];
        let mut lookups = Lookups::new();
        #[derive(Clone)]
        struct Fac;
        impl crate::collection::Entity for Fac {
            fn id(&self) -> &str {
                "f1"
            }
            fn label(&self) -> String {
                "Science".into()
            }
        }
        lookups.insert("faculties", Lookup::from_items(&[Fac]));

        let bytes = encode_xlsx("Courses", &columns(), &rows, &lookups).expect("encode");
        let sheet = read_entry(&bytes, SHEET_ENTRY);

        assert!(sheet.contains(r#"<c r="A1" t="inlineStr"><is><t xml:space="preserve">Name</t>"#));
        assert!(sheet.contains("Tom &amp; &lt;Jerry&gt;"));
        assert!(sheet.contains(r#"<c r="B2"><v>3</v></c>"#));
        assert!(sheet.contains(r#"<c r="C3" t="b"><v>0</v></c>"#));
        assert!(sheet.contains("Science"));
        // Unresolved reference leaves the cell out.
        assert!(!sheet.contains(r#"r="D3""#));

        let workbook = read_entry(&bytes, WORKBOOK_ENTRY);
        assert!(workbook.contains(r#"<sheet name="Courses""#));
        read_entry(&bytes, CONTENT_TYPES_ENTRY);
    }

    #[test]
    fn visible_columns_filters_by_key() {
        let keys = vec!["facultyId".to_string(), "name".to_string()];
        let kept = visible_columns(columns(), Some(&keys));
        let kept: Vec<&str> = kept.iter().map(|c| c.key).collect();
        assert_eq!(kept, vec!["name", "facultyId"]);
        assert_eq!(visible_columns(columns(), None).len(), 4);
    }

    #[test]
    fn column_letters_wrap_after_z() {
        assert_eq!(column_letters(0), "A");
        assert_eq!(column_letters(25), "Z");
        assert_eq!(column_letters(26), "AA");
        assert_eq!(column_letters(27), "AB");
        assert_eq!(column_letters(701), "ZZ");
        assert_eq!(column_letters(702), "AAA");
    }
}
