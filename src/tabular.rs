use crate::error::{RosterError, RosterResult};
use crate::filenames::file_extension;
use anyhow::anyhow;
use calamine::{open_workbook_from_rs, Data, Reader, Xlsx};
use chrono::Datelike;
use rand::Rng;
use std::collections::HashMap;
use std::io::Cursor;

pub const COL_NAME: &str = "NAME";
pub const COL_ID: &str = "ID";
pub const COL_GENDER: &str = "GENDER";
pub const COL_DOB: &str = "DOB";

pub const REQUIRED_VOTER_COLUMNS: [&str; 4] = [COL_NAME, COL_ID, COL_GENDER, COL_DOB];

const MIN_AGE: i32 = 18;
const MAX_AGE: i32 = 80;

pub type RowMap = HashMap<String, String>;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TabularSource {
    Spreadsheet,
    Delimited,
}

impl TabularSource {
    pub fn from_file_name(file_name: &str) -> RosterResult<Self> {
        match file_extension(file_name).as_str() {
            "xlsx" => Ok(TabularSource::Spreadsheet),
            "csv" => Ok(TabularSource::Delimited),
            _ => Err(RosterError::UnsupportedFormat {
                file_name: file_name.to_string(),
            }),
        }
    }

    pub fn parse(self, bytes: &[u8]) -> RosterResult<Vec<RowMap>> {
        let year = chrono::Local::now().year();
        self.parse_with(bytes, &mut rand::thread_rng(), year)
    }

    pub fn parse_with<R: Rng>(
        self,
        bytes: &[u8],
        rng: &mut R,
        current_year: i32,
    ) -> RosterResult<Vec<RowMap>> {
        let (headers, rows) = match self {
            TabularSource::Spreadsheet => read_first_sheet(bytes)?,
            TabularSource::Delimited => read_delimited(bytes)?,
        };
        // No record means no column set to validate.
        if rows.is_empty() {
            return Err(RosterError::SchemaViolation {
                column: COL_NAME.to_string(),
            });
        }
        require_columns(&headers, &REQUIRED_VOTER_COLUMNS)?;
        Ok(rows
            .into_iter()
            .map(|row| fill_missing(row, rng, current_year))
            .collect())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VoterRow {
    pub name: String,
    pub external_id: String,
    pub gender: String,
    pub birth_year: String,
}

impl VoterRow {
    pub fn from_row(row: &RowMap) -> Self {
        let get = |k: &str| row.get(k).cloned().unwrap_or_default();
        VoterRow {
            name: get(COL_NAME),
            external_id: get(COL_ID),
            gender: get(COL_GENDER),
            birth_year: get(COL_DOB),
        }
    }
}

fn require_columns(headers: &[String], required: &[&str]) -> RosterResult<()> {
    for col in required {
        if !headers.iter().any(|h| h == col) {
            return Err(RosterError::SchemaViolation {
                column: (*col).to_string(),
            });
        }
    }
    Ok(())
}

fn read_delimited(bytes: &[u8]) -> RosterResult<(Vec<String>, Vec<RowMap>)> {
    let bytes = bytes.strip_prefix(b"\xEF\xBB\xBF").unwrap_or(bytes);
    let mut reader = csv::ReaderBuilder::new()
        .flexible(true)
        .from_reader(bytes);
    let headers: Vec<String> = reader
        .headers()?
        .iter()
        .map(|h| h.trim().to_string())
        .collect();

    let mut rows = Vec::new();
    for record in reader.records() {
        let record = record?;
        if record.iter().all(|v| v.trim().is_empty()) {
            continue;
        }
        let row: RowMap = headers
            .iter()
            .enumerate()
            .map(|(i, h)| (h.clone(), record.get(i).unwrap_or("").trim().to_string()))
            .collect();
        rows.push(row);
    }
    Ok((headers, rows))
}

fn read_first_sheet(bytes: &[u8]) -> RosterResult<(Vec<String>, Vec<RowMap>)> {
    let mut workbook: Xlsx<_> = open_workbook_from_rs(Cursor::new(bytes.to_vec()))?;
    let range = workbook
        .worksheet_range_at(0)
        .ok_or_else(|| anyhow!("workbook has no sheets"))??;

    let mut it = range.rows();
    let Some(header_row) = it.next() else {
        return Ok((Vec::new(), Vec::new()));
    };
    let headers: Vec<String> = header_row.iter().map(cell_text).collect();

    let mut rows = Vec::new();
    for cells in it {
        let values: Vec<String> = cells.iter().map(cell_text).collect();
        if values.iter().all(|v| v.is_empty()) {
            continue;
        }
        let row: RowMap = headers
            .iter()
            .enumerate()
            .filter(|(_, h)| !h.is_empty())
            .map(|(i, h)| (h.clone(), values.get(i).cloned().unwrap_or_default()))
            .collect();
        rows.push(row);
    }
    Ok((headers, rows))
}

fn cell_text(cell: &Data) -> String {
    match cell {
        Data::Empty => String::new(),
        Data::String(s) => s.trim().to_string(),
        Data::Int(i) => i.to_string(),
        // Identifiers and years arrive as floats; keep them integral.
        Data::Float(f) if f.fract() == 0.0 && f.abs() < 1e15 => format!("{}", *f as i64),
        other => other.to_string().trim().to_string(),
    }
}

fn is_blank(row: &RowMap, key: &str) -> bool {
    row.get(key).map(|v| v.trim().is_empty()).unwrap_or(true)
}

/// Fills value-level gaps. A missing name is left empty.
fn fill_missing<R: Rng>(mut row: RowMap, rng: &mut R, current_year: i32) -> RowMap {
    if is_blank(&row, COL_ID) {
        row.insert(COL_ID.to_string(), synthetic_id(rng));
    }
    if is_blank(&row, COL_GENDER) {
        row.insert(COL_GENDER.to_string(), synthetic_gender(rng).to_string());
    }
    if is_blank(&row, COL_DOB) {
        row.insert(
            COL_DOB.to_string(),
            synthetic_birth_year(rng, current_year).to_string(),
        );
    }
    row.entry(COL_NAME.to_string()).or_default();
    row
}

fn synthetic_id<R: Rng>(rng: &mut R) -> String {
    let len = rng.gen_range(10..=12);
    (0..len)
        .map(|_| char::from(b'0' + rng.gen_range(0..10u8)))
        .collect()
}

fn synthetic_gender<R: Rng>(rng: &mut R) -> &'static str {
    if rng.gen_bool(0.5) {
        "M"
    } else {
        "F"
    }
}

fn synthetic_birth_year<R: Rng>(rng: &mut R, current_year: i32) -> i32 {
    current_year - rng.gen_range(MIN_AGE..=MAX_AGE)
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use rand::rngs::StdRng;
    use rand::SeedableRng;
    use std::io::Write;
    use zip::write::FileOptions;
    use zip::ZipWriter;

    fn rng() -> StdRng {
        StdRng::seed_from_u64(7)
    }

    fn xml_escape(s: &str) -> String {
        s.replace('&', "&amp;")
            .replace('<', "&lt;")
            .replace('>', "&gt;")
    }

    fn col_letter(i: usize) -> char {
        (b'A' + i as u8) as char
    }

    /// Builds a one-sheet workbook with inline strings. Cells that parse as
    /// integers are written as numbers.
    pub(crate) fn build_workbook(rows: &[Vec<&str>]) -> Vec<u8> {
        let mut sheet = String::from(
            r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>
<worksheet xmlns="http://schemas.openxmlformats.org/spreadsheetml/2006/main"><sheetData>"#,
        );
        for (r, row) in rows.iter().enumerate() {
            sheet.push_str(&format!(r#"<row r="{}">"#, r + 1));
            for (c, v) in row.iter().enumerate() {
                let cell_ref = format!("{}{}", col_letter(c), r + 1);
                if v.is_empty() {
                    continue;
                }
                if v.parse::<i64>().is_ok() {
                    sheet.push_str(&format!(r#"<c r="{}"><v>{}</v></c>"#, cell_ref, v));
                } else {
                    sheet.push_str(&format!(
                        r#"<c r="{}" t="inlineStr"><is><t>{}</t></is></c>"#,
                        cell_ref,
                        xml_escape(v)
                    ));
                }
            }
            sheet.push_str("</row>");
        }
        sheet.push_str("</sheetData></worksheet>");

        let entries: [(&str, String); 5] = [
            (
                "[Content_Types].xml",
                r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>
<Types xmlns="http://schemas.openxmlformats.org/package/2006/content-types"><Default Extension="rels" ContentType="application/vnd.openxmlformats-package.relationships+xml"/><Default Extension="xml" ContentType="application/xml"/><Override PartName="/xl/workbook.xml" ContentType="application/vnd.openxmlformats-officedocument.spreadsheetml.sheet.main+xml"/><Override PartName="/xl/worksheets/sheet1.xml" ContentType="application/vnd.openxmlformats-officedocument.spreadsheetml.worksheet+xml"/></Types>"#
                    .to_string(),
            ),
            (
                "_rels/.rels",
                r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>
<Relationships xmlns="http://schemas.openxmlformats.org/package/2006/relationships"><Relationship Id="rId1" Type="http://schemas.openxmlformats.org/officeDocument/2006/relationships/officeDocument" Target="xl/workbook.xml"/></Relationships>"#
                    .to_string(),
            ),
            (
                "xl/workbook.xml",
                r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>
<workbook xmlns="http://schemas.openxmlformats.org/spreadsheetml/2006/main" xmlns:r="http://schemas.openxmlformats.org/officeDocument/2006/relationships"><sheets><sheet name="Sheet1" sheetId="1" r:id="rId1"/></sheets></workbook>"#
                    .to_string(),
            ),
            (
                "xl/_rels/workbook.xml.rels",
                r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>
<Relationships xmlns="http://schemas.openxmlformats.org/package/2006/relationships"><Relationship Id="rId1" Type="http://schemas.openxmlformats.org/officeDocument/2006/relationships/worksheet" Target="worksheets/sheet1.xml"/></Relationships>"#
                    .to_string(),
            ),
            ("xl/worksheets/sheet1.xml", sheet),
        ];

        let mut zip = ZipWriter::new(Cursor::new(Vec::new()));
        for (name, body) in entries.iter() {
            zip.start_file(*name, FileOptions::default())
                .expect("start entry");
            zip.write_all(body.as_bytes()).expect("write entry");
        }
        zip.finish().expect("finish workbook").into_inner()
    }

    #[test]
    fn format_is_chosen_from_extension() {
        assert_eq!(
            TabularSource::from_file_name("voters.XLSX").unwrap(),
            TabularSource::Spreadsheet
        );
        assert_eq!(
            TabularSource::from_file_name("voters.csv").unwrap(),
            TabularSource::Delimited
        );
        let e = TabularSource::from_file_name("voters.pdf").unwrap_err();
        assert_eq!(e.code(), "unsupported_format");
    }

    #[test]
    fn csv_missing_id_column_is_schema_violation() {
        let csv = b"NAME,GENDER,DOB\nAda Eze,F,1990\n";
        let e = TabularSource::Delimited
            .parse_with(csv, &mut rng(), 2026)
            .unwrap_err();
        match e {
            RosterError::SchemaViolation { column } => assert_eq!(column, "ID"),
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn csv_value_gaps_are_synthesized_but_name_is_not() {
        let csv = "\u{feff}NAME,ID,GENDER,DOB\nAda Eze,,,\n,12345678901,M,1970\n";
        let rows = TabularSource::Delimited
            .parse_with(csv.as_bytes(), &mut rng(), 2026)
            .expect("parse");
        assert_eq!(rows.len(), 2);

        let first = VoterRow::from_row(&rows[0]);
        assert_eq!(first.name, "Ada Eze");
        assert!((10..=12).contains(&first.external_id.len()));
        assert!(first.external_id.bytes().all(|b| b.is_ascii_digit()));
        assert!(first.gender == "M" || first.gender == "F");
        let year: i32 = first.birth_year.parse().expect("year");
        assert!((2026 - 80..=2026 - 18).contains(&year));

        let second = VoterRow::from_row(&rows[1]);
        assert_eq!(second.name, "");
        assert_eq!(second.external_id, "12345678901");
        assert_eq!(second.gender, "M");
        assert_eq!(second.birth_year, "1970");
    }

    #[test]
    fn csv_short_rows_and_blank_lines_are_tolerated() {
        let csv = b"NAME,ID,GENDER,DOB\nUche Okoro,555\n,,,\nAmara Udeh,777,F,1988\n";
        let rows = TabularSource::Delimited
            .parse_with(csv, &mut rng(), 2026)
            .expect("parse");
        assert_eq!(rows.len(), 2);
        let first = VoterRow::from_row(&rows[0]);
        assert_eq!(first.external_id, "555");
        assert!(!first.gender.is_empty());
        assert!(!first.birth_year.is_empty());
    }

    #[test]
    fn header_only_csv_is_schema_violation() {
        let e = TabularSource::Delimited
            .parse_with(b"NAME,ID,GENDER,DOB\n", &mut rng(), 2026)
            .unwrap_err();
        match e {
            RosterError::SchemaViolation { column } => assert_eq!(column, "NAME"),
            other => panic!("unexpected error: {other:?}"),
        }
        let e = TabularSource::Delimited
            .parse_with(b"", &mut rng(), 2026)
            .unwrap_err();
        assert_eq!(e.code(), "schema_violation");

        let bytes = build_workbook(&[vec!["NAME", "ID", "GENDER", "DOB"]]);
        let e = TabularSource::Spreadsheet
            .parse_with(&bytes, &mut rng(), 2026)
            .unwrap_err();
        assert_eq!(e.code(), "schema_violation");
    }

    #[test]
    fn spreadsheet_first_sheet_is_read() {
        let bytes = build_workbook(&[
            vec!["NAME", "ID", "GENDER", "DOB"],
            vec!["Chidi Okafor", "90123456789", "M", "1985"],
            vec!["Ngozi Nwosu", "", "", ""],
        ]);
        let rows = TabularSource::Spreadsheet
            .parse_with(&bytes, &mut rng(), 2026)
            .expect("parse workbook");
        assert_eq!(rows.len(), 2);
        let first = VoterRow::from_row(&rows[0]);
        assert_eq!(first.name, "Chidi Okafor");
        assert_eq!(first.external_id, "90123456789");
        assert_eq!(first.birth_year, "1985");
        let second = VoterRow::from_row(&rows[1]);
        assert_eq!(second.name, "Ngozi Nwosu");
        assert!(!second.external_id.is_empty());
    }

    #[test]
    fn spreadsheet_missing_column_is_schema_violation() {
        let bytes = build_workbook(&[
            vec!["NAME", "ID", "DOB"],
            vec!["Chidi Okafor", "90123456789", "1985"],
        ]);
        let e = TabularSource::Spreadsheet
            .parse_with(&bytes, &mut rng(), 2026)
            .unwrap_err();
        assert!(e.to_string().contains("GENDER"));
    }

    #[test]
    fn garbage_spreadsheet_bytes_fail_to_parse() {
        let e = TabularSource::Spreadsheet
            .parse_with(b"not a workbook", &mut rng(), 2026)
            .unwrap_err();
        assert_eq!(e.code(), "parse_failed");
    }
}
