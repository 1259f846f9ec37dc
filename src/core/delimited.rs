// Delimited-text collaborators: delimiter detection, validity check, header and row reading.
// Tokenizing is delegated to the `csv` crate; this module only adapts it to our error model.
use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::{Path, PathBuf};

use csv::{ReaderBuilder, StringRecord, StringRecordsIntoIter};

use crate::core::error::{Error, ErrorKind};
use crate::core::intern::{Field, Interner};

pub const DEFAULT_DELIMITER: u8 = b',';
const CANDIDATES: [u8; 4] = [b',', b';', b'\t', b'|'];
const SAMPLE_LINES: usize = 10;
const PROBE_RECORDS: usize = 10;
const BOM: char = '\u{feff}';

fn open(path: &Path) -> Result<BufReader<File>, Error> {
    File::open(path).map(BufReader::new).map_err(|err| {
        Error::new(ErrorKind::Io)
            .with_message("failed to open delimited file")
            .with_path(path)
            .with_source(err)
    })
}

fn csv_error(path: &Path, err: csv::Error) -> Error {
    let kind = match err.kind() {
        csv::ErrorKind::Io(_) => ErrorKind::Io,
        _ => ErrorKind::Parse,
    };
    let mut error = Error::new(kind)
        .with_message("failed to read delimited record")
        .with_path(path);
    if let Some(position) = err.position() {
        error = error.with_line(position.line());
    }
    error.with_source(err)
}

/// Picks the candidate delimiter that appears most often and most consistently
/// across the first lines of the file.
pub fn detect_delimiter(path: &Path) -> Result<u8, Error> {
    let reader = open(path)?;
    let mut sample = String::new();
    for (idx, line) in reader.split(b'\n').take(SAMPLE_LINES).enumerate() {
        let line = line.map_err(|err| {
            Error::new(ErrorKind::Io)
                .with_message("failed to sample delimited file")
                .with_path(path)
                .with_line(idx as u64 + 1)
                .with_source(err)
        })?;
        sample.push_str(&String::from_utf8_lossy(&line));
        sample.push('\n');
    }
    Ok(detect_delimiter_in(&sample))
}

pub fn detect_delimiter_in(sample: &str) -> u8 {
    let lines: Vec<&str> = sample
        .lines()
        .filter(|line| !line.trim().is_empty())
        .take(SAMPLE_LINES)
        .collect();
    if lines.is_empty() {
        return DEFAULT_DELIMITER;
    }

    let mut best = DEFAULT_DELIMITER;
    let mut best_score = 0.0f64;
    for candidate in CANDIDATES {
        let counts: Vec<f64> = lines
            .iter()
            .map(|line| line.bytes().filter(|&b| b == candidate).count() as f64)
            .collect();
        let avg = counts.iter().sum::<f64>() / counts.len() as f64;
        let variance =
            counts.iter().map(|count| (count - avg).powi(2)).sum::<f64>() / counts.len() as f64;
        let score = avg / (1.0 + variance.sqrt());
        if score > best_score {
            best_score = score;
            best = candidate;
        }
    }
    best
}

/// Structural check: the leading records parse and share the header's field count.
pub fn is_valid_delimited_file(path: &Path, delimiter: u8) -> bool {
    let Ok(reader) = open(path) else {
        return false;
    };
    let mut csv = ReaderBuilder::new()
        .delimiter(delimiter)
        .has_headers(false)
        .flexible(false)
        .from_reader(reader);

    let mut seen = 0usize;
    for record in csv.records().take(PROBE_RECORDS) {
        match record {
            Ok(record) if seen == 0 && record.is_empty() => return false,
            Ok(_) => seen += 1,
            Err(_) => return false,
        }
    }
    seen > 0
}

pub fn read_header_row(path: &Path, delimiter: u8) -> Result<Vec<String>, Error> {
    let reader = open(path)?;
    let mut csv = ReaderBuilder::new()
        .delimiter(delimiter)
        .has_headers(false)
        .flexible(true)
        .from_reader(reader);

    let mut header = StringRecord::new();
    let has_header = csv
        .read_record(&mut header)
        .map_err(|err| csv_error(path, err))?;
    if !has_header {
        return Ok(Vec::new());
    }

    Ok(header
        .iter()
        .enumerate()
        .map(|(idx, field)| {
            if idx == 0 {
                field.trim_start_matches(BOM).to_string()
            } else {
                field.to_string()
            }
        })
        .collect())
}

/// Lazy reader over the data rows of a delimited file (header skipped).
pub struct RowReader {
    path: PathBuf,
    records: StringRecordsIntoIter<BufReader<File>>,
    interner: Option<Interner>,
}

pub fn read_rows(
    path: &Path,
    delimiter: u8,
    interner: Option<&Interner>,
) -> Result<RowReader, Error> {
    let reader = open(path)?;
    let records = ReaderBuilder::new()
        .delimiter(delimiter)
        .has_headers(true)
        .flexible(true)
        .from_reader(reader)
        .into_records();
    Ok(RowReader {
        path: path.to_path_buf(),
        records,
        interner: interner.cloned(),
    })
}

impl RowReader {
    fn fields(&self, record: &StringRecord) -> Vec<Field> {
        match &self.interner {
            Some(interner) => record.iter().map(|value| interner.intern(value)).collect(),
            None => record.iter().map(Field::from).collect(),
        }
    }
}

impl Iterator for RowReader {
    type Item = Result<Vec<Field>, Error>;

    fn next(&mut self) -> Option<Self::Item> {
        let record = self.records.next()?;
        Some(match record {
            Ok(record) => Ok(self.fields(&record)),
            Err(err) => Err(csv_error(&self.path, err)),
        })
    }
}

impl std::fmt::Debug for RowReader {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RowReader")
            .field("path", &self.path)
            .field("interned", &self.interner.is_some())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::{
        detect_delimiter, detect_delimiter_in, is_valid_delimited_file, read_header_row,
        read_rows,
    };
    use crate::core::error::ErrorKind;
    use crate::core::intern::Interner;
    use std::fs;
    use std::sync::Arc;

    #[test]
    fn detects_common_delimiters() {
        assert_eq!(detect_delimiter_in("a,b,c\nd,e,f"), b',');
        assert_eq!(detect_delimiter_in("a;b;c\nd;e;f"), b';');
        assert_eq!(detect_delimiter_in("a\tb\tc\nd\te\tf"), b'\t');
        assert_eq!(detect_delimiter_in("a|b\nc|d"), b'|');
        assert_eq!(detect_delimiter_in("single\ncolumn"), b',');
        assert_eq!(detect_delimiter_in(""), b',');
    }

    #[test]
    fn detects_delimiter_from_file() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("semi.csv");
        fs::write(&path, "id;name\n1;a\n2;b\n").expect("write");
        assert_eq!(detect_delimiter(&path).expect("detect"), b';');
    }

    #[test]
    fn validity_check_rejects_inconsistent_and_empty_files() {
        let dir = tempfile::tempdir().expect("tempdir");
        let good = dir.path().join("good.csv");
        let ragged = dir.path().join("ragged.csv");
        let empty = dir.path().join("empty.csv");
        fs::write(&good, "id,name\n1,a\n2,b\n").expect("write");
        fs::write(&ragged, "id,name\n1,a,extra\n").expect("write");
        fs::write(&empty, "").expect("write");

        assert!(is_valid_delimited_file(&good, b','));
        assert!(!is_valid_delimited_file(&ragged, b','));
        assert!(!is_valid_delimited_file(&empty, b','));
        assert!(!is_valid_delimited_file(&dir.path().join("missing.csv"), b','));
    }

    #[test]
    fn header_row_strips_bom_and_keeps_empty_fields() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("h.csv");
        fs::write(&path, "\u{feff}id,,name,name\n1,2,3,4\n").expect("write");
        let header = read_header_row(&path, b',').expect("header");
        assert_eq!(header, vec!["id", "", "name", "name"]);
    }

    #[test]
    fn missing_file_is_io_error() {
        let dir = tempfile::tempdir().expect("tempdir");
        let err = read_header_row(&dir.path().join("nope.csv"), b',').expect_err("missing");
        assert_eq!(err.kind(), ErrorKind::Io);
        let err = read_rows(&dir.path().join("nope.csv"), b',', None).expect_err("missing");
        assert_eq!(err.kind(), ErrorKind::Io);
    }

    #[test]
    fn rows_skip_header_and_intern_values() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("r.csv");
        fs::write(&path, "id,city\n1,berlin\n2,berlin\n3\n").expect("write");
        let interner = Interner::new();
        let rows: Vec<_> = read_rows(&path, b',', Some(&interner))
            .expect("open")
            .collect::<Result<_, _>>()
            .expect("rows");
        assert_eq!(rows.len(), 3);
        assert_eq!(&*rows[0][1], "berlin");
        assert!(Arc::ptr_eq(&rows[0][1], &rows[1][1]));
        assert_eq!(rows[2].len(), 1);
    }

    #[test]
    fn malformed_row_surfaces_parse_error() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("bad.csv");
        let mut bytes = b"id,name\n1,ok\n2,".to_vec();
        bytes.extend_from_slice(&[0xff, 0xfe, b'\n']);
        fs::write(&path, bytes).expect("write");

        let mut reader = read_rows(&path, b',', None).expect("open");
        assert!(reader.next().expect("first").is_ok());
        let err = reader.next().expect("second").expect_err("parse error");
        assert_eq!(err.kind(), ErrorKind::Parse);
        assert_eq!(err.line(), Some(3));
    }
}
