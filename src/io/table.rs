use std::collections::BTreeMap;
use std::fs;
use std::io::{Read, Write};
use std::path::{Path, PathBuf};

use nalgebra::DMatrix;

use crate::error::{SimError, SimResult};

// ---------------------------------------------------------------------------
// Headerless numeric tables
// ---------------------------------------------------------------------------

/// Read a `rows x cols` block from comma-separated text with no header.
///
/// Extra rows and trailing columns are ignored; a missing row or a short row
/// is a [`SimError::TableShape`].
pub fn read_table<R: Read>(reader: R, rows: usize, cols: usize) -> SimResult<DMatrix<f64>> {
    let mut rdr = csv::ReaderBuilder::new()
        .has_headers(false)
        .flexible(true)
        .trim(csv::Trim::All)
        .from_reader(reader);

    let mut table = DMatrix::zeros(rows, cols);
    let mut records = rdr.records();
    for r in 0..rows {
        let shape_err = SimError::TableShape { expected_rows: rows, expected_cols: cols, row: r };
        let record = match records.next() {
            Some(rec) => rec?,
            None => return Err(shape_err),
        };
        if record.len() < cols {
            return Err(shape_err);
        }
        for c in 0..cols {
            let field = &record[c];
            table[(r, c)] = field.parse().map_err(|_| SimError::Parse {
                row: r,
                col: c,
                value: field.to_string(),
            })?;
        }
    }
    Ok(table)
}

pub fn load_table<P: AsRef<Path>>(path: P, rows: usize, cols: usize) -> SimResult<DMatrix<f64>> {
    let file = fs::File::open(path)?;
    read_table(file, rows, cols)
}

/// One line per row, comma-separated.
pub fn write_table<W: Write>(writer: W, table: &DMatrix<f64>) -> SimResult<()> {
    let mut wtr = csv::WriterBuilder::new().has_headers(false).from_writer(writer);
    for row in table.row_iter() {
        wtr.write_record(row.iter().map(|v| v.to_string()))?;
    }
    wtr.flush()?;
    Ok(())
}

pub fn save_table<P: AsRef<Path>>(path: P, table: &DMatrix<f64>) -> SimResult<()> {
    let file = fs::File::create(path)?;
    write_table(file, table)
}

// ---------------------------------------------------------------------------
// Table sinks
// ---------------------------------------------------------------------------

/// Destination for the named tables a simulation produces.
pub trait TableSink {
    fn save(&mut self, name: &str, table: &DMatrix<f64>) -> SimResult<()>;
}

/// Writes each table to `<dir>/<name>.csv`.
#[derive(Debug, Clone)]
pub struct CsvDirectory {
    dir: PathBuf,
}

impl CsvDirectory {
    pub fn new<P: Into<PathBuf>>(dir: P) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn path_for(&self, name: &str) -> PathBuf {
        self.dir.join(format!("{name}.csv"))
    }
}

impl TableSink for CsvDirectory {
    fn save(&mut self, name: &str, table: &DMatrix<f64>) -> SimResult<()> {
        fs::create_dir_all(&self.dir)?;
        let path = self.path_for(name);
        save_table(&path, table)?;
        tracing::info!(
            path = %path.display(),
            rows = table.nrows(),
            cols = table.ncols(),
            "table saved"
        );
        Ok(())
    }
}

/// Keeps tables in memory, keyed by name. Later saves overwrite earlier ones.
#[derive(Debug, Clone, Default)]
pub struct MemorySink {
    tables: BTreeMap<String, DMatrix<f64>>,
}

impl MemorySink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, name: &str) -> Option<&DMatrix<f64>> {
        self.tables.get(name)
    }

    pub fn tables(&self) -> &BTreeMap<String, DMatrix<f64>> {
        &self.tables
    }

    pub fn into_tables(self) -> BTreeMap<String, DMatrix<f64>> {
        self.tables
    }
}

impl TableSink for MemorySink {
    fn save(&mut self, name: &str, table: &DMatrix<f64>) -> SimResult<()> {
        self.tables.insert(name.to_string(), table.clone());
        Ok(())
    }
}

impl<T: TableSink + ?Sized> TableSink for &mut T {
    fn save(&mut self, name: &str, table: &DMatrix<f64>) -> SimResult<()> {
        (**self).save(name, table)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn scratch_dir(tag: &str) -> PathBuf {
        std::env::temp_dir().join(format!("airbrake-sim-{tag}-{}", std::process::id()))
    }

    #[test]
    fn write_one_row_per_line() {
        let m = DMatrix::from_row_slice(2, 3, &[1.0, 2.5, -3.0, 0.0, 1e-7, 42.0]);
        let mut buf = Vec::new();
        write_table(&mut buf, &m).unwrap();
        let text = String::from_utf8(buf).unwrap();
        assert_eq!(text, "1,2.5,-3\n0,0.0000001,42\n");
    }

    #[test]
    fn read_ignores_surplus_and_trims() {
        let text = "1, 2, 3\n4 ,5,6\n7,8,9\n";
        let m = read_table(text.as_bytes(), 2, 2).unwrap();
        assert_eq!(m, DMatrix::from_row_slice(2, 2, &[1.0, 2.0, 4.0, 5.0]));
    }

    #[test]
    fn missing_row_is_shape_error() {
        let err = read_table("1,2\n".as_bytes(), 2, 2).unwrap_err();
        assert!(matches!(err, SimError::TableShape { row: 1, .. }));
    }

    #[test]
    fn short_row_is_shape_error() {
        let err = read_table("1,2\n3\n".as_bytes(), 2, 2).unwrap_err();
        assert!(matches!(err, SimError::TableShape { row: 1, .. }));
    }

    #[test]
    fn garbage_value_is_parse_error() {
        let err = read_table("1,abc\n".as_bytes(), 1, 2).unwrap_err();
        match err {
            SimError::Parse { row, col, value } => {
                assert_eq!((row, col), (0, 1));
                assert_eq!(value, "abc");
            }
            other => panic!("Unexpected error {other}"),
        }
    }

    #[test]
    fn file_round_trip() {
        let dir = scratch_dir("roundtrip");
        fs::create_dir_all(&dir).unwrap();
        let path = dir.join("m.csv");
        let m = DMatrix::from_fn(4, 3, |r, c| (r as f64) * 0.1 - (c as f64) / 3.0);
        save_table(&path, &m).unwrap();
        let back = load_table(&path, 4, 3).unwrap();
        assert_eq!(back, m);
        fs::remove_dir_all(&dir).ok();
    }

    #[test]
    fn missing_file_is_io_error() {
        let path = scratch_dir("absent").join("nope.csv");
        assert!(matches!(load_table(path, 1, 1), Err(SimError::Io(_))));
    }

    #[test]
    fn csv_directory_creates_dir() {
        let dir = scratch_dir("sink").join("nested");
        let mut sink = CsvDirectory::new(&dir);
        sink.save("state", &DMatrix::from_element(2, 2, 1.5)).unwrap();
        let back = load_table(sink.path_for("state"), 2, 2).unwrap();
        assert_eq!(back[(1, 1)], 1.5);
        fs::remove_dir_all(dir.parent().unwrap()).ok();
    }

    #[test]
    fn memory_sink_overwrites() {
        let mut sink = MemorySink::new();
        sink.save("t", &DMatrix::zeros(1, 1)).unwrap();
        sink.save("t", &DMatrix::from_element(2, 1, 3.0)).unwrap();
        assert_eq!(sink.get("t").unwrap().nrows(), 2);
        assert_eq!(sink.tables().len(), 1);
        assert!(sink.get("missing").is_none());
    }
}
