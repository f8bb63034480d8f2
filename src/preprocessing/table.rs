//! Сырая таблица из загруженного CSV

use std::collections::HashSet;

use csv::ReaderBuilder;
use ndarray::Array2;

use crate::error::{PipelineError, Result};

/// Значения, которые считаются пропуском (как при чтении CSV в pandas)
const MISSING_MARKERS: [&str; 8] = ["", "NaN", "nan", "NA", "N/A", "null", "NULL", "None"];

/// Ячейка таблицы с динамическим типом
#[derive(Debug, Clone, PartialEq)]
pub enum Cell {
    Number(f64),
    Text(String),
    Missing,
}

impl Cell {
    /// Вывод типа ячейки из текстового значения
    pub fn parse(raw: &str) -> Self {
        let value = raw.trim();
        if MISSING_MARKERS.contains(&value) {
            return Cell::Missing;
        }
        match value.parse::<f64>() {
            Ok(number) if number.is_nan() => Cell::Missing,
            Ok(number) => Cell::Number(number),
            Err(_) => Cell::Text(value.to_string()),
        }
    }

    pub fn is_missing(&self) -> bool {
        matches!(self, Cell::Missing)
    }

    pub fn as_number(&self) -> Option<f64> {
        match self {
            Cell::Number(v) => Some(*v),
            _ => None,
        }
    }

    pub fn as_text(&self) -> Option<&str> {
        match self {
            Cell::Text(s) => Some(s.as_str()),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct CsvOptions {
    /// Строки, начинающиеся с этого байта, пропускаются
    pub comment: Option<u8>,
}

impl CsvOptions {
    pub fn with_comments(marker: u8) -> Self {
        Self {
            comment: Some(marker),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Column {
    pub name: String,
    pub cells: Vec<Cell>,
}

/// Упорядоченный набор именованных колонок одинаковой длины.
/// Порядок строк сохраняется на всех этапах обработки.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RawTable {
    columns: Vec<Column>,
    n_rows: usize,
}

impl RawTable {
    pub fn new(columns: Vec<Column>) -> Result<Self> {
        let n_rows = columns.first().map(|c| c.cells.len()).unwrap_or(0);
        if let Some(bad) = columns.iter().find(|c| c.cells.len() != n_rows) {
            return Err(PipelineError::Csv(format!(
                "column `{}` has {} rows, expected {}",
                bad.name,
                bad.cells.len(),
                n_rows
            )));
        }
        Ok(Self { columns, n_rows })
    }

    pub fn from_csv(bytes: &[u8], options: &CsvOptions) -> Result<Self> {
        let mut reader = ReaderBuilder::new()
            .has_headers(true)
            .flexible(true)
            .comment(options.comment)
            .from_reader(bytes);

        let headers = reader.headers()?.clone();
        if headers.is_empty() || headers.iter().all(|h| h.is_empty()) {
            return Err(PipelineError::Csv("no columns to parse from file".to_string()));
        }
        let names = dedup_headers(headers.iter().map(|h| h.trim_matches('\u{feff}')));

        let mut columns: Vec<Column> = names
            .into_iter()
            .map(|name| Column {
                name,
                cells: Vec::new(),
            })
            .collect();

        for (idx, record) in reader.records().enumerate() {
            let record = record?;
            // Строка данных после заголовка имеет номер 2 в файле
            if record.len() > columns.len() {
                return Err(PipelineError::Csv(format!(
                    "expected {} fields in line {}, saw {}",
                    columns.len(),
                    idx + 2,
                    record.len()
                )));
            }
            for (col, column) in columns.iter_mut().enumerate() {
                let cell = record.get(col).map(Cell::parse).unwrap_or(Cell::Missing);
                column.cells.push(cell);
            }
        }

        Self::new(columns)
    }

    pub fn n_rows(&self) -> usize {
        self.n_rows
    }

    pub fn n_cols(&self) -> usize {
        self.columns.len()
    }

    pub fn column_names(&self) -> Vec<&str> {
        self.columns.iter().map(|c| c.name.as_str()).collect()
    }

    pub fn contains(&self, name: &str) -> bool {
        self.columns.iter().any(|c| c.name == name)
    }

    pub fn column(&self, name: &str) -> Option<&Column> {
        self.columns.iter().find(|c| c.name == name)
    }

    pub fn cell(&self, name: &str, row: usize) -> Option<&Cell> {
        self.column(name).and_then(|c| c.cells.get(row))
    }

    pub fn number(&self, name: &str, row: usize) -> Option<f64> {
        self.cell(name, row).and_then(Cell::as_number)
    }

    pub fn text(&self, name: &str, row: usize) -> Option<String> {
        match self.cell(name, row)? {
            Cell::Text(s) => Some(s.clone()),
            Cell::Number(v) => Some(v.to_string()),
            Cell::Missing => None,
        }
    }

    /// Удаление колонок по именам; отсутствующие имена игнорируются
    pub fn drop_columns<S: AsRef<str>>(&mut self, names: &[S]) {
        let drop: HashSet<&str> = names.iter().map(|n| n.as_ref()).collect();
        self.columns.retain(|c| !drop.contains(c.name.as_str()));
    }

    /// Добавление колонки, полностью состоящей из пропусков
    pub fn insert_missing(&mut self, name: &str) {
        if self.contains(name) {
            return;
        }
        self.columns.push(Column {
            name: name.to_string(),
            cells: vec![Cell::Missing; self.n_rows],
        });
    }

    /// Переиндексация: ровно эти колонки и ровно в этом порядке.
    /// Отсутствующие колонки заполняются пропусками.
    pub fn select<S: AsRef<str>>(&self, names: &[S]) -> RawTable {
        let columns = names
            .iter()
            .map(|name| {
                let name = name.as_ref();
                self.column(name).cloned().unwrap_or_else(|| Column {
                    name: name.to_string(),
                    cells: vec![Cell::Missing; self.n_rows],
                })
            })
            .collect();
        RawTable {
            columns,
            n_rows: self.n_rows,
        }
    }

    /// Оставляет только строки, для которых `mask[i] == true`
    pub fn filter_rows(&self, mask: &[bool]) -> RawTable {
        let columns = self
            .columns
            .iter()
            .map(|c| Column {
                name: c.name.clone(),
                cells: c
                    .cells
                    .iter()
                    .zip(mask)
                    .filter(|(_, keep)| **keep)
                    .map(|(cell, _)| cell.clone())
                    .collect(),
            })
            .collect();
        RawTable {
            columns,
            n_rows: mask.iter().take(self.n_rows).filter(|k| **k).count(),
        }
    }

    /// Доля пропусков в колонке
    pub fn missing_fraction(&self, name: &str) -> Option<f64> {
        let column = self.column(name)?;
        if self.n_rows == 0 {
            return Some(1.0);
        }
        let missing = column.cells.iter().filter(|c| c.is_missing()).count();
        Some(missing as f64 / self.n_rows as f64)
    }

    /// Колонка не содержит текстовых значений
    pub fn is_numeric(&self, name: &str) -> bool {
        self.column(name)
            .map(|c| c.cells.iter().all(|cell| !matches!(cell, Cell::Text(_))))
            .unwrap_or(false)
    }

    /// Числовая матрица по указанным колонкам (NaN на месте пропусков)
    pub fn numeric_matrix<S: AsRef<str>>(&self, names: &[S]) -> Result<Array2<f64>> {
        let mut matrix = Array2::from_elem((self.n_rows, names.len()), f64::NAN);
        for (j, name) in names.iter().enumerate() {
            let Some(column) = self.column(name.as_ref()) else {
                continue;
            };
            for (i, cell) in column.cells.iter().enumerate() {
                matrix[[i, j]] = match cell {
                    Cell::Number(v) => *v,
                    Cell::Missing => f64::NAN,
                    Cell::Text(value) => {
                        return Err(PipelineError::NonNumeric {
                            column: column.name.clone(),
                            row: i,
                            value: value.clone(),
                        })
                    }
                };
            }
        }
        Ok(matrix)
    }
}

/// Повторяющиеся заголовки получают суффиксы `.1`, `.2`, ...
fn dedup_headers<'a>(headers: impl Iterator<Item = &'a str>) -> Vec<String> {
    let mut seen: HashSet<String> = HashSet::new();
    let mut names = Vec::new();
    for header in headers {
        let mut name = header.to_string();
        let mut suffix = 1;
        while seen.contains(&name) {
            name = format!("{}.{}", header, suffix);
            suffix += 1;
        }
        seen.insert(name.clone());
        names.push(name);
    }
    names
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cell_inference() {
        assert_eq!(Cell::parse("1.5"), Cell::Number(1.5));
        assert_eq!(Cell::parse(" 42 "), Cell::Number(42.0));
        assert_eq!(Cell::parse(""), Cell::Missing);
        assert_eq!(Cell::parse("NaN"), Cell::Missing);
        assert_eq!(Cell::parse("CONFIRMED"), Cell::Text("CONFIRMED".to_string()));
    }

    #[test]
    fn test_from_csv_pads_short_rows() {
        let csv = "a,b,c\n1,2,3\n4,5\n";
        let table = RawTable::from_csv(csv.as_bytes(), &CsvOptions::default()).unwrap();
        assert_eq!(table.n_rows(), 2);
        assert_eq!(table.cell("c", 1), Some(&Cell::Missing));
    }

    #[test]
    fn test_from_csv_rejects_long_rows() {
        let csv = "a,b\n1,2\n3,4,5\n";
        let err = RawTable::from_csv(csv.as_bytes(), &CsvOptions::default()).unwrap_err();
        assert!(matches!(err, PipelineError::Csv(_)));
    }

    #[test]
    fn test_comment_lines_skipped() {
        let csv = "# exported from archive\na,b\n1,2\n# note\n3,4\n";
        let table = RawTable::from_csv(csv.as_bytes(), &CsvOptions::with_comments(b'#')).unwrap();
        assert_eq!(table.column_names(), vec!["a", "b"]);
        assert_eq!(table.n_rows(), 2);
        assert_eq!(table.number("a", 1), Some(3.0));
    }

    #[test]
    fn test_headers_kept_as_written() {
        let csv = " a,b \n1,2\n";
        let table = RawTable::from_csv(csv.as_bytes(), &CsvOptions::default()).unwrap();
        assert_eq!(table.column_names(), vec![" a", "b "]);
        assert!(!table.contains("a"));
    }

    #[test]
    fn test_duplicate_headers_are_renamed() {
        let csv = "a,a,b\n1,2,3\n";
        let table = RawTable::from_csv(csv.as_bytes(), &CsvOptions::default()).unwrap();
        assert_eq!(table.column_names(), vec!["a", "a.1", "b"]);
    }

    #[test]
    fn test_drop_ignores_absent_columns() {
        let csv = "a,b\n1,2\n";
        let mut table = RawTable::from_csv(csv.as_bytes(), &CsvOptions::default()).unwrap();
        table.drop_columns(&["b", "zzz"]);
        assert_eq!(table.column_names(), vec!["a"]);
    }

    #[test]
    fn test_select_reorders_and_fills() {
        let csv = "b,a\n2,1\n";
        let table = RawTable::from_csv(csv.as_bytes(), &CsvOptions::default()).unwrap();
        let selected = table.select(&["a", "c", "b"]);
        assert_eq!(selected.column_names(), vec!["a", "c", "b"]);
        let m = selected.numeric_matrix(&["a", "c", "b"]).unwrap();
        assert_eq!(m[[0, 0]], 1.0);
        assert!(m[[0, 1]].is_nan());
        assert_eq!(m[[0, 2]], 2.0);
    }

    #[test]
    fn test_numeric_matrix_rejects_text() {
        let csv = "a\nhello\n";
        let table = RawTable::from_csv(csv.as_bytes(), &CsvOptions::default()).unwrap();
        let err = table.numeric_matrix(&["a"]).unwrap_err();
        assert!(matches!(err, PipelineError::NonNumeric { row: 0, .. }));
    }
}
