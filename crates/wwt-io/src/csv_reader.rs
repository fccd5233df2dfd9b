//! CSV table reader/writer with type inference
//!
//! Headers may carry a unit suffix, either `dist [km]` or `dist (km)`; the
//! unit is stripped from the column name and recorded on its descriptor.

use crate::reader::{DataReader, IoError, IoResult};
use crate::schema::{ColumnDescriptor, ColumnType, DataColumn, DataSchema};
use crate::table::Table;
use std::fs::File;
use std::io::BufReader;
use std::path::Path;

/// CSV file reader
pub struct CsvReader {
    schema: DataSchema,
    records: Vec<Vec<String>>,
}

impl CsvReader {
    /// Open a CSV file
    pub fn open(path: &str) -> IoResult<Self> {
        Self::open_with_options(path, b',', true)
    }

    /// Open a CSV file with options
    pub fn open_with_options(path: &str, delimiter: u8, has_header: bool) -> IoResult<Self> {
        if !Path::new(path).exists() {
            return Err(IoError::FileNotFound(path.to_string()));
        }

        let file = File::open(path).map_err(|e| IoError::OpenFailed(e.to_string()))?;
        let mut reader = csv::ReaderBuilder::new()
            .delimiter(delimiter)
            .has_headers(has_header)
            .from_reader(BufReader::new(file));

        let (schema, records) = Self::load(&mut reader, has_header)?;
        Ok(Self { schema, records })
    }

    /// Parse CSV text that is already in memory
    pub fn parse_str(text: &str) -> IoResult<Table> {
        let mut reader = csv::ReaderBuilder::new()
            .has_headers(true)
            .from_reader(text.as_bytes());
        let (schema, records) = Self::load(&mut reader, true)?;
        build_table(&schema, &records)
    }

    fn load<R: std::io::Read>(
        reader: &mut csv::Reader<R>,
        has_header: bool,
    ) -> IoResult<(DataSchema, Vec<Vec<String>>)> {
        let headers: Vec<String> = if has_header {
            reader
                .headers()
                .map_err(|e| IoError::InvalidFormat(e.to_string()))?
                .iter()
                .map(|s| s.to_string())
                .collect()
        } else {
            Vec::new()
        };

        let mut records = Vec::new();
        for result in reader.records() {
            let record = result.map_err(|e| IoError::InvalidFormat(e.to_string()))?;
            records.push(record.iter().map(|s| s.trim().to_string()).collect::<Vec<_>>());
        }

        let width = if has_header {
            headers.len()
        } else {
            records.first().map(Vec::len).unwrap_or(0)
        };
        let headers: Vec<String> = if has_header {
            headers
        } else {
            (0..width).map(|i| format!("col_{}", i)).collect()
        };

        // Infer types from the first 100 rows
        let columns: Vec<ColumnDescriptor> = headers
            .iter()
            .enumerate()
            .map(|(i, header)| {
                let sample: Vec<&str> = records
                    .iter()
                    .take(100)
                    .filter_map(|r| r.get(i).map(String::as_str))
                    .collect();
                let (name, unit) = split_header_unit(header);
                let mut descriptor = ColumnDescriptor::new(name, infer_type(&sample));
                if let Some(unit) = unit {
                    descriptor = descriptor.with_unit(unit);
                }
                descriptor
            })
            .collect();

        let num_records = records.len();
        Ok((DataSchema::new(columns, num_records), records))
    }
}

impl DataReader for CsvReader {
    fn read_schema(&self) -> IoResult<DataSchema> {
        Ok(self.schema.clone())
    }

    fn read_column(&self, name: &str) -> IoResult<DataColumn> {
        let col_index = self
            .schema
            .column_index(name)
            .ok_or_else(|| IoError::ColumnNotFound(name.to_string()))?;
        let dtype = self.schema.columns[col_index].dtype;
        Ok(parse_column(&self.records, col_index, dtype))
    }

    fn read_table(&self) -> IoResult<Table> {
        build_table(&self.schema, &self.records)
    }
}

/// Serialize a table as CSV with CRLF line endings, the form the engine parses
pub fn write_csv(table: &Table) -> IoResult<String> {
    let mut writer = csv::WriterBuilder::new()
        .terminator(csv::Terminator::CRLF)
        .from_writer(Vec::new());

    writer
        .write_record(table.column_names())
        .map_err(|e| IoError::Io(e.to_string()))?;
    for row in table.rows() {
        writer
            .write_record(&row)
            .map_err(|e| IoError::Io(e.to_string()))?;
    }

    let bytes = writer
        .into_inner()
        .map_err(|e| IoError::Io(e.to_string()))?;
    String::from_utf8(bytes).map_err(|e| IoError::InvalidFormat(e.to_string()))
}

fn build_table(schema: &DataSchema, records: &[Vec<String>]) -> IoResult<Table> {
    let mut table = Table::new();
    for (i, descriptor) in schema.columns.iter().enumerate() {
        let data = parse_column(records, i, descriptor.dtype);
        table.add_column(descriptor.clone(), data)?;
    }
    Ok(table)
}

/// Split `name [unit]` / `name (unit)` headers
fn split_header_unit(header: &str) -> (String, Option<String>) {
    let header = header.trim();
    for (open, close) in [('[', ']'), ('(', ')')] {
        if header.ends_with(close) {
            if let Some(start) = header.rfind(open) {
                let name = header[..start].trim();
                let unit = header[start + 1..header.len() - 1].trim();
                if !name.is_empty() && !unit.is_empty() {
                    return (name.to_string(), Some(unit.to_string()));
                }
            }
        }
    }
    (header.to_string(), None)
}

/// Infer column type from sample values
fn infer_type(values: &[&str]) -> ColumnType {
    let non_empty: Vec<&str> = values.iter().copied().filter(|s| !s.is_empty()).collect();
    if non_empty.is_empty() {
        return ColumnType::String;
    }

    if non_empty.iter().all(|s| s.parse::<i64>().is_ok()) {
        // Blank cells cannot be represented in an integer column
        if non_empty.len() == values.len() {
            return ColumnType::Int64;
        }
        return ColumnType::Float64;
    }

    if non_empty.iter().all(|s| s.parse::<f64>().is_ok()) {
        return ColumnType::Float64;
    }

    if non_empty
        .iter()
        .all(|s| matches!(s.to_lowercase().as_str(), "true" | "false"))
    {
        return ColumnType::Bool;
    }

    ColumnType::String
}

/// Parse one column of the loaded records
fn parse_column(records: &[Vec<String>], index: usize, dtype: ColumnType) -> DataColumn {
    let cells = records
        .iter()
        .map(|r| r.get(index).map(String::as_str).unwrap_or(""));
    match dtype {
        ColumnType::Float64 => {
            DataColumn::Float64(cells.map(|s| s.parse().unwrap_or(f64::NAN)).collect())
        }
        ColumnType::Int64 => DataColumn::Int64(cells.map(|s| s.parse().unwrap_or(0)).collect()),
        ColumnType::Bool => {
            DataColumn::Bool(cells.map(|s| s.eq_ignore_ascii_case("true")).collect())
        }
        ColumnType::String => DataColumn::String(cells.map(str::to_string).collect()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_infer_type_int() {
        assert_eq!(infer_type(&["1", "2", "3"]), ColumnType::Int64);
    }

    #[test]
    fn test_infer_type_int_with_blanks_is_float() {
        assert_eq!(infer_type(&["1", "", "3"]), ColumnType::Float64);
    }

    #[test]
    fn test_infer_type_float() {
        assert_eq!(infer_type(&["1.5", "2.7", "3.14"]), ColumnType::Float64);
    }

    #[test]
    fn test_infer_type_bool() {
        assert_eq!(infer_type(&["true", "FALSE"]), ColumnType::Bool);
    }

    #[test]
    fn test_infer_type_string() {
        assert_eq!(infer_type(&["hello", "world"]), ColumnType::String);
    }

    #[test]
    fn test_split_header_unit() {
        assert_eq!(
            split_header_unit("dist [km]"),
            ("dist".to_string(), Some("km".to_string()))
        );
        assert_eq!(
            split_header_unit("ra(deg)"),
            ("ra".to_string(), Some("deg".to_string()))
        );
        assert_eq!(split_header_unit("flux"), ("flux".to_string(), None));
        assert_eq!(split_header_unit("[x]"), ("[x]".to_string(), None));
    }

    #[test]
    fn test_parse_str_with_units() {
        let text = "ra [deg],dec [deg],name\n10.5,-3,a\n11,4.25,b\n";
        let table = CsvReader::parse_str(text).unwrap();
        assert_eq!(table.column_names(), vec!["ra", "dec", "name"]);
        assert_eq!(table.unit("dec"), Some("deg"));
        assert_eq!(
            table.column("ra"),
            Some(&DataColumn::Float64(vec![10.5, 11.0]))
        );
    }

    #[test]
    fn test_write_csv_uses_crlf() {
        let table = CsvReader::parse_str("a,b\n1,x\n2,y\n").unwrap();
        let text = write_csv(&table).unwrap();
        assert_eq!(text, "a,b\r\n1,x\r\n2,y\r\n");
    }

    #[test]
    fn test_open_file_round_trip() {
        let mut file = tempfile::Builder::new().suffix(".csv").tempfile().unwrap();
        write!(file, "lon [hourangle],lat [deg]\n1.0,2.0\n").unwrap();
        let reader = CsvReader::open(file.path().to_str().unwrap()).unwrap();
        let table = reader.read_table().unwrap();
        assert_eq!(table.unit("lon"), Some("hourangle"));
        assert_eq!(reader.read_schema().unwrap().num_records, 1);
    }

    #[test]
    fn test_missing_file() {
        assert!(matches!(
            CsvReader::open("/definitely/not/here.csv"),
            Err(IoError::FileNotFound(_))
        ));
    }
}
