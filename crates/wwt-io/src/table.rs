//! In-memory tables bound to table layers
//!
//! A `Table` is an ordered set of equally long columns, each carrying an
//! optional unit symbol. Layers read column names and units from it for
//! coordinate auto-detection, and ship it to the engine as CSV.

use crate::reader::{IoError, IoResult};
use crate::schema::{ColumnDescriptor, DataColumn, DataSchema};

/// Ordered collection of named columns
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Table {
    descriptors: Vec<ColumnDescriptor>,
    columns: Vec<DataColumn>,
}

impl Table {
    /// Create an empty table
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder-style column append
    pub fn with_column(
        mut self,
        name: impl Into<String>,
        unit: Option<&str>,
        data: DataColumn,
    ) -> IoResult<Self> {
        let mut descriptor = ColumnDescriptor::new(name, data.dtype());
        if let Some(unit) = unit {
            descriptor = descriptor.with_unit(unit);
        }
        self.add_column(descriptor, data)?;
        Ok(self)
    }

    /// Append a column; every column must have the same number of rows
    pub fn add_column(&mut self, descriptor: ColumnDescriptor, data: DataColumn) -> IoResult<()> {
        if self.descriptors.iter().any(|d| d.name == descriptor.name) {
            return Err(IoError::DuplicateColumn(descriptor.name));
        }
        if let Some(first) = self.columns.first() {
            if first.len() != data.len() {
                return Err(IoError::LengthMismatch {
                    name: descriptor.name,
                    expected: first.len(),
                    actual: data.len(),
                });
            }
        }
        let descriptor = ColumnDescriptor {
            dtype: data.dtype(),
            ..descriptor
        };
        self.descriptors.push(descriptor);
        self.columns.push(data);
        Ok(())
    }

    /// Column names in table order
    pub fn column_names(&self) -> Vec<&str> {
        self.descriptors.iter().map(|d| d.name.as_str()).collect()
    }

    /// Whether a column with this exact name exists
    pub fn has_column(&self, name: &str) -> bool {
        self.descriptors.iter().any(|d| d.name == name)
    }

    /// Column data by name
    pub fn column(&self, name: &str) -> Option<&DataColumn> {
        self.index_of(name).map(|i| &self.columns[i])
    }

    /// Column descriptor by name
    pub fn descriptor(&self, name: &str) -> Option<&ColumnDescriptor> {
        self.index_of(name).map(|i| &self.descriptors[i])
    }

    /// Unit symbol of a column, if it has one
    pub fn unit(&self, name: &str) -> Option<&str> {
        self.descriptor(name).and_then(|d| d.unit.as_deref())
    }

    /// Number of rows
    pub fn num_rows(&self) -> usize {
        self.columns.first().map(DataColumn::len).unwrap_or(0)
    }

    /// Number of columns
    pub fn num_columns(&self) -> usize {
        self.columns.len()
    }

    /// Schema view of this table
    pub fn schema(&self) -> DataSchema {
        DataSchema::new(self.descriptors.clone(), self.num_rows())
    }

    /// Iterate rows as rendered cell text
    pub fn rows(&self) -> impl Iterator<Item = Vec<String>> + '_ {
        (0..self.num_rows()).map(move |row| {
            self.columns
                .iter()
                .map(|c| c.cell_text(row).unwrap_or_default())
                .collect()
        })
    }

    fn index_of(&self, name: &str) -> Option<usize> {
        self.descriptors.iter().position(|d| d.name == name)
    }
}
