use crate::types::{ColumnId, Result, RowpackError};

use super::ColumnDescriptor;

/// An ordered key over a subset of table columns.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct IndexDef {
    name: String,
    columns: Vec<ColumnId>,
}

impl IndexDef {
    /// Creates an index definition; key order is the given column order.
    pub fn new(name: impl Into<String>, columns: impl IntoIterator<Item = impl Into<ColumnId>>) -> Self {
        Self {
            name: name.into(),
            columns: columns.into_iter().map(Into::into).collect(),
        }
    }

    /// Index name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Key columns in key order.
    pub fn columns(&self) -> &[ColumnId] {
        &self.columns
    }
}

/// A table: its columns in declaration order and its indexes.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct TableDef {
    name: String,
    columns: Vec<ColumnDescriptor>,
    indexes: Vec<IndexDef>,
}

impl TableDef {
    /// Creates a table. Column ids must be unique.
    pub fn new(name: impl Into<String>, columns: Vec<ColumnDescriptor>) -> Result<Self> {
        let name = name.into();
        for (i, col) in columns.iter().enumerate() {
            if columns[..i].iter().any(|prev| prev.id() == col.id()) {
                return Err(RowpackError::InvalidColumn {
                    column: col.name().to_string(),
                    reason: format!("duplicate column id {} in table `{name}`", col.id()),
                });
            }
        }
        Ok(Self {
            name,
            columns,
            indexes: Vec::new(),
        })
    }

    /// Adds an index; every key column must exist in the table.
    pub fn with_index(mut self, index: IndexDef) -> Result<Self> {
        for id in index.columns() {
            if self.column(*id).is_none() {
                return Err(RowpackError::ColumnNotInLayout { id: *id });
            }
        }
        self.indexes.push(index);
        Ok(self)
    }

    /// Table name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Columns in declaration order.
    pub fn columns(&self) -> &[ColumnDescriptor] {
        &self.columns
    }

    /// Looks up a column by id.
    pub fn column(&self, id: ColumnId) -> Option<&ColumnDescriptor> {
        self.columns.iter().find(|c| c.id() == id)
    }

    /// Looks up an index by name.
    pub fn index(&self, name: &str) -> Option<&IndexDef> {
        self.indexes.iter().find(|i| i.name() == name)
    }

    /// Declared indexes.
    pub fn indexes(&self) -> &[IndexDef] {
        &self.indexes
    }

    /// Columns of `ids`, in the order given.
    pub fn select(&self, ids: &[ColumnId]) -> Result<Vec<ColumnDescriptor>> {
        ids.iter()
            .map(|id| {
                self.column(*id)
                    .cloned()
                    .ok_or(RowpackError::ColumnNotInLayout { id: *id })
            })
            .collect()
    }
}
