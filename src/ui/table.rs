use crate::value::ValueType;
use tabled::{settings::Style, Table, Tabled};

#[derive(Tabled)]
pub struct EntryRow {
    #[tabled(rename = "Key")]
    pub key: String,
    #[tabled(rename = "Type")]
    pub ty: String,
    #[tabled(rename = "Value")]
    pub value: String,
}

#[derive(Tabled)]
pub struct StatRow {
    #[tabled(rename = "Type")]
    pub ty: String,
    #[tabled(rename = "Rows")]
    pub rows: usize,
}

/// Collects key/type/value rows and renders them as one table.
pub struct TableBuilder {
    rows: Vec<EntryRow>,
}

impl TableBuilder {
    pub fn new() -> Self {
        Self { rows: Vec::new() }
    }

    pub fn add_row(&mut self, key: &str, ty: ValueType, value: &str) {
        self.rows.push(EntryRow {
            key: key.to_string(),
            ty: ty.to_string(),
            value: value.to_string(),
        });
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn build(&self) -> String {
        if self.rows.is_empty() {
            return String::new();
        }

        Table::new(&self.rows).with(Style::rounded()).to_string()
    }
}

impl Default for TableBuilder {
    fn default() -> Self {
        Self::new()
    }
}

pub fn stats_table(stats: &[(ValueType, usize)]) -> String {
    let rows: Vec<StatRow> = stats
        .iter()
        .map(|(ty, rows)| StatRow {
            ty: ty.to_string(),
            rows: *rows,
        })
        .collect();
    Table::new(rows).with(Style::rounded()).to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_table_renders_nothing() {
        assert_eq!(TableBuilder::new().build(), "");
    }

    #[test]
    fn test_rows_rendered() {
        let mut builder = TableBuilder::new();
        builder.add_row("volume", ValueType::Int, "11");
        builder.add_row("name", ValueType::String, "spinal tap");
        assert_eq!(builder.len(), 2);

        let table = builder.build();
        assert!(table.contains("Key"));
        assert!(table.contains("volume"));
        assert!(table.contains("spinal tap"));
        assert!(table.contains("int"));
    }

    #[test]
    fn test_stats_table() {
        let table = stats_table(&[(ValueType::Bool, 3)]);
        assert!(table.contains("bool"));
        assert!(table.contains('3'));
    }
}
