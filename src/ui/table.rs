use tabled::{Table, Tabled, settings::Style};

use crate::bundle::BuildStats;

#[derive(Tabled)]
pub struct TableRow {
    #[tabled(rename = "Metric")]
    pub metric: String,
    #[tabled(rename = "Value")]
    pub value: String,
}

#[derive(Default)]
pub struct TableBuilder {
    rows: Vec<TableRow>,
}

impl TableBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_row(&mut self, label: &str, value: impl ToString) {
        self.rows.push(TableRow {
            metric: label.to_string(),
            value: value.to_string(),
        });
    }

    pub fn build(&self) -> String {
        if self.rows.is_empty() {
            return String::new();
        }
        Table::new(&self.rows).with(Style::rounded()).to_string()
    }
}

pub fn build_stats_table(stats: &BuildStats) -> String {
    let mut builder = TableBuilder::new();
    builder.add_row("Modules", stats.graph.modules);
    builder.add_row("External modules", stats.graph.externals);
    builder.add_row(
        "Statements included",
        format!("{} / {}", stats.graph.included, stats.graph.statements),
    );
    builder.add_row("Side-effect passes", stats.passes);
    builder.add_row("Renamed", stats.renamed);
    builder.add_row("Duration", format!("{}ms", stats.duration_ms));
    builder.build()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_table_renders_nothing() {
        assert_eq!(TableBuilder::new().build(), "");
    }

    #[test]
    fn test_rows_are_rendered() {
        let mut builder = TableBuilder::new();
        builder.add_row("Modules", 3);
        builder.add_row("Renamed", "1");
        let table = builder.build();
        assert!(table.contains("Metric"));
        assert!(table.contains("Modules"));
        assert!(table.contains("3"));
    }
}
