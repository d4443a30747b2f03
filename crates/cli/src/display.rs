use comfy_table::{presets::UTF8_FULL, Cell, ContentArrangement, Table};
use spanmetrics::{MetricRecord, ViewDefinition};
use upql::ast::LogicalOp;
use upql::{Ast, QueryPart};

fn new_table(header: &[&str]) -> Table {
    let mut table = Table::new();

    // Apply UTF8 preset for nice borders
    table.load_preset(UTF8_FULL);

    // Set content arrangement to dynamically adjust to terminal width
    table.set_content_arrangement(ContentArrangement::DynamicFullWidth);

    table.set_header(header.iter().map(|h| Cell::new(h)).collect::<Vec<_>>());
    table
}

/// One row per view, select columns one per line
pub fn views_table(views: &[ViewDefinition]) -> Table {
    let mut table = new_table(&["View", "Instrument", "Columns", "Group by", "Filter"]);

    for view in views {
        let columns: Vec<String> = view.select_columns.iter().map(|c| c.to_string()).collect();
        table.add_row(vec![
            Cell::new(&view.view_name),
            Cell::new(view.instrument),
            Cell::new(columns.join("\n")),
            Cell::new(view.group_by.join("\n")),
            Cell::new(view.filter.as_deref().unwrap_or("")),
        ]);
    }

    table
}

pub fn records_table(records: &[MetricRecord]) -> Table {
    let mut table = new_table(&["Project", "Metric", "Instrument", "Unit", "Description"]);

    for record in records {
        table.add_row(vec![
            Cell::new(record.project_id),
            Cell::new(&record.name),
            Cell::new(&record.instrument),
            Cell::new(&record.unit),
            Cell::new(&record.description),
        ]);
    }

    table
}

pub fn parts_table(parts: &[QueryPart]) -> Table {
    let mut table = new_table(&["Query", "Kind", "Parsed"]);

    for part in parts {
        let (kind, parsed) = match &part.ast {
            Ast::Selector(sel) => {
                let parsed = match &sel.alias {
                    Some(alias) => format!("{} AS {}", sel.expr, alias),
                    None => sel.expr.to_string(),
                };
                ("selector", parsed)
            }
            Ast::Where(w) => {
                let mut lines = Vec::with_capacity(w.conds.len());
                for (i, cond) in w.conds.iter().enumerate() {
                    if i == 0 {
                        lines.push(cond.to_string());
                    } else {
                        let sep = match cond.sep.op {
                            LogicalOp::And => "and",
                            LogicalOp::Or => "or",
                        };
                        lines.push(format!("{} {}", sep, cond));
                    }
                }
                ("where", lines.join("\n"))
            }
        };
        table.add_row(vec![Cell::new(&part.query), Cell::new(kind), Cell::new(parsed)]);
    }

    table
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parts_table() {
        let parts = upql::parse("p50(span.duration) as p50 | where a = 1 or not b exists").unwrap();
        let mut table = parts_table(&parts);
        table.set_content_arrangement(ContentArrangement::Disabled);
        let table = table.to_string();
        assert!(table.contains("p50(span.duration) AS p50"));
        assert!(table.contains("or not b exists"));
    }

    #[test]
    fn test_records_table() {
        let records = vec![MetricRecord {
            project_id: 7,
            name: "uptrace.tracing.events".to_string(),
            description: String::new(),
            unit: String::new(),
            instrument: "counter".to_string(),
        }];
        let mut table = records_table(&records);
        table.set_content_arrangement(ContentArrangement::Disabled);
        let table = table.to_string();
        assert!(table.contains("uptrace.tracing.events"));
        assert!(table.contains("Project"));
    }
}
