//! ClickHouse DDL for span metric views

use serde::{Deserialize, Serialize};

use crate::sql::quote_ident;
use crate::view::ViewDefinition;

/// Where views are created and which tables they connect
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DdlOptions {
    /// Adds `ON CLUSTER` to every statement when set
    pub cluster: Option<String>,
    /// Source table, aliased as `s`
    pub spans_table: String,
    /// Target table of the materialized views
    pub measure_table: String,
}

impl Default for DdlOptions {
    fn default() -> Self {
        Self {
            cluster: None,
            spans_table: "spans_index".to_string(),
            measure_table: "measure_minutes".to_string(),
        }
    }
}

impl DdlOptions {
    fn write_on_cluster(&self, b: &mut String) {
        if let Some(cluster) = self.cluster.as_deref().filter(|c| !c.is_empty()) {
            b.push_str(" ON CLUSTER ");
            b.push_str(&quote_ident(cluster));
        }
    }
}

pub fn drop_view_sql(view: &ViewDefinition, options: &DdlOptions) -> String {
    let mut b = String::from("DROP VIEW IF EXISTS ");
    b.push_str(&quote_ident(&view.view_name));
    options.write_on_cluster(&mut b);
    b
}

pub fn create_view_sql(view: &ViewDefinition, options: &DdlOptions) -> String {
    let mut b = String::from("CREATE MATERIALIZED VIEW ");
    b.push_str(&quote_ident(&view.view_name));
    options.write_on_cluster(&mut b);

    b.push_str("\nTO ");
    b.push_str(&options.measure_table);
    b.push_str(" AS\nSELECT ");
    b.push_str(&view.select_sql());
    b.push_str("\nFROM ");
    b.push_str(&options.spans_table);
    b.push_str(" AS s");

    if let Some(filter) = &view.filter {
        b.push_str("\nWHERE ");
        b.push_str(filter);
    }

    b.push_str("\nGROUP BY ");
    b.push_str(&view.group_by_sql());
    b
}
