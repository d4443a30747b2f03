use std::fs;
use std::path::Path;

use anyhow::Context;
use spanmetrics::{query_to_sql, SpansIndexResolver};

/// Strip comments starting with # from the query
fn strip_comments(content: &str) -> String {
    content
        .lines()
        .filter(|line| !line.trim_start().starts_with('#'))
        .collect::<Vec<_>>()
        .join("\n")
        .trim()
        .to_string()
}

fn main() -> anyhow::Result<()> {
    let queries_dir = Path::new("crates/spanmetrics/queries");

    let entries = fs::read_dir(queries_dir)
        .with_context(|| format!("read {}", queries_dir.display()))?;

    for entry in entries {
        let path = entry?.path();
        if path.extension().and_then(|s| s.to_str()) != Some("upql") {
            continue;
        }

        let content = fs::read_to_string(&path)?;
        let query = strip_comments(&content);
        if query.is_empty() {
            continue;
        }

        match query_to_sql(&query, &SpansIndexResolver) {
            Ok(sql) => {
                let sql_path = path.with_extension("sql");
                fs::write(&sql_path, format!("{}\n", sql))?;
                println!("Generated: {}", sql_path.display());
            }
            Err(e) => {
                eprintln!("Error converting {}: {}", path.display(), e);
            }
        }
    }

    Ok(())
}
