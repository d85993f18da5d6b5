// Small dev utility: dump the database structure (tables, columns, keys, unique indexes) as JSON.
//
// Usage:
//   cargo run --bin export_schema -- [db_path] [output.json]
//
// Missing tables are created first, so a fresh path yields the full schema.
// Without an output path the JSON goes to stdout.

use clinic_billing_import::config::get_default_db_path;
use clinic_billing_import::db::{describe_schema, init_schema, open_sqlite_connection};
use serde_json::json;

fn main() -> anyhow::Result<()> {
    let mut args = std::env::args().skip(1);
    let db_path = args.next().unwrap_or_else(get_default_db_path);
    let output = args.next();

    let conn = open_sqlite_connection(&db_path)?;
    init_schema(&conn)?;
    let tables = describe_schema(&conn)?;

    let document = json!({
        "database": db_path,
        "tables": tables,
    });
    let text = serde_json::to_string_pretty(&document)?;

    match output {
        Some(path) => {
            std::fs::write(&path, text)?;
            eprintln!("schema written to {} ({} tables)", path, tables.len());
        }
        None => println!("{}", text),
    }
    Ok(())
}
