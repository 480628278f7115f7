// Copyright (c) AlphaVelocity.
// All rights reserved.
//
// This source code is licensed under the license found in the
// LICENSE file in the root directory of this source tree.

use crate::config::loan_category;
use crate::store::Store;
use crate::utils::pretty_table;
use anyhow::{Result, anyhow};
use rusqlite::{Connection, params};

/// Listing is open; adding or removing a category needs a caller.
pub fn handle(conn: &Connection, m: &clap::ArgMatches, identity: Option<&str>) -> Result<()> {
    match m.subcommand() {
        Some(("add", sub)) => {
            let store = Store::login(conn, identity)?;
            let name = sub.get_one::<String>("name").unwrap().trim();
            if name.is_empty() {
                return Err(anyhow!("Category name cannot be empty"));
            }
            conn.execute("INSERT INTO categories(name) VALUES (?1)", params![name])?;
            tracing::debug!(name, by = %store.user().email, "category added");
            println!("Added category '{}'", name);
        }
        Some(("list", _)) => {
            let loan = loan_category(conn)?;
            let mut stmt = conn.prepare("SELECT name FROM categories ORDER BY name")?;
            let rows = stmt.query_map([], |r| r.get::<_, String>(0))?;
            let mut data = Vec::new();
            for row in rows {
                let name = row?;
                let marker = if name == loan { "loan payments" } else { "" };
                data.push(vec![name, marker.to_string()]);
            }
            println!("{}", pretty_table(&["Category", ""], data));
        }
        Some(("rm", sub)) => {
            let store = Store::login(conn, identity)?;
            let name = sub.get_one::<String>("name").unwrap().trim();
            if name == loan_category(conn)? {
                return Err(anyhow!(
                    "Category '{}' holds loan payments and cannot be removed",
                    name
                ));
            }
            let n = conn.execute("DELETE FROM categories WHERE name=?1", params![name])?;
            if n == 0 {
                return Err(anyhow!("Category '{}' not found", name));
            }
            tracing::debug!(name, by = %store.user().email, "category removed");
            println!("Removed category '{}'", name);
        }
        _ => {}
    }
    Ok(())
}
