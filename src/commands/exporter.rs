// Copyright (c) 2025 Soumyadip Sarkar.
// All rights reserved.
//
// This source code is licensed under the license found in the
// LICENSE file in the root directory of this source tree.

use crate::store::{ExpenseFilter, Store};
use anyhow::{Context, Result, anyhow};
use serde_json::json;
use std::path::Path;

pub fn handle(store: &Store, m: &clap::ArgMatches) -> Result<()> {
    match m.subcommand() {
        Some(("expenses", sub)) => {
            let car_id = *sub.get_one::<i64>("car").unwrap();
            let fmt = sub.get_one::<String>("format").unwrap().to_lowercase();
            let out = sub.get_one::<String>("out").unwrap();
            let n = export_expenses(store, car_id, &fmt, Path::new(out))?;
            println!("Exported {} expenses to {}", n, out);
            Ok(())
        }
        _ => Ok(()),
    }
}

/// Writes every expense of a car, oldest first, in the importer's column
/// order so a CSV export can be imported again.
pub fn export_expenses(store: &Store, car_id: i64, fmt: &str, out: &Path) -> Result<usize> {
    let mut rows = store.expenses(car_id, &ExpenseFilter::default())?;
    rows.reverse();
    match fmt {
        "csv" => {
            let mut wtr = csv::Writer::from_path(out)
                .with_context(|| format!("Create {}", out.display()))?;
            wtr.write_record(["date", "amount", "category", "description", "mileage"])?;
            for e in &rows {
                wtr.write_record([
                    e.date.to_string(),
                    e.amount.to_string(),
                    e.category.clone().unwrap_or_default(),
                    e.description.clone().unwrap_or_default(),
                    e.mileage.map(|m| m.to_string()).unwrap_or_default(),
                ])?;
            }
            wtr.flush()?;
        }
        "json" => {
            let items: Vec<_> = rows
                .iter()
                .map(|e| {
                    json!({
                        "id": e.id,
                        "date": e.date.to_string(),
                        "amount": e.amount.to_string(),
                        "category": e.category,
                        "description": e.description,
                        "mileage": e.mileage,
                    })
                })
                .collect();
            std::fs::write(out, serde_json::to_string_pretty(&items)?)
                .with_context(|| format!("Write {}", out.display()))?;
        }
        other => return Err(anyhow!("Unknown format: {} (use csv|json)", other)),
    }
    tracing::debug!(car_id, count = rows.len(), fmt, "expenses exported");
    Ok(rows.len())
}
