// Copyright (c) 2025 Soumyadip Sarkar.
// All rights reserved.
//
// This source code is licensed under the license found in the
// LICENSE file in the root directory of this source tree.

use crate::errors::Action;
use crate::models::NewExpense;
use crate::store::{Store, insert_expense};
use crate::utils::{parse_date, parse_positive};
use anyhow::{Context, Result};
use csv::ReaderBuilder;
use std::path::Path;

pub fn handle(store: &Store, m: &clap::ArgMatches) -> Result<()> {
    match m.subcommand() {
        Some(("expenses", sub)) => {
            let car_id = *sub.get_one::<i64>("car").unwrap();
            let path = sub.get_one::<String>("path").unwrap().trim();
            let n = import_expenses(store, car_id, Path::new(path))?;
            println!("Imported {} expenses from {}", n, path);
            Ok(())
        }
        _ => Ok(()),
    }
}

/// Imports `date,amount,category,description,mileage` rows (header
/// required) into one car. All rows land or none do.
pub fn import_expenses(store: &Store, car_id: i64, path: &Path) -> Result<usize> {
    let (car, _) = store.authorize(car_id, Action::Update)?;
    let mut rdr = ReaderBuilder::new()
        .has_headers(true)
        .flexible(true)
        .from_path(path)
        .with_context(|| format!("Open CSV {}", path.display()))?;

    let tx = store.conn().unchecked_transaction()?;
    let mut count = 0;
    for (idx, result) in rdr.records().enumerate() {
        let line = idx + 2;
        let rec = result?;
        let date_raw = rec.get(0).context("date missing")?.trim();
        let amount_raw = rec.get(1).context("amount missing")?.trim();
        let category = rec.get(2).context("category missing")?.trim();
        let description = rec
            .get(3)
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(str::to_string);
        let mileage = match rec.get(4).map(str::trim).filter(|s| !s.is_empty()) {
            Some(m) => Some(
                m.parse::<i64>()
                    .with_context(|| format!("Line {}: invalid mileage '{}'", line, m))?,
            ),
            None => None,
        };
        let e = NewExpense {
            date: parse_date(date_raw).with_context(|| format!("Line {}", line))?,
            amount: parse_positive(amount_raw, "Amount").with_context(|| format!("Line {}", line))?,
            category: category.to_string(),
            description,
            mileage,
        };
        insert_expense(&tx, &car, store.user().id, &e).with_context(|| format!("Line {}", line))?;
        count += 1;
    }
    tx.commit()?;
    tracing::info!(car_id, count, path = %path.display(), "expenses imported");
    Ok(count)
}
