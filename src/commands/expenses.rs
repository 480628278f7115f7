// Copyright (c) 2025 Soumyadip Sarkar.
// All rights reserved.
//
// This source code is licensed under the license found in the
// LICENSE file in the root directory of this source tree.

use crate::models::{ExpensePatch, NewExpense};
use crate::store::{ExpenseFilter, Store};
use crate::utils::{
    fmt_opt, maybe_print_json, opt_trimmed, parse_date, parse_month, parse_positive, pretty_table,
};
use anyhow::Result;
use serde::Serialize;

pub fn handle(store: &Store, m: &clap::ArgMatches) -> Result<()> {
    match m.subcommand() {
        Some(("add", sub)) => add(store, sub)?,
        Some(("list", sub)) => list(store, sub)?,
        Some(("update", sub)) => update(store, sub)?,
        Some(("rm", sub)) => {
            let id = *sub.get_one::<i64>("id").unwrap();
            let e = store.delete_expense(id)?;
            println!("Removed expense {} ({} on {})", id, e.amount, e.date);
        }
        _ => {}
    }
    Ok(())
}

fn add(store: &Store, sub: &clap::ArgMatches) -> Result<()> {
    let car_id = *sub.get_one::<i64>("car").unwrap();
    let e = NewExpense {
        date: parse_date(sub.get_one::<String>("date").unwrap())?,
        amount: parse_positive(sub.get_one::<String>("amount").unwrap(), "Amount")?,
        category: sub.get_one::<String>("category").unwrap().trim().to_string(),
        description: opt_trimmed(sub, "description"),
        mileage: sub.get_one::<i64>("mileage").copied(),
    };
    let id = store.add_expense(car_id, &e)?;
    println!(
        "Recorded expense {}: {} on {} ({}) for car {}",
        id, e.amount, e.date, e.category, car_id
    );
    Ok(())
}

fn list(store: &Store, sub: &clap::ArgMatches) -> Result<()> {
    let json_flag = sub.get_flag("json");
    let jsonl_flag = sub.get_flag("jsonl");
    let data = query_rows(store, sub)?;
    if !maybe_print_json(json_flag, jsonl_flag, &data)? {
        let rows: Vec<Vec<String>> = data
            .iter()
            .map(|r| {
                vec![
                    r.id.to_string(),
                    r.date.clone(),
                    r.amount.clone(),
                    r.category.clone(),
                    r.description.clone(),
                    r.mileage.clone(),
                ]
            })
            .collect();
        println!(
            "{}",
            pretty_table(
                &["ID", "Date", "Amount", "Category", "Description", "Mileage"],
                rows,
            )
        );
    }
    Ok(())
}

#[derive(Serialize)]
pub struct ExpenseRow {
    pub id: i64,
    pub date: String,
    pub amount: String,
    pub category: String,
    pub description: String,
    pub mileage: String,
}

pub fn query_rows(store: &Store, sub: &clap::ArgMatches) -> Result<Vec<ExpenseRow>> {
    let car_id = *sub.get_one::<i64>("car").unwrap();
    let filter = ExpenseFilter {
        month: match sub.get_one::<String>("month") {
            Some(m) => Some(parse_month(m)?),
            None => None,
        },
        category: opt_trimmed(sub, "category"),
        limit: sub.get_one::<usize>("limit").copied(),
    };
    let data = store
        .expenses(car_id, &filter)?
        .into_iter()
        .map(|e| ExpenseRow {
            id: e.id,
            date: e.date.to_string(),
            amount: format!("{:.2}", e.amount),
            category: e.category.unwrap_or_default(),
            description: e.description.unwrap_or_default(),
            mileage: fmt_opt(&e.mileage),
        })
        .collect();
    Ok(data)
}

fn update(store: &Store, sub: &clap::ArgMatches) -> Result<()> {
    let id = *sub.get_one::<i64>("id").unwrap();
    let patch = ExpensePatch {
        date: match sub.get_one::<String>("date") {
            Some(s) => Some(parse_date(s)?),
            None => None,
        },
        amount: match sub.get_one::<String>("amount") {
            Some(s) => Some(parse_positive(s, "Amount")?),
            None => None,
        },
        category: opt_trimmed(sub, "category"),
        description: opt_trimmed(sub, "description"),
        mileage: sub.get_one::<i64>("mileage").copied(),
    };
    store.update_expense(id, &patch)?;
    println!("Updated expense {}", id);
    Ok(())
}
