// Copyright (c) 2025 Soumyadip Sarkar.
// All rights reserved.
//
// This source code is licensed under the license found in the
// LICENSE file in the root directory of this source tree.

use crate::config::{currency_symbol, loan_category, paid_off_rule};
use crate::loans;
use crate::store::{ExpenseFilter, Store};
use crate::utils::{as_of, fmt_money, maybe_print_json, pretty_table};
use anyhow::Result;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::Serialize;
use std::collections::BTreeMap;

pub fn handle(store: &Store, m: &clap::ArgMatches) -> Result<()> {
    match m.subcommand() {
        Some(("summary", sub)) => summary(store, sub)?,
        Some(("monthly", sub)) => monthly(store, sub)?,
        _ => {}
    }
    Ok(())
}

#[derive(Debug, Serialize)]
pub struct OwnershipSummary {
    pub car_id: i64,
    pub purchase_price: Decimal,
    pub sale_price: Decimal,
    /// Non-loan expenses by category.
    pub by_category: BTreeMap<String, Decimal>,
    pub running_costs: Decimal,
    pub loan_payments: Decimal,
    pub loan_interest: Decimal,
    /// Purchase price plus running costs and loan interest, less sale price.
    pub net_cost: Decimal,
}

pub fn ownership_summary(
    store: &Store,
    car_id: i64,
    now: DateTime<Utc>,
) -> Result<OwnershipSummary> {
    let car = store.car(car_id)?;
    let loan_cat = loan_category(store.conn())?;
    let mut by_category: BTreeMap<String, Decimal> = BTreeMap::new();
    let mut loan_payments = Decimal::ZERO;
    for e in store.expenses(car_id, &ExpenseFilter::default())? {
        let cat = e.category.unwrap_or_else(|| "(uncategorized)".into());
        if cat == loan_cat {
            loan_payments += e.amount;
        } else {
            *by_category.entry(cat).or_insert(Decimal::ZERO) += e.amount;
        }
    }
    let running_costs: Decimal = by_category.values().copied().sum();
    let loan_interest = loans::loan_details(store, car_id, now, paid_off_rule(store.conn())?)?
        .map(|d| d.total_interest)
        .unwrap_or(Decimal::ZERO);
    let purchase_price = car.purchase_price.unwrap_or(Decimal::ZERO);
    let sale_price = car.sold_price.unwrap_or(Decimal::ZERO);
    Ok(OwnershipSummary {
        car_id,
        purchase_price,
        sale_price,
        net_cost: purchase_price + running_costs + loan_interest - sale_price,
        by_category,
        running_costs,
        loan_payments,
        loan_interest,
    })
}

fn summary(store: &Store, sub: &clap::ArgMatches) -> Result<()> {
    let car_id = *sub.get_one::<i64>("car").unwrap();
    let now = as_of(sub.get_one::<String>("as-of"))?;
    let s = ownership_summary(store, car_id, now)?;
    if maybe_print_json(sub.get_flag("json"), sub.get_flag("jsonl"), &s)? {
        return Ok(());
    }
    let sym = currency_symbol(store.conn())?;
    let mut rows = vec![vec!["Purchase price".to_string(), fmt_money(&s.purchase_price, &sym)]];
    for (cat, amt) in &s.by_category {
        rows.push(vec![format!("  {}", cat), fmt_money(amt, &sym)]);
    }
    rows.push(vec!["Running costs".into(), fmt_money(&s.running_costs, &sym)]);
    rows.push(vec!["Loan payments".into(), fmt_money(&s.loan_payments, &sym)]);
    rows.push(vec!["  of which interest".into(), fmt_money(&s.loan_interest, &sym)]);
    rows.push(vec!["Sale price".into(), fmt_money(&-s.sale_price, &sym)]);
    rows.push(vec!["Net cost of ownership".into(), fmt_money(&s.net_cost, &sym)]);
    println!("{}", pretty_table(&["Item", "Amount"], rows));
    Ok(())
}

fn monthly(store: &Store, sub: &clap::ArgMatches) -> Result<()> {
    let json_flag = sub.get_flag("json");
    let jsonl_flag = sub.get_flag("jsonl");
    let car_id = *sub.get_one::<i64>("car").unwrap();
    let months: usize = *sub.get_one::<usize>("months").unwrap_or(&12);
    let loan_cat = loan_category(store.conn())?;

    let mut map: BTreeMap<String, (Decimal, Decimal)> = BTreeMap::new();
    for e in store.expenses(car_id, &ExpenseFilter::default())? {
        let key = e.date.format("%Y-%m").to_string();
        let entry = map.entry(key).or_insert((Decimal::ZERO, Decimal::ZERO));
        if e.category.as_deref() == Some(loan_cat.as_str()) {
            entry.1 += e.amount;
        } else {
            entry.0 += e.amount;
        }
    }
    let mut data = Vec::new();
    for (m, (running, loan)) in map.iter().rev().take(months) {
        data.push(vec![
            m.clone(),
            format!("{:.2}", running),
            format!("{:.2}", loan),
            format!("{:.2}", running + loan),
        ]);
    }
    if !maybe_print_json(json_flag, jsonl_flag, &data)? {
        println!(
            "{}",
            pretty_table(&["Month", "Running costs", "Loan", "Total"], data)
        );
    }
    Ok(())
}
