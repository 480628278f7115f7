// Copyright (c) 2025 Soumyadip Sarkar.
// All rights reserved.
//
// This source code is licensed under the license found in the
// LICENSE file in the root directory of this source tree.

use crate::amortization::month_bucket;
use crate::store::{ExpenseFilter, Store};
use crate::utils::{date_to_utc, pretty_table};
use anyhow::Result;
use std::collections::BTreeMap;

/// One finding: check name and a human-readable detail.
pub type Issue = (String, String);

/// Runs every consistency check over the cars visible to the caller.
pub fn check(store: &Store) -> Result<Vec<Issue>> {
    let mut issues = Vec::new();
    for (car, _) in store.list_cars()? {
        let label = format!("car {} '{}'", car.id, car.name);

        if car.has_any_loan_field() && car.loan_terms().is_none() {
            issues.push((
                "partial_loan".into(),
                format!("{}: loan amount, term, payment and purchase date must all be set", label),
            ));
        }

        let payments = store.loan_payments(car.id)?;
        if let Some(purchased) = car.purchase_date {
            let origin = date_to_utc(purchased);
            for p in payments.iter().filter(|p| p.date < origin) {
                issues.push((
                    "payment_before_purchase".into(),
                    format!("{}: {} paid {} before purchase on {}", label, p.amount, p.date.date_naive(), purchased),
                ));
            }
        }

        let mut buckets: BTreeMap<(i32, u32), usize> = BTreeMap::new();
        for p in &payments {
            *buckets.entry(month_bucket(p.date)).or_default() += 1;
        }
        for ((y, m), n) in buckets.into_iter().filter(|(_, n)| *n > 1) {
            issues.push((
                "duplicate_bucket".into(),
                format!("{}: {} loan payments in {:04}-{:02}", label, n, y, m),
            ));
        }

        for e in store.expenses(car.id, &ExpenseFilter::default())? {
            if let Some(sold) = car.sold_date.filter(|sold| e.date > *sold) {
                issues.push((
                    "expense_after_sale".into(),
                    format!("{}: expense {} on {} after sale on {}", label, e.id, e.date, sold),
                ));
            }
            if e.category.is_none() {
                issues.push((
                    "orphan_category".into(),
                    format!("{}: expense {} has no category", label, e.id),
                ));
            }
        }
    }
    tracing::debug!(count = issues.len(), "doctor finished");
    Ok(issues)
}

pub fn handle(store: &Store) -> Result<()> {
    let issues = check(store)?;
    if issues.is_empty() {
        println!("doctor: no issues found");
    } else {
        let rows = issues.into_iter().map(|(k, v)| vec![k, v]).collect();
        println!("{}", pretty_table(&["Issue", "Detail"], rows));
    }
    Ok(())
}
