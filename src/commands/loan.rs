// Copyright (c) 2025 Soumyadip Sarkar.
// All rights reserved.
//
// This source code is licensed under the license found in the
// LICENSE file in the root directory of this source tree.

use crate::config::{currency_symbol, loan_category, paid_off_rule};
use crate::loans::{self, NextPayment};
use crate::models::{LoanInput, NewExpense};
use crate::store::Store;
use crate::utils::{
    as_of, fmt_money, fmt_opt, maybe_print_json, opt_trimmed, parse_date, parse_decimal,
    parse_positive, pretty_table,
};
use anyhow::{Result, anyhow};
use rust_decimal::Decimal;

pub fn handle(store: &Store, m: &clap::ArgMatches) -> Result<()> {
    match m.subcommand() {
        Some(("set", sub)) => set(store, sub)?,
        Some(("clear", sub)) => {
            let car = *sub.get_one::<i64>("car").unwrap();
            store.clear_loan(car)?;
            println!("Cleared loan terms for car {}", car);
        }
        Some(("pay", sub)) => pay(store, sub)?,
        Some(("next", sub)) => next(store, sub)?,
        Some(("details", sub)) => details(store, sub)?,
        _ => {}
    }
    Ok(())
}

fn set(store: &Store, sub: &clap::ArgMatches) -> Result<()> {
    let car = *sub.get_one::<i64>("car").unwrap();
    let rate = match opt_trimmed(sub, "rate") {
        Some(s) => {
            let r = parse_decimal(&s)?;
            if r < Decimal::ZERO {
                return Err(anyhow!("Interest rate cannot be negative, got {}", r));
            }
            Some(r)
        }
        None => None,
    };
    let loan = LoanInput {
        amount: parse_positive(sub.get_one::<String>("amount").unwrap(), "Loan amount")?,
        term: *sub.get_one::<u32>("term").unwrap(),
        interest_rate: rate,
        monthly_payment: parse_positive(
            sub.get_one::<String>("payment").unwrap(),
            "Monthly payment",
        )?,
        bank: opt_trimmed(sub, "bank"),
        purchase_date: match sub.get_one::<String>("date") {
            Some(s) => Some(parse_date(s)?),
            None => None,
        },
    };
    store.set_loan(car, &loan)?;
    println!(
        "Loan set for car {}: {} over {} months at {}% ({} / month)",
        car,
        loan.amount,
        loan.term,
        loan.interest_rate.unwrap_or(Decimal::ZERO),
        loan.monthly_payment
    );
    Ok(())
}

fn pay(store: &Store, sub: &clap::ArgMatches) -> Result<()> {
    let car = *sub.get_one::<i64>("car").unwrap();
    let e = NewExpense {
        date: parse_date(sub.get_one::<String>("date").unwrap())?,
        amount: parse_positive(sub.get_one::<String>("amount").unwrap(), "Amount")?,
        category: loan_category(store.conn())?,
        description: opt_trimmed(sub, "description"),
        mileage: None,
    };
    let id = store.add_expense(car, &e)?;
    println!(
        "Recorded loan payment {}: {} on {} for car {}",
        id, e.amount, e.date, car
    );
    Ok(())
}

fn next(store: &Store, sub: &clap::ArgMatches) -> Result<()> {
    let car = *sub.get_one::<i64>("car").unwrap();
    let now = as_of(sub.get_one::<String>("as-of"))?;
    let rule = paid_off_rule(store.conn())?;
    let result = loans::next_payment(store, car, now, rule)?;
    if maybe_print_json(sub.get_flag("json"), sub.get_flag("jsonl"), &result)? {
        return Ok(());
    }
    let sym = currency_symbol(store.conn())?;
    match result {
        None => println!("Car {} has no loan on record", car),
        Some(NextPayment::PaidOff) => println!("Loan for car {} is paid off", car),
        Some(NextPayment::Due(due)) => {
            let status = if due.is_overdue { "OVERDUE" } else { "upcoming" };
            let rows = vec![
                vec!["Payment #".into(), due.payment_number.to_string()],
                vec!["Due date".into(), format!("{} ({})", due.next_due_date, status)],
                vec!["Monthly payment".into(), fmt_money(&due.monthly_payment, &sym)],
                vec!["Paid this period".into(), fmt_money(&due.paid_this_period, &sym)],
                vec!["Amount due".into(), fmt_money(&due.amount_due, &sym)],
                vec!["Remaining balance".into(), fmt_money(&due.remaining_balance, &sym)],
            ];
            println!("{}", pretty_table(&["Next payment", ""], rows));
        }
    }
    Ok(())
}

fn details(store: &Store, sub: &clap::ArgMatches) -> Result<()> {
    let car = *sub.get_one::<i64>("car").unwrap();
    let now = as_of(sub.get_one::<String>("as-of"))?;
    let rule = paid_off_rule(store.conn())?;
    let result = loans::loan_details(store, car, now, rule)?;
    if maybe_print_json(sub.get_flag("json"), sub.get_flag("jsonl"), &result)? {
        return Ok(());
    }
    let Some(d) = result else {
        println!("Car {} has no loan on record", car);
        return Ok(());
    };
    let sym = currency_symbol(store.conn())?;
    let status = if d.is_paid_off {
        "paid off".to_string()
    } else if d.is_overdue {
        "overdue".to_string()
    } else {
        "current".to_string()
    };
    let summary = vec![
        vec!["Lender".into(), fmt_opt(&d.loan_bank)],
        vec!["Original amount".into(), fmt_money(&d.original_loan_amount, &sym)],
        vec![
            "Terms".into(),
            format!(
                "{} months at {}%, {} / month",
                d.loan_term,
                d.interest_rate,
                fmt_money(&d.monthly_payment, &sym)
            ),
        ],
        vec!["Total paid".into(), fmt_money(&d.total_paid, &sym)],
        vec!["Principal paid".into(), fmt_money(&d.total_principal, &sym)],
        vec!["Interest paid".into(), fmt_money(&d.total_interest, &sym)],
        vec!["Remaining balance".into(), fmt_money(&d.remaining_balance, &sym)],
        vec!["Status".into(), status],
        vec!["Next payment".into(), fmt_opt(&d.next_payment_date)],
        vec!["Months early".into(), d.months_early.to_string()],
    ];
    println!("{}", pretty_table(&["Loan", ""], summary));
    if d.balance_paid_off != d.schedule_complete {
        println!(
            "note: balance says {}, installment calendar says {}; paid_off_rule decides",
            if d.balance_paid_off { "paid off" } else { "open" },
            if d.schedule_complete { "complete" } else { "open" },
        );
    }
    let rows = d
        .payments
        .iter()
        .map(|p| {
            vec![
                p.date.to_string(),
                fmt_money(&p.amount, &sym),
                fmt_money(&p.principal_amount, &sym),
                fmt_money(&p.interest_amount, &sym),
            ]
        })
        .collect();
    println!(
        "{}",
        pretty_table(&["Date", "Amount", "Principal", "Interest"], rows)
    );
    Ok(())
}
