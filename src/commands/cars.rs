// Copyright (c) 2025 Soumyadip Sarkar.
// All rights reserved.
//
// This source code is licensed under the license found in the
// LICENSE file in the root directory of this source tree.

use crate::config::currency_symbol;
use crate::models::{Car, CarPatch, Purchase, Role, Sale};
use crate::store::Store;
use crate::utils::{
    fmt_money, fmt_opt, maybe_print_json, normalize_vin, opt_trimmed, parse_date, parse_positive,
    pretty_table, validate_year,
};
use anyhow::Result;
use serde::Serialize;

pub fn handle(store: &Store, m: &clap::ArgMatches) -> Result<()> {
    match m.subcommand() {
        Some(("add", sub)) => add(store, sub)?,
        Some(("list", sub)) => list(store, sub)?,
        Some(("show", sub)) => show(store, sub)?,
        Some(("update", sub)) => update(store, sub)?,
        Some(("rm", sub)) => {
            let id = *sub.get_one::<i64>("car").unwrap();
            let car = store.delete_car(id)?;
            println!("Removed car {} '{}'", id, car.name);
        }
        Some(("purchase", sub)) => purchase(store, sub)?,
        Some(("sell", sub)) => sell(store, sub)?,
        _ => {}
    }
    Ok(())
}

/// Reads the descriptive car fields shared by `car add` and `car update`.
pub fn car_patch(sub: &clap::ArgMatches) -> Result<CarPatch> {
    let vin = match opt_trimmed(sub, "vin") {
        Some(v) => Some(normalize_vin(&v)?),
        None => None,
    };
    let year = match sub.get_one::<i32>("year") {
        Some(y) => Some(validate_year(*y)?),
        None => None,
    };
    Ok(CarPatch {
        name: opt_trimmed(sub, "name"),
        make: opt_trimmed(sub, "make"),
        model: opt_trimmed(sub, "model"),
        year,
        vin,
        color: opt_trimmed(sub, "color"),
        license_plate: opt_trimmed(sub, "plate").map(|p| p.to_uppercase()),
        mileage: sub.get_one::<i64>("mileage").copied(),
        notes: opt_trimmed(sub, "notes"),
    })
}

fn add(store: &Store, sub: &clap::ArgMatches) -> Result<()> {
    let patch = car_patch(sub)?;
    let id = store.add_car(&patch)?;
    println!(
        "Added car {} '{}'",
        id,
        patch.name.as_deref().unwrap_or_default()
    );
    Ok(())
}

#[derive(Serialize)]
struct CarRow {
    id: i64,
    name: String,
    role: Role,
    year: Option<i32>,
    make: Option<String>,
    model: Option<String>,
    plate: Option<String>,
    has_loan: bool,
    sold: bool,
}

fn list(store: &Store, sub: &clap::ArgMatches) -> Result<()> {
    let data: Vec<CarRow> = store
        .list_cars()?
        .into_iter()
        .map(|(car, role)| CarRow {
            id: car.id,
            has_loan: car.loan_terms().is_some(),
            sold: car.sold_date.is_some(),
            name: car.name,
            role,
            year: car.year,
            make: car.make,
            model: car.model,
            plate: car.license_plate,
        })
        .collect();
    if !maybe_print_json(sub.get_flag("json"), sub.get_flag("jsonl"), &data)? {
        let rows = data
            .iter()
            .map(|c| {
                vec![
                    c.id.to_string(),
                    c.name.clone(),
                    c.role.as_str().to_string(),
                    fmt_opt(&c.year),
                    fmt_opt(&c.make),
                    fmt_opt(&c.model),
                    fmt_opt(&c.plate),
                    if c.has_loan { "yes" } else { "" }.to_string(),
                    if c.sold { "sold" } else { "" }.to_string(),
                ]
            })
            .collect();
        println!(
            "{}",
            pretty_table(
                &["ID", "Name", "Role", "Year", "Make", "Model", "Plate", "Loan", "Status"],
                rows
            )
        );
    }
    Ok(())
}

fn show(store: &Store, sub: &clap::ArgMatches) -> Result<()> {
    let id = *sub.get_one::<i64>("car").unwrap();
    let car = store.car(id)?;
    if maybe_print_json(sub.get_flag("json"), sub.get_flag("jsonl"), &car)? {
        return Ok(());
    }
    let sym = currency_symbol(store.conn())?;
    println!("{}", pretty_table(&["Field", "Value"], car_rows(&car, &sym)));
    Ok(())
}

fn car_rows(car: &Car, sym: &str) -> Vec<Vec<String>> {
    let money = |d: &Option<rust_decimal::Decimal>| {
        d.as_ref().map(|v| fmt_money(v, sym)).unwrap_or_default()
    };
    let rate = car
        .interest_rate
        .map(|r| format!("{}%", r))
        .unwrap_or_default();
    [
        ("Name", car.display_name()),
        ("VIN", fmt_opt(&car.vin)),
        ("Color", fmt_opt(&car.color)),
        ("Plate", fmt_opt(&car.license_plate)),
        ("Mileage", fmt_opt(&car.mileage)),
        ("Purchased", fmt_opt(&car.purchase_date)),
        ("Price", money(&car.purchase_price)),
        ("Down payment", money(&car.down_payment)),
        ("Dealer", fmt_opt(&car.dealer)),
        ("Loan amount", money(&car.loan_amount)),
        ("Term (months)", fmt_opt(&car.loan_term)),
        ("Rate", rate),
        ("Monthly payment", money(&car.monthly_payment)),
        ("Lender", fmt_opt(&car.loan_bank)),
        ("Sold", fmt_opt(&car.sold_date)),
        ("Sale price", money(&car.sold_price)),
        ("Buyer", fmt_opt(&car.sold_to)),
        ("Notes", fmt_opt(&car.notes)),
    ]
    .into_iter()
    .filter(|(_, v)| !v.is_empty())
    .map(|(k, v)| vec![k.to_string(), v])
    .collect()
}

fn update(store: &Store, sub: &clap::ArgMatches) -> Result<()> {
    let id = *sub.get_one::<i64>("car").unwrap();
    let patch = car_patch(sub)?;
    store.update_car(id, &patch)?;
    println!("Updated car {}", id);
    Ok(())
}

fn purchase(store: &Store, sub: &clap::ArgMatches) -> Result<()> {
    let id = *sub.get_one::<i64>("car").unwrap();
    let p = Purchase {
        date: parse_date(sub.get_one::<String>("date").unwrap())?,
        price: parse_positive(sub.get_one::<String>("price").unwrap(), "Price")?,
        down_payment: match opt_trimmed(sub, "down-payment") {
            Some(s) => Some(parse_positive(&s, "Down payment")?),
            None => None,
        },
        dealer: opt_trimmed(sub, "dealer"),
    };
    store.set_purchase(id, &p)?;
    println!("Purchase recorded for car {}: {} on {}", id, p.price, p.date);
    Ok(())
}

fn sell(store: &Store, sub: &clap::ArgMatches) -> Result<()> {
    let id = *sub.get_one::<i64>("car").unwrap();
    let s = Sale {
        date: parse_date(sub.get_one::<String>("date").unwrap())?,
        price: parse_positive(sub.get_one::<String>("price").unwrap(), "Price")?,
        buyer: opt_trimmed(sub, "buyer"),
    };
    store.set_sale(id, &s)?;
    println!("Sale recorded for car {}: {} on {}", id, s.price, s.date);
    Ok(())
}
