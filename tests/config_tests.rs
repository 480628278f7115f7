// Copyright (c) 2025 Soumyadip Sarkar.
// All rights reserved.
//
// This source code is licensed under the license found in the
// LICENSE file in the root directory of this source tree.

use autoledger::amortization::PaidOffRule;
use autoledger::commands::settings;
use autoledger::config::{
    LOAN_CATEGORY, PAID_OFF_RULE, currency_symbol, effective_settings, loan_category,
    paid_off_rule, set_user_setting,
};
use autoledger::store::add_user;
use autoledger::{cli, db};
use rusqlite::Connection;

fn setup() -> Connection {
    let mut conn = Connection::open_in_memory().unwrap();
    db::init_schema(&mut conn).unwrap();
    add_user(&conn, "alice@example.com", "Alice").unwrap();
    conn
}

#[test]
fn defaults_without_stored_settings() {
    let conn = setup();
    assert_eq!(loan_category(&conn).unwrap(), "Loan Payment");
    assert_eq!(paid_off_rule(&conn).unwrap(), PaidOffRule::Either);
    assert_eq!(currency_symbol(&conn).unwrap(), "$");
    assert_eq!(effective_settings(&conn).unwrap().len(), 3);
}

#[test]
fn rule_is_stored_lowercase() {
    let conn = setup();
    set_user_setting(&conn, PAID_OFF_RULE, " Balance ").unwrap();
    assert_eq!(paid_off_rule(&conn).unwrap(), PaidOffRule::Balance);
    assert!(set_user_setting(&conn, PAID_OFF_RULE, "sometimes").is_err());
    assert_eq!(paid_off_rule(&conn).unwrap(), PaidOffRule::Balance);
}

#[test]
fn loan_category_must_exist() {
    let conn = setup();
    assert!(set_user_setting(&conn, LOAN_CATEGORY, "Car Loan").is_err());
    set_user_setting(&conn, LOAN_CATEGORY, "Repair").unwrap();
    assert_eq!(loan_category(&conn).unwrap(), "Repair");
}

#[test]
fn config_set_via_cli() {
    let conn = setup();
    let m = cli::build_cli().get_matches_from(["autoledger", "config", "set", "currency_symbol", "€"]);
    settings::handle(&conn, m.subcommand().unwrap().1, Some("alice@example.com")).unwrap();
    assert_eq!(currency_symbol(&conn).unwrap(), "€");

    let m = cli::build_cli().get_matches_from(["autoledger", "config", "set", "current_user", "x@y.z"]);
    assert!(settings::handle(&conn, m.subcommand().unwrap().1, Some("alice@example.com")).is_err());

    let m = cli::build_cli().get_matches_from(["autoledger", "config", "get", "colour"]);
    assert!(settings::handle(&conn, m.subcommand().unwrap().1, Some("alice@example.com")).is_err());
}
