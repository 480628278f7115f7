// Copyright (c) 2025 Soumyadip Sarkar.
// All rights reserved.
//
// This source code is licensed under the license found in the
// LICENSE file in the root directory of this source tree.

use autoledger::config::{CURRENT_USER, loan_category, set_setting};
use autoledger::errors::{AccessError, Action, access_error};
use autoledger::models::{CarPatch, LoanInput, NewExpense};
use autoledger::store::{Store, add_user};
use autoledger::commands::{categories, expenses, settings};
use autoledger::{cli, db};
use rusqlite::Connection;
use rust_decimal::Decimal;

fn setup() -> Connection {
    let mut conn = Connection::open_in_memory().unwrap();
    db::init_schema(&mut conn).unwrap();
    add_user(&conn, "alice@example.com", "Alice").unwrap();
    add_user(&conn, "bob@example.com", "Bob").unwrap();
    add_user(&conn, "carol@example.com", "Carol").unwrap();
    conn
}

fn login<'c>(conn: &'c Connection, email: &str) -> Store<'c> {
    match Store::login(conn, Some(email)) {
        Ok(store) => store,
        Err(e) => panic!("login {}: {}", email, e),
    }
}

fn expense(date: &str, amount: &str, category: &str) -> NewExpense {
    NewExpense {
        date: date.parse().unwrap(),
        amount: amount.parse().unwrap(),
        category: category.into(),
        description: None,
        mileage: None,
    }
}

fn shared_car(conn: &Connection) -> i64 {
    let alice = login(conn, "alice@example.com");
    let id = alice
        .add_car(&CarPatch {
            name: Some("Daily".into()),
            make: Some("Honda".into()),
            ..Default::default()
        })
        .unwrap();
    alice.share(id, "bob@example.com").unwrap();
    id
}

#[test]
fn no_identity_is_not_authenticated() {
    let conn = setup();
    let err = Store::login(&conn, None).err().unwrap();
    assert_eq!(access_error(&err), Some(&AccessError::NotAuthenticated));

    let err = Store::login(&conn, Some("nobody@example.com")).err().unwrap();
    assert_eq!(access_error(&err), Some(&AccessError::NotAuthenticated));
}

#[test]
fn current_user_setting_is_the_fallback_identity() {
    let conn = setup();
    set_setting(&conn, CURRENT_USER, "bob@example.com").unwrap();
    let store = Store::login(&conn, None).unwrap();
    assert_eq!(store.user().email, "bob@example.com");

    let store = Store::login(&conn, Some("  carol@example.com ")).unwrap();
    assert_eq!(store.user().email, "carol@example.com");
}

#[test]
fn shared_user_reads_and_updates_but_not_finance() {
    let conn = setup();
    let car = shared_car(&conn);
    let bob = login(&conn, "bob@example.com");

    assert_eq!(bob.car(car).unwrap().name, "Daily");
    bob.update_car(
        car,
        &CarPatch {
            mileage: Some(12_000),
            ..Default::default()
        },
    )
    .unwrap();
    assert_eq!(bob.car(car).unwrap().mileage, Some(12_000));

    let loan = LoanInput {
        amount: Decimal::from(10_000),
        term: 36,
        interest_rate: None,
        monthly_payment: Decimal::from(300),
        bank: None,
        purchase_date: Some("2024-01-10".parse().unwrap()),
    };
    let err = bob.set_loan(car, &loan).unwrap_err();
    assert_eq!(
        access_error(&err),
        Some(&AccessError::AccessDenied {
            action: Action::ManageFinance,
            car_id: car
        })
    );

    let err = bob.delete_car(car).err().unwrap();
    assert_eq!(
        access_error(&err),
        Some(&AccessError::AccessDenied {
            action: Action::Delete,
            car_id: car
        })
    );

    let err = bob.share(car, "carol@example.com").err().unwrap();
    assert_eq!(
        access_error(&err),
        Some(&AccessError::AccessDenied {
            action: Action::ManageShares,
            car_id: car
        })
    );
}

#[test]
fn strangers_cannot_see_a_car() {
    let conn = setup();
    let car = shared_car(&conn);
    let carol = login(&conn, "carol@example.com");

    let err = carol.car(car).err().unwrap();
    assert_eq!(
        access_error(&err),
        Some(&AccessError::AccessDenied {
            action: Action::Read,
            car_id: car
        })
    );
    assert!(carol.list_cars().unwrap().is_empty());

    let err = carol.car(999).err().unwrap();
    assert_eq!(
        access_error(&err),
        Some(&AccessError::NotFound {
            what: "Car",
            id: "999".into()
        })
    );
}

#[test]
fn revoked_share_loses_access() {
    let conn = setup();
    let car = shared_car(&conn);
    let alice = login(&conn, "alice@example.com");
    assert_eq!(alice.shares(car).unwrap().len(), 1);
    alice.unshare(car, "bob@example.com").unwrap();

    let bob = login(&conn, "bob@example.com");
    assert!(bob.car(car).is_err());
    assert!(alice.unshare(car, "bob@example.com").is_err());
}

#[test]
fn shared_user_deletes_only_own_expenses() {
    let conn = setup();
    let car = shared_car(&conn);
    let alice = login(&conn, "alice@example.com");
    let bob = login(&conn, "bob@example.com");

    let by_alice = alice.add_expense(car, &expense("2024-03-01", "45.10", "Fuel")).unwrap();
    let by_bob = bob.add_expense(car, &expense("2024-03-05", "12.00", "Parking")).unwrap();

    let err = bob.delete_expense(by_alice).err().unwrap();
    assert!(matches!(
        access_error(&err),
        Some(AccessError::AccessDenied {
            action: Action::Delete,
            ..
        })
    ));
    bob.delete_expense(by_bob).unwrap();

    let again = bob.add_expense(car, &expense("2024-03-06", "8.00", "Tolls")).unwrap();
    alice.delete_expense(again).unwrap();
    alice.delete_expense(by_alice).unwrap();
    assert!(alice.expenses(car, &Default::default()).unwrap().is_empty());
}

#[test]
fn expense_list_newest_first_with_limit() {
    let conn = setup();
    let car = shared_car(&conn);
    let alice = login(&conn, "alice@example.com");
    alice.add_expense(car, &expense("2024-01-03", "30", "Fuel")).unwrap();
    alice.add_expense(car, &expense("2024-02-10", "80", "Maintenance")).unwrap();
    alice.add_expense(car, &expense("2024-02-20", "35", "Fuel")).unwrap();

    let m = cli::build_cli().get_matches_from([
        "autoledger",
        "expense",
        "list",
        "--car",
        &car.to_string(),
        "--limit",
        "2",
    ]);
    let (_, exp) = m.subcommand().unwrap();
    let (_, list) = exp.subcommand().unwrap();
    let rows = expenses::query_rows(&alice, list).unwrap();
    assert_eq!(rows.len(), 2);
    assert_eq!(rows[0].date, "2024-02-20");
    assert_eq!(rows[1].date, "2024-02-10");

    let m = cli::build_cli().get_matches_from([
        "autoledger",
        "expense",
        "list",
        "--car",
        &car.to_string(),
        "--month",
        "2024-02",
        "--category",
        "Fuel",
    ]);
    let (_, exp) = m.subcommand().unwrap();
    let (_, list) = exp.subcommand().unwrap();
    let rows = expenses::query_rows(&alice, list).unwrap();
    assert_eq!(rows.len(), 1);
    assert_eq!(rows[0].amount, "35.00");
}

#[test]
fn expense_mileage_raises_car_odometer() {
    let conn = setup();
    let car = shared_car(&conn);
    let bob = login(&conn, "bob@example.com");
    let mut e = expense("2024-04-01", "50", "Fuel");
    e.mileage = Some(15_200);
    bob.add_expense(car, &e).unwrap();
    e.mileage = Some(9_000);
    bob.add_expense(car, &e).unwrap();
    assert_eq!(bob.car(car).unwrap().mileage, Some(15_200));
}

#[test]
fn shared_settings_and_categories_need_a_caller() {
    let conn = setup();

    let m = cli::build_cli().get_matches_from(["autoledger", "config", "set", "loan_category", "Fuel"]);
    let err = settings::handle(&conn, m.subcommand().unwrap().1, None).unwrap_err();
    assert_eq!(access_error(&err), Some(&AccessError::NotAuthenticated));
    assert_eq!(loan_category(&conn).unwrap(), "Loan Payment");

    let m = cli::build_cli().get_matches_from(["autoledger", "category", "add", "--name", "Wash"]);
    let err = categories::handle(&conn, m.subcommand().unwrap().1, None).unwrap_err();
    assert_eq!(access_error(&err), Some(&AccessError::NotAuthenticated));

    let m = cli::build_cli().get_matches_from(["autoledger", "category", "rm", "--name", "Parking"]);
    let err = categories::handle(&conn, m.subcommand().unwrap().1, Some("nobody@example.com"))
        .unwrap_err();
    assert_eq!(access_error(&err), Some(&AccessError::NotAuthenticated));
    let parking: i64 = conn
        .query_row("SELECT COUNT(*) FROM categories WHERE name='Parking'", [], |r| r.get(0))
        .unwrap();
    assert_eq!(parking, 1);

    // Reads stay open.
    let m = cli::build_cli().get_matches_from(["autoledger", "config", "get", "loan_category"]);
    settings::handle(&conn, m.subcommand().unwrap().1, None).unwrap();
    let m = cli::build_cli().get_matches_from(["autoledger", "category", "list"]);
    categories::handle(&conn, m.subcommand().unwrap().1, None).unwrap();

    let m = cli::build_cli().get_matches_from(["autoledger", "config", "set", "loan_category", "Fuel"]);
    settings::handle(&conn, m.subcommand().unwrap().1, Some("bob@example.com")).unwrap();
    assert_eq!(loan_category(&conn).unwrap(), "Fuel");
}
