// Copyright (c) 2025 Soumyadip Sarkar.
// All rights reserved.
//
// This source code is licensed under the license found in the
// LICENSE file in the root directory of this source tree.

use crate::config::{CURRENT_USER, clear_setting, set_setting};
use crate::errors::AccessError;
use crate::store::{Store, add_user, find_user};
use crate::utils::{maybe_print_json, pretty_table};
use anyhow::Result;
use rusqlite::Connection;
use serde::Serialize;

pub fn handle(conn: &Connection, m: &clap::ArgMatches, identity: Option<&str>) -> Result<()> {
    match m.subcommand() {
        Some(("add", sub)) => {
            let email = sub.get_one::<String>("email").unwrap();
            let name = sub.get_one::<String>("name").unwrap();
            let user = add_user(conn, email, name)?;
            println!("Added user {} <{}>", user.name, user.email);
        }
        Some(("login", sub)) => {
            let email = sub.get_one::<String>("EMAIL").unwrap().trim();
            let user = find_user(conn, email)?.ok_or_else(|| AccessError::NotFound {
                what: "User",
                id: email.to_string(),
            })?;
            set_setting(conn, CURRENT_USER, &user.email)?;
            tracing::info!(user = %user.email, "logged in");
            println!("Logged in as {} <{}>", user.name, user.email);
        }
        Some(("logout", _)) => {
            clear_setting(conn, CURRENT_USER)?;
            println!("Logged out");
        }
        Some(("whoami", _)) => {
            let store = Store::login(conn, identity)?;
            let user = store.user();
            println!("{} <{}>", user.name, user.email);
        }
        Some(("list", sub)) => list(conn, sub)?,
        _ => {}
    }
    Ok(())
}

#[derive(Serialize)]
struct UserRow {
    email: String,
    name: String,
    created_at: String,
}

fn list(conn: &Connection, sub: &clap::ArgMatches) -> Result<()> {
    let mut stmt = conn.prepare("SELECT email, name, created_at FROM users ORDER BY email")?;
    let rows = stmt.query_map([], |r| {
        Ok(UserRow {
            email: r.get(0)?,
            name: r.get(1)?,
            created_at: r.get(2)?,
        })
    })?;
    let mut data = Vec::new();
    for row in rows {
        data.push(row?);
    }
    if !maybe_print_json(sub.get_flag("json"), sub.get_flag("jsonl"), &data)? {
        let rows = data
            .into_iter()
            .map(|u| vec![u.email, u.name, u.created_at])
            .collect();
        println!("{}", pretty_table(&["Email", "Name", "Created"], rows));
    }
    Ok(())
}
