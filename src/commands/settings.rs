// Copyright (c) 2025 Soumyadip Sarkar.
// All rights reserved.
//
// This source code is licensed under the license found in the
// LICENSE file in the root directory of this source tree.

use crate::config::{USER_KEYS, effective_settings, set_user_setting};
use crate::store::Store;
use crate::utils::{maybe_print_json, pretty_table};
use anyhow::{Result, anyhow};
use rusqlite::Connection;

/// Reads are open; `set` changes every user's view and needs a caller.
pub fn handle(conn: &Connection, m: &clap::ArgMatches, identity: Option<&str>) -> Result<()> {
    match m.subcommand() {
        Some(("get", sub)) => {
            let key = sub.get_one::<String>("KEY").unwrap().trim();
            let value = effective_settings(conn)?
                .into_iter()
                .find(|(k, _)| k == key)
                .map(|(_, v)| v)
                .ok_or_else(|| {
                    anyhow!(
                        "Unknown setting '{}', expected one of {}",
                        key,
                        USER_KEYS.join("|")
                    )
                })?;
            println!("{}", value);
        }
        Some(("set", sub)) => {
            let key = sub.get_one::<String>("KEY").unwrap().trim();
            let value = sub.get_one::<String>("VALUE").unwrap();
            let store = Store::login(conn, identity)?;
            set_user_setting(conn, key, value)?;
            tracing::info!(key, by = %store.user().email, "setting changed");
            println!("{} = {}", key, value.trim());
        }
        Some(("list", sub)) => {
            let data = effective_settings(conn)?;
            if !maybe_print_json(sub.get_flag("json"), sub.get_flag("jsonl"), &data)? {
                let rows = data.into_iter().map(|(k, v)| vec![k, v]).collect();
                println!("{}", pretty_table(&["Key", "Value"], rows));
            }
        }
        _ => {}
    }
    Ok(())
}
