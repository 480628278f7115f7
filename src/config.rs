// Copyright (c) 2025 Soumyadip Sarkar.
// All rights reserved.
//
// This source code is licensed under the license found in the
// LICENSE file in the root directory of this source tree.

//! Runtime settings stored in the `settings` table.

use anyhow::{Result, anyhow};
use rusqlite::{Connection, OptionalExtension, params};

use crate::amortization::PaidOffRule;

pub const LOAN_CATEGORY: &str = "loan_category";
pub const PAID_OFF_RULE: &str = "paid_off_rule";
pub const CURRENCY_SYMBOL: &str = "currency_symbol";
pub const CURRENT_USER: &str = "current_user";

pub const DEFAULT_LOAN_CATEGORY: &str = "Loan Payment";
pub const DEFAULT_CURRENCY_SYMBOL: &str = "$";

/// Keys `config set` accepts. `current_user` is written by `user login`.
pub const USER_KEYS: &[&str] = &[LOAN_CATEGORY, PAID_OFF_RULE, CURRENCY_SYMBOL];

pub fn get_setting(conn: &Connection, key: &str) -> Result<Option<String>> {
    let v: Option<String> = conn
        .query_row(
            "SELECT value FROM settings WHERE key=?1",
            params![key],
            |r| r.get(0),
        )
        .optional()?;
    Ok(v)
}

pub fn set_setting(conn: &Connection, key: &str, value: &str) -> Result<()> {
    conn.execute(
        "INSERT INTO settings(key, value) VALUES(?1, ?2)
         ON CONFLICT(key) DO UPDATE SET value=excluded.value",
        params![key, value],
    )?;
    Ok(())
}

pub fn clear_setting(conn: &Connection, key: &str) -> Result<()> {
    conn.execute("DELETE FROM settings WHERE key=?1", params![key])?;
    Ok(())
}

pub fn loan_category(conn: &Connection) -> Result<String> {
    Ok(get_setting(conn, LOAN_CATEGORY)?.unwrap_or_else(|| DEFAULT_LOAN_CATEGORY.to_string()))
}

pub fn paid_off_rule(conn: &Connection) -> Result<PaidOffRule> {
    match get_setting(conn, PAID_OFF_RULE)? {
        Some(s) => s.parse(),
        None => Ok(PaidOffRule::default()),
    }
}

pub fn currency_symbol(conn: &Connection) -> Result<String> {
    Ok(get_setting(conn, CURRENCY_SYMBOL)?
        .unwrap_or_else(|| DEFAULT_CURRENCY_SYMBOL.to_string()))
}

/// Validates and stores a user-facing setting.
pub fn set_user_setting(conn: &Connection, key: &str, value: &str) -> Result<()> {
    let value = value.trim();
    match key {
        LOAN_CATEGORY => {
            crate::utils::id_for_category(conn, value)?;
        }
        PAID_OFF_RULE => {
            value.parse::<PaidOffRule>()?;
        }
        CURRENCY_SYMBOL => {
            if value.is_empty() {
                return Err(anyhow!("Currency symbol cannot be empty"));
            }
        }
        other => {
            return Err(anyhow!(
                "Unknown setting '{}', expected one of {}",
                other,
                USER_KEYS.join("|")
            ));
        }
    }
    let stored = if key == PAID_OFF_RULE {
        value.to_lowercase()
    } else {
        value.to_string()
    };
    set_setting(conn, key, &stored)?;
    tracing::debug!(key, value = %stored, "setting updated");
    Ok(())
}

/// Effective value of every user-facing setting, defaults included.
pub fn effective_settings(conn: &Connection) -> Result<Vec<(String, String)>> {
    Ok(vec![
        (LOAN_CATEGORY.to_string(), loan_category(conn)?),
        (PAID_OFF_RULE.to_string(), paid_off_rule(conn)?.to_string()),
        (CURRENCY_SYMBOL.to_string(), currency_symbol(conn)?),
    ])
}
