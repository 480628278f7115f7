// Copyright (c) AlphaVelocity.
// All rights reserved.
//
// This source code is licensed under the license found in the
// LICENSE file in the root directory of this source tree.

use crate::store::Store;
use crate::utils::{maybe_print_json, pretty_table};
use anyhow::Result;

pub fn handle(store: &Store, m: &clap::ArgMatches) -> Result<()> {
    match m.subcommand() {
        Some(("add", sub)) => {
            let car = *sub.get_one::<i64>("car").unwrap();
            let email = sub.get_one::<String>("email").unwrap();
            let user = store.share(car, email)?;
            println!("Shared car {} with {} <{}>", car, user.name, user.email);
        }
        Some(("rm", sub)) => {
            let car = *sub.get_one::<i64>("car").unwrap();
            let email = sub.get_one::<String>("email").unwrap().trim();
            store.unshare(car, email)?;
            println!("Stopped sharing car {} with {}", car, email);
        }
        Some(("list", sub)) => {
            let car = *sub.get_one::<i64>("car").unwrap();
            let shares = store.shares(car)?;
            if !maybe_print_json(sub.get_flag("json"), sub.get_flag("jsonl"), &shares)? {
                let rows = shares
                    .into_iter()
                    .map(|s| vec![s.email, s.name, s.created_at])
                    .collect();
                println!("{}", pretty_table(&["Email", "Name", "Shared since"], rows));
            }
        }
        _ => {}
    }
    Ok(())
}
