// Copyright (c) 2025 Soumyadip Sarkar.
// All rights reserved.
//
// This source code is licensed under the license found in the
// LICENSE file in the root directory of this source tree.

use std::path::Path;

use anyhow::Result;
use tracing_subscriber::EnvFilter;

use autoledger::store::Store;
use autoledger::{cli, commands, db};

fn init_tracing(verbosity: u8) {
    let default_level = match verbosity {
        0 => "warn",
        1 => "info",
        2 => "debug",
        _ => "trace",
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();
}

fn main() -> Result<()> {
    let cli = cli::build_cli();
    let matches = cli.get_matches();
    init_tracing(matches.get_count("verbose"));

    let db_arg = matches.get_one::<String>("db").map(Path::new);
    let conn = db::open_or_init(db_arg)?;
    let identity = matches.get_one::<String>("as").map(String::as_str);

    match matches.subcommand() {
        Some(("init", _)) => {
            println!("Database initialized at {}", db::db_path(db_arg)?.display());
        }
        Some(("user", sub)) => commands::users::handle(&conn, sub, identity)?,
        Some(("category", sub)) => commands::categories::handle(&conn, sub, identity)?,
        Some(("config", sub)) => commands::settings::handle(&conn, sub, identity)?,
        Some((name, sub)) => {
            let store = Store::login(&conn, identity)?;
            match name {
                "car" => commands::cars::handle(&store, sub)?,
                "share" => commands::shares::handle(&store, sub)?,
                "expense" => commands::expenses::handle(&store, sub)?,
                "loan" => commands::loan::handle(&store, sub)?,
                "report" => commands::reports::handle(&store, sub)?,
                "import" => commands::importer::handle(&store, sub)?,
                "export" => commands::exporter::handle(&store, sub)?,
                "doctor" => commands::doctor::handle(&store)?,
                _ => {
                    cli::build_cli().print_help()?;
                    println!();
                }
            }
        }
        None => {
            cli::build_cli().print_help()?;
            println!();
        }
    }
    Ok(())
}
