// Copyright (c) 2025 Soumyadip Sarkar.
// All rights reserved.
//
// This source code is licensed under the license found in the
// LICENSE file in the root directory of this source tree.

use clap::{Arg, ArgAction, Command, arg, value_parser};

fn json_flags(cmd: Command) -> Command {
    cmd.arg(arg!(--json "Print as pretty JSON").action(ArgAction::SetTrue))
        .arg(
            arg!(--jsonl "Print as JSON lines")
                .action(ArgAction::SetTrue)
                .conflicts_with("json"),
        )
}

fn car_arg() -> Arg {
    arg!(--car <ID> "Car id")
        .required(true)
        .value_parser(value_parser!(i64))
}

fn as_of_arg() -> Arg {
    arg!(--"as-of" <DATE> "Evaluate as of this date (YYYY-MM-DD) instead of now")
}

fn car_fields(cmd: Command) -> Command {
    cmd.arg(arg!(--make <MAKE>))
        .arg(arg!(--model <MODEL>))
        .arg(arg!(--year <YEAR>).value_parser(value_parser!(i32)))
        .arg(arg!(--vin <VIN>))
        .arg(arg!(--color <COLOR>))
        .arg(arg!(--plate <PLATE> "License plate"))
        .arg(arg!(--mileage <MILES>).value_parser(value_parser!(i64)))
        .arg(arg!(--notes <NOTES>))
}

pub fn build_cli() -> Command {
    Command::new("autoledger")
        .version(clap::crate_version!())
        .about("Vehicle ownership records, expenses and car loan tracking")
        .arg(
            Arg::new("as")
                .long("as")
                .value_name("EMAIL")
                .env("AUTOLEDGER_USER")
                .global(true)
                .help("Act as this user instead of the logged-in one"),
        )
        .arg(
            Arg::new("db")
                .long("db")
                .value_name("PATH")
                .global(true)
                .help("Database file (defaults to $AUTOLEDGER_DB or the platform data dir)"),
        )
        .arg(
            Arg::new("verbose")
                .short('v')
                .long("verbose")
                .action(ArgAction::Count)
                .global(true)
                .help("Increase log verbosity (-v info, -vv debug, -vvv trace)"),
        )
        .subcommand(Command::new("init").about("Create or open the database"))
        .subcommand(
            Command::new("user")
                .about("Manage users and the current identity")
                .subcommand(
                    Command::new("add")
                        .arg(arg!(--email <EMAIL>).required(true))
                        .arg(arg!(--name <NAME>).required(true)),
                )
                .subcommand(Command::new("login").arg(arg!(<EMAIL>)))
                .subcommand(Command::new("logout"))
                .subcommand(Command::new("whoami"))
                .subcommand(json_flags(Command::new("list"))),
        )
        .subcommand(
            Command::new("car")
                .about("Cars you own or that are shared with you")
                .subcommand(car_fields(
                    Command::new("add").arg(arg!(--name <NAME>).required(true)),
                ))
                .subcommand(json_flags(Command::new("list")))
                .subcommand(json_flags(Command::new("show").arg(car_arg())))
                .subcommand(car_fields(
                    Command::new("update")
                        .arg(car_arg())
                        .arg(arg!(--name <NAME>)),
                ))
                .subcommand(Command::new("rm").arg(car_arg()))
                .subcommand(
                    Command::new("purchase")
                        .about("Set purchase details (owner only)")
                        .arg(car_arg())
                        .arg(arg!(--date <DATE>).required(true))
                        .arg(arg!(--price <AMOUNT>).required(true))
                        .arg(arg!(--"down-payment" <AMOUNT>))
                        .arg(arg!(--dealer <DEALER>)),
                )
                .subcommand(
                    Command::new("sell")
                        .about("Record a sale (owner only)")
                        .arg(car_arg())
                        .arg(arg!(--date <DATE>).required(true))
                        .arg(arg!(--price <AMOUNT>).required(true))
                        .arg(arg!(--buyer <BUYER>)),
                ),
        )
        .subcommand(
            Command::new("share")
                .about("Grant other users access to a car")
                .subcommand(
                    Command::new("add")
                        .arg(car_arg())
                        .arg(arg!(--email <EMAIL>).required(true)),
                )
                .subcommand(
                    Command::new("rm")
                        .arg(car_arg())
                        .arg(arg!(--email <EMAIL>).required(true)),
                )
                .subcommand(json_flags(Command::new("list").arg(car_arg()))),
        )
        .subcommand(
            Command::new("category")
                .about("Expense categories")
                .subcommand(Command::new("add").arg(arg!(--name <NAME>).required(true)))
                .subcommand(Command::new("list"))
                .subcommand(Command::new("rm").arg(arg!(--name <NAME>).required(true))),
        )
        .subcommand(
            Command::new("expense")
                .about("Log and review car expenses")
                .subcommand(
                    Command::new("add")
                        .arg(car_arg())
                        .arg(arg!(--date <DATE>).required(true))
                        .arg(arg!(--amount <AMOUNT>).required(true))
                        .arg(arg!(--category <CATEGORY>).required(true))
                        .arg(arg!(--description <TEXT>))
                        .arg(arg!(--mileage <MILES>).value_parser(value_parser!(i64))),
                )
                .subcommand(json_flags(
                    Command::new("list")
                        .arg(car_arg())
                        .arg(arg!(--month <YYYY_MM>))
                        .arg(arg!(--category <CATEGORY>))
                        .arg(arg!(--limit <N>).value_parser(value_parser!(usize))),
                ))
                .subcommand(
                    Command::new("update")
                        .arg(
                            arg!(--id <ID>)
                                .required(true)
                                .value_parser(value_parser!(i64)),
                        )
                        .arg(arg!(--date <DATE>))
                        .arg(arg!(--amount <AMOUNT>))
                        .arg(arg!(--category <CATEGORY>))
                        .arg(arg!(--description <TEXT>))
                        .arg(arg!(--mileage <MILES>).value_parser(value_parser!(i64))),
                )
                .subcommand(
                    Command::new("rm").arg(
                        arg!(--id <ID>)
                            .required(true)
                            .value_parser(value_parser!(i64)),
                    ),
                ),
        )
        .subcommand(
            Command::new("loan")
                .about("Car loan terms, payments and amortization")
                .subcommand(
                    Command::new("set")
                        .about("Replace the loan terms (owner only)")
                        .arg(car_arg())
                        .arg(arg!(--amount <AMOUNT> "Opening principal").required(true))
                        .arg(
                            arg!(--term <MONTHS> "Number of monthly installments")
                                .required(true)
                                .value_parser(value_parser!(u32)),
                        )
                        .arg(arg!(--payment <AMOUNT> "Scheduled monthly payment").required(true))
                        .arg(arg!(--rate <PERCENT> "Nominal annual interest rate"))
                        .arg(arg!(--bank <BANK>))
                        .arg(arg!(--date <DATE> "Purchase / origination date")),
                )
                .subcommand(Command::new("clear").arg(car_arg()))
                .subcommand(
                    Command::new("pay")
                        .about("Record a loan installment")
                        .arg(car_arg())
                        .arg(arg!(--date <DATE>).required(true))
                        .arg(arg!(--amount <AMOUNT>).required(true))
                        .arg(arg!(--description <TEXT>)),
                )
                .subcommand(json_flags(
                    Command::new("next")
                        .about("Next installment due")
                        .arg(car_arg())
                        .arg(as_of_arg()),
                ))
                .subcommand(json_flags(
                    Command::new("details")
                        .about("Balance, totals and payment history")
                        .arg(car_arg())
                        .arg(as_of_arg()),
                )),
        )
        .subcommand(
            Command::new("report")
                .about("Cost of ownership reports")
                .subcommand(json_flags(
                    Command::new("summary").arg(car_arg()).arg(as_of_arg()),
                ))
                .subcommand(json_flags(
                    Command::new("monthly")
                        .arg(car_arg())
                        .arg(arg!(--months <N>).value_parser(value_parser!(usize))),
                )),
        )
        .subcommand(
            Command::new("import").subcommand(
                Command::new("expenses")
                    .about("Import expenses from CSV: date,amount,category,description,mileage")
                    .arg(car_arg())
                    .arg(arg!(--path <CSV>).required(true)),
            ),
        )
        .subcommand(
            Command::new("export").subcommand(
                Command::new("expenses")
                    .arg(car_arg())
                    .arg(
                        arg!(--format <FMT> "csv or json")
                            .required(false)
                            .default_value("csv"),
                    )
                    .arg(arg!(--out <PATH>).required(true)),
            ),
        )
        .subcommand(
            Command::new("config")
                .about("Runtime settings")
                .subcommand(Command::new("get").arg(arg!(<KEY>)))
                .subcommand(Command::new("set").arg(arg!(<KEY>)).arg(arg!(<VALUE>)))
                .subcommand(json_flags(Command::new("list"))),
        )
        .subcommand(Command::new("doctor").about("Check records for inconsistencies"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cli_definition_is_consistent() {
        build_cli().debug_assert();
    }

    #[test]
    fn global_identity_after_subcommand() {
        let m = build_cli().get_matches_from([
            "autoledger", "loan", "next", "--car", "3", "--as", "a@b.c",
        ]);
        let (_, loan) = m.subcommand().unwrap();
        let (_, next) = loan.subcommand().unwrap();
        assert_eq!(next.get_one::<i64>("car"), Some(&3));
        assert_eq!(m.get_one::<String>("as").map(String::as_str), Some("a@b.c"));
    }
}
