// Copyright (c) 2025 Soumyadip Sarkar.
// All rights reserved.
//
// This source code is licensed under the license found in the
// LICENSE file in the root directory of this source tree.

//! Access-controlled record store.
//!
//! Every method runs as the resolved caller and checks ownership or an
//! explicit share before touching a car or its expenses. Owners may do
//! anything; shared users may read and update. Purchase, loan and sale
//! details, sharing and deletion of the car itself are owner-only.

use anyhow::{Context, Result, anyhow};
use rusqlite::{Connection, OptionalExtension, Row, params};
use rust_decimal::Decimal;

use crate::amortization::Payment;
use crate::config;
use crate::errors::{AccessError, Action};
use crate::loans::LoanSource;
use crate::models::{
    Car, CarPatch, Expense, ExpensePatch, LoanInput, NewExpense, Purchase, Role, Sale, Share,
    User,
};
use crate::utils::{date_to_utc, decimal_col, id_for_category, required_decimal_col};

const CAR_COLUMNS: &str = "id, owner_id, name, make, model, year, vin, color, license_plate, \
     mileage, notes, purchase_date, purchase_price, down_payment, dealer, loan_amount, loan_term, \
     interest_rate, monthly_payment, loan_bank, sold_date, sold_price, sold_to";

fn car_from_row(r: &Row<'_>) -> rusqlite::Result<Car> {
    Ok(Car {
        id: r.get(0)?,
        owner_id: r.get(1)?,
        name: r.get(2)?,
        make: r.get(3)?,
        model: r.get(4)?,
        year: r.get(5)?,
        vin: r.get(6)?,
        color: r.get(7)?,
        license_plate: r.get(8)?,
        mileage: r.get(9)?,
        notes: r.get(10)?,
        purchase_date: r.get(11)?,
        purchase_price: decimal_col(r, 12)?,
        down_payment: decimal_col(r, 13)?,
        dealer: r.get(14)?,
        loan_amount: decimal_col(r, 15)?,
        loan_term: r.get(16)?,
        interest_rate: decimal_col(r, 17)?,
        monthly_payment: decimal_col(r, 18)?,
        loan_bank: r.get(19)?,
        sold_date: r.get(20)?,
        sold_price: decimal_col(r, 21)?,
        sold_to: r.get(22)?,
    })
}

const EXPENSE_SELECT: &str = "SELECT e.id, e.car_id, e.date, e.amount, c.name, e.description, \
     e.mileage, e.created_by FROM expenses e LEFT JOIN categories c ON e.category_id=c.id";

fn expense_from_row(r: &Row<'_>) -> rusqlite::Result<Expense> {
    Ok(Expense {
        id: r.get(0)?,
        car_id: r.get(1)?,
        date: r.get(2)?,
        amount: required_decimal_col(r, 3)?,
        category: r.get(4)?,
        description: r.get(5)?,
        mileage: r.get(6)?,
        created_by: r.get(7)?,
    })
}

/// Optional narrowing for expense listings.
#[derive(Debug, Clone, Default)]
pub struct ExpenseFilter {
    /// `YYYY-MM`
    pub month: Option<String>,
    pub category: Option<String>,
    pub limit: Option<usize>,
}

pub fn find_user(conn: &Connection, email: &str) -> Result<Option<User>> {
    let user = conn
        .query_row(
            "SELECT id, email, name FROM users WHERE email=?1",
            params![email.trim()],
            |r| {
                Ok(User {
                    id: r.get(0)?,
                    email: r.get(1)?,
                    name: r.get(2)?,
                })
            },
        )
        .optional()?;
    Ok(user)
}

pub fn add_user(conn: &Connection, email: &str, name: &str) -> Result<User> {
    let email = email.trim();
    if !email.contains('@') {
        return Err(anyhow!("Invalid email '{}'", email));
    }
    conn.execute(
        "INSERT INTO users(email, name) VALUES (?1, ?2)",
        params![email, name.trim()],
    )
    .with_context(|| format!("Could not add user '{}'", email))?;
    tracing::debug!(email, "user added");
    find_user(conn, email)?.ok_or_else(|| anyhow!("User '{}' vanished after insert", email))
}

pub struct Store<'c> {
    conn: &'c Connection,
    user: User,
}

impl<'c> Store<'c> {
    pub fn new(conn: &'c Connection, user: User) -> Self {
        Self { conn, user }
    }

    /// Resolves the caller from an explicit identity or the `current_user`
    /// setting.
    pub fn login(conn: &'c Connection, identity: Option<&str>) -> Result<Self> {
        let email = match identity.map(str::trim).filter(|s| !s.is_empty()) {
            Some(e) => e.to_string(),
            None => config::get_setting(conn, config::CURRENT_USER)?
                .ok_or(AccessError::NotAuthenticated)?,
        };
        let user = find_user(conn, &email)?.ok_or(AccessError::NotAuthenticated)?;
        tracing::debug!(user = %user.email, "caller resolved");
        Ok(Self::new(conn, user))
    }

    pub fn conn(&self) -> &'c Connection {
        self.conn
    }

    pub fn user(&self) -> &User {
        &self.user
    }

    fn role_for(&self, car: &Car) -> Result<Option<Role>> {
        if car.owner_id == self.user.id {
            return Ok(Some(Role::Owner));
        }
        let shared: Option<i64> = self
            .conn
            .query_row(
                "SELECT 1 FROM car_shares WHERE car_id=?1 AND user_id=?2",
                params![car.id, self.user.id],
                |r| r.get(0),
            )
            .optional()?;
        Ok(shared.map(|_| Role::Shared))
    }

    /// Loads a car and checks the caller may perform `action` on it.
    pub fn authorize(&self, car_id: i64, action: Action) -> Result<(Car, Role)> {
        let car = self
            .conn
            .query_row(
                &format!("SELECT {CAR_COLUMNS} FROM cars WHERE id=?1"),
                params![car_id],
                car_from_row,
            )
            .optional()?
            .ok_or_else(|| AccessError::NotFound {
                what: "Car",
                id: car_id.to_string(),
            })?;
        let role = match self.role_for(&car)? {
            Some(Role::Owner) => Role::Owner,
            Some(Role::Shared) if action.allowed_for_shared() => Role::Shared,
            _ => {
                tracing::warn!(car_id, user = %self.user.email, %action, "access denied");
                return Err(AccessError::AccessDenied { action, car_id }.into());
            }
        };
        Ok((car, role))
    }

    pub fn car(&self, car_id: i64) -> Result<Car> {
        Ok(self.authorize(car_id, Action::Read)?.0)
    }

    /// Cars owned by or shared with the caller.
    pub fn list_cars(&self) -> Result<Vec<(Car, Role)>> {
        let mut stmt = self.conn.prepare(&format!(
            "SELECT {CAR_COLUMNS} FROM cars
             WHERE owner_id=?1 OR id IN (SELECT car_id FROM car_shares WHERE user_id=?1)
             ORDER BY name, id"
        ))?;
        let rows = stmt.query_map(params![self.user.id], car_from_row)?;
        let mut out = Vec::new();
        for row in rows {
            let car = row?;
            let role = if car.owner_id == self.user.id {
                Role::Owner
            } else {
                Role::Shared
            };
            out.push((car, role));
        }
        Ok(out)
    }

    pub fn add_car(&self, car: &CarPatch) -> Result<i64> {
        let name = car
            .name
            .as_deref()
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .ok_or_else(|| anyhow!("Car name is required"))?;
        self.conn.execute(
            "INSERT INTO cars(owner_id, name, make, model, year, vin, color, license_plate, mileage, notes)
             VALUES (?1,?2,?3,?4,?5,?6,?7,?8,?9,?10)",
            params![
                self.user.id,
                name,
                car.make,
                car.model,
                car.year,
                car.vin,
                car.color,
                car.license_plate,
                car.mileage,
                car.notes
            ],
        )?;
        let id = self.conn.last_insert_rowid();
        tracing::debug!(car_id = id, owner = %self.user.email, "car added");
        Ok(id)
    }

    pub fn update_car(&self, car_id: i64, patch: &CarPatch) -> Result<()> {
        self.authorize(car_id, Action::Update)?;
        if patch.is_empty() {
            return Err(anyhow!("Nothing to update"));
        }
        if let Some(name) = patch.name.as_deref() {
            if name.trim().is_empty() {
                return Err(anyhow!("Car name cannot be empty"));
            }
        }
        self.conn.execute(
            "UPDATE cars SET
                name=COALESCE(?2, name),
                make=COALESCE(?3, make),
                model=COALESCE(?4, model),
                year=COALESCE(?5, year),
                vin=COALESCE(?6, vin),
                color=COALESCE(?7, color),
                license_plate=COALESCE(?8, license_plate),
                mileage=COALESCE(?9, mileage),
                notes=COALESCE(?10, notes)
             WHERE id=?1",
            params![
                car_id,
                patch.name.as_deref().map(str::trim),
                patch.make,
                patch.model,
                patch.year,
                patch.vin,
                patch.color,
                patch.license_plate,
                patch.mileage,
                patch.notes
            ],
        )?;
        tracing::debug!(car_id, "car updated");
        Ok(())
    }

    pub fn delete_car(&self, car_id: i64) -> Result<Car> {
        let (car, _) = self.authorize(car_id, Action::Delete)?;
        self.conn
            .execute("DELETE FROM cars WHERE id=?1", params![car_id])?;
        tracing::debug!(car_id, "car deleted");
        Ok(car)
    }

    pub fn set_purchase(&self, car_id: i64, p: &Purchase) -> Result<()> {
        let (car, _) = self.authorize(car_id, Action::ManageFinance)?;
        ensure_positive(p.price, "Purchase price")?;
        if let Some(sold) = car.sold_date {
            if sold < p.date {
                return Err(anyhow!(
                    "Purchase date {} is after the recorded sale date {}",
                    p.date,
                    sold
                ));
            }
        }
        if let Some(down) = p.down_payment {
            if down < Decimal::ZERO {
                return Err(anyhow!("Down payment cannot be negative, got {}", down));
            }
            if down > p.price {
                return Err(anyhow!(
                    "Down payment {} exceeds purchase price {}",
                    down,
                    p.price
                ));
            }
        }
        self.conn.execute(
            "UPDATE cars SET purchase_date=?2, purchase_price=?3, down_payment=?4, dealer=?5 WHERE id=?1",
            params![
                car_id,
                p.date,
                p.price.to_string(),
                p.down_payment.map(|d| d.to_string()),
                p.dealer
            ],
        )?;
        tracing::debug!(car_id, date = %p.date, "purchase recorded");
        Ok(())
    }

    /// Replaces the loan terms wholesale.
    pub fn set_loan(&self, car_id: i64, loan: &LoanInput) -> Result<()> {
        let (car, _) = self.authorize(car_id, Action::ManageFinance)?;
        ensure_positive(loan.amount, "Loan amount")?;
        ensure_positive(loan.monthly_payment, "Monthly payment")?;
        if loan.term == 0 {
            return Err(anyhow!("Loan term must be at least one month"));
        }
        if let Some(rate) = loan.interest_rate {
            if rate < Decimal::ZERO {
                return Err(anyhow!("Interest rate cannot be negative"));
            }
        }
        let purchase_date = loan.purchase_date.or(car.purchase_date);
        if purchase_date.is_none() {
            tracing::warn!(car_id, "loan saved without a purchase date; due dates unavailable");
        }
        self.conn.execute(
            "UPDATE cars SET loan_amount=?2, loan_term=?3, interest_rate=?4, monthly_payment=?5,
                loan_bank=?6, purchase_date=?7 WHERE id=?1",
            params![
                car_id,
                loan.amount.to_string(),
                loan.term,
                loan.interest_rate.map(|r| r.to_string()),
                loan.monthly_payment.to_string(),
                loan.bank,
                purchase_date
            ],
        )?;
        tracing::debug!(car_id, amount = %loan.amount, term = loan.term, "loan terms set");
        Ok(())
    }

    pub fn clear_loan(&self, car_id: i64) -> Result<()> {
        self.authorize(car_id, Action::ManageFinance)?;
        self.conn.execute(
            "UPDATE cars SET loan_amount=NULL, loan_term=NULL, interest_rate=NULL,
                monthly_payment=NULL, loan_bank=NULL WHERE id=?1",
            params![car_id],
        )?;
        tracing::debug!(car_id, "loan terms cleared");
        Ok(())
    }

    pub fn set_sale(&self, car_id: i64, sale: &Sale) -> Result<()> {
        let (car, _) = self.authorize(car_id, Action::ManageFinance)?;
        ensure_positive(sale.price, "Sale price")?;
        if let Some(bought) = car.purchase_date {
            if sale.date < bought {
                return Err(anyhow!(
                    "Sale date {} is before the purchase date {}",
                    sale.date,
                    bought
                ));
            }
        }
        self.conn.execute(
            "UPDATE cars SET sold_date=?2, sold_price=?3, sold_to=?4 WHERE id=?1",
            params![car_id, sale.date, sale.price.to_string(), sale.buyer],
        )?;
        tracing::debug!(car_id, date = %sale.date, "sale recorded");
        Ok(())
    }

    pub fn share(&self, car_id: i64, email: &str) -> Result<User> {
        self.authorize(car_id, Action::ManageShares)?;
        let target = find_user(self.conn, email)?.ok_or_else(|| AccessError::NotFound {
            what: "User",
            id: email.trim().to_string(),
        })?;
        if target.id == self.user.id {
            return Err(anyhow!("Cannot share a car with its owner"));
        }
        self.conn.execute(
            "INSERT OR IGNORE INTO car_shares(car_id, user_id) VALUES (?1, ?2)",
            params![car_id, target.id],
        )?;
        tracing::debug!(car_id, with = %target.email, "car shared");
        Ok(target)
    }

    pub fn unshare(&self, car_id: i64, email: &str) -> Result<()> {
        self.authorize(car_id, Action::ManageShares)?;
        let target = find_user(self.conn, email)?.ok_or_else(|| AccessError::NotFound {
            what: "User",
            id: email.trim().to_string(),
        })?;
        let n = self.conn.execute(
            "DELETE FROM car_shares WHERE car_id=?1 AND user_id=?2",
            params![car_id, target.id],
        )?;
        if n == 0 {
            return Err(AccessError::NotFound {
                what: "Share",
                id: format!("{}:{}", car_id, target.email),
            }
            .into());
        }
        tracing::debug!(car_id, with = %target.email, "share revoked");
        Ok(())
    }

    pub fn shares(&self, car_id: i64) -> Result<Vec<Share>> {
        self.authorize(car_id, Action::Read)?;
        let mut stmt = self.conn.prepare(
            "SELECT s.car_id, u.email, u.name, s.created_at FROM car_shares s
             JOIN users u ON s.user_id=u.id WHERE s.car_id=?1 ORDER BY u.email",
        )?;
        let rows = stmt.query_map(params![car_id], |r| {
            Ok(Share {
                car_id: r.get(0)?,
                email: r.get(1)?,
                name: r.get(2)?,
                created_at: r.get(3)?,
            })
        })?;
        let mut out = Vec::new();
        for row in rows {
            out.push(row?);
        }
        Ok(out)
    }

    pub fn add_expense(&self, car_id: i64, e: &NewExpense) -> Result<i64> {
        let (car, _) = self.authorize(car_id, Action::Update)?;
        insert_expense(self.conn, &car, self.user.id, e)
    }

    pub fn expense(&self, expense_id: i64) -> Result<Expense> {
        let expense = self
            .conn
            .query_row(
                &format!("{EXPENSE_SELECT} WHERE e.id=?1"),
                params![expense_id],
                expense_from_row,
            )
            .optional()?
            .ok_or_else(|| AccessError::NotFound {
                what: "Expense",
                id: expense_id.to_string(),
            })?;
        self.authorize(expense.car_id, Action::Read)?;
        Ok(expense)
    }

    /// Expenses of a car, newest first.
    pub fn expenses(&self, car_id: i64, filter: &ExpenseFilter) -> Result<Vec<Expense>> {
        self.authorize(car_id, Action::Read)?;
        let mut sql = format!("{EXPENSE_SELECT} WHERE e.car_id=?");
        let mut params_vec: Vec<String> = vec![car_id.to_string()];
        if let Some(month) = &filter.month {
            sql.push_str(" AND substr(e.date,1,7)=?");
            params_vec.push(month.clone());
        }
        if let Some(cat) = &filter.category {
            sql.push_str(" AND c.name=?");
            params_vec.push(cat.clone());
        }
        sql.push_str(" ORDER BY e.date DESC, e.id DESC");
        if let Some(limit) = filter.limit {
            sql.push_str(" LIMIT ?");
            params_vec.push(limit.to_string());
        }
        let mut stmt = self.conn.prepare(&sql)?;
        let rows = stmt.query_map(rusqlite::params_from_iter(params_vec.iter()), expense_from_row)?;
        let mut out = Vec::new();
        for row in rows {
            out.push(row?);
        }
        Ok(out)
    }

    pub fn update_expense(&self, expense_id: i64, patch: &ExpensePatch) -> Result<()> {
        let current = self.expense(expense_id)?;
        let (car, _) = self.authorize(current.car_id, Action::Update)?;
        if let Some(amount) = patch.amount {
            ensure_positive(amount, "Amount")?;
        }
        if let Some(date) = patch.date {
            warn_if_after_sale(&car, date);
        }
        let category_id = match &patch.category {
            Some(name) => Some(id_for_category(self.conn, name)?),
            None => None,
        };
        self.conn.execute(
            "UPDATE expenses SET
                date=COALESCE(?2, date),
                amount=COALESCE(?3, amount),
                category_id=COALESCE(?4, category_id),
                description=COALESCE(?5, description),
                mileage=COALESCE(?6, mileage)
             WHERE id=?1",
            params![
                expense_id,
                patch.date,
                patch.amount.map(|a| a.to_string()),
                category_id,
                patch.description,
                patch.mileage
            ],
        )?;
        tracing::debug!(expense_id, "expense updated");
        Ok(())
    }

    /// Owners may delete any expense on their car; shared users only their own.
    pub fn delete_expense(&self, expense_id: i64) -> Result<Expense> {
        let expense = self.expense(expense_id)?;
        let (_, role) = self.authorize(expense.car_id, Action::Update)?;
        if role == Role::Shared && expense.created_by != self.user.id {
            tracing::warn!(expense_id, user = %self.user.email, "access denied");
            return Err(AccessError::AccessDenied {
                action: Action::Delete,
                car_id: expense.car_id,
            }
            .into());
        }
        self.conn
            .execute("DELETE FROM expenses WHERE id=?1", params![expense_id])?;
        tracing::debug!(expense_id, "expense deleted");
        Ok(expense)
    }

    /// Loan-category expenses of a car in date order.
    pub fn loan_payments(&self, car_id: i64) -> Result<Vec<Payment>> {
        self.authorize(car_id, Action::Read)?;
        let category = config::loan_category(self.conn)?;
        let mut stmt = self.conn.prepare_cached(
            "SELECT e.date, e.amount FROM expenses e JOIN categories c ON e.category_id=c.id
             WHERE e.car_id=?1 AND c.name=?2 ORDER BY e.date, e.id",
        )?;
        let rows = stmt.query_map(params![car_id, category], |r| {
            Ok(Payment {
                date: date_to_utc(r.get(0)?),
                amount: required_decimal_col(r, 1)?,
            })
        })?;
        let mut out = Vec::new();
        for row in rows {
            out.push(row?);
        }
        Ok(out)
    }
}

impl LoanSource for Store<'_> {
    fn loan_car(&self, car_id: i64) -> Result<Car> {
        self.car(car_id)
    }

    fn loan_payments(&self, car_id: i64) -> Result<Vec<Payment>> {
        Store::loan_payments(self, car_id)
    }
}

fn ensure_positive(value: Decimal, what: &str) -> Result<()> {
    if value <= Decimal::ZERO {
        return Err(anyhow!("{} must be positive, got {}", what, value));
    }
    Ok(())
}

fn warn_if_after_sale(car: &Car, date: chrono::NaiveDate) {
    if let Some(sold) = car.sold_date.filter(|sold| date > *sold) {
        tracing::warn!(car_id = car.id, %date, %sold, "expense dated after sale");
    }
}

/// Inserts without re-checking access; callers must have authorized `car`.
/// Takes the raw connection so the importer can pass its open transaction.
pub(crate) fn insert_expense(
    conn: &Connection,
    car: &Car,
    created_by: i64,
    e: &NewExpense,
) -> Result<i64> {
    ensure_positive(e.amount, "Amount")?;
    warn_if_after_sale(car, e.date);
    let category_id = id_for_category(conn, &e.category)?;
    conn.execute(
        "INSERT INTO expenses(car_id, date, amount, category_id, description, mileage, created_by)
         VALUES (?1,?2,?3,?4,?5,?6,?7)",
        params![
            car.id,
            e.date,
            e.amount.to_string(),
            category_id,
            e.description,
            e.mileage,
            created_by
        ],
    )?;
    let id = conn.last_insert_rowid();
    if let Some(m) = e.mileage {
        conn.execute(
            "UPDATE cars SET mileage=?2 WHERE id=?1 AND (mileage IS NULL OR mileage < ?2)",
            params![car.id, m],
        )?;
    }
    tracing::debug!(expense_id = id, car_id = car.id, amount = %e.amount, "expense added");
    Ok(id)
}
