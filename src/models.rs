// Copyright (c) 2025 Soumyadip Sarkar.
// All rights reserved.
//
// This source code is licensed under the license found in the
// LICENSE file in the root directory of this source tree.

use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::amortization::LoanTerms;
use crate::utils::date_to_utc;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct User {
    pub id: i64,
    pub email: String,
    pub name: String,
}

/// How the caller relates to a car.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    Owner,
    Shared,
}

impl Role {
    pub fn as_str(self) -> &'static str {
        match self {
            Role::Owner => "owner",
            Role::Shared => "shared",
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Car {
    pub id: i64,
    pub owner_id: i64,
    pub name: String,
    pub make: Option<String>,
    pub model: Option<String>,
    pub year: Option<i32>,
    pub vin: Option<String>,
    pub color: Option<String>,
    pub license_plate: Option<String>,
    pub mileage: Option<i64>,
    pub notes: Option<String>,
    // purchase
    pub purchase_date: Option<NaiveDate>,
    pub purchase_price: Option<Decimal>,
    pub down_payment: Option<Decimal>,
    pub dealer: Option<String>,
    // loan
    pub loan_amount: Option<Decimal>,
    pub loan_term: Option<u32>,
    pub interest_rate: Option<Decimal>,
    pub monthly_payment: Option<Decimal>,
    pub loan_bank: Option<String>,
    // sale
    pub sold_date: Option<NaiveDate>,
    pub sold_price: Option<Decimal>,
    pub sold_to: Option<String>,
}

impl Car {
    /// Loan terms when every required field is present; a missing interest
    /// rate counts as 0%.
    pub fn loan_terms(&self) -> Option<LoanTerms> {
        Some(LoanTerms {
            loan_amount: self.loan_amount?,
            loan_term: self.loan_term?,
            interest_rate: self.interest_rate.unwrap_or(Decimal::ZERO),
            monthly_payment: self.monthly_payment?,
            purchase_date: date_to_utc(self.purchase_date?),
        })
    }

    pub fn has_any_loan_field(&self) -> bool {
        self.loan_amount.is_some() || self.loan_term.is_some() || self.monthly_payment.is_some()
    }

    pub fn display_name(&self) -> String {
        let desc: Vec<String> = [
            self.year.map(|y| y.to_string()),
            self.make.clone(),
            self.model.clone(),
        ]
        .into_iter()
        .flatten()
        .collect();
        if desc.is_empty() {
            self.name.clone()
        } else {
            format!("{} ({})", self.name, desc.join(" "))
        }
    }
}

/// Descriptive fields any user with access may change.
#[derive(Debug, Clone, Default)]
pub struct CarPatch {
    pub name: Option<String>,
    pub make: Option<String>,
    pub model: Option<String>,
    pub year: Option<i32>,
    pub vin: Option<String>,
    pub color: Option<String>,
    pub license_plate: Option<String>,
    pub mileage: Option<i64>,
    pub notes: Option<String>,
}

impl CarPatch {
    pub fn is_empty(&self) -> bool {
        self.name.is_none()
            && self.make.is_none()
            && self.model.is_none()
            && self.year.is_none()
            && self.vin.is_none()
            && self.color.is_none()
            && self.license_plate.is_none()
            && self.mileage.is_none()
            && self.notes.is_none()
    }
}

#[derive(Debug, Clone)]
pub struct Purchase {
    pub date: NaiveDate,
    pub price: Decimal,
    pub down_payment: Option<Decimal>,
    pub dealer: Option<String>,
}

#[derive(Debug, Clone)]
pub struct LoanInput {
    pub amount: Decimal,
    pub term: u32,
    pub interest_rate: Option<Decimal>,
    pub monthly_payment: Decimal,
    pub bank: Option<String>,
    /// Sets the purchase date alongside the loan when given.
    pub purchase_date: Option<NaiveDate>,
}

#[derive(Debug, Clone)]
pub struct Sale {
    pub date: NaiveDate,
    pub price: Decimal,
    pub buyer: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Category {
    pub id: i64,
    pub name: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Expense {
    pub id: i64,
    pub car_id: i64,
    pub date: NaiveDate,
    pub amount: Decimal,
    pub category: Option<String>,
    pub description: Option<String>,
    pub mileage: Option<i64>,
    pub created_by: i64,
}

#[derive(Debug, Clone)]
pub struct NewExpense {
    pub date: NaiveDate,
    pub amount: Decimal,
    pub category: String,
    pub description: Option<String>,
    pub mileage: Option<i64>,
}

#[derive(Debug, Clone, Default)]
pub struct ExpensePatch {
    pub date: Option<NaiveDate>,
    pub amount: Option<Decimal>,
    pub category: Option<String>,
    pub description: Option<String>,
    pub mileage: Option<i64>,
}

#[derive(Debug, Clone, Serialize)]
pub struct Share {
    pub car_id: i64,
    pub email: String,
    pub name: String,
    pub created_at: String,
}
