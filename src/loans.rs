// Copyright (c) 2025 Soumyadip Sarkar.
// All rights reserved.
//
// This source code is licensed under the license found in the
// LICENSE file in the root directory of this source tree.

//! Loan queries: next installment due and the full payment history.
//!
//! Both surfaces go through [`evaluate`], so they see the same projection,
//! the same installment calendar and the same [`PaidOffRule`]. They differ
//! only in accrual: the history view reports the balance including interest
//! accrued up to `now`, the next-payment view the balance right after the
//! last recorded payment.

use anyhow::Result;
use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use serde::{Serialize, Serializer};

use crate::amortization::{
    self, Accrual, Installment, LoanTerms, PaidOffRule, Payment, PaymentSplit, PeriodStatus,
    Projection, round_cents,
};
use crate::models::Car;

/// Read side of the record store the loan queries need.
pub trait LoanSource {
    fn loan_car(&self, car_id: i64) -> Result<Car>;
    fn loan_payments(&self, car_id: i64) -> Result<Vec<Payment>>;
}

#[derive(Debug, Clone, PartialEq)]
pub enum NextPayment {
    PaidOff,
    Due(DuePayment),
}

impl NextPayment {
    pub fn is_paid_off(&self) -> bool {
        matches!(self, NextPayment::PaidOff)
    }
}

impl Serialize for NextPayment {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        #[derive(Serialize)]
        #[serde(rename_all = "camelCase")]
        struct Wire<'a> {
            is_paid_off: bool,
            #[serde(flatten)]
            due: Option<&'a DuePayment>,
        }
        let wire = match self {
            NextPayment::PaidOff => Wire {
                is_paid_off: true,
                due: None,
            },
            NextPayment::Due(due) => Wire {
                is_paid_off: false,
                due: Some(due),
            },
        };
        wire.serialize(serializer)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DuePayment {
    pub next_due_date: NaiveDate,
    pub monthly_payment: Decimal,
    pub amount_due: Decimal,
    pub paid_this_period: Decimal,
    pub remaining_balance: Decimal,
    pub payment_number: u32,
    pub is_overdue: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PaymentRow {
    pub date: NaiveDate,
    pub amount: Decimal,
    pub principal_amount: Decimal,
    pub interest_amount: Decimal,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LoanDetails {
    pub original_loan_amount: Decimal,
    pub loan_term: u32,
    pub interest_rate: Decimal,
    pub monthly_payment: Decimal,
    pub loan_bank: Option<String>,
    pub total_paid: Decimal,
    pub total_principal: Decimal,
    pub total_interest: Decimal,
    pub remaining_balance: Decimal,
    pub is_paid_off: bool,
    /// Raw signals behind `is_paid_off`, exposed so a disagreement is visible.
    pub balance_paid_off: bool,
    pub schedule_complete: bool,
    pub months_early: u32,
    pub next_payment_date: Option<NaiveDate>,
    pub is_overdue: bool,
    pub payments: Vec<PaymentRow>,
}

/// Everything both surfaces derive from one car's loan.
#[derive(Debug, Clone, PartialEq)]
pub struct LoanState {
    pub terms: LoanTerms,
    pub projection: Projection,
    pub balance_paid_off: bool,
    pub schedule_complete: bool,
    pub is_paid_off: bool,
    /// Installment the borrower is working on, absent once paid off.
    pub current: Option<(u32, PeriodStatus)>,
}

/// Runs the projector and the locator over one snapshot of loan data.
pub fn evaluate(
    terms: &LoanTerms,
    payments: &[Payment],
    now: DateTime<Utc>,
    accrual: Accrual,
    rule: PaidOffRule,
) -> LoanState {
    let projection = amortization::project(
        terms.loan_amount,
        terms.monthly_rate(),
        terms.purchase_date,
        payments,
        accrual,
    );
    let installment = amortization::next_installment(
        terms.loan_term,
        terms.purchase_date,
        payments.iter().map(|p| p.date),
    );
    let balance_paid_off = projection.is_paid_off();
    let schedule_complete = installment == Installment::AllCovered;
    let is_paid_off = rule.decide(balance_paid_off, schedule_complete);

    let current = if is_paid_off {
        None
    } else {
        // A rule that ignores the calendar can leave money owed after every
        // month is covered; the last installment then stays open.
        let (number, due_date) = match installment {
            Installment::Due { number, due_date } => (number, due_date),
            Installment::AllCovered => (
                terms.loan_term,
                amortization::add_months(terms.purchase_date, terms.loan_term),
            ),
        };
        let status = amortization::period_status(
            due_date,
            payments,
            projection.remaining_balance,
            terms.monthly_payment,
            now,
        );
        Some((number, status))
    };

    LoanState {
        terms: terms.clone(),
        projection,
        balance_paid_off,
        schedule_complete,
        is_paid_off,
        current,
    }
}

/// Next installment for a car, `None` when it carries no complete loan.
pub fn next_payment<S: LoanSource + ?Sized>(
    source: &S,
    car_id: i64,
    now: DateTime<Utc>,
    rule: PaidOffRule,
) -> Result<Option<NextPayment>> {
    let car = source.loan_car(car_id)?;
    let Some(terms) = car.loan_terms() else {
        return Ok(None);
    };
    let payments = source.loan_payments(car_id)?;
    let state = evaluate(&terms, &payments, now, Accrual::AtLastPayment, rule);
    tracing::debug!(
        car_id,
        balance_paid_off = state.balance_paid_off,
        schedule_complete = state.schedule_complete,
        %rule,
        "next payment evaluated"
    );
    Ok(Some(next_payment_view(&state)))
}

pub fn next_payment_view(state: &LoanState) -> NextPayment {
    match &state.current {
        None => NextPayment::PaidOff,
        Some((number, status)) => NextPayment::Due(DuePayment {
            next_due_date: status.due_date.date_naive(),
            monthly_payment: round_cents(state.terms.monthly_payment),
            amount_due: round_cents(status.amount_due),
            paid_this_period: round_cents(status.paid_this_period),
            remaining_balance: state.projection.remaining_balance,
            payment_number: *number,
            is_overdue: status.is_overdue,
        }),
    }
}

/// Full loan history for a car, `None` when it carries no complete loan.
pub fn loan_details<S: LoanSource + ?Sized>(
    source: &S,
    car_id: i64,
    now: DateTime<Utc>,
    rule: PaidOffRule,
) -> Result<Option<LoanDetails>> {
    let car = source.loan_car(car_id)?;
    let Some(terms) = car.loan_terms() else {
        return Ok(None);
    };
    let payments = source.loan_payments(car_id)?;
    let state = evaluate(&terms, &payments, now, Accrual::ToNow(now), rule);
    tracing::debug!(
        car_id,
        balance_paid_off = state.balance_paid_off,
        schedule_complete = state.schedule_complete,
        %rule,
        "loan details evaluated"
    );
    Ok(Some(details_view(&state, car.loan_bank, now)))
}

pub fn details_view(state: &LoanState, loan_bank: Option<String>, now: DateTime<Utc>) -> LoanDetails {
    let p = &state.projection;
    LoanDetails {
        original_loan_amount: round_cents(state.terms.loan_amount),
        loan_term: state.terms.loan_term,
        interest_rate: state.terms.interest_rate,
        monthly_payment: round_cents(state.terms.monthly_payment),
        loan_bank,
        total_paid: round_cents(p.total_paid),
        total_principal: round_cents(p.total_principal),
        total_interest: round_cents(p.total_interest),
        remaining_balance: p.remaining_balance,
        is_paid_off: state.is_paid_off,
        balance_paid_off: state.balance_paid_off,
        schedule_complete: state.schedule_complete,
        months_early: amortization::months_early(
            &state.terms,
            p.remaining_balance,
            state.is_paid_off,
            now,
        ),
        next_payment_date: state.current.as_ref().map(|(_, s)| s.due_date.date_naive()),
        is_overdue: state.current.as_ref().is_some_and(|(_, s)| s.is_overdue),
        payments: p.splits.iter().map(payment_row).collect(),
    }
}

/// Rounded history row. Principal is what remains of the rounded amount
/// after rounded interest, so every row adds up to the cent.
pub fn payment_row(split: &PaymentSplit) -> PaymentRow {
    let amount = round_cents(split.amount);
    let interest_amount = round_cents(split.interest_amount);
    PaymentRow {
        date: split.date.date_naive(),
        amount,
        principal_amount: (amount - interest_amount).max(Decimal::ZERO),
        interest_amount,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::utils::date_to_utc;
    use anyhow::anyhow;
    use std::str::FromStr;

    struct Fake {
        car: Car,
        payments: Vec<Payment>,
    }

    impl LoanSource for Fake {
        fn loan_car(&self, car_id: i64) -> Result<Car> {
            if car_id == self.car.id {
                Ok(self.car.clone())
            } else {
                Err(anyhow!("Car {} not found", car_id))
            }
        }

        fn loan_payments(&self, _car_id: i64) -> Result<Vec<Payment>> {
            Ok(self.payments.clone())
        }
    }

    fn d(s: &str) -> Decimal {
        Decimal::from_str(s).unwrap()
    }

    fn day(s: &str) -> NaiveDate {
        NaiveDate::parse_from_str(s, "%Y-%m-%d").unwrap()
    }

    fn loan_car() -> Car {
        Car {
            id: 7,
            owner_id: 1,
            name: "Civic".into(),
            purchase_date: Some(day("2024-01-15")),
            loan_amount: Some(d("1200")),
            loan_term: Some(3),
            interest_rate: None,
            monthly_payment: Some(d("400")),
            loan_bank: Some("Credit Union".into()),
            ..Car::default()
        }
    }

    fn pay(date: &str, amount: &str) -> Payment {
        Payment {
            date: date_to_utc(day(date)),
            amount: d(amount),
        }
    }

    fn now(s: &str) -> DateTime<Utc> {
        date_to_utc(day(s))
    }

    #[test]
    fn history_rows_add_up_to_the_cent() {
        let split = PaymentSplit {
            date: now("2024-02-01"),
            amount: d("100.00"),
            principal_amount: d("99.875"),
            interest_amount: d("0.125"),
        };
        let row = payment_row(&split);
        assert_eq!(row.interest_amount, d("0.13"));
        assert_eq!(row.principal_amount, d("99.87"));
        assert_eq!(row.principal_amount + row.interest_amount, row.amount);
    }

    #[test]
    fn missing_loan_fields_mean_no_loan() {
        let mut car = loan_car();
        car.monthly_payment = None;
        let fake = Fake {
            car,
            payments: vec![],
        };
        assert!(next_payment(&fake, 7, now("2024-03-01"), PaidOffRule::Either).unwrap().is_none());
        assert!(loan_details(&fake, 7, now("2024-03-01"), PaidOffRule::Either).unwrap().is_none());

        let mut car = loan_car();
        car.purchase_date = None;
        let fake = Fake {
            car,
            payments: vec![],
        };
        assert!(next_payment(&fake, 7, now("2024-03-01"), PaidOffRule::Either).unwrap().is_none());
    }

    #[test]
    fn first_installment_due_a_month_after_purchase() {
        let fake = Fake {
            car: loan_car(),
            payments: vec![],
        };
        let next = next_payment(&fake, 7, now("2024-02-20"), PaidOffRule::Either)
            .unwrap()
            .unwrap();
        match next {
            NextPayment::Due(due) => {
                assert_eq!(due.payment_number, 1);
                assert_eq!(due.next_due_date, day("2024-02-15"));
                assert_eq!(due.amount_due, d("400"));
                assert!(due.is_overdue);
                assert_eq!(due.remaining_balance, d("1200"));
            }
            NextPayment::PaidOff => panic!("loan is not paid off"),
        }
    }

    #[test]
    fn partial_payment_reduces_amount_due() {
        let fake = Fake {
            car: loan_car(),
            payments: vec![pay("2024-02-01", "150")],
        };
        let NextPayment::Due(due) = next_payment(&fake, 7, now("2024-02-05"), PaidOffRule::Either)
            .unwrap()
            .unwrap()
        else {
            panic!("expected a due installment");
        };
        // The February bucket is filled, so March is next; February's
        // payment falls outside March's period.
        assert_eq!(due.payment_number, 2);
        assert_eq!(due.next_due_date, day("2024-03-15"));
        assert_eq!(due.paid_this_period, Decimal::ZERO);
        assert_eq!(due.amount_due, d("400"));
        assert!(!due.is_overdue);
    }

    #[test]
    fn payment_inside_period_counts_toward_due() {
        let fake = Fake {
            car: loan_car(),
            payments: vec![pay("2024-02-10", "400"), pay("2024-02-20", "100")],
        };
        let NextPayment::Due(due) = next_payment(&fake, 7, now("2024-02-25"), PaidOffRule::Either)
            .unwrap()
            .unwrap()
        else {
            panic!("expected a due installment");
        };
        assert_eq!(due.payment_number, 2);
        assert_eq!(due.paid_this_period, d("100"));
        assert_eq!(due.amount_due, d("300"));
    }

    #[test]
    fn final_installment_capped_at_balance() {
        let fake = Fake {
            car: loan_car(),
            payments: vec![pay("2024-02-15", "500"), pay("2024-03-15", "500")],
        };
        let NextPayment::Due(due) = next_payment(&fake, 7, now("2024-03-20"), PaidOffRule::Either)
            .unwrap()
            .unwrap()
        else {
            panic!("expected a due installment");
        };
        assert_eq!(due.payment_number, 3);
        assert_eq!(due.remaining_balance, d("200"));
        assert_eq!(due.amount_due, d("200"));
    }

    #[test]
    fn balance_payoff_ends_loan_early() {
        let fake = Fake {
            car: loan_car(),
            payments: vec![pay("2024-02-15", "1200")],
        };
        let next = next_payment(&fake, 7, now("2024-02-20"), PaidOffRule::Either)
            .unwrap()
            .unwrap();
        assert!(next.is_paid_off());

        let details = loan_details(&fake, 7, now("2024-02-20"), PaidOffRule::Either)
            .unwrap()
            .unwrap();
        assert!(details.is_paid_off);
        assert!(details.balance_paid_off);
        assert!(!details.schedule_complete);
        assert_eq!(details.months_early, 2);
        assert_eq!(details.next_payment_date, None);
        assert!(!details.is_overdue);
    }

    #[test]
    fn rule_decides_when_signals_disagree() {
        // Every month covered with token payments: calendar says done,
        // balance does not.
        let fake = Fake {
            car: loan_car(),
            payments: vec![
                pay("2024-02-15", "10"),
                pay("2024-03-15", "10"),
                pay("2024-04-15", "10"),
            ],
        };
        let at = now("2024-05-01");
        assert!(next_payment(&fake, 7, at, PaidOffRule::Either).unwrap().unwrap().is_paid_off());
        assert!(next_payment(&fake, 7, at, PaidOffRule::Schedule).unwrap().unwrap().is_paid_off());

        let NextPayment::Due(due) = next_payment(&fake, 7, at, PaidOffRule::Balance)
            .unwrap()
            .unwrap()
        else {
            panic!("balance rule keeps the loan open");
        };
        assert_eq!(due.payment_number, 3);
        assert_eq!(due.next_due_date, day("2024-04-15"));
        assert_eq!(due.remaining_balance, d("1170"));
        assert!(due.is_overdue);

        let details = loan_details(&fake, 7, at, PaidOffRule::Balance).unwrap().unwrap();
        assert!(!details.is_paid_off);
        assert!(details.schedule_complete);
        assert_eq!(details.next_payment_date, Some(day("2024-04-15")));
    }

    #[test]
    fn details_accrue_interest_to_now_but_next_payment_does_not() {
        let mut car = loan_car();
        car.interest_rate = Some(d("12"));
        let fake = Fake {
            car,
            payments: vec![],
        };
        let at = now("2024-03-15");
        let details = loan_details(&fake, 7, at, PaidOffRule::Either).unwrap().unwrap();
        let NextPayment::Due(due) = next_payment(&fake, 7, at, PaidOffRule::Either)
            .unwrap()
            .unwrap()
        else {
            panic!("expected a due installment");
        };
        assert_eq!(due.remaining_balance, d("1200"));
        assert!(details.remaining_balance > d("1200"));
    }

    #[test]
    fn details_list_split_payments_in_date_order() {
        let mut car = loan_car();
        car.interest_rate = Some(d("6"));
        let fake = Fake {
            car,
            payments: vec![pay("2024-03-15", "400"), pay("2024-02-15", "400")],
        };
        let details = loan_details(&fake, 7, now("2024-03-15"), PaidOffRule::Either)
            .unwrap()
            .unwrap();
        assert_eq!(details.payments.len(), 2);
        assert_eq!(details.payments[0].date, day("2024-02-15"));
        for row in &details.payments {
            assert_eq!(row.principal_amount + row.interest_amount, row.amount);
        }
        assert_eq!(details.total_paid, d("800"));
        assert_eq!(details.loan_bank.as_deref(), Some("Credit Union"));
    }

    #[test]
    fn next_payment_json_shape() {
        let paid = serde_json::to_value(NextPayment::PaidOff).unwrap();
        assert_eq!(paid, serde_json::json!({ "isPaidOff": true }));

        let fake = Fake {
            car: loan_car(),
            payments: vec![],
        };
        let due = next_payment(&fake, 7, now("2024-01-20"), PaidOffRule::Either)
            .unwrap()
            .unwrap();
        let v = serde_json::to_value(due).unwrap();
        assert_eq!(v["isPaidOff"], false);
        assert_eq!(v["paymentNumber"], 1);
        assert_eq!(v["nextDueDate"], "2024-02-15");
        assert_eq!(v["isOverdue"], false);
    }
}
