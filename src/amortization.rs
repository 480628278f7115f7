// Copyright (c) 2025 Soumyadip Sarkar.
// All rights reserved.
//
// This source code is licensed under the license found in the
// LICENSE file in the root directory of this source tree.

//! Loan amortization engine.
//!
//! Two pure pieces live here: the balance projector, which replays recorded
//! payments against the opening principal using a 30.44-day average month
//! for interest proration, and the next-payment locator, which walks the
//! installment calendar and buckets payments by `(year, month)`. Nothing in
//! this module touches the database or the clock; callers pass `now` in.

use chrono::{DateTime, Datelike, Months, Utc};
use rust_decimal::prelude::ToPrimitive;
use rust_decimal::{Decimal, RoundingStrategy};
use serde::Serialize;
use std::collections::HashSet;
use std::fmt;
use std::str::FromStr;

/// Length of the proration month (30.44 days) in milliseconds.
pub const AVERAGE_MONTH_MS: i64 = 2_630_016_000;

/// Balances at or below one cent count as paid off.
pub const PAID_OFF_THRESHOLD: Decimal = Decimal::from_parts(1, 0, 0, false, 2);

#[derive(Debug, Clone, PartialEq)]
pub struct LoanTerms {
    pub loan_amount: Decimal,
    pub loan_term: u32,
    /// Nominal annual rate in percent.
    pub interest_rate: Decimal,
    pub monthly_payment: Decimal,
    pub purchase_date: DateTime<Utc>,
}

impl LoanTerms {
    pub fn monthly_rate(&self) -> Decimal {
        monthly_rate(self.interest_rate)
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Payment {
    pub date: DateTime<Utc>,
    pub amount: Decimal,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PaymentSplit {
    pub date: DateTime<Utc>,
    pub amount: Decimal,
    pub principal_amount: Decimal,
    pub interest_amount: Decimal,
}

/// Whether the projected balance carries interest accrued since the last
/// payment up to a reference instant.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Accrual {
    AtLastPayment,
    ToNow(DateTime<Utc>),
}

#[derive(Debug, Clone, PartialEq)]
pub struct Projection {
    pub splits: Vec<PaymentSplit>,
    /// Unrounded balance right after the last payment.
    pub balance_after_payments: Decimal,
    /// Rounded to the cent, including forward accrual when requested.
    pub remaining_balance: Decimal,
    pub total_paid: Decimal,
    pub total_principal: Decimal,
    pub total_interest: Decimal,
}

impl Projection {
    pub fn is_paid_off(&self) -> bool {
        is_paid_off(self.remaining_balance)
    }
}

/// Annual percentage rate to a monthly fraction.
pub fn monthly_rate(annual_percent: Decimal) -> Decimal {
    annual_percent / Decimal::ONE_HUNDRED / Decimal::from(12)
}

pub fn round_cents(value: Decimal) -> Decimal {
    value.round_dp_with_strategy(2, RoundingStrategy::MidpointAwayFromZero)
}

pub fn is_paid_off(balance: Decimal) -> bool {
    balance <= PAID_OFF_THRESHOLD
}

/// Fractional proration months between two instants, never negative.
pub fn months_between(from: DateTime<Utc>, to: DateTime<Utc>) -> Decimal {
    let ms = (to - from).num_milliseconds();
    if ms <= 0 {
        return Decimal::ZERO;
    }
    Decimal::from(ms) / Decimal::from(AVERAGE_MONTH_MS)
}

pub fn accrued_interest(
    balance: Decimal,
    monthly_rate: Decimal,
    from: DateTime<Utc>,
    to: DateTime<Utc>,
) -> Decimal {
    balance * monthly_rate * months_between(from, to)
}

/// Replays `payments` against `opening_balance` starting at `anchor`.
///
/// Payments are sorted by date (stable, so same-day rows keep their
/// recorded order) before they are applied, which makes the result a pure
/// function of the payment set. Each payment first covers the interest
/// accrued since the previous payment; the remainder reduces principal.
pub fn project(
    opening_balance: Decimal,
    monthly_rate: Decimal,
    anchor: DateTime<Utc>,
    payments: &[Payment],
    accrual: Accrual,
) -> Projection {
    let mut ordered = payments.to_vec();
    ordered.sort_by_key(|p| p.date);

    let mut balance = opening_balance.max(Decimal::ZERO);
    let mut last = anchor;
    let mut splits = Vec::with_capacity(ordered.len());
    let mut total_paid = Decimal::ZERO;
    let mut total_principal = Decimal::ZERO;
    let mut total_interest = Decimal::ZERO;

    for payment in ordered {
        let accrued = accrued_interest(balance, monthly_rate, last, payment.date);
        let interest = payment.amount.min(accrued);
        let principal = (payment.amount - interest).max(Decimal::ZERO);
        balance = (balance - principal).max(Decimal::ZERO);
        last = payment.date;

        total_paid += payment.amount;
        total_principal += principal;
        total_interest += interest;
        splits.push(PaymentSplit {
            date: payment.date,
            amount: payment.amount,
            principal_amount: principal,
            interest_amount: interest,
        });
    }

    let balance_after_payments = balance;
    let projected = match accrual {
        Accrual::AtLastPayment => balance,
        Accrual::ToNow(now) => balance + accrued_interest(balance, monthly_rate, last, now),
    };

    Projection {
        splits,
        balance_after_payments,
        remaining_balance: round_cents(projected),
        total_paid,
        total_principal,
        total_interest,
    }
}

/// Calendar month addition. Days past the end of the target month clamp to
/// its last day, so every installment lands in a distinct month bucket.
pub fn add_months(anchor: DateTime<Utc>, months: u32) -> DateTime<Utc> {
    anchor
        .checked_add_months(Months::new(months))
        .unwrap_or(DateTime::<Utc>::MAX_UTC)
}

pub fn sub_months(anchor: DateTime<Utc>, months: u32) -> DateTime<Utc> {
    anchor
        .checked_sub_months(Months::new(months))
        .unwrap_or(DateTime::<Utc>::MIN_UTC)
}

pub fn month_bucket(date: DateTime<Utc>) -> (i32, u32) {
    (date.year(), date.month())
}

/// Whole calendar months from `from` to `to`, zero when `to` is earlier.
pub fn calendar_months_between(from: DateTime<Utc>, to: DateTime<Utc>) -> u32 {
    if to <= from {
        return 0;
    }
    let raw = (to.year() - from.year()) * 12 + to.month() as i32 - from.month() as i32;
    let mut months = raw.max(0) as u32;
    if months > 0 && add_months(from, months) > to {
        months -= 1;
    }
    months
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Installment {
    Due { number: u32, due_date: DateTime<Utc> },
    AllCovered,
}

/// First installment in `1..=loan_term` whose due month holds no payment.
pub fn next_installment<I>(loan_term: u32, anchor: DateTime<Utc>, payment_dates: I) -> Installment
where
    I: IntoIterator<Item = DateTime<Utc>>,
{
    let buckets: HashSet<(i32, u32)> = payment_dates.into_iter().map(month_bucket).collect();
    (1..=loan_term)
        .map(|k| (k, add_months(anchor, k)))
        .find(|(_, due)| !buckets.contains(&month_bucket(*due)))
        .map(|(number, due_date)| Installment::Due { number, due_date })
        .unwrap_or(Installment::AllCovered)
}

#[derive(Debug, Clone, PartialEq)]
pub struct PeriodStatus {
    pub period_start: DateTime<Utc>,
    pub due_date: DateTime<Utc>,
    pub paid_this_period: Decimal,
    pub amount_due: Decimal,
    pub is_overdue: bool,
}

/// Amount still owed for the installment falling due on `due_date`.
///
/// The period is the calendar month ending at the due date, open at the
/// start and closed at the end. The final installment is capped at what is
/// actually left on the loan.
pub fn period_status(
    due_date: DateTime<Utc>,
    payments: &[Payment],
    remaining_balance: Decimal,
    monthly_payment: Decimal,
    now: DateTime<Utc>,
) -> PeriodStatus {
    let period_start = sub_months(due_date, 1);
    let paid_this_period: Decimal = payments
        .iter()
        .filter(|p| p.date > period_start && p.date <= due_date)
        .map(|p| p.amount)
        .sum();
    let effective = if remaining_balance < monthly_payment {
        remaining_balance
    } else {
        monthly_payment
    };
    PeriodStatus {
        period_start,
        due_date,
        paid_this_period,
        amount_due: (effective - paid_this_period).max(Decimal::ZERO),
        is_overdue: now > due_date,
    }
}

/// How many installments ahead of the calendar the borrower is.
pub fn months_early(
    terms: &LoanTerms,
    remaining_balance: Decimal,
    paid_off: bool,
    now: DateTime<Utc>,
) -> u32 {
    let elapsed = calendar_months_between(terms.purchase_date, now).min(terms.loan_term);
    let scheduled_remaining = terms.loan_term - elapsed;
    let needed = if paid_off || terms.monthly_payment <= Decimal::ZERO {
        0
    } else {
        (remaining_balance / terms.monthly_payment)
            .ceil()
            .to_u32()
            .unwrap_or(u32::MAX)
    };
    scheduled_remaining.saturating_sub(needed)
}

/// Which of the two paid-off signals decides that a loan is finished.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum PaidOffRule {
    /// Either the balance or the installment calendar says so.
    #[default]
    Either,
    Balance,
    Schedule,
    Both,
}

impl PaidOffRule {
    pub const ALL: [PaidOffRule; 4] = [
        PaidOffRule::Either,
        PaidOffRule::Balance,
        PaidOffRule::Schedule,
        PaidOffRule::Both,
    ];

    pub fn decide(self, balance_paid_off: bool, schedule_complete: bool) -> bool {
        match self {
            PaidOffRule::Either => balance_paid_off || schedule_complete,
            PaidOffRule::Balance => balance_paid_off,
            PaidOffRule::Schedule => schedule_complete,
            PaidOffRule::Both => balance_paid_off && schedule_complete,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            PaidOffRule::Either => "either",
            PaidOffRule::Balance => "balance",
            PaidOffRule::Schedule => "schedule",
            PaidOffRule::Both => "both",
        }
    }
}

impl fmt::Display for PaidOffRule {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for PaidOffRule {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        PaidOffRule::ALL
            .into_iter()
            .find(|rule| rule.as_str().eq_ignore_ascii_case(s.trim()))
            .ok_or_else(|| {
                anyhow::anyhow!(
                    "Invalid paid-off rule '{}', expected one of either|balance|schedule|both",
                    s
                )
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, TimeZone};
    use std::str::FromStr;

    fn d(s: &str) -> Decimal {
        Decimal::from_str(s).unwrap()
    }

    fn at(y: i32, m: u32, day: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(y, m, day, 0, 0, 0).unwrap()
    }

    fn pay(date: DateTime<Utc>, amount: &str) -> Payment {
        Payment {
            date,
            amount: d(amount),
        }
    }

    #[test]
    fn first_payment_splits_interest_over_prorated_month() {
        let t0 = at(2024, 1, 1);
        let payments = [pay(t0 + Duration::days(31), "400")];
        let p = project(
            d("20000"),
            monthly_rate(d("6")),
            t0,
            &payments,
            Accrual::AtLastPayment,
        );
        let split = &p.splits[0];
        assert_eq!(round_cents(split.interest_amount), d("101.84"));
        assert_eq!(round_cents(split.principal_amount), d("298.16"));
        assert_eq!(p.remaining_balance, d("19701.84"));
    }

    #[test]
    fn zero_rate_sends_every_payment_to_principal() {
        let t0 = at(2023, 5, 10);
        let payments: Vec<Payment> = (1..=6)
            .map(|k| pay(add_months(t0, k), "250.55"))
            .collect();
        let p = project(d("5000"), Decimal::ZERO, t0, &payments, Accrual::ToNow(at(2030, 1, 1)));
        for split in &p.splits {
            assert_eq!(split.principal_amount, split.amount);
            assert!(split.interest_amount.is_zero());
        }
        assert_eq!(p.remaining_balance, d("3496.70"));
    }

    #[test]
    fn balance_never_increases_as_payments_apply() {
        let t0 = at(2022, 3, 15);
        let payments = [
            pay(t0 + Duration::days(20), "900"),
            pay(t0 + Duration::days(95), "5"),
            pay(t0 + Duration::days(180), "2500"),
            pay(t0 + Duration::days(400), "10"),
        ];
        let rate = monthly_rate(d("9.9"));
        let mut previous = d("12000");
        for n in 1..=payments.len() {
            let p = project(d("12000"), rate, t0, &payments[..n], Accrual::AtLastPayment);
            assert!(p.balance_after_payments <= previous);
            previous = p.balance_after_payments;
        }
    }

    #[test]
    fn projection_ignores_input_order() {
        let t0 = at(2024, 2, 1);
        let a = [
            pay(at(2024, 3, 1), "300"),
            pay(at(2024, 4, 2), "300"),
            pay(at(2024, 5, 1), "700"),
        ];
        let b = [a[2], a[0], a[1]];
        let rate = monthly_rate(d("4.5"));
        let pa = project(d("9000"), rate, t0, &a, Accrual::AtLastPayment);
        let pb = project(d("9000"), rate, t0, &b, Accrual::AtLastPayment);
        assert_eq!(pa, pb);
    }

    #[test]
    fn full_payoff_rounds_to_zero() {
        let t0 = at(2024, 6, 1);
        let payments = [pay(t0, "8000")];
        let p = project(d("8000"), monthly_rate(d("7")), t0, &payments, Accrual::AtLastPayment);
        assert_eq!(p.remaining_balance, Decimal::ZERO);
        assert!(p.is_paid_off());
    }

    #[test]
    fn overpayment_clamps_balance_at_zero() {
        let t0 = at(2024, 6, 1);
        let payments = [pay(at(2024, 7, 1), "5000")];
        let p = project(d("1000"), Decimal::ZERO, t0, &payments, Accrual::AtLastPayment);
        assert_eq!(p.remaining_balance, Decimal::ZERO);
        assert_eq!(p.total_principal, d("5000"));
    }

    #[test]
    fn payment_smaller_than_interest_leaves_principal_untouched() {
        let t0 = at(2024, 1, 1);
        let payments = [pay(at(2024, 7, 1), "50")];
        let p = project(d("10000"), monthly_rate(d("12")), t0, &payments, Accrual::AtLastPayment);
        assert_eq!(p.splits[0].interest_amount, d("50"));
        assert!(p.splits[0].principal_amount.is_zero());
        assert_eq!(p.remaining_balance, d("10000"));
    }

    #[test]
    fn forward_accrual_adds_interest_since_last_payment() {
        let t0 = at(2024, 1, 1);
        let now = t0 + Duration::milliseconds(AVERAGE_MONTH_MS);
        let p = project(d("1200"), monthly_rate(d("12")), t0, &[], Accrual::ToNow(now));
        assert_eq!(p.balance_after_payments, d("1200"));
        assert_eq!(p.remaining_balance, d("1212.00"));
    }

    #[test]
    fn payment_before_anchor_accrues_nothing() {
        let t0 = at(2024, 1, 1);
        let payments = [pay(at(2023, 12, 1), "100")];
        let p = project(d("1000"), monthly_rate(d("12")), t0, &payments, Accrual::AtLastPayment);
        assert!(p.splits[0].interest_amount.is_zero());
        assert_eq!(p.remaining_balance, d("900"));
    }

    #[test]
    fn rounding_exact_cents_is_noop() {
        for v in ["0", "0.01", "19701.84", "123456.70"] {
            assert_eq!(round_cents(d(v)), d(v));
        }
        assert_eq!(round_cents(d("2.345")), d("2.35"));
        assert_eq!(round_cents(d("2.3449")), d("2.34"));
    }

    #[test]
    fn paid_off_threshold_is_one_cent() {
        assert!(is_paid_off(d("0.01")));
        assert!(!is_paid_off(d("0.02")));
    }

    #[test]
    fn month_end_anchor_clamps_instead_of_rolling_over() {
        let t0 = at(2024, 1, 31);
        assert_eq!(add_months(t0, 1), at(2024, 2, 29));
        assert_eq!(add_months(t0, 2), at(2024, 3, 31));
        assert_eq!(sub_months(at(2024, 3, 31), 1), at(2024, 2, 29));
    }

    #[test]
    fn locator_buckets_by_calendar_month_not_chronology() {
        let t0 = at(2024, 1, 15);
        // Recorded out of order; the March payment was logged first.
        let dates = [at(2024, 3, 1), at(2024, 2, 28), at(2024, 4, 10)];
        match next_installment(12, t0, dates) {
            Installment::Due { number, due_date } => {
                assert_eq!(number, 4);
                assert_eq!(due_date, at(2024, 5, 15));
            }
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn locator_reports_all_covered() {
        let t0 = at(2024, 1, 15);
        let dates: Vec<_> = (1..=3).map(|k| add_months(t0, k)).collect();
        assert_eq!(next_installment(3, t0, dates), Installment::AllCovered);
    }

    #[test]
    fn locator_stays_inside_term() {
        let t0 = at(2020, 8, 31);
        for term in 1..=48u32 {
            let dates: Vec<_> = (1..=term).step_by(2).map(|k| add_months(t0, k)).collect();
            if let Installment::Due { number, .. } = next_installment(term, t0, dates) {
                assert!((1..=term).contains(&number));
            }
        }
        assert_eq!(
            next_installment(0, t0, Vec::<DateTime<Utc>>::new()),
            Installment::AllCovered
        );
    }

    #[test]
    fn period_status_counts_payments_inside_window() {
        let due = at(2024, 5, 15);
        let payments = [
            pay(at(2024, 4, 15), "100"), // on period start, excluded
            pay(at(2024, 4, 20), "150"),
            pay(at(2024, 5, 15), "50"),
            pay(at(2024, 5, 16), "999"),
        ];
        let s = period_status(due, &payments, d("5000"), d("400"), at(2024, 5, 1));
        assert_eq!(s.paid_this_period, d("200"));
        assert_eq!(s.amount_due, d("200"));
        assert!(!s.is_overdue);
    }

    #[test]
    fn period_status_caps_final_installment() {
        let due = at(2024, 5, 15);
        let s = period_status(due, &[], d("120.50"), d("400"), at(2024, 6, 1));
        assert_eq!(s.amount_due, d("120.50"));
        assert!(s.is_overdue);
    }

    #[test]
    fn calendar_months_between_counts_whole_months() {
        assert_eq!(calendar_months_between(at(2024, 1, 15), at(2024, 3, 14)), 1);
        assert_eq!(calendar_months_between(at(2024, 1, 15), at(2024, 3, 15)), 2);
        assert_eq!(calendar_months_between(at(2024, 3, 15), at(2024, 1, 15)), 0);
    }

    #[test]
    fn months_early_reflects_prepayment() {
        let terms = LoanTerms {
            loan_amount: d("12000"),
            loan_term: 12,
            interest_rate: Decimal::ZERO,
            monthly_payment: d("1000"),
            purchase_date: at(2024, 1, 1),
        };
        // Two months in, only 6000 left: 6 installments needed, 10 scheduled.
        assert_eq!(months_early(&terms, d("6000"), false, at(2024, 3, 2)), 4);
        assert_eq!(months_early(&terms, d("10000"), false, at(2024, 3, 2)), 0);
        assert_eq!(months_early(&terms, Decimal::ZERO, true, at(2024, 3, 2)), 10);
    }

    #[test]
    fn paid_off_rule_parses_and_decides() {
        assert_eq!(PaidOffRule::from_str(" Schedule ").unwrap(), PaidOffRule::Schedule);
        assert!(PaidOffRule::from_str("sometimes").is_err());
        assert!(PaidOffRule::Either.decide(true, false));
        assert!(PaidOffRule::Either.decide(false, true));
        assert!(!PaidOffRule::Balance.decide(false, true));
        assert!(!PaidOffRule::Schedule.decide(true, false));
        assert!(!PaidOffRule::Both.decide(true, false));
        assert!(PaidOffRule::Both.decide(true, true));
    }
}
