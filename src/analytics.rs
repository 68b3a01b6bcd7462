//! Rule-based transaction analytics.
//!
//! Two small passes over a `date, amount, merchant` log: recurring-charge
//! detection (subscription-like monthly charges about to renew) and
//! spend-risk alerts. Both are pure functions over in-memory slices; the
//! caller decides where the log comes from and what "today" is.

use std::collections::BTreeMap;

use chrono::{Days, NaiveDate};
use serde::{Deserialize, Serialize};

/// One row of the transaction log.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Transaction {
    pub date: NaiveDate,
    pub amount: f64,
    pub merchant: String,
}

/// A subscription-like charge whose next renewal falls inside the
/// reporting horizon.
#[derive(Debug, Clone, PartialEq)]
pub struct RecurringCharge {
    pub merchant: String,
    /// Modal charge amount, rounded to one decimal.
    pub amount: f64,
    pub last_date: NaiveDate,
    pub next_renewal: NaiveDate,
}

/// A triggered spend-risk rule.
#[derive(Debug, Clone, PartialEq)]
pub enum RiskAlert {
    /// Total spend over the trailing three days crossed the threshold.
    HighRecentSpend { total: f64 },
    /// Three consecutive transactions each above the per-transaction
    /// threshold.
    ConsecutiveHighSpend,
}

impl std::fmt::Display for RiskAlert {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            RiskAlert::HighRecentSpend { total } => write!(
                f,
                "Son 3 günde toplam harcama {total:.2}₺ ile 3000₺ üzeri – Kart Koçun uyardı!"
            ),
            RiskAlert::ConsecutiveHighSpend => write!(
                f,
                "Arka arkaya yüksek tutarlı harcamalar tespit edildi – cüzdanı yavaşlatma zamanı olabilir."
            ),
        }
    }
}

/// Assumed subscription cycle.
const CYCLE_DAYS: u64 = 30;
/// Minimum charges before a merchant counts as recurring.
const MIN_OCCURRENCES: usize = 3;
/// Trailing-window spend threshold for [`RiskAlert::HighRecentSpend`].
const RECENT_SPEND_THRESHOLD: f64 = 3000.0;
/// Per-transaction threshold for [`RiskAlert::ConsecutiveHighSpend`].
const HIGH_TX_THRESHOLD: f64 = 1000.0;
const HIGH_TX_STREAK: usize = 3;

/// Detect merchants charging a similar amount roughly every 30 days whose
/// next renewal lands within `days_ahead` days of `today`.
pub fn detect_recurring(
    transactions: &[Transaction],
    today: NaiveDate,
    days_ahead: i64,
) -> Vec<RecurringCharge> {
    let mut by_merchant: BTreeMap<&str, Vec<&Transaction>> = BTreeMap::new();
    for tx in transactions {
        by_merchant.entry(tx.merchant.as_str()).or_default().push(tx);
    }

    let mut out = Vec::new();
    for (merchant, group) in by_merchant {
        if group.len() < MIN_OCCURRENCES {
            continue;
        }

        let Some(amount) = modal_amount(&group) else {
            continue;
        };

        let last_date = group.iter().map(|tx| tx.date).max().expect("non-empty group");
        let next_renewal = last_date + Days::new(CYCLE_DAYS);
        let days_until = (next_renewal - today).num_days();
        if (0..=days_ahead).contains(&days_until) {
            out.push(RecurringCharge {
                merchant: merchant.to_string(),
                amount,
                last_date,
                next_renewal,
            });
        }
    }

    out
}

/// Most frequent amount in the group, rounded to one decimal; ties go to
/// the smallest amount.
fn modal_amount(group: &[&Transaction]) -> Option<f64> {
    let mut counts: BTreeMap<i64, usize> = BTreeMap::new();
    for tx in group {
        let key = (tx.amount * 10.0).round() as i64;
        *counts.entry(key).or_default() += 1;
    }
    counts
        .into_iter()
        .max_by(|a, b| a.1.cmp(&b.1).then(b.0.cmp(&a.0)))
        .map(|(key, _)| key as f64 / 10.0)
}

/// Evaluate the spend-risk rules over the log.
pub fn risk_check(transactions: &[Transaction], today: NaiveDate) -> Vec<RiskAlert> {
    let mut alerts = Vec::new();
    if transactions.is_empty() {
        return alerts;
    }

    let mut sorted: Vec<&Transaction> = transactions.iter().collect();
    sorted.sort_by_key(|tx| tx.date);

    let window_start = today - Days::new(3);
    let recent_total: f64 = sorted
        .iter()
        .filter(|tx| tx.date >= window_start)
        .map(|tx| tx.amount)
        .sum();
    if recent_total > RECENT_SPEND_THRESHOLD {
        alerts.push(RiskAlert::HighRecentSpend {
            total: recent_total,
        });
    }

    let mut streak = 0usize;
    for tx in &sorted {
        if tx.amount > HIGH_TX_THRESHOLD {
            streak += 1;
            if streak >= HIGH_TX_STREAK {
                alerts.push(RiskAlert::ConsecutiveHighSpend);
                break;
            }
        } else {
            streak = 0;
        }
    }

    alerts
}

#[cfg(test)]
mod tests {
    use super::*;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    fn tx(date_: NaiveDate, amount: f64, merchant: &str) -> Transaction {
        Transaction {
            date: date_,
            amount,
            merchant: merchant.to_string(),
        }
    }

    #[test]
    fn empty_log_triggers_nothing() {
        let today = date(2026, 8, 8);
        assert!(detect_recurring(&[], today, 7).is_empty());
        assert!(risk_check(&[], today).is_empty());
    }

    #[test]
    fn monthly_subscription_is_detected_inside_the_horizon() {
        let today = date(2026, 8, 8);
        let log = vec![
            tx(date(2026, 5, 12), 119.9, "Netflix"),
            tx(date(2026, 6, 11), 119.9, "Netflix"),
            tx(date(2026, 7, 11), 119.9, "Netflix"),
        ];
        let subs = detect_recurring(&log, today, 7);
        assert_eq!(subs.len(), 1);
        assert_eq!(subs[0].merchant, "Netflix");
        assert_eq!(subs[0].amount, 119.9);
        assert_eq!(subs[0].last_date, date(2026, 7, 11));
        assert_eq!(subs[0].next_renewal, date(2026, 8, 10));
    }

    #[test]
    fn two_charges_are_not_recurring() {
        let today = date(2026, 8, 8);
        let log = vec![
            tx(date(2026, 6, 11), 59.9, "Spotify"),
            tx(date(2026, 7, 11), 59.9, "Spotify"),
        ];
        assert!(detect_recurring(&log, today, 7).is_empty());
    }

    #[test]
    fn renewal_outside_the_horizon_is_ignored() {
        let today = date(2026, 8, 8);
        let log = vec![
            tx(date(2026, 5, 1), 119.9, "Netflix"),
            tx(date(2026, 5, 31), 119.9, "Netflix"),
            tx(date(2026, 6, 30), 119.9, "Netflix"),
        ];
        // Next renewal 2026-07-30 is already past.
        assert!(detect_recurring(&log, today, 7).is_empty());
    }

    #[test]
    fn modal_amount_ignores_outlier_charges() {
        let today = date(2026, 8, 8);
        let log = vec![
            tx(date(2026, 5, 12), 119.9, "Netflix"),
            tx(date(2026, 6, 11), 119.9, "Netflix"),
            tx(date(2026, 7, 11), 149.9, "Netflix"),
            tx(date(2026, 7, 11), 119.9, "Netflix"),
        ];
        let subs = detect_recurring(&log, today, 7);
        assert_eq!(subs[0].amount, 119.9);
    }

    #[test]
    fn recent_spend_over_threshold_alerts() {
        let today = date(2026, 8, 8);
        let log = vec![
            tx(date(2026, 8, 6), 1600.0, "elektronik"),
            tx(date(2026, 8, 7), 1600.0, "elektronik"),
            tx(date(2026, 7, 1), 900.0, "tatil"),
        ];
        let alerts = risk_check(&log, today);
        assert_eq!(
            alerts,
            vec![RiskAlert::HighRecentSpend { total: 3200.0 }]
        );
    }

    #[test]
    fn three_consecutive_high_transactions_alert_once() {
        let today = date(2026, 8, 8);
        let log = vec![
            tx(date(2026, 6, 1), 1500.0, "elektronik"),
            tx(date(2026, 6, 2), 1750.0, "elektronik"),
            tx(date(2026, 6, 3), 2000.0, "elektronik"),
            tx(date(2026, 6, 4), 1200.0, "elektronik"),
        ];
        let alerts = risk_check(&log, today);
        assert_eq!(alerts, vec![RiskAlert::ConsecutiveHighSpend]);
    }

    #[test]
    fn low_spend_between_high_charges_resets_the_streak() {
        let today = date(2026, 8, 8);
        let log = vec![
            tx(date(2026, 6, 1), 1500.0, "a"),
            tx(date(2026, 6, 2), 1750.0, "a"),
            tx(date(2026, 6, 3), 50.0, "b"),
            tx(date(2026, 6, 4), 2000.0, "a"),
        ];
        assert!(risk_check(&log, today).is_empty());
    }
}
