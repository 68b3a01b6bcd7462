//! Transaction-log collaborator: CSV I/O and a deterministic simulator.
//!
//! The analytics rules operate on in-memory [`Transaction`] slices; this
//! module is the thin edge that reads and writes the `date,amount,merchant`
//! CSV shape and can synthesize a realistic log for demos and tests.

use std::path::Path;

use anyhow::{Context, Result};
use chrono::{Days, NaiveDate};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use crate::analytics::Transaction;

const SEED: u64 = 42;

const MERCHANTS: &[&str] = &["market", "kafe", "kitap", "ulasim", "giyim", "kirtasiye"];

struct Subscription {
    merchant: &'static str,
    amount: f64,
    cycle_days: u64,
}

const SUBSCRIPTIONS: &[Subscription] = &[
    Subscription {
        merchant: "Netflix",
        amount: 119.9,
        cycle_days: 30,
    },
    Subscription {
        merchant: "Spotify",
        amount: 59.9,
        cycle_days: 30,
    },
];

/// Load a `date,amount,merchant` CSV.
pub fn load_csv(path: &Path) -> Result<Vec<Transaction>> {
    let mut reader = csv::ReaderBuilder::new()
        .trim(csv::Trim::All)
        .from_path(path)
        .with_context(|| format!("Failed to open transaction log: {}", path.display()))?;

    let mut out = Vec::new();
    for record in reader.deserialize() {
        let tx: Transaction = record.context("Malformed transaction row")?;
        out.push(tx);
    }
    Ok(out)
}

/// Write transactions as a `date,amount,merchant` CSV.
pub fn write_csv(path: &Path, transactions: &[Transaction]) -> Result<()> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    let mut writer = csv::Writer::from_path(path)
        .with_context(|| format!("Failed to create {}", path.display()))?;
    for tx in transactions {
        writer.serialize(tx)?;
    }
    writer.flush()?;
    Ok(())
}

/// Generate a seeded synthetic log ending at `today`: daily small
/// purchases, two monthly subscriptions, and a trailing burst of high
/// charges that trips the risk rules. Same inputs, same output.
pub fn simulate(days: u64, today: NaiveDate) -> Vec<Transaction> {
    let mut rng = StdRng::seed_from_u64(SEED);
    let start = today - Days::new(days);
    let mut rows = Vec::new();

    for day in 0..days {
        let date = start + Days::new(day);

        if rng.gen_bool(0.65) {
            let amount: f64 = rng.gen_range(30.0..300.0);
            let merchant = MERCHANTS[rng.gen_range(0..MERCHANTS.len())];
            rows.push(Transaction {
                date,
                amount: (amount * 100.0).round() / 100.0,
                merchant: merchant.to_string(),
            });
        }

        for sub in SUBSCRIPTIONS {
            if day % sub.cycle_days == 0 {
                rows.push(Transaction {
                    date,
                    amount: sub.amount,
                    merchant: sub.merchant.to_string(),
                });
            }
        }
    }

    // Consecutive high charges in the last days of the window.
    for i in 0..3u64 {
        rows.push(Transaction {
            date: today - Days::new(10 - i),
            amount: 1500.0 + i as f64 * 250.0,
            merchant: "elektronik".to_string(),
        });
    }

    rows
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn today() -> NaiveDate {
        NaiveDate::from_ymd_opt(2026, 8, 8).unwrap()
    }

    #[test]
    fn simulation_is_deterministic() {
        assert_eq!(simulate(120, today()), simulate(120, today()));
    }

    #[test]
    fn simulation_contains_monthly_subscriptions_and_burst() {
        let rows = simulate(120, today());
        let netflix = rows.iter().filter(|tx| tx.merchant == "Netflix").count();
        let spotify = rows.iter().filter(|tx| tx.merchant == "Spotify").count();
        assert_eq!(netflix, 4);
        assert_eq!(spotify, 4);

        let burst: Vec<_> = rows
            .iter()
            .filter(|tx| tx.merchant == "elektronik")
            .collect();
        assert_eq!(burst.len(), 3);
        assert!(burst.iter().all(|tx| tx.amount > 1000.0));
    }

    #[test]
    fn csv_round_trip_preserves_rows() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("transactions.csv");
        let rows = simulate(40, today());

        write_csv(&path, &rows).unwrap();
        let loaded = load_csv(&path).unwrap();
        assert_eq!(loaded, rows);
    }

    #[test]
    fn malformed_rows_are_an_error() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("bad.csv");
        std::fs::write(&path, "date,amount,merchant\nnot-a-date,12.0,market\n").unwrap();
        assert!(load_csv(&path).is_err());
    }
}
