#![allow(dead_code)]

use chrono::{Duration, NaiveDate};
use cotrader::domain::feature_table::{FeatureRow, FeatureTable};
use cotrader::domain::model::{Classifier, ConstantClassifier};
use cotrader::domain::weekly::{Positions, WeeklyRecord};
use cotrader::ports::event_port::EventSink;
use std::io::Write;
use std::sync::Mutex;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Level {
    Info,
    Warn,
}

/// Captures every event so tests can assert on what was reported.
#[derive(Default)]
pub struct RecordingSink {
    events: Mutex<Vec<(Level, String)>>,
}

impl RecordingSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn events(&self) -> Vec<(Level, String)> {
        self.events.lock().unwrap().clone()
    }

    pub fn messages(&self, level: Level) -> Vec<String> {
        self.events()
            .into_iter()
            .filter(|(l, _)| *l == level)
            .map(|(_, m)| m)
            .collect()
    }
}

impl EventSink for RecordingSink {
    fn info(&self, message: &str) {
        self.events
            .lock()
            .unwrap()
            .push((Level::Info, message.to_string()));
    }

    fn warn(&self, message: &str) {
        self.events
            .lock()
            .unwrap()
            .push((Level::Warn, message.to_string()));
    }
}

pub fn always_long() -> Box<dyn Classifier> {
    Box::new(ConstantClassifier::new(1))
}

pub fn always_down() -> Box<dyn Classifier> {
    Box::new(ConstantClassifier::new(0))
}

pub fn date(y: i32, m: u32, d: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(y, m, d).unwrap()
}

/// First Friday used by every generated series.
pub fn start() -> NaiveDate {
    date(2024, 1, 5)
}

pub fn week(i: usize) -> NaiveDate {
    start() + Duration::weeks(i as i64)
}

/// Table with `etf_close`, `mm_net_pct_oi` and a `target_dir` that is 1 when
/// the next close is higher.
pub fn price_table(closes: &[f64], ratios: &[f64]) -> FeatureTable {
    assert_eq!(closes.len(), ratios.len());
    let mut table = FeatureTable::new(vec![
        "etf_close".into(),
        "mm_net_pct_oi".into(),
        "target_dir".into(),
    ]);
    for (i, (&close, &ratio)) in closes.iter().zip(ratios).enumerate() {
        let up = closes.get(i + 1).is_some_and(|&next| next > close);
        table
            .push(FeatureRow {
                week: week(i),
                market_name: None,
                contract_code: None,
                values: vec![close, ratio, f64::from(u8::from(up))],
            })
            .unwrap();
    }
    table
}

/// A rising, wiggling series of `n` weeks with a cycling positioning ratio.
pub fn trending_table(n: usize) -> FeatureTable {
    let closes: Vec<f64> = (0..n)
        .map(|i| 100.0 + i as f64 + if i % 3 == 0 { -1.5 } else { 0.5 })
        .collect();
    let ratios: Vec<f64> = (0..n).map(|i| ((i * 7) % 10) as f64 / 10.0).collect();
    price_table(&closes, &ratios)
}

/// `n` consecutive weekly COT records with deterministic counts.
pub fn weekly_records(n: usize) -> Vec<WeeklyRecord> {
    (0..n)
        .map(|i| {
            let wave = (i % 8) as u64;
            WeeklyRecord {
                week: week(i),
                market_name: Some("GOLD".to_string()),
                contract_code: Some("088691".to_string()),
                open_interest: 1_000 + 10 * i as u64,
                money_manager: Positions::new(300 + 15 * wave, 200 + 5 * (7 - wave)),
                swap_dealer: Positions::new(150 + wave, 250),
                producer_merchant: Positions::new(100, 400 - 10 * wave),
                close: 100.0 + (i as f64 * 0.7).sin() * 5.0 + i as f64 * 0.2,
            }
        })
        .collect()
}

/// The records above in the merged CSV layout the loader reads.
pub fn merged_csv(records: &[WeeklyRecord]) -> String {
    let mut out = String::from(
        "week,market_name,contract_code,open_interest,mm_long,mm_short,pm_long,pm_short,sd_long,sd_short,etf_close\n",
    );
    for r in records {
        out.push_str(&format!(
            "{},{},{},{},{},{},{},{},{},{},{}\n",
            r.week,
            r.market_name.as_deref().unwrap_or(""),
            r.contract_code.as_deref().unwrap_or(""),
            r.open_interest,
            r.money_manager.long,
            r.money_manager.short,
            r.producer_merchant.long,
            r.producer_merchant.short,
            r.swap_dealer.long,
            r.swap_dealer.short,
            r.close
        ));
    }
    out
}

pub fn write_temp_ini(content: &str) -> tempfile::NamedTempFile {
    let mut file = tempfile::NamedTempFile::new().unwrap();
    file.write_all(content.as_bytes()).unwrap();
    file.flush().unwrap();
    file
}
