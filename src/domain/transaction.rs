use chrono::{DateTime, Datelike, NaiveDate, NaiveTime, TimeZone, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use strum::{Display, EnumString};
use uuid::Uuid;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, PartialOrd, Ord, Display, EnumString)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum TransactionKind {
    Income,
    Expense,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Transaction {
    pub id: Uuid,
    pub account_id: Uuid,
    pub kind: TransactionKind,
    pub amount: i64,
    pub category: String,
    pub note: Option<String>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewTransaction {
    pub kind: TransactionKind,
    pub amount: i64,
    pub category: String,
    pub note: Option<String>,
}

impl Transaction {
    pub fn new(account_id: Uuid, new: NewTransaction, now: DateTime<Utc>) -> Self {
        Self {
            id: Uuid::new_v4(),
            account_id,
            kind: new.kind,
            amount: new.amount,
            category: new.category,
            note: new.note.filter(|n| !n.trim().is_empty()),
            created_at: now,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TransactionFilter {
    pub kind: Option<TransactionKind>,
    pub search: Option<String>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct TransactionPage {
    pub items: Vec<Transaction>,
    pub total: i64,
}

#[derive(Debug, Clone, Copy, Default, Serialize, PartialEq, Eq)]
pub struct LedgerSummary {
    pub total_income: i64,
    pub total_expense: i64,
    pub balance: i64,
}

impl LedgerSummary {
    pub fn new(total_income: i64, total_expense: i64) -> Self {
        Self {
            total_income,
            total_expense,
            balance: total_income - total_expense,
        }
    }
}

#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct DailyPoint {
    pub date: String,
    pub income: i64,
    pub expense: i64,
}

#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct CategoryTotal {
    #[serde(rename = "type")]
    pub kind: TransactionKind,
    pub category: String,
    pub total: i64,
}

pub fn summarize(transactions: &[Transaction]) -> LedgerSummary {
    let (income, expense) = transactions
        .iter()
        .fold((0i64, 0i64), |(inc, exp), t| match t.kind {
            TransactionKind::Income => (inc + t.amount, exp),
            TransactionKind::Expense => (inc, exp + t.amount),
        });
    LedgerSummary::new(income, expense)
}

/// Per-day income/expense totals, keyed by the calendar date in `tz`,
/// ascending by date.
pub fn daily_series<Tz: TimeZone>(transactions: &[Transaction], tz: &Tz) -> Vec<DailyPoint> {
    let mut days: BTreeMap<NaiveDate, (i64, i64)> = BTreeMap::new();
    for t in transactions {
        let date = t.created_at.with_timezone(tz).date_naive();
        let entry = days.entry(date).or_default();
        match t.kind {
            TransactionKind::Income => entry.0 += t.amount,
            TransactionKind::Expense => entry.1 += t.amount,
        }
    }

    days.into_iter()
        .map(|(date, (income, expense))| DailyPoint {
            date: date.format("%Y-%m-%d").to_string(),
            income,
            expense,
        })
        .collect()
}

pub fn category_totals(transactions: &[Transaction]) -> Vec<CategoryTotal> {
    let mut totals: BTreeMap<(TransactionKind, String), i64> = BTreeMap::new();
    for t in transactions {
        *totals.entry((t.kind, t.category.clone())).or_default() += t.amount;
    }

    totals
        .into_iter()
        .map(|((kind, category), total)| CategoryTotal {
            kind,
            category,
            total,
        })
        .collect()
}

fn local_midnight<Tz: TimeZone>(tz: &Tz, date: NaiveDate) -> Option<DateTime<Utc>> {
    tz.from_local_datetime(&date.and_time(NaiveTime::MIN))
        .earliest()
        .map(|dt| dt.with_timezone(&Utc))
}

/// Start of the calendar day containing `now`, in `now`'s own time zone.
pub fn start_of_day<Tz: TimeZone>(now: &DateTime<Tz>) -> DateTime<Utc> {
    let tz = now.timezone();
    local_midnight(&tz, now.date_naive()).unwrap_or_else(|| {
        // Midnight skipped by a DST jump: fall back to the first instant of the UTC day.
        Utc.from_utc_datetime(&now.naive_utc().date().and_time(NaiveTime::MIN))
    })
}

/// Start of the calendar month containing `now`, in `now`'s own time zone.
pub fn start_of_month<Tz: TimeZone>(now: &DateTime<Tz>) -> DateTime<Utc> {
    let tz = now.timezone();
    let first = now.date_naive().with_day(1).unwrap_or_else(|| now.date_naive());
    local_midnight(&tz, first).unwrap_or_else(|| start_of_day(now))
}
