use chrono::{Datelike, NaiveDate};
use serde::Serialize;

use crate::models::{Transaction, TransactionType};

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MonthlyStat {
    pub month: u32,
    pub income: f64,
    pub expense: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DashboardSummary {
    pub total_income: f64,
    pub total_expenses: f64,
    pub net_result: f64,
    pub margin: f64,
    pub observation: &'static str,
    pub year: i32,
    pub monthly_stats: Vec<MonthlyStat>,
}

fn round2(v: f64) -> f64 {
    (v * 100.0).round() / 100.0
}

pub fn summarize(ledger: &[Transaction], year: i32) -> DashboardSummary {
    let mut total_income = 0.0;
    let mut total_expenses = 0.0;
    let mut monthly_stats: Vec<MonthlyStat> = (1..=12)
        .map(|month| MonthlyStat {
            month,
            income: 0.0,
            expense: 0.0,
        })
        .collect();

    for t in ledger {
        match t.kind {
            TransactionType::Income => total_income += t.amount,
            TransactionType::Expense => total_expenses += t.amount,
        }

        let Ok(date) = NaiveDate::parse_from_str(&t.date, "%Y-%m-%d") else {
            continue;
        };
        if date.year() != year {
            continue;
        }
        let stat = &mut monthly_stats[date.month0() as usize];
        match t.kind {
            TransactionType::Income => stat.income += t.amount,
            TransactionType::Expense => stat.expense += t.amount,
        }
    }

    let net_result = total_income - total_expenses;
    let margin = if total_income > 0.0 {
        round2(net_result / total_income * 100.0)
    } else {
        0.0
    };

    DashboardSummary {
        total_income,
        total_expenses,
        net_result,
        margin,
        observation: if net_result >= 0.0 { "Bénéfice" } else { "Perte" },
        year,
        monthly_stats,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ledger::{map_expense, map_income, tests::{expense, income}};

    #[test]
    fn totals_margin_and_months() {
        let ledger = vec![
            map_income(&income(1, "2024-01-10", 3000.0)),
            map_expense(&expense(1, "2024-01-05", 1000.0)),
            map_expense(&expense(1, "2024-03-20", 500.0)),
            map_expense(&expense(1, "2023-12-31", 250.0)),
        ];

        let s = summarize(&ledger, 2024);
        assert_eq!(s.total_income, 3000.0);
        assert_eq!(s.total_expenses, 1750.0);
        assert_eq!(s.net_result, 1250.0);
        assert_eq!(s.margin, 41.67);
        assert_eq!(s.observation, "Bénéfice");
        assert_eq!(s.monthly_stats.len(), 12);
        assert_eq!(s.monthly_stats[0].income, 3000.0);
        assert_eq!(s.monthly_stats[0].expense, 1000.0);
        assert_eq!(s.monthly_stats[2].expense, 500.0);
        assert_eq!(s.monthly_stats[11].expense, 0.0);
    }

    #[test]
    fn loss_without_income() {
        let ledger = vec![map_expense(&expense(1, "2024-01-05", 10.0))];
        let s = summarize(&ledger, 2024);
        assert_eq!(s.margin, 0.0);
        assert_eq!(s.observation, "Perte");
    }
}
