//! Subcommands of the `billbook` binary and their rendering.

use billbook_core::{
    categories_for, parse_date, week_window, CategoryStatistic, DateWindow, Dimension, Direction,
    NewTransaction, Transaction, TransactionDraft, TransactionId, WindowError, WindowStatistics,
};
use clap::{Subcommand, ValueEnum};
use prettytable::{row, Table};
use rust_decimal::Decimal;
use serde::Serialize;

use crate::error::CliError;
use crate::repository::Repository;

#[derive(Subcommand, Debug, Clone)]
pub enum Command {
    /// Record a new transaction
    Add {
        #[arg(long)]
        category: String,
        #[arg(long)]
        amount: Decimal,
        #[arg(long, default_value = "expense")]
        direction: Direction,
        #[arg(long)]
        memo: Option<String>,
        /// YYYY-MM-DD, defaults to today
        #[arg(long)]
        date: Option<String>,
    },
    /// Change category, amount, direction or memo of a transaction
    Edit {
        id: TransactionId,
        #[arg(long)]
        category: Option<String>,
        #[arg(long)]
        amount: Option<Decimal>,
        #[arg(long)]
        direction: Option<Direction>,
        #[arg(long)]
        memo: Option<String>,
    },
    Delete {
        id: TransactionId,
    },
    Show {
        id: TransactionId,
    },
    /// List transactions, newest first
    List {
        #[arg(long)]
        direction: Option<Direction>,
        /// Only transactions entered within the last N days
        #[arg(long)]
        days: Option<u32>,
        /// Only transactions dated YYYY-MM-DD
        #[arg(long)]
        date: Option<String>,
    },
    /// Income, expense and balance over a period
    Stats {
        #[arg(value_enum)]
        period: Period,
        /// Date, `start,end` or week number, `YYYY-MM` or `YYYY`; defaults to the current period
        value: Option<String>,
    },
    /// Per-category totals over a period
    Breakdown {
        #[arg(value_enum)]
        period: Period,
        value: Option<String>,
        #[arg(long, default_value = "expense")]
        direction: Direction,
    },
    /// Category labels for a direction
    Categories {
        #[arg(long, default_value = "expense")]
        direction: Direction,
    },
}

#[derive(ValueEnum, Debug, Clone, Copy, PartialEq, Eq)]
pub enum Period {
    Day,
    Week,
    Month,
    Year,
}

/// Resolves a period selector against `repo`'s calendar.
pub fn resolve_window(repo: &Repository, period: Period, value: Option<&str>) -> Result<DateWindow, WindowError> {
    let Some(value) = value else {
        let today = repo.today();
        return Ok(match period {
            Period::Day => DateWindow::Day(today),
            Period::Week => repo.current_week(),
            Period::Month => DateWindow::month_of(today),
            Period::Year => DateWindow::year_of(today),
        });
    };
    match period {
        Period::Day => Ok(DateWindow::Day(parse_date(value)?)),
        Period::Week => match value.trim().parse::<u32>() {
            Ok(week) => week_window(repo.week_anchor(), week).ok_or_else(|| WindowError::InvalidRange(value.to_string())),
            Err(_) => DateWindow::from_selector(Dimension::Week, value),
        },
        Period::Month => DateWindow::from_selector(Dimension::Month, value),
        Period::Year => DateWindow::from_selector(Dimension::Year, value),
    }
}

/// Executes `command` and returns what should be printed.
pub fn execute(repo: &Repository, command: Command, json: bool) -> Result<String, CliError> {
    match command {
        Command::Add { category, amount, direction, memo, date } => {
            let date = match date {
                Some(d) => parse_date(&d)?,
                None => repo.today(),
            };
            let mut tx = NewTransaction::new(category, amount, direction, date);
            if let Some(memo) = memo {
                tx = tx.with_memo(memo);
            }
            let id = repo.add(tx).ok_or(CliError::Rejected("add"))?;
            Ok(format!("Added transaction {}", id))
        },
        Command::Edit { id, category, amount, direction, memo } => {
            let existing = repo.find_by_id(id).ok_or(CliError::NotFound(id))?;
            let draft = TransactionDraft {
                category: category.map(Into::into).unwrap_or(existing.category),
                amount: amount.unwrap_or(existing.amount),
                direction: direction.unwrap_or(existing.direction),
                memo: memo.map(Into::into).or(existing.memo),
            };
            if !repo.edit(id, draft) {
                return Err(CliError::Rejected("edit"));
            }
            Ok(format!("Updated transaction {}", id))
        },
        Command::Delete { id } => {
            if !repo.delete(id) {
                return Err(CliError::NotFound(id));
            }
            Ok(format!("Deleted transaction {}", id))
        },
        Command::Show { id } => {
            let tx = repo.find_by_id(id).ok_or(CliError::NotFound(id))?;
            render_transactions(&[tx], json)
        },
        Command::List { direction, days, date } => {
            let ticket = match (date, days, direction) {
                (Some(d), _, _) => repo.list_by_exact_date_async(parse_date(&d)?)?,
                (None, Some(days), _) => repo.list_by_recency_window_async(days)?,
                (None, None, Some(direction)) => repo.list_by_direction_async(direction)?,
                (None, None, None) => repo.list_all_async()?,
            };
            let mut rows = ticket
                .wait()
                .into_result()
                .ok_or(CliError::Discarded)??;
            if let Some(direction) = direction {
                rows.retain(|tx| tx.direction == direction);
            }
            render_transactions(&rows, json)
        },
        Command::Stats { period, value } => {
            let window = resolve_window(repo, period, value.as_deref())?;
            render_statistics(&window, &repo.statistics_for(window), json)
        },
        Command::Breakdown { period, value, direction } => {
            let window = resolve_window(repo, period, value.as_deref())?;
            render_breakdown(&window, &repo.category_breakdown_for(window, direction), json)
        },
        Command::Categories { direction } => {
            let labels = categories_for(direction);
            if json {
                return Ok(serde_json::to_string_pretty(&labels)?);
            }
            Ok(labels.join("\n"))
        },
    }
}

fn money(amount: Decimal) -> String {
    format!("{:.2}", amount)
}

fn to_json<T: Serialize + ?Sized>(value: &T) -> Result<String, CliError> {
    Ok(serde_json::to_string_pretty(value)?)
}

pub fn render_transactions(rows: &[Transaction], json: bool) -> Result<String, CliError> {
    if json {
        return to_json(rows);
    }
    let mut table = Table::new();
    table.add_row(row!["Id", "Date", "Direction", "Category", "Amount", "Memo"]);
    table.add_empty_row();

    for tx in rows {
        let date = billbook_core::format_date(tx.date);
        let amount = money(tx.amount);
        let memo = tx.memo.as_deref().unwrap_or("");
        table.add_row(row![tx.id, date, tx.direction, tx.category, amount, memo]);
    }

    Ok(format!("\n{}\n", table))
}

#[derive(Serialize)]
struct WindowReport<'a, T: Serialize> {
    window: String,
    #[serde(flatten)]
    body: &'a T,
}

pub fn render_statistics(window: &DateWindow, stats: &WindowStatistics, json: bool) -> Result<String, CliError> {
    if json {
        return to_json(&WindowReport { window: window.to_string(), body: stats });
    }
    let mut table = Table::new();
    table.add_row(row!["Window", "Income", "Expense", "Balance"]);
    table.add_empty_row();
    let (income, expense, balance) = (money(stats.income), money(stats.expense), money(stats.balance));
    table.add_row(row![window, income, expense, balance]);

    Ok(format!("\n{}\n", table))
}

#[derive(Serialize)]
struct BreakdownReport<'a> {
    window: String,
    categories: &'a [CategoryStatistic],
}

pub fn render_breakdown(window: &DateWindow, stats: &[CategoryStatistic], json: bool) -> Result<String, CliError> {
    if json {
        return to_json(&BreakdownReport { window: window.to_string(), categories: stats });
    }
    let mut table = Table::new();
    table.add_row(row!["Category", "Amount", "Count", "Share"]);
    table.add_empty_row();

    for item in stats {
        let amount = money(item.amount);
        let share = format!("{:.1}%", item.percentage);
        table.add_row(row![item.category, amount, item.count, share]);
    }

    Ok(format!("\n{}\n", table))
}

#[cfg(test)]
mod tests {
    use super::*;
    use billbook_memory::InMemoryStore;
    use rust_decimal_macros::dec;
    use std::sync::Arc;
    use time::macros::date;

    fn repo() -> Repository {
        Repository::with_store(Arc::new(InMemoryStore::new()), 2).unwrap()
    }

    fn add(repo: &Repository, category: &str, amount: Decimal, direction: Direction, date: &str) {
        execute(
            repo,
            Command::Add {
                category: category.to_string(),
                amount,
                direction,
                memo: None,
                date: Some(date.to_string()),
            },
            false,
        )
        .unwrap();
    }

    #[test]
    fn test_resolve_window() {
        let repo = repo();
        assert_eq!(
            resolve_window(&repo, Period::Week, Some("1")).unwrap(),
            DateWindow::Range { start: date!(2026 - 01 - 01), end: date!(2026 - 01 - 07) }
        );
        assert_eq!(
            resolve_window(&repo, Period::Week, Some("2024-05-01,2024-05-07")).unwrap(),
            DateWindow::Range { start: date!(2024 - 05 - 01), end: date!(2024 - 05 - 07) }
        );
        assert_eq!(
            resolve_window(&repo, Period::Month, Some("2024-05")).unwrap(),
            DateWindow::Month { year: 2024, month: time::Month::May }
        );
        assert!(resolve_window(&repo, Period::Day, Some("yesterday")).is_err());
        assert!(matches!(resolve_window(&repo, Period::Year, None).unwrap(), DateWindow::Year(_)));
    }

    #[test]
    fn test_stats_json() {
        let repo = repo();
        add(&repo, "餐饮", dec!(50.00), Direction::Expense, "2024-05-01");
        add(&repo, "工资", dec!(3000.00), Direction::Income, "2024-05-01");

        let out = execute(
            &repo,
            Command::Stats { period: Period::Day, value: Some("2024-05-01".to_string()) },
            true,
        )
        .unwrap();
        let value: serde_json::Value = serde_json::from_str(&out).unwrap();
        assert_eq!(value["window"], "2024-05-01");
        assert_eq!(value["balance"], "2950.00");
    }

    #[test]
    fn test_edit_keeps_unspecified_fields() {
        let repo = repo();
        add(&repo, "餐饮", dec!(50), Direction::Expense, "2024-05-01");
        let id = repo.list_all()[0].id;

        execute(
            &repo,
            Command::Edit { id, category: None, amount: Some(dec!(80)), direction: None, memo: Some("dinner".into()) },
            false,
        )
        .unwrap();
        let tx = repo.find_by_id(id).unwrap();
        assert_eq!(&*tx.category, "餐饮");
        assert_eq!(tx.amount, dec!(80));
        assert_eq!(tx.memo.as_deref(), Some("dinner"));
    }

    #[test]
    fn test_missing_ids_are_errors() {
        let repo = repo();
        assert!(matches!(execute(&repo, Command::Show { id: 9 }, false), Err(CliError::NotFound(9))));
        assert!(matches!(execute(&repo, Command::Delete { id: 9 }, false), Err(CliError::NotFound(9))));
    }

    #[test]
    fn test_breakdown_table() {
        let repo = repo();
        add(&repo, "A", dec!(30), Direction::Expense, "2024-05-01");
        add(&repo, "A", dec!(10), Direction::Expense, "2024-05-02");
        add(&repo, "B", dec!(60), Direction::Expense, "2024-05-03");

        let out = execute(
            &repo,
            Command::Breakdown { period: Period::Month, value: Some("2024-05".into()), direction: Direction::Expense },
            false,
        )
        .unwrap();
        let lines: Vec<&str> = out.lines().collect();
        let b = lines.iter().position(|l| l.contains("60.0%")).unwrap();
        let a = lines.iter().position(|l| l.contains("40.0%")).unwrap();
        assert!(b < a);
        assert!(lines[b].contains("60.00"));
        assert!(lines[a].contains("40.00"));
    }

    #[test]
    fn test_list_through_pool() {
        let repo = repo();
        add(&repo, "工资", dec!(1), Direction::Income, "2024-05-01");
        add(&repo, "餐饮", dec!(2), Direction::Expense, "2024-05-02");
        let out = execute(&repo, Command::List { direction: Some(Direction::Income), days: None, date: None }, true).unwrap();
        let rows: Vec<serde_json::Value> = serde_json::from_str(&out).unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0]["category"], "工资");
    }
}
