//! Pure folds over transactions and grouped totals.
//!
//! All sums are exact `Decimal` arithmetic; rounding is left to whoever
//! renders the numbers.

use std::{collections::BTreeMap, sync::Arc};

use rust_decimal::Decimal;

use crate::models::{CategoryStatistic, CategoryTotal, Direction, Transaction, WindowStatistics};

const HUNDRED: Decimal = Decimal::ONE_HUNDRED;

pub fn window_totals<'a, I>(txs: I) -> WindowStatistics
where
    I: IntoIterator<Item = &'a Transaction>,
{
    let mut income = Decimal::ZERO;
    let mut expense = Decimal::ZERO;
    for tx in txs {
        match tx.direction {
            Direction::Income => income += tx.amount,
            Direction::Expense => expense += tx.amount,
        }
    }
    WindowStatistics {
        income,
        expense,
        balance: income - expense,
    }
}

/// Attaches percentages to grouped totals, keeping the input order.
pub fn category_breakdown(groups: Vec<CategoryTotal>) -> Vec<CategoryStatistic> {
    let total: Decimal = groups.iter().map(|g| g.amount).sum();
    groups
        .into_iter()
        .map(|g| {
            let percentage = if total.is_zero() {
                Decimal::ZERO
            } else {
                g.amount * HUNDRED / total
            };
            CategoryStatistic {
                category: g.category,
                amount: g.amount,
                count: g.count,
                percentage,
            }
        })
        .collect()
}

/// Merges `(category, amount)` pairs into per-category totals, largest sum
/// first and ties by category label.
pub fn group_totals<I>(rows: I) -> Vec<CategoryTotal>
where
    I: IntoIterator<Item = (Arc<str>, Decimal)>,
{
    let mut by_category: BTreeMap<Arc<str>, (Decimal, u32)> = BTreeMap::new();
    for (category, amount) in rows {
        let entry = by_category.entry(category).or_insert((Decimal::ZERO, 0));
        entry.0 += amount;
        entry.1 += 1;
    }

    let mut totals: Vec<CategoryTotal> = by_category
        .into_iter()
        .map(|(category, (amount, count))| CategoryTotal { category, amount, count })
        .collect();
    totals.sort_by(|a, b| b.amount.cmp(&a.amount).then_with(|| a.category.cmp(&b.category)));
    totals
}
