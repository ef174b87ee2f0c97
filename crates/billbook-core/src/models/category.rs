//! Fixed category tables per direction.
//!
//! Transactions store the display label as free text, so labels outside
//! these tables still round-trip through a store untouched.

use super::Direction;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ExpenseCategory {
    Dining,
    Fruit,
    Snacks,
    Beauty,
    Shopping,
    Transport,
    Entertainment,
    Other,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum IncomeCategory {
    Salary,
    Investment,
    PartTime,
    Other,
}

impl ExpenseCategory {
    pub const ALL: [ExpenseCategory; 8] = [
        ExpenseCategory::Dining,
        ExpenseCategory::Fruit,
        ExpenseCategory::Snacks,
        ExpenseCategory::Beauty,
        ExpenseCategory::Shopping,
        ExpenseCategory::Transport,
        ExpenseCategory::Entertainment,
        ExpenseCategory::Other,
    ];

    pub fn label(self) -> &'static str {
        match self {
            ExpenseCategory::Dining => "餐饮",
            ExpenseCategory::Fruit => "水果",
            ExpenseCategory::Snacks => "零食",
            ExpenseCategory::Beauty => "美妆",
            ExpenseCategory::Shopping => "购物",
            ExpenseCategory::Transport => "交通",
            ExpenseCategory::Entertainment => "娱乐",
            ExpenseCategory::Other => "其他",
        }
    }

    pub fn from_label(label: &str) -> Option<ExpenseCategory> {
        Self::ALL.into_iter().find(|c| c.label() == label)
    }
}

impl IncomeCategory {
    pub const ALL: [IncomeCategory; 4] = [
        IncomeCategory::Salary,
        IncomeCategory::Investment,
        IncomeCategory::PartTime,
        IncomeCategory::Other,
    ];

    pub fn label(self) -> &'static str {
        match self {
            IncomeCategory::Salary => "工资",
            IncomeCategory::Investment => "理财",
            IncomeCategory::PartTime => "兼职",
            IncomeCategory::Other => "其他",
        }
    }

    pub fn from_label(label: &str) -> Option<IncomeCategory> {
        Self::ALL.into_iter().find(|c| c.label() == label)
    }
}

/// Labels offered for `direction`, in picker order.
pub fn categories_for(direction: Direction) -> Vec<&'static str> {
    match direction {
        Direction::Expense => ExpenseCategory::ALL.iter().map(|c| c.label()).collect(),
        Direction::Income => IncomeCategory::ALL.iter().map(|c| c.label()).collect(),
    }
}
