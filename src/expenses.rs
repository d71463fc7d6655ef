use chrono::{Datelike, NaiveDate};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::{
    errors::{AppError, Result},
    stats::{expense_summary, ExpenseSummary},
    store::SocietyStore,
    structs::{Expense, ExpenseCategory, Member},
};

#[derive(Deserialize, Serialize, Debug, Clone)]
#[serde(rename_all = "camelCase")]
pub struct NewExpense {
    pub category: ExpenseCategory,
    pub description: String,
    pub amount: Decimal,
    pub date: Option<NaiveDate>,
    pub vendor: String,
    pub receipt_url: Option<String>,
}

#[derive(Deserialize, Serialize, Debug, Clone, Default)]
#[serde(rename_all = "camelCase")]
pub struct ExpenseFilter {
    pub search: Option<String>,
    pub category: Option<ExpenseCategory>,
    pub month: Option<u32>,
}

impl ExpenseFilter {
    pub fn matches(&self, expense: &Expense) -> bool {
        let matches_search = match self.search.as_deref().map(str::trim) {
            None | Some("") => true,
            Some(term) => {
                let term = term.to_lowercase();
                expense.description.to_lowercase().contains(&term)
                    || expense.vendor.to_lowercase().contains(&term)
                    || expense.category.as_str().contains(&term)
                    || expense.category.label().to_lowercase().contains(&term)
            }
        };
        matches_search
            && self.category.map_or(true, |c| expense.category == c)
            && self.month.map_or(true, |m| expense.date.month() == m)
    }
}

/// Records an expense approved by `approver`. Expenses cannot be edited later.
pub async fn create_expense(
    store: &dyn SocietyStore,
    input: NewExpense,
    approver: &Member,
    today: NaiveDate,
) -> Result<Expense> {
    if input.description.trim().is_empty() || input.vendor.trim().is_empty() {
        return Err(AppError::Validation(
            "description and vendor are required".into(),
        ));
    }
    if input.amount <= Decimal::ZERO {
        return Err(AppError::Validation("amount must be positive".into()));
    }
    let expense = Expense {
        id: Uuid::new_v4().to_string(),
        category: input.category,
        description: input.description.trim().to_owned(),
        amount: input.amount,
        date: input.date.unwrap_or(today),
        vendor: input.vendor.trim().to_owned(),
        receipt_url: input.receipt_url.filter(|u| !u.trim().is_empty()),
        approved_by: approver.name.clone(),
    };
    store.insert_expense(expense).await
}

#[derive(Serialize, Debug, Clone)]
#[serde(rename_all = "camelCase")]
pub struct ExpenseListing {
    pub expenses: Vec<Expense>,
    pub summary: ExpenseSummary,
}

pub async fn list_expenses(
    store: &dyn SocietyStore,
    filter: &ExpenseFilter,
    today: NaiveDate,
) -> Result<ExpenseListing> {
    let all = store.list_expenses().await?;
    let expenses: Vec<Expense> = all.iter().filter(|e| filter.matches(e)).cloned().collect();
    let summary = expense_summary(&expenses, &all, today);
    Ok(ExpenseListing { expenses, summary })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::demo::DemoStore;
    use rust_decimal_macros::dec;

    fn today() -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 1, 20).unwrap()
    }

    async fn admin(store: &DemoStore) -> Member {
        store.get_member("1").await.unwrap().unwrap()
    }

    fn diesel_for_generator() -> NewExpense {
        NewExpense {
            category: ExpenseCategory::Maintenance,
            description: "Diesel for backup generator".into(),
            amount: dec!(4200),
            date: None,
            vendor: "City Fuels".into(),
            receipt_url: Some("  ".into()),
        }
    }

    #[tokio::test]
    async fn expense_is_stamped_with_approver_and_date() {
        let store = DemoStore::seeded(today());
        let approver = admin(&store).await;
        let expense = create_expense(&store, diesel_for_generator(), &approver, today())
            .await
            .unwrap();
        assert_eq!(expense.approved_by, "Rajesh Kumar");
        assert_eq!(expense.date, today());
        assert_eq!(expense.receipt_url, None);
        assert_eq!(store.list_expenses().await.unwrap().len(), 6);
    }

    #[tokio::test]
    async fn non_positive_amount_is_rejected() {
        let store = DemoStore::seeded(today());
        let approver = admin(&store).await;
        let mut input = diesel_for_generator();
        input.amount = Decimal::ZERO;
        let err = create_expense(&store, input, &approver, today())
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::Validation(_)));
    }

    #[tokio::test]
    async fn filters_combine_search_category_and_month() {
        let store = DemoStore::seeded(today());
        let by_vendor = ExpenseFilter {
            search: Some("aqua".into()),
            ..Default::default()
        };
        let listing = list_expenses(&store, &by_vendor, today()).await.unwrap();
        assert_eq!(listing.expenses.len(), 1);
        assert_eq!(listing.summary.count, 1);
        assert_eq!(listing.summary.current_month, dec!(67000));

        let by_category = ExpenseFilter {
            category: Some(ExpenseCategory::Security),
            month: Some(1),
            ..Default::default()
        };
        let found = list_expenses(&store, &by_category, today())
            .await
            .unwrap()
            .expenses;
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].amount, dec!(25000));

        let wrong_month = ExpenseFilter {
            month: Some(2),
            ..Default::default()
        };
        let listing = list_expenses(&store, &wrong_month, today()).await.unwrap();
        assert!(listing.expenses.is_empty());
        assert_eq!(listing.summary.total, Decimal::ZERO);
    }
}
