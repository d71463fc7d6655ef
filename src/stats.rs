//! Dashboard figures derived from raw bills, expenses and members.
//!
//! Everything here is a pure function over slices; the `*_for` helpers at the
//! bottom only fetch the collections from a store first.

use std::collections::{HashMap, HashSet};

use chrono::{Datelike, NaiveDate};
use rust_decimal::{Decimal, RoundingStrategy};
use serde::Serialize;

use crate::{
    errors::Result,
    store::SocietyStore,
    structs::{
        Bill, BillStatus, BillingPeriod, Expense, ExpenseCategory, Member, MemberStatus, Notice,
        NoticeStatus,
    },
    utils::percent,
};

const TOP_CATEGORIES: usize = 5;
const RECENT_ITEMS: usize = 3;

/// Paid bills in `period` over all bills in `period`, as a whole percent.
pub fn collection_rate(bills: &[Bill], period: BillingPeriod) -> u32 {
    let in_period: Vec<&Bill> = bills.iter().filter(|b| b.in_period(period)).collect();
    let paid = in_period.iter().filter(|b| b.is_paid()).count();
    percent(paid, in_period.len())
}

pub fn total_collection(bills: &[Bill], period: BillingPeriod) -> Decimal {
    bills
        .iter()
        .filter(|b| b.in_period(period) && b.is_paid())
        .map(|b| b.amount)
        .sum()
}

pub fn total_expenses(expenses: &[Expense], period: BillingPeriod) -> Decimal {
    expenses
        .iter()
        .filter(|e| period.contains(e.date))
        .map(|e| e.amount)
        .sum()
}

pub fn net_balance(bills: &[Bill], expenses: &[Expense], period: BillingPeriod) -> Decimal {
    total_collection(bills, period) - total_expenses(expenses, period)
}

pub fn monthly_target(members: &[Member], standard_assessment: Decimal) -> Decimal {
    let active = members.iter().filter(|m| m.is_active()).count();
    Decimal::from(active) * standard_assessment
}

#[derive(Serialize, Debug, Clone, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct SocietyStats {
    pub period: BillingPeriod,
    pub total_members: usize,
    pub active_members: usize,
    pub pending_members: usize,
    pub total_collection: Decimal,
    pub total_expenses: Decimal,
    pub net_balance: Decimal,
    pub collection_rate: u32,
    /// Members with at least one bill explicitly marked overdue.
    pub overdue_count: usize,
    pub monthly_target: Decimal,
}

pub fn society_stats(
    members: &[Member],
    bills: &[Bill],
    expenses: &[Expense],
    today: NaiveDate,
    standard_assessment: Decimal,
) -> SocietyStats {
    let period = BillingPeriod::containing(today);
    let overdue_ids: HashSet<&str> = bills
        .iter()
        .filter(|b| b.status == BillStatus::Overdue)
        .map(|b| b.member_id.as_str())
        .collect();
    let collection = total_collection(bills, period);
    let spent = total_expenses(expenses, period);

    SocietyStats {
        period,
        total_members: members.len(),
        active_members: members.iter().filter(|m| m.is_active()).count(),
        pending_members: members
            .iter()
            .filter(|m| m.status == MemberStatus::Pending)
            .count(),
        total_collection: collection,
        total_expenses: spent,
        net_balance: net_balance(bills, expenses, period),
        collection_rate: collection_rate(bills, period),
        overdue_count: members
            .iter()
            .filter(|m| overdue_ids.contains(m.id.as_str()))
            .count(),
        monthly_target: monthly_target(members, standard_assessment),
    }
}

#[derive(Serialize, Debug, Clone, Default, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct BillSummary {
    pub total: usize,
    pub paid: usize,
    pub pending: usize,
    pub overdue: usize,
    pub total_amount: Decimal,
    pub collected_amount: Decimal,
}

pub fn bill_summary<'a>(bills: impl IntoIterator<Item = &'a Bill>) -> BillSummary {
    bills
        .into_iter()
        .fold(BillSummary::default(), |mut summary, bill| {
            summary.total += 1;
            summary.total_amount += bill.amount;
            match bill.status {
                BillStatus::Paid => {
                    summary.paid += 1;
                    summary.collected_amount += bill.amount;
                }
                BillStatus::Pending => summary.pending += 1,
                BillStatus::Overdue => summary.overdue += 1,
            }
            summary
        })
}

#[derive(Serialize, Debug, Clone, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ExpenseSummary {
    pub total: Decimal,
    pub count: usize,
    pub current_month: Decimal,
    pub last_month: Decimal,
    /// Month over month change in percent, one decimal place. Zero when
    /// nothing was spent last month.
    pub monthly_change: Decimal,
}

/// `filtered` drives the total and count, `all` the month over month figures.
pub fn expense_summary(filtered: &[Expense], all: &[Expense], today: NaiveDate) -> ExpenseSummary {
    let current = BillingPeriod::containing(today);
    let current_month = total_expenses(all, current);
    let last_month = total_expenses(all, current.previous());
    let monthly_change = if last_month > Decimal::ZERO {
        ((current_month - last_month) / last_month * Decimal::ONE_HUNDRED)
            .round_dp_with_strategy(1, RoundingStrategy::MidpointAwayFromZero)
    } else {
        Decimal::ZERO
    };
    ExpenseSummary {
        total: filtered.iter().map(|e| e.amount).sum(),
        count: filtered.len(),
        current_month,
        last_month,
        monthly_change,
    }
}

#[derive(Serialize, Debug, Clone, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct MonthlySummary {
    pub month: u32,
    pub label: &'static str,
    pub income: Decimal,
    pub expenses: Decimal,
    pub profit: Decimal,
}

#[derive(Serialize, Debug, Clone, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct CategoryTotal {
    pub category: ExpenseCategory,
    pub label: &'static str,
    pub total: Decimal,
}

#[derive(Serialize, Debug, Clone, Default, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct PaymentStatusBreakdown {
    pub paid: usize,
    pub pending: usize,
    pub overdue: usize,
}

#[derive(Serialize, Debug, Clone, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct FinancialReport {
    pub year: i32,
    pub yearly_income: Decimal,
    pub yearly_expenses: Decimal,
    pub net: Decimal,
    pub monthly: Vec<MonthlySummary>,
    pub top_categories: Vec<CategoryTotal>,
    pub payment_status: PaymentStatusBreakdown,
    pub collection_efficiency: u32,
}

/// Income, expenses and the monthly rows cover `year` only. Category totals,
/// the payment status breakdown and collection efficiency cover every bill and
/// expense on record.
pub fn financial_report(bills: &[Bill], expenses: &[Expense], year: i32) -> FinancialReport {
    let year_bills: Vec<Bill> = bills.iter().filter(|b| b.year == year).cloned().collect();
    let year_expenses: Vec<Expense> = expenses
        .iter()
        .filter(|e| e.date.year() == year)
        .cloned()
        .collect();

    let monthly: Vec<MonthlySummary> = (1..=12)
        .map(|month| {
            let period = BillingPeriod { year, month };
            let income = total_collection(&year_bills, period);
            let spent = total_expenses(&year_expenses, period);
            MonthlySummary {
                month,
                label: period.short_name(),
                income,
                expenses: spent,
                profit: income - spent,
            }
        })
        .collect();

    let mut by_category: HashMap<ExpenseCategory, Decimal> = HashMap::new();
    for expense in expenses {
        *by_category.entry(expense.category).or_default() += expense.amount;
    }
    let mut top_categories: Vec<CategoryTotal> = by_category
        .into_iter()
        .map(|(category, total)| CategoryTotal {
            category,
            label: category.label(),
            total,
        })
        .collect();
    top_categories.sort_by(|a, b| {
        b.total
            .cmp(&a.total)
            .then_with(|| a.category.as_str().cmp(b.category.as_str()))
    });
    top_categories.truncate(TOP_CATEGORIES);

    let yearly_income = bill_summary(&year_bills).collected_amount;
    let summary = bill_summary(bills);
    let yearly_expenses: Decimal = year_expenses.iter().map(|e| e.amount).sum();

    FinancialReport {
        year,
        yearly_income,
        yearly_expenses,
        net: yearly_income - yearly_expenses,
        monthly,
        top_categories,
        payment_status: PaymentStatusBreakdown {
            paid: summary.paid,
            pending: summary.pending,
            overdue: summary.overdue,
        },
        collection_efficiency: percent(summary.paid, summary.total),
    }
}

#[derive(Serialize, Debug, Clone, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct MemberDashboard {
    pub member: Member,
    /// Pending plus overdue.
    pub outstanding_amount: Decimal,
    pub next_due_date: Option<NaiveDate>,
    pub unpaid_bills: Vec<Bill>,
    pub recent_payments: Vec<Bill>,
    pub notices: Vec<Notice>,
}

pub fn member_dashboard(member: &Member, bills: &[Bill], notices: &[Notice]) -> MemberDashboard {
    let own = bills.iter().filter(|b| b.member_id == member.id);

    let mut unpaid_bills: Vec<Bill> = own.clone().filter(|b| !b.is_paid()).cloned().collect();
    unpaid_bills.sort_by_key(|b| b.due_date);

    let mut recent_payments: Vec<Bill> = own.filter(|b| b.is_paid()).cloned().collect();
    recent_payments.sort_by(|a, b| {
        b.payment_date
            .cmp(&a.payment_date)
            .then_with(|| b.period().cmp(&a.period()))
    });
    recent_payments.truncate(RECENT_ITEMS);

    let mut active_notices: Vec<Notice> = notices
        .iter()
        .filter(|n| n.status == NoticeStatus::Active)
        .cloned()
        .collect();
    active_notices.sort_by(|a, b| b.date.cmp(&a.date));
    active_notices.truncate(RECENT_ITEMS);

    MemberDashboard {
        member: member.clone(),
        outstanding_amount: unpaid_bills.iter().map(|b| b.amount).sum(),
        next_due_date: unpaid_bills.first().map(|b| b.due_date),
        unpaid_bills,
        recent_payments,
        notices: active_notices,
    }
}

pub async fn society_stats_for(
    store: &dyn SocietyStore,
    today: NaiveDate,
    standard_assessment: Decimal,
) -> Result<SocietyStats> {
    let members = store.list_members().await?;
    let bills = store.list_bills().await?;
    let expenses = store.list_expenses().await?;
    Ok(society_stats(
        &members,
        &bills,
        &expenses,
        today,
        standard_assessment,
    ))
}

pub async fn financial_report_for(store: &dyn SocietyStore, year: i32) -> Result<FinancialReport> {
    let bills = store.list_bills().await?;
    let expenses = store.list_expenses().await?;
    Ok(financial_report(&bills, &expenses, year))
}

pub async fn member_dashboard_for(
    store: &dyn SocietyStore,
    member: &Member,
) -> Result<MemberDashboard> {
    let bills = store.bills_for_member(&member.id).await?;
    let notices = store.list_notices().await?;
    Ok(member_dashboard(member, &bills, &notices))
}
