use std::cmp::Reverse;

use async_trait::async_trait;
use chrono::{Datelike, NaiveDate};
use rand::Rng;
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use tokio::sync::RwLock;

use crate::{
    errors::{AppError, Result},
    store::SocietyStore,
    structs::{
        Bill, BillStatus, BillingPeriod, Expense, ExpenseCategory, Member, MemberStatus, Notice,
        NoticeStatus, NoticeType, PaymentMethod, Priority, Role,
    },
    utils::generate_receipt_number,
};

#[derive(Debug, Default)]
struct DemoData {
    members: Vec<Member>,
    bills: Vec<Bill>,
    expenses: Vec<Expense>,
    notices: Vec<Notice>,
}

/// In-memory store for demo mode. Never mixed with the live store; state is
/// lost when the process exits.
#[derive(Debug, Default)]
pub struct DemoStore {
    data: RwLock<DemoData>,
}

impl DemoStore {
    /// Demo society as of `today`: six members, one admin, bills from January
    /// through the current month, a handful of expenses and notices.
    pub fn seeded(today: NaiveDate) -> Self {
        let members = seed_members();
        let bills = seed_bills(&members, today);
        let data = DemoData {
            members,
            bills,
            expenses: seed_expenses(today),
            notices: seed_notices(today),
        };
        log::info!(
            "Demo store seeded with {} members and {} bills",
            data.members.len(),
            data.bills.len()
        );
        DemoStore {
            data: RwLock::new(data),
        }
    }
}

fn sort_members(members: &mut [Member]) {
    members.sort_by(|a, b| b.join_date.cmp(&a.join_date).then_with(|| a.id.cmp(&b.id)));
}

fn sort_bills(bills: &mut [Bill]) {
    bills.sort_by(|a, b| {
        (Reverse(a.year), Reverse(a.month), &a.member_id).cmp(&(
            Reverse(b.year),
            Reverse(b.month),
            &b.member_id,
        ))
    });
}

#[async_trait]
impl SocietyStore for DemoStore {
    async fn list_members(&self) -> Result<Vec<Member>> {
        let mut members = self.data.read().await.members.clone();
        sort_members(&mut members);
        Ok(members)
    }

    async fn members_by_status(&self, status: MemberStatus) -> Result<Vec<Member>> {
        let mut members: Vec<Member> = self
            .data
            .read()
            .await
            .members
            .iter()
            .filter(|m| m.status == status)
            .cloned()
            .collect();
        sort_members(&mut members);
        Ok(members)
    }

    async fn get_member(&self, id: &str) -> Result<Option<Member>> {
        let data = self.data.read().await;
        Ok(data.members.iter().find(|m| m.id == id).cloned())
    }

    async fn insert_member(&self, member: Member) -> Result<Member> {
        let mut data = self.data.write().await;
        if data.members.iter().any(|m| m.id == member.id) {
            return Err(AppError::Validation(format!(
                "member {} already exists",
                member.id
            )));
        }
        data.members.push(member.clone());
        log::info!("Member created: {} ({})", member.id, member.email);
        Ok(member)
    }

    async fn update_member(&self, member: Member) -> Result<Member> {
        let mut data = self.data.write().await;
        let slot = data
            .members
            .iter_mut()
            .find(|m| m.id == member.id)
            .ok_or_else(|| AppError::NotFound(format!("member {}", member.id)))?;
        *slot = member.clone();
        log::info!("Member updated: {}", member.id);
        Ok(member)
    }

    async fn delete_member(&self, id: &str) -> Result<bool> {
        let mut data = self.data.write().await;
        let before = data.members.len();
        data.members.retain(|m| m.id != id);
        let deleted = data.members.len() != before;
        if deleted {
            data.bills.retain(|b| b.member_id != id);
            log::info!("Member with id {} deleted", id);
        }
        Ok(deleted)
    }

    async fn list_bills(&self) -> Result<Vec<Bill>> {
        let mut bills = self.data.read().await.bills.clone();
        sort_bills(&mut bills);
        Ok(bills)
    }

    async fn bills_for_member(&self, member_id: &str) -> Result<Vec<Bill>> {
        let mut bills: Vec<Bill> = self
            .data
            .read()
            .await
            .bills
            .iter()
            .filter(|b| b.member_id == member_id)
            .cloned()
            .collect();
        sort_bills(&mut bills);
        Ok(bills)
    }

    async fn bills_for_period(&self, period: BillingPeriod) -> Result<Vec<Bill>> {
        let mut bills: Vec<Bill> = self
            .data
            .read()
            .await
            .bills
            .iter()
            .filter(|b| b.in_period(period))
            .cloned()
            .collect();
        sort_bills(&mut bills);
        Ok(bills)
    }

    async fn get_bill(&self, id: &str) -> Result<Option<Bill>> {
        let data = self.data.read().await;
        Ok(data.bills.iter().find(|b| b.id == id).cloned())
    }

    async fn insert_bills(&self, bills: Vec<Bill>) -> Result<Vec<Bill>> {
        let mut data = self.data.write().await;
        let mut inserted = Vec::with_capacity(bills.len());
        for bill in bills {
            if data.bills.iter().any(|b| b.id == bill.id) {
                continue;
            }
            data.bills.push(bill.clone());
            inserted.push(bill);
        }
        Ok(inserted)
    }

    async fn transition_bill(&self, bill: &Bill, from: &[BillStatus]) -> Result<bool> {
        let mut data = self.data.write().await;
        match data
            .bills
            .iter_mut()
            .find(|b| b.id == bill.id && from.contains(&b.status))
        {
            Some(slot) => {
                *slot = bill.clone();
                Ok(true)
            }
            None => Ok(false),
        }
    }

    async fn list_expenses(&self) -> Result<Vec<Expense>> {
        let mut expenses = self.data.read().await.expenses.clone();
        expenses.sort_by(|a, b| b.date.cmp(&a.date).then_with(|| a.id.cmp(&b.id)));
        Ok(expenses)
    }

    async fn insert_expense(&self, expense: Expense) -> Result<Expense> {
        self.data.write().await.expenses.push(expense.clone());
        log::info!("Expense created: {} ({})", expense.id, expense.amount);
        Ok(expense)
    }

    async fn list_notices(&self) -> Result<Vec<Notice>> {
        let mut notices = self.data.read().await.notices.clone();
        notices.sort_by(|a, b| b.date.cmp(&a.date).then_with(|| a.id.cmp(&b.id)));
        Ok(notices)
    }

    async fn get_notice(&self, id: &str) -> Result<Option<Notice>> {
        let data = self.data.read().await;
        Ok(data.notices.iter().find(|n| n.id == id).cloned())
    }

    async fn insert_notice(&self, notice: Notice) -> Result<Notice> {
        self.data.write().await.notices.push(notice.clone());
        log::info!("Notice created: {}", notice.id);
        Ok(notice)
    }

    async fn update_notice(&self, notice: Notice) -> Result<Notice> {
        let mut data = self.data.write().await;
        let slot = data
            .notices
            .iter_mut()
            .find(|n| n.id == notice.id)
            .ok_or_else(|| AppError::NotFound(format!("notice {}", notice.id)))?;
        *slot = notice.clone();
        Ok(notice)
    }
}

fn date(year: i32, month: u32, day: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(year, month, day).unwrap_or_default()
}

fn seed_members() -> Vec<Member> {
    let people = [
        ("1", "Rajesh Kumar", "A-201", "+91-9876543210", (2023, 1, 15), Role::Admin),
        ("2", "Priya Sharma", "B-105", "+91-9876543211", (2023, 2, 20), Role::Member),
        ("3", "Amit Singh", "C-303", "+91-9876543212", (2023, 3, 10), Role::Member),
        ("4", "Sunita Devi", "A-102", "+91-9876543213", (2023, 1, 25), Role::Member),
        ("5", "Rohit Gupta", "B-207", "+91-9876543214", (2023, 4, 5), Role::Member),
        ("6", "Neha Jain", "C-401", "+91-9876543215", (2023, 5, 12), Role::Member),
    ];
    people
        .iter()
        .map(|&(id, name, flat, phone, (y, m, d), role)| Member {
            id: id.to_string(),
            name: name.to_string(),
            email: format!("{}@email.com", name.to_lowercase().replace(' ', ".")),
            flat_number: flat.to_string(),
            phone: phone.to_string(),
            address: None,
            monthly_amount: dec!(2500),
            join_date: date(y, m, d),
            status: MemberStatus::Active,
            role,
        })
        .collect()
}

/// Bills from January through the current month of `today`'s year. Past months
/// are paid except a few late payers kept overdue; the current month is pending.
fn seed_bills(members: &[Member], today: NaiveDate) -> Vec<Bill> {
    let mut rng = rand::thread_rng();
    let mut bills = Vec::new();
    let year = today.year();
    for member in members {
        for month in 1..=today.month() {
            let period = BillingPeriod { year, month };
            let late_from = match member.name.as_str() {
                "Rohit Gupta" => Some(10),
                "Neha Jain" => Some(11),
                _ => None,
            };
            let mut bill = Bill {
                id: Bill::bill_id(&member.id, period),
                member_id: member.id.clone(),
                month,
                year,
                amount: member.monthly_amount,
                due_date: period.due_date(),
                status: BillStatus::Pending,
                payment_date: None,
                payment_method: None,
                receipt_number: None,
            };
            if month < today.month() {
                if late_from.is_some_and(|from| month >= from) {
                    bill.status = BillStatus::Overdue;
                } else {
                    bill.status = BillStatus::Paid;
                    bill.payment_date = Some(date(year, month, rng.gen_range(1..=28)));
                    bill.payment_method = Some(if rng.gen_bool(0.5) {
                        PaymentMethod::Online
                    } else {
                        PaymentMethod::Cash
                    });
                    bill.receipt_number = Some(generate_receipt_number());
                }
            }
            bills.push(bill);
        }
    }
    bills
}

fn seed_expenses(today: NaiveDate) -> Vec<Expense> {
    let (year, month) = (today.year(), today.month());
    let rows: [(&str, ExpenseCategory, &str, Decimal, u32, &str); 5] = [
        (
            "1",
            ExpenseCategory::Electricity,
            "Monthly electricity bill for common areas",
            dec!(15000),
            10,
            "State Electricity Board",
        ),
        (
            "2",
            ExpenseCategory::Security,
            "Security guard salary",
            dec!(25000),
            8,
            "Guardian Security Services",
        ),
        (
            "3",
            ExpenseCategory::Maintenance,
            "Lift maintenance and repairs",
            dec!(8500),
            5,
            "Quick Fix Solutions",
        ),
        (
            "4",
            ExpenseCategory::Cleaning,
            "Housekeeping services",
            dec!(12000),
            3,
            "Clean & Green Services",
        ),
        (
            "5",
            ExpenseCategory::Water,
            "Water tanker and pump maintenance",
            dec!(6500),
            12,
            "Aqua Solutions",
        ),
    ];
    rows.into_iter()
        .map(|(id, category, description, amount, day, vendor)| Expense {
            id: id.to_string(),
            category,
            description: description.to_string(),
            amount,
            date: date(year, month, day),
            vendor: vendor.to_string(),
            receipt_url: None,
            approved_by: "Admin".to_string(),
        })
        .collect()
}

fn seed_notices(today: NaiveDate) -> Vec<Notice> {
    let (year, month) = (today.year(), today.month());
    vec![
        Notice {
            id: "1".to_string(),
            title: "Water Supply Maintenance".to_string(),
            content: "Water supply will be interrupted on the 15th from 10 AM to 2 PM for maintenance work.".to_string(),
            notice_type: NoticeType::Maintenance,
            priority: Priority::High,
            date: date(year, month, 10),
            status: NoticeStatus::Active,
        },
        Notice {
            id: "2".to_string(),
            title: "Society Annual Meeting".to_string(),
            content: "Annual general meeting will be held on the 20th at 6 PM in the community hall.".to_string(),
            notice_type: NoticeType::Meeting,
            priority: Priority::Medium,
            date: date(year, month, 8),
            status: NoticeStatus::Active,
        },
        Notice {
            id: "3".to_string(),
            title: "New Parking Rules".to_string(),
            content: "New parking guidelines have been implemented. Please ensure proper parking in designated areas.".to_string(),
            notice_type: NoticeType::Announcement,
            priority: Priority::Medium,
            date: date(year, month, 5),
            status: NoticeStatus::Active,
        },
    ]
}

#[cfg(test)]
mod tests {
    use super::*;

    fn nov_2024() -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 11, 20).unwrap()
    }

    #[tokio::test]
    async fn seed_covers_january_through_current_month() {
        let store = DemoStore::seeded(nov_2024());
        let bills = store.list_bills().await.unwrap();
        assert_eq!(bills.len(), 6 * 11);

        let current = store
            .bills_for_period(BillingPeriod { year: 2024, month: 11 })
            .await
            .unwrap();
        assert_eq!(current.len(), 6);
        assert!(current.iter().all(|b| b.status == BillStatus::Pending));
    }

    #[tokio::test]
    async fn seed_keeps_late_payers_overdue() {
        let store = DemoStore::seeded(nov_2024());
        let rohit = store.bills_for_member("5").await.unwrap();
        let overdue: Vec<u32> = rohit
            .iter()
            .filter(|b| b.status == BillStatus::Overdue)
            .map(|b| b.month)
            .collect();
        assert_eq!(overdue, vec![10]);

        let priya = store.bills_for_member("2").await.unwrap();
        for bill in priya.iter().filter(|b| b.month < 11) {
            assert_eq!(bill.status, BillStatus::Paid);
            assert!(bill.payment_date.is_some());
            assert!(bill.receipt_number.is_some());
        }
    }

    #[tokio::test]
    async fn bills_are_listed_newest_period_first() {
        let store = DemoStore::seeded(nov_2024());
        let bills = store.list_bills().await.unwrap();
        assert_eq!(bills[0].month, 11);
        assert_eq!(bills[0].member_id, "1");
        assert_eq!(bills.last().unwrap().month, 1);
    }

    #[tokio::test]
    async fn insert_bills_ignores_known_ids() {
        let store = DemoStore::seeded(nov_2024());
        let existing = store.get_bill("1-2024-11").await.unwrap().unwrap();
        let inserted = store.insert_bills(vec![existing]).await.unwrap();
        assert!(inserted.is_empty());
    }

    #[tokio::test]
    async fn empty_store_has_nothing() {
        let store = DemoStore::default();
        assert!(store.list_members().await.unwrap().is_empty());
        assert!(store.get_member("1").await.unwrap().is_none());
        assert!(!store.delete_member("1").await.unwrap());
    }
}
