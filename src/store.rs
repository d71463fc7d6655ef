use async_trait::async_trait;

use crate::errors::Result;
use crate::structs::{Bill, BillStatus, BillingPeriod, Expense, Member, MemberStatus, Notice};

/// Row-level access to the society's four collections.
///
/// Exactly one implementation backs a running service: [`crate::db::SqliteStore`]
/// for live data or [`crate::demo::DemoStore`] for the seeded demo mode.
/// List operations return rows in a stable order: members newest first, bills
/// by period (newest first) then member id, expenses and notices by date,
/// newest first.
#[async_trait]
pub trait SocietyStore: Send + Sync {
    async fn list_members(&self) -> Result<Vec<Member>>;
    async fn members_by_status(&self, status: MemberStatus) -> Result<Vec<Member>>;
    async fn get_member(&self, id: &str) -> Result<Option<Member>>;
    async fn insert_member(&self, member: Member) -> Result<Member>;
    /// Replaces every field of an existing member. `NotFound` if absent.
    async fn update_member(&self, member: Member) -> Result<Member>;
    /// Removes the member and their bills. Returns false if nothing was removed.
    async fn delete_member(&self, id: &str) -> Result<bool>;

    async fn list_bills(&self) -> Result<Vec<Bill>>;
    async fn bills_for_member(&self, member_id: &str) -> Result<Vec<Bill>>;
    async fn bills_for_period(&self, period: BillingPeriod) -> Result<Vec<Bill>>;
    async fn get_bill(&self, id: &str) -> Result<Option<Bill>>;
    /// Inserts each bill whose id is not already present and returns only the
    /// ones that were actually written.
    async fn insert_bills(&self, bills: Vec<Bill>) -> Result<Vec<Bill>>;
    /// Writes `bill` only if the stored bill's status is one of `from`, checked
    /// and written atomically. Returns false when the bill is missing or has
    /// already moved on.
    async fn transition_bill(&self, bill: &Bill, from: &[BillStatus]) -> Result<bool>;

    async fn list_expenses(&self) -> Result<Vec<Expense>>;
    async fn insert_expense(&self, expense: Expense) -> Result<Expense>;

    async fn list_notices(&self) -> Result<Vec<Notice>>;
    async fn get_notice(&self, id: &str) -> Result<Option<Notice>>;
    async fn insert_notice(&self, notice: Notice) -> Result<Notice>;
    async fn update_notice(&self, notice: Notice) -> Result<Notice>;
}
