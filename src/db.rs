use std::{str::FromStr, time::Duration};

use async_trait::async_trait;
use chrono::NaiveDate;
use rust_decimal::Decimal;
use sqlx::{
    prelude::FromRow,
    sqlite::{SqliteConnectOptions, SqliteJournalMode},
    SqlitePool,
};

use crate::{
    errors::{AppError, Result},
    store::SocietyStore,
    structs::{Bill, BillStatus, BillingPeriod, Expense, Member, MemberStatus, Notice},
};

const MEMBER_COLUMNS: &str =
    "id, name, email, flat_number, phone, address, monthly_amount, join_date, status, role";
const BILL_COLUMNS: &str = "id, member_id, month, year, amount, due_date, status, payment_date, payment_method, receipt_number";
const EXPENSE_COLUMNS: &str =
    "id, category, description, amount, date, vendor, receipt_url, approved_by";
const NOTICE_COLUMNS: &str = "id, title, content, notice_type, priority, date, status";

#[derive(Debug, FromRow)]
struct MemberRow {
    id: String,
    name: String,
    email: String,
    flat_number: String,
    phone: String,
    address: Option<String>,
    monthly_amount: String,
    join_date: NaiveDate,
    status: String,
    role: String,
}

#[derive(Debug, FromRow)]
struct BillRow {
    id: String,
    member_id: String,
    month: i64,
    year: i64,
    amount: String,
    due_date: NaiveDate,
    status: String,
    payment_date: Option<NaiveDate>,
    payment_method: Option<String>,
    receipt_number: Option<String>,
}

#[derive(Debug, FromRow)]
struct ExpenseRow {
    id: String,
    category: String,
    description: String,
    amount: String,
    date: NaiveDate,
    vendor: String,
    receipt_url: Option<String>,
    approved_by: String,
}

#[derive(Debug, FromRow)]
struct NoticeRow {
    id: String,
    title: String,
    content: String,
    notice_type: String,
    priority: String,
    date: NaiveDate,
    status: String,
}

fn corrupt(table: &str, id: &str, detail: impl std::fmt::Display) -> AppError {
    log::error!("Corrupt {} row {}: {}", table, id, detail);
    AppError::CorruptRecord(format!("{} {}: {}", table, id, detail))
}

fn parse_amount(table: &str, id: &str, raw: &str) -> Result<Decimal> {
    Decimal::from_str(raw).map_err(|e| corrupt(table, id, format!("amount '{}': {}", raw, e)))
}

fn parse_text<T: FromStr<Err = AppError>>(table: &str, id: &str, raw: &str) -> Result<T> {
    raw.parse::<T>().map_err(|e| corrupt(table, id, e))
}

impl TryFrom<MemberRow> for Member {
    type Error = AppError;

    fn try_from(row: MemberRow) -> Result<Self> {
        Ok(Member {
            monthly_amount: parse_amount("members", &row.id, &row.monthly_amount)?,
            status: parse_text("members", &row.id, &row.status)?,
            role: parse_text("members", &row.id, &row.role)?,
            id: row.id,
            name: row.name,
            email: row.email,
            flat_number: row.flat_number,
            phone: row.phone,
            address: row.address,
            join_date: row.join_date,
        })
    }
}

impl TryFrom<BillRow> for Bill {
    type Error = AppError;

    fn try_from(row: BillRow) -> Result<Self> {
        let month = u32::try_from(row.month).map_err(|e| corrupt("bills", &row.id, e))?;
        let year = i32::try_from(row.year).map_err(|e| corrupt("bills", &row.id, e))?;
        let payment_method = match row.payment_method.as_deref() {
            Some(raw) => Some(parse_text("bills", &row.id, raw)?),
            None => None,
        };
        Ok(Bill {
            amount: parse_amount("bills", &row.id, &row.amount)?,
            status: parse_text("bills", &row.id, &row.status)?,
            payment_method,
            id: row.id,
            member_id: row.member_id,
            month,
            year,
            due_date: row.due_date,
            payment_date: row.payment_date,
            receipt_number: row.receipt_number,
        })
    }
}

impl TryFrom<ExpenseRow> for Expense {
    type Error = AppError;

    fn try_from(row: ExpenseRow) -> Result<Self> {
        Ok(Expense {
            category: parse_text("expenses", &row.id, &row.category)?,
            amount: parse_amount("expenses", &row.id, &row.amount)?,
            id: row.id,
            description: row.description,
            date: row.date,
            vendor: row.vendor,
            receipt_url: row.receipt_url,
            approved_by: row.approved_by,
        })
    }
}

impl TryFrom<NoticeRow> for Notice {
    type Error = AppError;

    fn try_from(row: NoticeRow) -> Result<Self> {
        Ok(Notice {
            notice_type: parse_text("notices", &row.id, &row.notice_type)?,
            priority: parse_text("notices", &row.id, &row.priority)?,
            status: parse_text("notices", &row.id, &row.status)?,
            id: row.id,
            title: row.title,
            content: row.content,
            date: row.date,
        })
    }
}

fn convert_all<R, T>(rows: Vec<R>) -> Result<Vec<T>>
where
    T: TryFrom<R, Error = AppError>,
{
    rows.into_iter().map(T::try_from).collect()
}

/// Live store backed by a SQLite pool.
#[derive(Debug, Clone)]
pub struct SqliteStore {
    pool: SqlitePool,
}

impl SqliteStore {
    pub async fn connect(database_url: &str) -> Result<Self> {
        let opts = SqliteConnectOptions::from_str(database_url)?
            .create_if_missing(true)
            .journal_mode(SqliteJournalMode::Wal)
            .read_only(false)
            .foreign_keys(true)
            .busy_timeout(Duration::from_secs(5));

        let pool = SqlitePool::connect_with(opts).await.map_err(|e| {
            log::error!("Failed to open database {}: {}", database_url, e);
            AppError::DatabaseError(e)
        })?;
        Ok(Self::from_pool(pool))
    }

    pub fn from_pool(pool: SqlitePool) -> Self {
        SqliteStore { pool }
    }

    pub async fn migrate(&self) -> Result<()> {
        sqlx::migrate!().run(&self.pool).await?;
        log::info!("Database migrated successfully");
        Ok(())
    }
}

#[async_trait]
impl SocietyStore for SqliteStore {
    async fn list_members(&self) -> Result<Vec<Member>> {
        let rows = sqlx::query_as::<_, MemberRow>(&format!(
            "SELECT {} FROM members ORDER BY join_date DESC, id ASC",
            MEMBER_COLUMNS
        ))
        .fetch_all(&self.pool)
        .await?;
        convert_all(rows)
    }

    async fn members_by_status(&self, status: MemberStatus) -> Result<Vec<Member>> {
        let rows = sqlx::query_as::<_, MemberRow>(&format!(
            "SELECT {} FROM members WHERE status = $1 ORDER BY join_date DESC, id ASC",
            MEMBER_COLUMNS
        ))
        .bind(status.as_str())
        .fetch_all(&self.pool)
        .await?;
        convert_all(rows)
    }

    async fn get_member(&self, id: &str) -> Result<Option<Member>> {
        let row = sqlx::query_as::<_, MemberRow>(&format!(
            "SELECT {} FROM members WHERE id = $1",
            MEMBER_COLUMNS
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;
        row.map(Member::try_from).transpose()
    }

    async fn insert_member(&self, member: Member) -> Result<Member> {
        sqlx::query(&format!(
            "INSERT INTO members ({}) VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10)",
            MEMBER_COLUMNS
        ))
        .bind(&member.id)
        .bind(&member.name)
        .bind(&member.email)
        .bind(&member.flat_number)
        .bind(&member.phone)
        .bind(&member.address)
        .bind(member.monthly_amount.to_string())
        .bind(member.join_date)
        .bind(member.status.as_str())
        .bind(member.role.as_str())
        .execute(&self.pool)
        .await?;
        log::info!("Member created: {} ({})", member.id, member.email);
        Ok(member)
    }

    async fn update_member(&self, member: Member) -> Result<Member> {
        let result = sqlx::query(
            "UPDATE members SET name = $1, email = $2, flat_number = $3, phone = $4, address = $5, \
             monthly_amount = $6, join_date = $7, status = $8, role = $9 WHERE id = $10",
        )
        .bind(&member.name)
        .bind(&member.email)
        .bind(&member.flat_number)
        .bind(&member.phone)
        .bind(&member.address)
        .bind(member.monthly_amount.to_string())
        .bind(member.join_date)
        .bind(member.status.as_str())
        .bind(member.role.as_str())
        .bind(&member.id)
        .execute(&self.pool)
        .await?;
        if result.rows_affected() == 0 {
            return Err(AppError::NotFound(format!("member {}", member.id)));
        }
        log::info!("Member updated: {}", member.id);
        Ok(member)
    }

    async fn delete_member(&self, id: &str) -> Result<bool> {
        let mut tx = self.pool.begin().await?;
        sqlx::query("DELETE FROM bills WHERE member_id = $1")
            .bind(id)
            .execute(&mut *tx)
            .await?;
        let result = sqlx::query("DELETE FROM members WHERE id = $1")
            .bind(id)
            .execute(&mut *tx)
            .await?;
        tx.commit().await?;
        let deleted = result.rows_affected() > 0;
        if deleted {
            log::info!("Member with id {} deleted", id);
        }
        Ok(deleted)
    }

    async fn list_bills(&self) -> Result<Vec<Bill>> {
        let rows = sqlx::query_as::<_, BillRow>(&format!(
            "SELECT {} FROM bills ORDER BY year DESC, month DESC, member_id ASC",
            BILL_COLUMNS
        ))
        .fetch_all(&self.pool)
        .await?;
        convert_all(rows)
    }

    async fn bills_for_member(&self, member_id: &str) -> Result<Vec<Bill>> {
        let rows = sqlx::query_as::<_, BillRow>(&format!(
            "SELECT {} FROM bills WHERE member_id = $1 ORDER BY year DESC, month DESC",
            BILL_COLUMNS
        ))
        .bind(member_id)
        .fetch_all(&self.pool)
        .await?;
        convert_all(rows)
    }

    async fn bills_for_period(&self, period: BillingPeriod) -> Result<Vec<Bill>> {
        let rows = sqlx::query_as::<_, BillRow>(&format!(
            "SELECT {} FROM bills WHERE year = $1 AND month = $2 ORDER BY member_id ASC",
            BILL_COLUMNS
        ))
        .bind(period.year)
        .bind(i64::from(period.month))
        .fetch_all(&self.pool)
        .await?;
        convert_all(rows)
    }

    async fn get_bill(&self, id: &str) -> Result<Option<Bill>> {
        let row = sqlx::query_as::<_, BillRow>(&format!(
            "SELECT {} FROM bills WHERE id = $1",
            BILL_COLUMNS
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;
        row.map(Bill::try_from).transpose()
    }

    async fn insert_bills(&self, bills: Vec<Bill>) -> Result<Vec<Bill>> {
        let mut tx = self.pool.begin().await?;
        let mut inserted = Vec::with_capacity(bills.len());
        for bill in bills {
            // the primary key and the (member, year, month) unique index both guard duplicates
            let result = sqlx::query(&format!(
                "INSERT OR IGNORE INTO bills ({}) VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10)",
                BILL_COLUMNS
            ))
            .bind(&bill.id)
            .bind(&bill.member_id)
            .bind(i64::from(bill.month))
            .bind(bill.year)
            .bind(bill.amount.to_string())
            .bind(bill.due_date)
            .bind(bill.status.as_str())
            .bind(bill.payment_date)
            .bind(bill.payment_method.map(|m| m.as_str()))
            .bind(&bill.receipt_number)
            .execute(&mut *tx)
            .await?;
            if result.rows_affected() == 1 {
                inserted.push(bill);
            }
        }
        tx.commit().await?;
        Ok(inserted)
    }

    async fn transition_bill(&self, bill: &Bill, from: &[BillStatus]) -> Result<bool> {
        if from.is_empty() {
            return Ok(false);
        }
        let allowed: Vec<String> = (0..from.len()).map(|i| format!("${}", i + 8)).collect();
        let sql = format!(
            "UPDATE bills SET amount = $1, due_date = $2, status = $3, payment_date = $4, \
             payment_method = $5, receipt_number = $6 WHERE id = $7 AND status IN ({})",
            allowed.join(", ")
        );
        let mut query = sqlx::query(&sql)
            .bind(bill.amount.to_string())
            .bind(bill.due_date)
            .bind(bill.status.as_str())
            .bind(bill.payment_date)
            .bind(bill.payment_method.map(|m| m.as_str()))
            .bind(&bill.receipt_number)
            .bind(&bill.id);
        for status in from {
            query = query.bind(status.as_str());
        }
        let result = query.execute(&self.pool).await?;
        Ok(result.rows_affected() == 1)
    }

    async fn list_expenses(&self) -> Result<Vec<Expense>> {
        let rows = sqlx::query_as::<_, ExpenseRow>(&format!(
            "SELECT {} FROM expenses ORDER BY date DESC, id ASC",
            EXPENSE_COLUMNS
        ))
        .fetch_all(&self.pool)
        .await?;
        convert_all(rows)
    }

    async fn insert_expense(&self, expense: Expense) -> Result<Expense> {
        sqlx::query(&format!(
            "INSERT INTO expenses ({}) VALUES ($1, $2, $3, $4, $5, $6, $7, $8)",
            EXPENSE_COLUMNS
        ))
        .bind(&expense.id)
        .bind(expense.category.as_str())
        .bind(&expense.description)
        .bind(expense.amount.to_string())
        .bind(expense.date)
        .bind(&expense.vendor)
        .bind(&expense.receipt_url)
        .bind(&expense.approved_by)
        .execute(&self.pool)
        .await?;
        log::info!("Expense created: {} ({})", expense.id, expense.amount);
        Ok(expense)
    }

    async fn list_notices(&self) -> Result<Vec<Notice>> {
        let rows = sqlx::query_as::<_, NoticeRow>(&format!(
            "SELECT {} FROM notices ORDER BY date DESC, id ASC",
            NOTICE_COLUMNS
        ))
        .fetch_all(&self.pool)
        .await?;
        convert_all(rows)
    }

    async fn get_notice(&self, id: &str) -> Result<Option<Notice>> {
        let row = sqlx::query_as::<_, NoticeRow>(&format!(
            "SELECT {} FROM notices WHERE id = $1",
            NOTICE_COLUMNS
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;
        row.map(Notice::try_from).transpose()
    }

    async fn insert_notice(&self, notice: Notice) -> Result<Notice> {
        sqlx::query(&format!(
            "INSERT INTO notices ({}) VALUES ($1, $2, $3, $4, $5, $6, $7)",
            NOTICE_COLUMNS
        ))
        .bind(&notice.id)
        .bind(&notice.title)
        .bind(&notice.content)
        .bind(notice.notice_type.as_str())
        .bind(notice.priority.as_str())
        .bind(notice.date)
        .bind(notice.status.as_str())
        .execute(&self.pool)
        .await?;
        log::info!("Notice created: {}", notice.id);
        Ok(notice)
    }

    async fn update_notice(&self, notice: Notice) -> Result<Notice> {
        let result = sqlx::query(
            "UPDATE notices SET title = $1, content = $2, notice_type = $3, priority = $4, \
             date = $5, status = $6 WHERE id = $7",
        )
        .bind(&notice.title)
        .bind(&notice.content)
        .bind(notice.notice_type.as_str())
        .bind(notice.priority.as_str())
        .bind(notice.date)
        .bind(notice.status.as_str())
        .bind(&notice.id)
        .execute(&self.pool)
        .await?;
        if result.rows_affected() == 0 {
            return Err(AppError::NotFound(format!("notice {}", notice.id)));
        }
        Ok(notice)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::billing::{generate_monthly_bills, record_payment, PaymentRequest};
    use crate::structs::{PaymentMethod, Role};
    use rust_decimal_macros::dec;
    use sqlx::sqlite::SqlitePoolOptions;

    async fn memory_store() -> SqliteStore {
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .connect("sqlite::memory:")
            .await
            .unwrap();
        let store = SqliteStore::from_pool(pool);
        store.migrate().await.unwrap();
        store
    }

    fn member(id: &str, status: MemberStatus) -> Member {
        Member {
            id: id.to_string(),
            name: format!("Member {}", id),
            email: format!("member{}@example.com", id),
            flat_number: format!("A-{}", id),
            phone: "+91-9876543210".to_string(),
            address: None,
            monthly_amount: dec!(2500),
            join_date: NaiveDate::from_ymd_opt(2023, 1, 15).unwrap(),
            status,
            role: Role::Member,
        }
    }

    fn bill(member_id: &str, month: u32) -> Bill {
        let period = BillingPeriod::new(month, 2024).unwrap();
        Bill {
            id: Bill::bill_id(member_id, period),
            member_id: member_id.to_string(),
            month,
            year: 2024,
            amount: dec!(2500.50),
            due_date: period.due_date(),
            status: BillStatus::Pending,
            payment_date: None,
            payment_method: None,
            receipt_number: None,
        }
    }

    #[tokio::test]
    async fn member_round_trips_through_sqlite() {
        let store = memory_store().await;
        let mut m = member("1", MemberStatus::Pending);
        m.address = Some("Tower A".to_string());
        store.insert_member(m.clone()).await.unwrap();

        let loaded = store.get_member("1").await.unwrap().unwrap();
        assert_eq!(loaded, m);

        let pending = store
            .members_by_status(MemberStatus::Pending)
            .await
            .unwrap();
        assert_eq!(pending.len(), 1);
        assert!(store
            .members_by_status(MemberStatus::Active)
            .await
            .unwrap()
            .is_empty());
    }

    #[tokio::test]
    async fn update_of_missing_member_is_not_found() {
        let store = memory_store().await;
        let err = store
            .update_member(member("9", MemberStatus::Active))
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::NotFound(_)));
    }

    #[tokio::test]
    async fn insert_bills_skips_existing_ids() {
        let store = memory_store().await;
        store
            .insert_member(member("1", MemberStatus::Active))
            .await
            .unwrap();

        let first = store.insert_bills(vec![bill("1", 3)]).await.unwrap();
        assert_eq!(first.len(), 1);
        let second = store
            .insert_bills(vec![bill("1", 3), bill("1", 4)])
            .await
            .unwrap();
        assert_eq!(second.len(), 1);
        assert_eq!(second[0].month, 4);

        let all = store.list_bills().await.unwrap();
        assert_eq!(all.len(), 2);
        assert_eq!(all[0].month, 4);
        assert_eq!(all[1].amount, dec!(2500.50));
    }

    #[tokio::test]
    async fn paid_bill_fields_persist() {
        let store = memory_store().await;
        store
            .insert_member(member("1", MemberStatus::Active))
            .await
            .unwrap();
        store.insert_bills(vec![bill("1", 3)]).await.unwrap();

        let mut paid = store.get_bill("1-2024-3").await.unwrap().unwrap();
        paid.status = BillStatus::Paid;
        paid.payment_date = NaiveDate::from_ymd_opt(2024, 3, 10);
        paid.payment_method = Some(PaymentMethod::Cash);
        paid.receipt_number = Some("RC042".to_string());
        let open = [BillStatus::Pending, BillStatus::Overdue];
        assert!(store.transition_bill(&paid, &open).await.unwrap());

        let mut second = paid.clone();
        second.payment_method = Some(PaymentMethod::Online);
        second.receipt_number = Some("RC777".to_string());
        assert!(!store.transition_bill(&second, &open).await.unwrap());

        let period = BillingPeriod::new(3, 2024).unwrap();
        let loaded = store.bills_for_period(period).await.unwrap();
        assert_eq!(loaded, vec![paid]);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn concurrent_generation_and_payment_on_a_file_database() {
        let path = std::env::temp_dir().join(format!("society_ledger_{}.db", uuid::Uuid::new_v4()));
        let store = SqliteStore::connect(&format!("sqlite://{}", path.display()))
            .await
            .unwrap();
        store.migrate().await.unwrap();
        for id in ["1", "2", "3"] {
            store
                .insert_member(member(id, MemberStatus::Active))
                .await
                .unwrap();
        }
        let march = BillingPeriod::new(3, 2024).unwrap();

        let generate = || {
            let store = store.clone();
            tokio::spawn(async move { generate_monthly_bills(&store, march).await })
        };
        let (a, b) = tokio::join!(generate(), generate());
        let created = a.unwrap().unwrap().len() + b.unwrap().unwrap().len();
        assert_eq!(created, 3);
        assert_eq!(store.bills_for_period(march).await.unwrap().len(), 3);

        let today = NaiveDate::from_ymd_opt(2024, 3, 20).unwrap();
        let pay = |receipt: &str| {
            let store = store.clone();
            let request = PaymentRequest {
                method: Some(PaymentMethod::Cash),
                receipt_number: Some(receipt.to_string()),
            };
            tokio::spawn(async move { record_payment(&store, "2-2024-3", request, today).await })
        };
        let (first, second) = tokio::join!(pay("RC111"), pay("RC222"));
        let results = [first.unwrap(), second.unwrap()];
        let accepted: Vec<&Bill> = results.iter().filter_map(|r| r.as_ref().ok()).collect();
        assert_eq!(accepted.len(), 1);
        assert!(results
            .iter()
            .any(|r| matches!(r, Err(AppError::BillAlreadyPaid(_)))));
        let stored = store.get_bill("2-2024-3").await.unwrap().unwrap();
        assert_eq!(stored.receipt_number, accepted[0].receipt_number);

        store.pool.close().await;
        for suffix in ["", "-wal", "-shm"] {
            let _ = std::fs::remove_file(format!("{}{}", path.display(), suffix));
        }
    }

    #[tokio::test]
    async fn transition_of_missing_bill_writes_nothing() {
        let store = memory_store().await;
        let ghost = bill("9", 3);
        assert!(!store
            .transition_bill(&ghost, &[BillStatus::Pending])
            .await
            .unwrap());
    }

    #[tokio::test]
    async fn deleting_member_removes_their_bills() {
        let store = memory_store().await;
        store
            .insert_member(member("1", MemberStatus::Active))
            .await
            .unwrap();
        store
            .insert_member(member("2", MemberStatus::Active))
            .await
            .unwrap();
        store
            .insert_bills(vec![bill("1", 1), bill("1", 2), bill("2", 1)])
            .await
            .unwrap();

        assert!(store.delete_member("1").await.unwrap());
        assert!(!store.delete_member("1").await.unwrap());
        assert!(store.bills_for_member("1").await.unwrap().is_empty());
        assert_eq!(store.list_bills().await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn corrupt_amount_is_reported() {
        let store = memory_store().await;
        sqlx::query(
            "INSERT INTO expenses (id, category, description, amount, date, vendor, approved_by) \
             VALUES ('x', 'water', 'Tanker', 'lots', '2024-01-12', 'Aqua', 'Admin')",
        )
        .execute(&store.pool)
        .await
        .unwrap();

        let err = store.list_expenses().await.unwrap_err();
        assert!(matches!(err, AppError::CorruptRecord(_)));
    }
}
