//! Monthly bill generation, payment recording and manual overdue assignment.

use std::collections::{HashMap, HashSet};

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::{
    errors::{AppError, Result},
    store::SocietyStore,
    structs::{Bill, BillStatus, BillingPeriod, Member, MemberStatus, PaymentMethod},
    utils::generate_receipt_number,
};

/// Bills that `active` members are missing for `period`. Members whose bill id
/// is already in `existing` are skipped.
pub fn plan_monthly_bills(
    active: &[Member],
    existing: &HashSet<String>,
    period: BillingPeriod,
) -> Vec<Bill> {
    active
        .iter()
        .filter(|m| m.is_active())
        .filter_map(|member| {
            let id = Bill::bill_id(&member.id, period);
            if existing.contains(&id) {
                return None;
            }
            Some(Bill {
                id,
                member_id: member.id.clone(),
                month: period.month,
                year: period.year,
                amount: member.monthly_amount,
                due_date: period.due_date(),
                status: BillStatus::Pending,
                payment_date: None,
                payment_method: None,
                receipt_number: None,
            })
        })
        .collect()
}

/// Creates the bills missing for `period` and returns only the new ones.
/// Running it again for the same period returns an empty list.
pub async fn generate_monthly_bills(
    store: &dyn SocietyStore,
    period: BillingPeriod,
) -> Result<Vec<Bill>> {
    let active = store.members_by_status(MemberStatus::Active).await?;
    let existing: HashSet<String> = store
        .bills_for_period(period)
        .await?
        .into_iter()
        .map(|b| b.id)
        .collect();

    let planned = plan_monthly_bills(&active, &existing, period);
    if planned.is_empty() {
        log::info!("No new bills for {}", period);
        return Ok(Vec::new());
    }
    let created = store.insert_bills(planned).await?;
    log::info!("Generated {} bills for {}", created.len(), period);
    Ok(created)
}

#[derive(Deserialize, Serialize, Debug, Clone, Default)]
#[serde(rename_all = "camelCase")]
pub struct PaymentRequest {
    pub method: Option<PaymentMethod>,
    pub receipt_number: Option<String>,
}

/// Marks `bill` paid on `today`. A blank receipt gets a generated one.
pub fn apply_payment(
    bill: &Bill,
    method: PaymentMethod,
    receipt_number: Option<String>,
    today: NaiveDate,
) -> Result<Bill> {
    match bill.status {
        BillStatus::Paid => Err(AppError::BillAlreadyPaid(bill.id.clone())),
        BillStatus::Pending | BillStatus::Overdue => {
            let receipt = receipt_number
                .map(|r| r.trim().to_owned())
                .filter(|r| !r.is_empty())
                .unwrap_or_else(generate_receipt_number);
            Ok(Bill {
                status: BillStatus::Paid,
                payment_date: Some(today),
                payment_method: Some(method),
                receipt_number: Some(receipt),
                ..bill.clone()
            })
        }
    }
}

async fn load_bill(store: &dyn SocietyStore, bill_id: &str) -> Result<Bill> {
    store
        .get_bill(bill_id)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("bill {}", bill_id)))
}

/// The error for a conditional write that found the bill already moved on.
async fn refused_transition(store: &dyn SocietyStore, bill_id: &str) -> AppError {
    match store.get_bill(bill_id).await {
        Ok(Some(bill)) if bill.is_paid() => AppError::BillAlreadyPaid(bill.id),
        Ok(Some(bill)) => {
            AppError::InvalidTransition(format!("bill {} is already {}", bill.id, bill.status))
        }
        Ok(None) => AppError::NotFound(format!("bill {}", bill_id)),
        Err(e) => e,
    }
}

/// Admin-recorded payment. Defaults to [`PaymentMethod::Manual`].
pub async fn record_payment(
    store: &dyn SocietyStore,
    bill_id: &str,
    request: PaymentRequest,
    today: NaiveDate,
) -> Result<Bill> {
    let bill = load_bill(store, bill_id).await?;
    let paid = apply_payment(
        &bill,
        request.method.unwrap_or(PaymentMethod::Manual),
        request.receipt_number,
        today,
    )
    .map_err(|e| {
        log::warn!("Refused payment for {}: {}", bill_id, e);
        e
    })?;
    if !store
        .transition_bill(&paid, &[BillStatus::Pending, BillStatus::Overdue])
        .await?
    {
        let err = refused_transition(store, bill_id).await;
        log::warn!("Refused payment for {}: {}", bill_id, err);
        return Err(err);
    }
    log::info!(
        "Payment recorded for bill {} (receipt {:?})",
        paid.id,
        paid.receipt_number
    );
    Ok(paid)
}

/// Self-service payment. Members can only pay their own bills; the method
/// defaults to [`PaymentMethod::Online`].
pub async fn pay_own_bill(
    store: &dyn SocietyStore,
    member: &Member,
    bill_id: &str,
    request: PaymentRequest,
    today: NaiveDate,
) -> Result<Bill> {
    let bill = load_bill(store, bill_id).await?;
    if bill.member_id != member.id {
        log::warn!("Member {} tried to pay bill {}", member.id, bill_id);
        return Err(AppError::Forbidden(format!(
            "bill {} belongs to another member",
            bill_id
        )));
    }
    let request = PaymentRequest {
        method: request.method.or(Some(PaymentMethod::Online)),
        ..request
    };
    record_payment(store, bill_id, request, today).await
}

/// Overdue is only ever assigned by an admin; nothing flips it from the due date.
pub fn apply_overdue(bill: &Bill) -> Result<Bill> {
    match bill.status {
        BillStatus::Pending => Ok(Bill {
            status: BillStatus::Overdue,
            ..bill.clone()
        }),
        BillStatus::Overdue => Err(AppError::InvalidTransition(format!(
            "bill {} is already overdue",
            bill.id
        ))),
        BillStatus::Paid => Err(AppError::BillAlreadyPaid(bill.id.clone())),
    }
}

pub async fn mark_overdue(store: &dyn SocietyStore, bill_id: &str) -> Result<Bill> {
    let bill = load_bill(store, bill_id).await?;
    let overdue = apply_overdue(&bill)?;
    if !store.transition_bill(&overdue, &[BillStatus::Pending]).await? {
        let err = refused_transition(store, bill_id).await;
        log::warn!("Refused overdue mark for {}: {}", bill_id, err);
        return Err(err);
    }
    log::info!("Bill {} marked overdue", bill_id);
    Ok(overdue)
}

#[derive(Deserialize, Serialize, Debug, Clone, Default)]
#[serde(rename_all = "camelCase")]
pub struct BillFilter {
    pub search: Option<String>,
    pub status: Option<BillStatus>,
    pub month: Option<u32>,
}

/// A bill with the owning member's name and flat, for admin listings.
#[derive(Serialize, Debug, Clone, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct BillWithMember {
    #[serde(flatten)]
    pub bill: Bill,
    pub month_name: &'static str,
    pub member_name: String,
    pub flat_number: String,
}

impl BillFilter {
    pub fn matches(&self, row: &BillWithMember) -> bool {
        let matches_search = match self.search.as_deref().map(str::trim) {
            None | Some("") => true,
            Some(term) => {
                let term = term.to_lowercase();
                row.member_name.to_lowercase().contains(&term)
                    || row.flat_number.to_lowercase().contains(&term)
                    || row.month_name.to_lowercase().contains(&term)
            }
        };
        let matches_status = self.status.map_or(true, |s| row.bill.status == s);
        let matches_month = self.month.map_or(true, |m| row.bill.month == m);
        matches_search && matches_status && matches_month
    }
}

pub async fn list_bills(store: &dyn SocietyStore, filter: &BillFilter) -> Result<Vec<BillWithMember>> {
    let members: HashMap<String, Member> = store
        .list_members()
        .await?
        .into_iter()
        .map(|m| (m.id.clone(), m))
        .collect();
    let bills = store.list_bills().await?;
    Ok(bills
        .into_iter()
        .map(|bill| {
            let member = members.get(&bill.member_id);
            BillWithMember {
                month_name: bill.month_name(),
                member_name: member.map(|m| m.name.clone()).unwrap_or_default(),
                flat_number: member.map(|m| m.flat_number.clone()).unwrap_or_default(),
                bill,
            }
        })
        .filter(|row| filter.matches(row))
        .collect())
}
