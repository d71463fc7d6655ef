use actix_web::{
    delete,
    error::{JsonPayloadError, PathError, QueryPayloadError},
    get, post, put,
    web::{self, Data},
    HttpRequest, HttpResponse, Responder,
};
use serde::{Deserialize, Serialize};
use serde_json::json;

use crate::{
    billing::{self, BillFilter, PaymentRequest},
    errors::AppError,
    expenses::{self, ExpenseFilter, NewExpense},
    members::{self, MemberFilter, MemberUpdate, NewMember, ProfileUpdate, Registration},
    notices::{self, NewNotice},
    stats,
    structs::{BillingPeriod, Member},
    utils, AppState,
};

/// Header naming the caller's member id. The caller is authenticated upstream;
/// this service only authorizes by the member's role and status.
pub const USER_HEADER: &str = "X-User-Id";

async fn caller(request: &HttpRequest, state: &AppState) -> Result<Member, AppError> {
    let id = request
        .headers()
        .get(USER_HEADER)
        .and_then(|v| v.to_str().ok())
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .ok_or(AppError::Unauthorized)?;
    state.store.get_member(id).await?.ok_or_else(|| {
        log::warn!("Unknown caller {}", id);
        AppError::Unauthorized
    })
}

async fn active_member(request: &HttpRequest, state: &AppState) -> Result<Member, AppError> {
    let member = caller(request, state).await?;
    if !member.is_active() {
        return Err(AppError::Forbidden(format!(
            "membership is {}",
            member.status
        )));
    }
    Ok(member)
}

async fn admin(request: &HttpRequest, state: &AppState) -> Result<Member, AppError> {
    let member = active_member(request, state).await?;
    if !member.is_admin() {
        log::warn!("Member {} denied admin access to {}", member.id, request.path());
        return Err(AppError::Forbidden("admin access required".into()));
    }
    Ok(member)
}

#[get("/health")]
pub async fn health_handler() -> impl Responder {
    HttpResponse::Ok().json(json!({
        "status": "ok",
        "version": env!("CARGO_PKG_VERSION"),
    }))
}

/// Register handler
#[post("/register")]
pub async fn register_handler(
    web::Json(form): web::Json<Registration>,
    state: Data<AppState>,
) -> Result<impl Responder, AppError> {
    let member = members::register_member(
        state.store.as_ref(),
        form,
        state.config.standard_assessment,
        utils::today(),
    )
    .await?;
    Ok(HttpResponse::Created().json(member))
}

#[get("/me")]
pub async fn me_handler(
    request: HttpRequest,
    state: Data<AppState>,
) -> Result<impl Responder, AppError> {
    let member = caller(&request, &state).await?;
    Ok(HttpResponse::Ok().json(member))
}

#[put("/me")]
pub async fn update_me_handler(
    web::Json(form): web::Json<ProfileUpdate>,
    request: HttpRequest,
    state: Data<AppState>,
) -> Result<impl Responder, AppError> {
    let member = active_member(&request, &state).await?;
    let updated = members::update_profile(state.store.as_ref(), &member.id, form).await?;
    Ok(HttpResponse::Ok().json(updated))
}

#[get("/me/dashboard")]
pub async fn dashboard_handler(
    request: HttpRequest,
    state: Data<AppState>,
) -> Result<impl Responder, AppError> {
    let member = active_member(&request, &state).await?;
    let dashboard = stats::member_dashboard_for(state.store.as_ref(), &member).await?;
    Ok(HttpResponse::Ok().json(dashboard))
}

#[get("/me/bills")]
pub async fn my_bills_handler(
    request: HttpRequest,
    state: Data<AppState>,
) -> Result<impl Responder, AppError> {
    let member = active_member(&request, &state).await?;
    let bills = state.store.bills_for_member(&member.id).await?;
    let summary = stats::bill_summary(&bills);
    Ok(HttpResponse::Ok().json(json!({ "bills": bills, "summary": summary })))
}

#[post("/me/bills/{id}/pay")]
pub async fn pay_my_bill_handler(
    path: web::Path<String>,
    web::Json(form): web::Json<PaymentRequest>,
    request: HttpRequest,
    state: Data<AppState>,
) -> Result<impl Responder, AppError> {
    let member = active_member(&request, &state).await?;
    let bill = billing::pay_own_bill(
        state.store.as_ref(),
        &member,
        &path.into_inner(),
        form,
        utils::today(),
    )
    .await?;
    Ok(HttpResponse::Ok().json(bill))
}

#[get("/notices")]
pub async fn notices_handler(
    request: HttpRequest,
    state: Data<AppState>,
) -> Result<impl Responder, AppError> {
    let member = active_member(&request, &state).await?;
    let notices = notices::list_notices(state.store.as_ref(), member.is_admin()).await?;
    Ok(HttpResponse::Ok().json(notices))
}

#[get("/admin/stats")]
pub async fn stats_handler(
    request: HttpRequest,
    state: Data<AppState>,
) -> Result<impl Responder, AppError> {
    admin(&request, &state).await?;
    let stats = stats::society_stats_for(
        state.store.as_ref(),
        utils::today(),
        state.config.standard_assessment,
    )
    .await?;
    Ok(HttpResponse::Ok().json(stats))
}

#[get("/admin/members")]
pub async fn list_members_handler(
    web::Query(filter): web::Query<MemberFilter>,
    request: HttpRequest,
    state: Data<AppState>,
) -> Result<impl Responder, AppError> {
    admin(&request, &state).await?;
    let members = members::list_members(state.store.as_ref(), &filter).await?;
    Ok(HttpResponse::Ok().json(members))
}

#[post("/admin/members")]
pub async fn create_member_handler(
    web::Json(form): web::Json<NewMember>,
    request: HttpRequest,
    state: Data<AppState>,
) -> Result<impl Responder, AppError> {
    admin(&request, &state).await?;
    let member = members::create_member(
        state.store.as_ref(),
        form,
        state.config.standard_assessment,
        utils::today(),
    )
    .await?;
    Ok(HttpResponse::Created().json(member))
}

#[get("/admin/members/pending")]
pub async fn pending_members_handler(
    request: HttpRequest,
    state: Data<AppState>,
) -> Result<impl Responder, AppError> {
    admin(&request, &state).await?;
    let pending = members::pending_members(state.store.as_ref()).await?;
    Ok(HttpResponse::Ok().json(pending))
}

#[put("/admin/members/{id}")]
pub async fn update_member_handler(
    path: web::Path<String>,
    web::Json(form): web::Json<MemberUpdate>,
    request: HttpRequest,
    state: Data<AppState>,
) -> Result<impl Responder, AppError> {
    let acting = admin(&request, &state).await?;
    let id = path.into_inner();
    members::check_self_update(&acting, &id, &form)?;
    let member = members::update_member(state.store.as_ref(), &id, form).await?;
    Ok(HttpResponse::Ok().json(member))
}

#[delete("/admin/members/{id}")]
pub async fn delete_member_handler(
    path: web::Path<String>,
    request: HttpRequest,
    state: Data<AppState>,
) -> Result<impl Responder, AppError> {
    let acting = admin(&request, &state).await?;
    let id = path.into_inner();
    if acting.id == id {
        return Err(AppError::Validation("admins cannot delete themselves".into()));
    }
    members::delete_member(state.store.as_ref(), &id).await?;
    Ok(HttpResponse::NoContent().finish())
}

#[post("/admin/members/{id}/approve")]
pub async fn approve_member_handler(
    path: web::Path<String>,
    request: HttpRequest,
    state: Data<AppState>,
) -> Result<impl Responder, AppError> {
    admin(&request, &state).await?;
    let member = members::approve_member(state.store.as_ref(), &path.into_inner()).await?;
    Ok(HttpResponse::Ok().json(member))
}

#[post("/admin/members/{id}/reject")]
pub async fn reject_member_handler(
    path: web::Path<String>,
    request: HttpRequest,
    state: Data<AppState>,
) -> Result<impl Responder, AppError> {
    admin(&request, &state).await?;
    let member = members::reject_member(state.store.as_ref(), &path.into_inner()).await?;
    Ok(HttpResponse::Ok().json(member))
}

#[get("/admin/bills")]
pub async fn list_bills_handler(
    web::Query(filter): web::Query<BillFilter>,
    request: HttpRequest,
    state: Data<AppState>,
) -> Result<impl Responder, AppError> {
    admin(&request, &state).await?;
    let rows = billing::list_bills(state.store.as_ref(), &filter).await?;
    let summary = stats::bill_summary(rows.iter().map(|r| &r.bill));
    Ok(HttpResponse::Ok().json(json!({ "bills": rows, "summary": summary })))
}

#[derive(Deserialize)]
pub struct GenerateBills {
    month: u32,
    year: i32,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct GeneratedBills {
    generated: usize,
    message: String,
    bills: Vec<crate::structs::Bill>,
}

#[post("/admin/bills/generate")]
pub async fn generate_bills_handler(
    web::Json(form): web::Json<GenerateBills>,
    request: HttpRequest,
    state: Data<AppState>,
) -> Result<impl Responder, AppError> {
    admin(&request, &state).await?;
    let period = BillingPeriod::new(form.month, form.year)?;
    let bills = billing::generate_monthly_bills(state.store.as_ref(), period).await?;
    let message = if bills.is_empty() {
        format!("Bills for {} have already been generated", period)
    } else {
        format!("{} bills have been generated for {}", bills.len(), period)
    };
    Ok(HttpResponse::Ok().json(GeneratedBills {
        generated: bills.len(),
        message,
        bills,
    }))
}

#[post("/admin/bills/{id}/pay")]
pub async fn record_payment_handler(
    path: web::Path<String>,
    web::Json(form): web::Json<PaymentRequest>,
    request: HttpRequest,
    state: Data<AppState>,
) -> Result<impl Responder, AppError> {
    admin(&request, &state).await?;
    let bill = billing::record_payment(
        state.store.as_ref(),
        &path.into_inner(),
        form,
        utils::today(),
    )
    .await?;
    Ok(HttpResponse::Ok().json(bill))
}

#[post("/admin/bills/{id}/overdue")]
pub async fn mark_overdue_handler(
    path: web::Path<String>,
    request: HttpRequest,
    state: Data<AppState>,
) -> Result<impl Responder, AppError> {
    admin(&request, &state).await?;
    let bill = billing::mark_overdue(state.store.as_ref(), &path.into_inner()).await?;
    Ok(HttpResponse::Ok().json(bill))
}

#[get("/admin/expenses")]
pub async fn list_expenses_handler(
    web::Query(filter): web::Query<ExpenseFilter>,
    request: HttpRequest,
    state: Data<AppState>,
) -> Result<impl Responder, AppError> {
    admin(&request, &state).await?;
    let listing = expenses::list_expenses(state.store.as_ref(), &filter, utils::today()).await?;
    Ok(HttpResponse::Ok().json(listing))
}

#[post("/admin/expenses")]
pub async fn create_expense_handler(
    web::Json(form): web::Json<NewExpense>,
    request: HttpRequest,
    state: Data<AppState>,
) -> Result<impl Responder, AppError> {
    let approver = admin(&request, &state).await?;
    let expense =
        expenses::create_expense(state.store.as_ref(), form, &approver, utils::today()).await?;
    Ok(HttpResponse::Created().json(expense))
}

#[post("/admin/notices")]
pub async fn create_notice_handler(
    web::Json(form): web::Json<NewNotice>,
    request: HttpRequest,
    state: Data<AppState>,
) -> Result<impl Responder, AppError> {
    admin(&request, &state).await?;
    let notice = notices::create_notice(state.store.as_ref(), form, utils::today()).await?;
    Ok(HttpResponse::Created().json(notice))
}

#[post("/admin/notices/{id}/archive")]
pub async fn archive_notice_handler(
    path: web::Path<String>,
    request: HttpRequest,
    state: Data<AppState>,
) -> Result<impl Responder, AppError> {
    admin(&request, &state).await?;
    let notice = notices::archive_notice(state.store.as_ref(), &path.into_inner()).await?;
    Ok(HttpResponse::Ok().json(notice))
}

#[get("/admin/reports/{year}")]
pub async fn report_handler(
    path: web::Path<i32>,
    request: HttpRequest,
    state: Data<AppState>,
) -> Result<impl Responder, AppError> {
    admin(&request, &state).await?;
    let year = path.into_inner();
    BillingPeriod::check_year(year)?;
    let report = stats::financial_report_for(state.store.as_ref(), year).await?;
    Ok(HttpResponse::Ok().json(report))
}

fn json_error(err: JsonPayloadError, _: &HttpRequest) -> actix_web::Error {
    AppError::Validation(err.to_string()).into()
}

fn query_error(err: QueryPayloadError, _: &HttpRequest) -> actix_web::Error {
    AppError::Validation(err.to_string()).into()
}

fn path_error(err: PathError, _: &HttpRequest) -> actix_web::Error {
    AppError::Validation(err.to_string()).into()
}

pub fn configure(cfg: &mut web::ServiceConfig) {
    cfg.app_data(web::JsonConfig::default().error_handler(json_error))
        .app_data(web::QueryConfig::default().error_handler(query_error))
        .app_data(web::PathConfig::default().error_handler(path_error));
    cfg.service(health_handler)
        .service(register_handler)
        .service(me_handler)
        .service(update_me_handler)
        .service(dashboard_handler)
        .service(my_bills_handler)
        .service(pay_my_bill_handler)
        .service(notices_handler)
        .service(stats_handler)
        .service(list_members_handler)
        .service(create_member_handler)
        .service(pending_members_handler)
        .service(update_member_handler)
        .service(delete_member_handler)
        .service(approve_member_handler)
        .service(reject_member_handler)
        .service(list_bills_handler)
        .service(generate_bills_handler)
        .service(record_payment_handler)
        .service(mark_overdue_handler)
        .service(list_expenses_handler)
        .service(create_expense_handler)
        .service(create_notice_handler)
        .service(archive_notice_handler)
        .service(report_handler);
}
