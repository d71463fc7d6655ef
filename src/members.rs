use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::{
    errors::{AppError, Result},
    store::SocietyStore,
    structs::{Member, MemberStatus, Role},
};

/// Admin entry of a member. Missing status means active, missing amount means
/// the society's standard assessment.
#[derive(Deserialize, Serialize, Debug, Clone, Default)]
#[serde(rename_all = "camelCase")]
pub struct NewMember {
    pub name: String,
    pub email: String,
    pub flat_number: String,
    #[serde(default)]
    pub phone: String,
    pub address: Option<String>,
    pub monthly_amount: Option<Decimal>,
    pub status: Option<MemberStatus>,
    pub role: Option<Role>,
}

#[derive(Deserialize, Serialize, Debug, Clone, Default)]
#[serde(rename_all = "camelCase")]
pub struct MemberUpdate {
    pub name: Option<String>,
    pub email: Option<String>,
    pub flat_number: Option<String>,
    pub phone: Option<String>,
    pub address: Option<String>,
    pub monthly_amount: Option<Decimal>,
    pub status: Option<MemberStatus>,
    pub role: Option<Role>,
}

/// Fields a member may change on their own profile.
#[derive(Deserialize, Serialize, Debug, Clone, Default)]
#[serde(rename_all = "camelCase")]
pub struct ProfileUpdate {
    pub name: Option<String>,
    pub phone: Option<String>,
    pub flat_number: Option<String>,
    pub address: Option<String>,
}

#[derive(Deserialize, Serialize, Debug, Clone, Default)]
#[serde(rename_all = "camelCase")]
pub struct Registration {
    pub name: String,
    pub email: String,
    #[serde(default)]
    pub flat_number: String,
    #[serde(default)]
    pub phone: String,
    pub password: String,
    pub confirm_password: String,
}

#[derive(Deserialize, Serialize, Debug, Clone, Default)]
#[serde(rename_all = "camelCase")]
pub struct MemberFilter {
    pub search: Option<String>,
    pub status: Option<MemberStatus>,
}

impl MemberFilter {
    pub fn matches(&self, member: &Member) -> bool {
        let matches_search = match self.search.as_deref().map(str::trim) {
            None | Some("") => true,
            Some(term) => {
                let term = term.to_lowercase();
                member.name.to_lowercase().contains(&term)
                    || member.flat_number.to_lowercase().contains(&term)
                    || member.email.to_lowercase().contains(&term)
            }
        };
        matches_search && self.status.map_or(true, |s| member.status == s)
    }
}

fn validate_identity(name: &str, email: &str) -> Result<()> {
    if name.trim().is_empty() {
        return Err(AppError::Validation("name is required".into()));
    }
    if !email.contains('@') {
        return Err(AppError::Validation("Invalid email address".into()));
    }
    Ok(())
}

fn validate_amount(amount: Decimal) -> Result<()> {
    if amount.is_sign_negative() {
        return Err(AppError::Validation(
            "monthly amount cannot be negative".into(),
        ));
    }
    Ok(())
}

/// Approval is the only way out of `Pending`, and nothing goes back to it.
pub fn check_status_change(from: MemberStatus, to: MemberStatus) -> Result<()> {
    match (from, to) {
        (a, b) if a == b => Ok(()),
        (MemberStatus::Pending, _) => Err(AppError::InvalidTransition(
            "pending members must be approved or rejected".into(),
        )),
        (_, MemberStatus::Pending) => Err(AppError::InvalidTransition(
            "members cannot be returned to pending".into(),
        )),
        (MemberStatus::Active, MemberStatus::Inactive)
        | (MemberStatus::Inactive, MemberStatus::Active) => Ok(()),
        _ => Err(AppError::InvalidTransition(format!(
            "cannot change status from {} to {}",
            from, to
        ))),
    }
}

/// Admins cannot demote or deactivate themselves, so the society never loses
/// its last admin through its own edit.
pub fn check_self_update(acting: &Member, id: &str, update: &MemberUpdate) -> Result<()> {
    if acting.id != id {
        return Ok(());
    }
    let role_change = update.role.is_some_and(|r| r != acting.role);
    let status_change = update.status.is_some_and(|s| s != acting.status);
    if role_change || status_change {
        return Err(AppError::Validation(
            "admins cannot change their own role or status".into(),
        ));
    }
    Ok(())
}

pub fn approve(member: &Member) -> Result<Member> {
    match member.status {
        MemberStatus::Pending => Ok(Member {
            status: MemberStatus::Active,
            ..member.clone()
        }),
        other => Err(AppError::InvalidTransition(format!(
            "member {} is {}, not pending",
            member.id, other
        ))),
    }
}

pub fn reject(member: &Member) -> Result<Member> {
    match member.status {
        MemberStatus::Pending => Ok(Member {
            status: MemberStatus::Inactive,
            ..member.clone()
        }),
        other => Err(AppError::InvalidTransition(format!(
            "member {} is {}, not pending",
            member.id, other
        ))),
    }
}

pub async fn get_member(store: &dyn SocietyStore, id: &str) -> Result<Member> {
    store
        .get_member(id)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("member {}", id)))
}

async fn ensure_email_free(store: &dyn SocietyStore, email: &str, except: Option<&str>) -> Result<()> {
    let taken = store
        .list_members()
        .await?
        .iter()
        .any(|m| m.email.eq_ignore_ascii_case(email) && Some(m.id.as_str()) != except);
    if taken {
        return Err(AppError::Validation(format!(
            "email {} is already registered",
            email
        )));
    }
    Ok(())
}

pub async fn approve_member(store: &dyn SocietyStore, id: &str) -> Result<Member> {
    let member = get_member(store, id).await?;
    let approved = approve(&member).map_err(|e| {
        log::warn!("Refused approval of {}: {}", id, e);
        e
    })?;
    let approved = store.update_member(approved).await?;
    log::info!("Member {} approved", id);
    Ok(approved)
}

pub async fn reject_member(store: &dyn SocietyStore, id: &str) -> Result<Member> {
    let member = get_member(store, id).await?;
    let rejected = reject(&member).map_err(|e| {
        log::warn!("Refused rejection of {}: {}", id, e);
        e
    })?;
    let rejected = store.update_member(rejected).await?;
    log::info!("Member {} rejected", id);
    Ok(rejected)
}

pub async fn pending_members(store: &dyn SocietyStore) -> Result<Vec<Member>> {
    store.members_by_status(MemberStatus::Pending).await
}

pub async fn list_members(store: &dyn SocietyStore, filter: &MemberFilter) -> Result<Vec<Member>> {
    Ok(store
        .list_members()
        .await?
        .into_iter()
        .filter(|m| filter.matches(m))
        .collect())
}

pub async fn create_member(
    store: &dyn SocietyStore,
    input: NewMember,
    standard_assessment: Decimal,
    today: NaiveDate,
) -> Result<Member> {
    validate_identity(&input.name, &input.email)?;
    let monthly_amount = input.monthly_amount.unwrap_or(standard_assessment);
    validate_amount(monthly_amount)?;
    let status = input.status.unwrap_or(MemberStatus::Active);
    if status == MemberStatus::Pending {
        return Err(AppError::Validation(
            "members entered by an admin cannot be pending".into(),
        ));
    }
    let email = input.email.trim().to_lowercase();
    ensure_email_free(store, &email, None).await?;

    let member = Member {
        id: Uuid::new_v4().to_string(),
        name: input.name.trim().to_owned(),
        email,
        flat_number: input.flat_number.trim().to_owned(),
        phone: input.phone.trim().to_owned(),
        address: input.address,
        monthly_amount,
        join_date: today,
        status,
        role: input.role.unwrap_or(Role::Member),
    };
    store.insert_member(member).await
}

/// Self-registration. The new profile waits in `Pending` for an admin.
pub async fn register_member(
    store: &dyn SocietyStore,
    registration: Registration,
    standard_assessment: Decimal,
    today: NaiveDate,
) -> Result<Member> {
    if registration.password.is_empty() || registration.confirm_password.is_empty() {
        return Err(AppError::Validation("All fields are required".into()));
    }
    if registration.password != registration.confirm_password {
        return Err(AppError::Validation("Passwords do not match".into()));
    }
    validate_identity(&registration.name, &registration.email)?;
    let email = registration.email.trim().to_lowercase();
    ensure_email_free(store, &email, None).await?;

    let member = Member {
        id: Uuid::new_v4().to_string(),
        name: registration.name.trim().to_owned(),
        email,
        flat_number: registration.flat_number.trim().to_owned(),
        phone: registration.phone.trim().to_owned(),
        address: None,
        monthly_amount: standard_assessment,
        join_date: today,
        status: MemberStatus::Pending,
        role: Role::Member,
    };
    let member = store.insert_member(member).await?;
    log::info!("Registration pending approval: {}", member.id);
    Ok(member)
}

pub async fn update_member(
    store: &dyn SocietyStore,
    id: &str,
    update: MemberUpdate,
) -> Result<Member> {
    let mut member = get_member(store, id).await?;
    if let Some(status) = update.status {
        check_status_change(member.status, status)?;
        member.status = status;
    }
    if let Some(name) = update.name {
        member.name = name.trim().to_owned();
    }
    if let Some(email) = update.email {
        let email = email.trim().to_lowercase();
        if email != member.email {
            ensure_email_free(store, &email, Some(id)).await?;
        }
        member.email = email;
    }
    if let Some(flat_number) = update.flat_number {
        member.flat_number = flat_number.trim().to_owned();
    }
    if let Some(phone) = update.phone {
        member.phone = phone.trim().to_owned();
    }
    if update.address.is_some() {
        member.address = update.address;
    }
    if let Some(amount) = update.monthly_amount {
        validate_amount(amount)?;
        member.monthly_amount = amount;
    }
    if let Some(role) = update.role {
        member.role = role;
    }
    validate_identity(&member.name, &member.email)?;
    store.update_member(member).await
}

pub async fn update_profile(
    store: &dyn SocietyStore,
    id: &str,
    update: ProfileUpdate,
) -> Result<Member> {
    let mut member = get_member(store, id).await?;
    if let Some(name) = update.name {
        member.name = name.trim().to_owned();
    }
    if let Some(phone) = update.phone {
        member.phone = phone.trim().to_owned();
    }
    if let Some(flat_number) = update.flat_number {
        member.flat_number = flat_number.trim().to_owned();
    }
    if update.address.is_some() {
        member.address = update.address;
    }
    validate_identity(&member.name, &member.email)?;
    store.update_member(member).await
}

pub async fn delete_member(store: &dyn SocietyStore, id: &str) -> Result<()> {
    if !store.delete_member(id).await? {
        return Err(AppError::NotFound(format!("member {}", id)));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::demo::DemoStore;
    use rust_decimal_macros::dec;

    fn today() -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 3, 1).unwrap()
    }

    fn registration(email: &str) -> Registration {
        Registration {
            name: "Kavya Rao".into(),
            email: email.into(),
            flat_number: "D-110".into(),
            phone: "+91-9000000000".into(),
            password: "correct horse".into(),
            confirm_password: "correct horse".into(),
        }
    }

    #[tokio::test]
    async fn approving_pending_member_activates_and_clears_queue() {
        let store = DemoStore::default();
        let member = register_member(&store, registration("kavya@example.com"), dec!(2500), today())
            .await
            .unwrap();
        assert_eq!(member.status, MemberStatus::Pending);
        assert_eq!(pending_members(&store).await.unwrap().len(), 1);

        let approved = approve_member(&store, &member.id).await.unwrap();
        assert_eq!(approved.status, MemberStatus::Active);
        assert!(pending_members(&store).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn rejecting_pending_member_deactivates() {
        let store = DemoStore::default();
        let member = register_member(&store, registration("kavya@example.com"), dec!(2500), today())
            .await
            .unwrap();
        let rejected = reject_member(&store, &member.id).await.unwrap();
        assert_eq!(rejected.status, MemberStatus::Inactive);
        assert!(pending_members(&store).await.unwrap().is_empty());

        let err = approve_member(&store, &member.id).await.unwrap_err();
        assert!(matches!(err, AppError::InvalidTransition(_)));
    }

    #[tokio::test]
    async fn mismatched_passwords_block_registration() {
        let store = DemoStore::default();
        let mut form = registration("kavya@example.com");
        form.confirm_password = "something else".into();
        let err = register_member(&store, form, dec!(2500), today())
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::Validation(_)));
        assert!(store.list_members().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn duplicate_email_is_rejected() {
        let store = DemoStore::default();
        register_member(&store, registration("kavya@example.com"), dec!(2500), today())
            .await
            .unwrap();
        let err = register_member(&store, registration("KAVYA@example.com"), dec!(2500), today())
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::Validation(_)));
    }

    #[tokio::test]
    async fn admin_entry_defaults_to_active_and_standard_amount() {
        let store = DemoStore::default();
        let input = NewMember {
            name: "Arjun Mehta".into(),
            email: "Arjun@Example.com".into(),
            flat_number: "E-12".into(),
            ..Default::default()
        };
        let member = create_member(&store, input, dec!(2500), today()).await.unwrap();
        assert_eq!(member.status, MemberStatus::Active);
        assert_eq!(member.monthly_amount, dec!(2500));
        assert_eq!(member.email, "arjun@example.com");
        assert_eq!(member.join_date, today());
    }

    #[tokio::test]
    async fn admin_entry_cannot_be_pending() {
        let store = DemoStore::default();
        let input = NewMember {
            name: "Arjun Mehta".into(),
            email: "arjun@example.com".into(),
            status: Some(MemberStatus::Pending),
            ..Default::default()
        };
        assert!(create_member(&store, input, dec!(2500), today())
            .await
            .is_err());
    }

    #[test]
    fn status_changes_follow_the_workflow() {
        use MemberStatus::*;
        assert!(check_status_change(Active, Inactive).is_ok());
        assert!(check_status_change(Inactive, Active).is_ok());
        assert!(check_status_change(Active, Active).is_ok());
        assert!(check_status_change(Active, Pending).is_err());
        assert!(check_status_change(Inactive, Pending).is_err());
        assert!(check_status_change(Pending, Active).is_err());
    }

    #[tokio::test]
    async fn admin_cannot_demote_or_deactivate_themselves() {
        let store = DemoStore::seeded(today());
        let admin = get_member(&store, "1").await.unwrap();

        let demote = MemberUpdate {
            role: Some(Role::Member),
            ..Default::default()
        };
        assert!(matches!(
            check_self_update(&admin, "1", &demote),
            Err(AppError::Validation(_))
        ));
        let deactivate = MemberUpdate {
            status: Some(MemberStatus::Inactive),
            ..Default::default()
        };
        assert!(check_self_update(&admin, "1", &deactivate).is_err());

        let rename = MemberUpdate {
            name: Some("Rajesh K.".into()),
            role: Some(Role::Admin),
            ..Default::default()
        };
        assert!(check_self_update(&admin, "1", &rename).is_ok());
        assert!(check_self_update(&admin, "2", &demote).is_ok());
    }

    #[tokio::test]
    async fn update_can_deactivate_but_not_reset_to_pending() {
        let store = DemoStore::seeded(today());
        let update = MemberUpdate {
            status: Some(MemberStatus::Inactive),
            monthly_amount: Some(dec!(3000)),
            ..Default::default()
        };
        let member = update_member(&store, "2", update).await.unwrap();
        assert_eq!(member.status, MemberStatus::Inactive);
        assert_eq!(member.monthly_amount, dec!(3000));

        let back = MemberUpdate {
            status: Some(MemberStatus::Pending),
            ..Default::default()
        };
        assert!(matches!(
            update_member(&store, "2", back).await.unwrap_err(),
            AppError::InvalidTransition(_)
        ));
    }

    #[tokio::test]
    async fn profile_update_leaves_admin_fields_alone() {
        let store = DemoStore::seeded(today());
        let update = ProfileUpdate {
            phone: Some("+91-9111111111".into()),
            address: Some("Tower B".into()),
            ..Default::default()
        };
        let member = update_profile(&store, "3", update).await.unwrap();
        assert_eq!(member.phone, "+91-9111111111");
        assert_eq!(member.address.as_deref(), Some("Tower B"));
        assert_eq!(member.status, MemberStatus::Active);
        assert_eq!(member.role, Role::Member);
    }

    #[tokio::test]
    async fn search_matches_name_flat_and_email() {
        let store = DemoStore::seeded(today());
        let by_flat = MemberFilter {
            search: Some("c-3".into()),
            status: None,
        };
        let found = list_members(&store, &by_flat).await.unwrap();
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].name, "Amit Singh");

        let by_email = MemberFilter {
            search: Some("PRIYA.SHARMA".into()),
            status: Some(MemberStatus::Active),
        };
        assert_eq!(list_members(&store, &by_email).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn deleting_unknown_member_is_not_found() {
        let store = DemoStore::default();
        assert!(matches!(
            delete_member(&store, "ghost").await.unwrap_err(),
            AppError::NotFound(_)
        ));
    }
}
