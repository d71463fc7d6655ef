use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::{
    errors::{AppError, Result},
    store::SocietyStore,
    structs::{Notice, NoticeStatus, NoticeType, Priority},
};

#[derive(Deserialize, Serialize, Debug, Clone)]
#[serde(rename_all = "camelCase")]
pub struct NewNotice {
    pub title: String,
    pub content: String,
    pub notice_type: NoticeType,
    pub priority: Option<Priority>,
    pub date: Option<NaiveDate>,
}

pub async fn create_notice(
    store: &dyn SocietyStore,
    input: NewNotice,
    today: NaiveDate,
) -> Result<Notice> {
    if input.title.trim().is_empty() || input.content.trim().is_empty() {
        return Err(AppError::Validation("title and content are required".into()));
    }
    let notice = Notice {
        id: Uuid::new_v4().to_string(),
        title: input.title.trim().to_owned(),
        content: input.content.trim().to_owned(),
        notice_type: input.notice_type,
        priority: input.priority.unwrap_or(Priority::Medium),
        date: input.date.unwrap_or(today),
        status: NoticeStatus::Active,
    };
    store.insert_notice(notice).await
}

pub async fn archive_notice(store: &dyn SocietyStore, id: &str) -> Result<Notice> {
    let notice = store
        .get_notice(id)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("notice {}", id)))?;
    if notice.status == NoticeStatus::Archived {
        return Err(AppError::InvalidTransition(format!(
            "notice {} is already archived",
            id
        )));
    }
    let archived = store
        .update_notice(Notice {
            status: NoticeStatus::Archived,
            ..notice
        })
        .await?;
    log::info!("Notice {} archived", id);
    Ok(archived)
}

/// Newest first. Members only ever see active notices.
pub async fn list_notices(store: &dyn SocietyStore, include_archived: bool) -> Result<Vec<Notice>> {
    Ok(store
        .list_notices()
        .await?
        .into_iter()
        .filter(|n| include_archived || n.status == NoticeStatus::Active)
        .collect())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::demo::DemoStore;

    fn today() -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 1, 20).unwrap()
    }

    #[tokio::test]
    async fn new_notice_is_active_and_listed_first() {
        let store = DemoStore::seeded(today());
        let input = NewNotice {
            title: "Lift shutdown".into(),
            content: "Lift B is closed for inspection on Sunday.".into(),
            notice_type: NoticeType::Emergency,
            priority: None,
            date: None,
        };
        let notice = create_notice(&store, input, today()).await.unwrap();
        assert_eq!(notice.priority, Priority::Medium);

        let listed = list_notices(&store, false).await.unwrap();
        assert_eq!(listed.len(), 4);
        assert_eq!(listed[0].id, notice.id);
    }

    #[tokio::test]
    async fn archived_notices_are_hidden_from_members() {
        let store = DemoStore::seeded(today());
        archive_notice(&store, "1").await.unwrap();

        assert_eq!(list_notices(&store, false).await.unwrap().len(), 2);
        assert_eq!(list_notices(&store, true).await.unwrap().len(), 3);
        assert!(matches!(
            archive_notice(&store, "1").await.unwrap_err(),
            AppError::InvalidTransition(_)
        ));
    }

    #[tokio::test]
    async fn blank_title_is_rejected() {
        let store = DemoStore::default();
        let input = NewNotice {
            title: " ".into(),
            content: "Body".into(),
            notice_type: NoticeType::Announcement,
            priority: Some(Priority::Low),
            date: None,
        };
        assert!(create_notice(&store, input, today()).await.is_err());
    }
}
