//! Notification repository contracts and SQLite implementation.
//!
//! # Invariants
//! - Rows are created unread; the only mutation is flipping `is_read`.
//! - Inbox listing is newest first with insertion order as tie-breaker.

use crate::db::NOW_MS_SQL;
use crate::model::identity::UserId;
use crate::model::notification::{NewNotification, Notification, NotificationId, NotificationType};
use crate::repo::{ensure_connection_ready, parse_bool, parse_uuid, RepoError, RepoResult};
use rusqlite::{params, Connection, OptionalExtension, Row};
use uuid::Uuid;

const NOTIFICATION_SELECT_SQL: &str = "SELECT
    id,
    recipient_id,
    title,
    message,
    type,
    link,
    is_read,
    created_at
FROM notifications";

pub trait NotificationRepository {
    fn create_notification(&self, notification: &NewNotification) -> RepoResult<Notification>;
    fn get_notification(&self, id: NotificationId) -> RepoResult<Option<Notification>>;
    fn list_for_recipient(&self, recipient_id: UserId, limit: u32)
        -> RepoResult<Vec<Notification>>;
    fn unread_count(&self, recipient_id: UserId) -> RepoResult<u32>;
    fn mark_read(&self, id: NotificationId) -> RepoResult<()>;
    /// Marks every unread notification of the recipient; returns how many.
    fn mark_all_read(&self, recipient_id: UserId) -> RepoResult<u32>;
}

/// SQLite-backed notification repository.
pub struct SqliteNotificationRepository<'conn> {
    conn: &'conn Connection,
}

impl<'conn> SqliteNotificationRepository<'conn> {
    pub fn try_new(conn: &'conn Connection) -> RepoResult<Self> {
        ensure_connection_ready(conn)?;
        Ok(Self { conn })
    }
}

impl NotificationRepository for SqliteNotificationRepository<'_> {
    fn create_notification(&self, notification: &NewNotification) -> RepoResult<Notification> {
        let id = Uuid::new_v4();
        self.conn.execute(
            &format!(
                "INSERT INTO notifications (
                    id, recipient_id, title, message, type, link, is_read, created_at
                ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, 0, {NOW_MS_SQL});"
            ),
            params![
                id.to_string(),
                notification.recipient_id.to_string(),
                notification.title.as_str(),
                notification.message.as_str(),
                notification.kind.as_str(),
                notification.link.as_str(),
            ],
        )?;
        self.get_notification(id)?
            .ok_or_else(|| RepoError::not_found("notification", id))
    }

    fn get_notification(&self, id: NotificationId) -> RepoResult<Option<Notification>> {
        let row = self
            .conn
            .query_row(
                &format!("{NOTIFICATION_SELECT_SQL} WHERE id = ?1;"),
                [id.to_string()],
                |row| Ok(parse_notification_row(row)),
            )
            .optional()?;
        row.transpose()
    }

    fn list_for_recipient(
        &self,
        recipient_id: UserId,
        limit: u32,
    ) -> RepoResult<Vec<Notification>> {
        let mut stmt = self.conn.prepare(&format!(
            "{NOTIFICATION_SELECT_SQL}
             WHERE recipient_id = ?1
             ORDER BY created_at DESC, rowid DESC
             LIMIT ?2;"
        ))?;
        let mut rows = stmt.query(params![recipient_id.to_string(), i64::from(limit)])?;
        let mut notifications = Vec::new();
        while let Some(row) = rows.next()? {
            notifications.push(parse_notification_row(row)?);
        }
        Ok(notifications)
    }

    fn unread_count(&self, recipient_id: UserId) -> RepoResult<u32> {
        let count = self.conn.query_row(
            "SELECT COUNT(*) FROM notifications WHERE recipient_id = ?1 AND is_read = 0;",
            [recipient_id.to_string()],
            |row| row.get(0),
        )?;
        Ok(count)
    }

    fn mark_read(&self, id: NotificationId) -> RepoResult<()> {
        let changed = self.conn.execute(
            "UPDATE notifications SET is_read = 1 WHERE id = ?1;",
            [id.to_string()],
        )?;
        if changed == 0 {
            return Err(RepoError::not_found("notification", id));
        }
        Ok(())
    }

    fn mark_all_read(&self, recipient_id: UserId) -> RepoResult<u32> {
        let changed = self.conn.execute(
            "UPDATE notifications SET is_read = 1 WHERE recipient_id = ?1 AND is_read = 0;",
            [recipient_id.to_string()],
        )?;
        Ok(u32::try_from(changed).unwrap_or(u32::MAX))
    }
}

fn parse_notification_row(row: &Row<'_>) -> RepoResult<Notification> {
    let id: String = row.get("id")?;
    let recipient_id: String = row.get("recipient_id")?;
    let kind_text: String = row.get("type")?;
    let kind = NotificationType::parse(&kind_text).ok_or_else(|| {
        RepoError::InvalidData(format!("invalid notification type `{kind_text}`"))
    })?;
    Ok(Notification {
        id: parse_uuid(&id, "notifications.id")?,
        recipient_id: parse_uuid(&recipient_id, "notifications.recipient_id")?,
        title: row.get("title")?,
        message: row.get("message")?,
        kind,
        link: row.get("link")?,
        is_read: parse_bool(row.get("is_read")?, "notifications.is_read")?,
        created_at: row.get("created_at")?,
    })
}
