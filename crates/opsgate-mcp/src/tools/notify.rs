// crates/opsgate-mcp/src/tools/notify.rs
// ============================================================================
// Module: Notification Tools
// Description: Send, list, and acknowledge user notifications.
// Purpose: Drive the notifications table through purpose-built tools.
// Dependencies: opsgate-store, serde_json
// ============================================================================

//! ## Overview
//! Notifications are rows in the `notifications` table with a boolean `read`
//! flag. Sending creates an unread row; acknowledgment flips the flag, either
//! one row by id or every unread row for a user. The bulk acknowledgment
//! walks the store row by row, bounded by [`MARK_ALL_LIMIT`].

use std::sync::Arc;

use serde_json::Map;
use serde_json::json;

use crate::tools::RegistryError;
use crate::tools::ToolDefinition;
use crate::tools::ToolRegistry;
use crate::tools::arguments_object;
use crate::tools::object_schema;
use crate::tools::optional_str;
use crate::tools::require_str;
use crate::tools::require_value;
use crate::tools::string_prop;

// ============================================================================
// SECTION: Constants
// ============================================================================

/// Table backing the notification tools.
const NOTIFICATIONS_TABLE: &str = "notifications";

/// Ceiling on rows touched by one bulk acknowledgment.
const MARK_ALL_LIMIT: usize = 1000;

// ============================================================================
// SECTION: Registration
// ============================================================================

/// Registers the notification tool suite.
///
/// # Errors
///
/// Returns [`RegistryError::DuplicateTool`] on a name collision.
pub fn register(registry: &mut ToolRegistry) -> Result<(), RegistryError> {
    registry.register(send_notification_tool())?;
    registry.register(list_unread_tool())?;
    registry.register(mark_read_tool())?;
    registry.register(mark_all_read_tool())?;
    Ok(())
}

// ============================================================================
// SECTION: Tools
// ============================================================================

fn send_notification_tool() -> ToolDefinition {
    ToolDefinition::new(
        "send_notification",
        "Create an unread notification for a user.",
        object_schema(
            json!({
                "user_id": string_prop("Recipient user id."),
                "type": string_prop("Notification type tag."),
                "title": string_prop("Short title."),
                "message": string_prop("Notification body."),
                "link": string_prop("Optional in-app link."),
            }),
            &["user_id", "type", "title", "message"],
        ),
        Arc::new(|args, store| {
            Box::pin(async move {
                let args = arguments_object(args)?;
                let mut record = Map::new();
                record.insert("user_id".to_string(), require_value(&args, "user_id")?);
                record.insert("type".to_string(), json!(require_str(&args, "type")?));
                record.insert("title".to_string(), json!(require_str(&args, "title")?));
                record.insert("message".to_string(), json!(require_str(&args, "message")?));
                if let Some(link) = optional_str(&args, "link")? {
                    record.insert("link".to_string(), json!(link));
                }
                record.insert("read".to_string(), json!(false));
                let stored = store.create(NOTIFICATIONS_TABLE, record).await?;
                Ok(json!(stored))
            })
        }),
    )
}

fn list_unread_tool() -> ToolDefinition {
    ToolDefinition::new(
        "list_unread_notifications",
        "List a user's unread notifications, newest first.",
        object_schema(
            json!({"user_id": string_prop("Recipient user id.")}),
            &["user_id"],
        ),
        Arc::new(|args, store| {
            Box::pin(async move {
                let args = arguments_object(args)?;
                let mut filters = Map::new();
                filters.insert("user_id".to_string(), require_value(&args, "user_id")?);
                filters.insert("read".to_string(), json!(false));
                let records = store
                    .filter(NOTIFICATIONS_TABLE, &filters, None, Some(MARK_ALL_LIMIT))
                    .await?;
                let count = records.len();
                Ok(json!({"records": records, "count": count}))
            })
        }),
    )
}

fn mark_read_tool() -> ToolDefinition {
    ToolDefinition::new(
        "mark_notification_read",
        "Mark one notification as read.",
        object_schema(json!({"id": string_prop("Notification id.")}), &["id"]),
        Arc::new(|args, store| {
            Box::pin(async move {
                let args = arguments_object(args)?;
                let id = require_value(&args, "id")?;
                let mut updates = Map::new();
                updates.insert("read".to_string(), json!(true));
                let updated = store.update(NOTIFICATIONS_TABLE, &id, updates).await?;
                Ok(json!(updated))
            })
        }),
    )
}

fn mark_all_read_tool() -> ToolDefinition {
    ToolDefinition::new(
        "mark_all_notifications_read",
        "Mark every unread notification for a user as read.",
        object_schema(
            json!({"user_id": string_prop("Recipient user id.")}),
            &["user_id"],
        ),
        Arc::new(|args, store| {
            Box::pin(async move {
                let args = arguments_object(args)?;
                let mut filters = Map::new();
                filters.insert("user_id".to_string(), require_value(&args, "user_id")?);
                filters.insert("read".to_string(), json!(false));
                let unread = store
                    .filter(NOTIFICATIONS_TABLE, &filters, None, Some(MARK_ALL_LIMIT))
                    .await?;
                let mut updated = 0_u64;
                for row in unread {
                    let Some(id) = row.get("id") else { continue };
                    let mut updates = Map::new();
                    updates.insert("read".to_string(), json!(true));
                    store.update(NOTIFICATIONS_TABLE, id, updates).await?;
                    updated += 1;
                }
                Ok(json!({"updated": updated}))
            })
        }),
    )
}

// ============================================================================
// SECTION: Tests
// ============================================================================

#[cfg(test)]
mod tests {
    #![allow(
        clippy::panic,
        clippy::unwrap_used,
        clippy::expect_used,
        reason = "Test-only panic-based assertions are permitted."
    )]

    use std::sync::Arc;

    use serde_json::Value;
    use serde_json::json;

    use opsgate_store::InMemoryTableStore;
    use opsgate_store::Record;
    use opsgate_store::ScopedStore;

    use crate::tools::ToolError;
    use crate::tools::ToolRegistry;

    fn record(value: Value) -> Record {
        value.as_object().cloned().unwrap_or_default()
    }

    fn seeded_store() -> ScopedStore {
        let store = Arc::new(InMemoryTableStore::new());
        store
            .seed(
                "notifications",
                vec![
                    record(json!({"id": 1, "user_id": "u-1", "read": false, "title": "a"})),
                    record(json!({"id": 2, "user_id": "u-1", "read": true, "title": "b"})),
                    record(json!({"id": 3, "user_id": "u-2", "read": false, "title": "c"})),
                ],
            )
            .expect("seed");
        ScopedStore::service(store)
    }

    async fn invoke(name: &str, args: Value, store: ScopedStore) -> Result<Value, ToolError> {
        let registry = ToolRegistry::build().expect("catalogue");
        let tool = registry.get(name).expect("tool registered");
        tool.invoke(args, store).await
    }

    #[tokio::test]
    async fn send_creates_an_unread_row() {
        let store = seeded_store();
        let result = invoke(
            "send_notification",
            json!({
                "user_id": "u-3",
                "type": "task_assigned",
                "title": "New task",
                "message": "You were assigned a task.",
            }),
            store,
        )
        .await
        .expect("send");
        assert_eq!(result["read"], json!(false));
        assert_eq!(result["user_id"], json!("u-3"));
        assert!(result.get("link").is_none());
    }

    #[tokio::test]
    async fn unread_list_excludes_read_and_other_users() {
        let store = seeded_store();
        let result = invoke("list_unread_notifications", json!({"user_id": "u-1"}), store)
            .await
            .expect("list");
        assert_eq!(result["count"], json!(1));
        assert_eq!(result["records"][0]["id"], json!(1));
    }

    #[tokio::test]
    async fn mark_read_flips_one_row() {
        let store = seeded_store();
        let result = invoke("mark_notification_read", json!({"id": 1}), store.clone())
            .await
            .expect("mark");
        assert_eq!(result["read"], json!(true));

        let remaining = invoke("list_unread_notifications", json!({"user_id": "u-1"}), store)
            .await
            .expect("list");
        assert_eq!(remaining["count"], json!(0));
    }

    #[tokio::test]
    async fn mark_all_only_touches_the_requested_user() {
        let store = seeded_store();
        let result = invoke(
            "mark_all_notifications_read",
            json!({"user_id": "u-1"}),
            store.clone(),
        )
        .await
        .expect("mark all");
        assert_eq!(result["updated"], json!(1));

        let other = invoke("list_unread_notifications", json!({"user_id": "u-2"}), store)
            .await
            .expect("list");
        assert_eq!(other["count"], json!(1));
    }
}
