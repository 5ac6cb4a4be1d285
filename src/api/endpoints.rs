//! Typed REST surface of the backend.
//!
//! One method per endpoint. Responses arrive wrapped in small envelopes
//! (`{"event": ...}`, `{"events": [...]}`) that are unwrapped here.

use serde::Deserialize;
use serde_json::json;
use url::form_urlencoded;

use super::client::ApiClient;
use super::error::ApiError;
use super::types::{
  AttendanceRecord, AttendanceSummary, CheckIn, EventFilters, EventItem, EventsSummary,
  NewEvent, NewNotification, NewPrayer, NewUser, NotificationItem, Page, PrayerComment,
  PrayerItem, PrayerToggle, PrayerUsers, RsvpToggle, SyncPayloadItem, SyncResult, User,
};

#[derive(Debug, Deserialize)]
struct UserEnvelope {
  user: User,
}

#[derive(Debug, Deserialize)]
struct UsersEnvelope {
  #[serde(default)]
  users: Vec<User>,
}

#[derive(Debug, Deserialize)]
struct RecordEnvelope {
  record: AttendanceRecord,
}

#[derive(Debug, Deserialize)]
struct LatestRecordEnvelope {
  #[serde(default)]
  record: Option<AttendanceRecord>,
}

#[derive(Debug, Deserialize)]
struct RecordsEnvelope {
  #[serde(default)]
  records: Vec<AttendanceRecord>,
}

#[derive(Debug, Deserialize)]
struct EventEnvelope {
  event: EventItem,
}

#[derive(Debug, Deserialize)]
struct EventsEnvelope {
  #[serde(default)]
  events: Vec<EventItem>,
}

#[derive(Debug, Deserialize)]
struct PrayerEnvelope {
  prayer: PrayerItem,
}

#[derive(Debug, Deserialize)]
struct PrayersEnvelope {
  #[serde(default)]
  prayers: Vec<PrayerItem>,
}

#[derive(Debug, Deserialize)]
struct CommentEnvelope {
  comment: PrayerComment,
}

#[derive(Debug, Deserialize)]
struct CommentsEnvelope {
  #[serde(default)]
  comments: Vec<PrayerComment>,
}

#[derive(Debug, Deserialize)]
struct NotificationEnvelope {
  notification: NotificationItem,
}

#[derive(Debug, Deserialize)]
struct NotificationsEnvelope {
  #[serde(default)]
  notifications: Vec<NotificationItem>,
}

#[derive(Debug, Deserialize)]
struct DeletedFlag {
  #[serde(default)]
  deleted: bool,
}

#[derive(Debug, Deserialize)]
struct DeletedCount {
  #[serde(default)]
  deleted: u64,
}

#[derive(Debug, Deserialize)]
struct UpdatedCount {
  #[serde(default)]
  updated: u64,
}

#[derive(Debug, Deserialize)]
struct MessageEnvelope {
  #[serde(default)]
  message: String,
}

/// Build a query string from optional parameters.
///
/// Absent values and values that are empty after trimming are skipped.
/// Returns `""` when nothing remains, otherwise `?a=b&c=d` (form-encoded).
pub fn build_query(params: &[(&str, Option<String>)]) -> String {
  let mut serializer = form_urlencoded::Serializer::new(String::new());
  let mut any = false;

  for (name, value) in params {
    let Some(value) = value else { continue };
    let text = value.trim();
    if text.is_empty() {
      continue;
    }
    serializer.append_pair(name, text);
    any = true;
  }

  if any {
    format!("?{}", serializer.finish())
  } else {
    String::new()
  }
}

fn page_query(page: Page) -> String {
  build_query(&[
    ("limit", page.limit.map(|v| v.to_string())),
    ("offset", page.offset.map(|v| v.to_string())),
  ])
}

impl ApiClient {
  // -- session --

  /// Admin login; the session cookie lands in the client's jar.
  pub async fn admin_login(&self, email: &str, password: &str) -> Result<User, ApiError> {
    let body = json!({ "email": email, "password": password });
    let data: UserEnvelope = self.post("/auth/admin/login", &body).await?;
    Ok(data.user)
  }

  /// Regular member login.
  pub async fn login(&self, email: &str, password: &str) -> Result<User, ApiError> {
    let body = json!({ "email": email, "password": password });
    let data: UserEnvelope = self.post("/auth/login", &body).await?;
    Ok(data.user)
  }

  pub async fn logout(&self) -> Result<(), ApiError> {
    let _: serde::de::IgnoredAny = self.post_empty("/auth/logout").await?;
    Ok(())
  }

  pub async fn me(&self) -> Result<User, ApiError> {
    let data: UserEnvelope = self.get("/auth/me").await?;
    Ok(data.user)
  }

  /// Returns the backend's confirmation message.
  pub async fn forgot_password(&self, email: &str) -> Result<String, ApiError> {
    let data: MessageEnvelope = self
      .post("/auth/forgot-password", &json!({ "email": email }))
      .await?;
    Ok(data.message)
  }

  pub async fn reset_password(&self, token: &str, password: &str) -> Result<User, ApiError> {
    let body = json!({ "token": token, "password": password });
    let data: UserEnvelope = self.post("/auth/reset-password", &body).await?;
    Ok(data.user)
  }

  // -- attendance --

  pub async fn attendance_summary(&self) -> Result<AttendanceSummary, ApiError> {
    self.get("/admin/attendance/summary").await
  }

  /// Latest check-in of the session user, if any.
  pub async fn attendance_latest(&self) -> Result<Option<AttendanceRecord>, ApiError> {
    let data: LatestRecordEnvelope = self.get("/attendance/latest").await?;
    Ok(data.record)
  }

  pub async fn attendance_records(&self) -> Result<Vec<AttendanceRecord>, ApiError> {
    let data: RecordsEnvelope = self.get("/attendance").await?;
    Ok(data.records)
  }

  pub async fn attendance_record(&self, id: &str) -> Result<AttendanceRecord, ApiError> {
    let data: RecordEnvelope = self.get(&format!("/attendance/{}", id)).await?;
    Ok(data.record)
  }

  pub async fn check_in(&self, payload: &CheckIn) -> Result<AttendanceRecord, ApiError> {
    let data: RecordEnvelope = self.post("/attendance/check-in", payload).await?;
    Ok(data.record)
  }

  // -- users --

  pub async fn users(&self) -> Result<Vec<User>, ApiError> {
    let data: UsersEnvelope = self.get("/admin/users").await?;
    Ok(data.users)
  }

  pub async fn create_user(&self, payload: &NewUser) -> Result<User, ApiError> {
    let data: UserEnvelope = self.post("/auth/signup", payload).await?;
    Ok(data.user)
  }

  pub async fn update_user_email(&self, user_id: &str, email: &str) -> Result<User, ApiError> {
    let data: UserEnvelope = self
      .patch(
        &format!("/admin/users/{}/email", user_id),
        &json!({ "email": email }),
      )
      .await?;
    Ok(data.user)
  }

  // -- events --

  pub async fn events_summary(&self) -> Result<EventsSummary, ApiError> {
    self.get("/admin/events/summary").await
  }

  pub async fn events(&self, filters: &EventFilters) -> Result<Vec<EventItem>, ApiError> {
    let qs = build_query(&[
      ("search", filters.search.clone()),
      ("category", filters.category.clone()),
    ]);
    let data: EventsEnvelope = self.get(&format!("/events{}", qs)).await?;
    Ok(data.events)
  }

  pub async fn event(&self, id: &str) -> Result<EventItem, ApiError> {
    let data: EventEnvelope = self.get(&format!("/events/{}", id)).await?;
    Ok(data.event)
  }

  /// Toggle the session user's RSVP; returns the updated event.
  pub async fn toggle_event_rsvp(&self, id: &str) -> Result<RsvpToggle, ApiError> {
    self.post_empty(&format!("/events/{}/rsvp", id)).await
  }

  pub async fn create_event(&self, payload: &NewEvent) -> Result<EventItem, ApiError> {
    let data: EventEnvelope = self.post("/events", payload).await?;
    Ok(data.event)
  }

  // -- prayers --

  pub async fn prayers(&self, category: Option<&str>) -> Result<Vec<PrayerItem>, ApiError> {
    let qs = build_query(&[("category", category.map(String::from))]);
    let data: PrayersEnvelope = self.get(&format!("/prayers{}", qs)).await?;
    Ok(data.prayers)
  }

  pub async fn toggle_prayer(&self, id: &str) -> Result<PrayerToggle, ApiError> {
    self.post_empty(&format!("/prayers/{}/pray", id)).await
  }

  pub async fn create_prayer(&self, payload: &NewPrayer) -> Result<PrayerItem, ApiError> {
    let data: PrayerEnvelope = self.post("/prayers", payload).await?;
    Ok(data.prayer)
  }

  pub async fn prayer_comments(
    &self,
    prayer_id: &str,
    page: Page,
  ) -> Result<Vec<PrayerComment>, ApiError> {
    let path = format!("/prayers/{}/comments{}", prayer_id, page_query(page));
    let data: CommentsEnvelope = self.get(&path).await?;
    Ok(data.comments)
  }

  pub async fn add_prayer_comment(
    &self,
    prayer_id: &str,
    body: &str,
  ) -> Result<PrayerComment, ApiError> {
    let data: CommentEnvelope = self
      .post(
        &format!("/prayers/{}/comments", prayer_id),
        &json!({ "body": body }),
      )
      .await?;
    Ok(data.comment)
  }

  /// Returns whether the backend reported a deletion.
  pub async fn delete_prayer_comment(
    &self,
    prayer_id: &str,
    comment_id: &str,
  ) -> Result<bool, ApiError> {
    let data: DeletedFlag = self
      .delete(&format!("/prayers/{}/comments/{}", prayer_id, comment_id))
      .await?;
    Ok(data.deleted)
  }

  pub async fn praying_users(&self, prayer_id: &str, page: Page) -> Result<PrayerUsers, ApiError> {
    self
      .get(&format!("/prayers/{}/prayers{}", prayer_id, page_query(page)))
      .await
  }

  // -- notifications --

  pub async fn notifications(&self) -> Result<Vec<NotificationItem>, ApiError> {
    let data: NotificationsEnvelope = self.get("/notifications").await?;
    Ok(data.notifications)
  }

  /// Create a notification for the session user (test data).
  pub async fn seed_notification(
    &self,
    payload: &NewNotification,
  ) -> Result<NotificationItem, ApiError> {
    let data: NotificationEnvelope = self.post("/notifications", payload).await?;
    Ok(data.notification)
  }

  pub async fn mark_notification_read(&self, id: &str) -> Result<NotificationItem, ApiError> {
    let data: NotificationEnvelope = self
      .post_empty(&format!("/notifications/{}/read", id))
      .await?;
    Ok(data.notification)
  }

  /// Returns the number of notifications updated.
  pub async fn mark_all_notifications_read(&self) -> Result<u64, ApiError> {
    let data: UpdatedCount = self.post_empty("/notifications/read-all").await?;
    Ok(data.updated)
  }

  pub async fn delete_notification(&self, id: &str) -> Result<bool, ApiError> {
    let data: DeletedFlag = self.delete(&format!("/notifications/{}", id)).await?;
    Ok(data.deleted)
  }

  /// Returns the number of notifications deleted.
  pub async fn clear_notifications(&self) -> Result<u64, ApiError> {
    let data: DeletedCount = self.delete("/notifications").await?;
    Ok(data.deleted)
  }

  /// Backend health report, passed through as JSON.
  pub async fn health(&self) -> Result<serde_json::Value, ApiError> {
    self.get("/health").await
  }

  // -- sync --

  pub async fn sync(&self, items: &[SyncPayloadItem]) -> Result<SyncResult, ApiError> {
    self.post("/sync", &json!({ "items": items })).await
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::api::test_server;
  use axum::extract::{Path, Query, RawQuery};
  use axum::http::StatusCode;
  use axum::routing::{get, patch, post};
  use axum::{Json, Router};
  use serde_json::Value;
  use std::collections::HashMap;

  fn event_json(id: &str) -> Value {
    json!({"id": id, "title": "Picnic", "startTime": "2024-06-01T10:00:00Z"})
  }

  #[test]
  fn test_build_query_skips_blank_values() {
    assert_eq!(build_query(&[]), "");
    assert_eq!(
      build_query(&[("search", Some("  ".into())), ("category", None)]),
      ""
    );
    assert_eq!(
      build_query(&[("search", Some(" bible study ".into())), ("category", Some("youth".into()))]),
      "?search=bible+study&category=youth"
    );
  }

  #[test]
  fn test_build_query_encodes_values() {
    assert_eq!(
      build_query(&[("search", Some("a&b=c".into()))]),
      "?search=a%26b%3Dc"
    );
  }

  #[test]
  fn test_page_query() {
    assert_eq!(page_query(Page::default()), "");
    assert_eq!(
      page_query(Page {
        limit: Some(10),
        offset: Some(20)
      }),
      "?limit=10&offset=20"
    );
  }

  #[tokio::test]
  async fn test_events_unwraps_envelope_and_sends_filters() {
    let router = Router::new().route(
      "/api/events",
      get(|Query(params): Query<HashMap<String, String>>| async move {
        let id = format!(
          "{}-{}",
          params.get("search").cloned().unwrap_or_default(),
          params.get("category").cloned().unwrap_or_default()
        );
        Json(json!({"events": [event_json(&id)]}))
      }),
    );
    let client = ApiClient::with_base_url(&test_server::spawn(router).await).unwrap();

    let filters = EventFilters {
      search: Some("picnic".into()),
      category: Some("".into()),
    };
    let events = client.events(&filters).await.unwrap();
    assert_eq!(events.len(), 1);
    assert_eq!(events[0].id, "picnic-");
  }

  #[tokio::test]
  async fn test_latest_attendance_may_be_null() {
    let router = Router::new().route(
      "/api/attendance/latest",
      get(|| async { Json(json!({"record": null})) }),
    );
    let client = ApiClient::with_base_url(&test_server::spawn(router).await).unwrap();
    assert_eq!(client.attendance_latest().await.unwrap(), None);
  }

  #[tokio::test]
  async fn test_update_email_uses_patch() {
    let router = Router::new().route(
      "/api/admin/users/:id/email",
      patch(|Path(id): Path<String>, Json(body): Json<Value>| async move {
        Json(json!({"user": {"id": id, "email": body["email"], "role": "staff"}}))
      }),
    );
    let client = ApiClient::with_base_url(&test_server::spawn(router).await).unwrap();

    let user = client.update_user_email("u-7", "new@example.org").await.unwrap();
    assert_eq!(user.id, "u-7");
    assert_eq!(user.email, "new@example.org");
  }

  #[tokio::test]
  async fn test_comments_page_parameters() {
    let router = Router::new().route(
      "/api/prayers/:id/comments",
      get(|RawQuery(query): RawQuery| async move {
        Json(json!({"comments": [{"id": query.unwrap_or_default(), "body": "amen"}]}))
      }),
    );
    let client = ApiClient::with_base_url(&test_server::spawn(router).await).unwrap();

    let page = Page {
      limit: Some(5),
      offset: None,
    };
    let comments = client.prayer_comments("p-1", page).await.unwrap();
    assert_eq!(comments[0].id, "limit=5");
  }

  #[tokio::test]
  async fn test_missing_envelope_field_is_decode_error() {
    let router = Router::new().route("/api/events/:id", get(|| async { StatusCode::NO_CONTENT }));
    let client = ApiClient::with_base_url(&test_server::spawn(router).await).unwrap();

    let err = client.event("evt-1").await.unwrap_err();
    assert!(matches!(err, ApiError::Decode(_)));
  }

  #[tokio::test]
  async fn test_logout_accepts_empty_body() {
    let router = Router::new().route("/api/auth/logout", post(|| async { StatusCode::NO_CONTENT }));
    let client = ApiClient::with_base_url(&test_server::spawn(router).await).unwrap();
    client.logout().await.unwrap();
  }

  #[tokio::test]
  async fn test_sync_posts_items_envelope() {
    let router = Router::new().route(
      "/api/sync",
      post(|Json(body): Json<Value>| async move {
        Json(json!({
          "applied": body["items"],
          "conflicts": [],
          "snapshot": {"prayers": []}
        }))
      }),
    );
    let client = ApiClient::with_base_url(&test_server::spawn(router).await).unwrap();

    let items: Vec<SyncPayloadItem> =
      serde_json::from_value(json!([{"type": "prayer", "action": "create"}])).unwrap();
    let result = client.sync(&items).await.unwrap();
    assert_eq!(result.applied.len(), 1);
    assert!(result.conflicts.is_empty());
    assert_eq!(result.snapshot, json!({"prayers": []}));
  }
}
