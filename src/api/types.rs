//! Records exchanged with the backend.
//!
//! Plain value types: the client displays and re-submits them but never
//! derives business fields from them. Wire names are camelCase.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum UserRole {
  #[default]
  Member,
  Staff,
  Admin,
}

impl std::fmt::Display for UserRole {
  fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
    f.write_str(match self {
      UserRole::Member => "member",
      UserRole::Staff => "staff",
      UserRole::Admin => "admin",
    })
  }
}

impl std::str::FromStr for UserRole {
  type Err = String;

  fn from_str(s: &str) -> Result<Self, Self::Err> {
    match s.to_lowercase().as_str() {
      "member" => Ok(UserRole::Member),
      "staff" => Ok(UserRole::Staff),
      "admin" => Ok(UserRole::Admin),
      other => Err(format!("unknown role '{}'", other)),
    }
  }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct User {
  pub id: String,
  pub email: String,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub name: Option<String>,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub phone: Option<String>,
  #[serde(default)]
  pub role: UserRole,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub created_at: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct GeoPoint {
  pub latitude: f64,
  pub longitude: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AttendanceRecord {
  pub id: String,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub user_id: Option<String>,
  pub timestamp: String,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub day: Option<String>,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub location: Option<GeoPoint>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AttendanceSummary {
  #[serde(default)]
  pub total_check_ins: u64,
  #[serde(default)]
  pub recent: Vec<AttendanceRecord>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Dependent {
  pub name: String,
  pub age: u32,
}

/// Body of `POST /attendance/check-in`.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CheckIn {
  pub latitude: f64,
  pub longitude: f64,
  #[serde(skip_serializing_if = "Option::is_none")]
  pub timestamp: Option<String>,
  #[serde(skip_serializing_if = "Vec::is_empty")]
  pub dependents: Vec<Dependent>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EventsSummary {
  #[serde(default)]
  pub total_events: u64,
  #[serde(default)]
  pub total_registrations: u64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EventItem {
  pub id: String,
  pub title: String,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub description: Option<String>,
  pub start_time: String,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub end_time: Option<String>,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub location: Option<String>,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub category: Option<String>,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub max_attendees: Option<u32>,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub attendees_count: Option<u32>,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub is_registered: Option<bool>,
}

/// Body of `POST /events`.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct NewEvent {
  pub title: String,
  #[serde(skip_serializing_if = "Option::is_none")]
  pub description: Option<String>,
  pub start_time: String,
  #[serde(skip_serializing_if = "Option::is_none")]
  pub end_time: Option<String>,
  #[serde(skip_serializing_if = "Option::is_none")]
  pub location: Option<String>,
  #[serde(skip_serializing_if = "Option::is_none")]
  pub category: Option<String>,
  #[serde(skip_serializing_if = "Option::is_none")]
  pub max_attendees: Option<u32>,
}

/// Filters of the events list; part of its cache key.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct EventFilters {
  pub search: Option<String>,
  pub category: Option<String>,
}

/// Response of the RSVP toggle.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RsvpToggle {
  pub event: EventItem,
  #[serde(default)]
  pub status: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PrayerItem {
  pub id: String,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub author_name: Option<String>,
  pub request: String,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub category: Option<String>,
  #[serde(default)]
  pub prayers_count: u32,
  #[serde(default)]
  pub comments_count: u32,
  #[serde(default)]
  pub is_praying: bool,
  #[serde(default)]
  pub created_at: String,
}

/// Body of `POST /prayers`.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct NewPrayer {
  pub request: String,
  #[serde(skip_serializing_if = "Option::is_none")]
  pub category: Option<String>,
  #[serde(skip_serializing_if = "Option::is_none")]
  pub author_name: Option<String>,
}

/// Response of the pray toggle.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PrayerToggle {
  pub prayer: PrayerItem,
  #[serde(default)]
  pub status: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PrayerComment {
  pub id: String,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub prayer_id: Option<String>,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub user_id: Option<String>,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub author_name: Option<String>,
  pub body: String,
  #[serde(default)]
  pub created_at: String,
}

/// Users currently praying for a request.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PrayerUsers {
  #[serde(default)]
  pub users: Vec<User>,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub total: Option<u64>,
}

/// `limit`/`offset` of paginated sub-resources.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Page {
  pub limit: Option<u32>,
  pub offset: Option<u32>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NotificationKind {
  Event,
  Prayer,
  Giving,
  #[default]
  General,
}

impl std::str::FromStr for NotificationKind {
  type Err = String;

  fn from_str(s: &str) -> Result<Self, Self::Err> {
    match s.to_lowercase().as_str() {
      "event" => Ok(NotificationKind::Event),
      "prayer" => Ok(NotificationKind::Prayer),
      "giving" => Ok(NotificationKind::Giving),
      "general" => Ok(NotificationKind::General),
      other => Err(format!("unknown notification type '{}'", other)),
    }
  }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NotificationItem {
  pub id: String,
  pub title: String,
  pub body: String,
  #[serde(rename = "type", default)]
  pub kind: NotificationKind,
  #[serde(default)]
  pub read: bool,
  #[serde(default)]
  pub created_at: String,
}

/// Body of `POST /notifications`.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct NewNotification {
  pub title: String,
  pub body: String,
  #[serde(rename = "type", skip_serializing_if = "Option::is_none")]
  pub kind: Option<NotificationKind>,
}

/// Body of `POST /auth/signup`.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct NewUser {
  #[serde(skip_serializing_if = "Option::is_none")]
  pub name: Option<String>,
  pub email: String,
  pub password: String,
  #[serde(skip_serializing_if = "Option::is_none")]
  pub phone: Option<String>,
  #[serde(skip_serializing_if = "Option::is_none")]
  pub role: Option<UserRole>,
}

/// The three admin summaries shown on the dashboard.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AdminOverview {
  pub attendance: AttendanceSummary,
  pub events_summary: EventsSummary,
  pub users: Vec<User>,
}

/// One change submitted to `/sync`.
///
/// Only the envelope fields are typed; anything else the device sent is kept
/// in `extra` and forwarded untouched.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SyncPayloadItem {
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub id: Option<String>,
  #[serde(rename = "type", default, skip_serializing_if = "Option::is_none")]
  pub kind: Option<String>,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub action: Option<String>,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub data: Option<Value>,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub updated_at: Option<String>,
  #[serde(flatten)]
  pub extra: Map<String, Value>,
}

/// A device change the backend refused because the server copy is newer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SyncConflict {
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub id: Option<String>,
  #[serde(rename = "type", default, skip_serializing_if = "Option::is_none")]
  pub kind: Option<String>,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub reason: Option<String>,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub server: Option<Value>,
  #[serde(flatten)]
  pub extra: Map<String, Value>,
}

/// Response of `/sync`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SyncResult {
  #[serde(default)]
  pub applied: Vec<Value>,
  #[serde(default)]
  pub conflicts: Vec<SyncConflict>,
  #[serde(default)]
  pub snapshot: Value,
}
