//! Query keys of the dashboard reads, and record identity for patching.
//!
//! Keys are hierarchical: the first part names the family that writes
//! invalidate (`events`), later parts identify one read inside it.

use crate::cache::{Cacheable, QueryKey};

use super::types::{
  AttendanceRecord, EventFilters, EventItem, NotificationItem, PrayerComment, PrayerItem, User,
};

pub const OVERVIEW: &str = "overview";
pub const ATTENDANCE: &str = "attendance";
pub const EVENTS: &str = "events";
pub const EVENT: &str = "event";
pub const PRAYERS: &str = "prayers";
pub const PRAYER_COMMENTS: &str = "prayer-comments";
pub const PRAYER_USERS: &str = "prayer-users";
pub const NOTIFICATIONS: &str = "notifications";
pub const USERS: &str = "users";

const DASHBOARD: &str = "dashboard";

/// The root of a family, for invalidation.
pub fn family(name: &str) -> QueryKey {
  QueryKey::new(name)
}

pub fn overview() -> QueryKey {
  QueryKey::new(OVERVIEW)
}

pub fn attendance_latest() -> QueryKey {
  QueryKey::new(ATTENDANCE).with("latest")
}

pub fn attendance_list() -> QueryKey {
  QueryKey::new(ATTENDANCE).with("list")
}

pub fn attendance_detail(id: &str) -> QueryKey {
  QueryKey::new(ATTENDANCE).with("detail").with(id)
}

/// `["events", search, category]`; absent filters are `null` parts.
pub fn events(filters: &EventFilters) -> QueryKey {
  QueryKey::new(EVENTS)
    .with(filters.search.as_deref())
    .with(filters.category.as_deref())
}

/// Upcoming events shown on the dashboard.
pub fn events_dashboard() -> QueryKey {
  QueryKey::new(EVENTS).with(DASHBOARD)
}

pub fn event(id: &str) -> QueryKey {
  QueryKey::new(EVENT).with(id)
}

pub fn prayers(category: Option<&str>) -> QueryKey {
  QueryKey::new(PRAYERS).with(category)
}

pub fn prayers_dashboard() -> QueryKey {
  QueryKey::new(PRAYERS).with(DASHBOARD)
}

pub fn prayer_comments(prayer_id: &str) -> QueryKey {
  QueryKey::new(PRAYER_COMMENTS).with(prayer_id)
}

pub fn prayer_users(prayer_id: &str) -> QueryKey {
  QueryKey::new(PRAYER_USERS).with(prayer_id)
}

pub fn notifications() -> QueryKey {
  QueryKey::new(NOTIFICATIONS)
}

pub fn users() -> QueryKey {
  QueryKey::new(USERS)
}

impl Cacheable for User {
  fn id(&self) -> &str {
    &self.id
  }

  fn entity_type() -> &'static str {
    "user"
  }
}

impl Cacheable for AttendanceRecord {
  fn id(&self) -> &str {
    &self.id
  }

  fn entity_type() -> &'static str {
    "attendance"
  }
}

impl Cacheable for EventItem {
  fn id(&self) -> &str {
    &self.id
  }

  fn entity_type() -> &'static str {
    "event"
  }
}

impl Cacheable for PrayerItem {
  fn id(&self) -> &str {
    &self.id
  }

  fn entity_type() -> &'static str {
    "prayer"
  }
}

impl Cacheable for PrayerComment {
  fn id(&self) -> &str {
    &self.id
  }

  fn entity_type() -> &'static str {
    "prayer comment"
  }
}

impl Cacheable for NotificationItem {
  fn id(&self) -> &str {
    &self.id
  }

  fn entity_type() -> &'static str {
    "notification"
  }
}
