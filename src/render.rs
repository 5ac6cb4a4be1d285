//! Plain-text rendering of backend records for the console.

use chrono::{DateTime, Local};
use std::fmt::Write;

use hpn_admin::api::types::{
  AdminOverview, AttendanceRecord, EventItem, NotificationItem, PrayerComment, PrayerItem,
  PrayerUsers, SyncResult, User,
};
use hpn_admin::cache::{QueryKey, QuerySnapshot, QueryStatus};

/// Truncate a string to a maximum length in characters, adding "..." if truncated
pub fn truncate(s: &str, max_len: usize) -> String {
  if s.chars().count() <= max_len {
    s.to_string()
  } else {
    let kept: String = s.chars().take(max_len.saturating_sub(3)).collect();
    format!("{}...", kept)
  }
}

/// Format an RFC 3339 timestamp in local time; other strings pass through.
pub fn format_time(raw: &str) -> String {
  match DateTime::parse_from_rfc3339(raw) {
    Ok(time) => time
      .with_timezone(&Local)
      .format("%b %d, %Y %H:%M")
      .to_string(),
    Err(_) => raw.to_string(),
  }
}

fn opt(value: Option<&str>) -> &str {
  value.filter(|v| !v.is_empty()).unwrap_or("-")
}

pub fn overview(data: &AdminOverview) -> String {
  let mut out = String::new();
  let _ = writeln!(out, "Check-ins:      {}", data.attendance.total_check_ins);
  let _ = writeln!(out, "Events:         {}", data.events_summary.total_events);
  let _ = writeln!(out, "Registrations:  {}", data.events_summary.total_registrations);
  let _ = writeln!(out, "Users:          {}", data.users.len());
  if !data.attendance.recent.is_empty() {
    out.push_str("\nRecent check-ins\n");
    out.push_str(&attendance(&data.attendance.recent));
  }
  out
}

pub fn attendance(records: &[AttendanceRecord]) -> String {
  if records.is_empty() {
    return "No check-ins.\n".to_string();
  }
  let mut out = String::new();
  let _ = writeln!(out, "{:<24} {:<24} {:<12} {}", "ID", "TIME", "DAY", "USER");
  for record in records {
    let _ = writeln!(
      out,
      "{:<24} {:<24} {:<12} {}",
      truncate(&record.id, 24),
      format_time(&record.timestamp),
      opt(record.day.as_deref()),
      opt(record.user_id.as_deref())
    );
  }
  out
}

pub fn attendance_record(record: &AttendanceRecord) -> String {
  let mut out = String::new();
  let _ = writeln!(out, "Check-in {}", record.id);
  let _ = writeln!(out, "  time:     {}", format_time(&record.timestamp));
  let _ = writeln!(out, "  day:      {}", opt(record.day.as_deref()));
  let _ = writeln!(out, "  user:     {}", opt(record.user_id.as_deref()));
  if let Some(location) = &record.location {
    let _ = writeln!(
      out,
      "  location: {:.5}, {:.5}",
      location.latitude, location.longitude
    );
  }
  out
}

pub fn users(users: &[User]) -> String {
  if users.is_empty() {
    return "No users.\n".to_string();
  }
  let mut out = String::new();
  let _ = writeln!(out, "{:<24} {:<32} {:<20} {}", "ID", "EMAIL", "NAME", "ROLE");
  for user in users {
    let _ = writeln!(
      out,
      "{:<24} {:<32} {:<20} {}",
      truncate(&user.id, 24),
      truncate(&user.email, 32),
      truncate(opt(user.name.as_deref()), 20),
      user.role
    );
  }
  out
}

pub fn user(user: &User) -> String {
  format!(
    "{} <{}> ({}, {})\n",
    opt(user.name.as_deref()),
    user.email,
    user.role,
    user.id
  )
}

fn attendees(event: &EventItem) -> String {
  match (event.attendees_count, event.max_attendees) {
    (Some(count), Some(max)) => format!("{}/{}", count, max),
    (Some(count), None) => count.to_string(),
    (None, Some(max)) => format!("0/{}", max),
    (None, None) => "-".to_string(),
  }
}

pub fn events(events: &[EventItem]) -> String {
  if events.is_empty() {
    return "No events.\n".to_string();
  }
  let mut out = String::new();
  let _ = writeln!(
    out,
    "{:<24} {:<30} {:<20} {:<12} {:<9} {}",
    "ID", "TITLE", "START", "CATEGORY", "ATTEND", "RSVP"
  );
  for event in events {
    let _ = writeln!(
      out,
      "{:<24} {:<30} {:<20} {:<12} {:<9} {}",
      truncate(&event.id, 24),
      truncate(&event.title, 30),
      format_time(&event.start_time),
      truncate(opt(event.category.as_deref()), 12),
      attendees(event),
      if event.is_registered == Some(true) { "yes" } else { "" }
    );
  }
  out
}

pub fn event(event: &EventItem) -> String {
  let mut out = String::new();
  let _ = writeln!(out, "{} ({})", event.title, event.id);
  let _ = writeln!(out, "  start:     {}", format_time(&event.start_time));
  if let Some(end) = &event.end_time {
    let _ = writeln!(out, "  end:       {}", format_time(end));
  }
  let _ = writeln!(out, "  location:  {}", opt(event.location.as_deref()));
  let _ = writeln!(out, "  category:  {}", opt(event.category.as_deref()));
  let _ = writeln!(out, "  attendees: {}", attendees(event));
  let _ = writeln!(
    out,
    "  rsvp:      {}",
    if event.is_registered == Some(true) { "registered" } else { "not registered" }
  );
  if let Some(description) = event.description.as_deref().filter(|d| !d.is_empty()) {
    let _ = writeln!(out, "\n{}", description);
  }
  out
}

pub fn prayers(prayers: &[PrayerItem]) -> String {
  if prayers.is_empty() {
    return "No prayer requests.\n".to_string();
  }
  let mut out = String::new();
  let _ = writeln!(
    out,
    "{:<24} {:<40} {:<12} {:>7} {:>8} {}",
    "ID", "REQUEST", "CATEGORY", "PRAYING", "COMMENTS", "YOU"
  );
  for prayer in prayers {
    let _ = writeln!(
      out,
      "{:<24} {:<40} {:<12} {:>7} {:>8} {}",
      truncate(&prayer.id, 24),
      truncate(&prayer.request, 40),
      truncate(opt(prayer.category.as_deref()), 12),
      prayer.prayers_count,
      prayer.comments_count,
      if prayer.is_praying { "yes" } else { "" }
    );
  }
  out
}

pub fn comments(comments: &[PrayerComment]) -> String {
  if comments.is_empty() {
    return "No comments.\n".to_string();
  }
  let mut out = String::new();
  for comment in comments {
    let _ = writeln!(
      out,
      "[{}] {} ({}): {}",
      comment.id,
      opt(comment.author_name.as_deref()),
      format_time(&comment.created_at),
      comment.body
    );
  }
  out
}

pub fn praying_users(data: &PrayerUsers) -> String {
  let mut out = users(&data.users);
  if let Some(total) = data.total {
    let _ = writeln!(out, "{} praying in total", total);
  }
  out
}

pub fn notifications(items: &[NotificationItem]) -> String {
  if items.is_empty() {
    return "No notifications.\n".to_string();
  }
  let mut out = String::new();
  for item in items {
    let _ = writeln!(
      out,
      "{} [{}] {:<8} {} - {} ({})",
      if item.read { " " } else { "*" },
      item.id,
      format!("{:?}", item.kind).to_lowercase(),
      item.title,
      truncate(&item.body, 60),
      format_time(&item.created_at)
    );
  }
  out
}

pub fn sync_result(result: &SyncResult) -> String {
  let mut out = String::new();
  let _ = writeln!(out, "Applied:   {}", result.applied.len());
  let _ = writeln!(out, "Conflicts: {}", result.conflicts.len());
  for conflict in &result.conflicts {
    let _ = writeln!(
      out,
      "  {} {}: {}",
      opt(conflict.kind.as_deref()),
      opt(conflict.id.as_deref()),
      opt(conflict.reason.as_deref())
    );
  }
  if !result.snapshot.is_null() {
    let snapshot = serde_json::to_string_pretty(&result.snapshot).unwrap_or_default();
    let _ = writeln!(out, "Snapshot:\n{}", snapshot);
  }
  out
}

pub fn cache(entries: &[(QueryKey, QuerySnapshot)]) -> String {
  if entries.is_empty() {
    return "Cache is empty.\n".to_string();
  }
  let mut out = String::new();
  let _ = writeln!(
    out,
    "{:<44} {:<8} {:<6} {:>4} {:>4} {}",
    "KEY", "STATUS", "STALE", "GEN", "OBS", "CACHED AT"
  );
  for (key, snapshot) in entries {
    let status = match snapshot.status {
      QueryStatus::Pending if snapshot.fetching => "loading",
      QueryStatus::Pending => "pending",
      QueryStatus::Success => "success",
      QueryStatus::Error => "error",
    };
    let cached_at = snapshot
      .cached_at
      .map(|t| t.with_timezone(&Local).format("%H:%M:%S").to_string())
      .unwrap_or_else(|| "-".to_string());
    let _ = writeln!(
      out,
      "{:<44} {:<8} {:<6} {:>4} {:>4} {}",
      truncate(&key.to_string(), 44),
      status,
      if snapshot.invalidated { "yes" } else { "" },
      snapshot.generation,
      snapshot.observers,
      cached_at
    );
    if let Some(error) = &snapshot.error {
      let _ = writeln!(out, "  last error: {}", error);
    }
  }
  out
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn test_truncate_short_string() {
    assert_eq!(truncate("hello", 10), "hello");
  }

  #[test]
  fn test_truncate_exact_length() {
    assert_eq!(truncate("hello", 5), "hello");
  }

  #[test]
  fn test_truncate_long_string() {
    assert_eq!(truncate("hello world", 8), "hello...");
  }

  #[test]
  fn test_truncate_multibyte() {
    assert_eq!(truncate("oración por la familia", 8), "oraci...");
  }

  #[test]
  fn test_format_time_passthrough() {
    assert_eq!(format_time("next sunday"), "next sunday");
    assert_ne!(format_time("2024-06-01T10:00:00Z"), "2024-06-01T10:00:00Z");
  }

  #[test]
  fn test_event_row_marks_registration() {
    let event: EventItem = serde_json::from_value(serde_json::json!({
      "id": "evt-1",
      "title": "Picnic",
      "startTime": "2024-06-01T10:00:00Z",
      "attendeesCount": 5,
      "maxAttendees": 40,
      "isRegistered": true
    }))
    .unwrap();

    let table = events(&[event]);
    let row = table.lines().nth(1).unwrap();
    assert!(row.contains("5/40"));
    assert!(row.ends_with("yes"));
  }

  #[test]
  fn test_empty_cache() {
    assert_eq!(cache(&[]), "Cache is empty.\n");
  }
}
