//! Cache effects of each dashboard write.

use crate::cache::MutationEffects;

use super::keys;
use super::types::{
  AttendanceRecord, EventFilters, EventItem, PrayerItem, PrayerToggle, RsvpToggle, User,
};

pub fn check_in() -> MutationEffects<AttendanceRecord> {
  MutationEffects::new().invalidate(keys::family(keys::ATTENDANCE))
}

pub fn create_event() -> MutationEffects<EventItem> {
  MutationEffects::new().invalidate(keys::family(keys::EVENTS))
}

/// Patch the returned event into the list shown with `filters` and into its
/// detail entry. Other filtered lists keep their values until refetched.
pub fn toggle_event_rsvp(filters: &EventFilters, event_id: &str) -> MutationEffects<RsvpToggle> {
  MutationEffects::new()
    .patch(keys::events(filters))
    .patch(keys::event(event_id))
    .record(|toggle: &RsvpToggle| &toggle.event)
}

pub fn create_prayer() -> MutationEffects<PrayerItem> {
  MutationEffects::new().invalidate(keys::family(keys::PRAYERS))
}

pub fn toggle_prayer(category: Option<&str>) -> MutationEffects<PrayerToggle> {
  MutationEffects::new()
    .patch(keys::prayers(category))
    .record(|toggle: &PrayerToggle| &toggle.prayer)
}

/// Comment counts live on the prayer records, so the prayer lists go stale too.
pub fn comment_changed<T>(prayer_id: &str) -> MutationEffects<T> {
  MutationEffects::new()
    .invalidate(keys::prayer_comments(prayer_id))
    .invalidate(keys::family(keys::PRAYERS))
}

pub fn create_user() -> MutationEffects<User> {
  MutationEffects::new().invalidate(keys::users())
}

/// Only the email of the cached user changes; other fields keep their
/// cached values.
pub fn update_user_email() -> MutationEffects<User> {
  MutationEffects::new()
    .merge(keys::users(), &["email"])
    .record(|user: &User| user)
}

/// Every notification write (seed, read, read-all, delete, clear).
pub fn notifications_changed<T>() -> MutationEffects<T> {
  MutationEffects::new().invalidate(keys::notifications())
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::cache::{Effect, PatchStrategy};

  #[test]
  fn test_rsvp_patches_list_and_detail() {
    let filters = EventFilters {
      search: None,
      category: Some("youth".into()),
    };
    let effects = toggle_event_rsvp(&filters, "evt-1");

    assert_eq!(
      effects.steps(),
      &[
        Effect::Patch {
          key: keys::events(&filters),
          strategy: PatchStrategy::Replace,
        },
        Effect::Patch {
          key: keys::event("evt-1"),
          strategy: PatchStrategy::Replace,
        },
      ]
    );
  }

  #[test]
  fn test_comment_changes_invalidate_comments_and_prayers() {
    let effects: MutationEffects<bool> = comment_changed("p-1");
    assert_eq!(
      effects.steps(),
      &[
        Effect::Invalidate(keys::prayer_comments("p-1")),
        Effect::Invalidate(keys::family(keys::PRAYERS)),
      ]
    );
  }

  #[test]
  fn test_email_update_merges_email_only() {
    let effects = update_user_email();
    assert_eq!(
      effects.steps(),
      &[Effect::Patch {
        key: keys::users(),
        strategy: PatchStrategy::Merge(vec!["email".to_string()]),
      }]
    );
  }
}
