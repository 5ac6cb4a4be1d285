//! Backend client with the dashboard's caching policy applied.

use color_eyre::Result;
use tracing::info;

use crate::cache::QueryClient;
use crate::config::Config;
use crate::query::Query;

use super::client::ApiClient;
use super::effects;
use super::error::ApiError;
use super::keys;
use super::types::{
  AdminOverview, AttendanceRecord, CheckIn, EventFilters, EventItem, NewEvent, NewNotification,
  NewPrayer, NewUser, NotificationItem, Page, PrayerComment, PrayerItem, PrayerToggle,
  PrayerUsers, RsvpToggle, SyncPayloadItem, SyncResult, User,
};

/// Page size used for comment and praying-user lists.
const DETAIL_PAGE: Page = Page {
  limit: Some(20),
  offset: Some(0),
};

/// Dashboard API with transparent caching.
///
/// Reads go through the [`QueryClient`] under the keys of [`keys`]; writes
/// run as mutations whose [`effects`] patch or invalidate the affected keys
/// before the result is returned.
#[derive(Debug, Clone)]
pub struct CachedApi {
  inner: ApiClient,
  cache: QueryClient,
}

impl CachedApi {
  pub fn new(config: &Config) -> Result<Self> {
    let inner = ApiClient::new(&config.api)?;
    let cache = QueryClient::new(&config.cache);
    Ok(Self { inner, cache })
  }

  pub fn from_parts(inner: ApiClient, cache: QueryClient) -> Self {
    Self { inner, cache }
  }

  /// Uncached access, for calls with no cache policy.
  pub fn client(&self) -> &ApiClient {
    &self.inner
  }

  pub fn cache(&self) -> &QueryClient {
    &self.cache
  }

  // -- session (never cached) --

  pub async fn login(&self, email: &str, password: &str) -> Result<User, ApiError> {
    let user = self.inner.admin_login(email, password).await?;
    info!(user = %user.email, role = %user.role, "logged in");
    Ok(user)
  }

  /// End the session and drop everything cached for it.
  ///
  /// The cache is cleared even when the backend call fails.
  pub async fn logout(&self) -> Result<(), ApiError> {
    let result = self.inner.logout().await;
    self.cache.clear();
    info!("logged out");
    result
  }

  pub async fn me(&self) -> Result<User, ApiError> {
    self.inner.me().await
  }

  // -- reads --

  /// The three admin summaries, fetched concurrently and cached together.
  pub async fn overview(&self) -> Result<AdminOverview, ApiError> {
    self
      .cache
      .fetch_query(&keys::overview(), || {
        let inner = self.inner.clone();
        async move {
          let (attendance, events_summary, users) = futures::try_join!(
            inner.attendance_summary(),
            inner.events_summary(),
            inner.users()
          )?;
          Ok(AdminOverview {
            attendance,
            events_summary,
            users,
          })
        }
      })
      .await
  }

  pub async fn attendance_latest(&self) -> Result<Option<AttendanceRecord>, ApiError> {
    self
      .cache
      .fetch_query(&keys::attendance_latest(), || {
        let inner = self.inner.clone();
        async move { inner.attendance_latest().await }
      })
      .await
  }

  pub async fn attendance_records(&self) -> Result<Vec<AttendanceRecord>, ApiError> {
    self
      .cache
      .fetch_query(&keys::attendance_list(), || {
        let inner = self.inner.clone();
        async move { inner.attendance_records().await }
      })
      .await
  }

  pub async fn attendance_record(&self, id: &str) -> Result<AttendanceRecord, ApiError> {
    self
      .cache
      .fetch_query(&keys::attendance_detail(id), || {
        let inner = self.inner.clone();
        let id = id.to_string();
        async move { inner.attendance_record(&id).await }
      })
      .await
  }

  pub async fn users(&self) -> Result<Vec<User>, ApiError> {
    self
      .cache
      .fetch_query(&keys::users(), || {
        let inner = self.inner.clone();
        async move { inner.users().await }
      })
      .await
  }

  pub async fn events(&self, filters: &EventFilters) -> Result<Vec<EventItem>, ApiError> {
    self
      .cache
      .fetch_query(&keys::events(filters), || {
        let inner = self.inner.clone();
        let filters = filters.clone();
        async move { inner.events(&filters).await }
      })
      .await
  }

  /// Unfiltered events for the dashboard.
  pub async fn dashboard_events(&self) -> Result<Vec<EventItem>, ApiError> {
    self
      .cache
      .fetch_query(&keys::events_dashboard(), || {
        let inner = self.inner.clone();
        async move { inner.events(&EventFilters::default()).await }
      })
      .await
  }

  pub async fn event(&self, id: &str) -> Result<EventItem, ApiError> {
    self
      .cache
      .fetch_query(&keys::event(id), || {
        let inner = self.inner.clone();
        let id = id.to_string();
        async move { inner.event(&id).await }
      })
      .await
  }

  pub async fn prayers(&self, category: Option<&str>) -> Result<Vec<PrayerItem>, ApiError> {
    self
      .cache
      .fetch_query(&keys::prayers(category), || {
        let inner = self.inner.clone();
        let category = category.map(String::from);
        async move { inner.prayers(category.as_deref()).await }
      })
      .await
  }

  pub async fn dashboard_prayers(&self) -> Result<Vec<PrayerItem>, ApiError> {
    self
      .cache
      .fetch_query(&keys::prayers_dashboard(), || {
        let inner = self.inner.clone();
        async move { inner.prayers(None).await }
      })
      .await
  }

  // -- mounted views --

  /// Mount the events list shown with `filters`. The handle follows RSVP
  /// patches of that list and refetches once the events family is invalidated.
  pub fn watch_events(&self, filters: &EventFilters) -> Query<Vec<EventItem>> {
    let inner = self.inner.clone();
    let filters = filters.clone();
    self.cache.watch(keys::events(&filters), move || {
      let inner = inner.clone();
      let filters = filters.clone();
      async move { inner.events(&filters).await }
    })
  }

  pub fn watch_prayers(&self, category: Option<&str>) -> Query<Vec<PrayerItem>> {
    let inner = self.inner.clone();
    let category = category.map(String::from);
    self.cache.watch(keys::prayers(category.as_deref()), move || {
      let inner = inner.clone();
      let category = category.clone();
      async move { inner.prayers(category.as_deref()).await }
    })
  }

  pub async fn prayer_comments(&self, prayer_id: &str) -> Result<Vec<PrayerComment>, ApiError> {
    self
      .cache
      .fetch_query(&keys::prayer_comments(prayer_id), || {
        let inner = self.inner.clone();
        let prayer_id = prayer_id.to_string();
        async move { inner.prayer_comments(&prayer_id, DETAIL_PAGE).await }
      })
      .await
  }

  pub async fn praying_users(&self, prayer_id: &str) -> Result<PrayerUsers, ApiError> {
    self
      .cache
      .fetch_query(&keys::prayer_users(prayer_id), || {
        let inner = self.inner.clone();
        let prayer_id = prayer_id.to_string();
        async move { inner.praying_users(&prayer_id, DETAIL_PAGE).await }
      })
      .await
  }

  pub async fn notifications(&self) -> Result<Vec<NotificationItem>, ApiError> {
    self
      .cache
      .fetch_query(&keys::notifications(), || {
        let inner = self.inner.clone();
        async move { inner.notifications().await }
      })
      .await
  }

  // -- writes --

  pub async fn check_in(&self, payload: &CheckIn) -> Result<AttendanceRecord, ApiError> {
    self
      .cache
      .mutate(self.inner.check_in(payload), &effects::check_in())
      .await
  }

  pub async fn create_user(&self, payload: &NewUser) -> Result<User, ApiError> {
    self
      .cache
      .mutate(self.inner.create_user(payload), &effects::create_user())
      .await
  }

  pub async fn update_user_email(&self, user_id: &str, email: &str) -> Result<User, ApiError> {
    self
      .cache
      .mutate(
        self.inner.update_user_email(user_id, email),
        &effects::update_user_email(),
      )
      .await
  }

  pub async fn create_event(&self, payload: &NewEvent) -> Result<EventItem, ApiError> {
    self
      .cache
      .mutate(self.inner.create_event(payload), &effects::create_event())
      .await
  }

  /// Toggle an RSVP; `filters` names the list the caller is showing.
  pub async fn toggle_event_rsvp(
    &self,
    filters: &EventFilters,
    event_id: &str,
  ) -> Result<RsvpToggle, ApiError> {
    self
      .cache
      .mutate(
        self.inner.toggle_event_rsvp(event_id),
        &effects::toggle_event_rsvp(filters, event_id),
      )
      .await
  }

  pub async fn create_prayer(&self, payload: &NewPrayer) -> Result<PrayerItem, ApiError> {
    self
      .cache
      .mutate(self.inner.create_prayer(payload), &effects::create_prayer())
      .await
  }

  pub async fn toggle_prayer(
    &self,
    category: Option<&str>,
    prayer_id: &str,
  ) -> Result<PrayerToggle, ApiError> {
    self
      .cache
      .mutate(
        self.inner.toggle_prayer(prayer_id),
        &effects::toggle_prayer(category),
      )
      .await
  }

  pub async fn add_prayer_comment(
    &self,
    prayer_id: &str,
    body: &str,
  ) -> Result<PrayerComment, ApiError> {
    self
      .cache
      .mutate(
        self.inner.add_prayer_comment(prayer_id, body),
        &effects::comment_changed(prayer_id),
      )
      .await
  }

  pub async fn delete_prayer_comment(
    &self,
    prayer_id: &str,
    comment_id: &str,
  ) -> Result<bool, ApiError> {
    self
      .cache
      .mutate(
        self.inner.delete_prayer_comment(prayer_id, comment_id),
        &effects::comment_changed(prayer_id),
      )
      .await
  }

  pub async fn seed_notification(
    &self,
    payload: &NewNotification,
  ) -> Result<NotificationItem, ApiError> {
    self
      .cache
      .mutate(
        self.inner.seed_notification(payload),
        &effects::notifications_changed(),
      )
      .await
  }

  pub async fn mark_notification_read(&self, id: &str) -> Result<NotificationItem, ApiError> {
    self
      .cache
      .mutate(
        self.inner.mark_notification_read(id),
        &effects::notifications_changed(),
      )
      .await
  }

  pub async fn mark_all_notifications_read(&self) -> Result<u64, ApiError> {
    self
      .cache
      .mutate(
        self.inner.mark_all_notifications_read(),
        &effects::notifications_changed(),
      )
      .await
  }

  pub async fn delete_notification(&self, id: &str) -> Result<bool, ApiError> {
    self
      .cache
      .mutate(
        self.inner.delete_notification(id),
        &effects::notifications_changed(),
      )
      .await
  }

  pub async fn clear_notifications(&self) -> Result<u64, ApiError> {
    self
      .cache
      .mutate(
        self.inner.clear_notifications(),
        &effects::notifications_changed(),
      )
      .await
  }

  // -- tools (no cache policy) --

  pub async fn forgot_password(&self, email: &str) -> Result<String, ApiError> {
    self.inner.forgot_password(email).await
  }

  pub async fn reset_password(&self, token: &str, password: &str) -> Result<User, ApiError> {
    self.inner.reset_password(token, password).await
  }

  pub async fn sync(&self, items: &[SyncPayloadItem]) -> Result<SyncResult, ApiError> {
    self.inner.sync(items).await
  }
}
