use crate::commands::{self, Args, Command};
use crate::event::{Event, EventHandler};
use crate::render;
use color_eyre::eyre::{eyre, Report};
use color_eyre::Result;
use hpn_admin::api::sync::parse_sync_payload;
use hpn_admin::api::types::{
  CheckIn, Dependent, EventFilters, EventItem, NewEvent, NewNotification, NewPrayer, NewUser,
  NotificationKind, PrayerItem, User, UserRole,
};
use hpn_admin::api::{ApiError, CachedApi};
use hpn_admin::config::Config;
use hpn_admin::query::{Query, QueryState};
use serde::{de::DeserializeOwned, Serialize};
use std::io::Write;
use tracing::{debug, info};

const PROMPT: &str = "hpn> ";

/// Interactive admin console
pub struct App {
  /// Application configuration
  config: Config,

  /// Backend client sharing one cookie jar and one cache
  api: CachedApi,

  /// Session user, once logged in
  user: Option<User>,

  /// Filters of the last `events` listing; `rsvp` patches that list
  event_filters: EventFilters,

  /// Mounted view of the last `events` listing
  events_view: Option<Query<Vec<EventItem>>>,

  /// Category of the last `prayers` listing; `pray` patches that list
  prayer_category: Option<String>,

  /// Mounted view of the last `prayers` listing
  prayers_view: Option<Query<Vec<PrayerItem>>>,

  /// Whether to quit
  should_quit: bool,
}

impl App {
  pub fn new(config: Config) -> Result<Self> {
    let api = CachedApi::new(&config)?;
    Ok(Self {
      config,
      api,
      user: None,
      event_filters: EventFilters::default(),
      events_view: None,
      prayer_category: None,
      prayers_view: None,
      should_quit: false,
    })
  }

  pub async fn run(&mut self, login: bool) -> Result<()> {
    println!(
      "hpn-admin connected to {} (type 'help' for commands)",
      self.api.client().base_url()
    );

    if login {
      self.execute("login").await;
    }

    let mut events = EventHandler::new();

    // Main loop
    while !self.should_quit {
      match &self.user {
        Some(user) => print!("{} {}", user.email, PROMPT),
        None => print!("{}", PROMPT),
      }
      std::io::stdout().flush()?;

      match events.next().await {
        Some(Event::Line(line)) => self.execute(&line).await,
        Some(Event::Interrupt) => println!(),
        Some(Event::Eof) | None => self.should_quit = true,
      }
    }

    Ok(())
  }

  /// Run one command line and print its output or error.
  async fn execute(&mut self, line: &str) {
    let line = line.trim();
    if line.is_empty() {
      return;
    }

    let (name, raw_args) = match line.split_once(char::is_whitespace) {
      Some((name, rest)) => (name, rest.trim()),
      None => (line, ""),
    };

    let cmd = match commands::resolve(name) {
      Ok(cmd) => cmd,
      Err(suggestions) if suggestions.is_empty() => {
        println!("Unknown command '{}'. Type 'help' for commands.", name);
        return;
      }
      Err(suggestions) => {
        let names: Vec<&str> = suggestions.iter().map(|c| c.name).collect();
        println!("Unknown command '{}'. Did you mean: {}?", name, names.join(", "));
        return;
      }
    };

    let words = match commands::split_words(raw_args) {
      Ok(words) => words,
      Err(e) => {
        println!("Error: {}", e);
        return;
      }
    };
    let args = Args::parse(&words);

    debug!(command = cmd.name, "executing command");
    match self.run_command(cmd, &args, raw_args).await {
      Ok(output) => print!("{}", output),
      Err(err) => print_error(cmd, &err),
    }
    self.poll_views();
  }

  /// Let mounted listings pick up patches and start refetches after
  /// invalidations, so the next listing is already on its way.
  fn poll_views(&mut self) {
    if let Some(view) = &mut self.events_view {
      if view.poll() {
        debug!(key = %view.key(), "events view updated");
      }
    }
    if let Some(view) = &mut self.prayers_view {
      if view.poll() {
        debug!(key = %view.key(), "prayers view updated");
      }
    }
  }

  async fn run_command(&mut self, cmd: &Command, args: &Args, raw_args: &str) -> Result<String> {
    let output = match cmd.name {
      "help" => help(args.positional.first().map(String::as_str)),
      "quit" => {
        self.should_quit = true;
        String::new()
      }

      // -- session --
      "login" => {
        let email = args
          .positional
          .first()
          .cloned()
          .or_else(|| self.config.session.email.clone())
          .ok_or_else(|| eyre!("no email given and session.email is not configured"))?;
        let password = Config::get_password()?;
        let user = self.api.login(&email, &password).await?;
        let output = format!("Logged in as {}", render::user(&user));
        self.user = Some(user);
        output
      }
      "logout" => {
        let result = self.api.logout().await;
        self.user = None;
        self.event_filters = EventFilters::default();
        self.events_view = None;
        self.prayer_category = None;
        self.prayers_view = None;
        result?;
        "Logged out.\n".to_string()
      }
      "me" => {
        let user = self.api.me().await?;
        let output = render::user(&user);
        self.user = Some(user);
        output
      }

      // -- dashboard --
      "overview" => {
        let (overview, events, prayers) = futures::try_join!(
          self.api.overview(),
          self.api.dashboard_events(),
          self.api.dashboard_prayers()
        )?;
        format!(
          "{}\nUpcoming events\n{}\nPrayer requests\n{}",
          render::overview(&overview),
          render::events(first(&events, 5)),
          render::prayers(first(&prayers, 5))
        )
      }

      // -- attendance --
      "attendance" => match args.positional.first().map(String::as_str) {
        Some("latest") => match self.api.attendance_latest().await? {
          Some(record) => render::attendance_record(&record),
          None => "No check-ins yet.\n".to_string(),
        },
        Some("show") => {
          let id = args.required(1, "attendance id").map_err(Report::msg)?;
          render::attendance_record(&self.api.attendance_record(id).await?)
        }
        Some(other) => return Err(eyre!("unknown attendance view '{}'", other)),
        None => render::attendance(&self.api.attendance_records().await?),
      },
      "check-in" => {
        let payload = check_in_payload(args)?;
        let record = self.api.check_in(&payload).await?;
        format!("Checked in.\n{}", render::attendance_record(&record))
      }

      // -- users --
      "users" => render::users(&self.api.users().await?),
      "user-create" => {
        let role = args
          .text("role")
          .map(|r| r.parse::<UserRole>())
          .transpose()
          .map_err(Report::msg)?;
        let payload = NewUser {
          name: args.text("name"),
          email: args.require("email").map_err(Report::msg)?,
          password: args.require("password").map_err(Report::msg)?,
          phone: args.text("phone"),
          role,
        };
        let user = self.api.create_user(&payload).await?;
        format!("Created {}", render::user(&user))
      }
      "user-email" => {
        let id = args.required(0, "user id").map_err(Report::msg)?;
        let email = args.required(1, "email").map_err(Report::msg)?;
        let user = self.api.update_user_email(id, email.trim()).await?;
        format!("Updated {}", render::user(&user))
      }

      // -- events --
      "events" => {
        let filters = EventFilters {
          search: args.get("search").map(String::from),
          category: args.get("category").map(String::from),
        };
        let view = match self.events_view.take() {
          Some(view) if filters == self.event_filters => view,
          _ => self.api.watch_events(&filters),
        };
        self.event_filters = filters;
        render::events(load(self.events_view.insert(view)).await?)
      }
      "event" => {
        let id = args.required(0, "event id").map_err(Report::msg)?;
        render::event(&self.api.event(id).await?)
      }
      "rsvp" => {
        let id = args.required(0, "event id").map_err(Report::msg)?;
        let toggle = self.api.toggle_event_rsvp(&self.event_filters, id).await?;
        format!("RSVP {}.\n{}", toggle.status, render::event(&toggle.event))
      }
      "event-create" => {
        let payload = new_event_payload(args)?;
        let event = self.api.create_event(&payload).await?;
        format!("Created event.\n{}", render::event(&event))
      }

      // -- prayers --
      "prayers" => {
        let category = args.get("category").map(String::from);
        let view = match self.prayers_view.take() {
          Some(view) if category == self.prayer_category => view,
          _ => self.api.watch_prayers(category.as_deref()),
        };
        self.prayer_category = category;
        render::prayers(load(self.prayers_view.insert(view)).await?)
      }
      "pray" => {
        let id = args.required(0, "prayer id").map_err(Report::msg)?;
        let toggle = self
          .api
          .toggle_prayer(self.prayer_category.as_deref(), id)
          .await?;
        format!(
          "{} ({} praying)\n",
          toggle.status, toggle.prayer.prayers_count
        )
      }
      "prayer-create" => {
        let payload = NewPrayer {
          request: args.require("request").map_err(Report::msg)?,
          category: args.text("category"),
          author_name: args.text("author"),
        };
        let prayer = self.api.create_prayer(&payload).await?;
        format!("Created prayer request {}.\n", prayer.id)
      }
      "comments" => {
        let id = args.required(0, "prayer id").map_err(Report::msg)?;
        render::comments(&self.api.prayer_comments(id).await?)
      }
      "comment" => {
        let id = args.required(0, "prayer id").map_err(Report::msg)?;
        let body = comment_body(raw_args).ok_or_else(|| eyre!("missing comment text"))?;
        let comment = self.api.add_prayer_comment(id, &body).await?;
        format!("Added comment {}.\n", comment.id)
      }
      "uncomment" => {
        let prayer = args.required(0, "prayer id").map_err(Report::msg)?;
        let comment = args.required(1, "comment id").map_err(Report::msg)?;
        if self.api.delete_prayer_comment(prayer, comment).await? {
          "Comment deleted.\n".to_string()
        } else {
          "Nothing deleted.\n".to_string()
        }
      }
      "praying" => {
        let id = args.required(0, "prayer id").map_err(Report::msg)?;
        render::praying_users(&self.api.praying_users(id).await?)
      }

      // -- notifications --
      "notifications" => render::notifications(&self.api.notifications().await?),
      "read" => {
        let id = args.required(0, "notification id").map_err(Report::msg)?;
        let item = self.api.mark_notification_read(id).await?;
        format!("Marked '{}' read.\n", item.title)
      }
      "read-all" => {
        let updated = self.api.mark_all_notifications_read().await?;
        format!("Marked {} notification(s) read.\n", updated)
      }
      "notify" => {
        let kind = args
          .text("type")
          .map(|t| t.parse::<NotificationKind>())
          .transpose()
          .map_err(Report::msg)?;
        let payload = NewNotification {
          title: args.require("title").map_err(Report::msg)?,
          body: args.require("body").map_err(Report::msg)?,
          kind,
        };
        let item = self.api.seed_notification(&payload).await?;
        format!("Created notification {}.\n", item.id)
      }
      "notify-delete" => {
        let id = args.required(0, "notification id").map_err(Report::msg)?;
        if self.api.delete_notification(id).await? {
          "Notification deleted.\n".to_string()
        } else {
          "Nothing deleted.\n".to_string()
        }
      }
      "notify-clear" => {
        let deleted = self.api.clear_notifications().await?;
        format!("Deleted {} notification(s).\n", deleted)
      }

      // -- tools --
      "forgot" => {
        let email = args
          .positional
          .first()
          .map(|e| e.trim())
          .filter(|e| !e.is_empty())
          .ok_or_else(|| eyre!("Email is required."))?;
        format!("{}\n", self.api.forgot_password(email).await?)
      }
      "reset" => {
        let token = args.positional.first().map(|t| t.trim()).unwrap_or("");
        let password = args.positional.get(1).map(String::as_str).unwrap_or("");
        if token.is_empty() || password.is_empty() {
          return Err(eyre!("Token and password are required."));
        }
        let user = self.api.reset_password(token, password).await?;
        format!("Password updated for {}\n", user.email)
      }
      "sync" => {
        let input = match raw_args.strip_prefix('@') {
          Some(path) => tokio::fs::read_to_string(path.trim())
            .await
            .map_err(|e| eyre!("Failed to read {}: {}", path.trim(), e))?,
          None => raw_args.to_string(),
        };
        let items = parse_sync_payload(&input)?;
        info!(items = items.len(), "submitting sync payload");
        render::sync_result(&self.api.sync(&items).await?)
      }
      "health" => {
        let report = self.api.client().health().await?;
        format!("{}\n", serde_json::to_string_pretty(&report)?)
      }
      "cache" => render::cache(&self.api.cache().snapshots()),

      other => return Err(eyre!("command '{}' is not available", other)),
    };
    Ok(output)
  }
}

fn help(topic: Option<&str>) -> String {
  let shown: Vec<&Command> = match topic {
    Some(topic) => commands::get_suggestions(topic),
    None => commands::COMMANDS.iter().collect(),
  };
  if shown.is_empty() {
    return "No matching commands.\n".to_string();
  }

  let mut out = String::new();
  for cmd in shown {
    out.push_str(&format!("  {:<60} {}\n", cmd.usage, cmd.description));
    if !cmd.aliases.is_empty() {
      out.push_str(&format!("  {:<60} aliases: {}\n", "", cmd.aliases.join(", ")));
    }
  }
  out
}

/// Read a mounted view through the cache and wait for its result.
async fn load<T>(view: &mut Query<T>) -> Result<&T, ApiError>
where
  T: Serialize + DeserializeOwned + Send + 'static,
{
  view.fetch();
  view.settled().await;
  match view.state() {
    QueryState::Success(data) => Ok(data),
    QueryState::Error(e) => Err(e.clone()),
    QueryState::Idle | QueryState::Loading => {
      Err(ApiError::Transport("query did not resolve".to_string()))
    }
  }
}

/// Comment text: everything after the prayer id, taken verbatim so words
/// like `a=b` survive. One pair of surrounding quotes is removed.
fn comment_body(raw_args: &str) -> Option<String> {
  let (_, rest) = raw_args.split_once(char::is_whitespace)?;
  let rest = rest.trim();
  let body = ['"', '\'']
    .iter()
    .find_map(|q| {
      rest
        .strip_prefix(*q)
        .and_then(|r| r.strip_suffix(*q))
    })
    .unwrap_or(rest)
    .trim();
  if body.is_empty() {
    None
  } else {
    Some(body.to_string())
  }
}

fn first<T>(items: &[T], n: usize) -> &[T] {
  &items[..items.len().min(n)]
}

fn check_in_payload(args: &Args) -> Result<CheckIn> {
  let coordinate = |index: usize, what: &str| -> Result<f64> {
    let raw = args.required(index, what).map_err(Report::msg)?;
    raw
      .parse::<f64>()
      .map_err(|_| eyre!("{} must be a number, got '{}'", what, raw))
  };

  let dependents = args
    .all("dependent")
    .iter()
    .map(|entry| -> Result<Dependent> {
      let (name, age) = entry
        .rsplit_once(':')
        .ok_or_else(|| eyre!("dependent must be name:age, got '{}'", entry))?;
      let age = age
        .trim()
        .parse::<u32>()
        .map_err(|_| eyre!("invalid age in '{}'", entry))?;
      Ok(Dependent {
        name: name.trim().to_string(),
        age,
      })
    })
    .collect::<Result<Vec<_>>>()?;

  Ok(CheckIn {
    latitude: coordinate(0, "latitude")?,
    longitude: coordinate(1, "longitude")?,
    timestamp: args.text("timestamp"),
    dependents,
  })
}

fn new_event_payload(args: &Args) -> Result<NewEvent> {
  let max_attendees = args
    .text("max")
    .map(|m| {
      m.parse::<u32>()
        .map_err(|_| eyre!("max must be a whole number, got '{}'", m))
    })
    .transpose()?;

  Ok(NewEvent {
    title: args.require("title").map_err(Report::msg)?,
    description: args.text("description"),
    start_time: args.require("start").map_err(Report::msg)?,
    end_time: args.text("end"),
    location: args.text("location"),
    category: args.text("category"),
    max_attendees,
  })
}

fn print_error(cmd: &Command, err: &Report) {
  println!("Error: {}", err);
  match err.downcast_ref::<ApiError>() {
    Some(api_err) => {
      if let Some(details) = api_err.details() {
        println!("  details: {}", details);
      }
      if api_err.is_unauthorized() {
        println!("  (not logged in? try 'login')");
      }
    }
    None if err.to_string().starts_with("missing") || err.to_string().ends_with("required") => {
      println!("  usage: {}", cmd.usage);
    }
    None => {}
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  fn args(line: &str) -> Args {
    Args::parse(&commands::split_words(line).unwrap())
  }

  #[test]
  fn test_comment_body_keeps_every_word() {
    assert_eq!(comment_body("p-1 see a=b and c").as_deref(), Some("see a=b and c"));
    assert_eq!(comment_body("p-1 'so good'").as_deref(), Some("so good"));
    assert_eq!(comment_body("p-1   "), None);
    assert_eq!(comment_body("p-1"), None);
  }

  #[test]
  fn test_check_in_payload() {
    let payload =
      check_in_payload(&args("40.7128 -74.006 timestamp=2024-06-02T09:00:00Z dependent=Ann:7")).unwrap();
    assert_eq!(payload.latitude, 40.7128);
    assert_eq!(payload.longitude, -74.006);
    assert_eq!(payload.timestamp.as_deref(), Some("2024-06-02T09:00:00Z"));
    assert_eq!(
      payload.dependents,
      vec![Dependent {
        name: "Ann".into(),
        age: 7
      }]
    );
  }

  #[test]
  fn test_check_in_rejects_bad_input() {
    assert!(check_in_payload(&args("north 10")).is_err());
    assert!(check_in_payload(&args("1.0")).is_err());
    assert!(check_in_payload(&args("1 2 dependent=Ann")).is_err());
  }

  #[test]
  fn test_new_event_payload() {
    let payload = new_event_payload(&args(
      r#"title="Choir practice" start=2024-07-01T18:00:00Z max=30 location=" ""#,
    ))
    .unwrap();
    assert_eq!(payload.title, "Choir practice");
    assert_eq!(payload.max_attendees, Some(30));
    assert_eq!(payload.location, None);

    let err = new_event_payload(&args("start=2024-07-01")).unwrap_err();
    assert_eq!(err.to_string(), "title= is required");
  }

  #[test]
  fn test_help_topic() {
    let out = help(Some("rsvp"));
    assert!(out.contains("rsvp <id>"));
    assert_eq!(help(Some("zzz")), "No matching commands.\n");
  }

  #[test]
  fn test_first() {
    assert_eq!(first(&[1, 2, 3], 2), &[1, 2]);
    assert_eq!(first(&[1], 5), &[1]);
  }
}
