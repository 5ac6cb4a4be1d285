/// Console commands, autocomplete and argument parsing
use std::collections::BTreeMap;

#[derive(Debug, Clone)]
pub struct Command {
  pub name: &'static str,
  pub aliases: &'static [&'static str],
  pub usage: &'static str,
  pub description: &'static str,
}

/// All available commands
pub const COMMANDS: &[Command] = &[
  Command {
    name: "help",
    aliases: &["h", "?"],
    usage: "help [command]",
    description: "List commands",
  },
  Command {
    name: "login",
    aliases: &["signin"],
    usage: "login [email]",
    description: "Start an admin session (password from HPN_ADMIN_PASSWORD)",
  },
  Command {
    name: "logout",
    aliases: &["signout"],
    usage: "logout",
    description: "End the session and clear the cache",
  },
  Command {
    name: "me",
    aliases: &["whoami"],
    usage: "me",
    description: "Show the session user",
  },
  Command {
    name: "overview",
    aliases: &["o", "dashboard"],
    usage: "overview",
    description: "Attendance, events and users at a glance",
  },
  Command {
    name: "attendance",
    aliases: &["a"],
    usage: "attendance [latest | show <id>]",
    description: "Attendance records",
  },
  Command {
    name: "check-in",
    aliases: &["checkin"],
    usage: "check-in <lat> <lon> [timestamp=..] [dependent=name:age ..]",
    description: "Record a check-in",
  },
  Command {
    name: "users",
    aliases: &["u"],
    usage: "users",
    description: "List users",
  },
  Command {
    name: "user-create",
    aliases: &["signup"],
    usage: "user-create email=.. password=.. [name=..] [phone=..] [role=..]",
    description: "Create a user",
  },
  Command {
    name: "user-email",
    aliases: &[],
    usage: "user-email <id> <email>",
    description: "Change a user's email",
  },
  Command {
    name: "events",
    aliases: &["e"],
    usage: "events [search=..] [category=..]",
    description: "List events (filters are remembered for rsvp)",
  },
  Command {
    name: "event",
    aliases: &[],
    usage: "event <id>",
    description: "Show one event",
  },
  Command {
    name: "rsvp",
    aliases: &[],
    usage: "rsvp <id>",
    description: "Toggle RSVP for an event",
  },
  Command {
    name: "event-create",
    aliases: &[],
    usage: "event-create title=.. start=.. [end=..] [location=..] [category=..] [max=..] [description=..]",
    description: "Create an event",
  },
  Command {
    name: "prayers",
    aliases: &["p"],
    usage: "prayers [category=..]",
    description: "List prayer requests (category is remembered for pray)",
  },
  Command {
    name: "pray",
    aliases: &[],
    usage: "pray <id>",
    description: "Toggle praying for a request",
  },
  Command {
    name: "prayer-create",
    aliases: &[],
    usage: "prayer-create request=.. [category=..] [author=..]",
    description: "Create a prayer request",
  },
  Command {
    name: "comments",
    aliases: &[],
    usage: "comments <prayer>",
    description: "Comments on a prayer request",
  },
  Command {
    name: "comment",
    aliases: &[],
    usage: "comment <prayer> <text>",
    description: "Add a comment",
  },
  Command {
    name: "uncomment",
    aliases: &[],
    usage: "uncomment <prayer> <comment>",
    description: "Delete a comment",
  },
  Command {
    name: "praying",
    aliases: &[],
    usage: "praying <prayer>",
    description: "Users praying for a request",
  },
  Command {
    name: "notifications",
    aliases: &["n", "inbox"],
    usage: "notifications",
    description: "List notifications",
  },
  Command {
    name: "read",
    aliases: &[],
    usage: "read <id>",
    description: "Mark a notification read",
  },
  Command {
    name: "read-all",
    aliases: &[],
    usage: "read-all",
    description: "Mark every notification read",
  },
  Command {
    name: "notify",
    aliases: &[],
    usage: "notify title=.. body=.. [type=event|prayer|giving|general]",
    description: "Create a test notification",
  },
  Command {
    name: "notify-delete",
    aliases: &[],
    usage: "notify-delete <id>",
    description: "Delete a notification",
  },
  Command {
    name: "notify-clear",
    aliases: &[],
    usage: "notify-clear",
    description: "Delete every notification",
  },
  Command {
    name: "forgot",
    aliases: &[],
    usage: "forgot <email>",
    description: "Request a password reset token",
  },
  Command {
    name: "reset",
    aliases: &[],
    usage: "reset <token> <password>",
    description: "Set a new password with a reset token",
  },
  Command {
    name: "sync",
    aliases: &[],
    usage: "sync <json | @file>",
    description: "Submit device changes and show conflicts",
  },
  Command {
    name: "health",
    aliases: &[],
    usage: "health",
    description: "Show the backend health report",
  },
  Command {
    name: "cache",
    aliases: &["c"],
    usage: "cache",
    description: "Inspect cached queries",
  },
  Command {
    name: "quit",
    aliases: &["q", "exit"],
    usage: "quit",
    description: "Exit hpn-admin",
  },
];

/// Get autocomplete suggestions for a given input
pub fn get_suggestions(input: &str) -> Vec<&'static Command> {
  let input_lower = input.to_lowercase();

  if input_lower.is_empty() {
    return COMMANDS.iter().collect();
  }

  let mut matches: Vec<(&Command, u32)> = Vec::new();

  for cmd in COMMANDS {
    // Exact match on name
    if cmd.name == input_lower {
      matches.push((cmd, 0)); // Highest priority
      continue;
    }

    // Exact match on alias
    if cmd.aliases.contains(&input_lower.as_str()) {
      matches.push((cmd, 1));
      continue;
    }

    // Prefix match on name
    if cmd.name.starts_with(&input_lower) {
      matches.push((cmd, 2));
      continue;
    }

    // Prefix match on alias
    if cmd.aliases.iter().any(|a| a.starts_with(&input_lower)) {
      matches.push((cmd, 3));
      continue;
    }

    // Fuzzy match (contains)
    if cmd.name.contains(&input_lower) {
      matches.push((cmd, 4));
      continue;
    }

    // Fuzzy match on alias
    if cmd.aliases.iter().any(|a| a.contains(&input_lower)) {
      matches.push((cmd, 5));
    }
  }

  // Sort by priority (stable, so registry order breaks ties)
  matches.sort_by_key(|(_, priority)| *priority);

  matches.into_iter().map(|(cmd, _)| cmd).collect()
}

/// Resolve typed input to a command.
///
/// Exact names and aliases always win. A prefix resolves only when it names
/// a single command; fuzzy matches never run a command.
pub fn resolve(input: &str) -> Result<&'static Command, Vec<&'static Command>> {
  let input_lower = input.to_lowercase();
  if let Some(cmd) = COMMANDS
    .iter()
    .find(|c| c.name == input_lower || c.aliases.contains(&input_lower.as_str()))
  {
    return Ok(cmd);
  }

  let prefixed: Vec<&'static Command> = COMMANDS
    .iter()
    .filter(|c| c.name.starts_with(&input_lower))
    .collect();
  match prefixed.as_slice() {
    [only] => Ok(*only),
    _ => Err(get_suggestions(input)),
  }
}

/// Split a command line into words.
///
/// Words are separated by whitespace; single or double quotes group words,
/// and may appear inside a word (`title="Choir practice"`).
pub fn split_words(line: &str) -> Result<Vec<String>, String> {
  let mut words = Vec::new();
  let mut current = String::new();
  let mut in_word = false;
  let mut quote: Option<char> = None;

  for c in line.chars() {
    match quote {
      Some(q) if c == q => quote = None,
      Some(_) => current.push(c),
      None if c == '"' || c == '\'' => {
        quote = Some(c);
        in_word = true;
      }
      None if c.is_whitespace() => {
        if in_word {
          words.push(std::mem::take(&mut current));
          in_word = false;
        }
      }
      None => {
        current.push(c);
        in_word = true;
      }
    }
  }

  if let Some(q) = quote {
    return Err(format!("unterminated {} quote", q));
  }
  if in_word {
    words.push(current);
  }
  Ok(words)
}

/// Arguments of one command: positionals plus `key=value` options.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Args {
  pub positional: Vec<String>,
  pub options: BTreeMap<String, Vec<String>>,
}

impl Args {
  pub fn parse(words: &[String]) -> Self {
    let mut args = Args::default();
    for word in words {
      match word.split_once('=') {
        Some((key, value)) if !key.is_empty() => {
          args
            .options
            .entry(key.to_lowercase())
            .or_default()
            .push(value.to_string());
        }
        _ => args.positional.push(word.clone()),
      }
    }
    args
  }

  /// Positional argument `index`, or an error naming `what`.
  pub fn required(&self, index: usize, what: &str) -> Result<&str, String> {
    self
      .positional
      .get(index)
      .map(String::as_str)
      .ok_or_else(|| format!("missing {}", what))
  }

  /// Last value of option `key`.
  pub fn get(&self, key: &str) -> Option<&str> {
    self.options.get(key)?.last().map(String::as_str)
  }

  /// Non-blank value of option `key`, trimmed.
  pub fn text(&self, key: &str) -> Option<String> {
    self
      .get(key)
      .map(str::trim)
      .filter(|v| !v.is_empty())
      .map(String::from)
  }

  pub fn require(&self, key: &str) -> Result<String, String> {
    self.text(key).ok_or_else(|| format!("{}= is required", key))
  }

  /// Every value given for option `key`.
  pub fn all(&self, key: &str) -> &[String] {
    self.options.get(key).map(Vec::as_slice).unwrap_or(&[])
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  fn words(line: &str) -> Vec<String> {
    split_words(line).unwrap()
  }

  #[test]
  fn test_empty_input_returns_all() {
    let suggestions = get_suggestions("");
    assert_eq!(suggestions.len(), COMMANDS.len());
  }

  #[test]
  fn test_exact_match() {
    let suggestions = get_suggestions("events");
    assert!(!suggestions.is_empty());
    assert_eq!(suggestions[0].name, "events");
  }

  #[test]
  fn test_alias_match() {
    let suggestions = get_suggestions("n");
    assert!(!suggestions.is_empty());
    assert_eq!(suggestions[0].name, "notifications");
  }

  #[test]
  fn test_prefix_match() {
    let suggestions = get_suggestions("over");
    assert!(!suggestions.is_empty());
    assert_eq!(suggestions[0].name, "overview");
  }

  #[test]
  fn test_fuzzy_match() {
    let suggestions = get_suggestions("ficat");
    assert!(!suggestions.is_empty());
    assert_eq!(suggestions[0].name, "notifications");
  }

  #[test]
  fn test_resolve() {
    assert_eq!(resolve("q").unwrap().name, "quit");
    assert_eq!(resolve("Events").unwrap().name, "events");
    assert_eq!(resolve("overv").unwrap().name, "overview");
    assert_eq!(resolve("event").unwrap().name, "event");

    let ambiguous = resolve("pr").unwrap_err();
    assert!(ambiguous.iter().any(|c| c.name == "prayers"));
    assert!(ambiguous.iter().any(|c| c.name == "prayer-create"));

    assert!(resolve("zzz").unwrap_err().is_empty());
  }

  #[test]
  fn test_split_words_quotes() {
    assert_eq!(
      words(r#"event-create title="Choir practice" start=2024-07-01T18:00:00Z"#),
      vec!["event-create", "title=Choir practice", "start=2024-07-01T18:00:00Z"]
    );
    assert_eq!(words("comment p-1 'so good'  "), vec!["comment", "p-1", "so good"]);
    assert_eq!(words(r#"search="""#), vec!["search="]);
    assert!(split_words("notify title=\"oops").is_err());
  }

  #[test]
  fn test_args() {
    let args = Args::parse(&words("p-1 great news category=youth dependent=Ann:7 dependent=Ben:4"));
    assert_eq!(args.required(0, "prayer id"), Ok("p-1"));
    assert_eq!(args.positional, ["p-1", "great", "news"]);
    assert_eq!(args.get("category"), Some("youth"));
    assert_eq!(args.all("dependent"), ["Ann:7", "Ben:4"]);
    assert!(args.required(5, "x").is_err());
  }

  #[test]
  fn test_blank_option_is_absent() {
    let args = Args::parse(&words("search=  category=youth"));
    assert_eq!(args.text("search"), None);
    assert_eq!(args.require("title").unwrap_err(), "title= is required");
  }
}
