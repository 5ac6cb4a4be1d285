use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::sync::mpsc;

/// Console events
#[derive(Debug, PartialEq, Eq)]
pub enum Event {
  /// One line typed at the prompt
  Line(String),
  /// Ctrl-C
  Interrupt,
  /// Input closed (Ctrl-D or end of piped input)
  Eof,
}

/// Event handler that produces events from stdin lines and Ctrl-C
pub struct EventHandler {
  rx: mpsc::UnboundedReceiver<Event>,
}

impl EventHandler {
  pub fn new() -> Self {
    let (tx, rx) = mpsc::unbounded_channel();

    // Spawn stdin reader
    let lines_tx = tx.clone();
    tokio::spawn(async move {
      let mut lines = BufReader::new(tokio::io::stdin()).lines();
      loop {
        let event = match lines.next_line().await {
          Ok(Some(line)) => Event::Line(line),
          Ok(None) | Err(_) => Event::Eof,
        };
        let done = event == Event::Eof;
        if lines_tx.send(event).is_err() || done {
          break;
        }
      }
    });

    // Spawn Ctrl-C listener
    tokio::spawn(async move {
      while tokio::signal::ctrl_c().await.is_ok() {
        if tx.send(Event::Interrupt).is_err() {
          break;
        }
      }
    });

    Self { rx }
  }

  /// Receive the next event
  pub async fn next(&mut self) -> Option<Event> {
    self.rx.recv().await
  }
}
