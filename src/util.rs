use std::fmt::Debug;

use tracing::error;
use tokio::sync::mpsc::{Sender, error::TrySendError};

pub fn send_event<T: Debug>(tx: &Sender<T>, t: T) {
  if let Err(err) = tx.try_send(t) {
    match err {
      TrySendError::Full(t) => {
        error!("too many events to process! Event object discarded: {:?}", t);
      }
      TrySendError::Closed(_) => {
        panic!("channel closed unexpectedly");
      }
    }
  }
}

/// Case-insensitive token match: every token must occur somewhere in `text`.
pub fn token_match(tokens: &[String], text: &str) -> bool {
  let haystack = text.to_lowercase();
  tokens.iter().all(|t| haystack.contains(&t.to_lowercase()))
}

#[cfg(test)]
mod tests {
  use super::*;

  fn tokens(ts: &[&str]) -> Vec<String> {
    ts.iter().map(|t| t.to_string()).collect()
  }

  #[test]
  fn token_match_all_tokens_required() {
    assert!(token_match(&tokens(&["fire", "fox"]), "Firefox — issue #42"));
    assert!(!token_match(&tokens(&["fire", "chrome"]), "Firefox"));
  }

  #[test]
  fn token_match_is_case_insensitive() {
    assert!(token_match(&tokens(&["EDITOR"]), "my editor"));
    assert!(token_match(&tokens(&["editor"]), "My EDITOR"));
  }

  #[test]
  fn token_match_empty_tokens_match_anything() {
    assert!(token_match(&[], "anything"));
  }
}
