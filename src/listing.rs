use std::sync::{Arc, RwLock};

use tokio::sync::mpsc::Sender;

use super::format::Formatter;
use super::icons::IconFetcher;
use super::toplevel::State;
use super::util::{send_event, token_match};
use super::winmaid::{Action, WinMaid};

/// Shown when an index no longer resolves to a live window.
pub const VANISHED: &str = "Window has vanished";

/// Shown when a row renders to nothing (e.g. `{t}` with no title yet).
pub const NO_TEXT: &str = "n/a";

/// Read-only view over the live toplevel set for a window-list UI.
///
/// Indexes refer to the current snapshot and may go stale across a
/// removal; every lookup miss resolves to a sentinel rather than a fault.
pub struct Listing<F: IconFetcher> {
  maid: Arc<RwLock<WinMaid>>,
  action_tx: Sender<Action>,
  formatter: Formatter,
  icons: F,
}

impl<F: IconFetcher> Listing<F> {
  pub fn new<S: Into<String>>(
    maid: Arc<RwLock<WinMaid>>,
    action_tx: Sender<Action>,
    template: S,
    icons: F,
  ) -> Self {
    Self {
      maid,
      action_tx,
      formatter: Formatter::new(template),
      icons,
    }
  }

  pub fn count(&self) -> usize {
    self.maid.read().unwrap().len()
  }

  pub fn display_text(&self, index: usize) -> String {
    let maid = self.maid.read().unwrap();
    match maid.get(index) {
      Some(t) if !t.state.contains(State::Closed) => {
        let text = self.formatter.render(t, maid.max_title_len(), maid.max_app_id_len());
        if text.is_empty() {
          NO_TEXT.to_owned()
        } else {
          text
        }
      }
      _ => VANISHED.to_owned(),
    }
  }

  pub fn is_active(&self, index: usize) -> bool {
    let maid = self.maid.read().unwrap();
    maid
      .get(index)
      .map(|t| t.state.contains(State::Activated))
      .unwrap_or(false)
  }

  /// Token match against the raw (unformatted) title.
  pub fn matches(&self, index: usize, tokens: &[String]) -> bool {
    let maid = self.maid.read().unwrap();
    maid
      .get(index)
      .and_then(|t| t.title.as_deref())
      .map(|title| token_match(tokens, title))
      .unwrap_or(false)
  }

  /// Ask the compositor to focus this window. The `Activated` state comes
  /// back asynchronously through a later state/done event.
  pub fn activate(&self, index: usize) {
    if let Some(id) = self.id_at(index) {
      send_event(&self.action_tx, Action::Activate(id));
    }
  }

  /// Ask the compositor to close this window. The entry stays listed
  /// until the closed event is delivered back.
  pub fn close(&self, index: usize) {
    if let Some(id) = self.id_at(index) {
      send_event(&self.action_tx, Action::Close(id));
    }
  }

  pub fn icon(&mut self, index: usize, height: u32) -> Option<F::Image> {
    let mut maid = self.maid.write().unwrap();
    let t = maid.get_mut(index)?;
    // some apps don't have an app_id (WM_CLASS), that's fine
    let app_id = t.app_id.clone().filter(|a| !a.is_empty())?;

    if let Some((h, uid)) = t.cached_icon {
      if h == height {
        return self.icons.get(uid);
      }
    }

    let uid = self.icons.query(&app_id, height);
    t.cached_icon = Some((height, uid));
    if let Some(icon) = self.icons.get(uid) {
      return Some(icon);
    }

    // retry with a lower-cased app id; cache the result even on a hard
    // miss so we do not query again at this height
    let uid = self.icons.query(&app_id.to_lowercase(), height);
    t.cached_icon = Some((height, uid));
    self.icons.get(uid)
  }

  fn id_at(&self, index: usize) -> Option<u32> {
    self.maid.read().unwrap().get(index).map(|t| t.id)
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use std::cell::RefCell;
  use std::collections::HashMap;
  use std::rc::Rc;
  use tokio::sync::mpsc::{self, Receiver};
  use tokio::sync::watch;
  use crate::toplevel::Event;

  /// Counts queries; a key present in `known` resolves to a non-zero uid,
  /// anything else misses (uid 0).
  struct FakeIcons {
    known: HashMap<String, u32>,
    queries: Rc<RefCell<Vec<(String, u32)>>>,
  }

  impl FakeIcons {
    fn new(known: &[(&str, u32)]) -> (Self, Rc<RefCell<Vec<(String, u32)>>>) {
      let queries = Rc::new(RefCell::new(Vec::new()));
      let fake = Self {
        known: known.iter().map(|(k, v)| (k.to_string(), *v)).collect(),
        queries: queries.clone(),
      };
      (fake, queries)
    }
  }

  impl IconFetcher for FakeIcons {
    type Image = u32;

    fn query(&mut self, key: &str, size: u32) -> u32 {
      self.queries.borrow_mut().push((key.to_owned(), size));
      self.known.get(key).copied().unwrap_or(0)
    }

    fn get(&mut self, uid: u32) -> Option<u32> {
      (uid != 0).then_some(uid)
    }
  }

  fn listing(
    template: &str,
    icons: FakeIcons,
  ) -> (Listing<FakeIcons>, Receiver<Action>) {
    let (render_tx, _) = watch::channel(0);
    let (action_tx, action_rx) = mpsc::channel(16);
    let maid = Arc::new(RwLock::new(WinMaid::new(render_tx)));
    (Listing::new(maid, action_tx, template, icons), action_rx)
  }

  fn announce(listing: &Listing<FakeIcons>, id: u32, title: &str, app_id: &str) {
    let mut maid = listing.maid.write().unwrap();
    maid.handle_event(Event::New(id));
    if !title.is_empty() {
      maid.handle_event(Event::Title(id, title.to_owned()));
    }
    if !app_id.is_empty() {
      maid.handle_event(Event::AppId(id, app_id.to_owned()));
    }
    maid.handle_event(Event::Done(id));
  }

  #[test]
  fn formats_committed_row() {
    let (fake, _) = FakeIcons::new(&[]);
    let (listing, _rx) = listing("{t}", fake);
    announce(&listing, 1, "Editor", "edit.App");
    listing.maid.write().unwrap().handle_event(Event::Ready);
    assert_eq!(listing.count(), 1);
    assert_eq!(listing.display_text(0), "Editor");
    assert!(!listing.is_active(0));
  }

  #[test]
  fn titleless_row_renders_placeholder_text() {
    let (fake, _) = FakeIcons::new(&[]);
    let (listing, _rx) = listing("{t}", fake);
    announce(&listing, 1, "", "edit.App");
    assert_eq!(listing.display_text(0), NO_TEXT);
  }

  #[test]
  fn stale_index_resolves_to_sentinel() {
    let (fake, _) = FakeIcons::new(&[]);
    let (listing, _rx) = listing("{t}", fake);
    announce(&listing, 1, "Editor", "edit.App");
    listing.maid.write().unwrap().handle_event(Event::Closed(1));
    assert_eq!(listing.count(), 0);
    assert_eq!(listing.display_text(0), VANISHED);
    assert!(!listing.is_active(0));
  }

  #[test]
  fn matches_raw_title() {
    let (fake, _) = FakeIcons::new(&[]);
    let (listing, _rx) = listing("{t:2}", fake);
    announce(&listing, 1, "Mail & News", "mail.App");
    // formatted text is truncated and escaped, the match is not
    assert!(listing.matches(0, &["mail".to_owned(), "&".to_owned()]));
    assert!(!listing.matches(0, &["browser".to_owned()]));
    assert!(!listing.matches(5, &["mail".to_owned()]));
  }

  #[test]
  fn activate_and_close_send_requests() {
    let (fake, _) = FakeIcons::new(&[]);
    let (listing, mut rx) = listing("{t}", fake);
    announce(&listing, 7, "Editor", "edit.App");

    listing.activate(0);
    assert!(matches!(rx.try_recv(), Ok(Action::Activate(7))));
    // no local state change until the compositor echoes it back
    assert!(!listing.is_active(0));

    listing.close(0);
    assert!(matches!(rx.try_recv(), Ok(Action::Close(7))));
    assert_eq!(listing.count(), 1);

    listing.activate(3);
    assert!(rx.try_recv().is_err(), "stale index must not send a request");
  }

  #[test]
  fn icon_lookup_is_cached_per_height() {
    let (fake, queries) = FakeIcons::new(&[("edit.App", 7)]);
    let (mut listing, _rx) = listing("{t}", fake);
    announce(&listing, 1, "Editor", "edit.App");

    assert_eq!(listing.icon(0, 32), Some(7));
    assert_eq!(queries.borrow().len(), 1);
    assert_eq!(listing.icon(0, 32), Some(7));
    assert_eq!(queries.borrow().len(), 1, "second call at same height must hit the cache");

    assert_eq!(listing.icon(0, 48), Some(7));
    assert_eq!(queries.borrow().len(), 2, "new height must query again");
  }

  #[test]
  fn icon_retries_with_lowercase_key() {
    let (fake, queries) = FakeIcons::new(&[("firefox", 3)]);
    let (mut listing, _rx) = listing("{t}", fake);
    announce(&listing, 1, "Browser", "Firefox");

    assert_eq!(listing.icon(0, 32), Some(3));
    assert_eq!(
      &*queries.borrow(),
      &[("Firefox".to_owned(), 32), ("firefox".to_owned(), 32)]
    );

    // the lowercase hit is cached, no further queries
    assert_eq!(listing.icon(0, 32), Some(3));
    assert_eq!(queries.borrow().len(), 2);
  }

  #[test]
  fn icon_hard_miss_is_cached_too() {
    let (fake, queries) = FakeIcons::new(&[]);
    let (mut listing, _rx) = listing("{t}", fake);
    announce(&listing, 1, "Mystery", "ghost");

    assert_eq!(listing.icon(0, 32), None);
    assert_eq!(queries.borrow().len(), 2);
    assert_eq!(listing.icon(0, 32), None);
    assert_eq!(queries.borrow().len(), 2, "a miss must not be re-queried");
  }

  #[test]
  fn icon_requires_app_id() {
    let (fake, queries) = FakeIcons::new(&[]);
    let (mut listing, _rx) = listing("{t}", fake);
    announce(&listing, 1, "No class", "");
    assert_eq!(listing.icon(0, 32), None);
    assert!(queries.borrow().is_empty());
  }
}
