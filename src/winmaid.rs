use std::sync::{Arc, RwLock};

use tokio::sync::mpsc::Receiver;
use tokio::sync::watch;
use tracing::debug;

use super::toplevel::{Event, State, Toplevel};

/// Requests going back out to the compositor. Fire-and-forget: the effect
/// is observed only through later inbound events.
#[derive(Debug)]
pub enum Action {
  Activate(u32),
  Close(u32),
}

/// Owns the live set of toplevels and folds the event stream into it.
///
/// Toplevels are kept newest-first; that order is what consumers index
/// into and it is never re-sorted. Until the `Ready` marker arrives the
/// registry is in bulk initial sync: column maxima are folded in
/// incrementally and no re-render is signaled because nobody is reading.
pub struct WinMaid {
  toplevels: Vec<Toplevel>,
  visible: bool,
  title_len: usize,
  app_id_len: usize,
  render_tx: watch::Sender<u64>,
}

impl WinMaid {
  pub fn new(render_tx: watch::Sender<u64>) -> Self {
    Self {
      toplevels: Vec::new(),
      visible: false,
      title_len: 0,
      app_id_len: 0,
      render_tx,
    }
  }

  pub async fn run(maid: Arc<RwLock<Self>>, mut rx: Receiver<Event>) {
    while let Some(event) = rx.recv().await {
      maid.write().unwrap().handle_event(event);
    }
  }

  pub fn handle_event(&mut self, event: Event) {
    match event {
      Event::New(id) => {
        debug!("got a toplevel id {}", id);
        self.toplevels.insert(0, Toplevel::new(id));
      }
      Event::Title(id, title) => {
        if let Some(t) = self.find_mut(id) {
          t.set_title(title);
        }
      }
      Event::AppId(id, app_id) => {
        if let Some(t) = self.find_mut(id) {
          t.set_app_id(app_id);
        }
      }
      Event::State(id, state) => {
        if let Some(t) = self.find_mut(id) {
          t.state = state;
        }
      }
      Event::Done(id) => self.commit(id),
      Event::Closed(id) => self.close(id),
      Event::Ready => {
        self.visible = true;
        self.notify_render();
      }
    }
  }

  /// A terminator event: this toplevel's fields now form one consistent
  /// state and the shared column maxima may be recomputed.
  fn commit(&mut self, id: u32) {
    let (title_len, app_id_len) = match self.toplevels.iter().find(|t| t.id == id) {
      Some(t) => {
        debug!("{}'s info is now stable: title={:?} app_id={:?} state={:?}",
          id, t.title, t.app_id, t.state);
        (t.title_len, t.app_id_len)
      }
      // event for a handle we already released, ignore
      None => return,
    };
    if !self.visible {
      // initial fetch, just fold in the current item
      self.title_len = self.title_len.max(title_len);
      self.app_id_len = self.app_id_len.max(app_id_len);
    } else {
      // async update, recalculate from scratch
      self.update_max_len();
      self.notify_render();
    }
  }

  fn close(&mut self, id: u32) {
    let pos = match self.toplevels.iter().position(|t| t.id == id) {
      Some(pos) => pos,
      // duplicate closed event for an already removed handle
      None => return,
    };
    let mut t = self.toplevels.remove(pos);
    t.state.insert(State::Closed);
    debug!("{} has been closed", id);
    self.update_max_len();
    if self.visible {
      self.notify_render();
    }
  }

  fn update_max_len(&mut self) {
    self.title_len = self.toplevels.iter().map(|t| t.title_len).max().unwrap_or(0);
    self.app_id_len = self.toplevels.iter().map(|t| t.app_id_len).max().unwrap_or(0);
  }

  fn notify_render(&self) {
    self.render_tx.send_modify(|generation| *generation += 1);
  }

  fn find_mut(&mut self, id: u32) -> Option<&mut Toplevel> {
    self.toplevels.iter_mut().find(|t| t.id == id)
  }

  pub fn len(&self) -> usize {
    self.toplevels.len()
  }

  pub fn get(&self, index: usize) -> Option<&Toplevel> {
    self.toplevels.get(index)
  }

  pub fn get_mut(&mut self, index: usize) -> Option<&mut Toplevel> {
    self.toplevels.get_mut(index)
  }

  pub fn max_title_len(&self) -> usize {
    self.title_len
  }

  pub fn max_app_id_len(&self) -> usize {
    self.app_id_len
  }
}
