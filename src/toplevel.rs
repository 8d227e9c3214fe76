use std::io::Cursor;
use byteorder::{NativeEndian, ReadBytesExt};
use tracing::debug;

/// Per-toplevel state flags. The first four are wire values from the
/// compositor; `Closed` is set locally when the closed event arrives.
#[derive(Debug, PartialEq, Eq, Clone, Copy)]
pub enum State {
  Maximized = 0,
  Minimized = 1,
  Activated = 2,
  Fullscreen = 3,
  Closed = 4,
}

impl State {
  fn from_u32(a: u32) -> Option<State> {
    match a {
      0 => Some(State::Maximized),
      1 => Some(State::Minimized),
      2 => Some(State::Activated),
      3 => Some(State::Fullscreen),
      _ => None,
    }
  }
}

/// Bitset of [`State`] flags accumulated from state events.
#[derive(Debug, PartialEq, Eq, Clone, Copy, Default)]
pub struct StateSet(u32);

impl StateSet {
  /// Decode the wire representation: an array of native-endian u32s.
  /// Unknown values (from newer protocol versions) are skipped.
  pub fn from_bytes(bytes: &[u8]) -> StateSet {
    let mut set = StateSet::default();
    for buf in bytes.chunks_exact(4) {
      let mut r = Cursor::new(buf);
      let a = r.read_u32::<NativeEndian>().unwrap();
      match State::from_u32(a) {
        Some(st) => set.insert(st),
        None => debug!("ignoring unknown toplevel state {}", a),
      }
    }
    set
  }

  pub fn contains(&self, st: State) -> bool {
    self.0 & (1 << st as u32) != 0
  }

  pub fn insert(&mut self, st: State) {
    self.0 |= 1 << st as u32;
  }
}

/// One remote window's accumulated state. Fields stay `None` until the
/// compositor first sets them; a consistent snapshot exists only after
/// each `Done` event.
#[derive(Debug)]
pub struct Toplevel {
  pub id: u32,
  pub title: Option<String>,
  pub app_id: Option<String>,
  pub state: StateSet,
  /// codepoint counts, cached for column alignment
  pub title_len: usize,
  pub app_id_len: usize,
  /// last icon lookup: (requested height, fetcher uid)
  pub cached_icon: Option<(u32, u32)>,
}

impl Toplevel {
  pub fn new(id: u32) -> Self {
    Self {
      id,
      title: None,
      app_id: None,
      state: StateSet::default(),
      title_len: 0,
      app_id_len: 0,
      cached_icon: None,
    }
  }

  pub fn set_title(&mut self, title: String) {
    self.title_len = title.chars().count();
    self.title = Some(title);
  }

  pub fn set_app_id(&mut self, app_id: String) {
    self.app_id_len = app_id.chars().count();
    self.app_id = Some(app_id);
  }
}

#[derive(Debug)]
pub enum Event {
  New(u32),
  Title(u32, String),
  AppId(u32, String),
  State(u32, StateSet),
  /// this toplevel's pending changes are ready to be read as one state
  Done(u32),
  Closed(u32),
  /// initial sync finished, consumers may be watching from now on
  Ready,
}
