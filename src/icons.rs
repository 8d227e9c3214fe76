/// External keyed icon cache. `query` resolves a key and size to a cache
/// uid (cheap, always succeeds); `get` fetches the loaded image for a uid,
/// `None` when the cache has nothing for it.
pub trait IconFetcher {
  type Image;

  fn query(&mut self, key: &str, size: u32) -> u32;
  fn get(&mut self, uid: u32) -> Option<Self::Image>;
}

/// Fetcher for consumers that do not render icons.
pub struct NoIcons;

impl IconFetcher for NoIcons {
  type Image = ();

  fn query(&mut self, _key: &str, _size: u32) -> u32 {
    0
  }

  fn get(&mut self, _uid: u32) -> Option<()> {
    None
  }
}
