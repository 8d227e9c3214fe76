use std::sync::{Arc, RwLock};

use eyre::Result;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::sync::{mpsc, watch};
use tracing_subscriber::EnvFilter;

mod format;
mod icons;
mod listing;
mod toplevel;
mod util;
mod wayland;
mod winmaid;

use icons::NoIcons;
use listing::Listing;
use winmaid::WinMaid;

const DEFAULT_WINDOW_FORMAT: &str = "{t}";

fn main() -> Result<()> {
  if std::env::var("RUST_LOG").is_err() {
    std::env::set_var("RUST_LOG", "warn")
  }
  if std::env::var("RUST_SPANTRACE").is_err() {
    std::env::set_var("RUST_SPANTRACE", "0");
  }
  color_eyre::install()?;
  let fmt = tracing_subscriber::fmt::fmt()
    .with_writer(std::io::stderr)
    .with_env_filter(EnvFilter::from_default_env());
  if !atty::is(atty::Stream::Stderr) {
    fmt.without_time().init();
  } else {
    fmt.init();
  }

  let window_format =
    std::env::var("WINMAID_FORMAT").unwrap_or_else(|_| DEFAULT_WINDOW_FORMAT.to_owned());

  let (event_tx, event_rx) = mpsc::channel(1024);
  let (action_tx, action_rx) = mpsc::channel(64);
  let (render_tx, render_rx) = watch::channel(0);

  let maid = Arc::new(RwLock::new(WinMaid::new(render_tx)));
  let listing = Listing::new(Arc::clone(&maid), action_tx, window_format, NoIcons);

  let fu1 = wayland::run(event_tx, action_rx);
  let fu2 = WinMaid::run(maid, event_rx);
  let fu3 = view(listing, render_rx);

  let rt = tokio::runtime::Builder::new_current_thread()
    .enable_all()
    .build()
    .unwrap();
  rt.block_on(async {
    tokio::select! {
      res = fu1 => res,
      _ = fu2 => Ok(()),
      _ = fu3 => Ok(()),
    }
  })
}

/// Stand-in consumer: repaints on every re-render signal and takes
/// one-letter commands on stdin (a/c <index>, f <tokens>, q).
async fn view(listing: Listing<NoIcons>, mut render_rx: watch::Receiver<u64>) {
  let mut lines = BufReader::new(tokio::io::stdin()).lines();
  loop {
    tokio::select! {
      changed = render_rx.changed() => {
        if changed.is_err() {
          break;
        }
        paint(&listing);
      }
      line = lines.next_line() => {
        match line.unwrap_or(None) {
          Some(line) => {
            if !command(&listing, &line) {
              break;
            }
          }
          None => break,
        }
      }
    }
  }
}

fn paint(listing: &Listing<NoIcons>) {
  let count = listing.count();
  println!("-- {} windows --", count);
  for i in 0..count {
    let marker = if listing.is_active(i) { '*' } else { ' ' };
    println!("{} [{}] {}", marker, i, listing.display_text(i));
  }
}

fn command(listing: &Listing<NoIcons>, line: &str) -> bool {
  let mut words = line.split_whitespace();
  match words.next() {
    Some("a") => {
      if let Some(i) = words.next().and_then(|w| w.parse().ok()) {
        listing.activate(i);
      }
    }
    Some("c") => {
      if let Some(i) = words.next().and_then(|w| w.parse().ok()) {
        listing.close(i);
      }
    }
    Some("f") => {
      let tokens: Vec<String> = words.map(str::to_owned).collect();
      for i in 0..listing.count() {
        if listing.matches(i, &tokens) {
          println!("  [{}] {}", i, listing.display_text(i));
        }
      }
    }
    Some("q") => return false,
    Some(other) => println!("unknown command {:?} (a/c <index>, f <tokens>, q)", other),
    None => paint(listing),
  }
  true
}
