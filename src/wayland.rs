use std::{rc::Rc, cell::{Cell, RefCell}};
use std::collections::HashMap;
use std::io::ErrorKind;

use eyre::Result;
use tokio::io::unix::AsyncFd;
use tokio::sync::mpsc::{Sender, Receiver};
use tracing::{debug, warn};
use wayland_client::{Display, EventQueue, GlobalManager, Main, global_filter, DispatchData};
use wayland_client::protocol::wl_seat::{self, WlSeat};
use wayland_protocols::wlr::unstable::foreign_toplevel::v1::client::{
  zwlr_foreign_toplevel_handle_v1::{Event, ZwlrForeignToplevelHandleV1},
  zwlr_foreign_toplevel_manager_v1::{ZwlrForeignToplevelManagerV1, self},
};

use super::toplevel;
use super::toplevel::StateSet;
use super::util::send_event;
use super::winmaid::Action;

const WLR_FOREIGN_TOPLEVEL_VERSION: u32 = 3;

/// Protocol objects we may still issue requests against.
struct Remotes {
  handles: HashMap<u32, Main<ZwlrForeignToplevelHandleV1>>,
  seats: Vec<Main<WlSeat>>,
}

impl Remotes {
  fn new() -> Self {
    Self {
      handles: HashMap::new(),
      seats: Vec::new(),
    }
  }

  fn activate(&self, id: u32) {
    let seat = match self.seats.last() {
      Some(seat) => seat,
      None => {
        warn!("no seat to activate toplevel {} with", id);
        return;
      }
    };
    debug!("activating {}", id);
    if let Some(t) = self.handles.get(&id) {
      t.activate(seat);
    }
  }

  fn close(&self, id: u32) {
    debug!("closing {}", id);
    if let Some(t) = self.handles.get(&id) {
      t.close();
    }
  }
}

/// Connect, discover the toplevel manager and pump events until the
/// manager finishes or the action channel closes.
///
/// The two `sync_roundtrip`s are the only blocking points: the first
/// completes global enumeration (and the manager bind), the second pulls
/// in the initial toplevel set. `Ready` is sent after the second one so
/// the registry flips visible only once the bulk sync is fully queued.
pub async fn run(
  event_tx: Sender<toplevel::Event>,
  mut action_rx: Receiver<Action>,
) -> Result<()> {
  let display = Display::connect_to_env()?;
  let mut event_queue = display.create_event_queue();
  let attached_display = (*display).clone().attach(event_queue.token());

  let remotes = Rc::new(RefCell::new(Remotes::new()));
  let remotes2 = remotes.clone();
  let globals = GlobalManager::new_with_cb(
    &attached_display,
    global_filter!(
      [wl_seat::WlSeat, 1, move |seat: Main<WlSeat>, _: DispatchData| {
        remotes2.borrow_mut().seats.push(seat);
      }]
    )
  );

  event_queue.sync_roundtrip(&mut (), |_, _, _| { /* we ignore unfiltered messages */ })?;

  let manager = match globals
    .instantiate_range::<ZwlrForeignToplevelManagerV1>(1, WLR_FOREIGN_TOPLEVEL_VERSION)
  {
    Ok(manager) => manager,
    Err(err) => {
      warn!(
        "compositor does not support wlr-foreign-toplevel-management: {}",
        err
      );
      // nothing to track; let the consumer paint an empty list
      send_event(&event_tx, toplevel::Event::Ready);
      return Ok(());
    }
  };

  let finished = Rc::new(Cell::new(false));
  let finished2 = finished.clone();
  let remotes3 = remotes.clone();
  let tx = event_tx.clone();
  manager.quick_assign(move |_, event, _| match event {
    zwlr_foreign_toplevel_manager_v1::Event::Toplevel { toplevel } => {
      let id = toplevel.as_ref().id();
      debug!("got a toplevel id {}", id);
      send_event(&tx, toplevel::Event::New(id));

      let tx = tx.clone();
      let remotes4 = remotes3.clone();
      toplevel.quick_assign(move |_, event, _| match event {
        Event::Title { title } => {
          debug!("toplevel@{} has title {}", id, title);
          send_event(&tx, toplevel::Event::Title(id, title));
        }
        Event::AppId { app_id } => {
          debug!("toplevel@{} has app_id {}", id, app_id);
          send_event(&tx, toplevel::Event::AppId(id, app_id));
        }
        Event::State { state } => {
          let state = StateSet::from_bytes(&state);
          debug!("toplevel@{} has state {:?}", id, state);
          send_event(&tx, toplevel::Event::State(id, state));
        }
        Event::Done => {
          debug!("{}'s info is now stable", id);
          send_event(&tx, toplevel::Event::Done(id));
        }
        Event::Closed => {
          debug!("{} has been closed", id);
          send_event(&tx, toplevel::Event::Closed(id));
          // the handle is inert and will receive no further events
          if let Some(t) = remotes4.borrow_mut().handles.remove(&id) {
            t.destroy();
          }
        }
        _ => { /* output enter/leave and parent are not tracked */ }
      });

      remotes3.borrow_mut().handles.insert(id, toplevel);
    }
    zwlr_foreign_toplevel_manager_v1::Event::Finished => {
      debug!("manager finished");
      finished2.set(true);
    }
    _ => {}
  });

  // fetch the initial set of windows
  event_queue.sync_roundtrip(&mut (), |_, _, _| {})?;
  send_event(&event_tx, toplevel::Event::Ready);

  let afd = AsyncFd::new(display.get_connection_fd())?;

  loop {
    event_queue.dispatch_pending(&mut (), |_, _, _| {})?;
    flush_display(&display)?;

    if finished.get() {
      break;
    }

    // None means events are already queued, dispatch them first
    let guard = match event_queue.prepare_read() {
      Some(guard) => guard,
      None => continue,
    };

    debug!("waiting to read from wayland server...");
    tokio::select! {
      readable = afd.readable() => {
        readable?.clear_ready();
        if let Err(err) = guard.read_events() {
          if err.kind() != ErrorKind::WouldBlock {
            return Err(err.into());
          }
        }
      }
      action = action_rx.recv() => {
        drop(guard);
        match action {
          Some(Action::Activate(id)) => remotes.borrow().activate(id),
          Some(Action::Close(id)) => remotes.borrow().close(id),
          // consumer dropped its end, shut down
          None => break,
        }
        flush_display(&display)?;
      }
    }
  }

  teardown(&display, &mut event_queue, &manager, &remotes)
}

/// Release every live handle, tell the manager to stop, then drain the
/// in-flight closed notifications with one last round-trip.
fn teardown(
  display: &Display,
  event_queue: &mut EventQueue,
  manager: &Main<ZwlrForeignToplevelManagerV1>,
  remotes: &Rc<RefCell<Remotes>>,
) -> Result<()> {
  debug!("tearing down");
  for (_, handle) in remotes.borrow_mut().handles.drain() {
    handle.destroy();
  }
  manager.stop();
  event_queue.sync_roundtrip(&mut (), |_, _, _| {})?;
  flush_display(display)
}

fn flush_display(display: &Display) -> Result<()> {
  if let Err(err) = display.flush() {
    if err.kind() != ErrorKind::WouldBlock {
      return Err(err.into());
    }
  }
  Ok(())
}
