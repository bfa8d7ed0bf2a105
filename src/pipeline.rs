use anyhow::{Result, anyhow};
use log::{debug, error, info, warn};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, mpsc};
use std::{
    thread,
    time::{Duration, Instant},
};

use evdev::{Device, EventType, InputEvent, KeyCode, RelativeAxisCode, SynchronizationCode};
use notify::{RecursiveMode, Watcher};
use signal_hook::consts::{SIGINT, SIGTERM};
use signal_hook::iterator::Signals;

use intentctl::config::ConfigState;
use intentctl::input;
use intentctl::{IntentTracker, Point, StaticSurface, TargetRect, Viewport};

#[derive(Debug, Clone)]
pub struct WatchOptions {
    pub viewport: Viewport,
    pub target: TargetRect,
    pub threshold: f64,
    /// Pixels scrolled per wheel detent.
    pub wheel_px: f64,
}

/// Everything one device reported between two SYN_REPORTs.
#[derive(Debug, Default, PartialEq)]
struct Frame {
    dx: f64,
    dy: f64,
    wheel: i32,
    clicked: bool,
}

impl Frame {
    fn moved(&self) -> bool {
        self.dx != 0.0 || self.dy != 0.0
    }

    /// Accumulate one event; on SYN_REPORT the finished frame is handed back
    /// and this one starts over.
    fn push(&mut self, ev: &InputEvent) -> Option<Frame> {
        if ev.event_type() == EventType::RELATIVE {
            match ev.code() {
                c if c == RelativeAxisCode::REL_X.0 => self.dx += f64::from(ev.value()),
                c if c == RelativeAxisCode::REL_Y.0 => self.dy += f64::from(ev.value()),
                c if c == RelativeAxisCode::REL_WHEEL.0 => self.wheel += ev.value(),
                _ => {}
            }
        } else if ev.event_type() == EventType::KEY {
            if ev.code() == KeyCode::BTN_LEFT.0 && ev.value() == 1 {
                self.clicked = true;
            }
        } else if ev.event_type() == EventType::SYNCHRONIZATION
            && ev.code() == SynchronizationCode::SYN_REPORT.0
        {
            return Some(std::mem::take(self));
        }
        None
    }
}

/// Drive a tracker from live relative-pointer devices until SIGINT/SIGTERM.
pub fn run_watch(mut cfg: ConfigState, opts: WatchOptions) -> Result<()> {
    let devices = input::discover_pointers();
    if devices.is_empty() {
        return Err(anyhow!(
            "no pointer devices detected; run `intentctl doctor`"
        ));
    }

    let mut devs: Vec<Device> = vec![];
    for d in devices {
        match Device::open(&d.path) {
            Ok(mut dev) => {
                if let Err(e) = dev.set_nonblocking(true) {
                    warn!("{}: cannot switch to non-blocking: {e}", d.path);
                    continue;
                }
                info!("watching {} ({})", d.name, d.path);
                devs.push(dev);
            }
            Err(e) => warn!("failed to open {}: {e}", d.path),
        }
    }
    if devs.is_empty() {
        return Err(anyhow!("failed to open all detected pointer devices"));
    }

    // stop flag
    let stop = Arc::new(AtomicBool::new(false));
    let mut signals = Signals::new([SIGINT, SIGTERM])?;
    let signal_handle = signals.handle();
    {
        let stop = stop.clone();
        thread::spawn(move || {
            if let Some(sig) = signals.forever().next() {
                info!("received signal {sig}, stopping");
                stop.store(true, Ordering::SeqCst);
            }
        });
    }

    // profile hot reload
    let (tx_reload, rx_reload) = mpsc::channel::<()>();
    let active_path = cfg.active_path();
    let mut watcher = notify::recommended_watcher(move |res: notify::Result<notify::Event>| {
        match res {
            Ok(ev) if ev.kind.is_modify() || ev.kind.is_create() => {
                if ev.paths.iter().any(|p| p == &active_path) {
                    let _ = tx_reload.send(());
                }
            }
            Ok(_) => {}
            Err(e) => error!("profile watcher error: {e}"),
        }
    })?;
    watcher.watch(&cfg.profiles_dir, RecursiveMode::NonRecursive)?;

    let mut tracker =
        IntentTracker::create(cfg.profile.tuning.clone(), StaticSurface(opts.viewport))?;
    tracker.on_intent_change(|score| debug!("intent score {score:.1}"));

    let start = Instant::now();
    let mut cursor = Point::new(opts.viewport.width / 2.0, opts.viewport.height / 2.0);
    let mut target = Some(opts.target);
    let mut scroll_y = 0.0f64;
    let mut had_intent = false;
    let mut frames: Vec<Frame> = devs.iter().map(|_| Frame::default()).collect();

    info!(
        "tracking intent for target {:?} on a {}x{} viewport (profile '{}')",
        opts.target, opts.viewport.width, opts.viewport.height, cfg.active_name
    );

    while !stop.load(Ordering::SeqCst) {
        let mut any_event = false;

        for (dev, frame) in devs.iter_mut().zip(frames.iter_mut()) {
            let Ok(events) = dev.fetch_events() else {
                continue;
            };
            for ev in events {
                any_event = true;

                if let Some(f) = frame.push(&ev) {
                    let now = start.elapsed().as_millis() as u64;

                    if f.moved() {
                        cursor.x = (cursor.x + f.dx).clamp(0.0, opts.viewport.width);
                        cursor.y = (cursor.y + f.dy).clamp(0.0, opts.viewport.height);
                        if let Err(e) = tracker.track_pointer_move(cursor, now, target.take()) {
                            warn!("pointer sample rejected: {e}");
                        }
                    }
                    if f.wheel != 0 {
                        // wheel up is a positive detent and scrolls toward the top
                        scroll_y = (scroll_y - f64::from(f.wheel) * opts.wheel_px).max(0.0);
                        if let Err(e) = tracker.track_scroll(scroll_y, now) {
                            warn!("scroll rejected: {e}");
                        }
                    }
                    if f.clicked {
                        if let Err(e) = tracker.track_click(cursor, now) {
                            warn!("click rejected: {e}");
                        }
                    }
                }
            }
        }

        let now = start.elapsed().as_millis() as u64;
        if let Err(e) = tracker.tick(now) {
            error!("tick failed: {e}");
        }

        if rx_reload.try_iter().count() > 0 {
            match cfg.reload() {
                Ok(()) => {
                    tracker.set_tuning(cfg.profile.tuning.clone());
                    info!("profile '{}' reloaded", cfg.active_name);
                }
                Err(e) => error!("reload failed, keeping last good profile: {e}"),
            }
        }

        let has_intent = tracker.has_intent(opts.threshold);
        if has_intent != had_intent {
            let snap = tracker.debug_snapshot();
            info!(
                "intent {} at ({:.0},{:.0}): score {:.1}, state {}",
                if has_intent { "gained" } else { "lost" },
                snap.cursor.x,
                snap.cursor.y,
                snap.scores.button,
                snap.state.current.as_str()
            );
            had_intent = has_intent;
        }

        if !any_event {
            thread::sleep(Duration::from_millis(4));
        }
    }

    signal_handle.close();
    drop(watcher);
    tracker.dispose();
    info!("watch stopped");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn rel(code: RelativeAxisCode, value: i32) -> InputEvent {
        InputEvent::new(EventType::RELATIVE.0, code.0, value)
    }

    fn syn() -> InputEvent {
        InputEvent::new(
            EventType::SYNCHRONIZATION.0,
            SynchronizationCode::SYN_REPORT.0,
            0,
        )
    }

    #[test]
    fn frame_collects_until_syn_report() {
        let mut f = Frame::default();
        assert_eq!(f.push(&rel(RelativeAxisCode::REL_X, 3)), None);
        assert_eq!(f.push(&rel(RelativeAxisCode::REL_X, 2)), None);
        assert_eq!(f.push(&rel(RelativeAxisCode::REL_WHEEL, -1)), None);
        assert_eq!(
            f.push(&InputEvent::new(EventType::KEY.0, KeyCode::BTN_LEFT.0, 1)),
            None
        );

        let done = f.push(&syn()).unwrap();
        assert_eq!(
            done,
            Frame {
                dx: 5.0,
                dy: 0.0,
                wheel: -1,
                clicked: true
            }
        );
        assert_eq!(f, Frame::default());
    }

    #[test]
    fn button_release_is_not_a_click() {
        let mut f = Frame::default();
        f.push(&InputEvent::new(EventType::KEY.0, KeyCode::BTN_LEFT.0, 0));
        assert!(!f.push(&syn()).unwrap().clicked);
    }

    #[test]
    fn devices_do_not_flush_each_other() {
        let mut mouse = Frame::default();
        let mut touchpad = Frame::default();

        mouse.push(&rel(RelativeAxisCode::REL_Y, 7));
        let other = touchpad.push(&syn()).unwrap();
        assert!(!other.moved());

        let done = mouse.push(&syn()).unwrap();
        assert_eq!(done.dy, 7.0);
    }
}
