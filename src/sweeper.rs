//! Background sweep scheduling
//!
//! Each pool owns at most one sweeper thread. It is started lazily and lives
//! until the pool stops it or its tick callback reports the pool is gone.

use crossbeam::channel::{self, Sender};
use crossbeam::select;
use parking_lot::Mutex;
use std::io;
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread::{self, JoinHandle};
use std::time::Duration;

struct Running {
    stop: Sender<()>,
    thread: JoinHandle<()>,
}

/// Start-once, stop-once periodic task.
pub(crate) struct Sweeper {
    started: AtomicBool,
    running: Mutex<Option<Running>>,
}

impl Sweeper {
    pub fn new() -> Self {
        Self {
            started: AtomicBool::new(false),
            running: Mutex::new(None),
        }
    }

    pub fn is_started(&self) -> bool {
        self.started.load(Ordering::Acquire)
    }

    pub fn is_running(&self) -> bool {
        self.running
            .lock()
            .as_ref()
            .is_some_and(|running| !running.thread.is_finished())
    }

    /// Spawn the ticking thread unless one was already started.
    ///
    /// `tick` runs once per `interval` on the sweeper thread and returns
    /// `false` to end the loop. Ticks never overlap: a slow tick delays the
    /// next one instead of running alongside it.
    ///
    /// Returns `Ok(false)` when another caller won the race to start.
    pub fn start<F>(&self, name: &str, interval: Duration, mut tick: F) -> io::Result<bool>
    where
        F: FnMut() -> bool + Send + 'static,
    {
        if self
            .started
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_err()
        {
            return Ok(false);
        }

        let (stop, stopped) = channel::bounded::<()>(1);
        let spawned = thread::Builder::new()
            .name(format!("{name}-sweeper"))
            .spawn(move || {
                let ticker = channel::tick(interval);
                loop {
                    select! {
                        recv(stopped) -> _ => break,
                        recv(ticker) -> _ => {
                            if !tick() {
                                break;
                            }
                        }
                    }
                }
            });

        match spawned {
            Ok(thread) => {
                *self.running.lock() = Some(Running { stop, thread });
                Ok(true)
            }
            Err(err) => {
                self.started.store(false, Ordering::Release);
                Err(err)
            }
        }
    }

    /// Stop the thread and wait for an in-flight tick to finish.
    ///
    /// Safe to call from the sweeper thread itself; it then only signals.
    pub fn stop(&self) {
        let Some(running) = self.running.lock().take() else {
            return;
        };
        let _ = running.stop.try_send(());
        drop(running.stop);
        if running.thread.thread().id() != thread::current().id() {
            let _ = running.thread.join();
        }
    }
}

impl Drop for Sweeper {
    fn drop(&mut self) {
        self.stop();
    }
}
