//! Lifecycle state machine.
//!
//! Transitions are one-way: Created → Running → Stopping → Stopped. The
//! cell additionally tracks a private arming phase while `start` waits for
//! the pumps, and whether the stop path has already been claimed, so that
//! concurrent misuse surfaces as `InvalidLifecycle` instead of racing.

use std::sync::Mutex;

use crate::error::Error;

/// Externally observable lifecycle of a multiplexer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Lifecycle {
    /// Constructed, pumps not yet launched.
    Created,
    /// Pumps armed, accepting submissions.
    Running,
    /// Draining; no new submissions are accepted.
    Stopping,
    /// Both pumps joined; terminal.
    Stopped,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum State {
    Created,
    Starting,
    Running,
    Stopping,
    Stopped,
}

impl State {
    fn lifecycle(self) -> Lifecycle {
        match self {
            // the arming window is not observable as a distinct state
            State::Created | State::Starting => Lifecycle::Created,
            State::Running => Lifecycle::Running,
            State::Stopping => Lifecycle::Stopping,
            State::Stopped => Lifecycle::Stopped,
        }
    }
}

#[derive(Debug)]
struct Inner {
    state: State,
    /// Set when the read pump initiated Stopping after a fatal read error.
    read_failed: bool,
    /// Set once a `stop` call has taken ownership of the shutdown path.
    stop_claimed: bool,
}

/// Synchronized lifecycle cell shared by the facade and the read pump.
#[derive(Debug)]
pub(crate) struct StateCell(Mutex<Inner>);

impl StateCell {
    pub(crate) fn new() -> Self {
        Self(Mutex::new(Inner {
            state: State::Created,
            read_failed: false,
            stop_claimed: false,
        }))
    }

    pub(crate) fn lifecycle(&self) -> Lifecycle {
        self.0.lock().unwrap().state.lifecycle()
    }

    /// Created → arming. Fails for every other state.
    pub(crate) fn begin_start(&self) -> Result<(), Error> {
        let mut inner = self.0.lock().unwrap();
        match inner.state {
            State::Created => {
                inner.state = State::Starting;
                Ok(())
            }
            state => Err(Error::InvalidLifecycle(state.lifecycle())),
        }
    }

    /// Arming → Created, after a cancelled `start`.
    pub(crate) fn abort_start(&self) {
        self.0.lock().unwrap().state = State::Created;
    }

    /// Arming → Running.
    pub(crate) fn finish_start(&self) {
        self.0.lock().unwrap().state = State::Running;
    }

    /// Gate for `send`/`post`.
    pub(crate) fn ensure_running(&self) -> Result<(), Error> {
        let inner = self.0.lock().unwrap();
        match inner.state {
            State::Running => Ok(()),
            State::Stopping => Err(Error::Shutdown),
            state => Err(Error::InvalidLifecycle(state.lifecycle())),
        }
    }

    /// Claim the shutdown path. Running → Stopping; also permitted once
    /// from Stopping when the read pump initiated it.
    pub(crate) fn begin_stop(&self) -> Result<(), Error> {
        let mut inner = self.0.lock().unwrap();
        match inner.state {
            State::Running => {
                inner.state = State::Stopping;
                inner.stop_claimed = true;
                Ok(())
            }
            State::Stopping if inner.read_failed && !inner.stop_claimed => {
                inner.stop_claimed = true;
                Ok(())
            }
            state => Err(Error::InvalidLifecycle(state.lifecycle())),
        }
    }

    /// Stopping → Stopped.
    pub(crate) fn finish_stop(&self) {
        self.0.lock().unwrap().state = State::Stopped;
    }

    /// Terminal transition for unrecoverable starts (a pump died while
    /// arming and the transport half was lost with it).
    pub(crate) fn force_stopped(&self) {
        self.0.lock().unwrap().state = State::Stopped;
    }

    /// Running → Stopping, recorded as pump-initiated. Called by the read
    /// pump when a read fails fatally.
    pub(crate) fn note_read_failure(&self) {
        let mut inner = self.0.lock().unwrap();
        if inner.state == State::Running {
            inner.state = State::Stopping;
            inner.read_failed = true;
        }
    }

    pub(crate) fn is_stopping(&self) -> bool {
        self.0.lock().unwrap().state == State::Stopping
    }
}
