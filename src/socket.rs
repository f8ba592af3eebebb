//! One-slot handshake between two pipeline stages.
//!
//! The producer places a payload with [`StageSocket::start`] (or
//! [`send_and_start_next`]), the consumer picks it up with
//! [`StageSocket::poll_start`] and releases the slot with
//! [`StageSocket::finish`]. Waiting is expressed with [`Poll`]: a stage that
//! gets `Pending` keeps its state and retries on the next clock edge.

use std::task::Poll;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StageSocket<P> {
    payload: Option<P>,
    busy: bool,
    start_pending: bool,
}

impl<P> Default for StageSocket<P> {
    fn default() -> Self {
        Self {
            payload: None,
            busy: false,
            start_pending: false,
        }
    }
}

impl<P> StageSocket<P> {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// The consumer side of `wait_until_start`.
    ///
    /// Consumes a pending start notification and marks the socket busy.
    pub fn poll_start(&mut self) -> Poll<&mut P> {
        if !self.start_pending {
            return Poll::Pending;
        }
        match self.payload.as_mut() {
            Some(payload) => {
                self.start_pending = false;
                self.busy = true;
                Poll::Ready(payload)
            }
            None => Poll::Pending,
        }
    }

    /// The producer side of `wait_until_finish_if_busy`.
    ///
    /// Ready once the slot holds no payload, neither one being worked on nor
    /// one whose start has not been picked up yet. This checks occupancy of
    /// the slot, not only the `busy` flag set by [`Self::poll_start`].
    #[must_use]
    pub fn poll_finish_if_busy(&self) -> Poll<()> {
        if self.payload.is_some() {
            Poll::Pending
        } else {
            Poll::Ready(())
        }
    }

    /// Places `payload` and notifies the consumer.
    ///
    /// Hands the payload back if the slot is still occupied.
    pub fn start(&mut self, payload: P) -> Result<(), P> {
        if self.poll_finish_if_busy().is_pending() {
            return Err(payload);
        }
        self.payload = Some(payload);
        self.start_pending = true;
        Ok(())
    }

    /// Clears busy and frees the slot, returning the finished payload.
    pub fn finish(&mut self) -> Option<P> {
        self.busy = false;
        self.start_pending = false;
        self.payload.take()
    }

    #[must_use]
    pub fn is_busy(&self) -> bool {
        self.busy
    }

    #[must_use]
    pub fn is_vacant(&self) -> bool {
        self.payload.is_none()
    }

    #[must_use]
    pub fn payload(&self) -> Option<&P> {
        self.payload.as_ref()
    }
}

/// Hands `payload` to the next stage once its socket is free.
pub fn send_and_start_next<P>(payload: P, next: &mut StageSocket<P>) -> Result<(), P> {
    next.start(payload)
}

/// Moves the finished payload of `current` into `next`.
///
/// Does nothing and returns `false` under backpressure, leaving `current` busy.
pub fn forward<P>(current: &mut StageSocket<P>, next: &mut StageSocket<P>) -> bool {
    if !current.is_busy() || next.poll_finish_if_busy().is_pending() {
        return false;
    }
    match current.finish() {
        Some(payload) => send_and_start_next(payload, next).is_ok(),
        None => false,
    }
}

#[cfg(test)]
mod tests {
    use super::{forward, send_and_start_next, StageSocket};
    use std::task::Poll;

    #[test]
    fn start_then_finish() {
        let mut socket = StageSocket::new();
        assert_eq!(socket.poll_start(), Poll::Pending);
        assert!(!socket.is_busy());

        socket.start(1).unwrap();
        // started but not yet picked up
        assert!(!socket.is_busy());
        assert!(socket.poll_finish_if_busy().is_pending());

        assert_eq!(socket.poll_start(), Poll::Ready(&mut 1));
        assert!(socket.is_busy());
        // the start notification is consumed exactly once
        assert_eq!(socket.poll_start(), Poll::Pending);

        assert_eq!(socket.finish(), Some(1));
        assert!(!socket.is_busy());
        assert!(socket.poll_finish_if_busy().is_ready());
    }

    #[test]
    fn occupied_socket_applies_backpressure() {
        let mut socket = StageSocket::new();
        send_and_start_next(1, &mut socket).unwrap();
        assert_eq!(send_and_start_next(2, &mut socket), Err(2));

        let _ = socket.poll_start();
        assert_eq!(send_and_start_next(3, &mut socket), Err(3));

        socket.finish();
        assert_eq!(send_and_start_next(4, &mut socket), Ok(()));
        assert_eq!(socket.payload(), Some(&4));
    }

    #[test]
    fn forward_waits_for_next_stage() {
        let mut first = StageSocket::new();
        let mut second = StageSocket::new();

        first.start("a").unwrap();
        // not busy before the consumer picked it up
        assert!(!forward(&mut first, &mut second));
        let _ = first.poll_start();

        second.start("b").unwrap();
        assert!(!forward(&mut first, &mut second));
        assert!(first.is_busy());

        second.finish();
        assert!(forward(&mut first, &mut second));
        assert!(first.is_vacant());
        assert_eq!(second.poll_start(), Poll::Ready(&mut "a"));
    }
}
