//! # Events specification.

use async_channel::{Receiver, Sender, TrySendError};

/// Event queue.
#[derive(Debug, Clone)]
pub struct Events {
    receiver: Receiver<Event>,
    sender: Sender<Event>,
}

impl Default for Events {
    fn default() -> Self {
        Self::new()
    }
}

impl Events {
    /// Creates a new event queue.
    pub fn new() -> Self {
        let (sender, receiver) = async_channel::bounded(1_000);

        Self { receiver, sender }
    }

    /// Emits an event into the queue.
    ///
    /// If the queue is full, the oldest event is dropped to make room.
    pub fn emit(&self, event: Event) {
        match self.sender.try_send(event) {
            Ok(()) => {}
            Err(TrySendError::Full(event)) => {
                // when we are full, we pop the oldest event and push on the new one
                let _ = self.receiver.try_recv();

                // try again
                self.emit(event);
            }
            Err(TrySendError::Closed(_)) => {
                unreachable!("unable to emit event, channel disconnected");
            }
        }
    }

    /// Retrieves the event emitter.
    pub fn get_emitter(&self) -> EventEmitter {
        EventEmitter(self.receiver.clone())
    }
}

/// A receiver of events from a [crate::context::Context].
#[derive(Debug, Clone)]
pub struct EventEmitter(Receiver<Event>);

impl EventEmitter {
    /// Async recv of an event. Return `None` if the `Sender` has been dropped.
    pub async fn recv(&self) -> Option<Event> {
        self.0.recv().await.ok()
    }

    /// Tries to receive an event without blocking.
    pub fn try_recv(&self) -> Option<Event> {
        self.0.try_recv().ok()
    }
}

/// The event emitted by the core.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Event {
    /// The library-user may write an informational string to the log.
    ///
    /// This event should not be reported to the end-user using a popup or
    /// something like that.
    Info(String),

    /// The library-user should write a warning string to the log.
    Warning(String),

    /// The library-user should report an error to the end-user.
    Error(String),

    /// Encryption with the given peer got paused: a message without an
    /// `Autocrypt:` header arrived although the peer announced `mutual`
    /// before. Recoverable by the next Autocrypt message from the peer.
    EncryptionPaused {
        /// The peer's email address.
        addr: String,
    },

    /// The Autocrypt key of the given peer changed.
    /// Recoverable by a new out-of-band verification.
    FingerprintChanged {
        /// The peer's email address.
        addr: String,
    },
}
