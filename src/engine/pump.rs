// Event pump - a thread that blocks on an external event source and posts
// the events into the UI context's queue

use crate::engine::CancelFlag;
use ringbuf::HeapProd;
use ringbuf::traits::Producer;
use std::sync::mpsc::{Receiver, RecvTimeoutError};
use std::thread::{self, JoinHandle};
use std::time::Duration;

/// Result of one blocking wait
#[derive(Debug, PartialEq)]
pub enum SourcePoll<E> {
    Event(E),
    /// Nothing arrived within the timeout
    Idle,
    /// The source is exhausted
    Closed,
}

/// Blocking source of external events
pub trait EventSource: Send + 'static {
    type Event: Send + 'static;

    fn wait(&mut self, timeout: Duration) -> SourcePoll<Self::Event>;
}

/// Event source fed through a standard channel
pub struct ChannelSource<E> {
    receiver: Receiver<E>,
}

impl<E> ChannelSource<E> {
    pub fn new(receiver: Receiver<E>) -> Self {
        Self { receiver }
    }
}

impl<E: Send + 'static> EventSource for ChannelSource<E> {
    type Event = E;

    fn wait(&mut self, timeout: Duration) -> SourcePoll<E> {
        match self.receiver.recv_timeout(timeout) {
            Ok(event) => SourcePoll::Event(event),
            Err(RecvTimeoutError::Timeout) => SourcePoll::Idle,
            Err(RecvTimeoutError::Disconnected) => SourcePoll::Closed,
        }
    }
}

/// Running pump thread
pub struct EventPump {
    halt: CancelFlag,
    handle: Option<JoinHandle<usize>>,
}

const POLL_TIMEOUT: Duration = Duration::from_millis(20);
const RETRY_DELAY: Duration = Duration::from_millis(2);

impl EventPump {
    /// Start pumping `source` into `queue`
    ///
    /// When the UI queue is full the pump waits and retries; it never
    /// drops events unless halted.
    pub fn spawn<S: EventSource>(mut source: S, mut queue: HeapProd<S::Event>) -> std::io::Result<Self> {
        let halt = CancelFlag::new();
        let flag = halt.clone();
        let handle = thread::Builder::new()
            .name("event-pump".into())
            .spawn(move || {
                let mut posted = 0;
                while !flag.is_cancelled() {
                    let mut event = match source.wait(POLL_TIMEOUT) {
                        SourcePoll::Event(event) => event,
                        SourcePoll::Idle => continue,
                        SourcePoll::Closed => break,
                    };
                    loop {
                        match queue.try_push(event) {
                            Ok(()) => {
                                posted += 1;
                                break;
                            }
                            Err(back) if !flag.is_cancelled() => {
                                event = back;
                                thread::sleep(RETRY_DELAY);
                            }
                            Err(_) => break,
                        }
                    }
                }
                log::debug!("event pump stopped after {} events", posted);
                posted
            })?;

        Ok(Self {
            halt,
            handle: Some(handle),
        })
    }

    /// Stop the thread and wait for it; returns the number of events posted
    pub fn halt(mut self) -> usize {
        self.stop()
    }

    fn stop(&mut self) -> usize {
        self.halt.cancel();
        self.handle
            .take()
            .and_then(|handle| handle.join().ok())
            .unwrap_or(0)
    }

    pub fn is_finished(&self) -> bool {
        self.handle.as_ref().is_none_or(JoinHandle::is_finished)
    }
}

impl Drop for EventPump {
    fn drop(&mut self) {
        self.stop();
    }
}
