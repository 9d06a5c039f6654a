//! The machinery which turns an async function into a [Protocol].
//!
//! Each protocol is written as a future, which talks to the other parties
//! through a [SharedChannel]. Incoming messages start with a one byte
//! waitpoint, which routes them to the matching `recv` call, even when they
//! arrive long before the future gets there.
//!
//! The future runs on a local `smol` executor, and only advances when the
//! protocol is poked.
use std::{
    cell::RefCell,
    collections::{HashMap, VecDeque},
    future::Future,
    rc::Rc,
};

use event_listener::Event;
use serde::{de::DeserializeOwned, Serialize};
use smol::{channel, LocalExecutor};

use crate::serde::{decode, encode_with_tag};

use super::{Action, MessageData, Participant, Protocol, ProtocolError};

/// A point in a protocol where we wait for messages from everybody else.
pub type Waitpoint = u8;

struct Slot {
    messages: VecDeque<(Participant, MessageData)>,
    event: Event,
}

impl Slot {
    fn new() -> Self {
        Self {
            messages: VecDeque::new(),
            event: Event::new(),
        }
    }
}

/// Incoming messages, sorted into bins by waitpoint.
#[derive(Clone)]
struct MessageBuffer {
    slots: Rc<RefCell<HashMap<Waitpoint, Slot>>>,
}

impl MessageBuffer {
    fn new() -> Self {
        Self {
            slots: Rc::new(RefCell::new(HashMap::new())),
        }
    }

    fn push(&self, from: Participant, message: MessageData) {
        let waitpoint = match message.first() {
            Some(&w) => w,
            None => return,
        };
        let mut slots = self.slots.borrow_mut();
        let slot = slots.entry(waitpoint).or_insert_with(Slot::new);
        slot.messages.push_back((from, message));
        slot.event.notify(1);
    }

    async fn pop(&self, waitpoint: Waitpoint) -> (Participant, MessageData) {
        loop {
            let listener = {
                let mut slots = self.slots.borrow_mut();
                let slot = slots.entry(waitpoint).or_insert_with(Slot::new);
                if let Some(out) = slot.messages.pop_front() {
                    return out;
                }
                slot.event.listen()
            };
            listener.await;
        }
    }
}

/// The shared state between a protocol future and its executor.
#[derive(Clone)]
pub struct Context {
    buffer: MessageBuffer,
    outgoing: Rc<RefCell<VecDeque<MessageData>>>,
}

impl Context {
    pub fn new() -> Self {
        Self {
            buffer: MessageBuffer::new(),
            outgoing: Rc::new(RefCell::new(VecDeque::new())),
        }
    }

    /// The channel every party sees.
    pub fn shared_channel(&self) -> SharedChannel {
        SharedChannel {
            ctx: self.clone(),
            waitpoint: 0,
        }
    }
}

/// A broadcast channel between all the parties.
pub struct SharedChannel {
    ctx: Context,
    waitpoint: Waitpoint,
}

impl SharedChannel {
    /// Allocate the next waitpoint.
    ///
    /// Every party must allocate waitpoints in the same order.
    pub fn next_waitpoint(&mut self) -> Waitpoint {
        let out = self.waitpoint;
        self.waitpoint += 1;
        out
    }

    /// (Indicate that you want to) send a message to everybody else.
    pub async fn send_many<T: Serialize>(&self, waitpoint: Waitpoint, data: &T) {
        self.ctx
            .outgoing
            .borrow_mut()
            .push_back(encode_with_tag(waitpoint, data));
    }

    /// Receive the next message for a specific waitpoint.
    pub async fn recv<T: DeserializeOwned>(
        &self,
        waitpoint: Waitpoint,
    ) -> Result<(Participant, T), ProtocolError> {
        let (from, data) = self.ctx.buffer.pop(waitpoint).await;
        // The buffer only holds messages with at least the tag byte.
        let decoded = decode(&data[1..])?;
        Ok((from, decoded))
    }
}

/// An executor which implements our protocol trait.
///
/// Outgoing messages are always handed out before the final result, so that
/// the other parties get everything they need from us.
struct ProtocolExecutor<'a, T> {
    ctx: Context,
    ret_r: channel::Receiver<Result<T, ProtocolError>>,
    executor: LocalExecutor<'a>,
    done: bool,
}

impl<'a, T> Protocol for ProtocolExecutor<'a, T> {
    type Output = T;

    fn poke(&mut self) -> Result<Action<Self::Output>, ProtocolError> {
        if self.done {
            return Ok(Action::Wait);
        }
        while self.executor.try_tick() {}

        if let Some(m) = self.ctx.outgoing.borrow_mut().pop_front() {
            return Ok(Action::SendMany(m));
        }
        match self.ret_r.try_recv() {
            Ok(out) => {
                self.done = true;
                out.map(Action::Return)
            }
            Err(_) => Ok(Action::Wait),
        }
    }

    fn message(&mut self, from: Participant, data: MessageData) {
        self.ctx.buffer.push(from, data);
    }
}

/// Run a protocol future, using the given context for communication.
pub fn make_protocol<'a, T: 'a>(
    ctx: Context,
    fut: impl Future<Output = Result<T, ProtocolError>> + 'a,
) -> impl Protocol<Output = T> + 'a {
    let (ret_s, ret_r) = channel::bounded(1);
    let fut = async move {
        let res = fut.await;
        // The receiver lives as long as the executor running this task.
        let _ = ret_s.send(res).await;
    };

    let executor = LocalExecutor::new();
    executor.spawn(fut).detach();

    ProtocolExecutor {
        ctx,
        ret_r,
        executor,
        done: false,
    }
}
