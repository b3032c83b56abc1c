//! Request coalescing for concurrent misses on the same key
//!
//! The first caller to miss on a key becomes the leader and runs its fetch.
//! Later callers for the same key follow: they wait on the leader's watch
//! channel instead of fetching. A leader that fails, or is dropped before
//! finishing, releases its followers to try again themselves.

use serde_json::Value;
use std::{
    collections::HashMap,
    sync::{Arc, Mutex, PoisonError},
};
use tokio::sync::watch;

#[derive(Debug, Clone)]
enum Flight {
    /// The leader's fetch finished. `None` means the source had no data.
    Done(Option<Value>),
    /// The leader failed or was cancelled.
    Abandoned,
}

type FlightRx = watch::Receiver<Option<Flight>>;
type FlightTx = watch::Sender<Option<Flight>>;

type InFlightMap = Arc<Mutex<HashMap<String, (u64, FlightRx)>>>;

#[derive(Default)]
pub(crate) struct SingleFlight {
    in_flight: InFlightMap,
    next_id: Mutex<u64>,
}

pub(crate) enum Join {
    Leader(FlightGuard),
    Follower(Follower),
}

impl SingleFlight {
    pub(crate) fn join(&self, key: &str) -> Join {
        let mut in_flight = self.in_flight.lock().unwrap_or_else(PoisonError::into_inner);
        if let Some((_, rx)) = in_flight.get(key) {
            return Join::Follower(Follower { rx: rx.clone() });
        }

        let id = {
            let mut next = self.next_id.lock().unwrap_or_else(PoisonError::into_inner);
            *next += 1;
            *next
        };
        let (tx, rx) = watch::channel(None);
        in_flight.insert(key.to_owned(), (id, rx));
        Join::Leader(FlightGuard {
            key: key.to_owned(),
            id,
            in_flight: Arc::clone(&self.in_flight),
            tx: Some(tx),
        })
    }

    #[cfg(test)]
    pub(crate) fn len(&self) -> usize {
        self.in_flight
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }
}

/// Held by the leader. Dropping it without [`FlightGuard::complete`]
/// abandons the flight.
pub(crate) struct FlightGuard {
    key: String,
    id: u64,
    in_flight: InFlightMap,
    tx: Option<FlightTx>,
}

impl FlightGuard {
    /// Publish the fetched value (or its absence) to followers.
    pub(crate) fn complete(mut self, value: Option<Value>) {
        self.release(Flight::Done(value));
    }

    fn release(&mut self, flight: Flight) {
        let Some(tx) = self.tx.take() else {
            return;
        };
        {
            let mut in_flight = self.in_flight.lock().unwrap_or_else(PoisonError::into_inner);
            if in_flight.get(&self.key).is_some_and(|(id, _)| *id == self.id) {
                in_flight.remove(&self.key);
            }
        }
        let _ = tx.send(Some(flight));
    }
}

impl Drop for FlightGuard {
    fn drop(&mut self) {
        self.release(Flight::Abandoned);
    }
}

pub(crate) struct Follower {
    rx: FlightRx,
}

impl Follower {
    /// Wait for the leader. `Some` carries the leader's result; `None`
    /// means the leader gave up and the caller must fetch on its own.
    pub(crate) async fn wait(mut self) -> Option<Option<Value>> {
        loop {
            let current = self.rx.borrow().clone();
            match current {
                Some(Flight::Done(value)) => return Some(value),
                Some(Flight::Abandoned) => return None,
                None => {}
            }
            if self.rx.changed().await.is_err() {
                return None;
            }
        }
    }
}
