use std::{
    fmt,
    sync::{Arc, Weak},
};

use dashmap::{DashMap, Entry};
use uuid::Uuid;

use super::error::{StreamAlreadyPresent, StreamNotFound, StreamViewInvalid};

/// Live streams keyed by uuid, each with its associated context `T`.
///
/// Once inserted a context is only reachable through a [`StreamRef`], so an obliterate that
/// removes the entry invalidates every outstanding reference at once.
#[derive(Debug)]
pub struct StreamMap<T> {
    streams: DashMap<Uuid, Arc<T>, ahash::RandomState>,
}

impl<T> StreamMap<T> {
    pub fn new() -> StreamMap<T> {
        Self::default()
    }

    /// Track `context` under `uuid`.
    pub fn insert(&self, uuid: Uuid, context: T) -> Result<(), StreamAlreadyPresent> {
        match self.streams.entry(uuid) {
            Entry::Occupied(entry) => Err(StreamAlreadyPresent { uuid: *entry.key() }),
            Entry::Vacant(slot) => {
                slot.insert(Arc::new(context));
                Ok(())
            }
        }
    }

    pub fn remove(&self, uuid: &Uuid) -> Result<(), StreamNotFound> {
        self.streams
            .remove(uuid)
            .ok_or(StreamNotFound { uuid: *uuid })?;
        Ok(())
    }

    /// Lend the context for `uuid` as a weak [`StreamRef`].
    pub fn get(&self, uuid: &Uuid) -> Result<StreamRef<T>, StreamNotFound> {
        self.streams
            .view(uuid, |_, context| StreamRef {
                uuid: *uuid,
                context: Arc::downgrade(context),
            })
            .ok_or(StreamNotFound { uuid: *uuid })
    }

    pub fn len(&self) -> usize {
        self.streams.len()
    }

    pub fn is_empty(&self) -> bool {
        self.streams.is_empty()
    }
}

impl<T> Default for StreamMap<T> {
    fn default() -> Self {
        Self {
            streams: DashMap::default(),
        }
    }
}

/// A weak reference to a stream context that provides scoped access through [`view`](Self::view).
pub struct StreamRef<T> {
    uuid: Uuid,
    context: Weak<T>,
}

impl<T> StreamRef<T> {
    pub fn uuid(&self) -> Uuid {
        self.uuid
    }

    /// Run `view_fn` against the context, or fail if the stream has been removed since the
    /// reference was taken.
    pub fn view<F: FnOnce(&T) -> R, R>(&self, view_fn: F) -> Result<R, StreamViewInvalid> {
        Weak::upgrade(&self.context)
            .map(|context| view_fn(&context))
            .ok_or(StreamViewInvalid { uuid: self.uuid })
    }
}

impl<T> fmt::Debug for StreamRef<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StreamRef")
            .field("uuid", &self.uuid)
            .field("live", &(self.context.strong_count() > 0))
            .finish()
    }
}

impl<T> Clone for StreamRef<T> {
    fn clone(&self) -> Self {
        Self {
            uuid: self.uuid,
            context: self.context.clone(),
        }
    }
}
