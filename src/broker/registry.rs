//! Fixed-capacity connection table.
//!
//! Slots are addressed by index. A free slot is `None`; removing a slot drops
//! its state together with its topic, so a reused slot always starts out
//! `Unknown`. The table never grows past the capacity it was created with.

pub type SlotId = usize;

/// Protocol state of a live connection.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum SlotState {
    /// Connected, nothing received yet.
    #[default]
    Unknown,
    /// Registered with `SUB`; receive-only from here on.
    Subscriber { topic: String },
}

impl SlotState {
    pub fn topic(&self) -> Option<&str> {
        match self {
            SlotState::Unknown => None,
            SlotState::Subscriber { topic } => Some(topic),
        }
    }
}

#[derive(Debug)]
pub struct Slot<S> {
    pub conn: S,
    pub state: SlotState,
}

#[derive(Debug)]
pub struct Registry<S> {
    slots: Vec<Option<Slot<S>>>,
}

impl<S> Registry<S> {
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            slots: (0..capacity).map(|_| None).collect(),
        }
    }

    pub fn capacity(&self) -> usize {
        self.slots.len()
    }

    /// Number of live connections.
    pub fn len(&self) -> usize {
        self.slots.iter().filter(|s| s.is_some()).count()
    }

    pub fn is_empty(&self) -> bool {
        self.slots.iter().all(Option::is_none)
    }

    /// Put `conn` in the first free slot. Hands the connection back when the
    /// table is full so the caller can close it.
    pub fn insert(&mut self, conn: S) -> Result<SlotId, S> {
        match self.slots.iter().position(Option::is_none) {
            Some(id) => {
                self.slots[id] = Some(Slot {
                    conn,
                    state: SlotState::Unknown,
                });
                Ok(id)
            }
            None => Err(conn),
        }
    }

    pub fn get(&self, id: SlotId) -> Option<&Slot<S>> {
        self.slots.get(id).and_then(Option::as_ref)
    }

    pub fn get_mut(&mut self, id: SlotId) -> Option<&mut Slot<S>> {
        self.slots.get_mut(id).and_then(Option::as_mut)
    }

    /// Free the slot and return what it held.
    pub fn remove(&mut self, id: SlotId) -> Option<Slot<S>> {
        self.slots.get_mut(id).and_then(Option::take)
    }

    /// Mark a live slot as a subscriber of `topic`. Returns false if the slot is free.
    pub fn subscribe(&mut self, id: SlotId, topic: &str) -> bool {
        match self.get_mut(id) {
            Some(slot) => {
                slot.state = SlotState::Subscriber {
                    topic: topic.to_string(),
                };
                true
            }
            None => false,
        }
    }

    /// Connections subscribed to exactly `topic`, in slot order.
    pub fn subscribers_mut<'a>(
        &'a mut self,
        topic: &'a str,
    ) -> impl Iterator<Item = (SlotId, &'a mut S)> + 'a {
        self.slots
            .iter_mut()
            .enumerate()
            .filter_map(move |(id, slot)| match slot {
                Some(slot) if slot.state.topic() == Some(topic) => Some((id, &mut slot.conn)),
                _ => None,
            })
    }
}
