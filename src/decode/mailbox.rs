use parking_lot::Mutex;

/// Single-slot cell: `put` overwrites, `take` empties. Never queues.
#[derive(Debug)]
pub struct Mailbox<T> {
    slot: Mutex<Option<T>>,
}

impl<T> Default for Mailbox<T> {
    fn default() -> Self {
        Self {
            slot: Mutex::new(None),
        }
    }
}

impl<T> Mailbox<T> {
    pub fn new() -> Self {
        Self::default()
    }

    /// Store `value`, returning whatever it replaced.
    pub fn put(&self, value: T) -> Option<T> {
        self.slot.lock().replace(value)
    }

    pub fn take(&self) -> Option<T> {
        self.slot.lock().take()
    }

    pub fn is_empty(&self) -> bool {
        self.slot.lock().is_none()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn put_overwrites_instead_of_queueing() {
        let mb = Mailbox::new();
        assert!(mb.put(1).is_none());
        assert_eq!(mb.put(2), Some(1));
        assert_eq!(mb.take(), Some(2));
        assert!(mb.take().is_none());
        assert!(mb.is_empty());
    }
}
