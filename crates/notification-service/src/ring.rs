use crate::Alert;

/// Fixed-capacity ring of recent alerts: a pre-allocated slot arena and a
/// wraparound write index. Old entries are overwritten once full.
pub struct AlertRing {
    slots: Vec<Option<Alert>>,
    next: usize,
    len: usize,
}

impl AlertRing {
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            slots: vec![None; capacity],
            next: 0,
            len: 0,
        }
    }

    pub fn capacity(&self) -> usize {
        self.slots.len()
    }

    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    pub fn push(&mut self, alert: Alert) {
        self.slots[self.next] = Some(alert);
        self.next = (self.next + 1) % self.slots.len();
        if self.len < self.slots.len() {
            self.len += 1;
        }
    }

    /// Iterate oldest-to-newest.
    pub fn iter(&self) -> impl Iterator<Item = &Alert> {
        let capacity = self.slots.len();
        let start = if self.len < capacity {
            0
        } else {
            self.next // oldest slot once wrapped
        };
        (0..self.len).filter_map(move |i| self.slots[(start + i) % capacity].as_ref())
    }
}
