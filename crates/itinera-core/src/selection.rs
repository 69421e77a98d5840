/// Index of the focused stop in arrival order. Clamped, never wraps.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Selection {
    index: usize,
}

impl Selection {
    pub fn index(self) -> usize {
        self.index
    }

    /// The selected index, or `None` while there is nothing to select.
    pub fn current(self, len: usize) -> Option<usize> {
        if len == 0 {
            None
        } else {
            Some(self.index.min(len - 1))
        }
    }

    /// Returns true when the selection moved.
    pub fn select(&mut self, index: usize, len: usize) -> bool {
        if len == 0 {
            return false;
        }
        let next = index.min(len - 1);
        let changed = next != self.index;
        self.index = next;
        changed
    }

    pub fn next(&mut self, len: usize) -> bool {
        match self.current(len) {
            Some(current) if current + 1 < len => self.select(current + 1, len),
            _ => false,
        }
    }

    pub fn prev(&mut self, len: usize) -> bool {
        match self.current(len) {
            Some(current) if current > 0 => self.select(current - 1, len),
            _ => false,
        }
    }

    pub fn reset(&mut self) {
        self.index = 0;
    }

    pub fn clamp(&mut self, len: usize) {
        self.index = self.current(len).unwrap_or(0);
    }
}
