use crate::document::PageNumber;

/// Bounds-checked page cursor. Every move is clamped to `1..=total`.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct PageNavigator {
    current: Option<PageNumber>,
    total: usize,
}

impl PageNavigator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn reset(&mut self, total: usize, initial: PageNumber) {
        self.total = total;
        self.current = (total > 0).then(|| initial.clamp(1, total));
    }

    pub fn clear(&mut self) {
        *self = Self::default();
    }

    pub fn current(&self) -> Option<PageNumber> {
        self.current
    }

    pub fn total(&self) -> usize {
        self.total
    }

    /// Returns the new page if the cursor moved.
    pub fn change_page(&mut self, offset: isize) -> Option<PageNumber> {
        let current = self.current?;
        let target = i128::from(current as u64) + offset as i128;
        self.move_to(target)
    }

    /// Returns the new page if the cursor moved.
    pub fn goto_page(&mut self, page: PageNumber) -> Option<PageNumber> {
        self.current?;
        self.move_to(page as i128)
    }

    fn move_to(&mut self, target: i128) -> Option<PageNumber> {
        if self.total == 0 {
            return None;
        }
        let next = target.clamp(1, self.total as i128) as PageNumber;
        if Some(next) == self.current {
            return None;
        }
        self.current = Some(next);
        Some(next)
    }
}
