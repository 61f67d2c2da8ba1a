//! Slab storage behind the opaque resource handles

/// Resources addressed by raw handle ids
///
/// Id `n` refers to slot `n - 1`, so id `0` never resolves and stays free for the
/// null handle. Released slots are reused by later insertions.
#[derive(Debug)]
pub(crate) struct Pool<T> {
    slots: Vec<Option<T>>,
    free: Vec<usize>,
}

impl<T> Default for Pool<T> {
    fn default() -> Self {
        Self { slots: Vec::new(), free: Vec::new() }
    }
}

impl<T> Pool<T> {
    /// Stores `value` and returns its id
    pub fn insert(&mut self, value: T) -> u32 {
        let index = match self.free.pop() {
            Some(index) => {
                self.slots[index] = Some(value);
                index
            }
            None => {
                self.slots.push(Some(value));
                self.slots.len() - 1
            }
        };
        index as u32 + 1
    }

    pub fn get(&self, id: u32) -> Option<&T> {
        let index = (id as usize).checked_sub(1)?;
        self.slots.get(index)?.as_ref()
    }

    /// Removes the value behind `id`, if any
    pub fn remove(&mut self, id: u32) -> Option<T> {
        let index = (id as usize).checked_sub(1)?;
        let value = self.slots.get_mut(index)?.take()?;
        self.free.push(index);
        Some(value)
    }

    /// Number of live values
    pub fn len(&self) -> usize {
        self.slots.len() - self.free.len()
    }
}
