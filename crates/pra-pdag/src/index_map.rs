/// A dense, 1-based map from vertex index to `T`, indexed directly by the
/// PDAG's own index space (spec §4.1: "`basic_events()` returns a dense
/// 1-based map, indexed by the variable index, to the originating event
/// pointer"). Index `0` is never a valid key; it is reserved for the
/// constant terminals.
#[derive(Debug, Clone)]
pub struct IndexMap<T> {
    slots: Vec<Option<T>>,
}

impl<T> Default for IndexMap<T> {
    fn default() -> Self {
        IndexMap { slots: Vec::new() }
    }
}

impl<T> IndexMap<T> {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, index: u32, value: T) {
        let idx = index as usize;
        if idx >= self.slots.len() {
            self.slots.resize_with(idx + 1, || None);
        }
        self.slots[idx] = Some(value);
    }

    pub fn get(&self, index: u32) -> Option<&T> {
        self.slots.get(index as usize).and_then(|s| s.as_ref())
    }

    pub fn get_mut(&mut self, index: u32) -> Option<&mut T> {
        self.slots.get_mut(index as usize).and_then(|s| s.as_mut())
    }

    pub fn len(&self) -> usize {
        self.slots.iter().filter(|s| s.is_some()).count()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn iter(&self) -> impl Iterator<Item = (u32, &T)> {
        self.slots
            .iter()
            .enumerate()
            .filter_map(|(i, s)| s.as_ref().map(|v| (i as u32, v)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn insert_and_get_roundtrip() {
        let mut m: IndexMap<&str> = IndexMap::new();
        m.insert(2, "a");
        m.insert(5, "b");
        assert_eq!(m.get(2), Some(&"a"));
        assert_eq!(m.get(3), None);
        assert_eq!(m.get(5), Some(&"b"));
        assert_eq!(m.len(), 2);
    }
}
