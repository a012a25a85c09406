use gitload_backend::Oid;

/// Identifiers sealed together for one tree.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Batch {
    pub index: usize,
    pub oids: Vec<Oid>,
}

impl Batch {
    pub fn len(&self) -> usize { self.oids.len() }
    pub fn is_empty(&self) -> bool { self.oids.is_empty() }
}

/// Groups identifiers into batches of `capacity` in arrival order.
/// Never emits an empty batch.
#[derive(Debug)]
pub struct BatchAssembler {
    capacity: usize,
    current: Vec<Oid>,
    sealed: usize,
}

impl BatchAssembler {
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self { capacity, current: Vec::with_capacity(capacity), sealed: 0 }
    }

    pub fn capacity(&self) -> usize { self.capacity }
    pub fn sealed(&self) -> usize { self.sealed }
    pub fn pending(&self) -> usize { self.current.len() }

    /// Returns the sealed batch when `oid` fills it.
    pub fn push(&mut self, oid: Oid) -> Option<Batch> {
        self.current.push(oid);
        if self.current.len() < self.capacity {
            return None;
        }
        Some(self.seal())
    }

    /// Seals the partial remainder, if any.
    pub fn finish(mut self) -> Option<Batch> {
        if self.current.is_empty() { None } else { Some(self.seal()) }
    }

    fn seal(&mut self) -> Batch {
        let oids = std::mem::replace(&mut self.current, Vec::with_capacity(self.capacity));
        let batch = Batch { index: self.sealed, oids };
        self.sealed += 1;
        batch
    }
}
