/// Ordered group of items processed as a unit. `index` is the 0-based
/// position of the batch in the source.
#[derive(Debug, Clone, PartialEq)]
pub struct Batch<T> {
    pub index: u64,
    pub rows: Vec<T>,
}

impl<T> Batch<T> {
    pub fn new(index: u64, rows: Vec<T>) -> Self {
        Self { index, rows }
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn into_rows(self) -> Vec<T> {
        self.rows
    }
}

impl<T> IntoIterator for Batch<T> {
    type Item = T;
    type IntoIter = std::vec::IntoIter<T>;

    fn into_iter(self) -> Self::IntoIter {
        self.rows.into_iter()
    }
}
