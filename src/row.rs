use std::ops::Index;

/// One data row: a raw buffer per column, `None` for SQL NULL
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Tuple {
    values: Vec<Option<Vec<u8>>>,
}

impl Tuple {
    pub fn new(values: Vec<Option<Vec<u8>>>) -> Self {
        Self { values }
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// Raw bytes of a column (0-based), `None` when NULL or out of range
    pub fn get(&self, index: usize) -> Option<&[u8]> {
        self.values.get(index).and_then(|v| v.as_deref())
    }

    pub fn is_null(&self, index: usize) -> bool {
        matches!(self.values.get(index), Some(None))
    }

    /// Sum of the column payload lengths
    pub fn byte_size(&self) -> usize {
        self.values.iter().flatten().map(Vec::len).sum()
    }

    pub fn into_inner(self) -> Vec<Option<Vec<u8>>> {
        self.values
    }
}

impl Index<usize> for Tuple {
    type Output = Option<Vec<u8>>;

    fn index(&self, index: usize) -> &Self::Output {
        &self.values[index]
    }
}
