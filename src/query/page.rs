//! Result containers: paged lists and key-ordered maps.

/// One page of entities with the total row count
#[derive(Debug, Clone, PartialEq)]
pub struct PageData<T> {
    pub data: Vec<T>,
    /// Total matching rows before paging, or `-1` when not counted
    pub total: i64,
    pub page_size: Option<i64>,
}

impl<T> PageData<T> {
    /// Total used when the count query was skipped
    pub const UNKNOWN_TOTAL: i64 = -1;

    pub fn new(data: Vec<T>, total: i64, page_size: Option<i64>) -> Self {
        Self { data, total, page_size }
    }

    pub fn is_total_known(&self) -> bool {
        self.total >= 0
    }

    /// Number of pages, when both the total and the page size are known
    ///
    /// # Example
    ///
    /// ```rust
    /// use relmap::PageData;
    ///
    /// let page = PageData::new(vec![1, 2, 3], 21, Some(10));
    /// assert_eq!(page.total_pages(), Some(3));
    /// ```
    pub fn total_pages(&self) -> Option<i64> {
        match self.page_size {
            Some(size) if size > 0 && self.total >= 0 => Some((self.total + size - 1) / size),
            _ => None,
        }
    }
}

/// Entities keyed by the key values they were requested with, in request order
#[derive(Debug, Clone, PartialEq)]
pub struct KeyedResult<K, T> {
    entries: Vec<(K, T)>,
}

impl<K, T> Default for KeyedResult<K, T> {
    fn default() -> Self {
        Self { entries: Vec::new() }
    }
}

impl<K: PartialEq, T> KeyedResult<K, T> {
    pub(crate) fn push(&mut self, key: K, entity: T) {
        self.entries.push((key, entity));
    }

    pub fn contains_key(&self, key: &K) -> bool {
        self.entries.iter().any(|(k, _)| k == key)
    }

    pub fn get(&self, key: &K) -> Option<&T> {
        self.entries.iter().find(|(k, _)| k == key).map(|(_, t)| t)
    }
}

impl<K, T> KeyedResult<K, T> {
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&K, &T)> {
        self.entries.iter().map(|(k, t)| (k, t))
    }

    pub fn keys(&self) -> impl Iterator<Item = &K> {
        self.entries.iter().map(|(k, _)| k)
    }

    pub fn values(&self) -> impl Iterator<Item = &T> {
        self.entries.iter().map(|(_, t)| t)
    }

    pub fn into_vec(self) -> Vec<(K, T)> {
        self.entries
    }
}

impl<K, T> IntoIterator for KeyedResult<K, T> {
    type Item = (K, T);
    type IntoIter = std::vec::IntoIter<(K, T)>;

    fn into_iter(self) -> Self::IntoIter {
        self.entries.into_iter()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_total_pages() {
        assert_eq!(PageData::new(Vec::<i32>::new(), 0, Some(10)).total_pages(), Some(0));
        assert_eq!(PageData::new(Vec::<i32>::new(), 10, Some(10)).total_pages(), Some(1));
        assert_eq!(PageData::new(Vec::<i32>::new(), -1, Some(10)).total_pages(), None);
        assert_eq!(PageData::new(Vec::<i32>::new(), 5, None).total_pages(), None);
        assert!(!PageData::new(Vec::<i32>::new(), -1, None).is_total_known());
    }

    #[test]
    fn test_keyed_result_keeps_insertion_order() {
        let mut result = KeyedResult::default();
        result.push(3, "c");
        result.push(1, "a");
        assert_eq!(result.keys().copied().collect::<Vec<_>>(), vec![3, 1]);
        assert_eq!(result.get(&1), Some(&"a"));
        assert!(!result.contains_key(&2));
        assert_eq!(result.into_vec(), vec![(3, "c"), (1, "a")]);
    }
}
