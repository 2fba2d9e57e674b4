//! 内存存储
//!
//! 使用 DashMap 实现的并发内存存储。

use dashmap::DashMap;
use dashmap::mapref::entry::Entry;
use std::sync::Arc;

/// 通用内存存储，克隆后共享同一份数据
#[derive(Debug)]
pub struct MemoryStore<T> {
    data: Arc<DashMap<String, T>>,
}

impl<T: Clone> Default for MemoryStore<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T: Clone> MemoryStore<T> {
    pub fn new() -> Self {
        Self {
            data: Arc::new(DashMap::new()),
        }
    }

    /// 仅在 key 不存在时插入，返回是否插入成功
    pub fn insert_new(&self, id: &str, value: T) -> bool {
        match self.data.entry(id.to_string()) {
            Entry::Occupied(_) => false,
            Entry::Vacant(entry) => {
                entry.insert(value);
                true
            }
        }
    }

    /// 获取数据的克隆
    pub fn get(&self, id: &str) -> Option<T> {
        self.data.get(id).map(|v| v.clone())
    }

    /// 原地修改并返回修改后的克隆
    pub fn update<F>(&self, id: &str, f: F) -> Option<T>
    where
        F: FnOnce(&mut T),
    {
        self.data.get_mut(id).map(|mut entry| {
            f(entry.value_mut());
            entry.value().clone()
        })
    }

    /// 列出所有数据
    pub fn list(&self) -> Vec<T> {
        self.data
            .iter()
            .map(|entry| entry.value().clone())
            .collect()
    }

    pub fn count(&self) -> usize {
        self.data.len()
    }
}

impl<T: Clone> Clone for MemoryStore<T> {
    fn clone(&self) -> Self {
        Self {
            data: Arc::clone(&self.data),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_insert_new_rejects_duplicates() {
        let store: MemoryStore<u32> = MemoryStore::new();
        assert!(store.insert_new("a", 1));
        assert!(!store.insert_new("a", 2));
        assert_eq!(store.get("a"), Some(1));
        assert_eq!(store.count(), 1);
    }

    #[test]
    fn test_update_in_place() {
        let store: MemoryStore<u32> = MemoryStore::new();
        store.insert_new("a", 1);
        assert_eq!(store.update("a", |v| *v += 10), Some(11));
        assert_eq!(store.update("missing", |v| *v += 1), None);
    }

    #[test]
    fn test_clone_shares_data() {
        let store: MemoryStore<u32> = MemoryStore::new();
        let cloned = store.clone();
        store.insert_new("a", 1);
        assert_eq!(cloned.list(), vec![1]);
    }
}
