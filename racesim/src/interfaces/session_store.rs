use std::collections::HashMap;
use std::sync::Mutex;

/// SessionStore keeps one value per race session. Writes are last-writer-wins: a put replaces
/// whatever was stored before and hands the old value back.
pub trait SessionStore<V> {
    fn get(&self, session_id: &str) -> Option<V>;
    fn put(&self, session_id: &str, value: V) -> Option<V>;
    fn delete(&self, session_id: &str) -> Option<V>;
}

#[derive(Debug)]
pub struct InMemorySessionStore<V> {
    sessions: Mutex<HashMap<String, V>>,
}

impl<V> Default for InMemorySessionStore<V> {
    fn default() -> Self {
        InMemorySessionStore::new()
    }
}

impl<V> InMemorySessionStore<V> {
    pub fn new() -> InMemorySessionStore<V> {
        InMemorySessionStore {
            sessions: Mutex::new(HashMap::new()),
        }
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, HashMap<String, V>> {
        // the map stays consistent even if a writer panicked
        self.sessions.lock().unwrap_or_else(|e| e.into_inner())
    }
}

impl<V: Clone> SessionStore<V> for InMemorySessionStore<V> {
    fn get(&self, session_id: &str) -> Option<V> {
        self.lock().get(session_id).cloned()
    }

    fn put(&self, session_id: &str, value: V) -> Option<V> {
        self.lock().insert(session_id.to_owned(), value)
    }

    fn delete(&self, session_id: &str) -> Option<V> {
        self.lock().remove(session_id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::thread;

    #[test]
    fn get_put_delete() {
        let store = InMemorySessionStore::new();
        assert_eq!(store.get("room-1"), None);
        assert_eq!(store.put("room-1", 1), None);
        assert_eq!(store.put("room-1", 2), Some(1));
        assert_eq!(store.get("room-1"), Some(2));
        assert_eq!(store.delete("room-1"), Some(2));
        assert!(store.is_empty());
    }

    #[test]
    fn concurrent_writers_keep_one_value_per_session() {
        let store = Arc::new(InMemorySessionStore::new());
        let writers: Vec<_> = (0..4)
            .map(|w| {
                let store = Arc::clone(&store);
                thread::spawn(move || {
                    for i in 0..100 {
                        store.put(&format!("room-{}", i % 10), w);
                    }
                })
            })
            .collect();
        for writer in writers {
            writer.join().unwrap();
        }

        assert_eq!(store.len(), 10);
        assert!((0..4).contains(&store.get("room-3").unwrap()));
    }
}
