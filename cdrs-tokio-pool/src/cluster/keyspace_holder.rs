use std::sync::Arc;

use arc_swap::ArcSwapOption;

/// Holds the keyspace which gets selected on every new pooled connection.
#[derive(Default, Debug)]
pub struct KeyspaceHolder {
    current_keyspace: ArcSwapOption<String>,
}

impl KeyspaceHolder {
    pub fn new(keyspace: Option<String>) -> Self {
        KeyspaceHolder {
            current_keyspace: ArcSwapOption::from(keyspace.map(Arc::new)),
        }
    }

    #[inline]
    pub fn current_keyspace(&self) -> Option<Arc<String>> {
        self.current_keyspace.load_full()
    }

    /// Changes the keyspace for connections established from now on. Existing connections are
    /// not affected.
    #[inline]
    pub fn update_current_keyspace(&self, keyspace: String) {
        self.current_keyspace.store(Some(Arc::new(keyspace)));
    }

    #[inline]
    pub fn clear(&self) {
        self.current_keyspace.store(None);
    }
}

#[cfg(test)]
mod tests {
    use crate::cluster::KeyspaceHolder;

    #[test]
    fn should_update_and_clear_keyspace() {
        let holder = KeyspaceHolder::new(Some("first".into()));
        assert_eq!(holder.current_keyspace().as_deref().map(String::as_str), Some("first"));

        holder.update_current_keyspace("second".into());
        assert_eq!(holder.current_keyspace().as_deref().map(String::as_str), Some("second"));

        holder.clear();
        assert!(holder.current_keyspace().is_none());
    }
}
