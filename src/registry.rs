//! Process-local registry of named store instances. Two adapter handles
//! opened with the same instance name share one actor, and therefore one
//! store; distinct names are fully isolated.

use std::collections::HashMap;

use parking_lot::RwLock;

use crate::error::FsResult;

pub use crate::actor::ActorHandle;

pub struct Registry<S> {
    handles: RwLock<HashMap<String, ActorHandle<S>>>,
}

impl<S: Send + 'static> Registry<S> {
    pub fn new() -> Self {
        Registry { handles: RwLock::new(HashMap::new()) }
    }

    /// Fetch the actor for `name`, spawning it with `init` on first use.
    pub fn get_or_spawn<F>(&self, name: &str, init: F) -> FsResult<ActorHandle<S>>
    where
        F: FnOnce() -> S,
    {
        if let Some(handle) = self.handles.read().get(name) {
            return Ok(handle.clone());
        }
        let mut handles = self.handles.write();
        // Another caller may have spawned it between the read and the write.
        if let Some(handle) = handles.get(name) {
            return Ok(handle.clone());
        }
        let handle = ActorHandle::spawn(name, init())?;
        handles.insert(name.to_string(), handle.clone());
        Ok(handle)
    }

    pub fn lookup(&self, name: &str) -> Option<ActorHandle<S>> {
        self.handles.read().get(name).cloned()
    }

    /// Drop the registry's handle; the actor exits once outstanding adapter
    /// handles are gone. Returns whether the name was registered.
    pub fn deregister(&self, name: &str) -> bool {
        self.handles.write().remove(name).is_some()
    }

    pub fn instance_names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.handles.read().keys().cloned().collect();
        names.sort();
        names
    }
}

impl<S: Send + 'static> Default for Registry<S> {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_same_name_shares_one_actor() {
        let reg: Registry<u32> = Registry::new();
        let a = reg.get_or_spawn("shared", || 0).unwrap();
        let b = reg.get_or_spawn("shared", || 99).unwrap();
        a.call(|n| *n += 1).unwrap();
        assert_eq!(b.call(|n| *n).unwrap(), 1);
        assert_eq!(reg.instance_names(), vec!["shared".to_string()]);
    }

    #[test]
    fn test_distinct_names_are_isolated() {
        let reg: Registry<u32> = Registry::new();
        let a = reg.get_or_spawn("a", || 0).unwrap();
        let b = reg.get_or_spawn("b", || 0).unwrap();
        a.call(|n| *n = 7).unwrap();
        assert_eq!(b.call(|n| *n).unwrap(), 0);
    }

    #[test]
    fn test_deregister_then_reopen_starts_fresh() {
        let reg: Registry<u32> = Registry::new();
        let a = reg.get_or_spawn("x", || 0).unwrap();
        a.call(|n| *n = 5).unwrap();
        assert!(reg.deregister("x"));
        assert!(!reg.deregister("x"));
        drop(a);
        let fresh = reg.get_or_spawn("x", || 0).unwrap();
        assert_eq!(fresh.call(|n| *n).unwrap(), 0);
    }
}
