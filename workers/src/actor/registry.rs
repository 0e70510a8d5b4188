use std::collections::HashMap;
use std::fmt;

use parking_lot::Mutex;

use workers_api::RegistryError;

use super::actor::Actor;

/// Name to actor lookup. Names are unique; unnamed actors are never stored.
#[derive(Default)]
pub struct Registry {
    actors: Mutex<HashMap<String, Actor>>,
}

impl Registry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Stores `actor` under its name.
    ///
    /// Returns `Ok(false)` for an unnamed actor.
    ///
    /// # Errors
    /// [`RegistryError::DuplicateName`] when the name is taken.
    pub fn register(&self, actor: &Actor) -> Result<bool, RegistryError> {
        let Some(name) = actor.name() else {
            return Ok(false);
        };

        let mut actors = self.actors.lock();
        if actors.contains_key(name) {
            return Err(RegistryError::DuplicateName(name.to_string()));
        }

        actors.insert(name.to_string(), actor.clone());
        Ok(true)
    }

    /// Removes `actor` if it is the one registered under its name.
    pub fn unregister(&self, actor: &Actor) -> bool {
        let Some(name) = actor.name() else {
            return false;
        };

        let removed = {
            let mut actors = self.actors.lock();
            match actors.get(name) {
                Some(current) if current.id() == actor.id() => actors.remove(name),
                _ => None,
            }
        };

        removed.is_some()
    }

    pub fn get(&self, name: &str) -> Option<Actor> {
        self.actors.lock().get(name).cloned()
    }

    pub fn contains(&self, name: &str) -> bool {
        self.actors.lock().contains_key(name)
    }

    pub fn len(&self) -> usize {
        self.actors.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.actors.lock().is_empty()
    }

    pub fn names(&self) -> Vec<String> {
        self.actors.lock().keys().cloned().collect()
    }

    /// Forgets every registered actor. The actors keep running.
    pub fn dispose(&self) {
        let actors = std::mem::take(&mut *self.actors.lock());
        drop(actors);
    }
}

impl fmt::Debug for Registry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Registry")
            .field("actors", &self.len())
            .finish()
    }
}
