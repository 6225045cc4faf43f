use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use crate::domain::class::Class;
use crate::domain::host::Host;

/// The registries the daemon arbitrates over: every `Class` and every `Host`,
/// keyed by name. This is the only thing the state file needs to round-trip.
#[derive(Debug, Default, Serialize, Deserialize)]
pub struct Model {
    pub classes: HashMap<String, Class>,
    pub hosts: HashMap<String, Host>,
}

impl Model {
    pub fn new() -> Self {
        Model { classes: HashMap::new(), hosts: HashMap::new() }
    }

    pub fn class(&self, name: &str) -> Option<&Class> {
        self.classes.get(name)
    }

    pub fn host(&self, name: &str) -> Option<&Host> {
        self.hosts.get(name)
    }

    pub fn host_mut(&mut self, name: &str) -> Option<&mut Host> {
        self.hosts.get_mut(name)
    }
}
