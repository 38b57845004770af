// SPDX-License-Identifier: Apache-2.0

//! Process-wide mapping from circuit name to [`Circuit`], plus the
//! per-name [`Settings`] store that backs it.

use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::RwLock;

use crate::circuit::Circuit;
use crate::settings::Settings;

/// Owns the name→circuit and name→settings maps.
///
/// The free functions in the crate root ([`crate::configure`],
/// [`crate::get_settings`], ...) delegate to a process-wide default instance
/// of this type so the public API reads like the reference implementation's
/// package-level functions, while still letting an embedder construct an
/// isolated registry (for tests, or to run more than one independent set of
/// circuits in the same process).
#[derive(Default)]
pub struct Registry {
    circuits: RwLock<HashMap<String, Arc<Circuit>>>,
    settings: RwLock<HashMap<String, Settings>>,
}

impl Registry {
    /// Create an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Install (or replace) settings for `name`, normalizing zero fields to
    /// their defaults, and return the normalized value.
    pub fn configure(&self, name: impl Into<String>, settings: Settings) -> Settings {
        let normalized = settings.normalize();
        let _ = self.settings.write().insert(name.into(), normalized);
        normalized
    }

    /// The settings stored for `name`, or a defaults-only value if none
    /// were ever configured.
    pub fn get_settings(&self, name: &str) -> Settings {
        self.settings.read().get(name).copied().unwrap_or_default()
    }

    /// The existing circuit for `name`, creating one (sized from the
    /// currently stored settings) if this is the first reference to it.
    pub fn get_circuit(&self, name: &str) -> Arc<Circuit> {
        if let Some(circuit) = self.circuits.read().get(name) {
            return Arc::clone(circuit);
        }

        let mut circuits = self.circuits.write();
        // Another writer may have created it between the read-lock release
        // above and acquiring the write lock.
        if let Some(circuit) = circuits.get(name) {
            return Arc::clone(circuit);
        }

        let settings = self.get_settings(name);
        let circuit = Arc::new(Circuit::new(name.to_string(), settings));
        let _ = circuits.insert(name.to_string(), Arc::clone(&circuit));
        circuit
    }
}
