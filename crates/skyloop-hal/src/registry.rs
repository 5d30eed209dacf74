//! [`RotorRegistry`] – the set of registered rotors driven as one.
//!
//! The registry stores every registered [`Rotor`] driver keyed by its
//! identifier. The flight core calls [`RotorRegistry::spin_all`] once per
//! tick with the same incremental angle for every rotor.

use std::collections::HashMap;

use nalgebra::Vector3;
use skyloop_types::SkyError;

use crate::rotor::Rotor;

/// Registered rotor drivers.
#[derive(Default)]
pub struct RotorRegistry {
    rotors: HashMap<String, Box<dyn Rotor>>,
}

impl RotorRegistry {
    /// Create an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a rotor driver. Any previously registered driver with the
    /// same `id` is replaced.
    pub fn register(&mut self, rotor: Box<dyn Rotor>) {
        self.rotors.insert(rotor.id().to_string(), rotor);
    }

    /// Number of registered rotors.
    pub fn len(&self) -> usize {
        self.rotors.len()
    }

    /// `true` when no rotor is registered.
    pub fn is_empty(&self) -> bool {
        self.rotors.is_empty()
    }

    /// Look up a rotor by identifier.
    pub fn get(&self, id: &str) -> Option<&dyn Rotor> {
        self.rotors.get(id).map(|r| r.as_ref())
    }

    /// Rotate every registered rotor by `angle_deg` about `axis`.
    ///
    /// Every rotor is driven even if an earlier one fails.
    ///
    /// # Errors
    ///
    /// Returns the first [`SkyError`] reported by a driver.
    pub fn spin_all(&mut self, axis: Vector3<f32>, angle_deg: f32) -> Result<(), SkyError> {
        let mut first_fault = None;
        for rotor in self.rotors.values_mut() {
            if let Err(e) = rotor.rotate(axis, angle_deg) {
                first_fault.get_or_insert(e);
            }
        }
        match first_fault {
            Some(e) => Err(e),
            None => Ok(()),
        }
    }
}
