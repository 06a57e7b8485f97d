//! `factory` interface: spawn and delete models at runtime.
//!
//! A client writes a model description (or a model name to delete) into the
//! command record; the simulator consumes the request on its next update
//! and clears the field so the same request is not applied twice.

use super::{Device, DeviceKind, read_cstr, shm_payload, write_cstr};
use static_assertions::const_assert_eq;

/// Capacity of the model description field.
pub const FACTORY_MAX_XML: usize = 409_600;

/// Capacity of the delete-model name field.
pub const FACTORY_MAX_NAME: usize = 512;

/// Device marker for the `factory` kind.
pub enum Factory {}

impl Device for Factory {
    const KIND: DeviceKind = DeviceKind::Factory;
    type Payload = FactoryData;
}

/// Pending factory requests.
#[derive(Debug, Clone, Copy, PartialEq)]
#[repr(C)]
pub struct FactoryCmd {
    /// Model description to spawn, NUL-terminated; empty when idle.
    pub new_model: [u8; FACTORY_MAX_XML],
    /// Name of the model to delete, NUL-terminated; empty when idle.
    pub delete_model: [u8; FACTORY_MAX_NAME],
}

impl Default for FactoryCmd {
    fn default() -> Self {
        Self {
            new_model: [0; FACTORY_MAX_XML],
            delete_model: [0; FACTORY_MAX_NAME],
        }
    }
}

impl FactoryCmd {
    /// Queue a model description for spawning.
    ///
    /// # Panics
    ///
    /// Panics if the description does not fit [`FACTORY_MAX_XML`].
    pub fn request_spawn(&mut self, description: &str) {
        write_cstr(&mut self.new_model, description);
    }

    /// Consume a pending spawn request.
    pub fn take_spawn(&mut self) -> Option<String> {
        take_field(&mut self.new_model)
    }

    /// Queue a model for deletion.
    ///
    /// # Panics
    ///
    /// Panics if the name does not fit [`FACTORY_MAX_NAME`].
    pub fn request_delete(&mut self, model: &str) {
        write_cstr(&mut self.delete_model, model);
    }

    /// Consume a pending delete request.
    pub fn take_delete(&mut self) -> Option<String> {
        take_field(&mut self.delete_model)
    }
}

fn take_field(field: &mut [u8]) -> Option<String> {
    if field.first().copied().unwrap_or(0) == 0 {
        return None;
    }
    let text = read_cstr(field);
    field.fill(0);
    Some(text)
}

/// Payload of a `factory` segment.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
#[repr(C)]
pub struct FactoryData {
    /// Client-owned command.
    pub cmd: FactoryCmd,
}

const_assert_eq!(size_of::<FactoryData>(), FACTORY_MAX_XML + FACTORY_MAX_NAME);

shm_payload!(FactoryData);
