//! Resource trait: schema plus the four lifecycle callbacks
//!
//! A Resource describes one kind of managed upstream object. The engine
//! owns diffing, validation and persistence; the resource only knows how to
//! talk to the upstream API.

use crate::data::ResourceData;
use crate::partial::PartialState;
use crate::schema::Schema;
use crate::value::Attributes;
use anyhow::{Result, bail};
use std::fmt;
use std::sync::Arc;

/// Core trait for managed resource types
///
/// Callbacks receive a [`ResourceData`] working set. Whatever they leave in
/// it when they return (including on error) is what the orchestrator
/// considers for persistence.
///
/// # Example
///
/// ```ignore
/// use reconcile::{Attribute, PartialState, Resource, ResourceData, Schema, Type};
///
/// #[derive(Debug)]
/// struct Server { schema: Schema, api: Client }
///
/// impl Resource for Server {
///     fn resource_type(&self) -> &'static str { "server" }
///     fn schema(&self) -> &Schema { &self.schema }
///
///     fn create(&self, data: &mut ResourceData<'_>, _partial: &mut PartialState) -> anyhow::Result<()> {
///         let id = self.api.create_server(&data.to_native())?;
///         data.set_id(id);
///         Ok(())
///     }
///
///     fn read(&self, data: &mut ResourceData<'_>) -> anyhow::Result<()> {
///         match self.api.get_server(data.id())? {
///             Some(server) => data.set_from_native(&server)?,
///             None => data.clear_id(),
///         }
///         Ok(())
///     }
///
///     fn delete(&self, data: &ResourceData<'_>) -> anyhow::Result<()> {
///         self.api.delete_server(data.id())
///     }
/// }
/// ```
pub trait Resource: Send + Sync + fmt::Debug {
    /// Resource type name, e.g. "server" or "dns_record"
    fn resource_type(&self) -> &'static str;

    /// Attribute schema for this resource type
    fn schema(&self) -> &Schema;

    /// Create the upstream object
    ///
    /// Must call [`ResourceData::set_id`] as soon as the object exists
    /// upstream. An error returned after that still persists the
    /// identifier, so the orphan is tracked instead of leaked.
    fn create(&self, data: &mut ResourceData<'_>, partial: &mut PartialState) -> Result<()>;

    /// Refresh attributes from upstream
    ///
    /// Clearing the identifier signals that the object is gone.
    fn read(&self, data: &mut ResourceData<'_>) -> Result<()>;

    /// Apply an in-place update
    ///
    /// Resources whose every configurable attribute is force-new never get
    /// an Update and can keep the default.
    fn update(&self, data: &mut ResourceData<'_>, partial: &mut PartialState) -> Result<()> {
        let _ = (data, partial);
        bail!("{} does not support in-place update", self.resource_type())
    }

    /// Delete the upstream object
    fn delete(&self, data: &ResourceData<'_>) -> Result<()>;

    /// Upgrade attributes written under an older schema version
    ///
    /// Called once per older version, so migrations can be written as a
    /// chain of single-step upgrades.
    fn migrate_state(&self, from_version: u64, attributes: Attributes) -> Result<Attributes> {
        let _ = from_version;
        Ok(attributes)
    }
}

/// A resource shared across worker threads
pub type SharedResource = Arc<dyn Resource>;
