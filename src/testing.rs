//! In-memory fake upstream used by the host tests

use anyhow::Context;
use reconcile::{Attribute, PartialState, Resource, ResourceData, Schema, Type};
use serde_json::{Value as JsonValue, json};
use std::collections::BTreeMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};

/// Objects stored by the fake upstream, keyed by id
pub type Cloud = Arc<Mutex<BTreeMap<String, JsonValue>>>;

/// Server resource backed by a shared in-memory map
#[derive(Debug)]
pub struct FakeServer {
    schema: Schema,
    cloud: Cloud,
    next_id: AtomicU64,
}

impl FakeServer {
    pub fn new() -> Self {
        Self::with_schema(
            Schema::new()
                .attribute("name", Attribute::required(Type::String).force_new())
                .attribute("size", Attribute::optional(Type::String).default("small"))
                .attribute("public_ip", Attribute::computed(Type::String)),
        )
    }

    pub fn with_schema(schema: Schema) -> Self {
        Self {
            schema,
            cloud: Cloud::default(),
            next_id: AtomicU64::new(1),
        }
    }

    pub fn cloud(&self) -> Cloud {
        Arc::clone(&self.cloud)
    }

    fn objects(&self) -> std::sync::MutexGuard<'_, BTreeMap<String, JsonValue>> {
        self.cloud.lock().unwrap()
    }
}

impl Resource for FakeServer {
    fn resource_type(&self) -> &'static str {
        "fake_server"
    }

    fn schema(&self) -> &Schema {
        &self.schema
    }

    fn create(&self, data: &mut ResourceData<'_>, _partial: &mut PartialState) -> anyhow::Result<()> {
        let n = self.next_id.fetch_add(1, Ordering::SeqCst);
        let id = format!("srv-{n}");
        let mut body = data.to_native();
        body["public_ip"] = json!(format!("192.0.2.{n}"));
        self.objects().insert(id.clone(), body);
        data.set_id(id);
        self.read(data)
    }

    fn read(&self, data: &mut ResourceData<'_>) -> anyhow::Result<()> {
        let object = self.objects().get(data.id()).cloned();
        match object {
            Some(object) => data.set_from_native(&object)?,
            None => data.clear_id(),
        }
        Ok(())
    }

    fn update(&self, data: &mut ResourceData<'_>, _partial: &mut PartialState) -> anyhow::Result<()> {
        let body = data.to_native();
        {
            let mut objects = self.objects();
            let object = objects
                .get_mut(data.id())
                .with_context(|| format!("server {} not found", data.id()))?;
            if let (Some(object), Some(body)) = (object.as_object_mut(), body.as_object()) {
                for (field, value) in body {
                    if field != "public_ip" {
                        object.insert(field.clone(), value.clone());
                    }
                }
            }
        }
        self.read(data)
    }

    fn delete(&self, data: &ResourceData<'_>) -> anyhow::Result<()> {
        self.objects()
            .remove(data.id())
            .map(|_| ())
            .with_context(|| format!("server {} not found", data.id()))
    }
}
