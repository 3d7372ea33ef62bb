//! New-object trigger payloads.
//!
//! Accepts the object reference either bare (`{"bucket": .., "name": ..}`)
//! or wrapped in an event envelope under `data`.

use anyhow::{Context, bail};
use deporelay_relay::ObjectRef;
use serde_json::Value;

/// Parses a trigger payload into the object it names.
pub fn parse(payload: &str) -> anyhow::Result<ObjectRef> {
    let value: Value = serde_json::from_str(payload).context("trigger is not valid JSON")?;
    let body = match value.get("data") {
        Some(data) if data.is_object() => data.clone(),
        _ => value,
    };
    if !body.is_object() {
        bail!("trigger must be a JSON object");
    }
    let object: ObjectRef =
        serde_json::from_value(body).context("trigger does not name a bucket and object")?;
    if object.container.is_empty() {
        bail!("trigger bucket is empty");
    }
    Ok(object)
}
