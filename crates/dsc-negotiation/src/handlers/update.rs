//! Resource and connector update notifications. The payload is the new
//! description; its `@id` must name the element the header points at.

use std::sync::Arc;

use serde_json::Value;

use dsc_core::Uri;
use dsc_message::{HandlerError, JsonPayload, MessageType, Reply, Request, Route};

use super::{payload_id, store_failure, ConnectorServices};
use crate::collaborators::{EntityPersistence, StoreError};

/// Route for resource update messages.
pub fn resource_route(services: &ConnectorServices) -> Route {
    let persistence = services.persistence.clone();
    Route::builder(MessageType::ResourceUpdate)
        .transform(JsonPayload::<Value>::new(services.codec.clone()))
        .validate(|request: &Request<Value>| {
            matches_payload("affected resource", request.header.affected_resource.as_ref(), &request.body)
        })
        .process(move |request: Request<Value>| -> Result<Reply, HandlerError> {
            apply(&persistence, request.header.affected_resource.as_ref(), &request.body, |p, uri, body| {
                p.update_resource(uri, body)
            })
        })
}

/// Route for connector update messages.
pub fn connector_route(services: &ConnectorServices) -> Route {
    let persistence = services.persistence.clone();
    Route::builder(MessageType::ConnectorUpdate)
        .transform(JsonPayload::<Value>::new(services.codec.clone()))
        .validate(|request: &Request<Value>| {
            matches_payload("affected connector", request.header.affected_connector.as_ref(), &request.body)
        })
        .process(move |request: Request<Value>| -> Result<Reply, HandlerError> {
            apply(&persistence, request.header.affected_connector.as_ref(), &request.body, |p, uri, body| {
                p.update_connector(uri, body)
            })
        })
}

fn matches_payload(field: &str, affected: Option<&Uri>, body: &Value) -> Result<(), HandlerError> {
    let affected = affected.ok_or_else(|| HandlerError::BadParameters(format!("missing {field}")))?;
    match payload_id(body) {
        Some(id) if id == affected.as_str() => Ok(()),
        Some(id) => Err(HandlerError::BadParameters(format!(
            "{field} {affected} does not match payload id {id}"
        ))),
        None => Err(HandlerError::BadParameters("payload has no id".to_string())),
    }
}

fn apply<F>(
    persistence: &Arc<dyn EntityPersistence>,
    affected: Option<&Uri>,
    body: &Value,
    update: F,
) -> Result<Reply, HandlerError>
where
    F: FnOnce(&dyn EntityPersistence, &Uri, &Value) -> Result<(), StoreError>,
{
    let affected = affected
        .ok_or_else(|| HandlerError::BadParameters("missing affected element".to_string()))?;
    update(persistence.as_ref(), affected, body).map_err(store_failure)?;
    tracing::info!(element = %affected, "remote description updated");
    Ok(Reply::empty())
}
