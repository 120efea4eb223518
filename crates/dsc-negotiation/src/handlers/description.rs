//! Description requests. A requested element returns its description,
//! no requested element returns the connector self-description.

use std::sync::Arc;

use dsc_message::{encode_body, HandlerError, IgnorePayload, MessageType, Processor, Reply, Request, Route};

use super::{internal, ConnectorServices};
use crate::collaborators::EntityResolver;

/// Route for description requests.
pub fn route(services: &ConnectorServices) -> Route {
    Route::builder(MessageType::DescriptionRequest)
        .transform(IgnorePayload)
        .process(DescriptionProcessor {
            resolver: services.resolver.clone(),
        })
}

struct DescriptionProcessor {
    resolver: Arc<dyn EntityResolver>,
}

impl Processor<()> for DescriptionProcessor {
    fn process(&self, request: Request<()>) -> Result<Reply, HandlerError> {
        let description = match &request.header.requested_element {
            Some(element) => self
                .resolver
                .description(element)
                .ok_or_else(|| HandlerError::NotFound(format!("no description for {element}")))?,
            None => self.resolver.self_description(),
        };
        encode_body(&description).map(Reply::with_payload).map_err(internal)
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use crate::handlers::fixtures::*;
    use dsc_message::{MessageType, RejectionReason};

    #[test]
    fn element_description_is_returned() {
        let f = fixture();
        let resource = uri("https://provider.example/resources/1");
        f.resources.add_description(resource.clone(), json!({"@id": resource.as_str(), "title": "Weather"}));
        let reply = f.send(f.consumer.description_request(&provider_id(), Some(&resource)), None);
        assert_type(&reply, MessageType::DescriptionResponse);
        let body: serde_json::Value = serde_json::from_str(reply.payload.as_deref().unwrap()).unwrap();
        assert_eq!(body["title"], "Weather");
    }

    #[test]
    fn missing_element_is_not_found() {
        let f = fixture();
        let resource = uri("https://provider.example/resources/404");
        let reply = f.send(f.consumer.description_request(&provider_id(), Some(&resource)), None);
        assert_type(&reply, MessageType::Rejection);
        assert_eq!(reply.header.rejection_reason, Some(RejectionReason::NotFound));
    }

    #[test]
    fn no_element_returns_self_description() {
        let f = fixture();
        f.resources.set_self_description(json!({"@type": "ids:BaseConnector"}));
        let reply = f.send(f.consumer.description_request(&provider_id(), None), None);
        assert_type(&reply, MessageType::DescriptionResponse);
        assert!(reply.payload.unwrap().contains("ids:BaseConnector"));
    }
}
