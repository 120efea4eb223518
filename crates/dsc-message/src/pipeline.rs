//! # Message Pipeline
//!
//! Inbound messages are dispatched by table lookup on their type tag. Each
//! [`Route`] bundles a [`Transformer`] that narrows the raw payload to a
//! typed body, a list of [`Validator`]s over the typed request and a
//! [`Processor`] that produces the reply.
//!
//! ## Dispatch
//!
//! 1. The raw header is decoded. An empty or unreadable message is rejected
//!    as malformed.
//! 2. The header's model version must be one the connector accepts.
//! 3. The route for the type tag is looked up.
//! 4. Transformer, validators and processor run in that order. The first
//!    [`HandlerError`] short-circuits into a rejection reply.
//! 5. On success the reply is stamped with the type
//!    [`MessageType::expected_response`] names for the request, correlated
//!    to it. Senders check replies against the same table.
//!
//! Dispatch holds no mutable state, so distinct messages can be handled
//! concurrently through a shared `&Pipeline`.

use std::collections::HashMap;
use std::marker::PhantomData;
use std::sync::Arc;

use serde::de::DeserializeOwned;

use dsc_core::ConnectorContext;

use crate::builder::MessageBuilder;
use crate::codec::{decode_body, MessageCodec};
use crate::error::{CodecError, HandlerError};
use crate::header::{MessageHeader, RejectionReason};
use crate::message::{Message, RawMessage, WireParts};
use crate::types::MessageType;

// ── Stage traits ─────────────────────────────────────────────────────

/// An inbound message after its payload has been narrowed.
#[derive(Debug, Clone)]
pub struct Request<B> {
    /// Decoded header.
    pub header: MessageHeader,
    /// Typed body.
    pub body: B,
}

/// What a processor hands back on success.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Reply {
    /// Reply payload.
    pub payload: Option<String>,
}

impl Reply {
    /// A reply with a payload.
    pub fn with_payload(payload: impl Into<String>) -> Self {
        Self {
            payload: Some(payload.into()),
        }
    }

    /// A reply without a payload.
    pub fn empty() -> Self {
        Self::default()
    }
}

/// Checks a precondition on a typed request. Never mutates state.
pub trait Validator<B>: Send + Sync {
    /// Fail fast with the specific error kind.
    fn validate(&self, request: &Request<B>) -> Result<(), HandlerError>;
}

impl<B, F> Validator<B> for F
where
    F: Fn(&Request<B>) -> Result<(), HandlerError> + Send + Sync,
{
    fn validate(&self, request: &Request<B>) -> Result<(), HandlerError> {
        self(request)
    }
}

/// Narrows a raw payload to the body a processor expects.
pub trait Transformer<B>: Send + Sync {
    /// Produce the typed body.
    fn transform(&self, header: &MessageHeader, payload: Option<&str>) -> Result<B, HandlerError>;
}

impl<B, F> Transformer<B> for F
where
    F: Fn(&MessageHeader, Option<&str>) -> Result<B, HandlerError> + Send + Sync,
{
    fn transform(&self, header: &MessageHeader, payload: Option<&str>) -> Result<B, HandlerError> {
        self(header, payload)
    }
}

/// Executes the business logic of a message type.
pub trait Processor<B>: Send + Sync {
    /// Produce the reply.
    fn process(&self, request: Request<B>) -> Result<Reply, HandlerError>;
}

impl<B, F> Processor<B> for F
where
    F: Fn(Request<B>) -> Result<Reply, HandlerError> + Send + Sync,
{
    fn process(&self, request: Request<B>) -> Result<Reply, HandlerError> {
        self(request)
    }
}

// ── Built-in transformers ────────────────────────────────────────────

/// Ignores the payload.
#[derive(Debug, Clone, Copy, Default)]
pub struct IgnorePayload;

impl Transformer<()> for IgnorePayload {
    fn transform(&self, _header: &MessageHeader, _payload: Option<&str>) -> Result<(), HandlerError> {
        Ok(())
    }
}

/// Decodes a required JSON payload into `T`.
pub struct JsonPayload<T> {
    codec: Arc<dyn MessageCodec>,
    _body: PhantomData<fn() -> T>,
}

impl<T> JsonPayload<T> {
    /// Decode through the given codec.
    pub fn new(codec: Arc<dyn MessageCodec>) -> Self {
        Self {
            codec,
            _body: PhantomData,
        }
    }
}

impl<T: DeserializeOwned> Transformer<T> for JsonPayload<T> {
    fn transform(&self, header: &MessageHeader, payload: Option<&str>) -> Result<T, HandlerError> {
        let raw = payload
            .filter(|p| !p.trim().is_empty())
            .ok_or_else(|| {
                HandlerError::MalformedMessage(format!("{} requires a payload", header.message_type))
            })?;
        decode_body(self.codec.as_ref(), raw)
            .map_err(|e| HandlerError::MalformedMessage(format!("unreadable payload: {e}")))
    }
}

// ── Routes ───────────────────────────────────────────────────────────

trait Stages: Send + Sync {
    fn run(&self, header: &MessageHeader, payload: Option<&str>) -> Result<Reply, HandlerError>;
}

struct TypedStages<B> {
    transformer: Box<dyn Transformer<B>>,
    validators: Vec<Box<dyn Validator<B>>>,
    processor: Box<dyn Processor<B>>,
}

impl<B> Stages for TypedStages<B> {
    fn run(&self, header: &MessageHeader, payload: Option<&str>) -> Result<Reply, HandlerError> {
        let body = self.transformer.transform(header, payload)?;
        let request = Request {
            header: header.clone(),
            body,
        };
        for validator in &self.validators {
            validator.validate(&request)?;
        }
        self.processor.process(request)
    }
}

/// Handling of one message type.
pub struct Route {
    message_type: MessageType,
    responds_with: MessageType,
    stages: Box<dyn Stages>,
}

impl std::fmt::Debug for Route {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Route")
            .field("message_type", &self.message_type)
            .field("responds_with", &self.responds_with)
            .finish_non_exhaustive()
    }
}

impl Route {
    /// Start a route for `message_type`. The success reply type is the
    /// one [`MessageType::expected_response`] names; types without one
    /// answer with a processed notification.
    pub fn builder(message_type: MessageType) -> RouteBuilder {
        RouteBuilder {
            message_type,
            responds_with: message_type
                .expected_response()
                .unwrap_or(MessageType::MessageProcessedNotification),
        }
    }

    /// Type this route handles.
    pub fn message_type(&self) -> MessageType {
        self.message_type
    }

    /// Type of the success reply.
    pub fn responds_with(&self) -> MessageType {
        self.responds_with
    }
}

/// First step of building a route: choose the transformer.
#[derive(Debug, Clone, Copy)]
pub struct RouteBuilder {
    message_type: MessageType,
    responds_with: MessageType,
}

impl RouteBuilder {
    /// Set the transformer, fixing the body type.
    pub fn transform<B, T>(self, transformer: T) -> TypedRouteBuilder<B>
    where
        T: Transformer<B> + 'static,
    {
        TypedRouteBuilder {
            message_type: self.message_type,
            responds_with: self.responds_with,
            transformer: Box::new(transformer),
            validators: Vec::new(),
        }
    }
}

/// Route builder once the body type is known.
pub struct TypedRouteBuilder<B> {
    message_type: MessageType,
    responds_with: MessageType,
    transformer: Box<dyn Transformer<B>>,
    validators: Vec<Box<dyn Validator<B>>>,
}

impl<B: 'static> TypedRouteBuilder<B> {
    /// Append a validator. Validators run in the order added.
    pub fn validate<V>(mut self, validator: V) -> Self
    where
        V: Validator<B> + 'static,
    {
        self.validators.push(Box::new(validator));
        self
    }

    /// Set the processor and finish the route.
    pub fn process<P>(self, processor: P) -> Route
    where
        P: Processor<B> + 'static,
    {
        Route {
            message_type: self.message_type,
            responds_with: self.responds_with,
            stages: Box::new(TypedStages {
                transformer: self.transformer,
                validators: self.validators,
                processor: Box::new(processor),
            }),
        }
    }
}

// ── Pipeline ─────────────────────────────────────────────────────────

/// Registry of routes and the inbound dispatch loop.
pub struct Pipeline {
    builder: MessageBuilder,
    codec: Arc<dyn MessageCodec>,
    routes: HashMap<MessageType, Route>,
}

impl std::fmt::Debug for Pipeline {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let mut types: Vec<_> = self.routes.keys().collect();
        types.sort();
        f.debug_struct("Pipeline")
            .field("connector", &self.builder.context().connector_id)
            .field("routes", &types)
            .finish()
    }
}

impl Pipeline {
    /// Create an empty pipeline for the given connector.
    pub fn new(ctx: ConnectorContext, codec: Arc<dyn MessageCodec>) -> Self {
        Self {
            builder: MessageBuilder::new(ctx),
            codec,
            routes: HashMap::new(),
        }
    }

    /// Register a route, returning the one it replaces.
    pub fn register(&mut self, route: Route) -> Option<Route> {
        self.routes.insert(route.message_type, route)
    }

    /// Builder-style [`register`](Self::register).
    pub fn with_route(mut self, route: Route) -> Self {
        self.register(route);
        self
    }

    /// Reply type declared for `message_type`, if it is routed.
    pub fn expected_response(&self, message_type: MessageType) -> Option<MessageType> {
        self.routes.get(&message_type).map(Route::responds_with)
    }

    /// The codec inbound messages are decoded with.
    pub fn codec(&self) -> &Arc<dyn MessageCodec> {
        &self.codec
    }

    /// Handle a decoded message and produce the reply.
    pub fn handle(&self, message: &Message) -> Message {
        let header = &message.header;
        tracing::debug!(
            message_type = %header.message_type,
            message_id = %header.id,
            issuer = %header.issuer_connector,
            "dispatching inbound message"
        );
        match self.run(message) {
            Ok((responds_with, reply)) => {
                Message::new(self.builder.reply(header, responds_with), reply.payload)
            }
            Err(err) => self.reject(Some(header), &err),
        }
    }

    fn run(&self, message: &Message) -> Result<(MessageType, Reply), HandlerError> {
        let header = &message.header;
        if !self.builder.context().supports_inbound_version(&header.model_version) {
            return Err(HandlerError::VersionNotSupported(header.model_version.clone()));
        }
        let route = self
            .routes
            .get(&header.message_type)
            .ok_or(HandlerError::MessageTypeNotSupported(header.message_type))?;
        let reply = route.stages.run(header, message.payload.as_deref())?;
        Ok((route.responds_with, reply))
    }

    fn reject(&self, request: Option<&MessageHeader>, err: &HandlerError) -> Message {
        let reason: RejectionReason = err.reason();
        tracing::warn!(
            message_type = request.map(|h| h.message_type.as_str()).unwrap_or("unknown"),
            reason = %reason,
            error = %err,
            "rejecting inbound message"
        );
        let header = self.builder.rejection(request, err.rejection_type(), reason);
        Message::new(header, Some(err.payload()))
    }

    /// Handle a raw message.
    ///
    /// # Errors
    ///
    /// Only when the reply header itself cannot be encoded. Unreadable
    /// input becomes a malformed-message rejection.
    pub fn dispatch(&self, raw: &RawMessage) -> Result<RawMessage, CodecError> {
        let reply = if raw.is_empty() {
            self.reject(None, &HandlerError::MalformedMessage("message is empty".to_string()))
        } else {
            match self.codec.decode(raw) {
                Ok(message) => self.handle(&message),
                Err(e) => self.reject(
                    None,
                    &HandlerError::MalformedMessage(format!("unreadable header: {e}")),
                ),
            }
        };
        self.codec.encode(&reply)
    }

    /// Handle a transport map.
    pub fn dispatch_parts(&self, parts: WireParts) -> Result<WireParts, CodecError> {
        let raw = match RawMessage::from_parts(parts) {
            Ok(raw) => raw,
            Err(CodecError::MissingPart(_)) => RawMessage {
                header: String::new(),
                payload: None,
            },
            Err(e) => return Err(e),
        };
        Ok(self.dispatch(&raw)?.into_parts())
    }
}
