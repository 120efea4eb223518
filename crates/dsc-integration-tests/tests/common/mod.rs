//! Shared setup for the scenario tests: an in-memory provider behind a
//! loopback transport, and a consumer saga pointed at it.

#![allow(dead_code)]

use std::sync::Arc;

use chrono::{DateTime, TimeDelta, TimeZone, Utc};
use serde_json::json;

use dsc_core::{ConnectorContext, Uri};
use dsc_message::{JsonCodec, Loopback, MessageBuilder, Pipeline};
use dsc_negotiation::{
    ConnectorServices, ContractSaga, MemoryAgreements, MemoryCatalog, MemoryExecution,
    MemoryResources,
};
use dsc_policy::{ContractOffer, DecisionPoint, Rule};

pub const MODEL_VERSION: &str = "4.2.7";

pub fn init_tracing() {
    let _ = tracing_subscriber::fmt().with_test_writer().try_init();
}

pub fn uri(s: &str) -> Uri {
    Uri::new(s).unwrap()
}

pub fn provider_id() -> Uri {
    uri("https://provider.example")
}

pub fn consumer_id() -> Uri {
    uri("https://consumer.example")
}

pub fn artifact(n: u32) -> Uri {
    uri(&format!("https://provider.example/artifacts/{n}"))
}

pub fn resource(n: u32) -> Uri {
    uri(&format!("https://provider.example/resources/{n}"))
}

pub fn ymd(y: i32, m: u32, d: u32) -> DateTime<Utc> {
    Utc.with_ymd_and_hms(y, m, d, 0, 0, 0).unwrap()
}

/// A provider connector with in-memory collaborators.
pub struct Provider {
    pub catalog: MemoryCatalog,
    pub agreements: MemoryAgreements,
    pub resources: MemoryResources,
    pub execution: MemoryExecution,
    pub pipeline: Arc<Pipeline>,
}

impl Provider {
    pub fn new() -> Self {
        let catalog = MemoryCatalog::new();
        let agreements = MemoryAgreements::new();
        let resources = MemoryResources::new();
        let execution = MemoryExecution::new();
        resources.set_self_description(json!({
            "@id": provider_id().as_str(),
            "@type": "ids:BaseConnector",
        }));
        let services = ConnectorServices {
            ctx: ConnectorContext::new(provider_id(), MODEL_VERSION),
            codec: Arc::new(JsonCodec),
            catalog: Arc::new(catalog.clone()),
            agreements: Arc::new(agreements.clone()),
            resolver: Arc::new(resources.clone()),
            persistence: Arc::new(resources.clone()),
            decision: DecisionPoint::new(Arc::new(resources.clone()), Arc::new(execution.clone())),
            default_validity: TimeDelta::days(30),
        };
        Self {
            catalog,
            agreements,
            resources,
            execution,
            pipeline: Arc::new(services.pipeline()),
        }
    }

    /// Offer `rules` for `target`, valid 2000 to 2100, open to anyone.
    pub fn offer(&self, target: &Uri, rules: Vec<Rule>) {
        self.offer_restricted(target, rules, None);
    }

    pub fn offer_restricted(&self, target: &Uri, rules: Vec<Rule>, consumer: Option<Uri>) {
        self.catalog.publish(
            target.clone(),
            ContractOffer {
                id: uri(&format!("{target}/offers/1")),
                provider: provider_id(),
                consumer,
                start: ymd(2000, 1, 1),
                end: ymd(2100, 1, 1),
                rules,
            },
        );
    }

    /// Register a resource description and an artifact with data.
    pub fn publish_artifact(&self, resource_uri: &Uri, artifact_uri: &Uri, data: &str) {
        self.resources.add_description(
            resource_uri.clone(),
            json!({"@id": resource_uri.as_str(), "title": "Weather observations"}),
        );
        self.resources
            .add_artifact(artifact_uri.clone(), json!({"@id": artifact_uri.as_str()}), data, Utc::now());
    }

    pub fn transport(&self) -> Arc<Loopback> {
        Arc::new(Loopback::new(self.pipeline.clone()))
    }
}

/// The consumer side of a scenario.
pub struct Consumer {
    pub agreements: MemoryAgreements,
    pub resources: MemoryResources,
    pub saga: ContractSaga,
    pub builder: MessageBuilder,
}

impl Consumer {
    pub fn connected_to(provider: &Provider) -> Self {
        let agreements = MemoryAgreements::new();
        let resources = MemoryResources::new();
        let ctx = ConnectorContext::new(consumer_id(), MODEL_VERSION);
        let saga = ContractSaga::new(
            ctx.clone(),
            Arc::new(JsonCodec),
            provider.transport(),
            Arc::new(agreements.clone()),
            Arc::new(resources.clone()),
        );
        Self {
            agreements,
            resources,
            saga,
            builder: MessageBuilder::new(ctx),
        }
    }
}
