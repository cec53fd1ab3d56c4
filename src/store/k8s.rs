// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! [`QueueStore`] backed by the Kubernetes API.

use super::{QueueStore, StoreResult};
use crate::crd::{Queue, QueueStatus};
use crate::errors::StoreError;
use crate::scheduler::QueueKey;
use async_trait::async_trait;
use kube::api::{ListParams, Patch, PatchParams};
use kube::{Api, Client, ResourceExt};
use serde_json::{json, Value};
use tracing::debug;

/// Store that reads and patches `Queue` objects through the API server.
#[derive(Clone)]
pub struct KubeQueueStore {
    client: Client,
    /// Restrict listing to one namespace. `None` watches the whole cluster.
    namespace: Option<String>,
}

impl KubeQueueStore {
    #[must_use]
    pub fn new(client: Client, namespace: Option<String>) -> Self {
        Self { client, namespace }
    }

    fn api(&self, namespace: &str) -> Api<Queue> {
        Api::namespaced(self.client.clone(), namespace)
    }
}

/// Build a JSON merge patch that turns `current` into `desired`.
///
/// A merge patch cannot remove map entries by omission, so keys of `observedAttributes`
/// that are no longer present are sent as `null`. `conditions` is a list and is replaced
/// wholesale.
#[must_use]
pub fn status_merge_patch(current: Option<&QueueStatus>, desired: &QueueStatus) -> Value {
    let mut patch = serde_json::to_value(desired).unwrap_or_else(|_| json!({}));

    if let (Some(current), Some(Value::Object(observed))) =
        (current, patch.get_mut("observedAttributes"))
    {
        for key in current.observed_attributes.keys() {
            if !desired.observed_attributes.contains_key(key) {
                observed.insert(key.clone(), Value::Null);
            }
        }
    }

    patch
}

#[async_trait]
impl QueueStore for KubeQueueStore {
    async fn get(&self, key: &QueueKey) -> StoreResult<Option<Queue>> {
        self.api(&key.namespace)
            .get_opt(&key.name)
            .await
            .map_err(|e| StoreError::from_kube(e, &key.to_string()))
    }

    async fn list(&self) -> StoreResult<Vec<Queue>> {
        let api: Api<Queue> = match &self.namespace {
            Some(namespace) => Api::namespaced(self.client.clone(), namespace),
            None => Api::all(self.client.clone()),
        };
        let list = api
            .list(&ListParams::default())
            .await
            .map_err(|e| StoreError::from_kube(e, "queues"))?;
        Ok(list.items)
    }

    async fn set_finalizers(&self, queue: &Queue, finalizers: Vec<String>) -> StoreResult<Queue> {
        let key = QueueKey::from_queue(queue);
        let patch = json!({ "metadata": { "finalizers": finalizers } });
        self.api(&key.namespace)
            .patch(&queue.name_any(), &PatchParams::default(), &Patch::Merge(&patch))
            .await
            .map_err(|e| StoreError::from_kube(e, &key.to_string()))
    }

    async fn replace_status(&self, queue: &Queue, status: &QueueStatus) -> StoreResult<Queue> {
        let key = QueueKey::from_queue(queue);
        let patch = json!({
            "metadata": { "resourceVersion": queue.resource_version() },
            "status": status_merge_patch(queue.status.as_ref(), status),
        });
        debug!(queue = %key, "Patching Queue status");
        self.api(&key.namespace)
            .patch_status(&queue.name_any(), &PatchParams::default(), &Patch::Merge(&patch))
            .await
            .map_err(|e| StoreError::from_kube(e, &key.to_string()))
    }
}

#[cfg(test)]
#[path = "k8s_tests.rs"]
mod k8s_tests;
