// SPDX-License-Identifier: MIT

use crate::drago::workflow::types::NodeKind;
use crate::engine::handler::{ExecutionParams, NodeHandler, SimulatedHandler};
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;

/// A handler together with the execution parameters of its node type
#[derive(Clone)]
pub struct Registration {
    pub params: ExecutionParams,
    pub handler: Arc<dyn NodeHandler>,
}

/// Maps node types to the handler that executes them
#[derive(Clone)]
pub struct HandlerRegistry {
    handlers: Arc<RwLock<HashMap<NodeKind, Registration>>>,
}

impl HandlerRegistry {
    /// An empty registry; every node type must be registered explicitly
    pub fn new() -> Self {
        Self {
            handlers: Arc::new(RwLock::new(HashMap::new())),
        }
    }

    /// Every known type backed by [`SimulatedHandler`] and its default parameters
    pub fn simulated() -> Self {
        let handler: Arc<dyn NodeHandler> = Arc::new(SimulatedHandler);
        let handlers = NodeKind::ALL
            .into_iter()
            .map(|kind| {
                (
                    kind,
                    Registration {
                        params: kind.default_params(),
                        handler: handler.clone(),
                    },
                )
            })
            .collect();

        Self {
            handlers: Arc::new(RwLock::new(handlers)),
        }
    }

    pub async fn register(
        &self,
        kind: NodeKind,
        params: ExecutionParams,
        handler: Arc<dyn NodeHandler>,
    ) {
        let mut handlers = self.handlers.write().await;
        handlers.insert(kind, Registration { params, handler });
    }

    /// Register the same handler for every known type, keeping each type's
    /// default parameters
    pub async fn register_all(&self, handler: Arc<dyn NodeHandler>) {
        let mut handlers = self.handlers.write().await;
        for kind in NodeKind::ALL {
            handlers.insert(
                kind,
                Registration {
                    params: kind.default_params(),
                    handler: handler.clone(),
                },
            );
        }
    }

    /// Replace the parameters of an existing registration. Returns false if
    /// the type is not registered.
    pub async fn set_params(&self, kind: NodeKind, params: ExecutionParams) -> bool {
        let mut handlers = self.handlers.write().await;
        match handlers.get_mut(&kind) {
            Some(registration) => {
                registration.params = params;
                true
            }
            None => false,
        }
    }

    pub async fn get(&self, kind: NodeKind) -> Option<Registration> {
        let handlers = self.handlers.read().await;
        handlers.get(&kind).cloned()
    }
}

impl Default for HandlerRegistry {
    fn default() -> Self {
        Self::simulated()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::error::ExecutionError;
    use crate::engine::handler::NodeInput;
    use async_trait::async_trait;
    use serde_json::{json, Value};
    use std::time::Duration;

    /// A handler that always returns the same value
    struct FixedHandler(Value);

    #[async_trait]
    impl NodeHandler for FixedHandler {
        async fn execute(&self, _input: NodeInput) -> Result<Value, ExecutionError> {
            Ok(self.0.clone())
        }
    }

    fn fast_params() -> ExecutionParams {
        ExecutionParams::new(Duration::ZERO, 1.0, 0, Duration::ZERO)
    }

    #[tokio::test]
    async fn test_simulated_registry_covers_all_types() {
        let registry = HandlerRegistry::simulated();
        for kind in NodeKind::ALL {
            let registration = registry.get(kind).await.unwrap();
            assert_eq!(registration.params, kind.default_params());
        }
    }

    #[tokio::test]
    async fn test_empty_registry() {
        let registry = HandlerRegistry::new();
        assert!(registry.get(NodeKind::Api).await.is_none());
        assert!(!registry.set_params(NodeKind::Api, fast_params()).await);
    }

    #[tokio::test]
    async fn test_register_overwrites_existing() {
        let registry = HandlerRegistry::simulated();
        registry
            .register(
                NodeKind::Api,
                fast_params(),
                Arc::new(FixedHandler(json!("fixed"))),
            )
            .await;

        let registration = registry.get(NodeKind::Api).await.unwrap();
        assert_eq!(registration.params, fast_params());

        let input = NodeInput {
            node_id: "n".into(),
            node_type: "api".into(),
            attempt: 0,
            inputs: Default::default(),
            params: registration.params,
        };
        assert_eq!(
            registration.handler.execute(input).await.unwrap(),
            json!("fixed")
        );
    }

    #[tokio::test]
    async fn test_registry_is_clone() {
        let registry = HandlerRegistry::new();
        let cloned = registry.clone();

        cloned
            .register_all(Arc::new(FixedHandler(json!(1))))
            .await;
        assert!(registry.get(NodeKind::Trigger).await.is_some());

        assert!(registry.set_params(NodeKind::Trigger, fast_params()).await);
        assert_eq!(
            cloned.get(NodeKind::Trigger).await.unwrap().params,
            fast_params()
        );
    }
}
