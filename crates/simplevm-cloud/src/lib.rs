//! simplevm Cloud Infrastructure
//!
//! This crate provides the declarative core of simplevm: resources are
//! declared into a [`ResourceGraph`], planned against the recorded stack
//! state and applied through a [`CloudProvider`].
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────┐
//! │                  simplevm CLI                    │
//! │            (simplevm up / destroy)               │
//! └─────────────────┬───────────────────────────────┘
//!                   │ ResourceGraph
//! ┌─────────────────▼───────────────────────────────┐
//! │                simplevm-cloud                    │
//! │  ┌──────────────┐  ┌──────────────┐             │
//! │  │    Engine    │  │  State Mgmt  │             │
//! │  │ plan / apply │  │  state.json  │             │
//! │  └──────┬───────┘  └──────────────┘             │
//! │  ┌──────▼───────────────────────────────────┐   │
//! │  │          Provider Abstraction             │   │
//! │  │  trait CloudProvider { ... }              │   │
//! │  └──────────────────────────────────────────┘   │
//! └───────┬─────────────────────────────────────────┘
//!         │
//! ┌───────▼───────┐
//! │ azure-native  │
//! │   provider    │
//! └───────────────┘
//! ```

pub mod action;
pub mod engine;
pub mod error;
pub mod graph;
pub mod provider;
pub mod reference;
pub mod state;

// Re-exports
pub use action::{Action, ActionResult, ActionType, ApplyResult, Plan, PlanSummary};
pub use engine::{Engine, PlanOptions};
pub use error::{CloudError, Result};
pub use graph::ResourceGraph;
pub use provider::{AuthStatus, CloudProvider, ResourceConfig, ResourceOptions};
pub use reference::{OutputRef, collect_refs, resolve_refs};
pub use state::{GlobalState, ResourceState, ResourceStatus, StateLock, StateManager};
