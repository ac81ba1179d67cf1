//! Actor model implementation for the Room Coordinator.
//!
//! ```text
//! CoordinatorActor (singleton per coordinator instance)
//! └── supervises N RoomActors
//!     └── RoomActor (one per open room)
//!         ├── owns room configuration and activity log
//!         ├── admits participants through the AdmissionController
//!         └── routes events through the BroadcastFacade
//! ```
//!
//! # Key Design Decisions
//!
//! - **One writer per room**: Only the room's actor mutates its participants,
//!   so events of one room are handled strictly in arrival order
//! - **CancellationToken propagation**: Room actors get child tokens of the
//!   coordinator's root token
//! - **Mailbox monitoring**: Queue backlog thresholds with metrics (Room: 100/400, Coordinator: 50/200)
//!
//! # Modules
//!
//! - [`coordinator`] - `CoordinatorActor` singleton that supervises rooms
//! - [`room`] - `RoomActor` per open room
//! - [`messages`] - Message types for actor communication
//! - [`metrics`] - Mailbox monitoring and actor metrics

pub mod coordinator;
pub mod messages;
pub mod metrics;
pub mod room;

pub use coordinator::{CoordinatorActor, CoordinatorActorHandle, CoordinatorSettings};
pub use messages::*;
pub use metrics::{
    ActorMetrics, ActorType, CoordinatorMetrics, CoordinatorMetricsSnapshot, MailboxMonitor,
};
pub use room::{RoomActor, RoomActorHandle, RoomServices, RoomSettings};
