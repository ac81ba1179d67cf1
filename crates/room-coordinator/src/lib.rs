//! Room Coordinator Service Library
//!
//! Server-side coordinator for virtual meeting rooms:
//!
//! - Admission of participants (capacity, appointment windows, groups)
//! - Per-participant rights and activities
//! - Moderator quorum gating of non-moderators
//! - Dispatch of room events into addressed notifications
//! - Request/grant protocol for elevated rights
//!
//! # Architecture
//!
//! ```text
//! CoordinatorActor (singleton per coordinator instance)
//! └── supervises N RoomActors
//!     └── RoomActor (one per open room)
//!         ├── AdmissionController -> ClientRegistry
//!         └── BroadcastFacade -> dispatcher -> MessageBus
//! ```
//!
//! The dispatcher is a pure function from room state and one event to a
//! [`dispatcher::Transition`]; all side effects happen in the facade.
//!
//! # Modules
//!
//! - [`actors`] - Coordinator and room actors
//! - [`admission`] - Entry authorization and registration
//! - [`broadcast`] - Applies transitions and fans out notifications
//! - [`collaborators`] - Interfaces of registry, bus, recording and lookup services
//! - [`dispatcher`] - Event to notification mapping
//! - [`quorum`] - Moderator gate
//! - [`rights`] / [`rights_request`] - Rights model and request protocol
//! - [`config`] - Service configuration from environment
//! - [`errors`] - Error types with signaling error codes

pub mod activity;
pub mod actors;
pub mod admission;
pub mod broadcast;
pub mod bus;
pub mod collaborators;
pub mod config;
pub mod dispatcher;
pub mod errors;
pub mod events;
pub mod observability;
pub mod participant;
pub mod policy;
pub mod quorum;
pub mod registry;
pub mod rights;
pub mod rights_request;
pub mod room;
