//! # RC Test Utilities
//!
//! Shared test utilities for the Room Coordinator (RC) service.
//!
//! This crate provides:
//! - `fixtures` - Builders for users, rooms, participants and appointments
//! - `harness` - `RoomHarness`, a coordinator wired to in-memory and mock collaborators
//!
//! ## Usage
//!
//! ```rust,ignore
//! use rc_test_utils::*;
//!
//! #[tokio::test]
//! async fn test_example() -> anyhow::Result<()> {
//!     let harness = RoomHarness::builder().build();
//!     let room = harness.open_room(TestRoom::new(1).with_capacity(2).build()).await?;
//!
//!     let outcome = room.enter(TestParticipant::new(10).build()).await?;
//!     assert!(outcome.participant().is_some());
//!     Ok(())
//! }
//! ```

pub mod fixtures;
pub mod harness;

// Re-export commonly used items
pub use fixtures::*;
pub use harness::*;
