//! Coordinator harness for integration testing.
//!
//! Provides `RoomHarness`, a running `CoordinatorActor` wired to an
//! in-memory registry, a capturing bus and mock collaborators that tests can
//! inspect.

use room_coordinator::actors::{
    ActorMetrics, CoordinatorActorHandle, CoordinatorMetrics, CoordinatorSettings, RoomActorHandle,
    RoomServices, RoomSettings,
};
use room_coordinator::collaborators::mock::{
    CapturingBus, MockAppointments, MockCollaboration, MockRecordingService,
};
use room_coordinator::policy::DefaultRightsPolicy;
use room_coordinator::registry::InMemoryClientRegistry;
use room_coordinator::room::{Appointment, Room};
use std::sync::Arc;
use std::time::Duration;

/// Running coordinator plus handles to everything it talks to.
///
/// # Example
/// ```rust,ignore
/// let harness = RoomHarness::builder()
///     .recording(MockRecordingService::permissive())
///     .build();
/// let room = harness.open_room(TestRoom::new(1).build()).await?;
/// ```
pub struct RoomHarness {
    coordinator: CoordinatorActorHandle,
    pub registry: Arc<InMemoryClientRegistry>,
    pub bus: Arc<CapturingBus>,
    pub recording: Arc<MockRecordingService>,
    pub collaboration: Arc<MockCollaboration>,
    pub metrics: Arc<CoordinatorMetrics>,
}

/// Builder for [`RoomHarness`].
pub struct RoomHarnessBuilder {
    appointments: MockAppointments,
    recording: MockRecordingService,
    collaboration: MockCollaboration,
    max_rooms: u32,
    rights_request_ttl: Option<Duration>,
}

impl RoomHarness {
    #[must_use]
    pub fn builder() -> RoomHarnessBuilder {
        RoomHarnessBuilder {
            appointments: MockAppointments::new(),
            recording: MockRecordingService::idle(),
            collaboration: MockCollaboration::new(),
            max_rooms: 16,
            rights_request_ttl: None,
        }
    }

    pub fn coordinator(&self) -> &CoordinatorActorHandle {
        &self.coordinator
    }

    /// Open a room on the coordinator.
    pub async fn open_room(&self, room: Room) -> Result<RoomActorHandle, anyhow::Error> {
        self.coordinator
            .open_room(room)
            .await
            .map_err(|e| anyhow::anyhow!("Failed to open room: {}", e))
    }
}

impl Drop for RoomHarness {
    fn drop(&mut self) {
        // Stop the coordinator and every room actor with it
        self.coordinator.cancel();
    }
}

impl RoomHarnessBuilder {
    #[must_use]
    pub fn appointment(mut self, appointment: Appointment) -> Self {
        self.appointments = self.appointments.with(appointment);
        self
    }

    /// Replace the appointment directory, e.g. with `MockAppointments::failing()`.
    #[must_use]
    pub fn appointments(mut self, appointments: MockAppointments) -> Self {
        self.appointments = appointments;
        self
    }

    #[must_use]
    pub fn recording(mut self, recording: MockRecordingService) -> Self {
        self.recording = recording;
        self
    }

    #[must_use]
    pub fn collaboration(mut self, collaboration: MockCollaboration) -> Self {
        self.collaboration = collaboration;
        self
    }

    #[must_use]
    pub fn max_rooms(mut self, max_rooms: u32) -> Self {
        self.max_rooms = max_rooms;
        self
    }

    #[must_use]
    pub fn rights_request_ttl(mut self, ttl: Duration) -> Self {
        self.rights_request_ttl = Some(ttl);
        self
    }

    /// Spawn the coordinator. Must be called inside a Tokio runtime.
    #[must_use]
    pub fn build(self) -> RoomHarness {
        let registry = Arc::new(InMemoryClientRegistry::new());
        let bus = Arc::new(CapturingBus::new());
        let recording = Arc::new(self.recording);
        let collaboration = Arc::new(self.collaboration);
        let metrics = CoordinatorMetrics::new();

        let services = RoomServices {
            registry: registry.clone(),
            bus: bus.clone(),
            recording: recording.clone(),
            appointments: Arc::new(self.appointments),
            oracle: Arc::new(DefaultRightsPolicy),
            collaboration: collaboration.clone(),
        };
        let settings = CoordinatorSettings {
            coordinator_id: "rc-test".to_string(),
            max_rooms: self.max_rooms,
            room: RoomSettings {
                rights_request_ttl: self.rights_request_ttl,
                ..RoomSettings::default()
            },
        };

        let coordinator =
            CoordinatorActorHandle::new(settings, services, ActorMetrics::new(), metrics.clone());

        RoomHarness {
            coordinator,
            registry,
            bus,
            recording,
            collaboration,
            metrics,
        }
    }
}
