//! Concurrency properties of the admission gates, driven through the full
//! registration service against the in-memory backend.

use std::sync::Arc;

use rollcall_core::{CapacityMode, Category, EventCapacity, SlotSelection, TimeSlot};
use rollcall_db_memory::MemoryBackend;
use rollcall_notify::BroadcastNotifier;
use rollcall_signup::{CredentialService, RegistrationService, SignupError};
use rollcall_storage::EventStore;

fn registration_service(backend: &MemoryBackend) -> RegistrationService {
    RegistrationService::new(
        backend.events.clone(),
        backend.registrations.clone(),
        CredentialService::new(backend.credentials.clone()),
        Arc::new(BroadcastNotifier::new()),
    )
}

fn fixed_event(event_id: &str, max_seats: u32) -> EventCapacity {
    EventCapacity::new(event_id, CapacityMode::Fixed { max_seats }, "org-1")
}

fn slotted_event(event_id: &str, team_a_max: u32) -> EventCapacity {
    EventCapacity::new(event_id, CapacityMode::Fixed { max_seats: 100 }, "org-1").with_time_slots(
        vec![TimeSlot {
            id: "morning".into(),
            name: "Morning".into(),
            start_time: "09:00".parse().unwrap(),
            end_time: "12:00".parse().unwrap(),
            categories: vec![Category::new("team-a", "TeamA", Some(team_a_max))],
        }],
    )
}

fn morning_team_a() -> SlotSelection {
    SlotSelection {
        slot_id: "morning".into(),
        category_id: "team-a".into(),
    }
}

/// For a fixed event with C seats, N > C concurrent registrations from
/// distinct volunteers yield exactly C successes and N - C
/// NoSeatsAvailable rejections.
#[tokio::test(flavor = "multi_thread", worker_threads = 8)]
async fn capacity_soundness_under_concurrency() {
    const SEATS: usize = 7;
    const ATTEMPTS: usize = 60;

    let backend = MemoryBackend::new();
    backend
        .events
        .put_capacity(fixed_event("e1", SEATS as u32))
        .await
        .unwrap();
    let service = Arc::new(registration_service(&backend));

    let mut handles = Vec::new();
    for i in 0..ATTEMPTS {
        let service = service.clone();
        handles.push(tokio::spawn(async move {
            service.register("e1", &format!("v{i}"), vec![], None).await
        }));
    }

    let mut admitted = 0;
    let mut no_seats = 0;
    for handle in handles {
        match handle.await.unwrap() {
            Ok(_) => admitted += 1,
            Err(SignupError::NoSeatsAvailable { .. }) => no_seats += 1,
            Err(other) => panic!("unexpected rejection: {other}"),
        }
    }

    assert_eq!(admitted, SEATS);
    assert_eq!(no_seats, ATTEMPTS - SEATS);

    let capacity = backend.events.get_capacity("e1").await.unwrap().unwrap();
    assert_eq!(capacity.occupant_count(), SEATS);
}

/// Category soundness: the Morning/TeamA scenario. maxOccupants = 2, three
/// concurrent selections: exactly 2 admitted, 1 CategoryFull, and the
/// event-wide occupant count rises by exactly 2.
#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn category_soundness_under_concurrency() {
    let backend = MemoryBackend::new();
    backend
        .events
        .put_capacity(slotted_event("e1", 2))
        .await
        .unwrap();
    let service = Arc::new(registration_service(&backend));

    let mut handles = Vec::new();
    for i in 0..3 {
        let service = service.clone();
        handles.push(tokio::spawn(async move {
            service
                .register("e1", &format!("v{i}"), vec![], Some(morning_team_a()))
                .await
        }));
    }

    let mut admitted = 0;
    let mut category_full = 0;
    for handle in handles {
        match handle.await.unwrap() {
            Ok(_) => admitted += 1,
            Err(SignupError::CategoryFull { .. }) => category_full += 1,
            Err(other) => panic!("unexpected rejection: {other}"),
        }
    }

    assert_eq!(admitted, 2);
    assert_eq!(category_full, 1);

    let capacity = backend.events.get_capacity("e1").await.unwrap().unwrap();
    assert_eq!(capacity.occupant_count(), 2);
    assert_eq!(
        capacity.category("morning", "team-a").unwrap().current_occupants,
        2
    );
}

/// A full category must reject even when the event-wide gate has spare
/// seats, and the rejection must not consume an event-wide seat.
#[tokio::test]
async fn full_category_with_spare_event_capacity() {
    let backend = MemoryBackend::new();
    backend
        .events
        .put_capacity(slotted_event("e1", 1))
        .await
        .unwrap();
    let service = registration_service(&backend);

    service
        .register("e1", "v1", vec![], Some(morning_team_a()))
        .await
        .unwrap();

    let err = service
        .register("e1", "v2", vec![], Some(morning_team_a()))
        .await
        .unwrap_err();
    assert!(matches!(err, SignupError::CategoryFull { .. }));

    let capacity = backend.events.get_capacity("e1").await.unwrap().unwrap();
    // Spare seats remain, but only one was consumed.
    assert_eq!(capacity.occupant_count(), 1);
}

/// No double registration, regardless of timing: many concurrent attempts
/// by one volunteer admit exactly once.
#[tokio::test(flavor = "multi_thread", worker_threads = 8)]
async fn no_double_registration_under_concurrency() {
    let backend = MemoryBackend::new();
    backend
        .events
        .put_capacity(fixed_event("e1", 10))
        .await
        .unwrap();
    let service = Arc::new(registration_service(&backend));

    let mut handles = Vec::new();
    for _ in 0..20 {
        let service = service.clone();
        handles.push(tokio::spawn(async move {
            service.register("e1", "v1", vec![], None).await
        }));
    }

    let mut admitted = 0;
    for handle in handles {
        match handle.await.unwrap() {
            Ok(_) => admitted += 1,
            Err(SignupError::AlreadyRegistered { .. }) => {}
            Err(other) => panic!("unexpected rejection: {other}"),
        }
    }

    assert_eq!(admitted, 1);
    let capacity = backend.events.get_capacity("e1").await.unwrap().unwrap();
    assert_eq!(capacity.occupant_count(), 1);
}

/// The one-seat scenario: A registers, B is rejected, A withdraws, B
/// registers.
#[tokio::test]
async fn last_seat_changes_hands_after_withdrawal() {
    let backend = MemoryBackend::new();
    backend
        .events
        .put_capacity(fixed_event("e1", 1))
        .await
        .unwrap();
    let service = registration_service(&backend);

    service.register("e1", "volunteer-a", vec![], None).await.unwrap();
    let occupied = backend.events.get_capacity("e1").await.unwrap().unwrap();
    assert_eq!(occupied.occupant_count(), 1);

    let err = service
        .register("e1", "volunteer-b", vec![], None)
        .await
        .unwrap_err();
    assert!(matches!(err, SignupError::NoSeatsAvailable { .. }));

    service.withdraw("e1", "volunteer-a").await.unwrap();
    let freed = backend.events.get_capacity("e1").await.unwrap().unwrap();
    assert_eq!(freed.occupant_count(), 0);

    service.register("e1", "volunteer-b", vec![], None).await.unwrap();
    let reoccupied = backend.events.get_capacity("e1").await.unwrap().unwrap();
    assert_eq!(reoccupied.occupant_count(), 1);
    assert!(reoccupied.is_occupant("volunteer-b"));
}

/// Ban supersedes capacity: seats free, volunteer banned, still rejected.
#[tokio::test]
async fn ban_supersedes_capacity() {
    let backend = MemoryBackend::new();
    let mut capacity = fixed_event("e1", 5);
    capacity.banned_volunteers.insert("v1".into());
    backend.events.put_capacity(capacity).await.unwrap();
    let service = registration_service(&backend);

    let err = service.register("e1", "v1", vec![], None).await.unwrap_err();
    assert!(matches!(err, SignupError::Banned { .. }));

    let capacity = backend.events.get_capacity("e1").await.unwrap().unwrap();
    assert_eq!(capacity.occupant_count(), 0);
}
