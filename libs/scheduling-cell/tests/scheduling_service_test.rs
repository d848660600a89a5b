mod common;

use std::sync::Arc;

use assert_matches::assert_matches;
use async_trait::async_trait;
use chrono::{Duration, NaiveDate, Utc};
use futures::future::join_all;
use mockall::mock;
use tokio_test::assert_ok;
use uuid::Uuid;

use scheduling_cell::clock::FixedClock;
use scheduling_cell::effects::Effect;
use scheduling_cell::error::{ConflictReason, ErrorCode, SchedulingError};
use scheduling_cell::models::{
    Appointment, AppointmentStatus, AppointmentTrigger, BlockedTime, BookedInterval,
    BookingOverrides, ExceptionKind, ExceptionStatus, InitialStatus, RescheduleRequest,
    ScheduleException, ServiceInfo, ServiceSelection, StaffBreak, StaffMember, TransitionPayload,
};
use scheduling_cell::policy::SchedulingPolicy;
use scheduling_cell::store::{SchedulingStore, StoreError};
use scheduling_cell::SchedulingService;
use shared_utils::test_utils::{at, date, time, TestUser};

use common::{monday, next_monday, TestSalon};

mock! {
    pub Store {}

    #[async_trait]
    impl SchedulingStore for Store {
        async fn staff(&self, staff_id: Uuid) -> Result<Option<StaffMember>, StoreError>;
        async fn service(&self, service_id: Uuid) -> Result<Option<ServiceInfo>, StoreError>;
        async fn customer_exists(&self, salon_id: Uuid, customer_id: Uuid) -> Result<bool, StoreError>;
        async fn exceptions(&self, staff_id: Uuid, date: NaiveDate) -> Result<Vec<ScheduleException>, StoreError>;
        async fn blocked_times(&self, salon_id: Uuid, staff_id: Uuid, date: NaiveDate) -> Result<Vec<BlockedTime>, StoreError>;
        async fn breaks(&self, staff_id: Uuid) -> Result<Vec<StaffBreak>, StoreError>;
        async fn active_bookings(&self, staff_id: Uuid, date: NaiveDate) -> Result<Vec<BookedInterval>, StoreError>;
        async fn appointment(&self, appointment_id: Uuid) -> Result<Option<Appointment>, StoreError>;
        async fn insert_appointment(&self, appointment: &Appointment) -> Result<(), StoreError>;
        async fn update_appointment(&self, appointment: &Appointment) -> Result<(), StoreError>;
        async fn replace_appointment(&self, superseded: &Appointment, successor: &Appointment) -> Result<(), StoreError>;
    }
}

fn effect_names(effects: &[Effect]) -> Vec<&'static str> {
    effects.iter().map(Effect::name).collect()
}

fn move_to(day: NaiveDate, hour: u32, minute: u32) -> RescheduleRequest {
    RescheduleRequest {
        date: day,
        start_time: time(hour, minute),
        staff_id: None,
        reason: Some("customer asked".to_string()),
        overrides: BookingOverrides::default(),
    }
}

// ==============================================================================
// BOOKING
// ==============================================================================

#[tokio::test]
async fn test_closure_then_booking_then_overlap() {
    let salon = TestSalon::new().await;
    salon
        .store
        .add_exception(ScheduleException {
            id: Uuid::new_v4(),
            staff_id: salon.staff_id,
            start_date: monday(),
            end_date: monday(),
            kind: ExceptionKind::Closure,
            status: ExceptionStatus::Approved,
            reason: Some("vacation".to_string()),
            created_at: Utc::now(),
        })
        .await;

    let closed = salon
        .service
        .find_available_slots(&salon.owner, salon.staff_id, monday(), 30)
        .await
        .unwrap();
    assert!(closed.is_empty());

    let booked = salon
        .service
        .book_appointment(&salon.owner, salon.haircut_at(next_monday(), time(9, 0)))
        .await
        .unwrap();
    assert!(booked.changed);
    assert_eq!(booked.value.status, AppointmentStatus::Pending);
    assert_eq!(booked.value.end_time, time(9, 30));
    assert!(booked.value.confirmation_code.starts_with("BK"));
    assert_eq!(booked.value.confirmation_code.len(), 10);
    assert_eq!(effect_names(&booked.effects), vec!["notify.created", "notify.created"]);

    let overlap = salon
        .service
        .book_appointment(&salon.owner, salon.haircut_at(next_monday(), time(9, 15)))
        .await;
    assert_matches!(
        overlap,
        Err(SchedulingError::Unavailable {
            reason: ConflictReason::SlotTaken { appointment_id },
            alternatives,
        }) if appointment_id == booked.value.id && alternatives.len() == 3
    );
}

#[tokio::test]
async fn test_unavailable_slot_offers_alternatives_in_order() {
    let salon = TestSalon::new().await;
    salon.book(monday(), time(9, 0)).await;

    let err = salon
        .service
        .book_appointment(&salon.owner, salon.haircut_at(monday(), time(9, 0)))
        .await
        .unwrap_err();

    let SchedulingError::Unavailable { alternatives, .. } = err else {
        panic!("expected Unavailable, got {:?}", err);
    };
    let starts: Vec<_> = alternatives.iter().map(|s| s.start_time).collect();
    assert_eq!(starts, vec![time(9, 30), time(10, 0), time(10, 30)]);
}

#[tokio::test]
async fn test_multi_service_booking_is_priced_and_laid_out() {
    let salon = TestSalon::new().await;
    let mut request = salon.haircut_at(monday(), time(10, 0));
    request.services.push(ServiceSelection {
        service_id: salon.color_id,
        quantity: 1,
    });
    request.discount = 2_000;

    let appointment = salon
        .service
        .book_appointment(&salon.owner, request)
        .await
        .unwrap()
        .value;

    assert_eq!(appointment.duration_minutes, 90);
    assert_eq!(appointment.end_time, time(11, 30));
    assert_eq!(appointment.services[1].start_time, time(10, 30));
    assert_eq!(appointment.totals.subtotal, 12_000);
    assert_eq!(appointment.totals.tax, 1_000);
    assert_eq!(appointment.totals.total, 11_000);
    assert_eq!(appointment.status_history.len(), 1);
}

#[tokio::test]
async fn test_draft_booking_emits_no_effects() {
    let salon = TestSalon::new().await;
    let mut request = salon.haircut_at(monday(), time(11, 0));
    request.initial_status = InitialStatus::Draft;

    let outcome = salon.service.book_appointment(&salon.owner, request).await.unwrap();
    assert_eq!(outcome.value.status, AppointmentStatus::Draft);
    assert!(outcome.effects.is_empty());
}

#[tokio::test]
async fn test_booking_rejects_bad_input() {
    let salon = TestSalon::new().await;

    let past = salon
        .service
        .book_appointment(&salon.owner, salon.haircut_at(date(2024, 2, 28), time(10, 0)))
        .await;
    assert_matches!(past, Err(SchedulingError::Validation(_)));

    let mut stranger = salon.haircut_at(monday(), time(10, 0));
    stranger.customer_id = Uuid::new_v4();
    let result = salon.service.book_appointment(&salon.owner, stranger).await;
    assert_matches!(result, Err(SchedulingError::NotFound { entity: "customer", .. }));

    let mut unknown_service = salon.haircut_at(monday(), time(10, 0));
    unknown_service.services[0].service_id = Uuid::new_v4();
    let result = salon.service.book_appointment(&salon.owner, unknown_service).await;
    assert_matches!(result, Err(SchedulingError::NotFound { entity: "service", .. }));

    let mut too_late = salon.haircut_at(monday(), time(23, 45));
    too_late.overrides.outside_hours = true;
    let result = salon.service.book_appointment(&salon.owner, too_late).await;
    assert_matches!(result, Err(SchedulingError::Validation(_)));
}

#[tokio::test]
async fn test_overrides_require_permission() {
    let salon = TestSalon::new().await;
    let mut after_hours = salon.haircut_at(monday(), time(18, 0));
    after_hours.overrides.outside_hours = true;

    let as_staff = salon
        .service
        .book_appointment(&salon.staff, after_hours.clone())
        .await;
    assert_matches!(as_staff, Err(SchedulingError::Forbidden(_)));

    let as_owner = salon.service.book_appointment(&salon.owner, after_hours).await;
    let appointment = assert_ok!(as_owner).value;
    assert_eq!(appointment.start_time, time(18, 0));

    let without_override = salon
        .service
        .book_appointment(&salon.owner, salon.haircut_at(monday(), time(18, 0)))
        .await;
    assert_matches!(
        without_override,
        Err(SchedulingError::Unavailable {
            reason: ConflictReason::OutsideHours { .. },
            ..
        })
    );
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_bookings_admit_exactly_one() {
    let salon = TestSalon::new().await;

    let handles = (0..10).map(|_| {
        let service = salon.service.clone();
        let ctx = salon.owner.clone();
        let request = salon.haircut_at(monday(), time(13, 0));
        tokio::spawn(async move { service.book_appointment(&ctx, request).await })
    });
    let results: Vec<_> = join_all(handles)
        .await
        .into_iter()
        .map(|joined| joined.unwrap())
        .collect();

    assert_eq!(results.iter().filter(|r| r.is_ok()).count(), 1);
    for result in results.iter().filter(|r| r.is_err()) {
        assert_matches!(
            result,
            Err(SchedulingError::Unavailable { .. } | SchedulingError::Conflict { .. })
        );
    }
    assert_eq!(salon.store.appointments_on(salon.staff_id, monday()).await.len(), 1);
}

// ==============================================================================
// STATUS CHANGES
// ==============================================================================

#[tokio::test]
async fn test_cancel_frees_the_slot() {
    let salon = TestSalon::new().await;
    let first = salon.book(next_monday(), time(10, 0)).await;

    let cancelled = salon
        .service
        .transition_status(
            &salon.owner,
            first.id,
            AppointmentTrigger::Cancel,
            TransitionPayload::with_reason("customer called"),
        )
        .await
        .unwrap();
    assert_eq!(cancelled.value.status, AppointmentStatus::Cancelled);
    assert!(cancelled
        .effects
        .iter()
        .any(|e| matches!(e, Effect::RecordCancellation { late: false, .. })));

    let again = salon.book(next_monday(), time(10, 0)).await;
    assert_ne!(again.id, first.id);
}

#[tokio::test]
async fn test_full_visit_on_the_day() {
    let salon = TestSalon::new().await;
    let appointment = salon.book_confirmed(monday(), time(10, 0)).await;
    salon.clock.set(at(monday(), 9, 55));

    for trigger in [AppointmentTrigger::CheckIn, AppointmentTrigger::StartService] {
        salon
            .service
            .transition_status(&salon.staff, appointment.id, trigger, TransitionPayload::default())
            .await
            .unwrap();
    }
    salon.clock.advance(Duration::minutes(40));
    let done = salon
        .service
        .transition_status(
            &salon.staff,
            appointment.id,
            AppointmentTrigger::Complete,
            TransitionPayload::with_tip(500),
        )
        .await
        .unwrap();

    assert_eq!(done.value.status, AppointmentStatus::Completed);
    assert_eq!(done.value.totals.total, 4_900);
    assert_eq!(done.value.status_history.len(), 4);

    let repeat = salon
        .service
        .transition_status(
            &salon.staff,
            appointment.id,
            AppointmentTrigger::Complete,
            TransitionPayload::with_tip(900),
        )
        .await
        .unwrap();
    assert!(!repeat.changed);
    assert_eq!(repeat.value.totals.tip, 500);

    let reopened = salon
        .service
        .transition_status(
            &salon.staff,
            appointment.id,
            AppointmentTrigger::Confirm,
            TransitionPayload::default(),
        )
        .await;
    assert_matches!(reopened, Err(SchedulingError::InvalidTransition { .. }));
}

#[tokio::test]
async fn test_create_is_not_a_status_change() {
    let salon = TestSalon::new().await;
    let appointment = salon.book(monday(), time(10, 0)).await;

    let result = salon
        .service
        .transition_status(
            &salon.owner,
            appointment.id,
            AppointmentTrigger::Create,
            TransitionPayload::default(),
        )
        .await;
    assert_matches!(result, Err(SchedulingError::Validation(_)));
}

// ==============================================================================
// RESCHEDULING
// ==============================================================================

#[tokio::test]
async fn test_reschedule_moves_and_retry_is_idempotent() {
    let salon = TestSalon::new().await;
    let original = salon.book_confirmed(monday(), time(10, 0)).await;

    let moved = salon
        .service
        .reschedule_appointment(&salon.owner, original.id, move_to(monday(), 14, 0))
        .await
        .unwrap();
    assert!(moved.changed);
    let successor = moved.value;
    assert_ne!(successor.id, original.id);
    assert_ne!(successor.confirmation_code, original.confirmation_code);
    assert_eq!(successor.status, AppointmentStatus::Confirmed);
    assert_eq!(successor.start_time, time(14, 0));
    assert_eq!(successor.end_time, time(14, 30));
    assert_eq!(successor.rescheduled_from, Some(original.id));
    assert_eq!(effect_names(&moved.effects), vec!["release.hold", "notify.rescheduled"]);

    let stored = salon.store.appointment(original.id).await.unwrap().unwrap();
    assert_eq!(stored.status, AppointmentStatus::Rescheduled);
    assert_eq!(stored.rescheduled_to, Some(successor.id));

    let retry = salon
        .service
        .reschedule_appointment(&salon.owner, original.id, move_to(monday(), 14, 0))
        .await
        .unwrap();
    assert!(!retry.changed);
    assert_eq!(retry.value.id, successor.id);
    assert!(retry.effects.is_empty());

    let elsewhere = salon
        .service
        .reschedule_appointment(&salon.owner, original.id, move_to(monday(), 15, 0))
        .await;
    assert_matches!(elsewhere, Err(SchedulingError::InvalidTransition { .. }));

    // 10:00 is free again
    salon.book(monday(), time(10, 0)).await;
}

#[tokio::test]
async fn test_reschedule_onto_taken_slot_changes_nothing() {
    let salon = TestSalon::new().await;
    let original = salon.book(monday(), time(10, 0)).await;
    salon.book(monday(), time(11, 0)).await;
    let before = salon.store.appointments_on(salon.staff_id, monday()).await;

    let result = salon
        .service
        .reschedule_appointment(&salon.owner, original.id, move_to(monday(), 11, 0))
        .await;

    assert_matches!(
        result,
        Err(SchedulingError::Unavailable {
            reason: ConflictReason::SlotTaken { .. },
            ..
        })
    );
    assert_eq!(salon.store.appointments_on(salon.staff_id, monday()).await, before);
}

#[tokio::test]
async fn test_reschedule_to_another_stylist() {
    let salon = TestSalon::new().await;
    let original = salon.book(monday(), time(10, 0)).await;
    let mut request = move_to(monday(), 10, 0);
    request.staff_id = Some(salon.second_staff_id);

    let moved = salon
        .service
        .reschedule_appointment(&salon.owner, original.id, request)
        .await
        .unwrap();

    assert_eq!(moved.value.staff_id, salon.second_staff_id);
    assert_eq!(moved.value.status, AppointmentStatus::Pending);
    assert!(salon
        .store
        .appointments_on(salon.second_staff_id, monday())
        .await
        .iter()
        .any(|a| a.id == moved.value.id));
}

// ==============================================================================
// SCOPING AND QUERIES
// ==============================================================================

#[tokio::test]
async fn test_other_salons_cannot_see_appointments() {
    let salon = TestSalon::new().await;
    let appointment = salon.book(monday(), time(10, 0)).await;

    let outsider = TestUser::owner(Uuid::new_v4()).to_context();
    let result = salon.service.get_appointment(&outsider, appointment.id).await;
    assert_matches!(result, Err(SchedulingError::NotFound { entity: "appointment", .. }));

    let slots = salon
        .service
        .find_available_slots(&outsider, salon.staff_id, monday(), 30)
        .await;
    assert_matches!(slots, Err(SchedulingError::NotFound { entity: "staff", .. }));

    let admin = TestUser::super_admin().to_context();
    let seen = salon.service.get_appointment(&admin, appointment.id).await.unwrap();
    assert_eq!(seen.id, appointment.id);
}

#[tokio::test]
async fn test_availability_range_covers_each_day() {
    let salon = TestSalon::new().await;
    salon.book(monday(), time(9, 0)).await;

    let week = salon
        .service
        .find_availability_range(
            &salon.owner,
            salon.staff_id,
            monday(),
            monday() + Duration::days(6),
            30,
        )
        .await
        .unwrap();

    assert_eq!(week.len(), 7);
    assert_eq!(week[0].booked.len(), 1);
    assert_eq!(week[0].free_slots.len(), 15);
    assert_eq!(week[1].free_slots.len(), 16);
    assert!(week[6].working_hours.is_none());
    assert!(week[6].free_slots.is_empty());
}

#[tokio::test]
async fn test_availability_range_limits() {
    let salon = TestSalon::with_policy(SchedulingPolicy {
        max_horizon_days: 7,
        ..common::test_policy()
    })
    .await;

    let backwards = salon
        .service
        .find_availability_range(&salon.owner, salon.staff_id, next_monday(), monday(), 30)
        .await;
    assert_matches!(backwards, Err(SchedulingError::Validation(_)));

    let too_long = salon
        .service
        .find_availability_range(&salon.owner, salon.staff_id, monday(), next_monday(), 30)
        .await;
    assert_matches!(too_long, Err(SchedulingError::Validation(_)));

    let zero = salon
        .service
        .find_available_slots(&salon.owner, salon.staff_id, monday(), 0)
        .await;
    assert_matches!(zero, Err(SchedulingError::Validation(_)));
}

#[tokio::test]
async fn test_durations_longer_than_a_day_are_rejected() {
    let salon = TestSalon::new().await;

    for minutes in [1_440, i32::MAX as u32, u32::MAX] {
        let slots = salon
            .service
            .find_available_slots(&salon.owner, salon.staff_id, next_monday(), minutes)
            .await;
        assert_matches!(slots, Err(SchedulingError::Validation(_)), "{} minutes", minutes);

        let range = salon
            .service
            .find_availability_range(&salon.owner, salon.staff_id, monday(), monday(), minutes)
            .await;
        assert_matches!(range, Err(SchedulingError::Validation(_)), "{} minutes", minutes);
    }

    let whole_shift = salon
        .service
        .find_available_slots(&salon.owner, salon.staff_id, next_monday(), 480)
        .await;
    assert_ok!(whole_shift);
}

#[tokio::test]
async fn test_oversized_quantity_is_rejected_before_commit() {
    let salon = TestSalon::new().await;
    let mut request = salon.haircut_at(monday(), time(9, 0));
    request.services[0].quantity = 143_165_577;

    let result = salon.service.book_appointment(&salon.owner, request).await;

    assert_matches!(result, Err(ref err) if err.code() == ErrorCode::Validation);
    assert!(salon.store.appointments_on(salon.staff_id, monday()).await.is_empty());
}

#[tokio::test]
async fn test_oversized_tip_leaves_appointment_in_progress() {
    let salon = TestSalon::new().await;
    let appointment = salon.book_confirmed(monday(), time(10, 0)).await;
    salon.clock.set(at(monday(), 9, 55));
    for trigger in [AppointmentTrigger::CheckIn, AppointmentTrigger::StartService] {
        salon
            .service
            .transition_status(&salon.staff, appointment.id, trigger, TransitionPayload::default())
            .await
            .unwrap();
    }

    let result = salon
        .service
        .transition_status(
            &salon.staff,
            appointment.id,
            AppointmentTrigger::Complete,
            TransitionPayload::with_tip(i64::MAX),
        )
        .await;

    assert_matches!(result, Err(SchedulingError::Validation(_)));
    let stored = salon.store.appointment(appointment.id).await.unwrap().unwrap();
    assert_eq!(stored.status, AppointmentStatus::InProgress);
    assert_eq!(stored.totals.tip, 0);
}

#[tokio::test]
async fn test_store_failures_surface_as_storage_errors() {
    let mut store = MockStore::new();
    store
        .expect_appointment()
        .returning(|_| Err(StoreError::Backend("connection reset".to_string())));

    let service = SchedulingService::new(
        Arc::new(store),
        Arc::new(SchedulingPolicy::default()),
        Arc::new(FixedClock::new(at(monday(), 8, 0))),
    );
    let ctx = TestUser::owner(Uuid::new_v4()).to_context();

    let err = service.get_appointment(&ctx, Uuid::new_v4()).await.unwrap_err();
    assert_eq!(err.code(), ErrorCode::Storage);
    assert!(!err.is_retryable());
}
