#![allow(dead_code)]

use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use chrono::{NaiveDate, NaiveTime, Weekday};
use uuid::Uuid;

use scheduling_cell::clock::FixedClock;
use scheduling_cell::effects::{DispatchError, Effect, EffectDispatcher};
use scheduling_cell::models::{
    Appointment, AppointmentService, AppointmentStatus, AppointmentTotals, BookingOverrides,
    BookingRequest, InitialStatus, ServiceInfo, ServiceSelection, StaffMember, TimeRange,
    WorkingHoursTemplate,
};
use scheduling_cell::policy::SchedulingPolicy;
use scheduling_cell::store::InMemoryStore;
use scheduling_cell::SchedulingService;
use shared_models::auth::RequestContext;
use shared_utils::test_utils::{at, date, time, TestUser};

pub fn monday() -> NaiveDate {
    date(2024, 3, 4)
}

pub fn next_monday() -> NaiveDate {
    date(2024, 3, 11)
}

pub fn sunday() -> NaiveDate {
    date(2024, 3, 10)
}

pub fn hours(start: NaiveTime, end: NaiveTime) -> TimeRange {
    TimeRange::new(start, end).unwrap()
}

/// Monday to Friday, 09:00-17:00.
pub fn weekday_template() -> WorkingHoursTemplate {
    [Weekday::Mon, Weekday::Tue, Weekday::Wed, Weekday::Thu, Weekday::Fri]
        .into_iter()
        .fold(WorkingHoursTemplate::new(), |t, day| {
            t.with_day(day, hours(time(9, 0), time(17, 0)))
        })
}

pub fn test_policy() -> SchedulingPolicy {
    SchedulingPolicy {
        lock_timeout_ms: 500,
        ..SchedulingPolicy::default()
    }
}

pub struct TestSalon {
    pub salon_id: Uuid,
    pub staff_id: Uuid,
    pub second_staff_id: Uuid,
    pub customer_id: Uuid,
    pub haircut_id: Uuid,
    pub color_id: Uuid,
    pub store: Arc<InMemoryStore>,
    pub clock: Arc<FixedClock>,
    pub service: SchedulingService,
    pub owner: RequestContext,
    pub staff: RequestContext,
}

impl TestSalon {
    pub async fn new() -> Self {
        Self::with_policy(test_policy()).await
    }

    pub async fn with_policy(policy: SchedulingPolicy) -> Self {
        let store = Arc::new(InMemoryStore::new());
        let salon_id = Uuid::new_v4();
        let staff_id = Uuid::new_v4();
        let second_staff_id = Uuid::new_v4();
        let customer_id = Uuid::new_v4();
        let haircut_id = Uuid::new_v4();
        let color_id = Uuid::new_v4();

        for (id, name) in [(staff_id, "Alex"), (second_staff_id, "Sam")] {
            store
                .add_staff(StaffMember {
                    id,
                    salon_id,
                    display_name: name.to_string(),
                    working_hours: weekday_template(),
                    service_ids: vec![],
                    is_active: true,
                })
                .await;
        }
        store
            .add_service(ServiceInfo {
                id: haircut_id,
                salon_id,
                name: "Haircut".to_string(),
                duration_minutes: 30,
                price: 4_000,
                is_active: true,
            })
            .await;
        store
            .add_service(ServiceInfo {
                id: color_id,
                salon_id,
                name: "Color".to_string(),
                duration_minutes: 60,
                price: 8_000,
                is_active: true,
            })
            .await;
        store.add_customer(salon_id, customer_id).await;

        let clock = Arc::new(FixedClock::new(at(date(2024, 3, 1), 8, 0)));
        let service = SchedulingService::new(store.clone(), Arc::new(policy), clock.clone());

        Self {
            salon_id,
            staff_id,
            second_staff_id,
            customer_id,
            haircut_id,
            color_id,
            store,
            clock,
            service,
            owner: TestUser::owner(salon_id).to_context(),
            staff: TestUser::staff(salon_id).to_context(),
        }
    }

    pub fn haircut_at(&self, day: NaiveDate, start: NaiveTime) -> BookingRequest {
        BookingRequest {
            staff_id: self.staff_id,
            customer_id: self.customer_id,
            date: day,
            start_time: start,
            services: vec![ServiceSelection {
                service_id: self.haircut_id,
                quantity: 1,
            }],
            initial_status: InitialStatus::Pending,
            discount: 0,
            notes: None,
            overrides: BookingOverrides::default(),
        }
    }

    pub async fn book(&self, day: NaiveDate, start: NaiveTime) -> Appointment {
        self.service
            .book_appointment(&self.owner, self.haircut_at(day, start))
            .await
            .unwrap()
            .value
    }

    pub async fn book_confirmed(&self, day: NaiveDate, start: NaiveTime) -> Appointment {
        let mut request = self.haircut_at(day, start);
        request.initial_status = InitialStatus::Confirmed;
        self.service
            .book_appointment(&self.owner, request)
            .await
            .unwrap()
            .value
    }
}

/// A stand-alone 30 minute appointment for state machine tests.
pub fn sample_appointment(status: AppointmentStatus, day: NaiveDate, start: NaiveTime) -> Appointment {
    let created = at(date(2024, 3, 1), 8, 0);
    let end = start + chrono::Duration::minutes(30);
    Appointment {
        id: Uuid::new_v4(),
        salon_id: Uuid::new_v4(),
        staff_id: Uuid::new_v4(),
        customer_id: Uuid::new_v4(),
        confirmation_code: "BKTEST001".to_string(),
        date: day,
        start_time: start,
        end_time: end,
        duration_minutes: 30,
        buffer_minutes: 0,
        services: vec![AppointmentService {
            service_id: Uuid::new_v4(),
            name: "Haircut".to_string(),
            duration_minutes: 30,
            unit_price: 4_000,
            quantity: 1,
            order: 0,
            start_time: start,
            end_time: end,
        }],
        totals: AppointmentTotals {
            subtotal: 4_000,
            discount: 0,
            tax: 400,
            tip: 0,
            total: 4_400,
            finalized: false,
        },
        status,
        notes: None,
        cancellation_reason: None,
        rescheduled_from: None,
        rescheduled_to: None,
        checked_in: None,
        started: None,
        completed: None,
        cancelled: None,
        no_show: None,
        status_history: vec![],
        created_at: created,
        updated_at: created,
    }
}

/// Collects dispatched effects for assertions.
#[derive(Default)]
pub struct RecordingDispatcher {
    pub effects: Mutex<Vec<Effect>>,
}

impl RecordingDispatcher {
    pub fn recorded(&self) -> Vec<Effect> {
        self.effects.lock().unwrap().clone()
    }
}

#[async_trait]
impl EffectDispatcher for RecordingDispatcher {
    async fn dispatch(&self, effects: &[Effect]) -> Result<(), DispatchError> {
        self.effects.lock().unwrap().extend_from_slice(effects);
        Ok(())
    }
}
