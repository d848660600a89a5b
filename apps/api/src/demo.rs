use chrono::{NaiveTime, Weekday};
use tracing::{info, warn};
use uuid::Uuid;

use scheduling_cell::models::{
    BreakType, ServiceInfo, StaffBreak, StaffMember, TimeRange, WorkingHoursTemplate,
};
use scheduling_cell::store::InMemoryStore;

pub const DEMO_SALON_ID: Uuid = Uuid::from_u128(0x5a10_0000_0000_0000_0000_0000_0000_0001);
pub const DEMO_STAFF_ID: Uuid = Uuid::from_u128(0x57af_0000_0000_0000_0000_0000_0000_0001);
pub const DEMO_CUSTOMER_ID: Uuid = Uuid::from_u128(0xc057_0000_0000_0000_0000_0000_0000_0001);
pub const DEMO_HAIRCUT_ID: Uuid = Uuid::from_u128(0x5e71_0000_0000_0000_0000_0000_0000_0001);
pub const DEMO_COLOR_ID: Uuid = Uuid::from_u128(0x5e71_0000_0000_0000_0000_0000_0000_0002);

fn hours(start: (u32, u32), end: (u32, u32)) -> Option<TimeRange> {
    let start = NaiveTime::from_hms_opt(start.0, start.1, 0)?;
    let end = NaiveTime::from_hms_opt(end.0, end.1, 0)?;
    TimeRange::new(start, end).ok()
}

/// One salon with a single stylist, two services and one customer.
pub async fn seed(store: &InMemoryStore) {
    let (Some(day), Some(lunch)) = (hours((9, 0), (17, 0)), hours((12, 0), (12, 30))) else {
        warn!("Demo hours are invalid, skipping seed");
        return;
    };

    let working_hours = [
        Weekday::Mon,
        Weekday::Tue,
        Weekday::Wed,
        Weekday::Thu,
        Weekday::Fri,
        Weekday::Sat,
    ]
    .into_iter()
    .fold(WorkingHoursTemplate::new(), |template, weekday| template.with_day(weekday, day));

    store
        .add_staff(StaffMember {
            id: DEMO_STAFF_ID,
            salon_id: DEMO_SALON_ID,
            display_name: "Demo Stylist".to_string(),
            working_hours,
            service_ids: vec![],
            is_active: true,
        })
        .await;
    store
        .add_break(StaffBreak {
            id: Uuid::new_v4(),
            staff_id: DEMO_STAFF_ID,
            break_type: BreakType::Lunch,
            day_of_week: None,
            hours: lunch,
        })
        .await;
    for (id, name, minutes, price) in [
        (DEMO_HAIRCUT_ID, "Haircut", 30, 4_500),
        (DEMO_COLOR_ID, "Color", 90, 12_000),
    ] {
        store
            .add_service(ServiceInfo {
                id,
                salon_id: DEMO_SALON_ID,
                name: name.to_string(),
                duration_minutes: minutes,
                price,
                is_active: true,
            })
            .await;
    }
    store.add_customer(DEMO_SALON_ID, DEMO_CUSTOMER_ID).await;

    info!(
        "Seeded demo salon {} with staff {} and customer {}",
        DEMO_SALON_ID, DEMO_STAFF_ID, DEMO_CUSTOMER_ID
    );
}
