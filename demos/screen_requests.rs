//! End-to-end walkthrough: screen two requests, match donors, and fan out
//! notifications through a console transport.
//!
//! Run with `cargo run --example screen_requests`. Set `RUST_LOG=info` to see
//! the structured screening logs alongside the printed report.

use async_trait::async_trait;
use blood_request_screener::geo::{GeoPoint, Location};
use blood_request_screener::{
    compatible_donors, spawn_dispatch, BloodGroup, BloodRequest, ContactCard, ContactInfo,
    DonorProfile, DonorRegistry, NotificationDispatcher, Notifier, NotifyError, RequestRecord,
    RequestScreener, RequestWindowCounts, RequesterProfile, Urgency,
};
use chrono::{Duration, Utc};
use std::sync::Arc;
use tracing_subscriber::EnvFilter;
use uuid::Uuid;

struct ConsoleNotifier;

#[async_trait]
impl Notifier for ConsoleNotifier {
    fn name(&self) -> &str {
        "console"
    }

    async fn deliver(
        &self,
        donor: &DonorProfile,
        record: &RequestRecord,
    ) -> Result<(), NotifyError> {
        println!(
            "   -> alerting {} ({}) about {} request {}",
            donor.name, donor.phone, record.request.blood_group, record.request.id
        );
        Ok(())
    }
}

fn bangalore() -> Location {
    Location::new(GeoPoint::new(77.5946, 12.9716), "Bangalore", "Karnataka")
}

fn seed_donors(registry: &mut DonorRegistry) {
    let now = Utc::now();
    let donors = [
        ("Asha Pillai", BloodGroup::ONegative, 0.03, true, None),
        ("Vikram Rao", BloodGroup::OPositive, 0.08, true, None),
        ("Leela Menon", BloodGroup::ANegative, 0.15, true, None),
        ("Farhan Khan", BloodGroup::BPositive, 0.05, true, None),
        ("Divya Shetty", BloodGroup::OPositive, 0.02, false, None),
        (
            "Rohit Iyer",
            BloodGroup::APositive,
            0.10,
            true,
            Some(now - Duration::days(20)),
        ),
    ];
    for (name, group, lat_offset, available, last_donation) in donors {
        registry.upsert_donor(DonorProfile {
            id: Uuid::new_v4(),
            name: name.to_string(),
            blood_group: group,
            location: Location::new(
                GeoPoint::new(77.5946, 12.9716 + lat_offset),
                "Bangalore",
                "Karnataka",
            ),
            available,
            last_donation,
            phone: "+91 90000 11111".to_string(),
            email: Some(format!(
                "{}@example.org",
                name.to_lowercase().replace(' ', ".")
            )),
        });
    }
}

fn clean_request(now: chrono::DateTime<Utc>) -> BloodRequest {
    BloodRequest {
        id: Uuid::new_v4(),
        requester_id: "requester-singh".to_string(),
        blood_group: BloodGroup::APositive,
        urgency: Urgency::Critical,
        units_needed: 2,
        required_by: now + Duration::hours(5),
        location: bangalore(),
        contact: ContactInfo {
            primary_phone: "+91 98765 43210".to_string(),
            alternate_phone: None,
        },
        doctor: ContactCard {
            name: "Dr. Meera Nair".to_string(),
            address: "Indiranagar, Bangalore".to_string(),
            phone: "+91 99880 11223".to_string(),
        },
        hospital: ContactCard {
            name: "St. Martha's Hospital".to_string(),
            address: "Nrupathunga Road, Bangalore, Karnataka".to_string(),
            phone: "+91 80 2227 5000".to_string(),
        },
        medical_reason: "Emergency laparotomy tonight; surgeon asked for two units of A+ \
                         packed cells cross-matched and held"
            .to_string(),
        created_at: now,
    }
}

fn suspicious_request(now: chrono::DateTime<Utc>) -> BloodRequest {
    BloodRequest {
        id: Uuid::new_v4(),
        requester_id: "requester-unknown".to_string(),
        blood_group: BloodGroup::ONegative,
        urgency: Urgency::Critical,
        units_needed: 8,
        required_by: now + Duration::hours(1),
        location: Location::new(GeoPoint::new(72.8777, 19.0760), "Mumbai", "Maharashtra"),
        contact: ContactInfo {
            primary_phone: "1111111111".to_string(),
            alternate_phone: None,
        },
        doctor: ContactCard {
            name: "Dr. Kumar".to_string(),
            address: "unknown".to_string(),
            phone: "1111111111".to_string(),
        },
        hospital: ContactCard {
            name: "City Hospital".to_string(),
            address: "Main Road".to_string(),
            phone: "2222222222".to_string(),
        },
        medical_reason: "urgent need please help".to_string(),
        created_at: now,
    }
}

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    println!("=== Blood Request Screening Demo ===\n");

    let mut screener = RequestScreener::new();
    let mut registry = DonorRegistry::new();
    seed_donors(&mut registry);
    let dispatcher = Arc::new(NotificationDispatcher::new(ConsoleNotifier));
    let now = Utc::now();

    // 1. A legitimate critical request sails through and donors are alerted.
    println!("1. Critical A+ request from a registered hospital contact:");
    let requester = RequesterProfile {
        id: "requester-singh".to_string(),
        phone: "+91 98765 43210".to_string(),
        location: Some(bangalore()),
    };
    let result = screener
        .screen(&clean_request(now), &requester)
        .expect("request passes intake validation");
    println!(
        "   fraud score {} ({}), dispatch priority {}",
        result.record.fraud.score, result.record.fraud.tier, result.record.priority
    );
    println!(
        "   compatible donor groups: {:?}",
        compatible_donors(result.record.request.blood_group)
            .iter()
            .map(|g| g.label())
            .collect::<Vec<_>>()
    );

    let matches = registry.find_donors(&result.record, 50.0, now);
    println!("   {} donors within 50 km:", matches.len());
    for m in &matches {
        println!(
            "     {} [{}] at {:.1} km",
            m.donor.name, m.donor.blood_group, m.distance_km
        );
    }

    let handle = spawn_dispatch(Arc::clone(&dispatcher), result.record.clone(), matches);
    let report = handle.await.expect("dispatch task completes");
    println!(
        "   dispatch report: attempted {}, delivered {}, failed {}\n",
        report.attempted, report.delivered, report.failed
    );
    registry.post_request(result.record);

    // 2. A request tripping most heuristics is flagged and never announced.
    println!("2. Suspicious request far from the registered account:");
    let stranger = RequesterProfile {
        id: "requester-unknown".to_string(),
        phone: "+91 91234 56789".to_string(),
        location: Some(bangalore()),
    };
    // Frequency windows as an external request store would report them.
    let counts = RequestWindowCounts {
        last_24h: 4,
        last_7d: 11,
        last_30d: 21,
    };
    let result = screener
        .screen_with_counts(&suspicious_request(now), &stranger, counts)
        .expect("request passes intake validation");
    println!(
        "   fraud score {} ({}), dispatch priority {}",
        result.record.fraud.score, result.record.fraud.tier, result.record.priority
    );
    for factor in &result.record.fraud.factors {
        println!("     +{:<2} {}", factor.weight, factor.factor);
    }
    if let Some(warning) = &result.warning {
        println!("   requester sees: {warning}");
    }

    let matches = registry.find_donors(&result.record, 50.0, now);
    let report = dispatcher.dispatch(&result.record, &matches).await;
    println!(
        "   notifications suppressed: {} (attempted {})\n",
        report.suppressed, report.attempted
    );

    // 3. The donor-side view of the open request board.
    println!("3. Open requests visible to an O- donor:");
    let donor = DonorProfile {
        id: Uuid::new_v4(),
        name: "Asha Pillai".to_string(),
        blood_group: BloodGroup::ONegative,
        location: bangalore(),
        available: true,
        last_donation: None,
        phone: "+91 90000 11111".to_string(),
        email: None,
    };
    for record in registry.open_requests_for_donor(&donor, 50.0) {
        println!(
            "   priority {:>3}  {} unit(s) of {} needed by {}",
            record.priority,
            record.request.units_needed,
            record.request.blood_group,
            record.request.required_by.format("%Y-%m-%d %H:%M UTC")
        );
    }
}
