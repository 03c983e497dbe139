//! Heuristic fraud scoring for blood requests.
//!
//! Six independent checks each produce a capped sub-score:
//! - Request frequency across 24h/7d/30d windows (max 25)
//! - Geographic consistency against the requester's registered location (max 20)
//! - Contact information patterns (max 15)
//! - Timing of creation and deadline (max 15)
//! - Medical reason phrasing (max 10)
//! - Hospital verification (max 15)
//!
//! The capped sub-scores are summed and clamped to 100. Scoring never fails:
//! when an input is too incomplete to evaluate, the assessment degrades to a
//! neutral score of zero at the `low` tier and the cause is logged.

use crate::geo::{haversine_km, Location};
use crate::{BloodRequest, ContactCard, RequesterProfile};
use chrono::{DateTime, Duration, Local, Timelike, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;
use tracing::warn;

/// Maximum contribution of the request-frequency check.
pub const FREQUENCY_CAP: u8 = 25;
/// Maximum contribution of the location-consistency check.
pub const LOCATION_CAP: u8 = 20;
/// Maximum contribution of the contact-information check.
pub const CONTACT_CAP: u8 = 15;
/// Maximum contribution of the timing check.
pub const TIMING_CAP: u8 = 15;
/// Maximum contribution of the medical-reason check.
pub const REASON_CAP: u8 = 10;
/// Maximum contribution of the hospital-verification check.
pub const HOSPITAL_CAP: u8 = 15;
/// Upper bound of the combined fraud score.
pub const MAX_SCORE: u8 = 100;

const GENERIC_REASON_PHRASES: [&str; 8] = [
    "emergency",
    "urgent",
    "operation",
    "surgery",
    "accident",
    "blood loss",
    "anemia",
    "transfusion needed",
];

const PLEA_PHRASES: [&str; 2] = ["please help", "urgent need"];

const GENERIC_HOSPITAL_NAMES: [&str; 6] = [
    "city hospital",
    "general hospital",
    "medical center",
    "clinic",
    "healthcare",
    "hospital",
];

const SEQUENTIAL_PHONES: [&str; 2] = ["1234567890", "0123456789"];

/// A generic reason phrase is only suspicious when the whole reason is short.
const GENERIC_REASON_MAX_CHARS: usize = 50;

/// Risk tier derived from the combined score.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RiskTier {
    Minimal,
    Low,
    Medium,
    High,
}

impl RiskTier {
    /// Maps a score to its tier: 70+ is high, 40+ medium, 20+ low.
    pub fn from_score(score: u8) -> Self {
        match score {
            70..=u8::MAX => RiskTier::High,
            40..=69 => RiskTier::Medium,
            20..=39 => RiskTier::Low,
            _ => RiskTier::Minimal,
        }
    }
}

impl fmt::Display for RiskTier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            RiskTier::Minimal => "minimal",
            RiskTier::Low => "low",
            RiskTier::Medium => "medium",
            RiskTier::High => "high",
        };
        f.write_str(s)
    }
}

/// One triggered heuristic: a human-readable explanation and its weight.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FraudFactor {
    pub factor: String,
    pub weight: u8,
}

/// Outcome of scoring a single request.
///
/// The tier is stored rather than derived because a degraded assessment
/// reports `low` even though its score is zero.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FraudAssessment {
    pub score: u8,
    pub factors: Vec<FraudFactor>,
    pub tier: RiskTier,
}

impl FraudAssessment {
    /// Neutral assessment used when scoring inputs are incomplete.
    pub fn degraded() -> Self {
        Self {
            score: 0,
            factors: Vec::new(),
            tier: RiskTier::Low,
        }
    }
}

/// Rolling counts of earlier requests by the same requester.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RequestWindowCounts {
    pub last_24h: u32,
    pub last_7d: u32,
    pub last_30d: u32,
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
enum FraudInputError {
    #[error("requester has no registered location")]
    MissingRequesterLocation,
    #[error("requester's registered coordinates are invalid")]
    InvalidRegisteredLocation,
}

/// Scores a request against its requester's profile and request history.
///
/// `now` is the reference instant for deadline math; the screener passes the
/// request's creation time so an assessment is reproducible afterwards.
pub fn assess_request(
    request: &BloodRequest,
    requester: &RequesterProfile,
    counts: RequestWindowCounts,
    now: DateTime<Utc>,
) -> FraudAssessment {
    match try_assess(request, requester, counts, now) {
        Ok(assessment) => assessment,
        Err(err) => {
            warn!(
                request_id = %request.id,
                requester_id = %requester.id,
                error = %err,
                "fraud scoring degraded, returning neutral assessment"
            );
            FraudAssessment::degraded()
        }
    }
}

fn try_assess(
    request: &BloodRequest,
    requester: &RequesterProfile,
    counts: RequestWindowCounts,
    now: DateTime<Utc>,
) -> Result<FraudAssessment, FraudInputError> {
    let registered = requester
        .location
        .as_ref()
        .ok_or(FraudInputError::MissingRequesterLocation)?;
    if !registered.point.is_valid() {
        return Err(FraudInputError::InvalidRegisteredLocation);
    }

    let checks = [
        frequency_check(counts),
        location_check(&request.location, registered),
        contact_check(request, &requester.phone),
        timing_check(request.created_at, request.required_by, now),
        reason_check(&request.medical_reason),
        hospital_check(&request.hospital, &request.location.city),
    ];

    let mut total: u16 = 0;
    let mut factors = Vec::new();
    for check in checks {
        total += u16::from(check.points());
        factors.extend(check.factors);
    }

    let score = total.min(u16::from(MAX_SCORE)) as u8;
    Ok(FraudAssessment {
        score,
        factors,
        tier: RiskTier::from_score(score),
    })
}

/// Accumulates factors for one check; its contribution is capped but the
/// recorded factor weights stay uncapped for auditability.
struct SubScore {
    cap: u8,
    raw: u16,
    factors: Vec<FraudFactor>,
}

impl SubScore {
    fn new(cap: u8) -> Self {
        Self {
            cap,
            raw: 0,
            factors: Vec::new(),
        }
    }

    fn add(&mut self, weight: u8, factor: impl Into<String>) {
        self.raw += u16::from(weight);
        self.factors.push(FraudFactor {
            factor: factor.into(),
            weight,
        });
    }

    fn points(&self) -> u8 {
        self.raw.min(u16::from(self.cap)) as u8
    }
}

fn frequency_check(counts: RequestWindowCounts) -> SubScore {
    let mut sub = SubScore::new(FREQUENCY_CAP);

    let day = counts.last_24h;
    if day > 3 {
        sub.add(25, format!("{day} requests in the last 24 hours"));
    } else if day > 2 {
        sub.add(15, format!("{day} requests in the last 24 hours"));
    } else if day > 1 {
        sub.add(5, format!("{day} requests in the last 24 hours"));
    }

    let week = counts.last_7d;
    if week > 10 {
        sub.add(20, format!("{week} requests in the last 7 days"));
    } else if week > 7 {
        sub.add(10, format!("{week} requests in the last 7 days"));
    } else if week > 5 {
        sub.add(5, format!("{week} requests in the last 7 days"));
    }

    let month = counts.last_30d;
    if month > 20 {
        sub.add(15, format!("{month} requests in the last 30 days"));
    } else if month > 15 {
        sub.add(8, format!("{month} requests in the last 30 days"));
    }

    sub
}

fn location_check(request_location: &Location, registered: &Location) -> SubScore {
    let mut sub = SubScore::new(LOCATION_CAP);

    let distance = haversine_km(request_location.point, registered.point);
    if distance > 100.0 {
        sub.add(
            20,
            format!("Request located {distance:.0} km from registered location"),
        );
    } else if distance > 50.0 {
        sub.add(
            10,
            format!("Request located {distance:.0} km from registered location"),
        );
    } else if distance > 25.0 {
        sub.add(
            5,
            format!("Request located {distance:.0} km from registered location"),
        );
    }

    if !request_location
        .city
        .eq_ignore_ascii_case(&registered.city)
    {
        sub.add(10, "Request city differs from registered city");
    }
    if !request_location
        .state
        .eq_ignore_ascii_case(&registered.state)
    {
        sub.add(15, "Request state differs from registered state");
    }

    sub
}

fn contact_check(request: &BloodRequest, registered_phone: &str) -> SubScore {
    let mut sub = SubScore::new(CONTACT_CAP);

    let contact = digits_only(&request.contact.primary_phone);
    let registered = digits_only(registered_phone);

    if contact != registered {
        sub.add(5, "Contact phone differs from registered phone");
    }

    if has_repeated_digit_run(&contact) || SEQUENTIAL_PHONES.contains(&contact.as_str()) {
        sub.add(10, "Contact phone matches a suspicious digit pattern");
    }

    let doctor = digits_only(&request.doctor.phone);
    let hospital = digits_only(&request.hospital.phone);
    let identical_pair = (!doctor.is_empty() && doctor == hospital)
        || (!doctor.is_empty() && doctor == contact)
        || (!hospital.is_empty() && hospital == contact);
    if identical_pair {
        sub.add(8, "Doctor, hospital, or contact phone numbers are identical");
    }

    sub
}

fn timing_check(
    created_at: DateTime<Utc>,
    required_by: DateTime<Utc>,
    now: DateTime<Utc>,
) -> SubScore {
    let mut sub = SubScore::new(TIMING_CAP);

    let local_hour = created_at.with_timezone(&Local).hour();
    if local_hour >= 23 || local_hour < 6 {
        sub.add(5, "Request created during night hours");
    }

    let until_deadline = required_by.signed_duration_since(now);
    if until_deadline < Duration::hours(2) {
        sub.add(15, "Required-by deadline less than 2 hours away");
    }
    if until_deadline > Duration::days(30) {
        sub.add(10, "Required-by deadline more than 30 days away");
    }

    sub
}

fn reason_check(reason: &str) -> SubScore {
    let mut sub = SubScore::new(REASON_CAP);
    let lower = reason.to_lowercase();

    let generic = GENERIC_REASON_PHRASES.iter().any(|p| lower.contains(p));
    if generic && reason.chars().count() < GENERIC_REASON_MAX_CHARS {
        sub.add(8, "Generic medical reason with little detail");
    }

    if PLEA_PHRASES.iter().any(|p| lower.contains(p)) {
        sub.add(5, "Plea phrasing in medical reason");
    }

    sub
}

fn hospital_check(hospital: &ContactCard, request_city: &str) -> SubScore {
    let mut sub = SubScore::new(HOSPITAL_CAP);

    let name = hospital.name.to_lowercase();
    if GENERIC_HOSPITAL_NAMES.contains(&name.as_str()) {
        sub.add(10, "Hospital name is a generic placeholder");
    }

    if !hospital
        .address
        .to_lowercase()
        .contains(&request_city.to_lowercase())
    {
        sub.add(8, "Hospital address does not mention the request city");
    }

    sub
}

/// Strips everything but ASCII digits, so formatting differences never hide
/// a phone match.
pub(crate) fn digits_only(phone: &str) -> String {
    phone.chars().filter(|c| c.is_ascii_digit()).collect()
}

/// True when seven or more identical digits appear consecutively.
fn has_repeated_digit_run(digits: &str) -> bool {
    let mut previous = None;
    let mut run = 0u32;
    for c in digits.chars() {
        if Some(c) == previous {
            run += 1;
        } else {
            previous = Some(c);
            run = 1;
        }
        if run >= 7 {
            return true;
        }
    }
    false
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::geo::GeoPoint;
    use crate::{ContactInfo, Urgency};
    use chrono::TimeZone;
    use uuid::Uuid;

    fn bangalore() -> Location {
        Location::new(GeoPoint::new(77.5946, 12.9716), "Bangalore", "Karnataka")
    }

    /// Noon local time on a fixed date, expressed in UTC, so the night-hours
    /// heuristic stays quiet regardless of the host timezone.
    fn local_noon() -> DateTime<Utc> {
        Local
            .with_ymd_and_hms(2025, 3, 10, 12, 0, 0)
            .single()
            .unwrap()
            .with_timezone(&Utc)
    }

    fn create_test_requester() -> RequesterProfile {
        RequesterProfile {
            id: "requester-1".to_string(),
            phone: "+91 98765 43210".to_string(),
            location: Some(bangalore()),
        }
    }

    fn create_test_request(created_at: DateTime<Utc>) -> BloodRequest {
        BloodRequest {
            id: Uuid::new_v4(),
            requester_id: "requester-1".to_string(),
            blood_group: "A+".parse().unwrap(),
            urgency: Urgency::High,
            units_needed: 2,
            required_by: created_at + Duration::hours(24),
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
            medical_reason: "Scheduled cardiac bypass surgery on Wednesday requires \
                             two units of packed red cells on standby"
                .to_string(),
            created_at,
        }
    }

    #[test]
    fn test_clean_request_scores_zero() {
        let now = local_noon();
        let assessment = assess_request(
            &create_test_request(now),
            &create_test_requester(),
            RequestWindowCounts::default(),
            now,
        );
        assert_eq!(assessment.score, 0);
        assert!(assessment.factors.is_empty());
        assert_eq!(assessment.tier, RiskTier::Minimal);
    }

    #[test]
    fn test_four_requests_in_a_day_hits_frequency_cap() {
        let now = local_noon();
        let counts = RequestWindowCounts {
            last_24h: 4,
            last_7d: 4,
            last_30d: 4,
        };
        let assessment = assess_request(
            &create_test_request(now),
            &create_test_requester(),
            counts,
            now,
        );
        assert_eq!(assessment.score, 25);
        assert!(assessment
            .factors
            .iter()
            .any(|f| f.weight == 25 && f.factor.contains("24 hours")));
    }

    #[test]
    fn test_frequency_tiers_are_monotone_in_daily_count() {
        let mut last = 0;
        for day in 0..8 {
            let sub = frequency_check(RequestWindowCounts {
                last_24h: day,
                last_7d: day,
                last_30d: day,
            });
            assert!(sub.points() >= last, "count {day} lowered the sub-score");
            last = sub.points();
        }
    }

    #[test]
    fn test_frequency_window_tiers_sum_to_cap() {
        let sub = frequency_check(RequestWindowCounts {
            last_24h: 5,
            last_7d: 12,
            last_30d: 25,
        });
        // 25 + 20 + 15 raw, capped at 25.
        assert_eq!(sub.raw, 60);
        assert_eq!(sub.points(), FREQUENCY_CAP);
        assert_eq!(sub.factors.len(), 3);
    }

    #[test]
    fn test_distant_request_capped_at_location_maximum() {
        let now = local_noon();
        let mut request = create_test_request(now);
        // About 120 km north of the registered point, different city.
        request.location = Location::new(
            GeoPoint::new(77.5946, 14.0516),
            "Hindupur",
            "Karnataka",
        );
        request.hospital.address = "Bazaar Street, Hindupur, Karnataka".to_string();
        let assessment = assess_request(
            &request,
            &create_test_requester(),
            RequestWindowCounts::default(),
            now,
        );
        // Distance (20) plus city mismatch (10) cap to 20; the contact
        // check contributes nothing because phones are consistent.
        assert_eq!(assessment.score, LOCATION_CAP);
        assert!(assessment.factors.iter().any(|f| f.weight == 20));
        assert!(assessment.factors.iter().any(|f| f.weight == 10));
    }

    #[test]
    fn test_location_distance_tiers() {
        let registered = bangalore();
        // Roughly 30 km, 60 km, 110 km north.
        for (dlat, expected) in [(0.27, 5), (0.54, 10), (0.99, 20)] {
            let request_loc = Location::new(
                GeoPoint::new(77.5946, 12.9716 + dlat),
                "Bangalore",
                "Karnataka",
            );
            let sub = location_check(&request_loc, &registered);
            assert_eq!(sub.points(), expected, "offset {dlat}");
        }
    }

    #[test]
    fn test_city_comparison_is_case_insensitive() {
        let registered = bangalore();
        let request_loc = Location::new(
            GeoPoint::new(77.5946, 12.9716),
            "BANGALORE",
            "karnataka",
        );
        let sub = location_check(&request_loc, &registered);
        assert_eq!(sub.points(), 0);
    }

    #[test]
    fn test_suspicious_phone_patterns() {
        assert!(has_repeated_digit_run("91111111"));
        assert!(has_repeated_digit_run("5550000000123"));
        assert!(!has_repeated_digit_run("911111"));
        assert!(!has_repeated_digit_run("9876543210"));
        assert!(!has_repeated_digit_run(""));

        let now = local_noon();
        let mut request = create_test_request(now);
        request.contact.primary_phone = "123-456-7890".to_string();
        let sub = contact_check(&request, "+91 98765 43210");
        // Differs from registered (5) and is the ascending sequence (10).
        assert_eq!(sub.points(), CONTACT_CAP);
    }

    #[test]
    fn test_matching_professional_phones_flagged() {
        let now = local_noon();
        let mut request = create_test_request(now);
        request.doctor.phone = "+91 (80) 2227-5000".to_string();
        request.hospital.phone = "+91 80 2227 5000".to_string();
        let sub = contact_check(&request, "+91 98765 43210");
        assert_eq!(sub.points(), 8);

        // Missing phones never count as a match.
        request.doctor.phone = String::new();
        request.hospital.phone = String::new();
        let sub = contact_check(&request, "+91 98765 43210");
        assert_eq!(sub.points(), 0);
    }

    #[test]
    fn test_deadline_timing_flags() {
        let now = local_noon();
        let sub = timing_check(now, now + Duration::minutes(90), now);
        assert_eq!(sub.points(), 15);

        let sub = timing_check(now, now + Duration::days(45), now);
        assert_eq!(sub.points(), 10);

        let sub = timing_check(now, now + Duration::hours(12), now);
        assert_eq!(sub.points(), 0);
    }

    #[test]
    fn test_night_creation_flagged() {
        let night = Local
            .with_ymd_and_hms(2025, 3, 10, 2, 30, 0)
            .single()
            .unwrap()
            .with_timezone(&Utc);
        let sub = timing_check(night, night + Duration::hours(12), night);
        assert_eq!(sub.points(), 5);
        assert!(sub.factors[0].factor.contains("night"));
    }

    #[test]
    fn test_reason_phrasing_flags() {
        let sub = reason_check("urgent surgery");
        assert_eq!(sub.points(), 8);

        // Generic phrase inside a detailed reason is fine.
        let sub = reason_check(
            "Scheduled hip replacement surgery; surgeon requested two units \
             cross-matched and held from Tuesday morning",
        );
        assert_eq!(sub.points(), 0);

        let sub = reason_check("Urgent need, please help with blood");
        assert_eq!(sub.points(), REASON_CAP);

        let sub = reason_check("Routine platelet top-up for chemotherapy cycle");
        assert_eq!(sub.points(), 0);
    }

    #[test]
    fn test_hospital_verification_flags() {
        let card = ContactCard {
            name: "City Hospital".to_string(),
            address: "12 MG Road".to_string(),
            phone: "+91 80 4000 1000".to_string(),
        };
        let sub = hospital_check(&card, "Bangalore");
        // Generic name (10) and address missing the city (8), capped at 15.
        assert_eq!(sub.raw, 18);
        assert_eq!(sub.points(), HOSPITAL_CAP);

        let card = ContactCard {
            name: "St. Martha's Hospital".to_string(),
            address: "Nrupathunga Road, Bangalore".to_string(),
            phone: "+91 80 2227 5000".to_string(),
        };
        let sub = hospital_check(&card, "Bangalore");
        assert_eq!(sub.points(), 0);
    }

    #[test]
    fn test_missing_requester_location_degrades() {
        let now = local_noon();
        let mut requester = create_test_requester();
        requester.location = None;
        let assessment = assess_request(
            &create_test_request(now),
            &requester,
            RequestWindowCounts {
                last_24h: 4,
                last_7d: 11,
                last_30d: 21,
            },
            now,
        );
        assert_eq!(assessment, FraudAssessment::degraded());
        assert_eq!(assessment.score, 0);
        assert!(assessment.factors.is_empty());
        assert_eq!(assessment.tier, RiskTier::Low);
    }

    #[test]
    fn test_unusable_registered_coordinates_degrade() {
        let now = local_noon();
        let mut requester = create_test_requester();
        if let Some(location) = requester.location.as_mut() {
            location.point = GeoPoint::new(f64::NAN, 12.97);
        }
        let assessment = assess_request(
            &create_test_request(now),
            &requester,
            RequestWindowCounts::default(),
            now,
        );
        assert_eq!(assessment, FraudAssessment::degraded());
    }

    #[test]
    fn test_score_is_bounded() {
        let night = Local
            .with_ymd_and_hms(2025, 3, 10, 1, 0, 0)
            .single()
            .unwrap()
            .with_timezone(&Utc);
        let mut request = create_test_request(night);
        request.location = Location::new(GeoPoint::new(72.8777, 19.0760), "Mumbai", "Maharashtra");
        request.contact.primary_phone = "1111111111".to_string();
        request.doctor.phone = "1111111111".to_string();
        request.required_by = night + Duration::minutes(30);
        request.medical_reason = "urgent need please help emergency".to_string();
        request.hospital.name = "hospital".to_string();
        request.hospital.address = "somewhere".to_string();

        let assessment = assess_request(
            &request,
            &create_test_requester(),
            RequestWindowCounts {
                last_24h: 9,
                last_7d: 20,
                last_30d: 40,
            },
            night,
        );
        assert_eq!(assessment.score, MAX_SCORE);
        assert_eq!(assessment.tier, RiskTier::High);
        assert!(assessment.factors.len() >= 8);
    }

    #[test]
    fn test_tier_ranges() {
        assert_eq!(RiskTier::from_score(0), RiskTier::Minimal);
        assert_eq!(RiskTier::from_score(19), RiskTier::Minimal);
        assert_eq!(RiskTier::from_score(20), RiskTier::Low);
        assert_eq!(RiskTier::from_score(39), RiskTier::Low);
        assert_eq!(RiskTier::from_score(40), RiskTier::Medium);
        assert_eq!(RiskTier::from_score(69), RiskTier::Medium);
        assert_eq!(RiskTier::from_score(70), RiskTier::High);
        assert_eq!(RiskTier::from_score(100), RiskTier::High);
    }

    #[test]
    fn test_factor_weights_survive_serialization() {
        let factor = FraudFactor {
            factor: "9 requests in the last 24 hours".to_string(),
            weight: 25,
        };
        let json = serde_json::to_string(&factor).unwrap();
        let back: FraudFactor = serde_json::from_str(&json).unwrap();
        assert_eq!(back, factor);
    }
}
