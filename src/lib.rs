//! # Blood Request Screening Library
//!
//! Screening pipeline for a blood donation coordination service. Incoming
//! requests are validated against the intake contract, scored for fraud risk,
//! assigned a dispatch priority, matched to nearby compatible donors, and
//! fanned out to notification transports when the risk gate allows.
//!
//! ## Features
//!
//! - **Intake validation**: unit bounds, deadline sanity, reason length, and
//!   phone format checks
//! - **Heuristic fraud scoring**: six capped checks combined into a 0-100
//!   score with an auditable factor trail
//! - **Dispatch priority**: urgency, time pressure, and volume weighed
//!   against fraud risk, clamped to 1-100
//! - **ABO/Rh compatibility**: donor-recipient resolution over the eight
//!   standard groups
//! - **Geolocated matching**: haversine radius search over an in-memory
//!   donor registry
//! - **Gated notifications**: async fan-out with per-delivery timeouts,
//!   suppressed outright for high-risk requests
//!
//! ## Quick Start
//!
//! ```
//! use blood_request_screener::{
//!     BloodRequest, ContactCard, ContactInfo, RequestScreener, RequesterProfile, Urgency,
//! };
//! use blood_request_screener::geo::{GeoPoint, Location};
//! use chrono::{Duration, Utc};
//! use uuid::Uuid;
//!
//! let mut screener = RequestScreener::new();
//! let home = Location::new(GeoPoint::new(77.5946, 12.9716), "Bangalore", "Karnataka");
//! let requester = RequesterProfile {
//!     id: "requester-42".to_string(),
//!     phone: "+91 98765 43210".to_string(),
//!     location: Some(home.clone()),
//! };
//!
//! let now = Utc::now();
//! let request = BloodRequest {
//!     id: Uuid::new_v4(),
//!     requester_id: requester.id.clone(),
//!     blood_group: "A+".parse().unwrap(),
//!     urgency: Urgency::High,
//!     units_needed: 2,
//!     required_by: now + Duration::hours(12),
//!     location: home,
//!     contact: ContactInfo {
//!         primary_phone: "+91 98765 43210".to_string(),
//!         alternate_phone: None,
//!     },
//!     doctor: ContactCard {
//!         name: "Dr. Meera Nair".to_string(),
//!         address: "Indiranagar, Bangalore".to_string(),
//!         phone: "+91 99880 11223".to_string(),
//!     },
//!     hospital: ContactCard {
//!         name: "St. Martha's Hospital".to_string(),
//!         address: "Nrupathunga Road, Bangalore".to_string(),
//!         phone: "+91 80 2227 5000".to_string(),
//!     },
//!     medical_reason: "Two units on standby for a scheduled cardiac procedure".to_string(),
//!     created_at: now,
//! };
//!
//! let result = screener.screen(&request, &requester).unwrap();
//! assert!(result.record.priority >= 1);
//! ```

pub mod compatibility;
pub mod fraud;
pub mod geo;
pub mod matching;
pub mod notify;
pub mod priority;

pub use compatibility::{
    can_donate_to, compatible_donors, compatible_donors_for_label, BloodGroup,
    ParseBloodGroupError, ALL_GROUPS,
};
pub use fraud::{assess_request, FraudAssessment, FraudFactor, RequestWindowCounts, RiskTier};
pub use geo::{haversine_km, GeoPoint, Location};
pub use matching::{DonorMatch, DonorProfile, DonorRegistry, DONATION_COOLDOWN_DAYS};
pub use notify::{
    spawn_dispatch, DispatchConfig, DispatchReport, NotificationDispatcher, Notifier, NotifyError,
};
pub use priority::{compute_priority, fraud_penalty};

use chrono::{DateTime, Duration, Utc};
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use thiserror::Error;
use tracing::info;
use uuid::Uuid;

/// Fewest units a single request may ask for.
pub const MIN_UNITS: u8 = 1;
/// Most units a single request may ask for.
pub const MAX_UNITS: u8 = 10;
/// Minimum medical reason length in characters.
pub const MIN_REASON_CHARS: usize = 10;
/// Maximum medical reason length in characters.
pub const MAX_REASON_CHARS: usize = 300;
/// Accepted phone format: optional leading `+`, then 10-15 digits, spaces,
/// dashes, or parentheses.
pub const PHONE_PATTERN: &str = r"^\+?[\d\s\-()]{10,15}$";
/// Fraud score above which the requester sees a manual-review warning.
pub const DEFAULT_WARNING_THRESHOLD: u8 = 50;
/// Days of per-requester history kept for frequency scoring.
pub const DEFAULT_HISTORY_RETENTION_DAYS: i64 = 30;

/// Intake contract violations. These reject a request before any scoring.
#[derive(Error, Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum ScreenError {
    #[error("units requested must be between {MIN_UNITS} and {MAX_UNITS}, got {0}")]
    UnitsOutOfRange(u8),

    #[error("required-by deadline {0} is not after the request creation time")]
    DeadlineNotFuture(DateTime<Utc>),

    #[error("medical reason must be {MIN_REASON_CHARS}-{MAX_REASON_CHARS} characters, got {0}")]
    ReasonLength(usize),

    #[error("invalid phone number format: {0}")]
    InvalidPhone(String),

    #[error("coordinates out of range: ({longitude}, {latitude})")]
    InvalidCoordinates { longitude: f64, latitude: f64 },
}

/// Requester-declared urgency of a request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Urgency {
    Low,
    Medium,
    High,
    Critical,
}

impl fmt::Display for Urgency {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Urgency::Low => "low",
            Urgency::Medium => "medium",
            Urgency::High => "high",
            Urgency::Critical => "critical",
        };
        f.write_str(s)
    }
}

/// How coordinators reach whoever filed the request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContactInfo {
    pub primary_phone: String,
    pub alternate_phone: Option<String>,
}

/// Name, address, and phone for a doctor or hospital attached to a request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContactCard {
    pub name: String,
    pub address: String,
    pub phone: String,
}

/// An incoming request for blood units.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BloodRequest {
    pub id: Uuid,
    pub requester_id: String,
    pub blood_group: BloodGroup,
    pub urgency: Urgency,
    pub units_needed: u8,
    pub required_by: DateTime<Utc>,
    pub location: Location,
    pub contact: ContactInfo,
    pub doctor: ContactCard,
    pub hospital: ContactCard,
    pub medical_reason: String,
    pub created_at: DateTime<Utc>,
}

/// The registered account behind a request. A missing location degrades
/// fraud scoring instead of rejecting the request.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RequesterProfile {
    pub id: String,
    pub phone: String,
    pub location: Option<Location>,
}

/// Fraud assessment as stored on a request record, plus the manual-review
/// flag coordinators toggle later.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FraudCheck {
    pub score: u8,
    pub factors: Vec<FraudFactor>,
    pub tier: RiskTier,
    pub is_reviewed: bool,
}

impl From<FraudAssessment> for FraudCheck {
    fn from(assessment: FraudAssessment) -> Self {
        Self {
            score: assessment.score,
            factors: assessment.factors,
            tier: assessment.tier,
            is_reviewed: false,
        }
    }
}

/// A screened request with its fraud check and dispatch priority.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RequestRecord {
    pub request: BloodRequest,
    pub fraud: FraudCheck,
    pub priority: u8,
}

impl RequestRecord {
    /// Changes the urgency and refreshes the priority from the stored fraud
    /// score. The fraud assessment is computed once at intake and never
    /// revisited here.
    pub fn update_urgency(&mut self, urgency: Urgency, now: DateTime<Utc>) {
        self.request.urgency = urgency;
        self.priority = compute_priority(
            urgency,
            self.request.required_by,
            self.request.units_needed,
            self.fraud.score,
            now,
        );
    }
}

/// Tunables for the screening pipeline.
#[derive(Debug, Clone)]
pub struct ScreenerConfig {
    /// Scores strictly above this attach a warning for the requester.
    pub fraud_warning_threshold: u8,
    /// How long per-requester request history is retained.
    pub history_retention_days: i64,
}

impl Default for ScreenerConfig {
    fn default() -> Self {
        Self {
            fraud_warning_threshold: DEFAULT_WARNING_THRESHOLD,
            history_retention_days: DEFAULT_HISTORY_RETENTION_DAYS,
        }
    }
}

/// Outcome of screening one request.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScreeningResult {
    pub record: RequestRecord,
    /// Present when the fraud score crossed the warning threshold.
    pub warning: Option<String>,
    pub screened_at: DateTime<Utc>,
}

impl ScreeningResult {
    /// Whether coordinators should look at this request before it is served.
    pub fn requires_review(&self) -> bool {
        self.record.fraud.tier >= RiskTier::Medium
    }

    /// Whether donor notifications would fire under the default suppression
    /// threshold. A dispatcher configured differently applies its own.
    pub fn notifications_allowed(&self) -> bool {
        self.record.fraud.score < notify::DEFAULT_SUPPRESSION_THRESHOLD
    }

    /// Exports the result as pretty-printed JSON.
    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string_pretty(self)
    }
}

/// Screens incoming requests: contract validation, fraud scoring against
/// per-requester history, and priority assignment.
pub struct RequestScreener {
    config: ScreenerConfig,
    phone_format: Regex,
    history: HashMap<String, Vec<DateTime<Utc>>>,
}

impl RequestScreener {
    pub fn new() -> Self {
        Self::with_config(ScreenerConfig::default())
    }

    pub fn with_config(config: ScreenerConfig) -> Self {
        Self {
            config,
            phone_format: Regex::new(PHONE_PATTERN).expect("phone pattern compiles"),
            history: HashMap::new(),
        }
    }

    /// Validates and scores a request, recording it in the requester's
    /// history so later submissions see it in their frequency windows.
    pub fn screen(
        &mut self,
        request: &BloodRequest,
        requester: &RequesterProfile,
    ) -> Result<ScreeningResult, ScreenError> {
        self.validate_request(request)?;
        let counts = self.window_counts(&requester.id, request.created_at);
        let result = self.build_result(request, requester, counts);
        self.history
            .entry(requester.id.clone())
            .or_default()
            .push(request.created_at);
        Ok(result)
    }

    /// Like [`screen`](Self::screen), but with caller-supplied window counts
    /// and no history side effect. For deployments keeping request history
    /// in an external store.
    pub fn screen_with_counts(
        &self,
        request: &BloodRequest,
        requester: &RequesterProfile,
        counts: RequestWindowCounts,
    ) -> Result<ScreeningResult, ScreenError> {
        self.validate_request(request)?;
        Ok(self.build_result(request, requester, counts))
    }

    fn build_result(
        &self,
        request: &BloodRequest,
        requester: &RequesterProfile,
        counts: RequestWindowCounts,
    ) -> ScreeningResult {
        // The creation time anchors all scoring so a stored record can be
        // re-derived later.
        let assessment = assess_request(request, requester, counts, request.created_at);
        let priority = compute_priority(
            request.urgency,
            request.required_by,
            request.units_needed,
            assessment.score,
            request.created_at,
        );

        let warning = (assessment.score > self.config.fraud_warning_threshold).then(|| {
            format!(
                "This request has been flagged for additional verification (risk score {}). \
                 Our coordination team may contact you before donors are notified.",
                assessment.score
            )
        });

        info!(
            request_id = %request.id,
            requester_id = %requester.id,
            fraud_score = assessment.score,
            tier = %assessment.tier,
            priority,
            "screened blood request"
        );

        ScreeningResult {
            record: RequestRecord {
                request: request.clone(),
                fraud: assessment.into(),
                priority,
            },
            warning,
            screened_at: Utc::now(),
        }
    }

    fn validate_request(&self, request: &BloodRequest) -> Result<(), ScreenError> {
        if !(MIN_UNITS..=MAX_UNITS).contains(&request.units_needed) {
            return Err(ScreenError::UnitsOutOfRange(request.units_needed));
        }
        if request.required_by <= request.created_at {
            return Err(ScreenError::DeadlineNotFuture(request.required_by));
        }
        let reason_chars = request.medical_reason.chars().count();
        if !(MIN_REASON_CHARS..=MAX_REASON_CHARS).contains(&reason_chars) {
            return Err(ScreenError::ReasonLength(reason_chars));
        }
        self.validate_phone(&request.contact.primary_phone)?;
        if let Some(alternate) = &request.contact.alternate_phone {
            self.validate_phone(alternate)?;
        }
        if !request.location.point.is_valid() {
            return Err(ScreenError::InvalidCoordinates {
                longitude: request.location.point.longitude,
                latitude: request.location.point.latitude,
            });
        }
        Ok(())
    }

    fn validate_phone(&self, phone: &str) -> Result<(), ScreenError> {
        if self.phone_format.is_match(phone) {
            Ok(())
        } else {
            Err(ScreenError::InvalidPhone(phone.to_string()))
        }
    }

    fn window_counts(&self, requester_id: &str, now: DateTime<Utc>) -> RequestWindowCounts {
        let timestamps = match self.history.get(requester_id) {
            Some(t) => t,
            None => return RequestWindowCounts::default(),
        };

        let day_ago = now - Duration::hours(24);
        let week_ago = now - Duration::days(7);
        let month_ago = now - Duration::days(30);

        let mut counts = RequestWindowCounts::default();
        for &t in timestamps {
            if t >= month_ago {
                counts.last_30d += 1;
                if t >= week_ago {
                    counts.last_7d += 1;
                    if t >= day_ago {
                        counts.last_24h += 1;
                    }
                }
            }
        }
        counts
    }

    /// Drops history entries older than the configured retention window.
    pub fn clear_old_history(&mut self, now: DateTime<Utc>) {
        let cutoff = now - Duration::days(self.config.history_retention_days);
        for timestamps in self.history.values_mut() {
            timestamps.retain(|&t| t >= cutoff);
        }
        self.history.retain(|_, timestamps| !timestamps.is_empty());
    }

    /// Bookkeeping counters for monitoring.
    pub fn get_stats(&self) -> HashMap<String, usize> {
        let mut stats = HashMap::new();
        stats.insert("requesters_tracked".to_string(), self.history.len());
        stats.insert(
            "requests_recorded".to_string(),
            self.history.values().map(Vec::len).sum(),
        );
        stats
    }
}

impl Default for RequestScreener {
    fn default() -> Self {
        Self::new()
    }
}
