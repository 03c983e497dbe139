//! Donor registry and geolocated matching.
//!
//! The registry keeps donors and open requests in memory. Matching filters
//! donors by availability, donation cooldown, blood compatibility, and
//! search radius, then orders them nearest first. The reverse view lists the
//! open requests a given donor could serve, most urgent first.

use crate::compatibility::{can_donate_to, BloodGroup};
use crate::geo::{haversine_km, Location};
use crate::RequestRecord;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use tracing::debug;
use uuid::Uuid;

/// Minimum days between whole-blood donations.
pub const DONATION_COOLDOWN_DAYS: i64 = 56;

/// A registered donor.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DonorProfile {
    pub id: Uuid,
    pub name: String,
    pub blood_group: BloodGroup,
    pub location: Location,
    pub available: bool,
    pub last_donation: Option<DateTime<Utc>>,
    pub phone: String,
    pub email: Option<String>,
}

impl DonorProfile {
    /// Whether the donation cooldown has elapsed. Donors with no recorded
    /// donation are eligible.
    pub fn can_donate(&self, now: DateTime<Utc>) -> bool {
        match self.last_donation {
            None => true,
            Some(last) => now.signed_duration_since(last).num_days() >= DONATION_COOLDOWN_DAYS,
        }
    }
}

/// A donor paired with their distance from a request site.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DonorMatch {
    pub donor: DonorProfile,
    pub distance_km: f64,
}

/// In-memory store of donors and open requests.
#[derive(Default)]
pub struct DonorRegistry {
    donors: HashMap<Uuid, DonorProfile>,
    open_requests: Vec<RequestRecord>,
}

impl DonorRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a donor, replacing any existing profile with the same id.
    pub fn upsert_donor(&mut self, donor: DonorProfile) {
        self.donors.insert(donor.id, donor);
    }

    /// Flips a donor's availability. Returns false when the donor is unknown.
    pub fn set_availability(&mut self, donor_id: Uuid, available: bool) -> bool {
        match self.donors.get_mut(&donor_id) {
            Some(donor) => {
                donor.available = available;
                true
            }
            None => false,
        }
    }

    pub fn donor_count(&self) -> usize {
        self.donors.len()
    }

    /// Registers a screened request as open for matching.
    pub fn post_request(&mut self, record: RequestRecord) {
        self.open_requests.push(record);
    }

    /// Removes a request once fulfilled or cancelled. Returns false when no
    /// open request has the given id.
    pub fn close_request(&mut self, request_id: Uuid) -> bool {
        let before = self.open_requests.len();
        self.open_requests.retain(|r| r.request.id != request_id);
        self.open_requests.len() < before
    }

    pub fn open_request_count(&self) -> usize {
        self.open_requests.len()
    }

    /// Donors who could serve the request: available, past cooldown,
    /// blood-compatible, and within `radius_km` of the request site.
    /// Sorted nearest first.
    pub fn find_donors(
        &self,
        record: &RequestRecord,
        radius_km: f64,
        now: DateTime<Utc>,
    ) -> Vec<DonorMatch> {
        let request = &record.request;
        let mut matches: Vec<DonorMatch> = self
            .donors
            .values()
            .filter(|donor| donor.available && donor.can_donate(now))
            .filter(|donor| can_donate_to(donor.blood_group, request.blood_group))
            .filter_map(|donor| {
                let distance_km = haversine_km(donor.location.point, request.location.point);
                (distance_km <= radius_km).then(|| DonorMatch {
                    donor: donor.clone(),
                    distance_km,
                })
            })
            .collect();

        matches.sort_by(|a, b| {
            a.distance_km
                .partial_cmp(&b.distance_km)
                .unwrap_or(std::cmp::Ordering::Equal)
        });

        debug!(
            request_id = %request.id,
            blood_group = %request.blood_group,
            matches = matches.len(),
            radius_km,
            "matched donors for request"
        );
        matches
    }

    /// Open requests the donor could serve, within `radius_km` of the
    /// donor's location. Sorted by priority, newest first among ties.
    pub fn open_requests_for_donor(
        &self,
        donor: &DonorProfile,
        radius_km: f64,
    ) -> Vec<&RequestRecord> {
        let mut records: Vec<&RequestRecord> = self
            .open_requests
            .iter()
            .filter(|record| can_donate_to(donor.blood_group, record.request.blood_group))
            .filter(|record| {
                haversine_km(donor.location.point, record.request.location.point) <= radius_km
            })
            .collect();

        records.sort_by(|a, b| {
            b.priority
                .cmp(&a.priority)
                .then(b.request.created_at.cmp(&a.request.created_at))
        });
        records
    }
}
