//! ABO/Rh blood group compatibility rules.
//!
//! Compatibility is a fixed medical table, so the resolver is a pure lookup
//! over a closed enum. Unknown labels only exist at the string boundary and
//! resolve to an empty donor set rather than an error.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

/// The eight ABO/Rh blood groups.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum BloodGroup {
    #[serde(rename = "A+")]
    APositive,
    #[serde(rename = "A-")]
    ANegative,
    #[serde(rename = "B+")]
    BPositive,
    #[serde(rename = "B-")]
    BNegative,
    #[serde(rename = "AB+")]
    AbPositive,
    #[serde(rename = "AB-")]
    AbNegative,
    #[serde(rename = "O+")]
    OPositive,
    #[serde(rename = "O-")]
    ONegative,
}

/// All blood groups, in conventional listing order.
pub const ALL_GROUPS: [BloodGroup; 8] = [
    BloodGroup::APositive,
    BloodGroup::ANegative,
    BloodGroup::BPositive,
    BloodGroup::BNegative,
    BloodGroup::AbPositive,
    BloodGroup::AbNegative,
    BloodGroup::OPositive,
    BloodGroup::ONegative,
];

impl BloodGroup {
    /// Clinical label, e.g. `"A+"`.
    pub fn label(&self) -> &'static str {
        match self {
            BloodGroup::APositive => "A+",
            BloodGroup::ANegative => "A-",
            BloodGroup::BPositive => "B+",
            BloodGroup::BNegative => "B-",
            BloodGroup::AbPositive => "AB+",
            BloodGroup::AbNegative => "AB-",
            BloodGroup::OPositive => "O+",
            BloodGroup::ONegative => "O-",
        }
    }
}

impl fmt::Display for BloodGroup {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// Error for unrecognized blood group labels.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("unrecognized blood group label: {0}")]
pub struct ParseBloodGroupError(pub String);

impl FromStr for BloodGroup {
    type Err = ParseBloodGroupError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_uppercase().as_str() {
            "A+" => Ok(BloodGroup::APositive),
            "A-" => Ok(BloodGroup::ANegative),
            "B+" => Ok(BloodGroup::BPositive),
            "B-" => Ok(BloodGroup::BNegative),
            "AB+" => Ok(BloodGroup::AbPositive),
            "AB-" => Ok(BloodGroup::AbNegative),
            "O+" => Ok(BloodGroup::OPositive),
            "O-" => Ok(BloodGroup::ONegative),
            _ => Err(ParseBloodGroupError(s.to_string())),
        }
    }
}

/// Donor groups whose blood a recipient of the given group can receive.
///
/// Standard ABO/Rh rules:
///
/// | Recipient | Compatible donors                      |
/// |-----------|----------------------------------------|
/// | A+        | A+, A-, O+, O-                         |
/// | A-        | A-, O-                                 |
/// | B+        | B+, B-, O+, O-                         |
/// | B-        | B-, O-                                 |
/// | AB+       | all eight groups                       |
/// | AB-       | A-, B-, AB-, O-                        |
/// | O+        | O+, O-                                 |
/// | O-        | O-                                     |
pub fn compatible_donors(recipient: BloodGroup) -> &'static [BloodGroup] {
    use BloodGroup::*;
    match recipient {
        APositive => &[APositive, ANegative, OPositive, ONegative],
        ANegative => &[ANegative, ONegative],
        BPositive => &[BPositive, BNegative, OPositive, ONegative],
        BNegative => &[BNegative, ONegative],
        AbPositive => &ALL_GROUPS,
        AbNegative => &[ANegative, BNegative, AbNegative, ONegative],
        OPositive => &[OPositive, ONegative],
        ONegative => &[ONegative],
    }
}

/// String-keyed variant of [`compatible_donors`] for callers holding raw
/// labels. Unknown labels yield an empty slice, not an error.
pub fn compatible_donors_for_label(label: &str) -> &'static [BloodGroup] {
    match label.parse::<BloodGroup>() {
        Ok(group) => compatible_donors(group),
        Err(_) => &[],
    }
}

/// Whether a donor of the first group may donate to a recipient of the second.
pub fn can_donate_to(donor: BloodGroup, recipient: BloodGroup) -> bool {
    compatible_donors(recipient).contains(&donor)
}
