// src/models/address.rs

//! Grouped and enriched clinic address rows.

use serde::{Deserialize, Serialize};

/// Every dentist and clinic name sharing one address.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GroupedAddress {
    #[serde(rename = "Address")]
    pub address: String,

    /// Distinct owner names joined with `", "`
    #[serde(rename = "Dentist Name")]
    pub owner_names: String,

    /// Distinct location names joined with `", "`
    #[serde(rename = "Clinic Name")]
    pub location_names: String,
}

impl GroupedAddress {
    pub const HEADERS: [&'static str; 3] = ["Address", "Dentist Name", "Clinic Name"];
}

/// A located place candidate.
#[derive(Debug, Clone, PartialEq)]
pub struct PlaceCandidate {
    pub place_id: String,
    pub latitude: f64,
    pub longitude: f64,
}

/// Contact details of a place.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PlaceDetails {
    pub phone: Option<String>,
    pub website: Option<String>,
    pub weekday_hours: Option<Vec<String>>,
}

/// A grouped address with coordinates and contact columns appended.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EnrichedAddress {
    #[serde(rename = "Address")]
    pub address: String,

    #[serde(rename = "Dentist Name")]
    pub owner_names: String,

    #[serde(rename = "Clinic Name")]
    pub location_names: String,

    #[serde(rename = "Latitude")]
    pub latitude: Option<f64>,

    #[serde(rename = "Longitude")]
    pub longitude: Option<f64>,

    #[serde(rename = "Phone")]
    pub phone: Option<String>,

    #[serde(rename = "Website")]
    pub website: Option<String>,

    /// Weekday opening hours joined with `"; "`
    #[serde(rename = "Hours")]
    pub hours: Option<String>,
}

impl From<GroupedAddress> for EnrichedAddress {
    fn from(group: GroupedAddress) -> Self {
        Self {
            address: group.address,
            owner_names: group.owner_names,
            location_names: group.location_names,
            latitude: None,
            longitude: None,
            phone: None,
            website: None,
            hours: None,
        }
    }
}

impl EnrichedAddress {
    pub const HEADERS: [&'static str; 8] = [
        "Address",
        "Dentist Name",
        "Clinic Name",
        "Latitude",
        "Longitude",
        "Phone",
        "Website",
        "Hours",
    ];

    pub fn apply_candidate(&mut self, candidate: &PlaceCandidate) {
        self.latitude = Some(candidate.latitude);
        self.longitude = Some(candidate.longitude);
    }

    pub fn apply_details(&mut self, details: PlaceDetails) {
        self.phone = details.phone;
        self.website = details.website;
        self.hours = details
            .weekday_hours
            .filter(|h| !h.is_empty())
            .map(|h| h.join("; "));
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_apply_details_joins_hours() {
        let mut row = EnrichedAddress::from(GroupedAddress {
            address: "1 Bay St, Toronto".to_string(),
            owner_names: "Dr. A".to_string(),
            location_names: "Bay Dental".to_string(),
        });
        row.apply_details(PlaceDetails {
            phone: Some("(416) 555-0100".to_string()),
            website: None,
            weekday_hours: Some(vec![
                "Monday: 9:00 AM – 5:00 PM".to_string(),
                "Tuesday: Closed".to_string(),
            ]),
        });

        assert_eq!(row.phone.as_deref(), Some("(416) 555-0100"));
        assert_eq!(
            row.hours.as_deref(),
            Some("Monday: 9:00 AM – 5:00 PM; Tuesday: Closed")
        );
    }

    #[test]
    fn test_empty_hours_stay_unset() {
        let mut row = EnrichedAddress::from(GroupedAddress {
            address: "x".to_string(),
            owner_names: String::new(),
            location_names: String::new(),
        });
        row.apply_details(PlaceDetails {
            weekday_hours: Some(Vec::new()),
            ..PlaceDetails::default()
        });
        assert!(row.hours.is_none());
    }
}
