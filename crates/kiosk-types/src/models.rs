use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// Top-level listing category. Each category carries its own variant payload
/// (see [`ListingDetails`]); a vehicle ad never has property fields and vice
/// versa.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Category {
    Vehicle,
    Property,
}

impl Category {
    pub fn as_str(&self) -> &'static str {
        match self {
            Category::Vehicle => "vehicle",
            Category::Property => "property",
        }
    }
}

impl fmt::Display for Category {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Category {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "vehicle" => Ok(Category::Vehicle),
            "property" => Ok(Category::Property),
            other => Err(format!("unknown category: {other}")),
        }
    }
}

/// Category-specific listing payload. Tagged by `category` on the wire so a
/// listing body reads as one flat JSON object with the variant's own fields.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "category", rename_all = "snake_case")]
pub enum ListingDetails {
    Vehicle(VehicleDetails),
    Property(PropertyDetails),
}

impl ListingDetails {
    pub fn category(&self) -> Category {
        match self {
            ListingDetails::Vehicle(_) => Category::Vehicle,
            ListingDetails::Property(_) => Category::Property,
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct VehicleDetails {
    pub brand: Option<String>,
    pub model: Option<String>,
    pub year: Option<i32>,
    pub mileage: Option<i64>,
    pub fuel_type: Option<String>,
    pub transmission: Option<String>,
    pub vehicle_type: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PropertyDetails {
    pub surface_m2: Option<i64>,
    pub rooms: Option<i64>,
    pub floor: Option<i64>,
    pub total_floors: Option<i64>,
    pub handicap_access: Option<bool>,
    pub has_garden: Option<bool>,
    pub property_type: Option<String>,
}

/// Moderation state of a listing. Every listing starts out `pending`;
/// a repost or a non-admin edit sends it back to `pending` for re-review.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ListingStatus {
    Pending,
    Approved,
    Rejected,
}

impl ListingStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            ListingStatus::Pending => "pending",
            ListingStatus::Approved => "approved",
            ListingStatus::Rejected => "rejected",
        }
    }
}

impl fmt::Display for ListingStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ListingStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pending" => Ok(ListingStatus::Pending),
            "approved" => Ok(ListingStatus::Approved),
            "rejected" => Ok(ListingStatus::Rejected),
            other => Err(format!("unknown listing status: {other}")),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn details_tagged_by_category() {
        let json = r#"{"category":"vehicle","brand":"Peugeot","year":2019}"#;
        let details: ListingDetails = serde_json::from_str(json).unwrap();
        assert_eq!(details.category(), Category::Vehicle);
        match details {
            ListingDetails::Vehicle(v) => {
                assert_eq!(v.brand.as_deref(), Some("Peugeot"));
                assert_eq!(v.year, Some(2019));
                assert!(v.mileage.is_none());
            }
            _ => panic!("expected vehicle details"),
        }
    }

    #[test]
    fn property_fields_rejected_on_unknown_category() {
        let json = r#"{"category":"boat","length_m":12}"#;
        assert!(serde_json::from_str::<ListingDetails>(json).is_err());
    }

    #[test]
    fn status_round_trips_through_str() {
        for status in [
            ListingStatus::Pending,
            ListingStatus::Approved,
            ListingStatus::Rejected,
        ] {
            assert_eq!(status.as_str().parse::<ListingStatus>().unwrap(), status);
        }
    }
}
