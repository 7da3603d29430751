use chrono::{DateTime, NaiveDate, NaiveTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

use crate::pii::Masked;

/// The unit of capacity accounting: one temple, one date, one slot start.
/// Derived from temple configuration, never stored as an entity of its own.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SlotKey {
    pub temple_id: Uuid,
    pub date: NaiveDate,
    pub start: NaiveTime,
}

impl SlotKey {
    pub fn new(temple_id: Uuid, date: NaiveDate, start: NaiveTime) -> Self {
        Self {
            temple_id,
            date,
            start,
        }
    }
}

impl fmt::Display for SlotKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}:{}", self.temple_id, self.date, self.start)
    }
}

/// Priority access categories offered on the booking form. Recorded on the
/// pilgrim and the booking; allocation itself stays first-committer-wins.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PriorityCategory {
    None,
    Elderly,
    DifferentlyAbled,
    WomenWithChildren,
}

impl Default for PriorityCategory {
    fn default() -> Self {
        PriorityCategory::None
    }
}

impl PriorityCategory {
    pub fn as_str(&self) -> &'static str {
        match self {
            PriorityCategory::None => "none",
            PriorityCategory::Elderly => "elderly",
            PriorityCategory::DifferentlyAbled => "differently_abled",
            PriorityCategory::WomenWithChildren => "women_with_children",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "none" => Some(PriorityCategory::None),
            "elderly" => Some(PriorityCategory::Elderly),
            "differently_abled" => Some(PriorityCategory::DifferentlyAbled),
            "women_with_children" => Some(PriorityCategory::WomenWithChildren),
            _ => None,
        }
    }
}

/// Government ID types accepted at registration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum IdType {
    Aadhaar,
    Passport,
    VoterId,
    DrivingLicense,
}

impl IdType {
    pub fn as_str(&self) -> &'static str {
        match self {
            IdType::Aadhaar => "aadhaar",
            IdType::Passport => "passport",
            IdType::VoterId => "voter_id",
            IdType::DrivingLicense => "driving_license",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "aadhaar" => Some(IdType::Aadhaar),
            "passport" => Some(IdType::Passport),
            "voter_id" => Some(IdType::VoterId),
            "driving_license" => Some(IdType::DrivingLicense),
            _ => None,
        }
    }
}

/// A registered pilgrim. Bookings hold the pilgrim id plus a denormalized
/// display name, never a copy of the record.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Pilgrim {
    pub id: Uuid,
    pub full_name: String,
    pub phone: Masked<String>,
    pub email: Option<String>,
    pub id_type: IdType,
    pub id_number: Masked<String>,
    pub age: Option<i32>,
    pub gender: Option<String>,
    pub priority_category: PriorityCategory,
    pub emergency_contact_name: Option<String>,
    pub emergency_contact_phone: Option<Masked<String>>,
    pub created_at: DateTime<Utc>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn slot_key_equality_and_hash() {
        use std::collections::HashMap;

        let temple = Uuid::new_v4();
        let date = NaiveDate::from_ymd_opt(2026, 8, 10).unwrap();
        let start = NaiveTime::from_hms_opt(6, 0, 0).unwrap();

        let a = SlotKey::new(temple, date, start);
        let b = SlotKey::new(temple, date, start);
        assert_eq!(a, b);

        let mut map = HashMap::new();
        map.insert(a, 1u32);
        assert_eq!(map.get(&b), Some(&1));
    }

    #[test]
    fn priority_category_round_trip() {
        for cat in [
            PriorityCategory::None,
            PriorityCategory::Elderly,
            PriorityCategory::DifferentlyAbled,
            PriorityCategory::WomenWithChildren,
        ] {
            assert_eq!(PriorityCategory::parse(cat.as_str()), Some(cat));
        }
        assert_eq!(PriorityCategory::parse("vip"), None);
    }

    #[test]
    fn pilgrim_debug_masks_contact_fields() {
        let pilgrim = Pilgrim {
            id: Uuid::new_v4(),
            full_name: "Asha Sharma".to_string(),
            phone: Masked("+91 98765 43210".to_string()),
            email: None,
            id_type: IdType::Aadhaar,
            id_number: Masked("1234-5678-9012".to_string()),
            age: Some(64),
            gender: Some("female".to_string()),
            priority_category: PriorityCategory::Elderly,
            emergency_contact_name: None,
            emergency_contact_phone: None,
            created_at: Utc::now(),
        };

        let debug = format!("{:?}", pilgrim);
        assert!(!debug.contains("98765"));
        assert!(!debug.contains("1234-5678"));
    }
}
