use chrono::{Duration, NaiveTime};
use serde::{Deserialize, Serialize};

use crate::temple::Temple;

/// One bookable window derived from temple configuration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SlotDescriptor {
    pub start: NaiveTime,
    pub end: NaiveTime,
    pub capacity: u32,
}

#[derive(Debug, thiserror::Error)]
pub enum CatalogError {
    #[error("Invalid temple schedule: {reason}")]
    InvalidSchedule { reason: String },
}

/// Derive the ordered slot sequence for one day of a temple's schedule.
///
/// Pure function of the configuration. Degenerate configuration (closing at
/// or before opening, zero duration, duration longer than the open window)
/// is a configuration error, never an empty success.
pub fn daily_slots(temple: &Temple) -> Result<Vec<SlotDescriptor>, CatalogError> {
    if temple.closing_time <= temple.opening_time {
        return Err(CatalogError::InvalidSchedule {
            reason: format!(
                "closing time {} is not after opening time {}",
                temple.closing_time, temple.opening_time
            ),
        });
    }

    if temple.slot_duration_minutes == 0 {
        return Err(CatalogError::InvalidSchedule {
            reason: "slot duration must be at least one minute".to_string(),
        });
    }

    let window = temple.closing_time - temple.opening_time;
    let duration = Duration::minutes(temple.slot_duration_minutes as i64);
    if duration > window {
        return Err(CatalogError::InvalidSchedule {
            reason: format!(
                "slot duration {}m does not fit the open window of {}m",
                temple.slot_duration_minutes,
                window.num_minutes()
            ),
        });
    }

    let mut slots = Vec::new();
    let mut start = temple.opening_time;
    // Slots are back to back; a trailing remainder shorter than one slot is
    // not bookable. NaiveTime addition wraps at midnight, so the wrapped
    // seconds must be checked explicitly.
    loop {
        let (end, wrapped) = start.overflowing_add_signed(duration);
        if wrapped != 0 || end > temple.closing_time {
            break;
        }
        slots.push(SlotDescriptor {
            start,
            end,
            capacity: temple.slot_capacity,
        });
        start = end;
    }

    Ok(slots)
}

/// Find the slot starting at the given time, if the temple is open then.
pub fn slot_at(temple: &Temple, start: NaiveTime) -> Result<Option<SlotDescriptor>, CatalogError> {
    Ok(daily_slots(temple)?.into_iter().find(|s| s.start == start))
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use uuid::Uuid;

    fn temple(opening: (u32, u32), closing: (u32, u32), duration: u32, capacity: u32) -> Temple {
        let now = Utc::now();
        Temple {
            id: Uuid::new_v4(),
            name: "Shri Kashi Vishwanath".to_string(),
            city: "Varanasi".to_string(),
            state: "Uttar Pradesh".to_string(),
            opening_time: NaiveTime::from_hms_opt(opening.0, opening.1, 0).unwrap(),
            closing_time: NaiveTime::from_hms_opt(closing.0, closing.1, 0).unwrap(),
            slot_duration_minutes: duration,
            slot_capacity: capacity,
            is_active: true,
            created_at: now,
            updated_at: now,
        }
    }

    #[test]
    fn hourly_slots_cover_the_open_window() {
        let slots = daily_slots(&temple((4, 0), (23, 0), 60, 500)).unwrap();
        assert_eq!(slots.len(), 19);
        assert_eq!(slots[0].start, NaiveTime::from_hms_opt(4, 0, 0).unwrap());
        assert_eq!(slots[0].end, NaiveTime::from_hms_opt(5, 0, 0).unwrap());
        assert_eq!(
            slots.last().unwrap().end,
            NaiveTime::from_hms_opt(23, 0, 0).unwrap()
        );
        assert!(slots.iter().all(|s| s.capacity == 500));
    }

    #[test]
    fn trailing_remainder_is_not_bookable() {
        // 05:30-21:00 with 45-minute slots: 20 full slots, 30 minutes left over.
        let slots = daily_slots(&temple((5, 30), (21, 0), 45, 300)).unwrap();
        assert_eq!(slots.len(), 20);
        assert_eq!(
            slots.last().unwrap().end,
            NaiveTime::from_hms_opt(20, 30, 0).unwrap()
        );
    }

    #[test]
    fn slots_are_ordered_and_contiguous() {
        let slots = daily_slots(&temple((6, 0), (12, 0), 30, 100)).unwrap();
        for pair in slots.windows(2) {
            assert_eq!(pair[0].end, pair[1].start);
            assert!(pair[0].start < pair[1].start);
        }
    }

    #[test]
    fn closing_before_opening_is_a_configuration_error() {
        let err = daily_slots(&temple((20, 0), (6, 0), 60, 100)).unwrap_err();
        assert!(matches!(err, CatalogError::InvalidSchedule { .. }));
    }

    #[test]
    fn zero_duration_is_a_configuration_error() {
        let err = daily_slots(&temple((6, 0), (20, 0), 0, 100)).unwrap_err();
        assert!(matches!(err, CatalogError::InvalidSchedule { .. }));
    }

    #[test]
    fn oversized_duration_is_a_configuration_error() {
        let err = daily_slots(&temple((6, 0), (8, 0), 180, 100)).unwrap_err();
        assert!(matches!(err, CatalogError::InvalidSchedule { .. }));
    }

    #[test]
    fn slot_at_finds_exact_starts_only() {
        let t = temple((6, 0), (20, 0), 60, 100);
        let hit = slot_at(&t, NaiveTime::from_hms_opt(9, 0, 0).unwrap()).unwrap();
        assert!(hit.is_some());

        let miss = slot_at(&t, NaiveTime::from_hms_opt(9, 30, 0).unwrap()).unwrap();
        assert!(miss.is_none());

        let after_close = slot_at(&t, NaiveTime::from_hms_opt(21, 0, 0).unwrap()).unwrap();
        assert!(after_close.is_none());
    }
}
