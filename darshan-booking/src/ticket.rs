use chrono::NaiveDate;
use rand::{distributions::Alphanumeric, Rng};

/// Generate a ticket number: date prefix for coarse time ordering, random
/// alphanumeric suffix for uniqueness. The bookings table carries a unique
/// constraint as the final arbiter; on a collision the caller regenerates.
pub fn ticket_number(date: NaiveDate) -> String {
    let suffix: String = rand::thread_rng()
        .sample_iter(&Alphanumeric)
        .take(6)
        .map(char::from)
        .collect::<String>()
        .to_uppercase();
    format!("TKT-{}-{}", date.format("%Y%m%d"), suffix)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ticket_number_format() {
        let date = NaiveDate::from_ymd_opt(2026, 8, 10).unwrap();
        let ticket = ticket_number(date);
        assert!(ticket.starts_with("TKT-20260810-"));
        assert_eq!(ticket.len(), "TKT-20260810-".len() + 6);
        assert!(ticket
            .rsplit('-')
            .next()
            .unwrap()
            .chars()
            .all(|c| c.is_ascii_alphanumeric() && !c.is_ascii_lowercase()));
    }

    #[test]
    fn same_day_tickets_differ() {
        let date = NaiveDate::from_ymd_opt(2026, 8, 10).unwrap();
        let a = ticket_number(date);
        let b = ticket_number(date);
        // Not a uniqueness proof, just a sanity check that the suffix is
        // actually random.
        assert_ne!(a, b);
    }

    #[test]
    fn tickets_sort_by_date_prefix() {
        let earlier = ticket_number(NaiveDate::from_ymd_opt(2026, 8, 9).unwrap());
        let later = ticket_number(NaiveDate::from_ymd_opt(2026, 8, 10).unwrap());
        assert!(earlier[..13] < later[..13]);
    }
}
