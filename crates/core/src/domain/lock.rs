// Lock key naming

use chrono::NaiveDate;

/// Namespace shared by every lock key
pub const LOCK_KEY_PREFIX: &str = "lock";

/// Lock key guarding "generate the daily mission for `role` on `date`"
///
/// The logical date is part of the key, so the guard resets every day.
pub fn mission_lock_key(role: &str, date: NaiveDate) -> String {
    format!(
        "{}:mission:{}:{}",
        LOCK_KEY_PREFIX,
        role.trim().to_lowercase(),
        date.format("%Y-%m-%d")
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_mission_lock_key_scoped_by_role_and_date() {
        let date = NaiveDate::from_ymd_opt(2026, 10, 19).unwrap();
        assert_eq!(
            mission_lock_key(" Explorer ", date),
            "lock:mission:explorer:2026-10-19"
        );

        let next_day = date.succ_opt().unwrap();
        assert_ne!(
            mission_lock_key("explorer", date),
            mission_lock_key("explorer", next_day)
        );
    }
}
