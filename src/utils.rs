use chrono::{Local, NaiveDate};
use rand::Rng;

pub const MONTH_NAMES: [&str; 12] = [
    "January",
    "February",
    "March",
    "April",
    "May",
    "June",
    "July",
    "August",
    "September",
    "October",
    "November",
    "December",
];

/// Full English month name for a 1-based month number.
pub fn month_name(month: u32) -> &'static str {
    MONTH_NAMES
        .get((month as usize).wrapping_sub(1))
        .copied()
        .unwrap_or("Unknown")
}

/// Three letter label used by the monthly report rows ("Jan", "Feb", ...).
pub fn short_month_name(month: u32) -> &'static str {
    let name = month_name(month);
    name.get(..3).unwrap_or(name)
}

pub fn today() -> NaiveDate {
    Local::now().date_naive()
}

/// Cosmetic receipt code, `RC` plus three random digits. Collides often and
/// must never be used as a lookup key.
pub fn generate_receipt_number() -> String {
    let code: u32 = rand::thread_rng().gen_range(0..1000);
    format!("RC{:03}", code)
}

/// Integer percentage of `part` over `whole`, rounded half up. Zero when
/// `whole` is zero.
pub fn percent(part: usize, whole: usize) -> u32 {
    if whole == 0 {
        return 0;
    }
    let part = part.min(whole) as u64;
    let whole = whole as u64;
    ((part * 200 + whole) / (whole * 2)) as u32
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn month_names_are_one_based() {
        assert_eq!(month_name(1), "January");
        assert_eq!(month_name(12), "December");
        assert_eq!(month_name(0), "Unknown");
        assert_eq!(month_name(13), "Unknown");
        assert_eq!(short_month_name(3), "Mar");
    }

    #[test]
    fn receipt_numbers_have_fixed_shape() {
        for _ in 0..50 {
            let receipt = generate_receipt_number();
            assert_eq!(receipt.len(), 5);
            assert!(receipt.starts_with("RC"));
            assert!(receipt[2..].chars().all(|c| c.is_ascii_digit()));
        }
    }

    #[test]
    fn percent_rounds_half_up() {
        assert_eq!(percent(0, 0), 0);
        assert_eq!(percent(1, 3), 33);
        assert_eq!(percent(2, 3), 67);
        assert_eq!(percent(1, 8), 13);
        assert_eq!(percent(1, 200), 1);
        assert_eq!(percent(5, 5), 100);
    }

    #[test]
    fn percent_stays_in_range() {
        for whole in 0..40 {
            for part in 0..=whole {
                assert!(percent(part, whole) <= 100);
            }
        }
    }
}
