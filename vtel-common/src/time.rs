//! Timestamp utilities

use chrono::Local;

/// Local wall-clock time formatted as `HH:MM:SS`
///
/// Used as the x-value of last resort when an upstream record carries neither
/// a timestamp nor a frame number.
pub fn wall_clock_label() -> String {
    Local::now().format("%H:%M:%S").to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_wall_clock_label_shape() {
        let label = wall_clock_label();
        assert_eq!(label.len(), 8);
        assert_eq!(label.matches(':').count(), 2);
    }
}
