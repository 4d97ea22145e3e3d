//! Centralized stat formatting utilities.
//!
//! All numeric display formatting goes through this module so the overlay
//! rows and any future renderers agree on how a stat reads.

/// Format a star level for display, keeping one decimal.
///
/// # Examples
/// ```
/// use spyglass_types::formatting::format_stars;
/// assert_eq!(format_stars(483.2), "483.2");
/// assert_eq!(format_stars(0.0), "0.0");
/// ```
pub fn format_stars(stars: f64) -> String {
    format!("{stars:.1}")
}

/// Format a ratio stat (FKDR, WLR) with two decimals.
///
/// Ratios of 100 or more are rendered without decimals; at that magnitude
/// the fraction carries no information.
///
/// # Examples
/// ```
/// use spyglass_types::formatting::format_ratio;
/// assert_eq!(format_ratio(1.0), "1.00");
/// assert_eq!(format_ratio(12.345), "12.35");
/// assert_eq!(format_ratio(250.0), "250");
/// ```
pub fn format_ratio(ratio: f64) -> String {
    if ratio >= 100.0 {
        format!("{ratio:.0}")
    } else {
        format!("{ratio:.2}")
    }
}

/// Format a winstreak.
///
/// `None` renders as `-` (the API withheld the value). Estimated values
/// are prefixed with `~` so they are never mistaken for exact ones.
///
/// # Examples
/// ```
/// use spyglass_types::formatting::format_winstreak;
/// assert_eq!(format_winstreak(Some(7), true), "7");
/// assert_eq!(format_winstreak(Some(7), false), "~7");
/// assert_eq!(format_winstreak(None, false), "-");
/// ```
pub fn format_winstreak(winstreak: Option<i64>, accurate: bool) -> String {
    match winstreak {
        Some(ws) if accurate => ws.to_string(),
        Some(ws) => format!("~{ws}"),
        None => "-".to_string(),
    }
}

/// Placeholder cell for players whose stats are hidden or still loading.
pub fn hidden_cell() -> String {
    "-".to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ratio_switches_to_whole_numbers_at_100() {
        assert_eq!(format_ratio(99.994), "99.99");
        assert_eq!(format_ratio(100.0), "100");
    }

    #[test]
    fn inaccurate_winstreak_is_marked() {
        assert_eq!(format_winstreak(Some(0), false), "~0");
    }
}
