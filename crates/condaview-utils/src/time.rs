use std::time::Duration;

use crate::error::{DurationError, DurationResult};

/// Parses a duration string such as `15m`, `1h` or `1d2h30m10s`.
///
/// Every component is `<digits><unit>` where the unit is one of `s`, `m`, `h`
/// or `d`. Components are summed, so `1h30m` is ninety minutes.
///
/// # Errors
///
/// * [`DurationError::Invalid`] if the string is empty, a component has no
///   digits, or a unit is missing or unknown.
/// * [`DurationError::Overflow`] if the total does not fit in a `u64` of
///   seconds.
///
/// # Examples
///
/// ```
/// use std::time::Duration;
/// use condaview_utils::time::parse_duration;
///
/// assert_eq!(parse_duration("15m").unwrap(), Duration::from_secs(900));
/// ```
pub fn parse_duration(input: &str) -> DurationResult<Duration> {
    let invalid = || DurationError::Invalid(input.to_string());
    let overflow = || DurationError::Overflow(input.to_string());

    let input_trimmed = input.trim();
    if input_trimmed.is_empty() {
        return Err(invalid());
    }

    let mut total: u64 = 0;
    let mut chars = input_trimmed.chars().peekable();

    while chars.peek().is_some() {
        let mut number_str = String::new();
        while let Some(c) = chars.peek() {
            if c.is_ascii_digit() {
                number_str.push(*c);
                chars.next();
            } else {
                break;
            }
        }

        if number_str.is_empty() {
            return Err(invalid());
        }

        let number: u64 = number_str.parse().map_err(|_| overflow())?;
        let multiplier = match chars.next().ok_or_else(invalid)? {
            's' => 1,
            'm' => 60,
            'h' => 60 * 60,
            'd' => 24 * 60 * 60,
            _ => return Err(invalid()),
        };

        let secs = number.checked_mul(multiplier).ok_or_else(overflow)?;
        total = total.checked_add(secs).ok_or_else(overflow)?;
    }

    Ok(Duration::from_secs(total))
}
