use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DurationParseError {
    #[error("Unknown duration format: {0}. Use s, m, h, or d (e.g. 30m, 2h)")]
    Malformed(String),
    #[error("Duration too large: {0}")]
    Overflow(String),
}

/// Parses `<integer><unit>` with unit one of `s`, `m`, `h`, `d` into seconds.
pub fn parse_duration(input: &str) -> Result<i64, DurationParseError> {
    let trimmed = input.trim();
    let malformed = || DurationParseError::Malformed(trimmed.to_owned());

    let unit = trimmed.chars().last().ok_or_else(malformed)?;
    let multiplier: i64 = match unit {
        's' => 1,
        'm' => 60,
        'h' => 3600,
        'd' => 86_400,
        _ => return Err(malformed()),
    };

    let amount: i64 = trimmed[..trimmed.len() - unit.len_utf8()]
        .parse()
        .map_err(|_| malformed())?;
    amount
        .checked_mul(multiplier)
        .filter(|seconds| chrono::Duration::try_seconds(*seconds).is_some())
        .ok_or_else(|| DurationParseError::Overflow(trimmed.to_owned()))
}
