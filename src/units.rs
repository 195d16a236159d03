//! Unit Conversion Utilities
//!
//! BTC amounts are handled as decimal strings so no value ever passes
//! through a float.

/// Satoshis per Bitcoin
pub const SATS_PER_BTC: u64 = 100_000_000;

/// Decimal places of one satoshi
pub const BTC_DECIMALS: usize = 8;

/// Convert a decimal BTC string to satoshis
///
/// Digits past the eighth decimal are truncated.
pub fn btc_to_sats(btc: &str) -> Result<u64, UnitsError> {
    let s = btc.trim();
    if s.starts_with('-') {
        return Err(UnitsError::Negative(s.to_string()));
    }

    let (whole, fraction) = s.split_once('.').unwrap_or((s, ""));
    if whole.is_empty() && fraction.is_empty() {
        return Err(UnitsError::InvalidAmount(s.to_string()));
    }
    let all_digits = |part: &str| part.chars().all(|c| c.is_ascii_digit());
    if !all_digits(whole) || !all_digits(fraction) {
        return Err(UnitsError::InvalidAmount(s.to_string()));
    }

    let whole: u64 = if whole.is_empty() {
        0
    } else {
        whole
            .parse()
            .map_err(|_| UnitsError::Overflow(s.to_string()))?
    };

    let mut fraction_digits: String = fraction.chars().take(BTC_DECIMALS).collect();
    while fraction_digits.len() < BTC_DECIMALS {
        fraction_digits.push('0');
    }
    let fraction: u64 = fraction_digits
        .parse()
        .map_err(|_| UnitsError::InvalidAmount(s.to_string()))?;

    whole
        .checked_mul(SATS_PER_BTC)
        .and_then(|sats| sats.checked_add(fraction))
        .ok_or_else(|| UnitsError::Overflow(s.to_string()))
}

/// Convert satoshis to BTC string (e.g., "0.00100000")
pub fn sats_to_btc_string(sats: u64) -> String {
    format!("{}.{:08}", sats / SATS_PER_BTC, sats % SATS_PER_BTC)
}

/// Convert satoshis to human-readable string
/// e.g., 100000 -> "100,000 sats (0.00100000 BTC)"
pub fn sats_to_display(sats: u64) -> String {
    format!("{} sats ({} BTC)", format_with_commas(sats), sats_to_btc_string(sats))
}

fn format_with_commas(n: u64) -> String {
    let digits = n.to_string();
    let mut result = String::with_capacity(digits.len() + digits.len() / 3);

    for (i, c) in digits.chars().enumerate() {
        if i > 0 && (digits.len() - i) % 3 == 0 {
            result.push(',');
        }
        result.push(c);
    }

    result
}

/// Parse satoshi amount from string, allowing `,` and `_` separators
pub fn parse_sats(s: &str) -> Result<u64, UnitsError> {
    s.trim()
        .replace([',', '_'], "")
        .parse()
        .map_err(|_| UnitsError::InvalidAmount(s.to_string()))
}

#[derive(Debug, thiserror::Error)]
pub enum UnitsError {
    #[error("invalid amount: {0}")]
    InvalidAmount(String),

    #[error("amount must be non-negative: {0}")]
    Negative(String),

    #[error("amount overflows u64 satoshis: {0}")]
    Overflow(String),
}
