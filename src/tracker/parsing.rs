/// Parses `"145.990 MHz"`, `"437.8MHz"`, `"10 kHz"` or a bare number of Hz.
pub fn parse_frequency_hz(text: &str) -> Option<f64> {
    let text = text.trim();
    let split = text
        .find(|c: char| c.is_ascii_alphabetic())
        .unwrap_or(text.len());
    let (number, unit) = text.split_at(split);
    let value: f64 = number.trim().parse().ok()?;

    let scale = match unit.trim().to_ascii_lowercase().as_str() {
        "" | "hz" => 1.0,
        "khz" => 1e3,
        "mhz" => 1e6,
        "ghz" => 1e9,
        _ => return None,
    };

    let hz = (value * scale).round();
    (hz.is_finite() && hz > 0.0).then_some(hz)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_units() {
        assert_eq!(parse_frequency_hz("145.990 MHz"), Some(145_990_000.0));
        assert_eq!(parse_frequency_hz("437.8MHz"), Some(437_800_000.0));
        assert_eq!(parse_frequency_hz("1.2 GHz"), Some(1_200_000_000.0));
        assert_eq!(parse_frequency_hz("10 kHz"), Some(10_000.0));
        assert_eq!(parse_frequency_hz("144000000"), Some(144_000_000.0));
    }

    #[test]
    fn rejects_garbage() {
        assert_eq!(parse_frequency_hz("fast"), None);
        assert_eq!(parse_frequency_hz("145 furlongs"), None);
        assert_eq!(parse_frequency_hz("-3 MHz"), None);
        assert_eq!(parse_frequency_hz(""), None);
    }
}
