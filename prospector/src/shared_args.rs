use clap::Args;
use spectra::evaluator::{MAX_SENSITIVITY, MIN_SENSITIVITY};
use std::path::PathBuf;
use std::time::Duration;

/// Parse duration string with units (e.g., "1.5s", "500ms", "2m")
pub fn parse_duration(s: &str) -> Result<Duration, String> {
    let s = s.trim();

    let (num_str, unit) = if let Some(n) = s.strip_suffix("ms") {
        (n, "ms")
    } else if let Some(n) = s.strip_suffix('s') {
        (n, "s")
    } else if let Some(n) = s.strip_suffix('m') {
        (n, "m")
    } else {
        // Default to seconds if no unit specified
        (s, "s")
    };

    let value: f64 = num_str
        .trim()
        .parse()
        .map_err(|_| format!("Invalid numeric value: {num_str}"))?;

    if !value.is_finite() || value <= 0.0 {
        return Err("Duration must be positive".to_string());
    }

    Ok(match unit {
        "ms" => Duration::from_secs_f64(value / 1000.0),
        "m" => Duration::from_secs_f64(value * 60.0),
        _ => Duration::from_secs_f64(value),
    })
}

/// Wrapper for Duration that implements Clone and has a nice Display
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DurationArg(pub Duration);

impl std::str::FromStr for DurationArg {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        parse_duration(s).map(DurationArg)
    }
}

impl std::fmt::Display for DurationArg {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let total_ms = self.0.as_millis();
        if total_ms >= 1000 && total_ms % 1000 == 0 {
            write!(f, "{}s", total_ms / 1000)
        } else if total_ms >= 1000 {
            write!(f, "{:.3}s", self.0.as_secs_f64())
        } else {
            write!(f, "{total_ms}ms")
        }
    }
}

/// Parse a sensitivity and check it lies in the accepted range
pub fn parse_sensitivity(s: &str) -> Result<f64, String> {
    let value: f64 = s
        .trim()
        .parse()
        .map_err(|_| format!("Invalid sensitivity: {s}"))?;
    if !(MIN_SENSITIVITY..=MAX_SENSITIVITY).contains(&value) {
        return Err(format!(
            "Sensitivity must be between {MIN_SENSITIVITY} and {MAX_SENSITIVITY}"
        ));
    }
    Ok(value)
}

/// Settings shared by the tools that read stored configuration.
#[derive(Args, Debug, Clone)]
pub struct ConfigArgs {
    /// Scan configuration JSON (defaults to the stored configuration, then built-in defaults)
    #[arg(long)]
    pub config: Option<PathBuf>,

    /// Override the sampling seed
    #[arg(long)]
    pub seed: Option<u64>,

    /// Override the geocoder timeout (e.g. "10s", "500ms")
    #[arg(long)]
    pub timeout: Option<DurationArg>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_duration_units() {
        assert_eq!(parse_duration("10s").unwrap(), Duration::from_secs(10));
        assert_eq!(parse_duration("500ms").unwrap(), Duration::from_millis(500));
        assert_eq!(parse_duration("2m").unwrap(), Duration::from_secs(120));
        assert_eq!(parse_duration("1.5").unwrap(), Duration::from_millis(1500));
        assert!(parse_duration("-1s").is_err());
        assert!(parse_duration("0s").is_err());
        assert!(parse_duration("soon").is_err());
    }

    #[test]
    fn test_duration_display() {
        assert_eq!(DurationArg(Duration::from_secs(10)).to_string(), "10s");
        assert_eq!(DurationArg(Duration::from_millis(1500)).to_string(), "1.500s");
        assert_eq!(DurationArg(Duration::from_millis(250)).to_string(), "250ms");
    }

    #[test]
    fn test_parse_sensitivity_bounds() {
        assert_eq!(parse_sensitivity("1.21").unwrap(), 1.21);
        assert_eq!(parse_sensitivity("0.01").unwrap(), 0.01);
        assert_eq!(parse_sensitivity("4.0").unwrap(), 4.0);
        assert!(parse_sensitivity("4.5").is_err());
        assert!(parse_sensitivity("0").is_err());
        assert!(parse_sensitivity("high").is_err());
    }
}
