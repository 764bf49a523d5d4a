//! Snapshot delivery rate

use std::fmt;
use std::str::FromStr;
use std::time::Duration;

use serde::{Deserialize, Serialize};

/// How often a consumer wants snapshots.
///
/// The live feed pushes at no fixed rate, so a cap is always honoured as
/// given. Throttled consumers receive the latest snapshot of each period.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "tauri", derive(specta::Type))]
pub enum UpdateRate {
    /// One snapshot per dispatched frame
    #[default]
    Native,

    /// At most this many snapshots per second; `Max(0)` means `Native`
    Max(u32),

    /// At most one snapshot per this many milliseconds; `0` means `Native`
    EveryMillis(u64),
}

impl UpdateRate {
    /// Throttle period, or `None` when every snapshot is delivered.
    pub fn throttle_interval(self) -> Option<Duration> {
        match self {
            UpdateRate::Native | UpdateRate::Max(0) | UpdateRate::EveryMillis(0) => None,
            UpdateRate::Max(hz) => Some(Duration::from_secs_f64(1.0 / f64::from(hz))),
            UpdateRate::EveryMillis(ms) => Some(Duration::from_millis(ms)),
        }
    }

    pub fn is_throttled(self) -> bool {
        self.throttle_interval().is_some()
    }
}

impl fmt::Display for UpdateRate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            UpdateRate::Native => f.write_str("native"),
            UpdateRate::Max(hz) => write!(f, "{hz}hz"),
            UpdateRate::EveryMillis(ms) => write!(f, "{ms}ms"),
        }
    }
}

/// Parses `native`, `4hz` or `250ms` (case-insensitive).
impl FromStr for UpdateRate {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let text = s.trim().to_ascii_lowercase();
        if text == "native" {
            return Ok(UpdateRate::Native);
        }
        if let Some(hz) = text.strip_suffix("hz") {
            return hz.trim().parse().map(UpdateRate::Max).map_err(|_| format!("invalid rate '{s}'"));
        }
        if let Some(ms) = text.strip_suffix("ms") {
            return ms.trim().parse().map(UpdateRate::EveryMillis).map_err(|_| format!("invalid rate '{s}'"));
        }
        Err(format!("invalid rate '{s}', expected native, <n>hz or <n>ms"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn zero_caps_mean_native() {
        assert_eq!(UpdateRate::Native.throttle_interval(), None);
        assert_eq!(UpdateRate::Max(0).throttle_interval(), None);
        assert_eq!(UpdateRate::EveryMillis(0).throttle_interval(), None);
        assert!(!UpdateRate::default().is_throttled());
    }

    #[test]
    fn caps_become_periods() {
        assert_eq!(UpdateRate::Max(4).throttle_interval(), Some(Duration::from_millis(250)));
        assert_eq!(UpdateRate::EveryMillis(100).throttle_interval(), Some(Duration::from_millis(100)));
    }

    #[test]
    fn parses_config_spellings() {
        assert_eq!("native".parse(), Ok(UpdateRate::Native));
        assert_eq!(" 10Hz ".parse(), Ok(UpdateRate::Max(10)));
        assert_eq!("250ms".parse(), Ok(UpdateRate::EveryMillis(250)));
        assert!("fast".parse::<UpdateRate>().is_err());
        assert!("-1hz".parse::<UpdateRate>().is_err());
        assert_eq!(UpdateRate::Max(4).to_string(), "4hz");
    }
}
