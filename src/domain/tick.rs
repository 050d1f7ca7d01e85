//! OHLCV tick bar, the atom of a scenario's price sequence.

use serde::{Deserialize, Serialize};

/// One price bar of the deterministic scenario sequence.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Tick {
    /// Bar timestamp, milliseconds since Unix epoch.
    pub ts: i64,
    pub open: f64,
    pub high: f64,
    pub low: f64,
    pub close: f64,
    pub volume: f64,
}

impl Tick {
    pub fn new(ts: i64, open: f64, high: f64, low: f64, close: f64, volume: f64) -> Self {
        Tick {
            ts,
            open,
            high,
            low,
            close,
            volume,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_tick_json_field_names() {
        let tick = Tick::new(1000, 1.0, 2.0, 0.5, 1.5, 100.0);
        let json = serde_json::to_value(&tick).unwrap();
        assert_eq!(json["ts"], 1000);
        assert_eq!(json["close"], 1.5);
        assert_eq!(json["volume"], 100.0);
    }

    #[test]
    fn test_tick_round_trip() {
        let tick = Tick::new(42, 10.0, 12.0, 9.0, 11.0, 3.5);
        let json = serde_json::to_string(&tick).unwrap();
        let back: Tick = serde_json::from_str(&json).unwrap();
        assert_eq!(back, tick);
    }
}
