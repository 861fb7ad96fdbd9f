//! Element datatypes and conversion of raw samples into base units.

use std::fmt;

use crate::pcf::constants::{
    MQIAMO_MONITOR_DELTA, MQIAMO_MONITOR_GB, MQIAMO_MONITOR_HUNDREDTHS, MQIAMO_MONITOR_KB,
    MQIAMO_MONITOR_MB, MQIAMO_MONITOR_MICROSEC, MQIAMO_MONITOR_PERCENT, MQIAMO_MONITOR_UNIT,
};

const MEGABYTE: f64 = 1024.0 * 1024.0;
const GIGABYTE: f64 = 1024.0 * 1024.0 * 1024.0;
const MICROS_PER_SECOND: f64 = 1_000_000.0;

/// Declared datatype of a monitor element.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Datatype {
    Unit,
    /// Interval increment; successive samples are summed.
    Delta,
    Hundredths,
    Kb,
    Percent,
    Microsec,
    Mb,
    Gb,
    Other(i32),
}

impl Datatype {
    pub fn from_raw(raw: i32) -> Self {
        match raw {
            MQIAMO_MONITOR_UNIT => Datatype::Unit,
            MQIAMO_MONITOR_DELTA => Datatype::Delta,
            MQIAMO_MONITOR_HUNDREDTHS => Datatype::Hundredths,
            MQIAMO_MONITOR_KB => Datatype::Kb,
            MQIAMO_MONITOR_PERCENT => Datatype::Percent,
            MQIAMO_MONITOR_MICROSEC => Datatype::Microsec,
            MQIAMO_MONITOR_MB => Datatype::Mb,
            MQIAMO_MONITOR_GB => Datatype::Gb,
            other => Datatype::Other(other),
        }
    }

    pub fn as_raw(self) -> i32 {
        match self {
            Datatype::Unit => MQIAMO_MONITOR_UNIT,
            Datatype::Delta => MQIAMO_MONITOR_DELTA,
            Datatype::Hundredths => MQIAMO_MONITOR_HUNDREDTHS,
            Datatype::Kb => MQIAMO_MONITOR_KB,
            Datatype::Percent => MQIAMO_MONITOR_PERCENT,
            Datatype::Microsec => MQIAMO_MONITOR_MICROSEC,
            Datatype::Mb => MQIAMO_MONITOR_MB,
            Datatype::Gb => MQIAMO_MONITOR_GB,
            Datatype::Other(raw) => raw,
        }
    }

    pub fn is_delta(self) -> bool {
        self == Datatype::Delta
    }
}

impl fmt::Display for Datatype {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Datatype::Unit => write!(f, "unit"),
            Datatype::Delta => write!(f, "delta"),
            Datatype::Hundredths => write!(f, "hundredths"),
            Datatype::Kb => write!(f, "kb"),
            Datatype::Percent => write!(f, "percent"),
            Datatype::Microsec => write!(f, "microsec"),
            Datatype::Mb => write!(f, "mb"),
            Datatype::Gb => write!(f, "gb"),
            Datatype::Other(raw) => write!(f, "{}", raw),
        }
    }
}

/// Converts a raw sample into base units (bytes, seconds, fractions).
///
/// Negative samples come from overflowed or uninitialised server counters
/// and are reported as zero.
pub fn normalise(datatype: Datatype, raw: i64) -> f64 {
    let value = (raw as f64).max(0.0);

    match datatype {
        Datatype::Percent | Datatype::Hundredths => value / 100.0,
        Datatype::Mb => value * MEGABYTE,
        Datatype::Gb => value * GIGABYTE,
        Datatype::Microsec => value / MICROS_PER_SECOND,
        _ => value,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn negative_samples_clamp_to_zero() {
        for dt in [Datatype::Unit, Datatype::Delta, Datatype::Mb, Datatype::Percent] {
            assert_eq!(normalise(dt, -1), 0.0);
            assert_eq!(normalise(dt, i64::MIN), 0.0);
        }
    }

    #[test]
    fn scales_by_datatype() {
        assert_eq!(normalise(Datatype::Mb, 3), 3.0 * 1_048_576.0);
        assert_eq!(normalise(Datatype::Gb, 2), 2.0 * 1_073_741_824.0);
        assert_eq!(normalise(Datatype::Percent, 4550), 45.5);
        assert_eq!(normalise(Datatype::Hundredths, 250), 2.5);
        assert_eq!(normalise(Datatype::Microsec, 1_500_000), 1.5);
    }

    #[test]
    fn other_datatypes_pass_through() {
        assert_eq!(normalise(Datatype::Unit, 17), 17.0);
        assert_eq!(normalise(Datatype::Delta, 17), 17.0);
        assert_eq!(normalise(Datatype::Kb, 17), 17.0);
        assert_eq!(normalise(Datatype::Other(7), 17), 17.0);
    }

    #[test]
    fn raw_codes_round_trip() {
        for raw in [1, 2, 100, 1024, 10000, 1_000_000, 1_048_576, 100_000_000, 5] {
            assert_eq!(Datatype::from_raw(raw).as_raw(), raw);
        }
        assert!(Datatype::from_raw(2).is_delta());
    }
}
