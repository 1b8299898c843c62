//! Typed shapes for trainer options that accept more than one kind of value.
//!
//! Each enum is `untagged` on the wire: a config file writes `precision: 16`
//! or `precision: bf16`, never a variant name.

use std::collections::BTreeMap;
use std::fmt;
use std::time::Duration;

use serde::de::{self, Deserializer, MapAccess, Unexpected, Visitor};
use serde::{Deserialize, Serialize, Serializer};
use serde_json::{Map, Value};

use trainconf_common::{ConfError, Result};

// ── Components ──────────────────────────────────────────────────────────────

/// A pluggable component (callback, profiler, strategy, ...), given either by
/// registered name or as a structured mapping such as `{_target_: ...}`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ComponentSpec {
    Name(String),
    Config(Map<String, Value>),
}

impl ComponentSpec {
    /// The component name, or the `_target_` of a mapping.
    pub fn target(&self) -> Option<&str> {
        match self {
            Self::Name(name) => Some(name.as_str()),
            Self::Config(map) => map.get("_target_").and_then(Value::as_str),
        }
    }
}

/// One component or a list of them.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Components {
    One(ComponentSpec),
    Many(Vec<ComponentSpec>),
}

impl Components {
    pub fn iter(&self) -> impl Iterator<Item = &ComponentSpec> {
        match self {
            Self::One(spec) => std::slice::from_ref(spec).iter(),
            Self::Many(specs) => specs.iter(),
        }
    }
}

/// `true`/`false` toggles the default logger; anything else configures loggers.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Logger {
    Enabled(bool),
    Component(ComponentSpec),
    Many(Vec<ComponentSpec>),
}

impl Logger {
    pub fn is_enabled(&self) -> bool {
        match self {
            Self::Enabled(on) => *on,
            Self::Component(_) => true,
            Self::Many(specs) => !specs.is_empty(),
        }
    }
}

// ── Devices ─────────────────────────────────────────────────────────────────

/// Device choice: a count (`2`, `-1` for all), explicit indices (`[0, 1]`),
/// or a string spec (`"auto"`, `"0,1"`).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum DeviceSelection {
    Count(i64),
    Indices(Vec<u32>),
    Spec(String),
}

// ── Numeric knobs ───────────────────────────────────────────────────────────

/// Batch budget: an integer is a number of batches, a float a fraction.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum BatchLimit {
    Count(u64),
    Fraction(f64),
}

impl BatchLimit {
    pub fn is_fraction(&self) -> bool {
        matches!(self, Self::Fraction(_))
    }
}

/// Norm order for gradient-norm tracking; `-1` disables tracking.
///
/// Non-finite orders are written as `"inf"`, `"-inf"` or `"nan"` and read
/// back as [`NormType::Real`], since JSON has no literal for them.
#[derive(Debug, Clone, PartialEq)]
pub enum NormType {
    Order(i64),
    Real(f64),
    Named(String),
}

#[derive(Deserialize)]
#[serde(untagged)]
enum NormRepr {
    Order(i64),
    Real(f64),
    Named(String),
}

impl Serialize for NormType {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        match self {
            Self::Order(order) => serializer.serialize_i64(*order),
            Self::Real(order) if order.is_finite() => serializer.serialize_f64(*order),
            Self::Real(order) if order.is_nan() => serializer.serialize_str("nan"),
            Self::Real(order) if *order > 0.0 => serializer.serialize_str("inf"),
            Self::Real(_) => serializer.serialize_str("-inf"),
            Self::Named(name) => serializer.serialize_str(name),
        }
    }
}

impl<'de> Deserialize<'de> for NormType {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        Ok(match NormRepr::deserialize(deserializer)? {
            NormRepr::Order(order) => Self::Order(order),
            NormRepr::Real(order) => Self::Real(order),
            NormRepr::Named(name) => match name.to_ascii_lowercase().as_str() {
                "inf" | "+inf" | ".inf" | "infinity" => Self::Real(f64::INFINITY),
                "-inf" | "-.inf" | "-infinity" => Self::Real(f64::NEG_INFINITY),
                "nan" | ".nan" => Self::Real(f64::NAN),
                _ => Self::Named(name),
            },
        })
    }
}

impl NormType {
    pub fn is_enabled(&self) -> bool {
        *self != Self::Order(-1)
    }
}

/// Numeric precision in bits, or a named mode such as `bf16`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Precision {
    Bits(u32),
    Named(String),
}

impl Precision {
    /// Bit width when given as a number (or a purely numeric string).
    pub fn bits(&self) -> Option<u32> {
        match self {
            Self::Bits(bits) => Some(*bits),
            Self::Named(name) => name.parse().ok(),
        }
    }
}

impl From<u32> for Precision {
    fn from(bits: u32) -> Self {
        Self::Bits(bits)
    }
}

/// Off/on switch that may also carry a mode or attribute name
/// (`auto_scale_batch_size: power`, `auto_lr_find: my_lr`).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Toggle {
    Flag(bool),
    Named(String),
}

impl Toggle {
    pub fn is_enabled(&self) -> bool {
        match self {
            Self::Flag(on) => *on,
            Self::Named(_) => true,
        }
    }
}

// ── Gradient accumulation ───────────────────────────────────────────────────

/// Accumulation factor: constant, or a schedule `{epoch: factor}`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(untagged)]
pub enum GradAccumulation {
    Constant(u32),
    Schedule(BTreeMap<u32, u32>),
}

impl GradAccumulation {
    /// Factor in effect at `epoch`: the schedule entry with the greatest
    /// epoch not after it, or 1 before the first entry.
    pub fn factor_at(&self, epoch: u32) -> u32 {
        match self {
            Self::Constant(factor) => *factor,
            Self::Schedule(schedule) => schedule
                .range(..=epoch)
                .next_back()
                .map(|(_, factor)| *factor)
                .unwrap_or(1),
        }
    }
}

// Schedule keys arrive as integers from YAML but as strings from JSON.
impl<'de> Deserialize<'de> for GradAccumulation {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        struct AccumulationVisitor;

        impl<'de> Visitor<'de> for AccumulationVisitor {
            type Value = GradAccumulation;

            fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str("an accumulation factor or a mapping of epoch to factor")
            }

            fn visit_u64<E: de::Error>(self, v: u64) -> std::result::Result<Self::Value, E> {
                match u32::try_from(v) {
                    Ok(factor) => Ok(GradAccumulation::Constant(factor)),
                    Err(_) => Err(E::invalid_value(Unexpected::Unsigned(v), &self)),
                }
            }

            fn visit_i64<E: de::Error>(self, v: i64) -> std::result::Result<Self::Value, E> {
                match u64::try_from(v) {
                    Ok(v) => self.visit_u64(v),
                    Err(_) => Err(E::invalid_value(Unexpected::Signed(v), &self)),
                }
            }

            fn visit_map<A: MapAccess<'de>>(
                self,
                mut map: A,
            ) -> std::result::Result<Self::Value, A::Error> {
                let mut schedule = BTreeMap::new();
                while let Some((EpochKey(epoch), factor)) = map.next_entry::<EpochKey, u32>()? {
                    schedule.insert(epoch, factor);
                }
                Ok(GradAccumulation::Schedule(schedule))
            }
        }

        deserializer.deserialize_any(AccumulationVisitor)
    }
}

struct EpochKey(u32);

impl<'de> Deserialize<'de> for EpochKey {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        struct KeyVisitor;

        impl<'de> Visitor<'de> for KeyVisitor {
            type Value = EpochKey;

            fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str("an epoch number")
            }

            fn visit_u64<E: de::Error>(self, v: u64) -> std::result::Result<Self::Value, E> {
                u32::try_from(v)
                    .map(EpochKey)
                    .map_err(|_| E::invalid_value(Unexpected::Unsigned(v), &self))
            }

            fn visit_i64<E: de::Error>(self, v: i64) -> std::result::Result<Self::Value, E> {
                u32::try_from(v)
                    .map(EpochKey)
                    .map_err(|_| E::invalid_value(Unexpected::Signed(v), &self))
            }

            fn visit_str<E: de::Error>(self, v: &str) -> std::result::Result<Self::Value, E> {
                v.trim()
                    .parse()
                    .map(EpochKey)
                    .map_err(|_| E::invalid_value(Unexpected::Str(v), &self))
            }
        }

        deserializer.deserialize_any(KeyVisitor)
    }
}

// ── Wall-clock limit ────────────────────────────────────────────────────────

/// Structured duration; missing parts are zero.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct TimeFields {
    pub days: u64,
    pub hours: u64,
    pub minutes: u64,
    pub seconds: u64,
}

/// Maximum training time: `"DD:HH:MM:SS"`, milliseconds, or fields.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum MaxTime {
    Clock(String),
    Millis(u64),
    Fields(TimeFields),
}

impl MaxTime {
    pub fn to_duration(&self) -> Result<Duration> {
        match self {
            Self::Millis(ms) => Ok(Duration::from_millis(*ms)),
            Self::Fields(t) => total_seconds(t.days, t.hours, t.minutes, t.seconds)
                .map(Duration::from_secs)
                .ok_or_else(|| invalid_time("duration overflows")),
            Self::Clock(text) => {
                let parts: Vec<&str> = text.trim().split(':').collect();
                let [d, h, m, s] = parts.as_slice() else {
                    return Err(invalid_time(format!("expected DD:HH:MM:SS, got '{text}'")));
                };
                let parse = |part: &str| {
                    part.parse::<u64>()
                        .map_err(|_| invalid_time(format!("'{part}' is not a number in '{text}'")))
                };
                total_seconds(parse(*d)?, parse(*h)?, parse(*m)?, parse(*s)?)
                    .map(Duration::from_secs)
                    .ok_or_else(|| invalid_time("duration overflows"))
            }
        }
    }
}

fn total_seconds(days: u64, hours: u64, minutes: u64, seconds: u64) -> Option<u64> {
    days.checked_mul(86_400)?
        .checked_add(hours.checked_mul(3_600)?)?
        .checked_add(minutes.checked_mul(60)?)?
        .checked_add(seconds)
}

fn invalid_time(message: impl Into<String>) -> ConfError {
    ConfError::InvalidValue {
        field: "max_time".to_string(),
        message: message.into(),
    }
}

// ── Literal enumerations ────────────────────────────────────────────────────

/// Mixed-precision implementation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AmpBackend {
    #[default]
    Native,
    Apex,
}

impl AmpBackend {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Native => "native",
            Self::Apex => "apex",
        }
    }
}

/// How several training loaders of different lengths are iterated.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TrainloaderMode {
    #[default]
    MaxSizeCycle,
    MinSize,
}

impl TrainloaderMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::MaxSizeCycle => "max_size_cycle",
            Self::MinSize => "min_size",
        }
    }
}

/// Gradient clipping by global norm or by value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum GradientClipAlgorithm {
    #[default]
    Norm,
    Value,
}

impl GradientClipAlgorithm {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Norm => "norm",
            Self::Value => "value",
        }
    }
}

// ── Tests ───────────────────────────────────────────────────────────────────
