// ============================================================
// Layer 7 — Search Space
// ============================================================
// A search space maps hyperparameter names to a description
// of the values to try, in the JSON form
//
//   {
//     "dropout_rate":    [[0.0, 0.3, 4], "range"],
//     "conv_model_name": [["resnet18", "mobilenet"], "choice"]
//   }
//
// "range" takes [low, high, steps] and expands to `steps`
// evenly spaced points, both ends included. The points are
// integers when every one of them is integral.
// "choice" keeps the listed values in order.
//
// Names are kept sorted (BTreeMap) so every expansion of the
// same space lists its axes in the same order.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use serde_json::{json, Map, Value};
use std::{collections::BTreeMap, fmt, fs, path::Path};

use crate::domain::error::{FaceError, FaceResult};

// ─── ParamValue ───────────────────────────────────────────────────────────────
/// One concrete hyperparameter value.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ParamValue {
    Bool(bool),
    Int(i64),
    Float(f64),
    Text(String),
}

impl ParamValue {
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            ParamValue::Int(v)   => Some(*v as f64),
            ParamValue::Float(v) => Some(*v),
            _ => None,
        }
    }

    pub fn to_json(&self) -> Value {
        match self {
            ParamValue::Bool(b)  => json!(b),
            ParamValue::Int(i)   => json!(i),
            ParamValue::Float(f) => json!(f),
            ParamValue::Text(s)  => json!(s),
        }
    }
}

impl fmt::Display for ParamValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ParamValue::Bool(b)  => write!(f, "{b}"),
            ParamValue::Int(i)   => write!(f, "{i}"),
            ParamValue::Float(v) => write!(f, "{v}"),
            ParamValue::Text(s)  => f.write_str(s),
        }
    }
}

/// One sampled configuration: name → value, in name order.
pub type Assignment = BTreeMap<String, ParamValue>;

/// Assignment as a JSON object, ready to overlay on the default HyperParams.
pub fn to_overrides(assignment: &Assignment) -> Map<String, Value> {
    assignment.iter().map(|(k, v)| (k.clone(), v.to_json())).collect()
}

// ─── ParamSpec ────────────────────────────────────────────────────────────────
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SpecKind {
    Range,
    Choice,
}

/// `[values, kind]`, serialised as a two-element JSON array.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ParamSpec(pub Vec<ParamValue>, pub SpecKind);

impl ParamSpec {
    pub fn range(low: f64, high: f64, steps: usize) -> Self {
        Self(
            vec![ParamValue::Float(low), ParamValue::Float(high), ParamValue::Int(steps as i64)],
            SpecKind::Range,
        )
    }

    pub fn choice<V: Into<ParamValue>>(values: impl IntoIterator<Item = V>) -> Self {
        Self(values.into_iter().map(Into::into).collect(), SpecKind::Choice)
    }

    /// Every value this spec can produce, in order.
    pub fn expand(&self, name: &str) -> FaceResult<Vec<ParamValue>> {
        let invalid = |msg: &str| Err(FaceError::InvalidConfig(format!("'{name}': {msg}")));
        match self.1 {
            SpecKind::Choice => {
                if self.0.is_empty() {
                    return invalid("choice list is empty");
                }
                Ok(self.0.clone())
            }
            SpecKind::Range => {
                let [low, high, steps] = self.0.as_slice() else {
                    return invalid("range needs [low, high, steps]");
                };
                let (Some(low), Some(high)) = (low.as_f64(), high.as_f64()) else {
                    return invalid("range bounds must be numbers");
                };
                let steps = match steps {
                    ParamValue::Int(n) if *n > 0 => *n as usize,
                    _ => return invalid("range steps must be a positive integer"),
                };
                if !(low <= high) {
                    return invalid("range low is above high");
                }
                Ok(linspace(low, high, steps))
            }
        }
    }
}

impl From<bool> for ParamValue {
    fn from(v: bool) -> Self { ParamValue::Bool(v) }
}

impl From<i64> for ParamValue {
    fn from(v: i64) -> Self { ParamValue::Int(v) }
}

impl From<f64> for ParamValue {
    fn from(v: f64) -> Self { ParamValue::Float(v) }
}

impl From<&str> for ParamValue {
    fn from(v: &str) -> Self { ParamValue::Text(v.to_string()) }
}

fn linspace(low: f64, high: f64, steps: usize) -> Vec<ParamValue> {
    let points: Vec<f64> = match steps {
        1 => vec![low],
        n => (0..n)
            .map(|i| if i == n - 1 { high } else { low + (high - low) * i as f64 / (n - 1) as f64 })
            .collect(),
    };

    let integral = points.iter().all(|p| (p - p.round()).abs() < 1e-9);
    points
        .into_iter()
        .map(|p| if integral { ParamValue::Int(p.round() as i64) } else { ParamValue::Float(p) })
        .collect()
}

// ─── SearchSpace ──────────────────────────────────────────────────────────────
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SearchSpace {
    params: BTreeMap<String, ParamSpec>,
}

impl SearchSpace {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, name: impl Into<String>, spec: ParamSpec) -> Self {
        self.params.insert(name.into(), spec);
        self
    }

    /// Backbone, dropout, width, depth and landmark use.
    pub fn face_default() -> Self {
        Self::new()
            .with("conv_model_name", ParamSpec::choice(["resnet18", "resnet34", "mobilenet", "shufflenet"]))
            .with("dropout_rate", ParamSpec::range(0.0, 0.3, 4))
            .with("dense_units", ParamSpec::choice([256i64, 512, 1024]))
            .with("num_layers", ParamSpec::range(1.0, 3.0, 3))
            .with("use_landmarks", ParamSpec::choice([true, false]))
    }

    pub fn load(path: &Path) -> Result<Self> {
        let json = fs::read_to_string(path)
            .with_context(|| format!("Cannot read search space '{}'", path.display()))?;
        let space: Self = serde_json::from_str(&json)
            .with_context(|| format!("Malformed search space '{}'", path.display()))?;
        space.axes()?;
        tracing::info!("Loaded search space with {} parameters from '{}'", space.len(), path.display());
        Ok(space)
    }

    pub fn len(&self) -> usize {
        self.params.len()
    }

    pub fn is_empty(&self) -> bool {
        self.params.is_empty()
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.params.keys().map(String::as_str)
    }

    /// (name, values) for every parameter, in name order.
    pub fn axes(&self) -> FaceResult<Vec<(String, Vec<ParamValue>)>> {
        self.params
            .iter()
            .map(|(name, spec)| Ok((name.clone(), spec.expand(name)?)))
            .collect()
    }
}

// ─── Unit Tests ───────────────────────────────────────────────────────────────
#[cfg(test)]
mod tests {
    use super::*;

    fn parse(json: &str) -> SearchSpace {
        serde_json::from_str(json).unwrap()
    }

    #[test]
    fn test_range_expands_evenly_with_both_ends() {
        let space = parse(r#"{ "dropout_rate": [[0.0, 0.3, 4], "range"] }"#);
        let axes = space.axes().unwrap();
        let values: Vec<f64> = axes[0].1.iter().map(|v| v.as_f64().unwrap()).collect();
        let expected = [0.0, 0.1, 0.2, 0.3];
        assert_eq!(values.len(), 4);
        for (v, e) in values.iter().zip(expected) {
            assert!((v - e).abs() < 1e-12, "{v} vs {e}");
        }
        assert_eq!(values[3], 0.3);
    }

    #[test]
    fn test_integral_range_yields_integers() {
        let space = parse(r#"{ "num_layers": [[1, 3, 3], "range"] }"#);
        let axes = space.axes().unwrap();
        assert_eq!(axes[0].1, vec![ParamValue::Int(1), ParamValue::Int(2), ParamValue::Int(3)]);
    }

    #[test]
    fn test_choice_keeps_order_and_types() {
        let space = parse(r#"{ "conv_model_name": [["resnet18", "resnet101"], "choice"], "use_landmarks": [[true, false], "choice"] }"#);
        let axes = space.axes().unwrap();
        assert_eq!(axes[0].0, "conv_model_name");
        assert_eq!(axes[0].1, vec![ParamValue::from("resnet18"), ParamValue::from("resnet101")]);
        assert_eq!(axes[1].1, vec![ParamValue::Bool(true), ParamValue::Bool(false)]);
    }

    #[test]
    fn test_invalid_specs_are_rejected() {
        for json in [
            r#"{ "a": [[0.0, 1.0, 0], "range"] }"#,
            r#"{ "a": [[1.0, 0.0, 3], "range"] }"#,
            r#"{ "a": [[0.0, 1.0], "range"] }"#,
            r#"{ "a": [[], "choice"] }"#,
        ] {
            assert!(matches!(parse(json).axes(), Err(FaceError::InvalidConfig(_))), "{json}");
        }
    }

    #[test]
    fn test_unknown_kind_fails_to_parse() {
        assert!(serde_json::from_str::<SearchSpace>(r#"{ "a": [[1], "uniform"] }"#).is_err());
    }

    #[test]
    fn test_round_trip_and_overrides() {
        let space = SearchSpace::face_default();
        let json = serde_json::to_string(&space).unwrap();
        assert_eq!(serde_json::from_str::<SearchSpace>(&json).unwrap(), space);

        let mut assignment = Assignment::new();
        assignment.insert("dense_units".into(), ParamValue::Int(64));
        assignment.insert("use_landmarks".into(), ParamValue::Bool(false));
        let overrides = to_overrides(&assignment);
        assert_eq!(overrides["dense_units"], json!(64));
        assert_eq!(overrides["use_landmarks"], json!(false));
    }

    #[test]
    fn test_load_from_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("space.json");
        fs::write(&path, r#"{ "learning_rate": [[0.001, 0.0001], "choice"] }"#).unwrap();
        let space = SearchSpace::load(&path).unwrap();
        assert_eq!(space.names().collect::<Vec<_>>(), vec!["learning_rate"]);
    }
}

#[cfg(test)]
mod proptests {
    use super::*;
    use proptest::prelude::*;

    proptest! {
        /// A range always yields `steps` non-decreasing points from low to high
        #[test]
        fn range_points_are_ordered_and_bounded(
            low in -100.0f64..100.0,
            width in 0.0f64..50.0,
            steps in 1usize..20,
        ) {
            let high = low + width;
            let values = ParamSpec::range(low, high, steps).expand("p").unwrap();
            prop_assert_eq!(values.len(), steps);
            let points: Vec<f64> = values.iter().map(|v| v.as_f64().unwrap()).collect();
            for pair in points.windows(2) {
                prop_assert!(pair[0] <= pair[1]);
            }
            prop_assert!((points[0] - low).abs() < 1e-6);
            if steps > 1 {
                prop_assert!((points[steps - 1] - high).abs() < 1e-6);
            }
        }
    }
}
