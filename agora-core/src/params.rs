//! Named model parameters and the per-frame snapshot handed to the renderer

use serde::Serialize;
use std::collections::BTreeMap;

pub const PARAM_ANGLE_X: &str = "ParamAngleX";
pub const PARAM_ANGLE_Y: &str = "ParamAngleY";
pub const PARAM_ANGLE_Z: &str = "ParamAngleZ";
pub const PARAM_BODY_ANGLE_X: &str = "ParamBodyAngleX";
pub const PARAM_BODY_ANGLE_Y: &str = "ParamBodyAngleY";
pub const PARAM_BODY_ANGLE_Z: &str = "ParamBodyAngleZ";
pub const PARAM_EYE_L_OPEN: &str = "ParamEyeLOpen";
pub const PARAM_EYE_R_OPEN: &str = "ParamEyeROpen";

/// Model parameter driven by a head oscillation on `axis`
pub fn head_param(axis: char) -> Option<&'static str> {
    match axis {
        'x' => Some(PARAM_ANGLE_X),
        'y' => Some(PARAM_ANGLE_Y),
        'z' => Some(PARAM_ANGLE_Z),
        _ => None,
    }
}

/// Model parameter driven by a body oscillation on `axis`
pub fn body_param(axis: char) -> Option<&'static str> {
    match axis {
        'x' => Some(PARAM_BODY_ANGLE_X),
        'y' => Some(PARAM_BODY_ANGLE_Y),
        'z' => Some(PARAM_BODY_ANGLE_Z),
        _ => None,
    }
}

/// Complete set of parameter values for one character at one instant
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct ParameterSnapshot {
    values: BTreeMap<String, f64>,
}

impl ParameterSnapshot {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set(&mut self, name: impl Into<String>, value: f64) {
        self.values.insert(name.into(), value);
    }

    pub fn get(&self, name: &str) -> Option<f64> {
        self.values.get(name).copied()
    }

    pub fn contains(&self, name: &str) -> bool {
        self.values.contains_key(name)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, f64)> {
        self.values.iter().map(|(k, v)| (k.as_str(), *v))
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }
}

impl<'a> IntoIterator for &'a ParameterSnapshot {
    type Item = (&'a String, &'a f64);
    type IntoIter = std::collections::btree_map::Iter<'a, String, f64>;

    fn into_iter(self) -> Self::IntoIter {
        self.values.iter()
    }
}
