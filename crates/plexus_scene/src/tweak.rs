// SPDX-License-Identifier: MIT OR Apache-2.0
//! Parameter tweaks.
//!
//! A tweak is a named, modal edit applied to a set of parameters. In a graph
//! a tweak is a container plug with `name`, `enabled`, `mode` and `value`
//! children, built by [`add_tweak_plug`].

use plexus_graph::plug_algo::create_plug_from_value;
use plexus_graph::{
    CompoundData, Context, Direction, Graph, GraphError, PlugDescriptor, PlugFlags, PlugId, PlugValue, Result,
};
use serde::{Deserialize, Serialize};
use std::fmt;

/// How a tweak combines its value with the existing parameter
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum TweakMode {
    /// Set the parameter to the tweak value
    #[default]
    Replace,
    /// Add the tweak value
    Add,
    /// Subtract the tweak value
    Subtract,
    /// Multiply by the tweak value
    Multiply,
    /// Erase the parameter
    Remove,
}

impl TweakMode {
    /// All modes in plug index order
    pub const ALL: [TweakMode; 5] = [Self::Replace, Self::Add, Self::Subtract, Self::Multiply, Self::Remove];

    /// Index stored on the `mode` plug
    pub fn index(self) -> i32 {
        match self {
            Self::Replace => 0,
            Self::Add => 1,
            Self::Subtract => 2,
            Self::Multiply => 3,
            Self::Remove => 4,
        }
    }

    /// Mode for a `mode` plug index
    pub fn from_index(index: i32) -> Option<Self> {
        usize::try_from(index).ok().and_then(|i| Self::ALL.get(i).copied())
    }

    /// Whether the mode combines values arithmetically
    pub fn is_arithmetic(self) -> bool {
        matches!(self, Self::Add | Self::Subtract | Self::Multiply)
    }
}

impl fmt::Display for TweakMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Replace => "Replace",
            Self::Add => "Add",
            Self::Subtract => "Subtract",
            Self::Multiply => "Multiply",
            Self::Remove => "Remove",
        };
        f.write_str(name)
    }
}

/// A single parameter edit
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Tweak {
    /// Parameter name; empty tweaks do nothing
    pub name: String,
    /// Disabled tweaks do nothing
    pub enabled: bool,
    /// How the value is combined
    pub mode: TweakMode,
    /// Operand of the edit, ignored by `Remove`
    pub value: PlugValue,
}

impl Tweak {
    /// Create an enabled tweak
    pub fn new(name: impl Into<String>, value: impl Into<PlugValue>, mode: TweakMode) -> Self {
        Self {
            name: name.into(),
            enabled: true,
            mode,
            value: value.into(),
        }
    }

    /// Set whether the tweak is enabled
    pub fn with_enabled(mut self, enabled: bool) -> Self {
        self.enabled = enabled;
        self
    }

    /// Read a tweak from a plug built by [`add_tweak_plug`], evaluated under
    /// `context`
    pub fn from_plug(graph: &Graph, plug: PlugId, context: &Context) -> Result<Self> {
        let node = graph.plug(plug).ok_or(GraphError::PlugNotFound(plug))?.node();
        let path = graph.relative_name(plug);
        Self::from_members(|member| {
            let child = graph.plug_by_path(node, &format!("{path}.{member}"))?;
            Ok(graph.get_value(child, context)?.to_value())
        })
    }

    /// Build a tweak from a lookup of its member values
    pub(crate) fn from_members(member: impl Fn(&str) -> Result<PlugValue>) -> Result<Self> {
        let name = member("name")?;
        let enabled = member("enabled")?;
        let mode = member("mode")?;
        let index = mode
            .as_int()
            .ok_or_else(|| GraphError::UnsupportedType(format!("tweak mode {mode:?}")))?;
        Ok(Self {
            name: name.as_str().unwrap_or_default().to_string(),
            enabled: enabled.as_bool().unwrap_or(false),
            mode: TweakMode::from_index(index)
                .ok_or_else(|| GraphError::UnsupportedType(format!("tweak mode {index}")))?,
            value: member("value")?,
        })
    }

    /// Apply to `parameters`, returning whether anything was edited.
    ///
    /// With `require_exists` a `Replace` of a missing parameter is an error,
    /// otherwise it inserts the parameter.
    pub fn apply(&self, parameters: &mut CompoundData, require_exists: bool) -> Result<bool> {
        if !self.enabled || self.name.is_empty() {
            return Ok(false);
        }
        self.apply_to(&self.name, parameters, require_exists)
    }

    /// Apply to the parameter `name`, which may differ from the tweak name
    /// when the tweak addresses a shader
    pub(crate) fn apply_to(&self, name: &str, parameters: &mut CompoundData, require_exists: bool) -> Result<bool> {
        if self.mode == TweakMode::Remove {
            return Ok(parameters.remove(name).is_some());
        }

        let Some(current) = parameters.get(name) else {
            if self.mode == TweakMode::Replace && !require_exists {
                parameters.insert(name, self.value.clone());
                return Ok(true);
            }
            return Err(GraphError::MissingDependency(format!(
                "cannot apply tweak with mode {} to \"{name}\": parameter does not exist",
                self.mode
            )));
        };

        if current.plug_type() != self.value.plug_type() {
            return Err(GraphError::TypeMismatch {
                plug: name.to_string(),
                expected: current.plug_type(),
                found: self.value.plug_type(),
            });
        }

        let updated = match self.mode {
            TweakMode::Replace => self.value.clone(),
            mode => combine(mode, current, &self.value, name)?,
        };
        parameters.insert(name, updated);
        Ok(true)
    }
}

fn combine(mode: TweakMode, current: &PlugValue, operand: &PlugValue, name: &str) -> Result<PlugValue> {
    let float = |a: f32, b: f32| match mode {
        TweakMode::Add => a + b,
        TweakMode::Subtract => a - b,
        TweakMode::Multiply => a * b,
        _ => b,
    };
    match (current, operand) {
        (PlugValue::Int(a), PlugValue::Int(b)) => Ok(PlugValue::Int(match mode {
            TweakMode::Add => a.wrapping_add(*b),
            TweakMode::Subtract => a.wrapping_sub(*b),
            TweakMode::Multiply => a.wrapping_mul(*b),
            _ => *b,
        })),
        (PlugValue::Float(a), PlugValue::Float(b)) => Ok(PlugValue::Float(float(*a, *b))),
        _ => {
            let plug_type = current.plug_type();
            let combined = current.components().zip(operand.components()).and_then(|(a, b)| {
                let values: Vec<f32> = a.iter().zip(&b).map(|(a, b)| float(*a, *b)).collect();
                PlugValue::from_components(&plug_type, &values)
            });
            combined.ok_or_else(|| {
                GraphError::UnsupportedType(format!(
                    "cannot apply tweak with mode {mode} to \"{name}\" of type {plug_type:?}"
                ))
            })
        }
    }
}

/// Apply tweaks in order, returning whether any edited the parameters
pub fn apply_tweaks(tweaks: &[Tweak], parameters: &mut CompoundData, require_exists: bool) -> Result<bool> {
    let mut edited = false;
    for tweak in tweaks {
        edited |= tweak.apply(parameters, require_exists)?;
    }
    Ok(edited)
}

/// Add a tweak plug under the container `parent`, returning the new plug
pub fn add_tweak_plug(
    graph: &mut Graph,
    parent: PlugId,
    name: &str,
    value: impl Into<PlugValue>,
    mode: TweakMode,
    enabled: bool,
) -> Result<PlugId> {
    let container = graph.plug(parent).ok_or(GraphError::PlugNotFound(parent))?;
    let node = container.node();
    let count = container.children().len();

    let value_plug = create_plug_from_value("value", Direction::In, PlugFlags::default(), &value.into())?;
    let descriptor = PlugDescriptor::container(
        format!("tweak{count}"),
        Direction::In,
        vec![
            PlugDescriptor::input("name", ""),
            PlugDescriptor::input("enabled", true),
            PlugDescriptor::input("mode", TweakMode::Replace.index()),
            value_plug,
        ],
    )
    .with_flags(PlugFlags::dynamic());

    let plug = graph.add_plug(node, Some(parent), descriptor)?;
    let path = graph.relative_name(plug);
    graph.set_value(graph.plug_by_path(node, &format!("{path}.name"))?, name)?;
    graph.set_value(graph.plug_by_path(node, &format!("{path}.enabled"))?, enabled)?;
    graph.set_value(graph.plug_by_path(node, &format!("{path}.mode"))?, mode.index())?;
    Ok(plug)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parameters() -> CompoundData {
        let mut parameters = CompoundData::new();
        parameters.insert("roughness", 0.5);
        parameters.insert("samples", 4);
        parameters.insert("color", PlugValue::Color3f([0.5, 0.25, 1.0]));
        parameters.insert("label", "metal");
        parameters
    }

    #[test]
    fn test_mode_index() {
        for mode in TweakMode::ALL {
            assert_eq!(TweakMode::from_index(mode.index()), Some(mode));
        }
        assert_eq!(TweakMode::from_index(5), None);
        assert_eq!(TweakMode::from_index(-1), None);
    }

    #[test]
    fn test_arithmetic_modes() {
        let mut parameters = parameters();
        Tweak::new("samples", 2, TweakMode::Multiply).apply(&mut parameters, true).unwrap();
        Tweak::new("roughness", 0.25, TweakMode::Add).apply(&mut parameters, true).unwrap();
        Tweak::new("color", PlugValue::Color3f([0.5, 0.25, 0.5]), TweakMode::Subtract)
            .apply(&mut parameters, true)
            .unwrap();

        assert_eq!(parameters.get("samples"), Some(&PlugValue::Int(8)));
        assert_eq!(parameters.get("roughness"), Some(&PlugValue::Float(0.75)));
        assert_eq!(parameters.get("color"), Some(&PlugValue::Color3f([0.0, 0.0, 0.5])));
    }

    #[test]
    fn test_remove_and_noops() {
        let mut parameters = parameters();
        assert!(Tweak::new("label", "", TweakMode::Remove).apply(&mut parameters, true).unwrap());
        assert!(!parameters.contains("label"));

        let disabled = Tweak::new("samples", 100, TweakMode::Replace).with_enabled(false);
        assert!(!disabled.apply(&mut parameters, true).unwrap());
        assert!(!Tweak::new("", 100, TweakMode::Replace).apply(&mut parameters, true).unwrap());
        assert_eq!(parameters.get("samples"), Some(&PlugValue::Int(4)));
    }

    #[test]
    fn test_missing_parameter() {
        let mut parameters = parameters();
        let replace = Tweak::new("shadow", true, TweakMode::Replace);
        assert!(matches!(
            replace.apply(&mut parameters, true),
            Err(GraphError::MissingDependency(_))
        ));
        assert!(replace.apply(&mut parameters, false).unwrap());
        assert_eq!(parameters.get("shadow"), Some(&PlugValue::Bool(true)));

        let add = Tweak::new("intensity", 1.0, TweakMode::Add);
        assert!(matches!(add.apply(&mut parameters, false), Err(GraphError::MissingDependency(_))));
    }

    #[test]
    fn test_type_and_arithmetic_errors() {
        let mut parameters = parameters();
        let error = Tweak::new("samples", 2.0, TweakMode::Replace)
            .apply(&mut parameters, true)
            .unwrap_err();
        assert!(matches!(error, GraphError::TypeMismatch { ref plug, .. } if plug == "samples"));

        let error = Tweak::new("label", "x", TweakMode::Add).apply(&mut parameters, true).unwrap_err();
        assert!(matches!(error, GraphError::UnsupportedType(_)));
        assert_eq!(parameters.get("label"), Some(&PlugValue::String("metal".into())));
    }

    #[test]
    fn test_apply_tweaks_stops_at_first_error() {
        let mut parameters = parameters();
        let tweaks = [
            Tweak::new("samples", 1, TweakMode::Add),
            Tweak::new("missing", 1, TweakMode::Add),
            Tweak::new("samples", 1, TweakMode::Add),
        ];
        assert!(apply_tweaks(&tweaks, &mut parameters, true).is_err());
        assert_eq!(parameters.get("samples"), Some(&PlugValue::Int(5)));
    }
}
