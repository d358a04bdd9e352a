// SPDX-License-Identifier: MIT OR Apache-2.0
//! Plug types and the values that flow through them.

use crate::fingerprint::FingerprintHasher;
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

/// Data type carried by a plug
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum PlugType {
    /// Boolean value
    Bool,
    /// Integer value
    Int,
    /// Floating point value
    Float,
    /// String value
    String,
    /// 2D vector, compound of `x`, `y`
    V2f,
    /// 3D vector, compound of `x`, `y`, `z`
    V3f,
    /// RGB color, compound of `r`, `g`, `b`
    Color3f,
    /// RGBA color, compound of `r`, `g`, `b`, `a`
    Color4f,
    /// Array of integers
    IntVector,
    /// Array of floats
    FloatVector,
    /// Array of strings
    StringVector,
    /// Named parameter data (attributes, shader parameters)
    Compound,
    /// Plain parent for arbitrary child plugs
    Container,
}

impl PlugType {
    /// Whether plugs of this type are built from per-component `Float` children
    pub fn is_aggregate(&self) -> bool {
        matches!(self, Self::V2f | Self::V3f | Self::Color3f | Self::Color4f)
    }

    /// Names of the child plugs of an aggregate type
    pub fn component_names(&self) -> &'static [&'static str] {
        match self {
            Self::V2f => &["x", "y"],
            Self::V3f => &["x", "y", "z"],
            Self::Color3f => &["r", "g", "b"],
            Self::Color4f => &["r", "g", "b", "a"],
            _ => &[],
        }
    }

    /// Whether this type is numeric and scalar
    pub fn is_numeric(&self) -> bool {
        matches!(self, Self::Bool | Self::Int | Self::Float)
    }

    /// Check if a plug of this type can drive a plug of another type
    pub fn can_connect_to(&self, other: &PlugType) -> bool {
        if self == other {
            return true;
        }

        match (self, other) {
            // Scalars convert freely
            (a, b) if a.is_numeric() && b.is_numeric() => true,
            // Same component count, children connect pairwise
            (Self::V3f, Self::Color3f) | (Self::Color3f, Self::V3f) => true,
            _ => false,
        }
    }

    /// The default value for a plug of this type
    pub fn default_value(&self) -> PlugValue {
        match self {
            Self::Bool => PlugValue::Bool(false),
            Self::Int => PlugValue::Int(0),
            Self::Float => PlugValue::Float(0.0),
            Self::String => PlugValue::String(String::new()),
            Self::V2f => PlugValue::V2f([0.0; 2]),
            Self::V3f => PlugValue::V3f([0.0; 3]),
            Self::Color3f => PlugValue::Color3f([0.0; 3]),
            Self::Color4f => PlugValue::Color4f([0.0, 0.0, 0.0, 1.0]),
            Self::IntVector => PlugValue::IntVector(Vec::new()),
            Self::FloatVector => PlugValue::FloatVector(Vec::new()),
            Self::StringVector => PlugValue::StringVector(Vec::new()),
            Self::Compound | Self::Container => PlugValue::Compound(CompoundData::new()),
        }
    }

    fn tag(&self) -> u8 {
        match self {
            Self::Bool => 1,
            Self::Int => 2,
            Self::Float => 3,
            Self::String => 4,
            Self::V2f => 5,
            Self::V3f => 6,
            Self::Color3f => 7,
            Self::Color4f => 8,
            Self::IntVector => 9,
            Self::FloatVector => 10,
            Self::StringVector => 11,
            Self::Compound => 12,
            Self::Container => 13,
        }
    }

    /// Append this type to a fingerprint
    pub fn hash_into(&self, hasher: &mut FingerprintHasher) {
        hasher.append_tag(self.tag());
    }
}

/// Value that can be stored in or computed for a plug
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum PlugValue {
    /// Boolean
    Bool(bool),
    /// Integer
    Int(i32),
    /// Float
    Float(f32),
    /// String
    String(String),
    /// 2D vector
    V2f([f32; 2]),
    /// 3D vector
    V3f([f32; 3]),
    /// RGB color
    Color3f([f32; 3]),
    /// RGBA color
    Color4f([f32; 4]),
    /// Integer array
    IntVector(Vec<i32>),
    /// Float array
    FloatVector(Vec<f32>),
    /// String array
    StringVector(Vec<String>),
    /// Named parameter data
    Compound(CompoundData),
}

impl PlugValue {
    /// Get the plug type for this value
    pub fn plug_type(&self) -> PlugType {
        match self {
            Self::Bool(_) => PlugType::Bool,
            Self::Int(_) => PlugType::Int,
            Self::Float(_) => PlugType::Float,
            Self::String(_) => PlugType::String,
            Self::V2f(_) => PlugType::V2f,
            Self::V3f(_) => PlugType::V3f,
            Self::Color3f(_) => PlugType::Color3f,
            Self::Color4f(_) => PlugType::Color4f,
            Self::IntVector(_) => PlugType::IntVector,
            Self::FloatVector(_) => PlugType::FloatVector,
            Self::StringVector(_) => PlugType::StringVector,
            Self::Compound(_) => PlugType::Compound,
        }
    }

    /// Append this value to a fingerprint
    pub fn hash_into(&self, hasher: &mut FingerprintHasher) {
        self.plug_type().hash_into(hasher);
        match self {
            Self::Bool(v) => {
                hasher.append_bool(*v);
            }
            Self::Int(v) => {
                hasher.append_i32(*v);
            }
            Self::Float(v) => {
                hasher.append_f32(*v);
            }
            Self::String(v) => {
                hasher.append_str(v);
            }
            Self::V2f(v) => {
                hasher.append_f32s(v);
            }
            Self::V3f(v) | Self::Color3f(v) => {
                hasher.append_f32s(v);
            }
            Self::Color4f(v) => {
                hasher.append_f32s(v);
            }
            Self::IntVector(v) => {
                hasher.append_u64(v.len() as u64);
                for i in v {
                    hasher.append_i32(*i);
                }
            }
            Self::FloatVector(v) => {
                hasher.append_f32s(v);
            }
            Self::StringVector(v) => {
                hasher.append_u64(v.len() as u64);
                for s in v {
                    hasher.append_str(s);
                }
            }
            Self::Compound(data) => data.hash_into(hasher),
        }
    }

    /// Per-component floats of an aggregate value
    pub fn components(&self) -> Option<Vec<f32>> {
        match self {
            Self::V2f(v) => Some(v.to_vec()),
            Self::V3f(v) | Self::Color3f(v) => Some(v.to_vec()),
            Self::Color4f(v) => Some(v.to_vec()),
            _ => None,
        }
    }

    /// Build an aggregate value from per-component floats
    pub fn from_components(plug_type: &PlugType, components: &[f32]) -> Option<PlugValue> {
        match (plug_type, components) {
            (PlugType::V2f, [x, y]) => Some(Self::V2f([*x, *y])),
            (PlugType::V3f, [x, y, z]) => Some(Self::V3f([*x, *y, *z])),
            (PlugType::Color3f, [r, g, b]) => Some(Self::Color3f([*r, *g, *b])),
            (PlugType::Color4f, [r, g, b, a]) => Some(Self::Color4f([*r, *g, *b, *a])),
            _ => None,
        }
    }

    /// Convert to another plug type, if a conversion exists
    pub fn coerce(&self, target: &PlugType) -> Option<PlugValue> {
        if &self.plug_type() == target {
            return Some(self.clone());
        }

        match (self, target) {
            (Self::Bool(v), PlugType::Int) => Some(Self::Int(i32::from(*v))),
            (Self::Bool(v), PlugType::Float) => Some(Self::Float(if *v { 1.0 } else { 0.0 })),
            (Self::Int(v), PlugType::Bool) => Some(Self::Bool(*v != 0)),
            (Self::Int(v), PlugType::Float) => Some(Self::Float(*v as f32)),
            (Self::Float(v), PlugType::Bool) => Some(Self::Bool(*v != 0.0)),
            (Self::Float(v), PlugType::Int) => Some(Self::Int(*v as i32)),
            (Self::Int(_) | Self::Float(_), t) if t.is_aggregate() => {
                let scalar = self.as_float()?;
                let count = t.component_names().len();
                Self::from_components(t, &vec![scalar; count])
            }
            (Self::V3f(v), PlugType::Color3f) => Some(Self::Color3f(*v)),
            (Self::Color3f(v), PlugType::V3f) => Some(Self::V3f(*v)),
            (Self::Color3f([r, g, b]), PlugType::Color4f) => Some(Self::Color4f([*r, *g, *b, 1.0])),
            (Self::Color4f([r, g, b, _]), PlugType::Color3f) => Some(Self::Color3f([*r, *g, *b])),
            (Self::V2f([x, y]), PlugType::V3f) => Some(Self::V3f([*x, *y, 0.0])),
            (Self::V3f([x, y, _]), PlugType::V2f) => Some(Self::V2f([*x, *y])),
            (Self::Compound(data), PlugType::Container) => Some(Self::Compound(data.clone())),
            _ => None,
        }
    }

    /// Get as bool if possible
    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Self::Bool(v) => Some(*v),
            Self::Int(v) => Some(*v != 0),
            _ => None,
        }
    }

    /// Get as integer if possible
    pub fn as_int(&self) -> Option<i32> {
        match self {
            Self::Int(v) => Some(*v),
            Self::Bool(v) => Some(i32::from(*v)),
            _ => None,
        }
    }

    /// Get as float if possible
    pub fn as_float(&self) -> Option<f32> {
        match self {
            Self::Float(v) => Some(*v),
            Self::Int(v) => Some(*v as f32),
            _ => None,
        }
    }

    /// Get as string if possible
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Self::String(v) => Some(v),
            _ => None,
        }
    }

    /// Get as compound data if possible
    pub fn as_compound(&self) -> Option<&CompoundData> {
        match self {
            Self::Compound(v) => Some(v),
            _ => None,
        }
    }

    /// Consume into compound data if possible
    pub fn into_compound(self) -> Option<CompoundData> {
        match self {
            Self::Compound(v) => Some(v),
            _ => None,
        }
    }
}

impl From<bool> for PlugValue {
    fn from(value: bool) -> Self {
        Self::Bool(value)
    }
}

impl From<i32> for PlugValue {
    fn from(value: i32) -> Self {
        Self::Int(value)
    }
}

impl From<f32> for PlugValue {
    fn from(value: f32) -> Self {
        Self::Float(value)
    }
}

impl From<&str> for PlugValue {
    fn from(value: &str) -> Self {
        Self::String(value.to_string())
    }
}

impl From<String> for PlugValue {
    fn from(value: String) -> Self {
        Self::String(value)
    }
}

impl From<CompoundData> for PlugValue {
    fn from(value: CompoundData) -> Self {
        Self::Compound(value)
    }
}

/// Ordered named parameters, the payload of `Compound` plugs
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct CompoundData(IndexMap<String, PlugValue>);

impl CompoundData {
    /// Create empty compound data
    pub fn new() -> Self {
        Self(IndexMap::new())
    }

    /// Get a member
    pub fn get(&self, name: &str) -> Option<&PlugValue> {
        self.0.get(name)
    }

    /// Get a mutable member
    pub fn get_mut(&mut self, name: &str) -> Option<&mut PlugValue> {
        self.0.get_mut(name)
    }

    /// Insert or replace a member, returning the previous value
    pub fn insert(&mut self, name: impl Into<String>, value: impl Into<PlugValue>) -> Option<PlugValue> {
        self.0.insert(name.into(), value.into())
    }

    /// Remove a member, preserving the order of the rest
    pub fn remove(&mut self, name: &str) -> Option<PlugValue> {
        self.0.shift_remove(name)
    }

    /// Check whether a member exists
    pub fn contains(&self, name: &str) -> bool {
        self.0.contains_key(name)
    }

    /// Number of members
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Whether there are no members
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Iterate over members in insertion order
    pub fn iter(&self) -> impl Iterator<Item = (&String, &PlugValue)> {
        self.0.iter()
    }

    /// Member names in insertion order
    pub fn names(&self) -> impl Iterator<Item = &String> {
        self.0.keys()
    }

    /// Append to a fingerprint.
    ///
    /// Members are hashed in name order because equality ignores order.
    pub fn hash_into(&self, hasher: &mut FingerprintHasher) {
        let mut names: Vec<&String> = self.0.keys().collect();
        names.sort();
        hasher.append_u64(names.len() as u64);
        for name in names {
            hasher.append_str(name);
            self.0[name.as_str()].hash_into(hasher);
        }
    }
}

impl FromIterator<(String, PlugValue)> for CompoundData {
    fn from_iter<T: IntoIterator<Item = (String, PlugValue)>>(iter: T) -> Self {
        Self(iter.into_iter().collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn fingerprint(value: &PlugValue) -> crate::Fingerprint {
        let mut hasher = FingerprintHasher::new();
        value.hash_into(&mut hasher);
        hasher.finish()
    }

    #[test]
    fn test_numeric_coercion() {
        assert_eq!(PlugValue::Float(2.7).coerce(&PlugType::Int), Some(PlugValue::Int(2)));
        assert_eq!(PlugValue::Bool(true).coerce(&PlugType::Float), Some(PlugValue::Float(1.0)));
        assert_eq!(
            PlugValue::Float(0.5).coerce(&PlugType::Color3f),
            Some(PlugValue::Color3f([0.5; 3]))
        );
        assert_eq!(PlugValue::String("a".into()).coerce(&PlugType::Int), None);
    }

    #[test]
    fn test_connection_compatibility() {
        assert!(PlugType::Int.can_connect_to(&PlugType::Float));
        assert!(PlugType::V3f.can_connect_to(&PlugType::Color3f));
        assert!(!PlugType::String.can_connect_to(&PlugType::Float));
        assert!(!PlugType::Color4f.can_connect_to(&PlugType::V3f));
    }

    #[test]
    fn test_compound_hash_ignores_insertion_order() {
        let mut a = CompoundData::new();
        a.insert("roughness", 0.5);
        a.insert("metallic", 1.0);
        let mut b = CompoundData::new();
        b.insert("metallic", 1.0);
        b.insert("roughness", 0.5);

        assert_eq!(a, b);
        assert_eq!(
            fingerprint(&PlugValue::Compound(a)),
            fingerprint(&PlugValue::Compound(b))
        );
    }

    #[test]
    fn test_type_tag_separates_equal_bits() {
        assert_ne!(
            fingerprint(&PlugValue::V3f([1.0, 2.0, 3.0])),
            fingerprint(&PlugValue::Color3f([1.0, 2.0, 3.0]))
        );
    }
}
