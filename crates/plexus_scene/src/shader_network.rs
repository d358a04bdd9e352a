// SPDX-License-Identifier: MIT OR Apache-2.0
//! Shader networks and the tweaks that edit them.

use crate::tweak::{Tweak, TweakMode};
use indexmap::{IndexMap, IndexSet};
use plexus_graph::{CompoundData, GraphError, PlugValue, Result};
use serde::{Deserialize, Serialize};
use std::fmt;

/// A shader instance
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct Shader {
    /// Shader name as known to the renderer
    pub name: String,
    /// Shader type, e.g. `surface`
    pub kind: String,
    /// Parameter values
    pub parameters: CompoundData,
}

impl Shader {
    /// Create a shader without parameters
    pub fn new(name: impl Into<String>, kind: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            kind: kind.into(),
            parameters: CompoundData::new(),
        }
    }

    /// Add a parameter
    pub fn with_parameter(mut self, name: &str, value: impl Into<PlugValue>) -> Self {
        self.parameters.insert(name, value);
        self
    }
}

/// A parameter (or output) of a shader in a network, addressed by handle
#[derive(Debug, Clone, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub struct Parameter {
    /// Shader handle
    pub shader: String,
    /// Parameter name, empty for the shader's default output
    pub name: String,
}

impl Parameter {
    /// Create a parameter address
    pub fn new(shader: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            shader: shader.into(),
            name: name.into(),
        }
    }
}

impl fmt::Display for Parameter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.name.is_empty() {
            f.write_str(&self.shader)
        } else {
            write!(f, "{}.{}", self.shader, self.name)
        }
    }
}

/// A connection from a shader output to a shader parameter
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Connection {
    /// Output being read
    pub source: Parameter,
    /// Parameter being driven
    pub destination: Parameter,
}

/// Shaders keyed by handle, their connections and the network output
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct ShaderNetwork {
    shaders: IndexMap<String, Shader>,
    connections: Vec<Connection>,
    output: Option<Parameter>,
}

impl ShaderNetwork {
    /// Create an empty network
    pub fn new() -> Self {
        Self::default()
    }

    /// Add or replace the shader at `handle`
    pub fn add_shader(&mut self, handle: impl Into<String>, shader: Shader) -> Option<Shader> {
        self.shaders.insert(handle.into(), shader)
    }

    /// Remove a shader and every connection touching it
    pub fn remove_shader(&mut self, handle: &str) -> Option<Shader> {
        let removed = self.shaders.shift_remove(handle)?;
        self.connections
            .retain(|c| c.source.shader != handle && c.destination.shader != handle);
        if self.output.as_ref().is_some_and(|o| o.shader == handle) {
            self.output = None;
        }
        Some(removed)
    }

    /// Get a shader
    pub fn shader(&self, handle: &str) -> Option<&Shader> {
        self.shaders.get(handle)
    }

    /// Shaders in insertion order
    pub fn shaders(&self) -> impl Iterator<Item = (&String, &Shader)> {
        self.shaders.iter()
    }

    /// Number of shaders
    pub fn len(&self) -> usize {
        self.shaders.len()
    }

    /// Whether there are no shaders
    pub fn is_empty(&self) -> bool {
        self.shaders.is_empty()
    }

    /// All connections
    pub fn connections(&self) -> &[Connection] {
        &self.connections
    }

    /// Connect `source` to `destination`, replacing any existing input of
    /// `destination`
    pub fn add_connection(&mut self, source: Parameter, destination: Parameter) -> Result<()> {
        for handle in [&source.shader, &destination.shader] {
            if !self.shaders.contains_key(handle) {
                return Err(GraphError::MissingDependency(format!("shader \"{handle}\" not in network")));
            }
        }
        self.connections.retain(|c| c.destination != destination);
        self.connections.push(Connection { source, destination });
        Ok(())
    }

    /// Remove the connection into `destination`, returning its source
    pub fn remove_connection(&mut self, destination: &Parameter) -> Option<Parameter> {
        let index = self.connections.iter().position(|c| &c.destination == destination)?;
        Some(self.connections.remove(index).source)
    }

    /// The output connected to `parameter`, if any
    pub fn input(&self, parameter: &Parameter) -> Option<&Parameter> {
        self.connections
            .iter()
            .find(|c| &c.destination == parameter)
            .map(|c| &c.source)
    }

    /// The network output
    pub fn output(&self) -> Option<&Parameter> {
        self.output.as_ref()
    }

    /// Set the network output
    pub fn set_output(&mut self, output: Parameter) -> Result<()> {
        if !self.shaders.contains_key(&output.shader) {
            return Err(GraphError::MissingDependency(format!(
                "shader \"{}\" not in network",
                output.shader
            )));
        }
        self.output = Some(output);
        Ok(())
    }

    /// Remove shaders the output no longer depends on, returning how many
    /// were removed
    pub fn remove_unused_shaders(&mut self) -> usize {
        let mut used = IndexSet::new();
        if let Some(output) = &self.output {
            used.insert(output.shader.clone());
        }
        let mut next = 0;
        while let Some(handle) = used.get_index(next).cloned() {
            for connection in &self.connections {
                if connection.destination.shader == handle {
                    used.insert(connection.source.shader.clone());
                }
            }
            next += 1;
        }

        let before = self.shaders.len();
        self.shaders.retain(|handle, _| used.contains(handle));
        self.connections
            .retain(|c| used.contains(&c.source.shader) && used.contains(&c.destination.shader));
        before - self.shaders.len()
    }

    /// Split a tweak name into the parameter it addresses.
    ///
    /// `shader.parameter` addresses a shader by handle, a bare name addresses
    /// the output shader.
    fn tweak_parameter(&self, name: &str) -> Result<Parameter> {
        match name.rsplit_once('.') {
            Some((shader, parameter)) => Ok(Parameter::new(shader, parameter)),
            None => self
                .output
                .as_ref()
                .map(|output| Parameter::new(output.shader.clone(), name))
                .ok_or_else(|| GraphError::MissingDependency(format!("no output shader for tweak \"{name}\""))),
        }
    }
}

/// Apply tweaks to the shaders of `network`, returning whether any edited it.
///
/// Parameters must exist. Connected parameters accept only `Replace`, which
/// breaks the connection; shaders no longer reachable from the output are
/// then removed.
pub fn apply_tweaks_to_network(tweaks: &[Tweak], network: &mut ShaderNetwork) -> Result<bool> {
    let mut modified: IndexMap<String, Shader> = IndexMap::new();
    let mut removed_connection = false;
    let mut edited = false;

    for tweak in tweaks {
        if tweak.name.is_empty() || !tweak.enabled {
            continue;
        }
        let parameter = network.tweak_parameter(&tweak.name)?;

        if network.input(&parameter).is_some() {
            if tweak.mode != TweakMode::Replace {
                return Err(GraphError::PermissionDenied {
                    plug: tweak.name.clone(),
                    reason: format!("cannot apply tweak with mode {} to a connected parameter", tweak.mode),
                });
            }
            network.remove_connection(&parameter);
            removed_connection = true;
        }

        if !modified.contains_key(&parameter.shader) {
            let shader = network
                .shader(&parameter.shader)
                .cloned()
                .ok_or_else(|| GraphError::MissingDependency(format!("shader \"{}\" not in network", parameter.shader)))?;
            modified.insert(parameter.shader.clone(), shader);
        }
        if let Some(shader) = modified.get_mut(&parameter.shader) {
            edited |= tweak.apply_to(&parameter.name, &mut shader.parameters, true)?;
        }
    }

    for (handle, shader) in modified {
        network.add_shader(handle, shader);
    }
    if removed_connection {
        let removed = network.remove_unused_shaders();
        tracing::debug!(removed, "pruned shaders after tweaks");
        edited = true;
    }
    Ok(edited)
}
