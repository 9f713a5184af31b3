//! Bytecode module format

use std::io::{Read, Write};
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::BYTECODE_VERSION;
use crate::error::{BytecodeError, Result};
use crate::method::MethodBody;

fn default_version() -> u32 {
    BYTECODE_VERSION
}

/// A set of independently translatable method bodies
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Module {
    /// Module name (assembly or file name)
    pub name: String,

    /// Format version
    #[serde(default = "default_version")]
    pub version: u32,

    /// Methods defined in this module
    #[serde(default)]
    pub methods: Vec<MethodBody>,
}

impl Module {
    /// Create a new module builder
    pub fn builder(name: impl Into<String>) -> ModuleBuilder {
        ModuleBuilder::new(name)
    }

    /// Parse a module from JSON text
    pub fn from_json(text: &str) -> Result<Self> {
        let module: Module = serde_json::from_str(text)?;
        if module.version != BYTECODE_VERSION {
            return Err(BytecodeError::UnsupportedVersion(module.version));
        }
        Ok(module)
    }

    /// Serialize module to pretty JSON text
    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    /// Read module from a reader
    pub fn read_from<R: Read>(reader: &mut R) -> Result<Self> {
        let mut text = String::new();
        reader.read_to_string(&mut text)?;
        Self::from_json(&text)
    }

    /// Write module to a writer
    pub fn write_to<W: Write>(&self, writer: &mut W) -> Result<()> {
        writer.write_all(self.to_json()?.as_bytes())?;
        Ok(())
    }

    /// Load a module from a JSON file
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let text = std::fs::read_to_string(path)?;
        Self::from_json(&text)
    }

    /// Get a method by name
    pub fn method(&self, name: &str) -> Option<&MethodBody> {
        self.methods.iter().find(|m| m.name == name)
    }
}

/// Builder for creating modules
#[derive(Debug)]
pub struct ModuleBuilder {
    name: String,
    methods: Vec<MethodBody>,
}

impl ModuleBuilder {
    /// Create a new module builder
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            methods: Vec::new(),
        }
    }

    /// Add a method body
    pub fn method(mut self, method: MethodBody) -> Self {
        self.methods.push(method);
        self
    }

    /// Build the module
    pub fn build(self) -> Module {
        Module {
            name: self.name,
            version: BYTECODE_VERSION,
            methods: self.methods,
        }
    }
}
