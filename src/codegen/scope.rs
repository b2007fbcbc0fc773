use std::collections::{HashMap, HashSet};

use crate::ast::{EntityDef, FunctionDef, RecordDef};

use super::types::IrType;

/// A single lexical scope frame: the stored type of every binding plus the
/// set of names that are function parameters (direct SSA values rather than
/// alloca slots).
#[derive(Debug, Clone, Default)]
pub struct Frame {
    bindings: HashMap<String, IrType>,
    parameters: HashSet<String>,
}

/// Per-module symbol environment: a stack of scope frames plus the
/// module-wide record, entity, function and generic-template tables.
#[derive(Debug, Clone, Default)]
pub struct SymbolTable {
    frames: Vec<Frame>,
    record_fields: HashMap<String, Vec<(String, String)>>,
    entities: HashSet<String>,
    functions: HashMap<String, FunctionSig>,
    pub generic_functions: HashMap<String, FunctionDef>,
    pub generic_records: HashMap<String, RecordDef>,
    pub generic_entities: HashMap<String, EntityDef>,
    instantiations: HashMap<String, String>,
}

/// What the emitter needs to know about a callable: its return type (`None`
/// for void).
#[derive(Debug, Clone)]
pub struct FunctionSig {
    pub return_type: Option<IrType>,
}

impl SymbolTable {
    pub fn new() -> Self {
        Self {
            frames: vec![Frame::default()],
            ..Self::default()
        }
    }

    pub fn push_frame(&mut self) {
        self.frames.push(Frame::default());
    }

    pub fn pop_frame(&mut self) {
        self.frames.pop();
    }

    /// Shallow copy of the frame stack, taken before entering a nested
    /// emission context (a lambda body inside expression lowering).
    pub fn snapshot(&self) -> Vec<Frame> {
        self.frames.clone()
    }

    pub fn restore(&mut self, frames: Vec<Frame>) {
        self.frames = frames;
    }

    pub fn bind(&mut self, name: impl ToString, ty: IrType) {
        if let Some(frame) = self.frames.last_mut() {
            frame.bindings.insert(name.to_string(), ty);
        }
    }

    pub fn bind_parameter(&mut self, name: impl ToString, ty: IrType) {
        let name = name.to_string();
        if let Some(frame) = self.frames.last_mut() {
            frame.parameters.insert(name.clone());
            frame.bindings.insert(name, ty);
        }
    }

    /// Find a binding by walking the scopes from innermost to outermost.
    pub fn lookup(&self, name: &str) -> Option<&IrType> {
        self.frames
            .iter()
            .rev()
            .find_map(|frame| frame.bindings.get(name))
    }

    pub fn is_parameter(&self, name: &str) -> bool {
        self.frames
            .iter()
            .rev()
            .find(|frame| frame.bindings.contains_key(name))
            .is_some_and(|frame| frame.parameters.contains(name))
    }

    pub fn add_record(&mut self, name: impl ToString, fields: Vec<(String, String)>) {
        self.record_fields.insert(name.to_string(), fields);
    }

    pub fn add_entity(&mut self, name: impl ToString, fields: Vec<(String, String)>) {
        let name = name.to_string();
        self.entities.insert(name.clone());
        self.record_fields.insert(name, fields);
    }

    pub fn is_entity(&self, name: &str) -> bool {
        self.entities.contains(name)
    }

    pub fn record_fields(&self, record: &str) -> Option<&Vec<(String, String)>> {
        self.record_fields.get(record)
    }

    /// Index and declared source type of `record.field`.
    pub fn field_entry(&self, record: &str, field: &str) -> Option<(usize, &str)> {
        self.record_fields.get(record).and_then(|fields| {
            fields
                .iter()
                .enumerate()
                .find(|(_, (name, _))| name == field)
                .map(|(index, (_, ty))| (index, ty.as_str()))
        })
    }

    /// The underlying primitive of a record that wraps exactly one field.
    pub fn wrapped_primitive(&self, record: &str) -> Option<&str> {
        self.record_fields.get(record).and_then(|fields| match fields.as_slice() {
            [(_, ty)] => Some(ty.as_str()),
            _ => None,
        })
    }

    pub fn add_function(&mut self, name: impl ToString, return_type: Option<IrType>) {
        self.functions
            .insert(name.to_string(), FunctionSig { return_type });
    }

    pub fn function(&self, name: &str) -> Option<&FunctionSig> {
        self.functions.get(name)
    }

    pub fn cached_instantiation(&self, key: &str) -> Option<&String> {
        self.instantiations.get(key)
    }

    pub fn cache_instantiation(&mut self, key: impl ToString, mangled: impl ToString) {
        self.instantiations
            .insert(key.to_string(), mangled.to_string());
    }
}
