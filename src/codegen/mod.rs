//! Code generation for RazorForge and Suslang.
//!
//! This module lowers type-correct ASTs to textual LLVM IR. You should run
//! the semantic analyzer beforehand; nodes arrive here with their
//! `ResolvedType` annotations already in place.
mod access;
mod error;
mod expressions;
mod generics;
mod intrinsics;
mod platform;
mod runtime;
mod scope;
mod statements;
mod temp;
mod types;

use std::collections::{HashMap, HashSet, VecDeque};

use log::{debug, info};

use crate::ast::{FunctionDef, Item, Location, Module};

pub use self::error::{CodegenError, CodegenResult};
pub use self::platform::{Language, Platform, PointerWidth};
pub use self::runtime::{MathFamily, MathRuntimeBinder};
pub use self::scope::SymbolTable;
pub use self::temp::TempAllocator;
pub use self::types::{mangle_type, IrType, TypeMapper, Value};

/// Exit and continue targets of the innermost loops, for `break`/`continue`.
#[derive(Debug, Clone)]
pub(crate) struct LoopContext {
    pub continue_label: String,
    pub break_label: String,
}

/// A lock that must be released before leaving the enclosing
/// `inspecting`/`seizing` body, on any exit edge.
#[derive(Debug, Clone)]
pub(crate) struct LockRelease {
    pub unlock_symbol: String,
    pub source: String,
}

/// The module-level IR emitter. Owns the output buffers, the temp and label
/// counters, the symbol table, the temp type map, the pending definition
/// queue and the generic caches. One emitter lowers one module; emitting
/// modules concurrently takes one emitter each.
pub struct Emitter {
    platform: Platform,
    language: Language,
    pub(crate) types: TypeMapper,
    pub(crate) temps: TempAllocator,
    pub(crate) symbols: SymbolTable,
    /// Every temp ever produced, with its IR type. Spans the module so
    /// nested emission contexts can look operands up across scopes.
    pub(crate) temp_types: HashMap<String, IrType>,
    /// Instruction stream of the function currently being lowered, and of
    /// all finished top-level functions before it.
    pub(crate) out: String,
    structs: String,
    externals: Vec<String>,
    declared: HashSet<String>,
    string_pool: Vec<String>,
    string_count: usize,
    pub(crate) pending: VecDeque<String>,
    pub(crate) loop_stack: Vec<LoopContext>,
    pub(crate) lock_stack: Vec<LockRelease>,
    pub(crate) lambda_count: usize,
    pub(crate) current_return: Option<IrType>,
    pub(crate) current_self: Option<String>,
    stack_traces: bool,
}

impl Emitter {
    pub fn new(platform: Platform, language: Language) -> Self {
        Self {
            platform,
            language,
            types: TypeMapper::new(platform),
            temps: TempAllocator::new(),
            symbols: SymbolTable::new(),
            temp_types: HashMap::new(),
            out: String::new(),
            structs: String::new(),
            externals: Vec::new(),
            declared: HashSet::new(),
            string_pool: Vec::new(),
            string_count: 0,
            pending: VecDeque::new(),
            loop_stack: Vec::new(),
            lock_stack: Vec::new(),
            lambda_count: 0,
            current_return: None,
            current_self: None,
            stack_traces: false,
        }
    }

    /// Emit a call to the stack-trace helper before every `ret`.
    pub fn with_stack_traces(mut self) -> Self {
        self.stack_traces = true;
        self
    }

    pub(crate) fn language(&self) -> Language {
        self.language
    }

    /// Lower a whole module. On error the partial output is worthless and
    /// must be discarded by the caller.
    pub fn emit_module(&mut self, module: &Module) -> CodegenResult<String> {
        info!("generating IR for module '{}'", module.name);

        // structs and signatures first, so bodies can reference them in any
        // order
        for item in &module.items {
            match item {
                Item::Record(record) => {
                    if record.type_params.is_empty() {
                        self.declare_record(&record.name, &record.fields, false, &record.location)?;
                    } else {
                        self.symbols
                            .generic_records
                            .insert(record.name.clone(), record.clone());
                    }
                }
                Item::Entity(entity) => {
                    if entity.type_params.is_empty() {
                        self.declare_record(&entity.name, &entity.fields, true, &entity.location)?;
                    } else {
                        self.symbols
                            .generic_entities
                            .insert(entity.name.clone(), entity.clone());
                    }
                }
                Item::Function(function) => {
                    if function.type_params.is_empty() {
                        self.register_function(function)?;
                    } else {
                        self.symbols
                            .generic_functions
                            .insert(function.name.clone(), function.clone());
                    }
                }
            }
        }

        for item in &module.items {
            if let Item::Function(function) = item {
                if function.type_params.is_empty() {
                    self.emit_function(function)?;
                }
            }
        }

        // lambdas and generic instantiations queued along the way
        let mut tail = String::new();
        while let Some(definition) = self.pending.pop_front() {
            tail.push_str(&definition);
        }

        let mut output = format!("; module '{}'\n", module.name);
        for declaration in &self.externals {
            output.push_str(declaration);
            output.push('\n');
        }
        for constant in &self.string_pool {
            output.push_str(constant);
            output.push('\n');
        }
        output.push('\n');
        if !self.structs.is_empty() {
            output.push_str(&self.structs);
            output.push('\n');
        }
        output.push_str(&self.out);
        output.push_str(&tail);

        Ok(output)
    }

    fn declare_record(
        &mut self,
        name: &str,
        fields: &[crate::ast::Field],
        entity: bool,
        location: &Location,
    ) -> CodegenResult<()> {
        let mut ir_fields = Vec::with_capacity(fields.len());
        let mut table = Vec::with_capacity(fields.len());
        for field in fields {
            let ty = self.types.map(&field.type_name, location)?;
            ir_fields.push(ty.text);
            table.push((field.name.clone(), field.type_name.clone()));
        }
        self.structs
            .push_str(&format!("%{name} = type {{ {} }}\n", ir_fields.join(", ")));
        if entity {
            self.symbols.add_entity(name, table);
        } else {
            self.symbols.add_record(name, table);
        }
        Ok(())
    }

    pub(crate) fn register_function(&mut self, function: &FunctionDef) -> CodegenResult<()> {
        let return_type = match function.return_type.as_deref() {
            None | Some("none") => None,
            Some(name) => Some(self.map_source(name, &function.location)?),
        };
        self.symbols.add_function(&function.name, return_type);
        Ok(())
    }

    /// Lower one function definition into the output stream. Saves and
    /// restores the per-function state around the body, so a generic
    /// instantiation triggered mid-expression can lower a whole other
    /// function and hand control back.
    pub(crate) fn emit_function(&mut self, function: &FunctionDef) -> CodegenResult<()> {
        debug!("lowering function '{}'", function.name);

        let saved_temps = self.temps.save();
        let saved_return = self.current_return.take();
        let saved_self = self.current_self.take();
        let saved_loops = std::mem::take(&mut self.loop_stack);
        let saved_locks = std::mem::take(&mut self.lock_stack);
        let snapshot = self.symbols.snapshot();

        self.temps.reset();
        let result = self.emit_function_body(function);

        self.symbols.restore(snapshot);
        self.temps.restore(saved_temps);
        self.current_return = saved_return;
        self.current_self = saved_self;
        self.loop_stack = saved_loops;
        self.lock_stack = saved_locks;

        result
    }

    fn emit_function_body(&mut self, function: &FunctionDef) -> CodegenResult<()> {
        let return_type = match function.return_type.as_deref() {
            None | Some("none") => None,
            Some(name) => Some(self.map_source(name, &function.location)?),
        };
        let return_text = return_type
            .as_ref()
            .map_or("void", |ty| ty.text.as_str())
            .to_owned();

        self.symbols.push_frame();
        let mut params = Vec::with_capacity(function.params.len());
        for param in &function.params {
            let ty = self.map_source(&param.type_name, &param.location)?;
            params.push(format!("{} %{}", ty.text, param.name));
            self.temp_types.insert(format!("%{}", param.name), ty.clone());
            self.symbols.bind_parameter(&param.name, ty);
        }

        self.current_return = return_type;
        self.current_self = function
            .params
            .first()
            .filter(|param| param.name == "self")
            .map(|_| "%self".to_owned());

        let symbol = symbol_name(&function.name);
        self.raw(&format!(
            "define {return_text} @{symbol}({}) {{\n",
            params.join(", ")
        ));

        let mut terminated = false;
        for statement in &function.body {
            if terminated {
                debug!("skipping unreachable statement in '{}'", function.name);
                break;
            }
            terminated = self.emit_statement(statement)?;
        }
        if !terminated {
            if self.current_return.is_none() {
                self.emit_stack_pop();
                self.line("ret void");
            } else {
                // the analyzer guarantees a return on every path
                self.line("unreachable");
            }
        }

        self.raw("}\n\n");
        self.symbols.pop_frame();
        Ok(())
    }

    pub(crate) fn emit_stack_pop(&mut self) {
        if self.stack_traces {
            self.declare(
                "razorforge_stack_pop",
                "declare void @razorforge_stack_pop()",
            );
            self.line("call void @razorforge_stack_pop()");
        }
    }

    // -- low-level emission helpers -------------------------------------

    pub(crate) fn raw(&mut self, text: &str) {
        self.out.push_str(text);
    }

    pub(crate) fn line(&mut self, text: impl AsRef<str>) {
        self.out.push_str("  ");
        self.out.push_str(text.as_ref());
        self.out.push('\n');
    }

    pub(crate) fn label(&mut self, label: &str) {
        self.out.push_str(label);
        self.out.push_str(":\n");
        self.temps.set_current_label(label);
    }

    pub(crate) fn comment(&mut self, text: impl AsRef<str>) {
        self.out.push_str("  ; ");
        self.out.push_str(text.as_ref());
        self.out.push('\n');
    }

    /// New temp with its type recorded before anything can consume it.
    pub(crate) fn fresh_temp(&mut self, ty: &IrType) -> String {
        let name = self.temps.next_temp();
        self.temp_types.insert(name.clone(), ty.clone());
        name
    }

    /// Type of a previously produced temp. A miss is a lowering bug and
    /// always fatal, never defaulted.
    pub(crate) fn temp_type(&self, name: &str, location: &Location) -> CodegenResult<IrType> {
        self.temp_types
            .get(name)
            .cloned()
            .ok_or_else(|| CodegenError::unresolved(name, "consuming an operand", location))
    }

    /// Add an external declaration once per module.
    pub(crate) fn declare(&mut self, symbol: &str, declaration: &str) {
        if self.declared.insert(symbol.to_owned()) {
            self.externals.push(declaration.to_owned());
        }
    }

    /// Declare a math-runtime symbol by name.
    pub(crate) fn declare_math(&mut self, symbol: &str) {
        if let Some(declaration) = MathRuntimeBinder::declaration(symbol) {
            self.declare(symbol, &declaration);
        }
    }

    /// Intern a text literal in the module string pool.
    pub(crate) fn intern_string(&mut self, text: &str) -> String {
        let name = format!("@.str.{}", self.string_count);
        self.string_count += 1;

        let mut encoded = String::with_capacity(text.len() + 3);
        let mut bytes = 0usize;
        for byte in text.bytes() {
            bytes += 1;
            match byte {
                b'"' | b'\\' => encoded.push_str(&format!("\\{byte:02X}")),
                0x20..=0x7e => encoded.push(byte as char),
                _ => encoded.push_str(&format!("\\{byte:02X}")),
            }
        }
        encoded.push_str("\\00");
        bytes += 1;

        self.string_pool.push(format!(
            "{name} = private unnamed_addr constant [{bytes} x i8] c\"{encoded}\""
        ));
        name
    }

    /// Map a source type name, lowering entity types to pointers (entities
    /// are reference-typed and always handled through their heap pointer).
    pub(crate) fn map_source(&self, source: &str, location: &Location) -> CodegenResult<IrType> {
        let ty = self.types.map(source, location)?;
        if ty.is_record() {
            let base = ty.source.split('<').next().unwrap_or(&ty.source);
            if self.symbols.is_entity(base)
                || self.symbols.generic_entities.contains_key(base)
                || self.symbols.is_entity(&mangle_type(&ty.source))
            {
                return Ok(IrType::new("ptr", false, false, ty.source));
            }
        }
        Ok(ty)
    }

    /// Fold a record-wrapped primitive type back to its underlying
    /// primitive; any other type passes through. Width and arithmetic
    /// queries on wrapped types always go through the underlying field.
    pub(crate) fn fold_wrapped(&self, ty: IrType, location: &Location) -> CodegenResult<IrType> {
        if !ty.is_record() {
            return Ok(ty);
        }
        match self.symbols.wrapped_primitive(&ty.source) {
            Some(primitive) => self.types.map(primitive, location),
            None => Ok(ty),
        }
    }

    /// Byte size of an IR type; records are the sum of their field sizes.
    pub(crate) fn size_of(&self, ty: &IrType, location: &Location) -> CodegenResult<u64> {
        if let Some(size) = self.types.size_bytes(&ty.text) {
            return Ok(size);
        }
        if ty.is_record() {
            if let Some(fields) = self.symbols.record_fields(&ty.source) {
                let mut total = 0;
                for (_, field_type) in fields.clone() {
                    let field = self.types.map(&field_type, location)?;
                    total += self.size_of(&field, location)?;
                }
                return Ok(total);
            }
        }
        Err(CodegenError::unresolved(
            &ty.source,
            "querying a byte size",
            location,
        ))
    }

    pub(crate) fn align_of(&self, ty: &IrType, location: &Location) -> CodegenResult<u64> {
        if let Some(alignment) = self.types.alignment(&ty.text) {
            return Ok(alignment);
        }
        if ty.is_record() {
            if let Some(fields) = self.symbols.record_fields(&ty.source) {
                let mut largest = 1;
                for (_, field_type) in fields.clone() {
                    let field = self.types.map(&field_type, location)?;
                    largest = largest.max(self.align_of(&field, location)?);
                }
                return Ok(largest);
            }
        }
        Err(CodegenError::unresolved(
            &ty.source,
            "querying an alignment",
            location,
        ))
    }

    /// Unwrap a record-wrapped primitive to its underlying field value.
    /// Values of any other type pass through untouched.
    pub(crate) fn unwrap_primitive(
        &mut self,
        value: Value,
        location: &Location,
    ) -> CodegenResult<Value> {
        if !value.ty.is_record() {
            return Ok(value);
        }
        let Some(primitive) = self.symbols.wrapped_primitive(&value.ty.source).map(str::to_owned)
        else {
            return Ok(value);
        };
        let underlying = self.types.map(&primitive, location)?;
        let temp = self.fresh_temp(&underlying);
        self.line(format!(
            "{temp} = extractvalue {} {}, 0",
            value.ty.text, value.repr
        ));
        Ok(Value::new(temp, underlying))
    }

    /// Wrap a primitive value back into its single-field record form.
    pub(crate) fn rewrap_primitive(&mut self, value: Value, record: &IrType) -> Value {
        let temp = self.fresh_temp(record);
        self.line(format!(
            "{temp} = insertvalue {} undef, {} {}, 0",
            record.text, value.ty.text, value.repr
        ));
        Value::new(temp, record.clone())
    }

    /// Convert a primitive value to another primitive type, choosing the
    /// opcode from the type mapper.
    pub(crate) fn convert(
        &mut self,
        value: Value,
        target: &IrType,
        location: &Location,
    ) -> CodegenResult<Value> {
        if value.ty.text == target.text {
            return Ok(Value::new(value.repr, target.clone()));
        }
        let opcode = self.types.conversion_op(&value.ty, target).ok_or_else(|| {
            CodegenError::unresolved(
                &target.source,
                format!("converting from '{}'", value.ty.source),
                location,
            )
        })?;
        let temp = self.fresh_temp(target);
        self.line(format!(
            "{temp} = {opcode} {} {} to {}",
            value.ty.text, value.repr, target.text
        ));
        Ok(Value::new(temp, target.clone()))
    }

    /// Make sure a value is addressable, spilling temps to a fresh alloca.
    pub(crate) fn spill_to_pointer(
        &mut self,
        value: &Value,
        location: &Location,
    ) -> CodegenResult<String> {
        if value.ty.is_pointer() {
            return Ok(value.repr.clone());
        }
        let _ = location;
        let pointer = IrType::new("ptr", false, false, value.ty.source.clone());
        let slot = self.fresh_temp(&pointer);
        self.line(format!("{slot} = alloca {}", value.ty.text));
        self.line(format!(
            "store {} {}, ptr {slot}",
            value.ty.text, value.repr
        ));
        Ok(slot)
    }

    /// Append a struct type declaration (used by generic instantiation).
    pub(crate) fn push_struct(&mut self, declaration: &str) {
        self.structs.push_str(declaration);
        self.structs.push('\n');
    }
}

/// IR symbol for a source-level function name; method names arrive dotted
/// (`Celsius.to_fahrenheit`) and flatten to `Celsius_to_fahrenheit`.
pub(crate) fn symbol_name(name: &str) -> String {
    name.replace('.', "_")
}
