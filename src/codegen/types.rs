use std::collections::HashMap;

use once_cell::sync::Lazy;

use crate::ast::Location;

use super::error::{CodegenError, CodegenResult};
use super::platform::Platform;

/// An IR type together with the classification the IR itself cannot carry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IrType {
    /// Textual IR type (`i32`, `double`, `ptr`, `{i64,i64}`, `%Celsius`).
    pub text: String,
    /// IR integers are signless; we remember the source-level signedness.
    pub is_unsigned: bool,
    pub is_float: bool,
    /// Source-level type name, kept for diagnostics and method lookup.
    pub source: String,
}

impl IrType {
    pub fn new(
        text: impl ToString,
        is_unsigned: bool,
        is_float: bool,
        source: impl ToString,
    ) -> Self {
        Self {
            text: text.to_string(),
            is_unsigned,
            is_float,
            source: source.to_string(),
        }
    }

    pub fn void() -> Self {
        Self::new("void", false, false, "void")
    }

    pub fn bool() -> Self {
        Self::new("i1", false, false, "bool")
    }

    pub fn is_void(&self) -> bool {
        self.text == "void"
    }

    pub fn is_pointer(&self) -> bool {
        self.text == "ptr" || self.text.ends_with('*')
    }

    pub fn is_record(&self) -> bool {
        self.text.starts_with('%')
    }

    pub fn is_aggregate(&self) -> bool {
        self.text.starts_with('{')
    }
}

/// An operand produced by expression lowering: a temp name, immediate or
/// global symbol plus its IR type. An empty repr denotes void.
#[derive(Debug, Clone, PartialEq)]
pub struct Value {
    pub repr: String,
    pub ty: IrType,
}

impl Value {
    pub fn new(repr: impl ToString, ty: IrType) -> Self {
        Self {
            repr: repr.to_string(),
            ty,
        }
    }

    pub fn void() -> Self {
        Self {
            repr: String::new(),
            ty: IrType::void(),
        }
    }

    pub fn is_void(&self) -> bool {
        self.repr.is_empty()
    }
}

/// (ir text, is_unsigned, is_float) for every fixed-width source primitive.
static PRIMITIVES: Lazy<HashMap<&'static str, (&'static str, bool, bool)>> = Lazy::new(|| {
    HashMap::from([
        ("s8", ("i8", false, false)),
        ("s16", ("i16", false, false)),
        ("s32", ("i32", false, false)),
        ("s64", ("i64", false, false)),
        ("s128", ("i128", false, false)),
        ("u8", ("i8", true, false)),
        ("u16", ("i16", true, false)),
        ("u32", ("i32", true, false)),
        ("u64", ("i64", true, false)),
        ("u128", ("i128", true, false)),
        ("f16", ("half", false, true)),
        ("f32", ("float", false, true)),
        ("f64", ("double", false, true)),
        ("f128", ("fp128", false, true)),
        ("bool", ("i1", false, false)),
        // decimal floats lower to integer bit buckets, arithmetic goes
        // through libdfp
        ("d32", ("i32", false, true)),
        ("d64", ("i64", false, true)),
        ("d128", ("{i64,i64}", false, true)),
        // arbitrary precision handles
        ("bigint", ("i8*", false, false)),
        ("decimal", ("i8*", false, true)),
        ("letter", ("i32", true, false)),
        ("letter8", ("i8", true, false)),
        ("letter16", ("i16", true, false)),
        ("text", ("ptr", false, false)),
        ("none", ("void", false, false)),
    ])
});

/// Generic bases that lower to a raw pointer instead of a named struct.
const POINTER_GENERICS: [&str; 4] = ["Ptr", "MutPtr", "Text", "Shared"];

/// Flatten a (possibly nested) generic source type into its mangled IR
/// identifier: `Range<BackIndex<uaddr>>` becomes `Range_BackIndex_uaddr`.
pub fn mangle_type(name: &str) -> String {
    let mut mangled = String::with_capacity(name.len());
    for ch in name.chars() {
        match ch {
            '<' | ',' => mangled.push('_'),
            '>' | ' ' => {}
            _ => mangled.push(ch),
        }
    }
    mangled
}

/// Canonicalizes source-level type names into IR types and answers width,
/// size and conversion questions about them.
#[derive(Debug, Clone, Copy)]
pub struct TypeMapper {
    platform: Platform,
}

impl TypeMapper {
    pub fn new(platform: Platform) -> Self {
        Self { platform }
    }

    /// Map a source type name to its IR type. Every name the semantic
    /// analyzer can produce maps successfully; anything else is fatal.
    pub fn map(&self, source: &str, location: &Location) -> CodegenResult<IrType> {
        let source = source.trim();

        // record-wrapped primitive handles keep their struct name
        if let Some(name) = source.strip_prefix('%') {
            return Ok(IrType::new(source, false, false, name));
        }

        if let Some((ir, unsigned, float)) = PRIMITIVES.get(source) {
            return Ok(IrType::new(*ir, *unsigned, *float, source));
        }

        match source {
            "isys" | "saddr" => {
                return Ok(IrType::new(self.platform.pointer_int(), false, false, source))
            }
            "usys" | "uaddr" => {
                return Ok(IrType::new(self.platform.pointer_int(), true, false, source))
            }
            _ => {}
        }

        if source.ends_with('*') {
            return Ok(IrType::new("ptr", false, false, source));
        }

        if let Some(base) = source.split('<').next() {
            if source.contains('<') {
                if POINTER_GENERICS.contains(&base) {
                    return Ok(IrType::new("ptr", false, false, source));
                }
                let mangled = mangle_type(source);
                return Ok(IrType::new(format!("%{mangled}"), false, false, source));
            }
        }

        // nominal record/entity types are capitalized in both languages
        if source.chars().next().is_some_and(|c| c.is_ascii_uppercase()) {
            return Ok(IrType::new(format!("%{source}"), false, false, source));
        }

        Err(CodegenError::unresolved(source, "mapping a source type", location))
    }

    /// Signedness/float classification of a source type name.
    pub fn classify(&self, source: &str) -> (bool, bool) {
        if let Some((_, unsigned, float)) = PRIMITIVES.get(source) {
            return (*unsigned, *float);
        }
        match source {
            "usys" | "uaddr" => (true, false),
            _ => (false, false),
        }
    }

    /// Bit width of an IR type, if it is one the mapper knows directly.
    /// Record types need their field table and are resolved by the emitter.
    pub fn width_bits(&self, ir: &str) -> Option<u32> {
        match ir {
            "i1" => Some(1),
            "i8" => Some(8),
            "i16" => Some(16),
            "i32" => Some(32),
            "i64" => Some(64),
            "i128" => Some(128),
            "half" => Some(16),
            "float" => Some(32),
            "double" => Some(64),
            "fp128" => Some(128),
            "{i64,i64}" => Some(128),
            "ptr" => Some(self.platform.pointer_bits()),
            _ if ir.ends_with('*') => Some(self.platform.pointer_bits()),
            _ => None,
        }
    }

    fn is_float_ir(ir: &str) -> bool {
        matches!(ir, "half" | "float" | "double" | "fp128")
    }

    /// Select the conversion opcode between two mapped types. `None` when a
    /// record type is involved; those are unwrapped before conversion.
    pub fn conversion_op(&self, from: &IrType, to: &IrType) -> Option<&'static str> {
        let from_float = Self::is_float_ir(&from.text);
        let to_float = Self::is_float_ir(&to.text);
        let from_ptr = from.is_pointer();
        let to_ptr = to.is_pointer();

        if from_ptr && to_ptr {
            return Some("bitcast");
        }
        if from_ptr {
            return Some("ptrtoint");
        }
        if to_ptr {
            return Some("inttoptr");
        }

        let from_width = self.width_bits(&from.text)?;
        let to_width = self.width_bits(&to.text)?;

        Some(match (from_float, to_float) {
            (true, true) => match from_width.cmp(&to_width) {
                std::cmp::Ordering::Less => "fpext",
                std::cmp::Ordering::Greater => "fptrunc",
                std::cmp::Ordering::Equal => "bitcast",
            },
            (true, false) => {
                if to.is_unsigned {
                    "fptoui"
                } else {
                    "fptosi"
                }
            }
            (false, true) => {
                if from.is_unsigned {
                    "uitofp"
                } else {
                    "sitofp"
                }
            }
            (false, false) => match from_width.cmp(&to_width) {
                std::cmp::Ordering::Less => {
                    if from.is_unsigned {
                        "zext"
                    } else {
                        "sext"
                    }
                }
                std::cmp::Ordering::Greater => "trunc",
                std::cmp::Ordering::Equal => "bitcast",
            },
        })
    }

    pub fn size_bytes(&self, ir: &str) -> Option<u64> {
        match ir {
            "i1" | "i8" => Some(1),
            "i16" | "half" => Some(2),
            "i32" | "float" => Some(4),
            "i64" | "double" => Some(8),
            "i128" | "fp128" => Some(16),
            "{i64,i64}" => Some(16),
            "ptr" => Some(self.platform.pointer_bytes()),
            _ if ir.ends_with('*') => Some(self.platform.pointer_bytes()),
            _ => None,
        }
    }

    pub fn alignment(&self, ir: &str) -> Option<u64> {
        match ir {
            "i1" | "i8" => Some(1),
            "i16" | "half" => Some(2),
            "i32" | "float" => Some(4),
            "i64" | "double" => Some(8),
            "i128" | "fp128" => Some(16),
            "{i64,i64}" => Some(8),
            "ptr" => Some(self.platform.pointer_bytes()),
            _ if ir.ends_with('*') => Some(self.platform.pointer_bytes()),
            _ => None,
        }
    }
}

/// Suffix used by `llvm.*` intrinsic names for a float IR type.
pub fn float_suffix(ir: &str) -> Option<&'static str> {
    match ir {
        "half" => Some("f16"),
        "float" => Some("f32"),
        "double" => Some("f64"),
        "fp128" => Some("f128"),
        _ => None,
    }
}
