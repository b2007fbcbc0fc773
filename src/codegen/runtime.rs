use std::collections::HashMap;

use once_cell::sync::Lazy;

use crate::ast::BinaryOperator;

/// Numeric families whose arithmetic is carried out by an external math
/// runtime instead of native IR instructions.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MathFamily {
    /// libdfp decimal floats, passed by value as integer bit buckets.
    D32,
    D64,
    D128,
    /// libbf arbitrary-precision integers, passed as `i8*` handles.
    BigInt,
    /// mafm arbitrary-precision decimals, passed as `i8*` handles.
    Decimal,
}

impl MathFamily {
    pub fn of(source: &str) -> Option<MathFamily> {
        match source {
            "d32" => Some(MathFamily::D32),
            "d64" => Some(MathFamily::D64),
            "d128" => Some(MathFamily::D128),
            "bigint" => Some(MathFamily::BigInt),
            "decimal" => Some(MathFamily::Decimal),
            _ => None,
        }
    }

    /// Symbol prefix of the runtime carrying this family.
    pub fn prefix(&self) -> &'static str {
        match self {
            MathFamily::D32 => "d32",
            MathFamily::D64 => "d64",
            MathFamily::D128 => "d128",
            MathFamily::BigInt => "bf",
            MathFamily::Decimal => "mafm",
        }
    }

    /// IR type the runtime passes values of this family as.
    pub fn value_type(&self) -> &'static str {
        match self {
            MathFamily::D32 => "i32",
            MathFamily::D64 => "i64",
            MathFamily::D128 => "{i64,i64}",
            MathFamily::BigInt | MathFamily::Decimal => "i8*",
        }
    }

    /// Handle families allocate a result number per operation; the libdfp
    /// families return results by value.
    pub fn is_handle(&self) -> bool {
        matches!(self, MathFamily::BigInt | MathFamily::Decimal)
    }

    pub fn alloc_symbol(&self) -> &'static str {
        match self {
            MathFamily::BigInt => "bf_alloc_number",
            MathFamily::Decimal => "mafm_alloc_number",
            _ => "",
        }
    }

    pub fn init_symbol(&self) -> &'static str {
        match self {
            MathFamily::BigInt => "bf_init",
            MathFamily::Decimal => "mafm_init",
            _ => "",
        }
    }
}

/// Fixed declarations of the libbf and mafm entry points.
static HANDLE_RUNTIME_DECLS: Lazy<HashMap<&'static str, &'static str>> = Lazy::new(|| {
    HashMap::from([
        ("bf_context_new", "declare i8* @bf_context_new()"),
        ("bf_init", "declare void @bf_init(i8*)"),
        ("bf_delete", "declare void @bf_delete(i8*)"),
        ("bf_set_si", "declare void @bf_set_si(i8*, i64)"),
        ("bf_set_ui", "declare void @bf_set_ui(i8*, i64)"),
        ("bf_add", "declare i32 @bf_add(i8*, i8*, i8*)"),
        ("bf_sub", "declare i32 @bf_sub(i8*, i8*, i8*)"),
        ("bf_mul", "declare i32 @bf_mul(i8*, i8*, i8*)"),
        ("bf_div", "declare i32 @bf_div(i8*, i8*, i8*)"),
        ("bf_cmp", "declare i32 @bf_cmp(i8*, i8*)"),
        ("bf_ftoa", "declare ptr @bf_ftoa(i8*)"),
        ("bf_alloc_number", "declare i8* @bf_alloc_number()"),
        ("bf_free_number", "declare void @bf_free_number(i8*)"),
        ("mafm_context_new", "declare i8* @mafm_context_new()"),
        ("mafm_init", "declare void @mafm_init(i8*)"),
        ("mafm_clear", "declare void @mafm_clear(i8*)"),
        ("mafm_set_str", "declare i32 @mafm_set_str(i8*, ptr)"),
        ("mafm_get_str", "declare ptr @mafm_get_str(i8*)"),
        ("mafm_add", "declare i32 @mafm_add(i8*, i8*, i8*)"),
        ("mafm_sub", "declare i32 @mafm_sub(i8*, i8*, i8*)"),
        ("mafm_mul", "declare i32 @mafm_mul(i8*, i8*, i8*)"),
        ("mafm_div", "declare i32 @mafm_div(i8*, i8*, i8*)"),
        ("mafm_cmp", "declare i32 @mafm_cmp(i8*, i8*)"),
        ("mafm_set_si", "declare void @mafm_set_si(i8*, i64)"),
        ("mafm_set_d", "declare void @mafm_set_d(i8*, double)"),
        ("mafm_get_si", "declare i64 @mafm_get_si(i8*)"),
        ("mafm_get_d", "declare double @mafm_get_d(i8*)"),
        ("mafm_alloc_number", "declare i8* @mafm_alloc_number()"),
    ])
});

/// Declares external math-runtime symbols and names the entry point for a
/// binary operation. One table answers every `(family, operator)` query.
pub struct MathRuntimeBinder;

impl MathRuntimeBinder {
    /// Runtime entry point implementing `op` for `family`. Comparisons all
    /// share the family's `cmp` symbol; the caller tests its result against
    /// zero.
    pub fn op_symbol(family: MathFamily, op: BinaryOperator) -> Option<String> {
        let name = match op {
            BinaryOperator::Add => "add",
            BinaryOperator::Sub => "sub",
            BinaryOperator::Mul => "mul",
            BinaryOperator::Div => "div",
            _ if op.is_comparison() => "cmp",
            _ => return None,
        };
        Some(format!("{}_{name}", family.prefix()))
    }

    /// The `declare` line for a math-runtime symbol, if it is one.
    pub fn declaration(symbol: &str) -> Option<String> {
        if let Some(decl) = HANDLE_RUNTIME_DECLS.get(symbol) {
            return Some((*decl).to_owned());
        }

        // libdfp symbols follow one scheme per width
        let (prefix, rest) = symbol.split_once('_')?;
        let family = MathFamily::of(prefix)?;
        let value = family.value_type();
        match rest {
            "add" | "sub" | "mul" | "div" => {
                Some(format!("declare {value} @{symbol}({value}, {value})"))
            }
            "cmp" => Some(format!("declare i32 @{symbol}({value}, {value})")),
            "from_string" => Some(format!("declare {value} @{symbol}(ptr)")),
            "to_string" => Some(format!("declare ptr @{symbol}({value})")),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use crate::ast::BinaryOperator;

    use super::{MathFamily, MathRuntimeBinder};

    #[test]
    fn test_op_symbols_cover_the_widths() {
        assert_eq!(
            MathRuntimeBinder::op_symbol(MathFamily::D32, BinaryOperator::Add),
            Some("d32_add".to_owned())
        );
        assert_eq!(
            MathRuntimeBinder::op_symbol(MathFamily::D128, BinaryOperator::Div),
            Some("d128_div".to_owned())
        );
        assert_eq!(
            MathRuntimeBinder::op_symbol(MathFamily::BigInt, BinaryOperator::LessThan),
            Some("bf_cmp".to_owned())
        );
        assert_eq!(
            MathRuntimeBinder::op_symbol(MathFamily::Decimal, BinaryOperator::Mul),
            Some("mafm_mul".to_owned())
        );
        assert_eq!(
            MathRuntimeBinder::op_symbol(MathFamily::D64, BinaryOperator::BitAnd),
            None
        );
    }

    #[test]
    fn test_dfp_declarations_follow_the_width() {
        assert_eq!(
            MathRuntimeBinder::declaration("d64_add").as_deref(),
            Some("declare i64 @d64_add(i64, i64)")
        );
        assert_eq!(
            MathRuntimeBinder::declaration("d128_cmp").as_deref(),
            Some("declare i32 @d128_cmp({i64,i64}, {i64,i64})")
        );
        assert_eq!(
            MathRuntimeBinder::declaration("d32_from_string").as_deref(),
            Some("declare i32 @d32_from_string(ptr)")
        );
    }

    #[test]
    fn test_handle_runtime_declarations() {
        assert_eq!(
            MathRuntimeBinder::declaration("bf_alloc_number").as_deref(),
            Some("declare i8* @bf_alloc_number()")
        );
        assert_eq!(
            MathRuntimeBinder::declaration("mafm_set_str").as_deref(),
            Some("declare i32 @mafm_set_str(i8*, ptr)")
        );
        assert!(MathRuntimeBinder::declaration("printf").is_none());
    }
}
