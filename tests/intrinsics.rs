use razorforge::ast::*;
use razorforge::codegen::{Emitter, Language, Platform, PointerWidth};
use test_utils::{assert_absent, count_occurrences, init_logging, ExpectedIr};

fn loc() -> Location {
    Location::default()
}

fn ident(name: &str) -> Expression {
    Expression::Identifier(Identifier {
        name: name.to_owned(),
        location: loc(),
        info: None,
    })
}

fn intrinsic(name: &str, type_args: &[&str], args: Vec<Expression>) -> Expression {
    Expression::IntrinsicCall(IntrinsicCall {
        name: name.to_owned(),
        type_args: type_args.iter().map(|s| (*s).to_owned()).collect(),
        args,
        location: loc(),
        info: None,
    })
}

fn ret(value: Expression) -> Statement {
    Statement::Return(Return {
        value: Some(value),
        location: loc(),
    })
}

fn expr_stmt(expression: Expression) -> Statement {
    Statement::Expression(ExpressionStatement {
        expression,
        location: loc(),
    })
}

fn function(name: &str, params: Vec<Param>, return_type: Option<&str>, body: Vec<Statement>) -> Item {
    Item::Function(FunctionDef {
        name: name.to_owned(),
        type_params: vec![],
        params,
        return_type: return_type.map(str::to_owned),
        body,
        location: loc(),
    })
}

fn emit(items: Vec<Item>) -> String {
    init_logging();
    let mut emitter = Emitter::new(Platform::bits64(), Language::RazorForge);
    emitter
        .emit_module(&Module::from_items("intrinsics", items))
        .expect("should lower")
}

#[test]
fn sizeof_lowers_to_a_table_constant() {
    let ir = emit(vec![function(
        "size_f64",
        vec![],
        Some("uaddr"),
        vec![ret(intrinsic("sizeof", &["f64"], vec![]))],
    )]);
    ExpectedIr {
        in_order: &["%t0 = add i64 0, 8", "ret i64 %t0"],
    }
    .assert_matches(&ir);
}

#[test]
fn alignof_uses_the_alignment_table() {
    let ir = emit(vec![
        function(
            "align_s128",
            vec![],
            Some("uaddr"),
            vec![ret(intrinsic("alignof", &["s128"], vec![]))],
        ),
        function(
            "align_d128",
            vec![],
            Some("uaddr"),
            vec![ret(intrinsic("alignof", &["d128"], vec![]))],
        ),
    ]);
    assert!(ir.contains("add i64 0, 16"));
    assert!(ir.contains("add i64 0, 8"));
}

#[test]
fn sizeof_respects_pointer_width() {
    init_logging();
    let module = Module::from_items(
        "intrinsics",
        vec![function(
            "size_ptr",
            vec![],
            Some("uaddr"),
            vec![ret(intrinsic("sizeof", &["text"], vec![]))],
        )],
    );
    let mut emitter = Emitter::new(Platform::bits32(), Language::RazorForge);
    let ir = emitter.emit_module(&module).expect("should lower");
    assert!(ir.contains("%t0 = add i32 0, 4"));
    assert_eq!(
        Platform::bits32().pointer_width,
        PointerWidth::Bits32
    );
}

#[test]
fn missing_type_argument_is_fatal() {
    init_logging();
    let module = Module::from_items(
        "intrinsics",
        vec![function(
            "bad",
            vec![Param::new("a", "s32"), Param::new("b", "s32")],
            Some("s32"),
            vec![ret(intrinsic("add", &[], vec![ident("a"), ident("b")]))],
        )],
    );
    let mut emitter = Emitter::new(Platform::bits64(), Language::RazorForge);
    assert!(emitter.emit_module(&module).is_err());
}

#[test]
fn atomic_operations_are_all_seq_cst() {
    let ir = emit(vec![function(
        "atomics",
        vec![Param::new("p", "s64*"), Param::new("v", "s64")],
        Some("s64"),
        vec![
            expr_stmt(intrinsic("atomic.store", &["s64"], vec![ident("p"), ident("v")])),
            expr_stmt(intrinsic("atomic.add", &["s64"], vec![ident("p"), ident("v")])),
            expr_stmt(intrinsic("atomic.xchg", &["s64"], vec![ident("p"), ident("v")])),
            expr_stmt(intrinsic(
                "atomic.cmpxchg",
                &["s64"],
                vec![ident("p"), ident("v"), ident("v")],
            )),
            ret(intrinsic("atomic.load", &["s64"], vec![ident("p")])),
        ],
    )]);

    ExpectedIr {
        in_order: &[
            "store atomic i64 %v, ptr %p seq_cst, align 8",
            "atomicrmw add ptr %p, i64 %v seq_cst",
            "atomicrmw xchg ptr %p, i64 %v seq_cst",
            "cmpxchg ptr %p, i64 %v, i64 %v seq_cst seq_cst",
            "load atomic i64, ptr %p seq_cst, align 8",
        ],
    }
    .assert_matches(&ir);

    // no other memory ordering sneaks in
    assert_absent(&ir, "acquire");
    assert_absent(&ir, "release");
    assert_absent(&ir, "monotonic");
    assert_eq!(count_occurrences(&ir, "seq_cst"), 6);
}

#[test]
fn comparison_intrinsics_pass_the_predicate_through() {
    let ir = emit(vec![function(
        "cmps",
        vec![Param::new("a", "s32"), Param::new("b", "s32")],
        Some("bool"),
        vec![ret(intrinsic("icmp.slt", &["s32"], vec![ident("a"), ident("b")]))],
    )]);
    assert!(ir.contains("%t0 = icmp slt i32 %a, %b"));
    assert!(ir.contains("ret i1 %t0"));
}

#[test]
fn conversion_intrinsics_take_two_type_args() {
    let ir = emit(vec![function(
        "widen",
        vec![Param::new("x", "u8")],
        Some("u64"),
        vec![ret(intrinsic("zext", &["u8", "u64"], vec![ident("x")]))],
    )]);
    assert!(ir.contains("%t0 = zext i8 %x to i64"));
}

#[test]
fn math_intrinsics_dispatch_to_llvm_library_calls() {
    let ir = emit(vec![
        function(
            "root",
            vec![Param::new("x", "f64")],
            Some("f64"),
            vec![ret(intrinsic("sqrt", &["f64"], vec![ident("x")]))],
        ),
        function(
            "raise",
            vec![Param::new("x", "f32"), Param::new("y", "f32")],
            Some("f32"),
            vec![ret(intrinsic("pow", &["f32"], vec![ident("x"), ident("y")]))],
        ),
        function(
            "chop",
            vec![Param::new("x", "f64")],
            Some("f64"),
            vec![ret(intrinsic("trunc_float", &["f64"], vec![ident("x")]))],
        ),
    ]);
    assert!(ir.contains("declare double @llvm.sqrt.f64(double)"));
    assert!(ir.contains("%t0 = call double @llvm.sqrt.f64(double %x)"));
    assert!(ir.contains("call float @llvm.pow.f32(float %x, float %y)"));
    assert!(ir.contains("call double @llvm.trunc.f64(double %x)"));
}

#[test]
fn abs_is_poison_safe() {
    let ir = emit(vec![function(
        "mag",
        vec![Param::new("x", "s32")],
        Some("s32"),
        vec![ret(intrinsic("abs", &["s32"], vec![ident("x")]))],
    )]);
    assert!(ir.contains("call i32 @llvm.abs.i32(i32 %x, i1 false)"));
}

#[test]
fn bit_manipulation_intrinsics() {
    let ir = emit(vec![
        function(
            "pop",
            vec![Param::new("x", "u64")],
            Some("u64"),
            vec![ret(intrinsic("ctpop", &["u64"], vec![ident("x")]))],
        ),
        function(
            "lead",
            vec![Param::new("x", "u32")],
            Some("u32"),
            vec![ret(intrinsic("ctlz", &["u32"], vec![ident("x")]))],
        ),
        function(
            "swap",
            vec![Param::new("x", "u16")],
            Some("u16"),
            vec![ret(intrinsic("bswap", &["u16"], vec![ident("x")]))],
        ),
    ]);
    assert!(ir.contains("call i64 @llvm.ctpop.i64(i64 %x)"));
    assert!(ir.contains("call i32 @llvm.ctlz.i32(i32 %x, i1 false)"));
    assert!(ir.contains("call i16 @llvm.bswap.i16(i16 %x)"));
}

#[test]
fn bitwise_intrinsics_emit_plain_ops() {
    let ir = emit(vec![
        function(
            "mask",
            vec![Param::new("a", "u32"), Param::new("b", "u32")],
            Some("u32"),
            vec![ret(intrinsic("and", &["u32"], vec![ident("a"), ident("b")]))],
        ),
        function(
            "flip",
            vec![Param::new("a", "u32")],
            Some("u32"),
            vec![ret(intrinsic("not", &["u32"], vec![ident("a")]))],
        ),
        function(
            "shift",
            vec![Param::new("a", "u32"), Param::new("b", "u32")],
            Some("u32"),
            vec![ret(intrinsic("lshr", &["u32"], vec![ident("a"), ident("b")]))],
        ),
    ]);
    assert!(ir.contains("and i32 %a, %b"));
    assert!(ir.contains("xor i32 %a, -1"));
    assert!(ir.contains("lshr i32 %a, %b"));
}

#[test]
fn volatile_memory_access() {
    let ir = emit(vec![function(
        "poke",
        vec![Param::new("p", "s32*"), Param::new("v", "s32")],
        Some("s32"),
        vec![
            expr_stmt(intrinsic(
                "volatile_store",
                &["s32"],
                vec![ident("p"), ident("v")],
            )),
            ret(intrinsic("volatile_load", &["s32"], vec![ident("p")])),
        ],
    )]);
    assert!(ir.contains("store volatile i32 %v, ptr %p"));
    assert!(ir.contains("load volatile i32, ptr %p"));
}

#[test]
fn value_bitcast_round_trips_through_a_stack_slot() {
    let ir = emit(vec![function(
        "punning",
        vec![Param::new("x", "f64")],
        Some("s64"),
        vec![ret(intrinsic("bitcast", &["f64", "s64"], vec![ident("x")]))],
    )]);
    ExpectedIr {
        in_order: &[
            "%t0 = alloca double",
            "store double %x, ptr %t0",
            "%t1 = load i64, ptr %t0",
            "ret i64 %t1",
        ],
    }
    .assert_matches(&ir);
}

#[test]
fn value_bitcast_requires_equal_sizes() {
    init_logging();
    let module = Module::from_items(
        "intrinsics",
        vec![function(
            "bad",
            vec![Param::new("x", "f64")],
            Some("s32"),
            vec![ret(intrinsic("bitcast", &["f64", "s32"], vec![ident("x")]))],
        )],
    );
    let mut emitter = Emitter::new(Platform::bits64(), Language::RazorForge);
    assert!(emitter.emit_module(&module).is_err());
}

#[test]
fn invalidate_calls_free() {
    let ir = emit(vec![function(
        "drop_it",
        vec![Param::new("p", "text")],
        None,
        vec![expr_stmt(intrinsic("invalidate", &["text"], vec![ident("p")]))],
    )]);
    assert!(ir.contains("declare void @free(ptr)"));
    assert!(ir.contains("call void @free(ptr %p)"));
}
