//! End-to-end reconciliation tests
//!
//! These tests drive whole method bodies through the translator and check
//! the rebuilt trees, phi annotations and labels.

use il2c_bytecode::{Address, MethodBody, Module, Opcode};
use il2c_stack::{
    Expr, MethodTranslator, StackError, TranslateOptions, TranslatedMethod, translate_module,
};

fn translate(body: &MethodBody) -> TranslatedMethod {
    MethodTranslator::new().translate(body).unwrap()
}

fn labels(method: &TranslatedMethod) -> Vec<u32> {
    method.labels.iter().map(|a| a.0).collect()
}

/// `return arg0 ? arg1 + 1 : arg2;`
fn select() -> MethodBody {
    MethodBody::builder("select")
        .ldarg(0, 0)
        .jump(1, Opcode::Brfalse, 6)
        .ldarg(2, 1)
        .ldc(3, 1)
        .op(4, Opcode::Add)
        .jump(5, Opcode::Br, 7)
        .ldarg(6, 2)
        .op(7, Opcode::Ret)
        .build()
}

#[test]
fn test_if_else_value_merges() {
    let method = translate(&select());

    assert_eq!(method.statements.len(), 3);
    let ret = &method.statements[2];
    assert_eq!(ret.address, Address(7));
    assert_eq!(ret.labels, vec![Address(6), Address(7)]);
    assert_eq!(
        ret.expr.to_string(),
        "ret(phi[IL_0006: ldarg A_2, IL_0002: add(ldarg A_1, ldc.i4 1)])"
    );
    assert!(ret.expr.contains_phi());

    let phi = &method.phis[&Address(7)];
    assert_eq!(phi.values(), &[Address(6), Address(4)]);
    assert_eq!(phi.labels(), &[Address(6), Address(2)]);
}

#[test]
fn test_synthesized_label_at_expression_start() {
    let method = translate(&select());

    // the then-arm value is a compound expression; its label sits where the
    // expression begins, not at the producing add
    assert_eq!(labels(&method), vec![2, 6, 7]);
    assert_eq!(method.statements[1].labels, vec![Address(2)]);
}

#[test]
fn test_if_then_without_value() {
    // if (arg0) local0 = 1;
    let body = MethodBody::builder("if_then")
        .ldarg(0, 0)
        .jump(1, Opcode::Brfalse, 4)
        .ldc(2, 1)
        .stloc(3, 0)
        .op(4, Opcode::RetVoid)
        .build();
    let method = translate(&body);

    assert_eq!(method.phi_count(), 0);
    assert_eq!(labels(&method), vec![4]);
    let dump: Vec<String> = method.statements.iter().map(|s| s.expr.to_string()).collect();
    assert_eq!(
        dump,
        vec!["brfalse IL_0004(ldarg A_0)", "stloc V_0(ldc.i4 1)", "ret.void"]
    );
}

#[test]
fn test_consecutive_merges() {
    let body = MethodBody::builder("two")
        .ldarg(0, 0)
        .jump(1, Opcode::Brfalse, 4)
        .ldc(2, 10)
        .jump(3, Opcode::Br, 5)
        .ldc(4, 20)
        .stloc(5, 0)
        .ldarg(6, 1)
        .jump(7, Opcode::Brfalse, 10)
        .ldc(8, 30)
        .jump(9, Opcode::Br, 11)
        .ldc(10, 40)
        .stloc(11, 1)
        .op(12, Opcode::RetVoid)
        .build();
    let method = translate(&body);

    assert_eq!(method.phi_count(), 2);
    assert_eq!(method.phis[&Address(5)].labels(), &[Address(4), Address(2)]);
    assert_eq!(method.phis[&Address(11)].labels(), &[Address(10), Address(8)]);
    assert_eq!(labels(&method), vec![2, 4, 5, 8, 10, 11]);
}

#[test]
fn test_nested_arms_share_merge() {
    // if (arg0) { if (arg1) local0 = 1; }
    let body = MethodBody::builder("nested")
        .ldarg(0, 0)
        .jump(1, Opcode::Brfalse, 6)
        .ldarg(2, 1)
        .jump(3, Opcode::Brfalse, 6)
        .ldc(4, 1)
        .stloc(5, 0)
        .op(6, Opcode::RetVoid)
        .build();
    let method = translate(&body);

    assert_eq!(method.phi_count(), 0);
    assert_eq!(labels(&method), vec![6]);
    assert_eq!(method.statements.len(), 4);
}

#[test]
fn test_nested_ternary_keeps_inner_arm() {
    // local0 = arg0 ? (arg1 ? 1 : 2) : 3;
    let body = MethodBody::builder("nested_ternary")
        .ldarg(0, 0)
        .jump(1, Opcode::Brfalse, 8)
        .ldarg(2, 1)
        .jump(3, Opcode::Brfalse, 6)
        .ldc(4, 1)
        .jump(5, Opcode::Br, 7)
        .ldc(6, 2)
        .jump(7, Opcode::Br, 9)
        .ldc(8, 3)
        .stloc(9, 0)
        .op(10, Opcode::RetVoid)
        .build();
    let method = translate(&body);

    assert_eq!(method.phi_count(), 1);
    let phi = &method.phis[&Address(9)];
    assert_eq!(phi.values(), &[Address(6), Address(8), Address(4)]);
    assert_eq!(phi.labels(), &[Address(6), Address(8), Address(4)]);

    let store = &method.statements[4];
    assert_eq!(store.labels, vec![Address(8), Address(9)]);
    assert_eq!(
        store.expr.to_string(),
        "stloc V_0(phi[IL_0006: ldc.i4 2, IL_0008: ldc.i4 3, IL_0004: ldc.i4 1])"
    );
    assert_eq!(labels(&method), vec![4, 6, 7, 8, 9]);
}

#[test]
fn test_else_if_chain_merges_once() {
    // local0 = arg0 ? 1 : (arg1 ? 2 : 3);
    let body = MethodBody::builder("else_if")
        .ldarg(0, 0)
        .jump(1, Opcode::Brfalse, 4)
        .ldc(2, 1)
        .jump(3, Opcode::Br, 9)
        .ldarg(4, 1)
        .jump(5, Opcode::Brfalse, 8)
        .ldc(6, 2)
        .jump(7, Opcode::Br, 9)
        .ldc(8, 3)
        .stloc(9, 0)
        .op(10, Opcode::RetVoid)
        .build();
    let method = translate(&body);

    assert_eq!(method.phi_count(), 1);
    let phi = &method.phis[&Address(9)];
    assert_eq!(phi.values(), &[Address(6), Address(8), Address(2)]);
    assert_eq!(phi.labels(), &[Address(6), Address(8), Address(2)]);
    assert_eq!(labels(&method), vec![2, 4, 6, 8, 9]);
}

#[test]
fn test_ternary_as_second_call_argument() {
    // return f(arg0, arg1 ? 1 : 2);
    let body = MethodBody::builder("call_select")
        .ldarg(0, 0)
        .ldarg(1, 1)
        .jump(2, Opcode::Brfalse, 5)
        .ldc(3, 1)
        .jump(4, Opcode::Br, 6)
        .ldc(5, 2)
        .call(6, 0x0600_0001, 2, true)
        .op(7, Opcode::Ret)
        .build();
    let method = translate(&body);

    assert_eq!(
        method.statements.last().unwrap().expr.to_string(),
        "ret(call M_06000001/2(ldarg A_0, phi[IL_0005: ldc.i4 2, IL_0003: ldc.i4 1]))"
    );
    assert_eq!(method.phis[&Address(6)].values(), &[Address(5), Address(3)]);
}

#[test]
fn test_deep_operand_label_at_group_start() {
    // return arg0 ? (arg1 + 1) * 2 : arg2;
    let body = MethodBody::builder("deep")
        .ldarg(0, 0)
        .jump(1, Opcode::Brfalse, 8)
        .ldarg(2, 1)
        .ldc(3, 1)
        .op(4, Opcode::Add)
        .ldc(5, 2)
        .op(6, Opcode::Mul)
        .jump(7, Opcode::Br, 9)
        .ldarg(8, 2)
        .op(9, Opcode::Ret)
        .build();
    let method = translate(&body);

    // the label lands on the first instruction of the whole expression, not
    // on the add that is the direct first operand of mul
    assert_eq!(method.phis[&Address(9)].labels(), &[Address(8), Address(2)]);
    assert_eq!(labels(&method), vec![2, 8, 9]);
}

#[test]
fn test_unbalanced_arms_fail_method() {
    // the then-arm leaves an extra value behind
    let body = MethodBody::builder("unbalanced")
        .ldarg(0, 0)
        .jump(1, Opcode::Brfalse, 5)
        .ldc(2, 1)
        .ldc(3, 2)
        .jump(4, Opcode::Br, 6)
        .ldc(5, 3)
        .stloc(6, 0)
        .op(7, Opcode::RetVoid)
        .build();

    let err = MethodTranslator::new().translate(&body).unwrap_err();
    assert!(matches!(err, StackError::InconsistentForkState { .. }));
}

#[test]
fn test_loop_back_edge() {
    // do { local0 = local0 + 1; } while (local0 < arg0);
    let body = MethodBody::builder("count")
        .ldloc(0, 0)
        .ldc(1, 1)
        .op(2, Opcode::Add)
        .stloc(3, 0)
        .ldloc(4, 0)
        .ldarg(5, 0)
        .jump(6, Opcode::Blt, 0)
        .op(7, Opcode::RetVoid)
        .build();
    let method = translate(&body);

    assert_eq!(method.phi_count(), 0);
    assert_eq!(method.statements[0].labels, vec![Address(0)]);
    assert_eq!(
        method.statements[1].expr.to_string(),
        "blt IL_0000(ldloc V_0, ldarg A_0)"
    );
}

#[test]
fn test_call_arguments_in_source_order() {
    let body = MethodBody::builder("call")
        .ldc(0, 1)
        .ldc(1, 2)
        .call(2, 0x0600_0001, 2, true)
        .op(3, Opcode::Ret)
        .build();
    let method = translate(&body);

    let Expr::Op { args, .. } = &method.statements[0].expr else {
        panic!("expected an instruction");
    };
    let Expr::Op { args: call_args, .. } = &args[0] else {
        panic!("expected a call");
    };
    let addresses: Vec<_> = call_args.iter().map(Expr::address).collect();
    assert_eq!(addresses, vec![Address(0), Address(1)]);
}

#[test]
fn test_over_pop_is_underflow() {
    let body = MethodBody::builder("short")
        .ldc(0, 1)
        .op(1, Opcode::Add)
        .op(2, Opcode::Ret)
        .build();

    let err = MethodTranslator::new().translate(&body).unwrap_err();
    assert!(matches!(
        err,
        StackError::StackUnderflow {
            address: Some(Address(1)),
            ..
        }
    ));
    assert!(err.to_string().contains("IL_0001"));
}

#[test]
fn test_invalid_body_is_reported() {
    let body = MethodBody::builder("bad").jump(0, Opcode::Br, 9).build();
    let err = MethodTranslator::new().translate(&body).unwrap_err();
    assert!(matches!(err, StackError::Bytecode(_)));
}

#[test]
fn test_module_from_json() {
    let text = r#"{
        "name": "demo",
        "methods": [
            {
                "name": "broken",
                "instructions": [
                    { "address": 0, "opcode": "Pop" }
                ]
            },
            {
                "name": "answer",
                "instructions": [
                    { "address": 0, "opcode": "LdcI4", "operand": { "Int32": 42 } },
                    { "address": 1, "opcode": "Ret" }
                ]
            }
        ]
    }"#;
    let module = Module::from_json(text).unwrap();
    let report = translate_module(&module, &TranslateOptions::default());

    assert_eq!(report.module, "demo");
    assert!(!report.is_success());
    let translated: Vec<_> = report.translated().map(|m| m.to_string()).collect();
    assert_eq!(translated, vec!["method answer {\n    ret(ldc.i4 42)\n}"]);

    let (name, err) = report.failures().next().unwrap();
    assert_eq!(name, "broken");
    assert!(matches!(err, StackError::StackUnderflow { .. }));
}

#[test]
fn test_tree_serializes() {
    let method = translate(&select());
    let json = serde_json::to_value(&method).unwrap();

    assert_eq!(json["name"], "select");
    assert_eq!(json["phis"]["7"]["values"], serde_json::json!([6, 4]));
    assert_eq!(json["labels"], serde_json::json!([2, 6, 7]));
    assert_eq!(json["statements"][2]["expr"]["Op"]["opcode"], "Ret");
}
