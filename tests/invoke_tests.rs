//! Invocation protocol integration tests.

use std::cell::RefCell;
use std::rc::Rc;

use ccg_script::core::{BridgeConfig, CardInfo, ObjectId, ObjectRef, SessionId};
use ccg_script::diagnostics::MessageType;
use ccg_script::interpreter::{MemoryScripts, ScriptEnvironment};
use ccg_script::invoke::{to_integer, ReturnCount};
use ccg_script::params::ParamType;
use ccg_script::BridgeError;
use mlua::{MultiValue, Value};

const LIBRARY: &str = r#"
function digits(a, b, c) return a * 100 + b * 10 + c end
function three() return 1, 2, 3 end
function echo(...) return ... end
function fail() error("boom") end
function is_big(c, n) return n > 2 end
function sum_extra(c, ...)
    local total = 0
    for _, v in ipairs({...}) do total = total + v end
    return total
end
function pair(c) return 4, "5" end
function zero() return 0 end
function none() return nil end
function can_act() return Duel.CanAct() end
"#;

const C200: &str = r#"
local s = self_table
function s.initial_effect(c) end
function s.cost(c, n) return n * 2 end
function s.broken(c) error("card script failure") end
"#;

type Log = Rc<RefCell<Vec<(String, MessageType)>>>;

fn setup() -> (ScriptEnvironment, Log) {
    let log: Log = Rc::default();
    let sink = Rc::clone(&log);
    let env = ScriptEnvironment::builder(SessionId::new(1))
        .with_config(BridgeConfig::default().with_preload("library.lua"))
        .with_reader(
            MemoryScripts::new()
                .with_script("library.lua", LIBRARY)
                .with_script("c200.lua", C200),
        )
        .with_message_handler(move |_: SessionId, message: &str, kind: MessageType| {
            sink.borrow_mut().push((message.to_string(), kind));
        })
        .build()
        .expect("environment should build");

    env.interpreter()
        .register_function("Duel", "CanAct", |interp, _| {
            Ok(MultiValue::from_iter([Value::Boolean(interp.actions_allowed())]))
        })
        .unwrap();
    env.interpreter()
        .register_card(CardInfo::new(ObjectId(1), 200))
        .unwrap();
    (env, log)
}

fn ints(values: &[Value]) -> Vec<i64> {
    values.iter().map(to_integer).collect()
}

// =============================================================================
// Generic calls and staging
// =============================================================================

#[test]
fn test_staging_order_with_front_insertion() {
    let (env, _) = setup();
    let interp = env.interpreter();
    let digits = interp.global_function("digits").unwrap().unwrap();

    interp.add_param(2_i64);
    interp.add_param(3_i64);
    interp.add_param_front(1_i64);

    let values = interp.call_function(&digits, 3, ReturnCount::Exactly(1)).unwrap();
    assert_eq!(ints(&values), vec![123]);
    assert_eq!(interp.staged_count(false), 0);
}

#[test]
fn test_return_count_adjustment() {
    let (env, _) = setup();
    let interp = env.interpreter();
    let three = interp.global_function("three").unwrap().unwrap();

    let padded = interp.call_function(&three, 0, ReturnCount::Exactly(5)).unwrap();
    assert_eq!(padded.len(), 5);
    assert!(padded[4].is_nil());

    let truncated = interp.call_function(&three, 0, ReturnCount::Exactly(1)).unwrap();
    assert_eq!(ints(&truncated), vec![1]);

    let all = interp.call_function(&three, 0, ReturnCount::All).unwrap();
    assert_eq!(ints(&all), vec![1, 2, 3]);
}

#[test]
fn test_param_count_mismatch_clears_queue() {
    let (env, log) = setup();
    let interp = env.interpreter();
    let echo = interp.global_function("echo").unwrap().unwrap();

    interp.add_param(1_i64);
    let err = interp.call_function(&echo, 2, ReturnCount::All).unwrap_err();

    assert_eq!(err, BridgeError::ParamCount { expected: 2, staged: 1 });
    assert_eq!(interp.staged_count(false), 0);
    assert_eq!(
        log.borrow().last().unwrap().0,
        "\"call_function\": incorrect parameter count (2 expected, 1 pushed)"
    );
}

#[test]
fn test_typed_staging() {
    let (env, _) = setup();
    let interp = env.interpreter();
    let echo = interp.global_function("echo").unwrap().unwrap();

    interp.add_param_typed(7, ParamType::Int, false).unwrap();
    interp.add_param_typed(1, ParamType::Boolean, false).unwrap();
    interp.add_param_typed(0, ParamType::Card, true).unwrap();
    assert_eq!(
        interp.add_param_typed(5, ParamType::String, false).unwrap_err(),
        BridgeError::ParamTypeMismatch("string")
    );

    let values = interp.call_function(&echo, 3, ReturnCount::All).unwrap();
    assert!(values[0].is_nil());
    assert_eq!(values[1], Value::Integer(7));
    assert_eq!(values[2], Value::Boolean(true));
}

#[test]
fn test_strings_and_callables_as_arguments() {
    let (env, _) = setup();
    let interp = env.interpreter();
    let echo = interp.global_function("echo").unwrap().unwrap();
    let three = interp.global_function("three").unwrap().unwrap();

    interp.add_param("text");
    interp.add_param(three.clone());
    let values = interp.call_function(&echo, 2, ReturnCount::All).unwrap();

    assert_eq!(to_integer(&values[0]), 0);
    let Value::Function(function) = &values[1] else {
        panic!("expected a function, got {:?}", values[1]);
    };
    let returned: (i64, i64, i64) = function.call(()).unwrap();
    assert_eq!(returned, (1, 2, 3));
}

#[test]
fn test_script_error_is_failure() {
    let (env, log) = setup();
    let interp = env.interpreter();
    let fail = interp.global_function("fail").unwrap().unwrap();

    let err = interp.call_function(&fail, 0, ReturnCount::Exactly(0)).unwrap_err();
    assert!(matches!(&err, BridgeError::Script(message) if message.contains("boom")));
    assert_eq!(interp.call_depth(), 0);

    let log = log.borrow();
    let (error, _) = log
        .iter()
        .find(|(_, kind)| *kind == MessageType::Error)
        .expect("error should reach the handler");
    assert!(error.starts_with("\"call_function\": "));
    assert!(error.contains("boom"));
    assert!(!error.contains('\n'));
    assert!(log
        .iter()
        .any(|(message, kind)| *kind == MessageType::ForDebug && message.starts_with("stack traceback:")));
}

#[test]
fn test_long_script_error_is_cut_to_capacity() {
    let (env, log) = setup();
    let interp = env.interpreter();
    interp
        .load_script(b"function shout() error(string.rep('x', 300)) end", "shout")
        .unwrap();
    let shout = interp.global_function("shout").unwrap().unwrap();

    assert!(interp.call_function(&shout, 0, ReturnCount::Exactly(0)).is_err());

    let log = log.borrow();
    let (error, _) = log
        .iter()
        .find(|(_, kind)| *kind == MessageType::Error)
        .expect("error should reach the handler");
    assert_eq!(error.len(), interp.config().unwrap().message_capacity);
    assert!(error.starts_with("\"call_function\": script error: "));
}

#[test]
fn test_call_value_rejects_nil() {
    let (env, _) = setup();
    let interp = env.interpreter();
    interp.add_param(1_i64);
    assert_eq!(
        interp.call_value(&Value::Nil, 1, ReturnCount::All).unwrap_err(),
        BridgeError::NullFunction
    );
    assert_eq!(interp.staged_count(false), 0);
}

#[test]
fn test_foreign_callable_rejected() {
    let (env, _) = setup();
    let other = ScriptEnvironment::new(SessionId::new(2), BridgeConfig::default()).unwrap();
    let three = env.interpreter().global_function("three").unwrap().unwrap();

    assert_eq!(
        other.interpreter().call_function(&three, 0, ReturnCount::All).unwrap_err(),
        BridgeError::ForeignCallable
    );
}

// =============================================================================
// Card and code functions
// =============================================================================

#[test]
fn test_card_function_call() {
    let (env, _) = setup();
    let interp = env.interpreter();

    interp.add_param(ObjectRef::card(ObjectId(1)));
    interp.add_param(21_i64);
    let values = interp
        .call_card_function(ObjectId(1), "cost", 2, ReturnCount::Exactly(1), true)
        .unwrap();
    assert_eq!(ints(&values), vec![42]);
}

#[test]
fn test_missing_card_function_forced_and_unforced() {
    let (env, log) = setup();
    let interp = env.interpreter();

    interp.add_param(ObjectRef::card(ObjectId(1)));
    let values = interp
        .call_card_function(ObjectId(1), "activate", 1, ReturnCount::Exactly(2), false)
        .unwrap();
    assert_eq!(values.len(), 2);
    assert!(values.iter().all(Value::is_nil));
    assert_eq!(interp.staged_count(false), 0);

    interp.add_param(ObjectRef::card(ObjectId(1)));
    let err = interp
        .call_card_function(ObjectId(1), "activate", 1, ReturnCount::Exactly(0), true)
        .unwrap_err();
    assert_eq!(
        err,
        BridgeError::MissingFunction {
            target: "Card(1)".to_string(),
            name: "activate".to_string()
        }
    );
    assert_eq!(interp.staged_count(false), 0);
    assert_eq!(
        log.borrow().last().unwrap().0,
        "\"activate\": missing function `activate` on Card(1)"
    );
}

#[test]
fn test_raising_card_function_fails_even_unforced() {
    let (env, _) = setup();
    let interp = env.interpreter();

    interp.add_param(ObjectRef::card(ObjectId(1)));
    let result = interp.call_card_function(ObjectId(1), "broken", 1, ReturnCount::Exactly(0), false);
    assert!(matches!(result, Err(BridgeError::Script(_))));
}

#[test]
fn test_code_function_call() {
    let (env, _) = setup();
    let interp = env.interpreter();

    interp.add_param(Value::Nil);
    interp.add_param(5_i64);
    let values = interp
        .call_code_function(200, "cost", 2, ReturnCount::Exactly(1))
        .unwrap();
    assert_eq!(ints(&values), vec![10]);

    let globals = interp.call_code_function(0, "three", 0, ReturnCount::All).unwrap();
    assert_eq!(ints(&globals), vec![1, 2, 3]);

    assert!(matches!(
        interp.call_code_function(0, "undefined", 0, ReturnCount::All),
        Err(BridgeError::MissingFunction { .. })
    ));
    assert!(matches!(
        interp.call_code_function(300, "cost", 0, ReturnCount::All),
        Err(BridgeError::ScriptNotFound(_))
    ));
}

// =============================================================================
// Predicates
// =============================================================================

#[test]
fn test_check_condition() {
    let (env, _) = setup();
    let interp = env.interpreter();

    interp.add_param(1_i64);
    assert!(interp.check_condition(None, 1));
    assert_eq!(interp.staged_count(false), 0);

    let zero = interp.global_function("zero").unwrap().unwrap();
    let none = interp.global_function("none").unwrap().unwrap();
    let fail = interp.global_function("fail").unwrap().unwrap();
    assert!(interp.check_condition(Some(&zero), 0), "0 is truthy in scripts");
    assert!(!interp.check_condition(Some(&none), 0));
    assert!(!interp.check_condition(Some(&fail), 0));
}

#[test]
fn test_check_matching() {
    let (env, _) = setup();
    let interp = env.interpreter();
    let filter: Value = interp.lua().globals().get("is_big").unwrap();

    assert!(interp.check_matching(ObjectId(1), &filter, &[Value::Integer(3)]));
    assert!(!interp.check_matching(ObjectId(1), &filter, &[Value::Integer(1)]));
    assert!(interp.check_matching(ObjectId(1), &Value::Nil, &[]));
    assert!(!interp.check_matching(ObjectId(1), &Value::Integer(1), &[]));
}

#[test]
fn test_check_matching_table() {
    let (env, _) = setup();
    let interp = env.interpreter();
    let filter: Value = interp.lua().globals().get("is_big").unwrap();

    let big = interp.lua().create_sequence_from([5_i64]).unwrap();
    let small = interp.lua().create_sequence_from([2_i64]).unwrap();
    assert!(interp.check_matching_table(ObjectId(1), &filter, &big));
    assert!(!interp.check_matching_table(ObjectId(1), &filter, &small));
}

#[test]
fn test_predicates_disallow_actions() {
    let (env, _) = setup();
    let interp = env.interpreter();
    let can_act = interp.global_function("can_act").unwrap().unwrap();

    assert!(!interp.check_condition(Some(&can_act), 0));
    let values = interp.call_function(&can_act, 0, ReturnCount::Exactly(1)).unwrap();
    assert_eq!(values[0], Value::Boolean(true));
    assert!(interp.actions_allowed());
}

// =============================================================================
// Value queries
// =============================================================================

#[test]
fn test_operation_values() {
    let (env, _) = setup();
    let interp = env.interpreter();
    let globals = interp.lua().globals();
    let sum: Value = globals.get("sum_extra").unwrap();
    let pair: Value = globals.get("pair").unwrap();
    let fail: Value = globals.get("fail").unwrap();

    let extra = [Value::Integer(1), Value::Integer(2), Value::Integer(3)];
    assert_eq!(interp.get_operation_value(ObjectId(1), &sum, &extra), 6);
    assert_eq!(interp.get_operation_values(ObjectId(1), &pair, &[]), vec![4, 5]);
    assert_eq!(interp.get_operation_value(ObjectId(1), &fail, &[]), 0);
    assert_eq!(interp.get_operation_value(ObjectId(1), &Value::Nil, &[]), 0);
    assert!(interp.get_operation_values(ObjectId(1), &Value::Nil, &[]).is_empty());
}

#[test]
fn test_function_values() {
    let (env, _) = setup();
    let interp = env.interpreter();
    let three = interp.global_function("three").unwrap().unwrap();
    let echo = interp.global_function("echo").unwrap().unwrap();

    assert_eq!(interp.get_function_values(Some(&three), 0), vec![1, 2, 3]);
    assert_eq!(interp.get_function_value(Some(&three), 0), 1);

    interp.add_param(true);
    assert_eq!(interp.get_function_value(Some(&echo), 1), 1);

    interp.add_param(9_i64);
    assert_eq!(interp.get_function_value(None, 1), 0);
    assert!(interp.get_function_values(None, 0).is_empty());
    assert_eq!(interp.staged_count(false), 0);
}
