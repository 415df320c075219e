use pretty_assertions::assert_eq;
use stream_eval::{Context, Evaluate, Function, Interpreter, Machine, Registry, Value};

fn eval(src: &str) -> String {
    let mut interp = Interpreter::default();
    let mut ctx = Context::new();
    let mut out = Vec::new();
    interp.evaluate(src, &mut ctx, &mut out).unwrap().to_string()
}

#[test]
fn test_builtin_conversions() {
    assert_eq!(eval("int(' 42 ')"), "42");
    assert_eq!(eval("int('ff', 16)"), "255");
    assert_eq!(eval("float('1.5') * 2"), "3.0");
    assert_eq!(eval("str(12) + 'a'"), "12a");
    assert_eq!(eval("bool([])"), "false");
    assert_eq!(eval("type(1.0)"), "float");
    assert_eq!(eval("round(2.5)"), "3");
    assert_eq!(eval("round(3.14159, 2)"), "3.14");
    assert_eq!(eval("abs(-3)"), "3");
}

#[test]
fn test_int_of_huge_float_is_a_value_error() {
    let mut interp = Interpreter::default();
    let mut ctx = Context::new();
    let mut out = Vec::new();
    for src in ["int(float('1e300'))", "int(-float('1e19'))"] {
        let err = interp.evaluate(src, &mut ctx, &mut out).unwrap_err();
        assert_eq!(err.to_string(), "ValueError: int too large");
    }
    assert_eq!(eval("int(-2.9)"), "-2");
}

#[test]
fn test_builtin_arithmetic() {
    assert_eq!(eval("7 / 2"), "3.5");
    assert_eq!(eval("7 // 2"), "3");
    assert_eq!(eval("-7 // 2"), "-4");
    assert_eq!(eval("-7 % 3"), "2");
    assert_eq!(eval("'ab' * 2"), "abab");
    assert_eq!(eval("'10' > 9"), "true");
    assert_eq!(eval("'1' == 1"), "true");
}

#[test]
fn test_builtin_collections() {
    assert_eq!(eval("sum([1, 2, 3])"), "6");
    assert_eq!(eval("min(3, 1, 2)"), "1");
    assert_eq!(eval("max([1, 5, 2])"), "5");
    assert_eq!(eval("range(3)"), "[0, 1, 2]");
    assert_eq!(eval("range(5, 0, -2)"), "[5, 3, 1]");
    assert_eq!(eval("sorted(['b', 'a', 'c'])"), r#"["a", "b", "c"]"#);
    assert_eq!(eval("sorted(['aaa', 'b', 'cc'], len)"), r#"["b", "cc", "aaa"]"#);
    assert_eq!(eval("reversed([1, 2])"), "[2, 1]");
    assert_eq!(eval("unique([1, 1, '1', 2])"), r#"[1, "1", 2]"#);
    assert_eq!(eval("enumerate(['a', 'b'], 1)"), r#"[[1, "a"], [2, "b"]]"#);
    assert_eq!(eval("[1, 2, 3][-1]"), "3");
    assert_eq!(eval("'hello'[1:3]"), "el");
}

#[test]
fn test_builtin_map_and_filter() {
    assert_eq!(eval("map(|n| n * 2, [1, 2])"), "[2, 4]");
    assert_eq!(eval("[1, 2].map(|n| n + 1)"), "[2, 3]");
    assert_eq!(eval("filter(|n| n > 1, [1, 2, 3])"), "[2, 3]");
    assert_eq!(eval("filter(null, [0, 1, '', 'a'])"), r#"[1, "a"]"#);
}

#[test]
fn test_builtin_maps() {
    assert_eq!(eval("keys({b: 1, a: 2})"), r#"["a", "b"]"#);
    assert_eq!(eval("values({a: 1})"), "[1]");
    assert_eq!(eval("get({a: 1}, 'b', 0)"), "0");
    assert_eq!(eval("{a: {b: 2}}.a.b"), "2");
    assert_eq!(eval("contains({a: 1}, 'a')"), "true");
    assert_eq!(eval("contains([1, 2], 3)"), "false");
}

#[test]
fn test_builtin_text() {
    assert_eq!(eval("split(' a  b ')"), r#"["a", "b"]"#);
    assert_eq!(eval("'a,b'.split(',')"), r#"["a", "b"]"#);
    assert_eq!(eval("['a', 'b'].join('-')"), "a-b");
    assert_eq!(eval("'Ab'.upper() + 'Ab'.lower()"), "ABab");
    assert_eq!(eval("trim('..a..', '.')"), "a");
    assert_eq!(eval("replace('aaa', 'a', 'b')"), "bbb");
    assert_eq!(eval("'abc'.starts_with('ab') && 'abc'.ends_with('bc')"), "true");
    assert_eq!(eval(r"re_match('a1', '\d')"), "true");
    assert_eq!(eval(r"re_find('k=1 k=22', 'k=(\d+)')"), r#"["1", "22"]"#);
    assert_eq!(eval(r"re_split('a1b22c', '\d+')"), r#"["a", "b", "c"]"#);
}

#[test]
fn test_builtin_json() {
    assert_eq!(eval(r#"from_json('{"a": [1, 2.5, null]}').a[1]"#), "2.5");
    assert_eq!(eval("to_json({b: [1, 'x'], a: true})"), r#"{"a":true,"b":[1,"x"]}"#);
}

#[test]
fn test_statements_and_blocks() {
    assert_eq!(eval("n = 0; for v in [1, 2, 3] { n += v }; n"), "6");
    assert_eq!(eval("if 1 > 2 { 'a' } else if 2 > 1 { 'b' } else { 'c' }"), "b");
    assert_eq!(eval("m = {}; m['k'] = 1; m # trailing comment"), r#"{"k": 1}"#);
}

#[test]
fn test_print_writes_to_the_sink() {
    let mut interp = Interpreter::default();
    let mut ctx = Context::new();
    let mut out = Vec::new();
    let value = interp.evaluate("print('a', 1, [2]); print()", &mut ctx, &mut out).unwrap();
    assert_eq!(value, Value::Null);
    assert_eq!(String::from_utf8(out).unwrap(), "a 1 [2]\n\n");
}

struct Double;
impl Function for Double {
    fn name(&self) -> &'static str { "double" }
    fn arity(&self) -> std::ops::RangeInclusive<usize> { 1..=1 }
    fn call(&self, args: Vec<Value>, _machine: &mut Machine<'_>) -> stream_eval::Result<Value> {
        match &args[0] {
            Value::Int(i) => Ok(Value::Int(i * 2)),
            other => Ok(Value::Str(format!("{other}{other}"))),
        }
    }
}

#[test]
fn test_custom_function_registration() {
    let mut registry = Registry::with_builtins();
    registry.register(Double);
    let mut interp = Interpreter::new(registry);
    let mut ctx = Context::new();
    let mut out = Vec::new();
    assert_eq!(interp.evaluate("double(21)", &mut ctx, &mut out).unwrap(), Value::Int(42));
    assert_eq!(interp.evaluate("'ab'.double()", &mut ctx, &mut out).unwrap(), Value::from("abab"));
    assert!(interp.registry().contains("double"));
}
