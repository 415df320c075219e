use std::io::BufRead;

use stream_eval as sev;
use stream_eval::{Error, Options, Value};

fn run(statements: &[&str], input: Option<&str>, options: &Options) -> (sev::Result<()>, String) {
    let stream = input.map(|s| Box::new(std::io::Cursor::new(s.as_bytes().to_vec())) as Box<dyn BufRead>);
    let mut out = Vec::new();
    let result = sev::evaluate(statements.iter().copied(), stream, Vec::<(String, Value)>::new(), options, &mut out);
    (result, String::from_utf8_lossy(&out).into_owned())
}

// Two exclusive modes at once never touch the input or run a hook.
#[test]
fn test_exclusive_modes_fail_before_hooks() {
    let options = Options {
        full_stream: true,
        structured: true,
        before: Some("print('before')".into()),
        after: Some("print('after')".into()),
        ..Options::default()
    };
    let (result, out) = run(&["print(1)"], Some("1\n"), &options);
    let err = result.unwrap_err();
    assert!(matches!(err, Error::Configuration(_)), "got {err}");
    assert!(out.is_empty(), "hooks ran: {out:?}");
}

#[test]
fn test_unknown_charset() {
    let options = Options { stdin_charset: "klingon".into(), ..Options::default() };
    let (result, _) = run(&["print(1)"], None, &options);
    assert_eq!(result.unwrap_err().to_string(), "ConfigurationError: unknown encoding: klingon");

    let options = Options { stdout_charset: "klingon".into(), ..Options::default() };
    assert_eq!(run(&["print(1)"], None, &options).0.unwrap_err().kind(), "ConfigurationError");
}

#[test]
fn test_invalid_split_pattern() {
    let options = Options { split: Some("(".into()), ..Options::default() };
    let (result, _) = run(&["print(f)"], Some("a\n"), &options);
    assert_eq!(result.unwrap_err().kind(), "ConfigurationError");
}

#[test]
fn test_quiet_never_hides_configuration_errors() {
    let options = Options { quiet: true, iterable: true, split: Some(",".into()), ..Options::default() };
    let (result, _) = run(&["print(l)"], Some("a\n"), &options);
    assert_eq!(result.unwrap_err().kind(), "ConfigurationError");
}

#[test]
fn test_invalid_json_is_a_structure_error_even_when_quiet() {
    let options = Options { structured: true, quiet: true, ..Options::default() };
    let (result, out) = run(&["print(j)"], Some("[1, 2"), &options);
    assert_eq!(result.unwrap_err().kind(), "StructureError");
    assert!(out.is_empty());
}

#[test]
fn test_syntax_error_reports_position() {
    let (result, _) = run(&["print(1"], None, &Options::default());
    let err = result.unwrap_err();
    assert_eq!(err.kind(), "SyntaxError");
    assert!(err.to_string().contains("offset"), "got {err}");
}

#[test]
fn test_first_error_stops_line_mode() {
    let (result, out) = run(&["print(10 // int(x))"], Some("5\n0\n2\n"), &Options::default());
    assert_eq!(result.unwrap_err().to_string(), "ZeroDivisionError: division by zero");
    assert_eq!(out, "2\n");
}

#[test]
fn test_after_hook_error_carries_the_earlier_failure() {
    let options = Options { after: Some("print(nope)".into()), ..Options::default() };
    let (result, _) = run(&["[1][3]"], None, &options);
    let err = result.unwrap_err();
    assert_eq!(err.to_string(), "NameError: name 'nope' is not defined");
    let cause = std::error::Error::source(&err).map(ToString::to_string);
    assert_eq!(cause.as_deref(), Some("IndexError: list index out of range"));
}

#[test]
fn test_quiet_after_hook_failure_is_swallowed() {
    let options = Options { quiet: true, after: Some("print(nope)".into()), ..Options::default() };
    let (result, out) = run(&["print('ok')"], None, &options);
    result.unwrap();
    assert_eq!(out, "ok\n");
}

#[test]
fn test_invalid_bytes_in_records() {
    let options = Options::default();
    let stream: Box<dyn BufRead> = Box::new(std::io::Cursor::new(b"a\n\xff\nb\n".to_vec()));
    let mut out = Vec::new();
    let err = sev::evaluate(["print(i, x)"], Some(stream), Vec::<(String, Value)>::new(), &options, &mut out)
        .unwrap_err();
    assert_eq!(err.kind(), "DecodingError");
    assert_eq!(out, b"1 a\n");

    let options = Options { quiet: true, ..Options::default() };
    let stream: Box<dyn BufRead> = Box::new(std::io::Cursor::new(b"a\n\xff\nb\n".to_vec()));
    let mut out = Vec::new();
    sev::evaluate(["print(i, x)"], Some(stream), Vec::<(String, Value)>::new(), &options, &mut out).unwrap();
    assert_eq!(out, b"1 a\n3 b\n");
}

#[test]
fn test_type_errors() {
    for (src, kind) in [
        ("'a' + 1", "TypeError"),
        ("1 < 'b'", "TypeError"),
        ("int('z')", "ValueError"),
        ("{a: 1}['b']", "KeyError"),
        ("len(1)", "TypeError"),
        ("upper()", "TypeError"),
        ("1 % 0", "ZeroDivisionError"),
    ] {
        let (result, _) = run(&[src], None, &Options::default());
        assert_eq!(result.unwrap_err().kind(), kind, "{src}");
    }
}

#[test]
fn test_deep_nesting_is_a_syntax_error() {
    let deep = format!("print({}1{})", "(".repeat(100_000), ")".repeat(100_000));
    let (result, out) = run(&[deep.as_str()], None, &Options::default());
    assert_eq!(result.unwrap_err().kind(), "SyntaxError");
    assert!(out.is_empty());

    let options = Options { quiet: true, ..Options::default() };
    let (result, out) = run(&[deep.as_str(), "print('next')"], None, &options);
    assert!(result.is_ok());
    assert_eq!(out, "next\n");
}
