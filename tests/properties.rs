use std::io::BufRead;

use proptest::prelude::*;
use stream_eval::{evaluate, Options, Value};

fn run(statement: &str, input: String, options: &Options) -> String {
    let stream: Box<dyn BufRead> = Box::new(std::io::Cursor::new(input.into_bytes()));
    let mut out = Vec::new();
    evaluate([statement], Some(stream), Vec::<(String, Value)>::new(), options, &mut out).unwrap();
    String::from_utf8(out).unwrap()
}

fn piped(lines: &[String]) -> String {
    lines.iter().map(|l| format!("{l}\n")).collect()
}

proptest! {
    #[test]
    fn index_starts_at_one_and_steps_by_one(lines in prop::collection::vec("[a-z0-9 ]{0,8}", 0..20)) {
        let out = run("print(i)", piped(&lines), &Options::default());
        let expected: String = (1..=lines.len()).map(|n| format!("{n}\n")).collect();
        prop_assert_eq!(out, expected);
    }

    #[test]
    fn default_strip_removes_only_the_terminator(lines in prop::collection::vec("[a-z0-9 .]{0,8}", 0..20)) {
        let out = run("print(x)", piped(&lines), &Options::default());
        prop_assert_eq!(out, piped(&lines));
    }

    #[test]
    fn empty_strip_keeps_the_terminator(lines in prop::collection::vec("[a-z0-9 ]{0,8}", 0..20)) {
        let options = Options { rstrip: String::new(), ..Options::default() };
        let out = run("print(x)", piped(&lines), &options);
        let expected: String = lines.iter().map(|l| format!("{l}\n\n")).collect();
        prop_assert_eq!(out, expected);
    }

    #[test]
    fn filter_keeps_order_and_only_matches(nums in prop::collection::vec(0i64..1000, 0..30)) {
        let lines: Vec<String> = nums.iter().map(i64::to_string).collect();
        let options = Options { filter: true, ..Options::default() };
        let out = run("int(x) % 2 == 0", piped(&lines), &options);
        let expected: String = nums.iter().filter(|n| *n % 2 == 0).map(|n| format!("{n}\n")).collect();
        prop_assert_eq!(out, expected);
    }

    #[test]
    fn split_then_join_restores_the_stream(fields in prop::collection::vec("[a-z]{0,4}", 1..8)) {
        let text = fields.join(",");
        let options = Options { full_stream: true, split: Some(",".into()), ..Options::default() };
        let out = run("print(f.join(','))", text.clone(), &options);
        prop_assert_eq!(out, format!("{text}\n"));
    }
}
