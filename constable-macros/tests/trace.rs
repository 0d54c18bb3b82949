use std::future::Future;
use std::pin::pin;
use std::sync::Arc;
use std::task::{Context, Poll, Wake, Waker};

use constable::rt;
use constable_macros::trace;

const EXAMPLE_LINE: u32 = line!();
#[trace(a, b)]
fn example(a: i32, b: i32) -> i32 {
    let mut a = a + 1;
    let b: i32 = b + 1;
    a += 1;
    a + b
}

fn traced<R>(f: impl FnOnce() -> R) -> (R, Vec<String>) {
    rt::set_colors(false);
    rt::capture(f)
}

#[test]
fn test_reference_scenario_prints_22_lines() {
    let (result, lines) = traced(|| example(1, 2));
    assert_eq!(result, 6);
    assert_eq!(lines.len(), 22, "{:#?}", lines);

    let fn_line = EXAMPLE_LINE + 2;
    let expected_head = vec![
        String::new(),
        format!("constable: example: line {}", fn_line + 1),
        "    'let mut a = a + 1;'".to_string(),
        "    a = 2".to_string(),
        "    type(a) = i32".to_string(),
        String::new(),
        format!("constable: example: line {}", fn_line + 2),
        "    'let b: i32 = b + 1;'".to_string(),
        "    b = 3".to_string(),
        "    type(b) = i32".to_string(),
        String::new(),
        format!("constable: example: line {}", fn_line + 3),
        "    'a += 1;'".to_string(),
        "    a = 3".to_string(),
        "    type(a) = i32".to_string(),
    ];
    assert_eq!(&lines[..15], expected_head.as_slice());

    assert_eq!(lines[15], "");
    assert_eq!(
        lines[16],
        format!("constable: example: line {} to {}", fn_line, fn_line + 5)
    );
    assert!(lines[17].starts_with("    signature: fn example("), "{}", lines[17]);
    assert_eq!(lines[18], "    args: a = 1, b = 2");
    assert_eq!(lines[19], "    returned: 6");
    assert!(lines[20].starts_with("    execution time: "));
    assert!(lines[20].ends_with(" seconds"));
    assert_eq!(lines[21], "");
}

#[trace(a, b, c, verbose = false)]
fn tally(a: i32, b: i32, c: i32) -> (i32, i32, i32) {
    let d = a + b;
    let e = b * c;
    let f = a - c;
    (d, e, f)
}

#[test]
fn test_terse_scenario_returns_unchanged() {
    let (result, lines) = traced(|| tally(1, 2, 3));
    assert_eq!(result, (3, 6, -2));
    assert!(!lines.is_empty());
    for line in &lines {
        assert!(
            line.is_empty() || line.starts_with("constable: ") || line.starts_with("    "),
            "{:?}",
            line
        );
    }
}

#[trace(d, e, use_spaces = false, exec_info = false, verbose = false)]
fn terse_pairs(a: i32, b: i32) -> i32 {
    let d = a + b;
    let e = d * 2;
    e
}

#[test]
fn test_inline_lines_without_spacing() {
    let (result, lines) = traced(|| terse_pairs(1, 2));
    assert_eq!(result, 6);
    assert_eq!(lines.len(), 2, "{:#?}", lines);
    assert!(lines[0].ends_with(" - d = 3"), "{}", lines[0]);
    assert!(lines[1].ends_with(" - e = 6"), "{}", lines[1]);
}

#[trace(label, max_len = 5, exec_info = false)]
fn shout(word: &str) -> usize {
    let label = word.repeat(4);
    label.len()
}

#[test]
fn test_long_values_are_truncated() {
    let (result, lines) = traced(|| shout("abc"));
    assert_eq!(result, 12);
    assert_eq!(lines[3], "    label = \"abca...[+9 chars]");
    assert_eq!(lines[4], "    type(label) = alloc::string::String");
}

#[trace(x, exec_info = false)]
fn nested_only(n: i32) -> i32 {
    let y = n * 2;
    let mut total = y;
    {
        let x = total + 1;
        total = x;
    }
    if n > 0 {
        let x = 5;
        total += x;
    }
    let add = |v: i32| {
        let x = v + 1;
        x
    };
    add(total)
}

#[test]
fn test_unwatched_and_nested_assignments_are_silent() {
    let (result, lines) = traced(|| nested_only(3));
    assert_eq!(result, 13);
    assert!(lines.is_empty(), "{:#?}", lines);
}

#[trace(x)]
fn explode(n: u32) -> u32 {
    let x = n + 1;
    if x > 2 {
        panic!("too big: {}", x);
    }
    x
}

#[test]
fn test_panics_pass_through() {
    let (caught, lines) = traced(|| std::panic::catch_unwind(|| explode(5)));
    let payload = caught.unwrap_err();
    assert_eq!(payload.downcast_ref::<String>().map(String::as_str), Some("too big: 6"));
    // The block for `x` ran, the summary never did.
    assert_eq!(lines.len(), 5, "{:#?}", lines);
    assert_eq!(explode(1), 2);
}

#[trace(half, show_args = false, show_timing = false)]
fn halve(n: i32) -> Result<i32, String> {
    let half = n / 2;
    if n % 2 != 0 {
        return Err(format!("odd: {}", n));
    }
    Ok(half)
}

#[test]
fn test_errors_and_early_returns_pass_through() {
    let (result, lines) = traced(|| halve(7));
    assert_eq!(result, Err("odd: 7".to_string()));
    assert!(lines.contains(&"    returned: Err(\"odd: 7\")".to_string()), "{:#?}", lines);
    assert!(!lines.iter().any(|l| l.starts_with("    args:")));
    assert!(!lines.iter().any(|l| l.starts_with("    execution time:")));

    let (result, _) = traced(|| halve(8));
    assert_eq!(result, Ok(4));
}

#[trace(acc)]
fn factorial(n: u64) -> u64 {
    let acc = if n <= 1 { 1 } else { n * factorial(n - 1) };
    acc
}

#[test]
fn test_recursive_calls_each_report() {
    let (result, lines) = traced(|| factorial(3));
    assert_eq!(result, 6);
    assert_eq!(lines.len(), 3 * (5 + 7));
    let returned: Vec<&String> = lines.iter().filter(|l| l.starts_with("    returned:")).collect();
    assert_eq!(returned, vec!["    returned: 1", "    returned: 2", "    returned: 6"]);
}

struct Account {
    balance: i64,
}

impl Account {
    #[trace(balance)]
    fn deposit(&mut self, amount: i64) -> i64 {
        let balance = self.balance + amount;
        self.balance = balance;
        balance
    }
}

#[test]
fn test_methods_skip_the_receiver() {
    let mut account = Account { balance: 10 };
    let (result, lines) = traced(|| account.deposit(5));
    assert_eq!(result, 15);
    assert_eq!(account.balance, 15);
    assert_eq!(lines.len(), 12);
    assert_eq!(lines[3], "    balance = 15");
    assert!(lines.contains(&"    args: amount = 5".to_string()), "{:#?}", lines);
}

#[trace(total)]
async fn parse_sum(items: Vec<&'static str>) -> Result<i32, std::num::ParseIntError> {
    let mut total = 0;
    for item in &items {
        total += item.parse::<i32>()?;
    }
    total = total * 1;
    Ok(total)
}

struct Noop;

impl Wake for Noop {
    fn wake(self: Arc<Self>) {}
}

fn block_on<F: Future>(future: F) -> F::Output {
    let waker = Waker::from(Arc::new(Noop));
    let mut cx = Context::from_waker(&waker);
    let mut future = pin!(future);
    loop {
        if let Poll::Ready(output) = future.as_mut().poll(&mut cx) {
            return output;
        }
    }
}

#[test]
fn test_async_functions_are_traced() {
    let (result, lines) = traced(|| block_on(parse_sum(vec!["1", "2", "3"])));
    assert_eq!(result, Ok(6));
    // `let mut total = 0` and `total = total * 1`, then the summary.
    assert_eq!(lines.len(), 5 + 5 + 7, "{:#?}", lines);

    let (result, _) = traced(|| block_on(parse_sum(vec!["1", "x"])));
    assert!(result.is_err());
}

#[trace]
fn untraced_body(a: u8) -> u8 {
    let b = a + 1;
    b
}

#[test]
fn test_empty_watch_set_prints_only_the_summary() {
    let (result, lines) = traced(|| untraced_body(1));
    assert_eq!(result, 2);
    assert_eq!(lines.len(), 7);
    assert_eq!(lines[3], "    args: a = 1");
}

struct Stack {
    items: Vec<i32>,
}

impl Stack {
    #[trace(n)]
    fn first_mut(&mut self) -> &mut i32 {
        let n = self.items.len();
        &mut self.items[0]
    }
}

#[test]
fn test_methods_can_return_mutable_borrows() {
    let mut stack = Stack { items: vec![1, 2] };
    let (_, lines) = traced(|| {
        let slot = stack.first_mut();
        *slot += 10;
    });
    assert_eq!(stack.items, vec![11, 2]);
    assert_eq!(lines.len(), 12, "{:#?}", lines);
    assert_eq!(lines[3], "    n = 2");
    assert!(lines.contains(&"    args: ()".to_string()), "{:#?}", lines);
    assert!(lines.contains(&"    returned: 1".to_string()), "{:#?}", lines);
}

struct Opaque(u8);

#[trace(x)]
fn peek(o: Opaque) -> u8 {
    let x = o.0 + 1;
    x
}

#[trace]
fn wrap(v: u8) -> Opaque {
    Opaque(v)
}

#[test]
fn test_values_without_debug_print_their_type() {
    let (result, lines) = traced(|| peek(Opaque(4)));
    assert_eq!(result, 5);
    let args = lines.iter().find(|l| l.starts_with("    args:")).unwrap();
    assert!(args.starts_with("    args: o = <") && args.ends_with("Opaque>"), "{}", args);

    let (result, lines) = traced(|| wrap(7));
    assert_eq!(result.0, 7);
    let returned = lines.iter().find(|l| l.starts_with("    returned:")).unwrap();
    assert!(returned.ends_with("Opaque>"), "{}", returned);
}
