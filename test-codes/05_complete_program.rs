// Test 5: already a complete program, no wrapping
fn fib(n: u32) -> u64 {
    match n {
        0 => 0,
        1 => 1,
        _ => fib(n - 1) + fib(n - 2),
    }
}

fn main() {
    for i in 0..10 {
        print!("{} ", fib(i));
    }
    println!();
}
