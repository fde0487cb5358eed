// Test 1: bare statements, wrapped and run
let a = 5;
let b = 10;
println!("{}", a + b);
