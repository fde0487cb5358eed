// Test 2: compile error, diagnostic should point at line 1
let x = 5
println!("{}", x);
