// Test 3: runtime fault after partial output
let v = vec![1, 2, 3];
println!("len = {}", v.len());
println!("{}", v[10]);
