// Test 4: never terminates, must be preempted at the budget
let mut n: u64 = 0;
loop {
    n = n.wrapping_add(1);
}
