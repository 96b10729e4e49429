use focusync_core::Config;

/// Print the delay before each retry and when an operation is dropped.
pub fn run() -> Result<(), Box<dyn std::error::Error>> {
    let policy = Config::load()?.sync.retry_policy();
    let max = policy.max_attempts();
    for failures in 1..max {
        let delay = policy.retry_delay(failures - 1);
        println!("after failure {failures}: retry in {}s", delay.as_secs());
    }
    println!("after failure {max}: dropped");
    Ok(())
}
