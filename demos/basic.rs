use gatekeeper_rs::{
    AllowError, BreakerBuilder, BreakerError, BreakerRegistry, HookRegistry, TracingMetricSink,
};
use std::error::Error;
use std::fmt;
use std::thread;
use std::time::Duration;

// Custom error type that implements Error trait
#[derive(Debug)]
struct ServiceError(String);

impl fmt::Display for ServiceError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Service error: {}", self.0)
    }
}

impl Error for ServiceError {}

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "gatekeeper_rs=debug".into()),
        )
        .init();

    let hooks = HookRegistry::new();
    hooks.set_on_open(|target| println!("!! {} tripped open", target));
    hooks.set_on_close(|target| println!("!! {} recovered", target));

    let registry = BreakerRegistry::new();
    let breaker = registry.get_or_insert_with("inventory", || {
        BreakerBuilder::consecutive_failures(3)
            .open_timeout(Duration::from_secs(2))
            .max_probes(2)
            .metric_sink(TracingMetricSink)
            .hooks(hooks)
            .build()
    });

    println!("Circuit initial state: {}", breaker.state());

    let mut counter = 0u32;
    let mut call_service = || -> Result<String, ServiceError> {
        counter += 1;
        // Fail calls 3 through 8 to trip the breaker, then recover
        if (3..=8).contains(&counter) {
            Err(ServiceError("External service error".to_string()))
        } else {
            Ok(format!("response #{}", counter))
        }
    };

    for attempt in 1..=16 {
        print!("Attempt {}: ", attempt);

        match breaker.call(&mut call_service) {
            Ok(result) => println!("call succeeded with {}", result),
            Err(BreakerError::Rejected(AllowError::OpenState)) => {
                println!("circuit is open, waiting before retry");
                thread::sleep(Duration::from_millis(700));
            }
            Err(BreakerError::Rejected(AllowError::TooManyRequests)) => {
                println!("probe quota exhausted");
            }
            Err(err) => println!("call failed: {}", err),
        }

        let counts = breaker.counts();
        println!(
            "  state: {}, failure ratio: {:.2}",
            breaker.state(),
            counts.failure_ratio()
        );
    }
}
