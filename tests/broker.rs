//! Broker integration tests using scripted in-memory drivers.

use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use netbroker::error::DriverError;
use netbroker::{Broker, Device, Driver, DriverFactory, DriverRegistry, Error, ErrorKind, Inventory};

/// Echoes each command back, optionally sleeping first. The per-device
/// delay comes from the device's driver option overrides so one factory
/// can serve fast and slow devices in the same inventory.
struct EchoFactory {
    builds: Arc<AtomicUsize>,
}

impl EchoFactory {
    fn new() -> (Self, Arc<AtomicUsize>) {
        let builds = Arc::new(AtomicUsize::new(0));
        (
            Self {
                builds: builds.clone(),
            },
            builds,
        )
    }
}

struct EchoDriver {
    name: String,
    delay: Duration,
}

#[async_trait]
impl Driver for EchoDriver {
    async fn run_commands(
        &mut self,
        commands: &[String],
    ) -> Result<Vec<(String, String)>, DriverError> {
        tokio::time::sleep(self.delay).await;
        Ok(commands
            .iter()
            .map(|command| (command.clone(), format!("{command} from {}", self.name)))
            .collect())
    }

    async fn send_config(
        &mut self,
        commands: &[String],
        commit: bool,
    ) -> Result<String, DriverError> {
        tokio::time::sleep(self.delay).await;
        let mut output = format!("applied {} line(s)", commands.len());
        if commit {
            output.push_str(", committed");
        }
        Ok(output)
    }

    async fn is_alive(&mut self) -> Result<bool, DriverError> {
        tokio::time::sleep(self.delay).await;
        Ok(true)
    }
}

impl DriverFactory for EchoFactory {
    fn build(&self, device: &Device) -> Result<Box<dyn Driver>, DriverError> {
        self.builds.fetch_add(1, Ordering::SeqCst);
        let delay_ms = device
            .driver_overrides()
            .and_then(|overrides| overrides.get("delay_ms"))
            .and_then(|value| value.as_u64())
            .unwrap_or(0);
        Ok(Box::new(EchoDriver {
            name: device.name.clone(),
            delay: Duration::from_millis(delay_ms),
        }))
    }
}

/// Fails every operation with a backend error.
struct FailFactory;

struct FailDriver;

#[async_trait]
impl Driver for FailDriver {
    async fn run_commands(
        &mut self,
        _commands: &[String],
    ) -> Result<Vec<(String, String)>, DriverError> {
        Err(DriverError::Backend {
            message: "simulated backend fault".to_string(),
        })
    }

    async fn send_config(
        &mut self,
        _commands: &[String],
        _commit: bool,
    ) -> Result<String, DriverError> {
        Err(DriverError::Backend {
            message: "simulated backend fault".to_string(),
        })
    }

    async fn is_alive(&mut self) -> Result<bool, DriverError> {
        Err(DriverError::Backend {
            message: "simulated probe fault".to_string(),
        })
    }
}

impl DriverFactory for FailFactory {
    fn build(&self, _device: &Device) -> Result<Box<dyn Driver>, DriverError> {
        Ok(Box::new(FailDriver))
    }
}

/// Never finishes any operation.
struct HangFactory;

struct HangDriver;

#[async_trait]
impl Driver for HangDriver {
    async fn run_commands(
        &mut self,
        _commands: &[String],
    ) -> Result<Vec<(String, String)>, DriverError> {
        tokio::time::sleep(Duration::from_secs(3600)).await;
        Ok(Vec::new())
    }

    async fn send_config(
        &mut self,
        _commands: &[String],
        _commit: bool,
    ) -> Result<String, DriverError> {
        tokio::time::sleep(Duration::from_secs(3600)).await;
        Ok(String::new())
    }

    async fn is_alive(&mut self) -> Result<bool, DriverError> {
        tokio::time::sleep(Duration::from_secs(3600)).await;
        Ok(true)
    }
}

impl DriverFactory for HangFactory {
    fn build(&self, _device: &Device) -> Result<Box<dyn Driver>, DriverError> {
        Ok(Box::new(HangDriver))
    }
}

/// Panics mid-operation, simulating a driver bug.
struct PanicFactory;

struct PanicDriver;

#[async_trait]
impl Driver for PanicDriver {
    async fn run_commands(
        &mut self,
        _commands: &[String],
    ) -> Result<Vec<(String, String)>, DriverError> {
        panic!("driver bug");
    }

    async fn send_config(
        &mut self,
        _commands: &[String],
        _commit: bool,
    ) -> Result<String, DriverError> {
        panic!("driver bug");
    }

    async fn is_alive(&mut self) -> Result<bool, DriverError> {
        panic!("driver bug");
    }
}

impl DriverFactory for PanicFactory {
    fn build(&self, _device: &Device) -> Result<Box<dyn Driver>, DriverError> {
        Ok(Box::new(PanicDriver))
    }
}

/// Violates the run_commands contract: answers only the first command.
struct TruncatingFactory;

struct TruncatingDriver;

#[async_trait]
impl Driver for TruncatingDriver {
    async fn run_commands(
        &mut self,
        commands: &[String],
    ) -> Result<Vec<(String, String)>, DriverError> {
        Ok(commands
            .iter()
            .take(1)
            .map(|command| (command.clone(), "partial".to_string()))
            .collect())
    }

    async fn send_config(
        &mut self,
        _commands: &[String],
        _commit: bool,
    ) -> Result<String, DriverError> {
        Ok(String::new())
    }

    async fn is_alive(&mut self) -> Result<bool, DriverError> {
        Ok(true)
    }
}

impl DriverFactory for TruncatingFactory {
    fn build(&self, _device: &Device) -> Result<Box<dyn Driver>, DriverError> {
        Ok(Box::new(TruncatingDriver))
    }
}

/// Answers the wrong command name.
struct MislabelingFactory;

struct MislabelingDriver;

#[async_trait]
impl Driver for MislabelingDriver {
    async fn run_commands(
        &mut self,
        commands: &[String],
    ) -> Result<Vec<(String, String)>, DriverError> {
        Ok(commands
            .iter()
            .map(|_| ("something else".to_string(), "output".to_string()))
            .collect())
    }

    async fn send_config(
        &mut self,
        _commands: &[String],
        _commit: bool,
    ) -> Result<String, DriverError> {
        Ok(String::new())
    }

    async fn is_alive(&mut self) -> Result<bool, DriverError> {
        Ok(true)
    }
}

impl DriverFactory for MislabelingFactory {
    fn build(&self, _device: &Device) -> Result<Box<dyn Driver>, DriverError> {
        Ok(Box::new(MislabelingDriver))
    }
}

/// Probe completes but the device is down.
struct DownFactory;

struct DownDriver;

#[async_trait]
impl Driver for DownDriver {
    async fn run_commands(
        &mut self,
        _commands: &[String],
    ) -> Result<Vec<(String, String)>, DriverError> {
        Err(DriverError::ConnectionFailed {
            host: "10.0.0.9".to_string(),
            port: 22,
            message: "connection refused".to_string(),
        })
    }

    async fn send_config(
        &mut self,
        _commands: &[String],
        _commit: bool,
    ) -> Result<String, DriverError> {
        Err(DriverError::ConnectionFailed {
            host: "10.0.0.9".to_string(),
            port: 22,
            message: "connection refused".to_string(),
        })
    }

    async fn is_alive(&mut self) -> Result<bool, DriverError> {
        Ok(false)
    }
}

impl DriverFactory for DownFactory {
    fn build(&self, _device: &Device) -> Result<Box<dyn Driver>, DriverError> {
        Ok(Box::new(DownDriver))
    }
}

fn test_broker() -> (Broker, Arc<AtomicUsize>) {
    let _ = env_logger::builder().is_test(true).try_init();
    let mut registry = DriverRegistry::with_builtin_drivers();
    let (echo, builds) = EchoFactory::new();
    registry.register("echo", echo).unwrap();
    registry.register("fail", FailFactory).unwrap();
    registry.register("hang", HangFactory).unwrap();
    registry.register("panic", PanicFactory).unwrap();
    registry.register("truncating", TruncatingFactory).unwrap();
    registry.register("mislabeling", MislabelingFactory).unwrap();
    registry.register("down", DownFactory).unwrap();
    (Broker::new(Arc::new(registry)), builds)
}

fn echo_device(name: &str, delay_ms: u64) -> Device {
    Device::new(name, format!("10.0.0.{name}"))
        .with_driver("echo")
        .with_driver_options("echo", serde_json::json!({"delay_ms": delay_ms}))
}

fn commands(items: &[&str]) -> Vec<String> {
    items.iter().map(|s| s.to_string()).collect()
}

#[tokio::test]
async fn batch_results_in_inventory_order() {
    let (broker, _) = test_broker();
    let inventory = Inventory::new(vec![
        echo_device("1", 100),
        echo_device("2", 0),
        echo_device("3", 50),
    ])
    .unwrap();

    let results = broker
        .run_commands(&inventory, &commands(&["show version"]), None)
        .await
        .unwrap();

    assert_eq!(results.len(), 3);
    assert_eq!(results[0].name, "1");
    assert_eq!(results[1].name, "2");
    assert_eq!(results[2].name, "3");
    assert_eq!(results[0].output.as_deref(), Some("show version from 1"));
    assert!(results.all_succeeded());
}

#[tokio::test]
async fn batch_flattens_one_entry_per_command() {
    let (broker, _) = test_broker();
    let inventory = Inventory::new(vec![echo_device("1", 0), echo_device("2", 0)]).unwrap();

    let results = broker
        .run_commands(&inventory, &commands(&["uptime", "whoami"]), None)
        .await
        .unwrap();

    assert_eq!(results.len(), 4);
    assert_eq!(results[0].command.as_deref(), Some("uptime"));
    assert_eq!(results[1].command.as_deref(), Some("whoami"));
    assert_eq!(results[2].name, "2");
    assert_eq!(results[2].command.as_deref(), Some("uptime"));
}

#[tokio::test]
async fn failing_device_does_not_affect_siblings() {
    let (broker, _) = test_broker();
    let inventory = Inventory::new(vec![
        echo_device("1", 0),
        Device::new("bad", "10.0.0.8").with_driver("fail"),
        echo_device("3", 0),
    ])
    .unwrap();

    let results = broker
        .run_commands(&inventory, &commands(&["uptime", "whoami"]), None)
        .await
        .unwrap();

    // Two entries per healthy device, one failure entry for the bad one.
    assert_eq!(results.len(), 5);
    assert!(results[0].success && results[1].success);
    let failure = &results[2];
    assert_eq!(failure.name, "bad");
    assert!(!failure.success);
    assert_eq!(failure.error_type, Some(ErrorKind::Driver));
    assert!(failure.error.as_deref().unwrap().contains("simulated"));
    assert!(failure.output.is_none());
    assert!(results[3].success && results[4].success);
}

#[tokio::test]
async fn slow_device_times_out_without_stalling_batch() {
    let (broker, _) = test_broker();
    let inventory = Inventory::new(vec![
        Device::new("stuck", "10.0.0.7").with_driver("hang"),
        echo_device("2", 0),
    ])
    .unwrap();

    let started = std::time::Instant::now();
    let results = broker
        .run_commands(
            &inventory,
            &commands(&["show version"]),
            Some(Duration::from_millis(50)),
        )
        .await
        .unwrap();

    // The hang driver sleeps for an hour; the deadline must cut it loose.
    assert!(started.elapsed() < Duration::from_secs(5));
    assert_eq!(results.len(), 2);
    assert_eq!(results[0].error_type, Some(ErrorKind::Timeout));
    assert!(results[0].error.as_deref().unwrap().contains("timed out"));
    assert!(results[1].success);
}

#[tokio::test]
async fn panicking_task_becomes_failure_entry() {
    let (broker, _) = test_broker();
    let inventory = Inventory::new(vec![
        echo_device("1", 0),
        Device::new("buggy", "10.0.0.6").with_driver("panic"),
    ])
    .unwrap();

    let results = broker
        .run_commands(&inventory, &commands(&["uptime"]), None)
        .await
        .unwrap();

    assert_eq!(results.len(), 2);
    assert!(results[0].success);
    let failure = &results[1];
    assert_eq!(failure.name, "buggy");
    assert_eq!(failure.error_type, Some(ErrorKind::Unexpected));
    assert!(failure.error.as_deref().unwrap().contains("buggy"));
}

#[tokio::test]
async fn unknown_driver_becomes_resolve_failure() {
    let (broker, _) = test_broker();
    let inventory = Inventory::new(vec![
        Device::new("mystery", "10.0.0.5").with_driver("telnet"),
        echo_device("2", 0),
    ])
    .unwrap();

    let results = broker
        .run_commands(&inventory, &commands(&["uptime"]), None)
        .await
        .unwrap();

    assert_eq!(results[0].error_type, Some(ErrorKind::Resolve));
    assert!(results[0].error.as_deref().unwrap().contains("telnet"));
    assert!(results[1].success);
}

#[tokio::test]
async fn contract_violations_are_reported() {
    let (broker, _) = test_broker();
    let inventory = Inventory::new(vec![
        Device::new("short", "10.0.0.4").with_driver("truncating"),
        Device::new("wrong", "10.0.0.3").with_driver("mislabeling"),
    ])
    .unwrap();

    let results = broker
        .run_commands(&inventory, &commands(&["uptime", "whoami"]), None)
        .await
        .unwrap();

    assert_eq!(results.len(), 2);
    assert_eq!(results[0].error_type, Some(ErrorKind::Contract));
    assert!(results[0].error.as_deref().unwrap().contains("2 command(s)"));
    assert_eq!(results[1].error_type, Some(ErrorKind::Contract));
    assert!(results[1].error.as_deref().unwrap().contains("uptime"));
}

#[tokio::test]
async fn empty_commands_rejected_before_spawning() {
    let (broker, builds) = test_broker();
    let inventory = Inventory::new(vec![echo_device("1", 0)]).unwrap();

    let err = broker.run_commands(&inventory, &[], None).await.unwrap_err();
    assert!(matches!(err, Error::Precondition(_)));
    assert_eq!(builds.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn empty_inventory_rejected() {
    let (broker, _) = test_broker();
    let inventory = Inventory::new(Vec::new()).unwrap();

    let err = broker
        .run_commands(&inventory, &commands(&["uptime"]), None)
        .await
        .unwrap_err();
    assert!(matches!(err, Error::Precondition(_)));

    let err = broker.is_alive(&inventory, None).await.unwrap_err();
    assert!(matches!(err, Error::Precondition(_)));
}

#[tokio::test]
async fn fresh_driver_instance_per_operation() {
    let (broker, builds) = test_broker();
    let inventory = Inventory::new(vec![echo_device("1", 0), echo_device("2", 0)]).unwrap();

    broker
        .run_commands(&inventory, &commands(&["uptime"]), None)
        .await
        .unwrap();
    broker
        .run_commands(&inventory, &commands(&["uptime"]), None)
        .await
        .unwrap();

    // One build per device per operation, never reused.
    assert_eq!(builds.load(Ordering::SeqCst), 4);
}

#[tokio::test]
async fn streaming_yields_in_completion_order() {
    let (broker, _) = test_broker();
    let inventory =
        Inventory::new(vec![echo_device("slow", 200), echo_device("fast", 0)]).unwrap();

    let mut stream = broker
        .run_commands_streaming(&inventory, &commands(&["uptime"]), None)
        .unwrap();

    assert_eq!(stream.device_count(), 2);
    let first = stream.next().await.unwrap();
    assert_eq!(first[0].name, "fast");
    assert_eq!(stream.remaining(), 1);
    let second = stream.next().await.unwrap();
    assert_eq!(second[0].name, "slow");
    assert!(stream.next().await.is_none());
}

#[tokio::test]
async fn streaming_reports_panicked_devices() {
    let (broker, _) = test_broker();
    let inventory = Inventory::new(vec![
        echo_device("1", 0),
        Device::new("buggy", "10.0.0.6").with_driver("panic"),
    ])
    .unwrap();

    let mut stream = broker
        .run_commands_streaming(&inventory, &commands(&["uptime"]), None)
        .unwrap();

    let mut names = Vec::new();
    while let Some(batch) = stream.next().await {
        for result in batch {
            names.push((result.name.clone(), result.success));
        }
    }

    // One entry per device, including the panicked one.
    assert_eq!(names.len(), 2);
    assert!(names.iter().any(|(name, ok)| name == "buggy" && !ok));
    assert!(names.iter().any(|(name, ok)| name == "1" && *ok));
}

#[tokio::test]
async fn send_config_yields_one_entry_per_device() {
    let (broker, _) = test_broker();
    let inventory = Inventory::new(vec![
        echo_device("1", 0),
        Device::new("bad", "10.0.0.8").with_driver("fail"),
    ])
    .unwrap();

    let results = broker
        .send_config(
            &inventory,
            &commands(&["set system host-name r1", "set system services ssh"]),
            true,
            None,
        )
        .await
        .unwrap();

    assert_eq!(results.len(), 2);
    assert!(results[0].success);
    assert_eq!(
        results[0].output.as_deref(),
        Some("applied 2 line(s), committed")
    );
    assert!(results[0].command.is_none());
    assert!(!results[1].success);
    assert_eq!(results[1].error_type, Some(ErrorKind::Driver));
}

#[tokio::test]
async fn is_alive_distinguishes_down_from_faulted() {
    let (broker, _) = test_broker();
    let inventory = Inventory::new(vec![
        echo_device("up", 0),
        Device::new("down", "10.0.0.9").with_driver("down"),
        Device::new("broken", "10.0.0.8").with_driver("fail"),
    ])
    .unwrap();

    let results = broker.is_alive(&inventory, None).await.unwrap();

    assert_eq!(results.len(), 3);
    assert!(results[0].alive && results[0].success);
    assert!(!results[1].alive && results[1].success);
    assert!(results[1].error.is_none());
    assert!(!results[2].alive && !results[2].success);
    assert_eq!(results[2].error_type, Some(ErrorKind::Driver));
}

#[tokio::test]
async fn get_config_uses_platform_commands() {
    let (broker, _) = test_broker();
    let inventory = Inventory::new(vec![
        echo_device("junos", 0).with_platform("juniper_junos"),
        echo_device("noplatform", 0),
        echo_device("odd", 0).with_platform("netbsd_toaster"),
    ])
    .unwrap();

    let results = broker.get_config(&inventory, None, None).await.unwrap();

    assert_eq!(results.len(), 3);
    assert_eq!(results[0].command.as_deref(), Some("show configuration"));
    assert!(results[0].success);
    assert!(!results[1].success);
    assert!(
        results[1]
            .error
            .as_deref()
            .unwrap()
            .contains("platform not specified")
    );
    assert!(!results[2].success);
    assert!(
        results[2]
            .error
            .as_deref()
            .unwrap()
            .contains("not supported")
    );
}

#[tokio::test]
async fn get_config_explicit_commands_skip_platform_lookup() {
    let (broker, _) = test_broker();
    let inventory = Inventory::new(vec![echo_device("noplatform", 0)]).unwrap();

    let results = broker
        .get_config(&inventory, Some(&commands(&["show running-config"])), None)
        .await
        .unwrap();

    assert!(results.all_succeeded());
    assert_eq!(results[0].command.as_deref(), Some("show running-config"));
}

#[tokio::test]
async fn results_serialize_without_null_noise() {
    let (broker, _) = test_broker();
    let inventory = Inventory::new(vec![
        echo_device("1", 0),
        Device::new("stuck", "10.0.0.7").with_driver("hang"),
    ])
    .unwrap();

    let results = broker
        .run_commands(
            &inventory,
            &commands(&["uptime"]),
            Some(Duration::from_millis(20)),
        )
        .await
        .unwrap();

    let json = serde_json::to_value(&results).unwrap();
    let success = json[0].as_object().unwrap();
    assert!(!success.contains_key("error"));
    assert!(!success.contains_key("error_type"));

    let failure = json[1].as_object().unwrap();
    assert_eq!(failure["error_type"], "TimeoutError");
    assert!(!failure.contains_key("output"));
    assert!(failure["start"].as_str().unwrap().contains('T'));
}
