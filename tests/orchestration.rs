//! Orchestration Integration Tests
//!
//! Sequential and parallel composition, failure propagation, connection
//! resolution and lifecycle events of orchestrated processes.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use anyhow::Result;
use async_trait::async_trait;

use swfme::builtin::{Add, Fail, MathPipeline, Multiply, Scale, Sleep};
use swfme::core::{
    AtomicProcess, Composition, LifecycleNotifier, NoopNotifier, OrchestratedProcess, Process,
};
use swfme::domain::{
    EventType, ExecutionMode, LifecycleEvent, Parameter, ParameterSet, ProcessStatus, Value,
    ValueType,
};

/// Records every event it is handed
#[derive(Default)]
struct Recorder {
    events: Mutex<Vec<LifecycleEvent>>,
}

impl Recorder {
    fn events(&self) -> Vec<LifecycleEvent> {
        self.events.lock().unwrap().clone()
    }
}

#[async_trait]
impl LifecycleNotifier for Recorder {
    async fn notify(&self, event: LifecycleEvent) {
        self.events.lock().unwrap().push(event);
    }
}

/// Waits, then computes `a + b` or `a * b`
struct Slow {
    delay: Duration,
    multiply: bool,
}

#[async_trait]
impl AtomicProcess for Slow {
    fn define_parameters(&self, input: &mut ParameterSet, output: &mut ParameterSet) {
        input
            .add(Parameter::new("a", ValueType::Int))
            .add(Parameter::new("b", ValueType::Int));
        output.add(Parameter::new("out", ValueType::Int));
    }

    async fn execute_impl(&self, input: &ParameterSet, output: &mut ParameterSet) -> Result<()> {
        tokio::time::sleep(self.delay).await;
        let (a, b) = (input.int("a")?, input.int("b")?);
        output.set("out", if self.multiply { a * b } else { a + b })?;
        Ok(())
    }
}

struct Panics;

#[async_trait]
impl AtomicProcess for Panics {
    fn define_parameters(&self, _input: &mut ParameterSet, _output: &mut ParameterSet) {}

    async fn execute_impl(&self, _input: &ParameterSet, _output: &mut ParameterSet) -> Result<()> {
        panic!("worker exploded")
    }
}

/// Add(a, b) -> Multiply(sum, 2) -> result
#[derive(Default)]
struct AddThenDouble {
    compositions: Arc<AtomicUsize>,
}

impl OrchestratedProcess for AddThenDouble {
    fn define_parameters(&self, input: &mut ParameterSet, output: &mut ParameterSet) {
        input
            .add(Parameter::new("a", ValueType::Int))
            .add(Parameter::new("b", ValueType::Int));
        output.add(Parameter::new("result", ValueType::Int));
    }

    fn orchestrate(&self, plan: &mut Composition) -> Result<()> {
        self.compositions.fetch_add(1, Ordering::SeqCst);

        let add = plan.sequential(Process::atomic(Add));
        plan.connect(plan.input("a"), add.input("a"));
        plan.connect(plan.input("b"), add.input("b"));

        let mut multiply = Process::atomic(Multiply);
        multiply.input_mut().set("factor", 2)?;
        let multiply = plan.sequential(multiply);
        plan.connect(add.output("sum"), multiply.input("number"));

        plan.connect(multiply.output("result"), plan.output("result"));
        Ok(())
    }
}

/// [SlowAdd || SlowMultiply] over the same inputs
struct AddAndMultiply {
    add_delay: Duration,
    multiply_delay: Duration,
}

impl OrchestratedProcess for AddAndMultiply {
    fn define_parameters(&self, input: &mut ParameterSet, output: &mut ParameterSet) {
        input
            .add(Parameter::new("a", ValueType::Int))
            .add(Parameter::new("b", ValueType::Int));
        output
            .add(Parameter::new("sum", ValueType::Int))
            .add(Parameter::new("product", ValueType::Int));
    }

    fn orchestrate(&self, plan: &mut Composition) -> Result<()> {
        let add = plan.parallel(
            Process::atomic(Slow {
                delay: self.add_delay,
                multiply: false,
            })
            .named("SlowAdd"),
        );
        let multiply = plan.parallel(
            Process::atomic(Slow {
                delay: self.multiply_delay,
                multiply: true,
            })
            .named("SlowMultiply"),
        );

        for child in [&add, &multiply] {
            plan.connect(plan.input("a"), child.input("a"));
            plan.connect(plan.input("b"), child.input("b"));
        }
        plan.connect(add.output("out"), plan.output("sum"));
        plan.connect(multiply.output("out"), plan.output("product"));
        Ok(())
    }
}

/// Children supplied by a closure, with no parameters of its own
struct Custom<F>(F);

impl<F> OrchestratedProcess for Custom<F>
where
    F: Fn(&mut Composition) -> Result<()> + Send + Sync + 'static,
{
    fn define_parameters(&self, _input: &mut ParameterSet, output: &mut ParameterSet) {
        output.add(Parameter::new("value", ValueType::Any).optional());
    }

    fn orchestrate(&self, plan: &mut Composition) -> Result<()> {
        (self.0)(plan)
    }
}

/// Orchestration whose children come from `compose`
fn custom<F>(compose: F) -> Process
where
    F: Fn(&mut Composition) -> Result<()> + Send + Sync + 'static,
{
    Process::orchestrated(Custom(compose))
}

fn sleep_for(ms: i64) -> Process {
    let mut sleep = Process::atomic(Sleep);
    sleep.input_mut().set("delay_ms", ms).unwrap();
    sleep
}

fn failing(message: &str) -> Process {
    let mut fail = Process::atomic(Fail);
    fail.input_mut().set("message", message).unwrap();
    fail
}

#[tokio::test]
async fn test_sequential_composition() {
    let mut process = Process::orchestrated(AddThenDouble::default());
    process.input_mut().set("a", 10).unwrap();
    process.input_mut().set("b", 5).unwrap();

    assert!(process.execute(&NoopNotifier).await);
    assert_eq!(process.status(), ProcessStatus::Completed);
    assert_eq!(process.output().int("result").unwrap(), 30);
    assert_eq!(process.child("Add").unwrap().output().int("sum").unwrap(), 15);
}

#[tokio::test]
async fn test_parallel_group_runs_concurrently() {
    let mut process = Process::orchestrated(AddAndMultiply {
        add_delay: Duration::from_millis(200),
        multiply_delay: Duration::from_millis(300),
    });
    process.input_mut().set("a", 6).unwrap();
    process.input_mut().set("b", 4).unwrap();

    let started = Instant::now();
    assert!(process.execute(&NoopNotifier).await);
    let elapsed = started.elapsed();

    assert_eq!(process.output().int("sum").unwrap(), 10);
    assert_eq!(process.output().int("product").unwrap(), 24);
    assert!(elapsed >= Duration::from_millis(300));
    assert!(elapsed < Duration::from_millis(480), "took {:?}", elapsed);

    let groups = process.execution_groups();
    assert_eq!(groups.len(), 1);
    assert_eq!(groups[0].mode(), ExecutionMode::Parallel);
}

#[tokio::test]
async fn test_failure_names_child_and_stops_later_groups() {
    let mut process = custom(|plan| {
        plan.sequential(failing("boom"));
        plan.sequential(Process::atomic(Add));
        Ok(())
    });

    assert!(!process.execute(&NoopNotifier).await);
    assert_eq!(process.status(), ProcessStatus::Failed);

    let error = process.error().unwrap();
    assert!(error.contains("Fail"), "{}", error);
    assert!(error.contains("boom"), "{}", error);

    assert_eq!(process.child("Fail").unwrap().status(), ProcessStatus::Failed);
    assert_eq!(process.child("Add").unwrap().status(), ProcessStatus::Pending);
}

#[tokio::test]
async fn test_parallel_failure_does_not_cancel_siblings() {
    let mut process = custom(|plan| {
        plan.parallel(failing("first"));
        plan.parallel(sleep_for(100));
        plan.parallel(failing("second").named("AlsoFails"));
        plan.sequential(Process::atomic(Add));
        Ok(())
    });

    assert!(!process.execute(&NoopNotifier).await);

    // First failure in declaration order is reported
    assert_eq!(process.error(), Some("Process 'Fail' failed: first"));
    assert_eq!(process.child("Sleep").unwrap().status(), ProcessStatus::Completed);
    assert_eq!(process.child("AlsoFails").unwrap().status(), ProcessStatus::Failed);
    assert_eq!(process.child("Add").unwrap().status(), ProcessStatus::Pending);
}

#[tokio::test]
async fn test_child_panic_is_contained() {
    let recorder = Recorder::default();
    let mut process = custom(|plan| {
        plan.parallel(Process::atomic(Panics));
        plan.parallel(sleep_for(10));
        Ok(())
    });

    assert!(!process.execute(&recorder).await);
    assert_eq!(
        process.error(),
        Some("Process 'Panics' failed: panicked: worker exploded")
    );

    let child = process.child("Panics").unwrap();
    assert_eq!(child.status(), ProcessStatus::Failed);
    assert!(child.input().iter().all(|p| !p.is_locked()));
    assert_eq!(process.child("Sleep").unwrap().status(), ProcessStatus::Completed);

    let child_events: Vec<_> = recorder
        .events()
        .into_iter()
        .filter(|e| e.process_id == child.id())
        .map(|e| e.event_type)
        .collect();
    assert_eq!(
        child_events,
        vec![EventType::ProcessStarted, EventType::ProcessFailed]
    );
}

#[tokio::test]
async fn test_sequential_child_panic_ends_with_failed_event() {
    let recorder = Recorder::default();
    let mut process = custom(|plan| {
        plan.sequential(Process::atomic(Panics));
        plan.sequential(sleep_for(10));
        Ok(())
    });

    assert!(!process.execute(&recorder).await);
    let child = process.child("Panics").unwrap();
    assert_eq!(child.status(), ProcessStatus::Failed);
    assert_eq!(child.error(), Some("panicked: worker exploded"));
    assert_eq!(process.child("Sleep").unwrap().status(), ProcessStatus::Pending);

    let failed: Vec<_> = recorder
        .events()
        .into_iter()
        .filter(|e| e.event_type == EventType::ProcessFailed)
        .map(|e| e.process_name)
        .collect();
    assert_eq!(failed, vec!["Panics".to_string(), "Custom".to_string()]);
}

#[tokio::test]
async fn test_composition_runs_once() {
    let compositions = Arc::new(AtomicUsize::new(0));
    let mut process = Process::orchestrated(AddThenDouble {
        compositions: Arc::clone(&compositions),
    });

    assert!(process.compose().unwrap());
    assert!(!process.compose().unwrap());
    assert_eq!(process.children().len(), 2);
    assert_eq!(process.connection_count(), 4);

    process.input_mut().set("a", 1).unwrap();
    process.input_mut().set("b", 2).unwrap();
    assert!(process.execute(&NoopNotifier).await);
    assert_eq!(process.output().int("result").unwrap(), 6);

    process.input_mut().set("a", 4).unwrap();
    assert!(process.execute(&NoopNotifier).await);
    assert_eq!(process.output().int("result").unwrap(), 12);

    assert_eq!(compositions.load(Ordering::SeqCst), 1);
    assert_eq!(process.children().len(), 2);
}

#[tokio::test]
async fn test_inputs_unlocked_after_orchestration() {
    let mut ok = Process::orchestrated(AddThenDouble::default());
    ok.input_mut().set("a", 1).unwrap();
    ok.input_mut().set("b", 1).unwrap();
    assert!(ok.execute(&NoopNotifier).await);

    let mut failed = Process::orchestrated(AddThenDouble::default());
    failed.input_mut().set("a", i64::MAX).unwrap();
    failed.input_mut().set("b", 1).unwrap();
    assert!(!failed.execute(&NoopNotifier).await);
    assert!(failed.error().unwrap().contains("Add"));

    for process in [&ok, &failed] {
        assert!(process.input().iter().all(|p| !p.is_locked()));
        for child in process.children() {
            assert!(child.process().input().iter().all(|p| !p.is_locked()));
        }
    }
}

#[tokio::test]
async fn test_unresolved_connection_fails_composition() {
    let mut process = custom(|plan| {
        let add = plan.sequential(Process::atomic(Add));
        plan.connect(add.output("total"), plan.output("value"));
        Ok(())
    });

    let err = process.compose().unwrap_err();
    assert!(err.to_string().contains("total"), "{}", err);
    // Nothing was committed, so composition is attempted again
    assert!(process.compose().is_err());
    assert!(process.children().is_empty());

    assert!(!process.execute(&NoopNotifier).await);
    assert!(process.error().unwrap().contains("child[0].output.total"));
}

#[tokio::test]
async fn test_connection_type_mismatch_fails_orchestration() {
    let mut process = custom(|plan| {
        let mut add = Process::atomic(Add);
        add.input_mut().set("a", 1)?;
        add.input_mut().set("b", 2)?;
        let add = plan.sequential(add);
        let scale = plan.sequential(Process::atomic(Scale));
        plan.connect(add.output("sum"), scale.input("value"));
        Ok(())
    });

    assert!(!process.execute(&NoopNotifier).await);
    assert_eq!(
        process.error(),
        Some("Parameter 'value' expects type float, got int")
    );
}

#[tokio::test]
async fn test_last_connection_to_a_target_wins() {
    let mut process = custom(|plan| {
        let mut first = Process::atomic(Add).named("First");
        first.input_mut().set("a", 1)?;
        first.input_mut().set("b", 1)?;
        let first = plan.sequential(first);

        let mut second = Process::atomic(Add).named("Second");
        second.input_mut().set("a", 20)?;
        second.input_mut().set("b", 20)?;
        let second = plan.sequential(second);

        plan.connect(second.output("sum"), plan.output("value"));
        plan.connect(first.output("sum"), plan.output("value"));
        Ok(())
    });

    assert!(process.execute(&NoopNotifier).await);
    assert_eq!(process.output().value("value").unwrap(), &Value::Int(2));
}

#[tokio::test]
async fn test_connections_reach_into_nested_orchestrations() {
    let mut process = custom(|plan| {
        let mut math = Process::orchestrated(MathPipeline);
        math.input_mut().set("a", 3)?;
        math.input_mut().set("b", 5)?;
        math.input_mut().set("factor", 1.5)?;
        let math = plan.sequential(math);

        // Add is the first child of the nested pipeline
        plan.connect(math.child(0).output("sum"), plan.output("value"));
        Ok(())
    });

    assert!(process.execute(&NoopNotifier).await, "{:?}", process.error());
    assert_eq!(process.output().value("value").unwrap(), &Value::Int(8));

    let math = process.child("MathPipeline").unwrap();
    assert_eq!(math.output().float("result").unwrap(), 6.0);
    assert_eq!(math.children().len(), 3);
}

#[tokio::test]
async fn test_lifecycle_event_sequence() {
    let recorder = Recorder::default();
    let mut process = Process::orchestrated(AddThenDouble::default()).named("Pipeline");
    process.input_mut().set("a", 2).unwrap();
    process.input_mut().set("b", 3).unwrap();

    assert!(process.execute(&recorder).await);

    let events = recorder.events();
    let trace: Vec<(EventType, &str)> = events
        .iter()
        .map(|e| (e.event_type, e.process_name.as_str()))
        .collect();
    assert_eq!(
        trace,
        vec![
            (EventType::ProcessStarted, "Pipeline"),
            (EventType::GroupStarted, "Pipeline"),
            (EventType::ProcessStarted, "Add"),
            (EventType::ProcessCompleted, "Add"),
            (EventType::GroupCompleted, "Pipeline"),
            (EventType::GroupStarted, "Pipeline"),
            (EventType::ProcessStarted, "Multiply"),
            (EventType::ProcessCompleted, "Multiply"),
            (EventType::GroupCompleted, "Pipeline"),
            (EventType::ProcessCompleted, "Pipeline"),
        ]
    );

    let group_started = &events[5];
    assert_eq!(group_started.group_index, Some(1));
    assert_eq!(group_started.group_size, Some(1));
    assert_eq!(group_started.execution_mode, Some(ExecutionMode::Sequential));
    assert_eq!(events[4].group_index, Some(0));
    assert_eq!(events.last().unwrap().process_class, "AddThenDouble");
}

#[tokio::test]
async fn test_parallel_group_event_carries_size_and_mode() {
    let recorder = Recorder::default();
    let mut process = Process::orchestrated(AddAndMultiply {
        add_delay: Duration::from_millis(1),
        multiply_delay: Duration::from_millis(1),
    });
    process.input_mut().set("a", 1).unwrap();
    process.input_mut().set("b", 1).unwrap();
    process.execute(&recorder).await;

    let events = recorder.events();
    let group = events
        .iter()
        .find(|e| e.event_type == EventType::GroupStarted)
        .unwrap();
    assert_eq!(group.group_size, Some(2));
    assert_eq!(group.execution_mode, Some(ExecutionMode::Parallel));

    let json = serde_json::to_value(group).unwrap();
    assert_eq!(json["type"], "process.group_started");
    assert_eq!(json["execution_mode"], "parallel");
}

#[tokio::test]
async fn test_snapshot_includes_children() {
    let mut process = Process::orchestrated(AddThenDouble::default());
    process.input_mut().set("a", 1).unwrap();
    process.input_mut().set("b", 2).unwrap();
    process.execute(&NoopNotifier).await;

    let snapshot = process.snapshot();
    assert_eq!(snapshot.children.len(), 2);
    assert_eq!(snapshot.process_count(), 3);
    assert_eq!(
        snapshot.child("Multiply").unwrap().status,
        ProcessStatus::Completed
    );

    let json = serde_json::to_value(&snapshot).unwrap();
    assert_eq!(json["kind"], "orchestrated");
    assert_eq!(json["children"][0]["execution_mode"], "sequential");
}
