//! # Control tasks
//!
//! Every controller run by the executable implements [`ControlTask`]. Tasks
//! are run in order by a [`ControlPipeline`], each one filling in its part of
//! the same [`ControlCommand`], so that a later task may read what an earlier
//! one wrote (e.g. the longitudinal controller reads the steering target set
//! by a lateral controller).

// ---------------------------------------------------------------------------
// IMPORTS
// ---------------------------------------------------------------------------

// External
use log::{debug, info, warn};
use thiserror::Error;

// Internal
use comms_if::{
    ctrl::ControlCommand,
    eqpt::{chassis::Chassis, loc::VehicleState},
    planning::Trajectory,
};

// ---------------------------------------------------------------------------
// DATA STRUCTURES
// ---------------------------------------------------------------------------

/// The inputs to a single control cycle.
///
/// The snapshots are only borrowed for the duration of the cycle.
#[derive(Debug, Copy, Clone)]
pub struct CtrlInput<'a> {
    pub vehicle_state: &'a VehicleState,

    pub chassis: &'a Chassis,

    pub trajectory: &'a Trajectory,

    /// Time at which this cycle is run, on the same clock as the
    /// trajectory's header time.
    ///
    /// Units: seconds
    pub timestamp_s: f64,
}

/// An ordered list of control tasks run each cycle.
#[derive(Default)]
pub struct ControlPipeline {
    tasks: Vec<Box<dyn ControlTask>>,
}

// ---------------------------------------------------------------------------
// ENUMERATIONS
// ---------------------------------------------------------------------------

#[derive(Debug, Error)]
pub enum TaskError {
    #[error("Task initialisation failed: {0}")]
    Init(String),

    #[error("Task failed to compute a command: {0}")]
    Compute(String),
}

// ---------------------------------------------------------------------------
// TRAITS
// ---------------------------------------------------------------------------

/// A controller which contributes to the control command.
pub trait ControlTask: Send {
    /// Human readable name of the task.
    fn name(&self) -> &str;

    /// Initialise the task, must be called before the first call to
    /// `compute_command`.
    fn init(&mut self) -> Result<(), TaskError>;

    /// Compute this task's part of the command for the current cycle.
    ///
    /// On error the command is left as it was.
    fn compute_command(
        &mut self,
        input: &CtrlInput,
        cmd: &mut ControlCommand,
    ) -> Result<(), TaskError>;

    /// Reset any state carried between cycles.
    fn reset(&mut self) -> Result<(), TaskError>;

    /// Release any resources held by the task.
    fn stop(&mut self);

    /// State carried between cycles, for saving at the end of a run.
    fn state_json(&self) -> Option<serde_json::Value> {
        None
    }
}

// ---------------------------------------------------------------------------
// IMPLEMENTATIONS
// ---------------------------------------------------------------------------

impl ControlPipeline {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a task to the end of the pipeline.
    pub fn push(&mut self, task: Box<dyn ControlTask>) {
        self.tasks.push(task);
    }

    pub fn len(&self) -> usize {
        self.tasks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tasks.is_empty()
    }

    /// Initialise all tasks in order, stopping at the first failure.
    pub fn init(&mut self) -> Result<(), TaskError> {
        for task in self.tasks.iter_mut() {
            task.init()?;
            info!("{} initialised", task.name());
        }
        Ok(())
    }

    /// Run all tasks on a fresh command.
    ///
    /// The command is only returned if every task succeeded.
    pub fn compute(&mut self, input: &CtrlInput) -> Result<ControlCommand, TaskError> {
        let mut cmd = ControlCommand::default();

        for task in self.tasks.iter_mut() {
            if let Err(e) = task.compute_command(input, &mut cmd) {
                debug!("{} failed: {}", task.name(), e);
                return Err(e);
            }
        }

        Ok(cmd)
    }

    /// Reset every task, continuing past failures and returning the first.
    pub fn reset(&mut self) -> Result<(), TaskError> {
        let mut result = Ok(());

        for task in self.tasks.iter_mut() {
            if let Err(e) = task.reset() {
                warn!("Could not reset {}: {}", task.name(), e);
                if result.is_ok() {
                    result = Err(e);
                }
            }
        }

        result
    }

    /// Stop every task.
    pub fn stop(&mut self) {
        for task in self.tasks.iter_mut() {
            task.stop();
        }
    }

    /// Access a task by index.
    pub fn task(&self, index: usize) -> Option<&dyn ControlTask> {
        self.tasks.get(index).map(|t| t.as_ref())
    }
}

// ---------------------------------------------------------------------------
// TESTS
// ---------------------------------------------------------------------------

#[cfg(test)]
mod test {
    use super::*;
    use std::sync::{Arc, Mutex};

    /// Task which records its calls and writes a steering target.
    struct Recorder {
        name: String,
        calls: Arc<Mutex<Vec<String>>>,
        fail: bool,
    }

    impl ControlTask for Recorder {
        fn name(&self) -> &str {
            &self.name
        }

        fn init(&mut self) -> Result<(), TaskError> {
            self.calls.lock().unwrap().push(format!("{}:init", self.name));
            Ok(())
        }

        fn compute_command(
            &mut self,
            _input: &CtrlInput,
            cmd: &mut ControlCommand,
        ) -> Result<(), TaskError> {
            self.calls
                .lock()
                .unwrap()
                .push(format!("{}:compute", self.name));
            if self.fail {
                return Err(TaskError::Compute("failed".into()));
            }
            cmd.steering_target += 1.0;
            Ok(())
        }

        fn reset(&mut self) -> Result<(), TaskError> {
            self.calls.lock().unwrap().push(format!("{}:reset", self.name));
            Ok(())
        }

        fn stop(&mut self) {
            self.calls.lock().unwrap().push(format!("{}:stop", self.name));
        }
    }

    fn pipeline(fail_second: bool) -> (ControlPipeline, Arc<Mutex<Vec<String>>>) {
        let calls = Arc::new(Mutex::new(Vec::new()));
        let mut pipeline = ControlPipeline::new();

        for (name, fail) in [("a", false), ("b", fail_second)].iter() {
            pipeline.push(Box::new(Recorder {
                name: name.to_string(),
                calls: calls.clone(),
                fail: *fail,
            }));
        }

        (pipeline, calls)
    }

    #[test]
    fn test_tasks_run_in_order_on_shared_command() {
        let (mut pipeline, calls) = pipeline(false);
        let vs = VehicleState::default();
        let chassis = Chassis::default();
        let traj = Trajectory::default();
        let input = CtrlInput {
            vehicle_state: &vs,
            chassis: &chassis,
            trajectory: &traj,
            timestamp_s: 0.0,
        };

        pipeline.init().unwrap();
        let cmd = pipeline.compute(&input).unwrap();
        pipeline.stop();

        assert_eq!(cmd.steering_target, 2.0);
        assert_eq!(
            *calls.lock().unwrap(),
            vec!["a:init", "b:init", "a:compute", "b:compute", "a:stop", "b:stop"]
        );
    }

    #[test]
    fn test_failed_task_yields_no_command() {
        let (mut pipeline, _) = pipeline(true);
        let vs = VehicleState::default();
        let chassis = Chassis::default();
        let traj = Trajectory::default();
        let input = CtrlInput {
            vehicle_state: &vs,
            chassis: &chassis,
            trajectory: &traj,
            timestamp_s: 0.0,
        };

        assert!(matches!(pipeline.compute(&input), Err(TaskError::Compute(_))));
        assert_eq!(pipeline.len(), 2);
        assert_eq!(pipeline.task(1).map(|t| t.name()), Some("b"));
    }
}
