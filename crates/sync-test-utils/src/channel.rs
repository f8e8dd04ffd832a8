//! [`ScriptedChannel`]: a channel executor driven by a list of steps.

use std::collections::VecDeque;
use std::sync::{Arc, Barrier, Mutex};

use sync_core::{Channel, ChannelError, ChannelExecutor, OperationParams, Outcome, RunContext};

/// What the scripted channel does on one call
#[derive(Clone)]
pub enum Step {
    /// Return success with this summary
    Succeed(&'static str),
    /// Fail with a retryable error
    FailRetryable(&'static str),
    /// Fail with a permanent error
    FailPermanent(&'static str),
    /// Wait on the barrier twice (entered, then release) and succeed.
    ///
    /// Lets a test observe the locks while the run is executing.
    Pause(Arc<Barrier>),
    /// Send a heartbeat, failing the call if the locks were lost
    Heartbeat,
}

/// Executor that pops one [`Step`] per call and records every call.
///
/// An empty script succeeds. Clones share the script and the call log.
#[derive(Clone)]
pub struct ScriptedChannel {
    channel: Channel,
    script: Arc<Mutex<VecDeque<Step>>>,
    calls: Arc<Mutex<Vec<OperationParams>>>,
}

impl ScriptedChannel {
    pub fn new(channel: Channel) -> Self {
        Self {
            channel,
            script: Arc::new(Mutex::new(VecDeque::new())),
            calls: Arc::new(Mutex::new(Vec::new())),
        }
    }

    /// Append a step to the script
    pub fn then(self, step: Step) -> Self {
        self.script.lock().unwrap().push_back(step);
        self
    }

    /// Every operation executed so far, in order
    pub fn calls(&self) -> Vec<OperationParams> {
        self.calls.lock().unwrap().clone()
    }

    pub fn call_count(&self) -> usize {
        self.calls.lock().unwrap().len()
    }
}

impl ChannelExecutor for ScriptedChannel {
    fn channel(&self) -> Channel {
        self.channel
    }

    fn execute(&self, ctx: &RunContext<'_>, params: &OperationParams) -> Result<Outcome, ChannelError> {
        self.calls.lock().unwrap().push(params.clone());
        let step = self.script.lock().unwrap().pop_front();

        match step {
            None => Ok(Outcome::new(format!("{} done", params.operation))),
            Some(Step::Succeed(summary)) => Ok(Outcome::new(summary)),
            Some(Step::FailRetryable(message)) => Err(ChannelError::retryable(self.channel, message)),
            Some(Step::FailPermanent(message)) => Err(ChannelError::permanent(self.channel, message)),
            Some(Step::Pause(barrier)) => {
                barrier.wait();
                barrier.wait();
                Ok(Outcome::new("resumed"))
            }
            Some(Step::Heartbeat) => ctx
                .heartbeat()
                .map(|()| Outcome::new("heartbeat sent"))
                .map_err(|e| ChannelError::retryable(self.channel, e.to_string())),
        }
    }
}
