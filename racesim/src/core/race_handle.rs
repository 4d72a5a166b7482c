use crate::core::handle_race::{handle_race, CancelToken, RaceOutcome};
use crate::core::network::NetworkSampler;
use crate::interfaces::snapshot_interface::RaceSnapshot;
use crate::pre::read_sim_pars::SimPars;
use anyhow::Context;
use flume::Sender;
use rand_chacha::ChaCha8Rng;
use std::thread::{self, JoinHandle};

/// RaceHandle owns a real-time race running on its own thread. Dropping the handle cancels the
/// race and waits for the driver thread, so no race outlives its handle.
#[derive(Debug)]
pub struct RaceHandle {
    cancel: CancelToken,
    thread: Option<JoinHandle<anyhow::Result<RaceOutcome>>>,
}

impl RaceHandle {
    pub fn spawn<S>(
        sim_pars: SimPars,
        rng: ChaCha8Rng,
        mut sampler: S,
        tx: Sender<RaceSnapshot>,
        realtime_factor: f64,
    ) -> anyhow::Result<RaceHandle>
    where
        S: NetworkSampler + Send + 'static,
    {
        let cancel = CancelToken::new();
        let cancel_driver = cancel.clone();

        let thread = thread::Builder::new()
            .name("race-driver".to_owned())
            .spawn(move || {
                handle_race(
                    &sim_pars,
                    rng,
                    &mut sampler,
                    Some(&tx),
                    realtime_factor,
                    &cancel_driver,
                )
            })
            .context("Failed to spawn race driver thread!")?;

        Ok(RaceHandle {
            cancel,
            thread: Some(thread),
        })
    }

    /// abort asks the driver to stop before its next step.
    pub fn abort(&self) {
        self.cancel.cancel()
    }

    pub fn is_finished(&self) -> bool {
        self.thread.as_ref().map_or(true, |t| t.is_finished())
    }

    /// join waits for the race to end and returns its outcome.
    pub fn join(mut self) -> anyhow::Result<RaceOutcome> {
        let thread = self
            .thread
            .take()
            .context("Race driver thread was already joined!")?;
        match thread.join() {
            Ok(outcome) => outcome,
            Err(_) => anyhow::bail!("Race driver thread panicked!"),
        }
    }
}

impl Drop for RaceHandle {
    fn drop(&mut self) {
        if let Some(thread) = self.thread.take() {
            self.cancel.cancel();
            let _ = thread.join();
        }
    }
}
