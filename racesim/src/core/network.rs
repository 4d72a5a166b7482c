use crate::error::RaceError;
use flume::{Receiver, RecvTimeoutError, Sender, TrySendError};
use helpers::general::{check_range, InputValueError};
use rand::Rng;
use rand_distr::{Bernoulli, Distribution, Uniform};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};
use tracing::{debug, warn};

/// NetworkSample is one network quality reading.
/// * `ping` - (ms) Round trip time
/// * `download` - (Mbps) Download throughput
/// * `upload` - (Mbps) Upload throughput
/// * `connected` - False if the connection was lost while sampling
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct NetworkSample {
    pub ping: f64,
    pub download: f64,
    pub upload: f64,
    pub connected: bool,
}

impl NetworkSample {
    /// Sentinel reading reported for an outage.
    pub const DISCONNECTED: NetworkSample = NetworkSample {
        ping: 999.0,
        download: 0.0,
        upload: 0.0,
        connected: false,
    };

    pub fn new(ping: f64, download: f64, upload: f64) -> NetworkSample {
        NetworkSample {
            ping,
            download,
            upload,
            connected: true,
        }
    }

    /// validate rejects readings with negative or non-finite values.
    pub fn validate(&self) -> Result<(), RaceError> {
        let fields = [
            ("ping", self.ping),
            ("download", self.download),
            ("upload", self.upload),
        ];
        for (field, value) in fields {
            if !value.is_finite() || value < 0.0 {
                return Err(RaceError::InvalidSample { field, value });
            }
        }
        Ok(())
    }
}

/// NetworkSampler produces one reading per competitor and tick.
pub trait NetworkSampler {
    fn sample(&mut self, competitor_id: &str) -> Result<NetworkSample, RaceError>;
}

impl<S: NetworkSampler + ?Sized> NetworkSampler for Box<S> {
    fn sample(&mut self, competitor_id: &str) -> Result<NetworkSample, RaceError> {
        (**self).sample(competitor_id)
    }
}

impl<S: NetworkSampler + ?Sized> NetworkSampler for &mut S {
    fn sample(&mut self, competitor_id: &str) -> Result<NetworkSample, RaceError> {
        (**self).sample(competitor_id)
    }
}

// -------------------------------------------------------------------------------------------------
// RANDOM SAMPLER ----------------------------------------------------------------------------------
// -------------------------------------------------------------------------------------------------

/// * `ping_range` - (ms) Range [low, high) of simulated ping values
/// * `download_range` - (Mbps) Range [low, high) of simulated download throughput
/// * `upload_range` - (Mbps) Range [low, high) of simulated upload throughput
/// * `disconnect_probability` - Probability of a simulated outage per sample
/// * `sample_timeout_ms` - (ms) Maximum time a single sample may take before it counts as an
/// outage
#[derive(Debug, Deserialize, Serialize, Clone, PartialEq)]
#[serde(default)]
pub struct SamplerPars {
    pub ping_range: [f64; 2],
    pub download_range: [f64; 2],
    pub upload_range: [f64; 2],
    pub disconnect_probability: f64,
    pub sample_timeout_ms: u64,
}

impl Default for SamplerPars {
    fn default() -> Self {
        SamplerPars {
            ping_range: [10.0, 110.0],
            download_range: [5.0, 105.0],
            upload_range: [2.0, 52.0],
            disconnect_probability: 0.05,
            sample_timeout_ms: 3000,
        }
    }
}

impl SamplerPars {
    pub fn validate(&self) -> Result<(), InputValueError> {
        check_range("ping_range", self.ping_range)?;
        check_range("download_range", self.download_range)?;
        check_range("upload_range", self.upload_range)?;
        if !(0.0..=1.0).contains(&self.disconnect_probability) {
            return Err(InputValueError::new(format!(
                "disconnect_probability must lie in [0, 1], got {}",
                self.disconnect_probability
            )));
        }
        if self.sample_timeout_ms == 0 {
            return Err(InputValueError::new("sample_timeout_ms must be positive"));
        }
        Ok(())
    }

    pub fn sample_timeout(&self) -> Duration {
        Duration::from_millis(self.sample_timeout_ms)
    }
}

/// RandomSampler draws synthetic readings from uniform ranges using an injected random number
/// generator. It keeps no state besides the generator.
#[derive(Debug, Clone)]
pub struct RandomSampler<R> {
    rng: R,
    ping: Uniform<f64>,
    download: Uniform<f64>,
    upload: Uniform<f64>,
    outage: Bernoulli,
}

impl<R: Rng> RandomSampler<R> {
    pub fn new(sampler_pars: &SamplerPars, rng: R) -> Result<RandomSampler<R>, RaceError> {
        sampler_pars.validate()?;
        let outage = Bernoulli::new(sampler_pars.disconnect_probability)
            .map_err(|e| InputValueError::new(e.to_string()))?;

        Ok(RandomSampler {
            rng,
            ping: Uniform::new(sampler_pars.ping_range[0], sampler_pars.ping_range[1]),
            download: Uniform::new(
                sampler_pars.download_range[0],
                sampler_pars.download_range[1],
            ),
            upload: Uniform::new(sampler_pars.upload_range[0], sampler_pars.upload_range[1]),
            outage,
        })
    }
}

impl<R: Rng> NetworkSampler for RandomSampler<R> {
    fn sample(&mut self, _competitor_id: &str) -> Result<NetworkSample, RaceError> {
        if self.outage.sample(&mut self.rng) {
            return Ok(NetworkSample::DISCONNECTED);
        }

        Ok(NetworkSample::new(
            self.ping.sample(&mut self.rng),
            self.download.sample(&mut self.rng),
            self.upload.sample(&mut self.rng),
        ))
    }
}

// -------------------------------------------------------------------------------------------------
// SCRIPTED SAMPLER --------------------------------------------------------------------------------
// -------------------------------------------------------------------------------------------------

/// ScriptedSampler replays a fixed sequence of readings per competitor. Once a sequence is
/// exhausted its last entry is repeated.
#[derive(Debug, Clone, Default)]
pub struct ScriptedSampler {
    scripts: HashMap<String, Vec<NetworkSample>>,
    cursors: HashMap<String, usize>,
}

impl ScriptedSampler {
    pub fn new() -> ScriptedSampler {
        ScriptedSampler::default()
    }

    pub fn with_script(mut self, competitor_id: &str, samples: Vec<NetworkSample>) -> Self {
        self.scripts.insert(competitor_id.to_owned(), samples);
        self.cursors.insert(competitor_id.to_owned(), 0);
        self
    }

    pub fn constant(self, competitor_id: &str, sample: NetworkSample) -> Self {
        self.with_script(competitor_id, vec![sample])
    }
}

impl NetworkSampler for ScriptedSampler {
    fn sample(&mut self, competitor_id: &str) -> Result<NetworkSample, RaceError> {
        let script = self
            .scripts
            .get(competitor_id)
            .filter(|s| !s.is_empty())
            .ok_or_else(|| RaceError::NoSample(competitor_id.to_owned()))?;
        let cursor = self.cursors.entry(competitor_id.to_owned()).or_insert(0);
        let idx = (*cursor).min(script.len() - 1);
        *cursor += 1;
        Ok(script[idx])
    }
}

// -------------------------------------------------------------------------------------------------
// HEALTH CHECK ------------------------------------------------------------------------------------
// -------------------------------------------------------------------------------------------------

/// HealthCheck is the connectivity boundary: it answers ok/not-ok within the given timeout.
pub trait HealthCheck {
    fn check(&mut self, timeout: Duration) -> bool;
}

impl<F: FnMut(Duration) -> bool> HealthCheck for F {
    fn check(&mut self, timeout: Duration) -> bool {
        self(timeout)
    }
}

/// HealthCheckedSampler consults the health check before every reading and reports an outage
/// when the check fails.
#[derive(Debug)]
pub struct HealthCheckedSampler<H, S> {
    health: H,
    inner: S,
    timeout: Duration,
}

impl<H: HealthCheck, S: NetworkSampler> HealthCheckedSampler<H, S> {
    pub fn new(health: H, inner: S, timeout: Duration) -> Self {
        HealthCheckedSampler {
            health,
            inner,
            timeout,
        }
    }
}

impl<H: HealthCheck, S: NetworkSampler> NetworkSampler for HealthCheckedSampler<H, S> {
    fn sample(&mut self, competitor_id: &str) -> Result<NetworkSample, RaceError> {
        if !self.health.check(self.timeout) {
            warn!(competitor = competitor_id, "health check failed");
            return Ok(NetworkSample::DISCONNECTED);
        }
        self.inner.sample(competitor_id)
    }
}

// -------------------------------------------------------------------------------------------------
// TIMED SAMPLER -----------------------------------------------------------------------------------
// -------------------------------------------------------------------------------------------------

type SampleRequest = (u64, String);
type SampleResponse = (u64, Result<NetworkSample, RaceError>);

/// TimedSampler runs a possibly slow sampler on a worker thread and waits for each reading at
/// most `timeout`. A reading that does not arrive in time, or a worker that is still busy with an
/// earlier request, is reported as an outage.
///
/// On drop the request channel is closed. An idle worker is joined, a worker still stuck in the
/// inner sampler is detached and exits as soon as that call returns.
#[derive(Debug)]
pub struct TimedSampler {
    req_tx: Sender<SampleRequest>,
    resp_rx: Receiver<SampleResponse>,
    timeout: Duration,
    seq: u64,
    pending: bool,
    worker: Option<JoinHandle<()>>,
}

impl TimedSampler {
    pub fn spawn<S>(mut inner: S, timeout: Duration) -> anyhow::Result<TimedSampler>
    where
        S: NetworkSampler + Send + 'static,
    {
        // at most one request may wait while the worker is busy
        let (req_tx, req_rx) = flume::bounded::<SampleRequest>(1);
        let (resp_tx, resp_rx) = flume::unbounded::<SampleResponse>();

        let worker = thread::Builder::new()
            .name("network-sampler".to_owned())
            .spawn(move || {
                for (seq, competitor_id) in req_rx.iter() {
                    let sample = inner.sample(&competitor_id);
                    if resp_tx.send((seq, sample)).is_err() {
                        break;
                    }
                }
            })?;

        Ok(TimedSampler {
            req_tx,
            resp_rx,
            timeout,
            seq: 0,
            pending: false,
            worker: Some(worker),
        })
    }
}

impl Drop for TimedSampler {
    fn drop(&mut self) {
        // replacing the sender closes the request channel, the worker loop ends after its
        // current request
        let (closed_tx, _) = flume::bounded(1);
        drop(std::mem::replace(&mut self.req_tx, closed_tx));

        let worker = match self.worker.take() {
            Some(worker) => worker,
            None => return,
        };
        if self.pending {
            debug!("sampler worker still busy, leaving it to finish on its own");
        } else if worker.join().is_err() {
            warn!("sampler worker panicked");
        }
    }
}

impl NetworkSampler for TimedSampler {
    fn sample(&mut self, competitor_id: &str) -> Result<NetworkSample, RaceError> {
        self.seq += 1;
        let deadline = Instant::now() + self.timeout;

        match self.req_tx.try_send((self.seq, competitor_id.to_owned())) {
            Ok(()) => self.pending = true,
            Err(TrySendError::Full(_)) => {
                warn!(competitor = competitor_id, "sampler still busy, counting as outage");
                return Ok(NetworkSample::DISCONNECTED);
            }
            Err(TrySendError::Disconnected(_)) => {
                warn!(competitor = competitor_id, "sampler worker is gone");
                return Ok(NetworkSample::DISCONNECTED);
            }
        }

        loop {
            match self.resp_rx.recv_deadline(deadline) {
                Ok((seq, sample)) if seq == self.seq => {
                    self.pending = false;
                    return sample;
                }
                Ok((seq, _)) => debug!(seq, "dropping late sample"),
                Err(RecvTimeoutError::Timeout) => {
                    warn!(
                        competitor = competitor_id,
                        timeout_ms = self.timeout.as_millis() as u64,
                        "sample timed out, counting as outage"
                    );
                    return Ok(NetworkSample::DISCONNECTED);
                }
                Err(RecvTimeoutError::Disconnected) => return Ok(NetworkSample::DISCONNECTED),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::SeedableRng;
    use rand_chacha::ChaCha8Rng;

    fn pars_without_outages() -> SamplerPars {
        SamplerPars {
            disconnect_probability: 0.0,
            ..SamplerPars::default()
        }
    }

    #[test]
    fn random_samples_stay_in_their_ranges() {
        let mut sampler =
            RandomSampler::new(&pars_without_outages(), ChaCha8Rng::seed_from_u64(7)).unwrap();

        for _ in 0..1000 {
            let s = sampler.sample("player").unwrap();
            assert!(s.connected);
            assert!((10.0..110.0).contains(&s.ping));
            assert!((5.0..105.0).contains(&s.download));
            assert!((2.0..52.0).contains(&s.upload));
        }
    }

    #[test]
    fn random_sampler_is_reproducible_for_a_seed() {
        let pars = SamplerPars::default();
        let mut a = RandomSampler::new(&pars, ChaCha8Rng::seed_from_u64(42)).unwrap();
        let mut b = RandomSampler::new(&pars, ChaCha8Rng::seed_from_u64(42)).unwrap();

        for _ in 0..100 {
            assert_eq!(a.sample("player").unwrap(), b.sample("player").unwrap());
        }
    }

    #[test]
    fn certain_outage_returns_sentinel() {
        let pars = SamplerPars {
            disconnect_probability: 1.0,
            ..SamplerPars::default()
        };
        let mut sampler = RandomSampler::new(&pars, ChaCha8Rng::seed_from_u64(1)).unwrap();

        assert_eq!(sampler.sample("opponent").unwrap(), NetworkSample::DISCONNECTED);
    }

    #[test]
    fn invalid_sampler_pars_are_rejected() {
        let pars = SamplerPars {
            upload_range: [52.0, 2.0],
            ..SamplerPars::default()
        };
        assert!(matches!(
            RandomSampler::new(&pars, ChaCha8Rng::seed_from_u64(1)),
            Err(RaceError::InvalidParameter(_))
        ));

        let pars = SamplerPars {
            disconnect_probability: 1.5,
            ..SamplerPars::default()
        };
        assert!(pars.validate().is_err());
    }

    #[test]
    fn validate_rejects_malformed_readings() {
        assert!(NetworkSample::new(10.0, 50.0, 20.0).validate().is_ok());
        assert!(NetworkSample::DISCONNECTED.validate().is_ok());
        assert!(matches!(
            NetworkSample::new(-1.0, 50.0, 20.0).validate(),
            Err(RaceError::InvalidSample { field: "ping", .. })
        ));
        assert!(NetworkSample::new(10.0, f64::NAN, 20.0).validate().is_err());
    }

    #[test]
    fn scripted_sampler_repeats_last_entry() {
        let first = NetworkSample::new(10.0, 100.0, 50.0);
        let last = NetworkSample::new(50.0, 20.0, 10.0);
        let mut sampler = ScriptedSampler::new().with_script("player", vec![first, last]);

        assert_eq!(sampler.sample("player").unwrap(), first);
        assert_eq!(sampler.sample("player").unwrap(), last);
        assert_eq!(sampler.sample("player").unwrap(), last);
        assert!(matches!(
            sampler.sample("ghost"),
            Err(RaceError::NoSample(id)) if id == "ghost"
        ));
    }

    #[test]
    fn failed_health_check_reports_outage() {
        let good = NetworkSample::new(20.0, 80.0, 30.0);
        let mut calls = 0;
        let health = |_timeout: Duration| {
            calls += 1;
            calls < 2
        };
        let inner = ScriptedSampler::new().constant("player", good);
        let mut sampler = HealthCheckedSampler::new(health, inner, Duration::from_secs(3));

        assert_eq!(sampler.sample("player").unwrap(), good);
        assert_eq!(sampler.sample("player").unwrap(), NetworkSample::DISCONNECTED);
    }

    struct SlowSampler {
        delay: Duration,
    }

    impl NetworkSampler for SlowSampler {
        fn sample(&mut self, _competitor_id: &str) -> Result<NetworkSample, RaceError> {
            thread::sleep(self.delay);
            Ok(NetworkSample::new(10.0, 100.0, 50.0))
        }
    }

    #[test]
    fn timed_sampler_passes_fast_samples_through() {
        let good = NetworkSample::new(30.0, 60.0, 25.0);
        let inner = ScriptedSampler::new().constant("player", good);
        let mut sampler = TimedSampler::spawn(inner, Duration::from_secs(2)).unwrap();

        assert_eq!(sampler.sample("player").unwrap(), good);
        assert_eq!(sampler.sample("player").unwrap(), good);
    }

    #[test]
    fn timed_sampler_counts_slow_samples_as_outage() {
        let inner = SlowSampler {
            delay: Duration::from_millis(300),
        };
        let mut sampler = TimedSampler::spawn(inner, Duration::from_millis(20)).unwrap();

        let t_start = Instant::now();
        assert_eq!(sampler.sample("player").unwrap(), NetworkSample::DISCONNECTED);
        assert!(t_start.elapsed() < Duration::from_millis(250));
    }

    /// Signals through its marker channel when the worker has dropped it.
    struct MarkedSampler {
        inner: ScriptedSampler,
        delay: Duration,
        _alive: Sender<()>,
    }

    impl NetworkSampler for MarkedSampler {
        fn sample(&mut self, competitor_id: &str) -> Result<NetworkSample, RaceError> {
            thread::sleep(self.delay);
            self.inner.sample(competitor_id)
        }
    }

    #[test]
    fn dropping_an_idle_timed_sampler_joins_its_worker() {
        let (alive_tx, alive_rx) = flume::bounded::<()>(1);
        let inner = MarkedSampler {
            inner: ScriptedSampler::new().constant("player", NetworkSample::new(30.0, 60.0, 25.0)),
            delay: Duration::ZERO,
            _alive: alive_tx,
        };
        let mut sampler = TimedSampler::spawn(inner, Duration::from_secs(2)).unwrap();
        assert!(sampler.sample("player").unwrap().connected);

        drop(sampler);
        assert_eq!(alive_rx.try_recv(), Err(flume::TryRecvError::Disconnected));
    }

    #[test]
    fn dropping_a_stuck_timed_sampler_does_not_block() {
        let (alive_tx, alive_rx) = flume::bounded::<()>(1);
        let inner = MarkedSampler {
            inner: ScriptedSampler::new().constant("player", NetworkSample::new(30.0, 60.0, 25.0)),
            delay: Duration::from_millis(400),
            _alive: alive_tx,
        };
        let mut sampler = TimedSampler::spawn(inner, Duration::from_millis(20)).unwrap();
        assert_eq!(sampler.sample("player").unwrap(), NetworkSample::DISCONNECTED);

        let t_drop = Instant::now();
        drop(sampler);
        assert!(t_drop.elapsed() < Duration::from_millis(200));

        // the detached worker exits once the stuck call returns
        assert_eq!(
            alive_rx.recv_timeout(Duration::from_secs(5)),
            Err(flume::RecvTimeoutError::Disconnected)
        );
    }
}
