pub mod notch;
pub mod rc;

use log::warn;

use crate::{
    config::FilterConfig,
    error::{EcgError, Result},
};

pub use notch::Notch;
pub use rc::{HighPass, LowPass};

/// Single-sample-in, single-sample-out filter with private state.
pub trait FilterStage: Send {
    fn name(&self) -> &'static str;

    /// Filter one sample. On a non-finite result the stage must leave its
    /// state untouched and return [`EcgError::FilterFault`].
    fn process(&mut self, input: f64) -> Result<f64>;

    /// Forget all history; the next sample re-seeds the stage.
    fn reset(&mut self);
}

/// Reject non-finite stage outputs.
pub(crate) fn checked(stage: &'static str, input: f64, output: f64) -> Result<f64> {
    if output.is_finite() {
        Ok(output)
    } else {
        Err(EcgError::FilterFault { stage, input })
    }
}

/// Ordered cascade of filter stages, applied ahead of beat detection.
///
/// The default chain runs high-pass → low-pass → notch. Stages are
/// recursive: feed them samples in arrival order, one at a time.
pub struct FilterChain {
    stages: Vec<Box<dyn FilterStage>>,
    faults: u64,
}

impl FilterChain {
    pub fn new(stages: Vec<Box<dyn FilterStage>>) -> Self {
        Self { stages, faults: 0 }
    }

    /// Standard ECG conditioning: baseline removal, HF smoothing, mains notch.
    pub fn from_config(fs: f64, cfg: &FilterConfig) -> Self {
        Self::new(vec![
            Box::new(HighPass::new(fs, cfg.highpass_hz, cfg.highpass_order)),
            Box::new(LowPass::new(fs, cfg.lowpass_hz, cfg.lowpass_order)),
            Box::new(Notch::new(fs, cfg.notch_hz, cfg.notch_bandwidth_hz)),
        ])
    }

    /// Swap the stage at `index`, returning the previous one.
    pub fn replace_stage(
        &mut self,
        index: usize,
        stage: Box<dyn FilterStage>,
    ) -> Option<Box<dyn FilterStage>> {
        let slot = self.stages.get_mut(index)?;
        Some(std::mem::replace(slot, stage))
    }

    pub fn push_stage(&mut self, stage: Box<dyn FilterStage>) {
        self.stages.push(stage);
    }

    pub fn stage_names(&self) -> Vec<&'static str> {
        self.stages.iter().map(|s| s.name()).collect()
    }

    /// Run every stage, stopping at the first fault.
    pub fn try_process(&mut self, raw: f64) -> Result<f64> {
        let mut value = raw;
        for stage in self.stages.iter_mut() {
            value = stage.process(value)?;
        }
        Ok(value)
    }

    /// Filter one sample; on a stage fault the raw value is passed through.
    pub fn process(&mut self, raw: f64) -> f64 {
        match self.try_process(raw) {
            Ok(value) => value,
            Err(err) => {
                self.faults += 1;
                warn!("{err}; passing raw sample through");
                raw
            }
        }
    }

    /// Number of samples that fell back to pass-through.
    pub fn faults(&self) -> u64 {
        self.faults
    }

    pub fn reset(&mut self) {
        for stage in self.stages.iter_mut() {
            stage.reset();
        }
        self.faults = 0;
    }
}

impl std::fmt::Debug for FilterChain {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FilterChain")
            .field("stages", &self.stage_names())
            .field("faults", &self.faults)
            .finish()
    }
}
