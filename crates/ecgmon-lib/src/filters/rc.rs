use std::f64::consts::PI;

use super::{checked, FilterStage};
use crate::error::Result;

fn rc_constant(cutoff_hz: f64) -> f64 {
    1.0 / (2.0 * PI * cutoff_hz.max(0.01))
}

#[derive(Debug, Clone, Copy, Default)]
struct HighPassSection {
    prev_x: f64,
    prev_y: f64,
}

/// Cascade of single-pole RC high-pass sections:
/// `y[n] = a * (y[n-1] + x[n] - x[n-1])`, `a = RC / (RC + dt)`.
///
/// The first sample seeds every section with zero output, so a DC offset
/// present from the start produces no step response.
#[derive(Debug, Clone)]
pub struct HighPass {
    alpha: Option<f64>,
    sections: Vec<HighPassSection>,
    scratch: Vec<HighPassSection>,
    seeded: bool,
}

impl HighPass {
    /// A cutoff of 0 (or an order of 0) gives a pass-through stage.
    pub fn new(fs: f64, cutoff_hz: f64, order: usize) -> Self {
        let alpha = (cutoff_hz > 0.0 && order > 0).then(|| {
            let rc = rc_constant(cutoff_hz);
            let dt = 1.0 / fs;
            rc / (rc + dt)
        });
        let order = if alpha.is_some() { order } else { 0 };
        Self {
            alpha,
            sections: vec![HighPassSection::default(); order],
            scratch: vec![HighPassSection::default(); order],
            seeded: false,
        }
    }

    pub fn order(&self) -> usize {
        self.sections.len()
    }
}

impl FilterStage for HighPass {
    fn name(&self) -> &'static str {
        "high-pass"
    }

    fn process(&mut self, input: f64) -> Result<f64> {
        let Some(alpha) = self.alpha else {
            return checked(self.name(), input, input);
        };
        let mut x = input;
        for (state, next) in self.sections.iter().zip(self.scratch.iter_mut()) {
            let y = if self.seeded {
                alpha * (state.prev_y + x - state.prev_x)
            } else {
                0.0
            };
            *next = HighPassSection {
                prev_x: x,
                prev_y: y,
            };
            x = y;
        }
        let out = checked(self.name(), input, x)?;
        std::mem::swap(&mut self.sections, &mut self.scratch);
        self.seeded = true;
        Ok(out)
    }

    fn reset(&mut self) {
        self.sections.fill(HighPassSection::default());
        self.seeded = false;
    }
}

/// Cascade of single-pole RC low-pass sections:
/// `y[n] = y[n-1] + a * (x[n] - y[n-1])`, `a = dt / (RC + dt)`.
///
/// Seeded with the first sample. A cutoff at or above Nyquist disables it.
#[derive(Debug, Clone)]
pub struct LowPass {
    alpha: Option<f64>,
    sections: Vec<f64>,
    scratch: Vec<f64>,
    seeded: bool,
}

impl LowPass {
    pub fn new(fs: f64, cutoff_hz: f64, order: usize) -> Self {
        let enabled = cutoff_hz > 0.0 && cutoff_hz < fs * 0.5 && order > 0;
        if !enabled && cutoff_hz >= fs * 0.5 {
            log::warn!(
                "low-pass cutoff {cutoff_hz} Hz is at or above Nyquist ({} Hz); stage disabled",
                fs * 0.5
            );
        }
        let alpha = enabled.then(|| {
            let rc = rc_constant(cutoff_hz);
            let dt = 1.0 / fs;
            dt / (rc + dt)
        });
        let order = if enabled { order } else { 0 };
        Self {
            alpha,
            sections: vec![0.0; order],
            scratch: vec![0.0; order],
            seeded: false,
        }
    }

    pub fn order(&self) -> usize {
        self.sections.len()
    }
}

impl FilterStage for LowPass {
    fn name(&self) -> &'static str {
        "low-pass"
    }

    fn process(&mut self, input: f64) -> Result<f64> {
        let Some(alpha) = self.alpha else {
            return checked(self.name(), input, input);
        };
        let mut x = input;
        for (&prev, next) in self.sections.iter().zip(self.scratch.iter_mut()) {
            let y = if self.seeded {
                prev + alpha * (x - prev)
            } else {
                x
            };
            *next = y;
            x = y;
        }
        let out = checked(self.name(), input, x)?;
        std::mem::swap(&mut self.sections, &mut self.scratch);
        self.seeded = true;
        Ok(out)
    }

    fn reset(&mut self) {
        self.sections.fill(0.0);
        self.seeded = false;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::filters::tests::steady_state_peak;

    #[test]
    fn high_pass_kills_dc_from_first_sample() {
        let mut hp = HighPass::new(250.0, 0.5, 2);
        for _ in 0..50 {
            assert_eq!(hp.process(0.8).unwrap(), 0.0);
        }
    }

    #[test]
    fn high_pass_attenuates_baseline_wander() {
        let mut hp = HighPass::new(250.0, 0.5, 1);
        let peak = steady_state_peak(&mut hp, 250.0, 0.1, 7500, 2500);
        assert!(peak < 0.3, "wander leaked: {peak}");
    }

    #[test]
    fn high_pass_keeps_qrs_band() {
        let mut hp = HighPass::new(250.0, 0.5, 1);
        let peak = steady_state_peak(&mut hp, 250.0, 10.0, 2500, 250);
        assert!(peak > 0.95, "qrs band attenuated: {peak}");
    }

    #[test]
    fn high_pass_overflow_does_not_corrupt_state() {
        let mut hp = HighPass::new(250.0, 0.5, 1);
        hp.process(0.0).unwrap();
        assert!(hp.process(f64::MAX).is_ok());
        assert!(hp.process(-f64::MAX).is_err());
        assert!(hp.process(0.0).unwrap().is_finite());
    }

    #[test]
    fn low_pass_passes_dc_and_cuts_hf() {
        let mut lp = LowPass::new(250.0, 40.0, 1);
        for _ in 0..10 {
            assert!((lp.process(1.2).unwrap() - 1.2).abs() < 1e-12);
        }
        let mut lp = LowPass::new(250.0, 40.0, 1);
        let peak = steady_state_peak(&mut lp, 250.0, 100.0, 2500, 250);
        assert!(peak < 0.5, "hf leaked: {peak}");
        let mut lp = LowPass::new(250.0, 40.0, 1);
        let peak = steady_state_peak(&mut lp, 250.0, 5.0, 2500, 250);
        assert!(peak > 0.9, "passband attenuated: {peak}");
    }

    #[test]
    fn low_pass_above_nyquist_is_pass_through() {
        let mut lp = LowPass::new(100.0, 60.0, 2);
        assert_eq!(lp.order(), 0);
        assert_eq!(lp.process(0.25).unwrap(), 0.25);
        assert_eq!(lp.process(-3.0).unwrap(), -3.0);
    }

    #[test]
    fn reset_reseeds() {
        let mut hp = HighPass::new(250.0, 0.5, 1);
        hp.process(0.0).unwrap();
        assert!(hp.process(1.0).unwrap() > 0.9);
        hp.reset();
        assert_eq!(hp.process(1.0).unwrap(), 0.0);
    }
}
