use std::f64::consts::PI;

use super::{checked, FilterStage};
use crate::error::Result;

/// Second-order IIR notch (RBJ cookbook), Direct Form II transposed.
///
/// `H(z) = (b0 + b1 z^-1 + b2 z^-2) / (1 + a1 z^-1 + a2 z^-2)` with unity
/// gain away from the notch. The first sample seeds the delay line at its
/// DC steady state.
#[derive(Debug, Clone)]
pub struct Notch {
    coeffs: Option<NotchCoeffs>,
    state: [f64; 2],
    seeded: bool,
}

#[derive(Debug, Clone, Copy)]
struct NotchCoeffs {
    b: [f64; 3],
    a: [f64; 2],
}

impl Notch {
    /// `notch_hz` of 0, or at/above Nyquist, yields a pass-through stage.
    pub fn new(fs: f64, notch_hz: f64, bandwidth_hz: f64) -> Self {
        let enabled = notch_hz > 0.0 && notch_hz < fs * 0.5 && bandwidth_hz > 0.0;
        if !enabled && notch_hz >= fs * 0.5 {
            log::warn!(
                "notch at {notch_hz} Hz is at or above Nyquist ({} Hz); stage disabled",
                fs * 0.5
            );
        }
        let coeffs = enabled.then(|| {
            let w0 = 2.0 * PI * notch_hz / fs;
            let q = notch_hz / bandwidth_hz;
            let alpha = w0.sin() / (2.0 * q);
            let a0 = 1.0 + alpha;
            let cos_w0 = w0.cos();
            NotchCoeffs {
                b: [1.0 / a0, -2.0 * cos_w0 / a0, 1.0 / a0],
                a: [-2.0 * cos_w0 / a0, (1.0 - alpha) / a0],
            }
        });
        Self {
            coeffs,
            state: [0.0; 2],
            seeded: false,
        }
    }

    pub fn is_enabled(&self) -> bool {
        self.coeffs.is_some()
    }
}

impl FilterStage for Notch {
    fn name(&self) -> &'static str {
        "notch"
    }

    fn process(&mut self, input: f64) -> Result<f64> {
        let Some(NotchCoeffs { b, a }) = self.coeffs else {
            return checked(self.name(), input, input);
        };
        let x = input;
        let (y, d1, d2) = if self.seeded {
            let y = b[0] * x + self.state[0];
            let d1 = b[1] * x - a[0] * y + self.state[1];
            let d2 = b[2] * x - a[1] * y;
            (y, d1, d2)
        } else {
            // DC gain is 1, so a constant input `x` settles at y = x.
            let d2 = (b[2] - a[1]) * x;
            let d1 = (b[1] - a[0]) * x + d2;
            (x, d1, d2)
        };
        let out = checked(self.name(), input, y)?;
        if !(d1.is_finite() && d2.is_finite()) {
            return checked(self.name(), input, f64::NAN);
        }
        self.state = [d1, d2];
        self.seeded = true;
        Ok(out)
    }

    fn reset(&mut self) {
        self.state = [0.0; 2];
        self.seeded = false;
    }
}
