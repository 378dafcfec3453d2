//! Analysis and synthesis collaborators.
//!
//! Spectral estimation lives outside this crate and plugs in through
//! [`Analyzer`]. [`OscillatorBank`] is a plain additive renderer so that
//! documents can be auditioned without an external engine.

use std::f64::consts::TAU;

use rand::{Rng, SeedableRng};
use rand_pcg::Pcg32;

use crate::{
    config::SynthesisConfig,
    marshal::{self, Breakpoint, BreakpointPartial},
    partial::PartialData,
    Result, UtuError,
};

/// Produces breakpoint partials from mono samples.
pub trait Analyzer {
    fn analyze(&mut self, samples: &[f64], sample_rate: u32) -> Result<Vec<BreakpointPartial>>;
}

/// Renders breakpoint partials to mono samples.
pub trait Synthesizer {
    fn sample_rate(&self) -> u32;
    fn synthesize(&mut self, partials: &[BreakpointPartial]) -> Result<Vec<f64>>;
}

/// Runs `analyzer` and lifts the result into a dataset.
pub fn analyze_into<A: Analyzer + ?Sized>(
    analyzer: &mut A,
    samples: &[f64],
    sample_rate: u32,
) -> Result<PartialData> {
    let partials = analyzer.analyze(samples, sample_rate)?;
    tracing::debug!(partials = partials.len(), sample_rate, "analysis finished");
    marshal::to_canonical(&partials)
}

/// Lowers `data` and renders it with `synth`.
pub fn render<S: Synthesizer + ?Sized>(synth: &mut S, data: &PartialData) -> Result<Vec<f64>> {
    let partials = marshal::to_breakpoints(data)?;
    synth.synthesize(&partials)
}

/// Additive synthesizer with one oscillator per partial.
///
/// Frequency, amplitude and bandwidth are linearly interpolated between
/// breakpoints. Phase starts at the first breakpoint's phase and is then
/// integrated from frequency. Bandwidth mixes uniform noise into the partial
/// while keeping its energy constant.
#[derive(Debug)]
pub struct OscillatorBank {
    sample_rate: u32,
    gain: f64,
    max_duration: f64,
    rng: Pcg32,
}

impl OscillatorBank {
    pub fn new(config: &SynthesisConfig) -> Result<Self> {
        if config.sample_rate == 0 {
            return Err(UtuError::InvalidInput("sample rate must be non-zero"));
        }
        if !(config.max_duration.is_finite() && config.max_duration > 0.0) {
            return Err(UtuError::InvalidInput(
                "maximum duration must be positive and finite",
            ));
        }

        Ok(Self {
            sample_rate: config.sample_rate,
            gain: config.gain,
            max_duration: config.max_duration,
            rng: Pcg32::seed_from_u64(config.noise_seed),
        })
    }

    fn render_partial(&mut self, partial: &BreakpointPartial, output: &mut [f64]) {
        let Some(first) = partial.breakpoints.first() else {
            return;
        };

        let rate = f64::from(self.sample_rate);
        let mut phase = first.phase;

        for pair in partial.breakpoints.windows(2) {
            let (from, to) = (&pair[0], &pair[1]);
            let span = to.time - from.time;
            if span <= 0.0 {
                continue;
            }

            let start = sample_index(from.time, rate);
            let end = sample_index(to.time, rate).min(output.len());
            for (index, out) in output.iter_mut().enumerate().take(end).skip(start) {
                let t = index as f64 / rate;
                let alpha = ((t - from.time) / span).clamp(0.0, 1.0);
                let frequency = lerp(from.frequency, to.frequency, alpha);
                let amplitude = lerp(from.amplitude, to.amplitude, alpha);
                let bandwidth = lerp(from.bandwidth, to.bandwidth, alpha).clamp(0.0, 1.0);

                let noise = if bandwidth > 0.0 {
                    self.rng.random_range(-1.0_f64..=1.0) * bandwidth.sqrt()
                } else {
                    0.0
                };
                let tone = (1.0 - bandwidth).sqrt() * phase.cos();

                *out += self.gain * amplitude * (tone + noise);
                phase = (phase + TAU * frequency / rate) % TAU;
            }
        }
    }
}

impl Synthesizer for OscillatorBank {
    fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    fn synthesize(&mut self, partials: &[BreakpointPartial]) -> Result<Vec<f64>> {
        for partial in partials {
            check_time_order(&partial.breakpoints)?;
        }

        let end_time = partials
            .iter()
            .filter_map(BreakpointPartial::end_time)
            .fold(0.0_f64, f64::max);
        if end_time > self.max_duration {
            return Err(UtuError::InvalidInput(
                "partials extend past the maximum synthesis duration",
            ));
        }

        let rate = f64::from(self.sample_rate);
        let length = sample_index(end_time, rate)
            .checked_add(1)
            .ok_or(UtuError::InvalidInput("synthesis length overflows"))?;
        let mut output = vec![0.0; length];

        for partial in partials {
            self.render_partial(partial, &mut output);
        }

        tracing::debug!(
            partials = partials.len(),
            samples = output.len(),
            "rendered partials"
        );
        Ok(output)
    }
}

fn check_time_order(breakpoints: &[Breakpoint]) -> Result<()> {
    if breakpoints
        .iter()
        .any(|bp| !bp.time.is_finite() || bp.time < 0.0)
    {
        return Err(UtuError::InvalidInput(
            "breakpoint times must be finite and non-negative",
        ));
    }
    if breakpoints.windows(2).any(|pair| pair[1].time < pair[0].time) {
        return Err(UtuError::InvalidInput("breakpoint times must not decrease"));
    }
    Ok(())
}

/// Saturates at `usize::MAX` for times beyond the addressable range.
fn sample_index(time: f64, rate: f64) -> usize {
    (time * rate).ceil() as usize
}

fn lerp(a: f64, b: f64, alpha: f64) -> f64 {
    a + (b - a) * alpha
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::partial::TIME;

    fn config(sample_rate: u32) -> SynthesisConfig {
        SynthesisConfig {
            sample_rate,
            ..Default::default()
        }
    }

    fn steady(frequency: f64, amplitude: f64, bandwidth: f64) -> BreakpointPartial {
        BreakpointPartial::new(vec![
            Breakpoint::new(0.0, frequency, amplitude, bandwidth, 0.0),
            Breakpoint::new(1.0, frequency, amplitude, bandwidth, 0.0),
        ])
    }

    struct FixedAnalyzer(Vec<BreakpointPartial>);

    impl Analyzer for FixedAnalyzer {
        fn analyze(&mut self, samples: &[f64], _: u32) -> Result<Vec<BreakpointPartial>> {
            if samples.is_empty() {
                return Err(UtuError::InvalidInput("no samples"));
            }
            Ok(self.0.clone())
        }
    }

    #[test]
    fn renders_steady_sinusoid() {
        let mut bank = OscillatorBank::new(&config(1_000)).unwrap();
        let output = bank.synthesize(&[steady(100.0, 0.5, 0.0)]).unwrap();

        assert_eq!(output.len(), 1_001);
        assert!((output[0] - 0.5).abs() < 1e-12);
        let peak = output.iter().fold(0.0_f64, |acc, s| acc.max(s.abs()));
        assert!(peak <= 0.5 + 1e-9);
        assert!(peak > 0.49);
    }

    #[test]
    fn noise_is_deterministic_per_seed() {
        let partials = [steady(220.0, 0.3, 0.5)];
        let first = OscillatorBank::new(&config(2_000))
            .unwrap()
            .synthesize(&partials)
            .unwrap();
        let second = OscillatorBank::new(&config(2_000))
            .unwrap()
            .synthesize(&partials)
            .unwrap();
        assert_eq!(first, second);
    }

    #[test]
    fn rejects_decreasing_time() {
        let mut bank = OscillatorBank::new(&config(1_000)).unwrap();
        let partial = BreakpointPartial::new(vec![
            Breakpoint::new(0.5, 100.0, 0.1, 0.0, 0.0),
            Breakpoint::new(0.1, 100.0, 0.1, 0.0, 0.0),
        ]);
        assert!(matches!(
            bank.synthesize(&[partial]),
            Err(UtuError::InvalidInput(_))
        ));
    }

    #[test]
    fn rejects_renders_past_max_duration() {
        let mut bank = OscillatorBank::new(&config(44_100)).unwrap();
        for end in [1.0e7, f64::MAX] {
            let partial = BreakpointPartial::new(vec![
                Breakpoint::new(0.0, 100.0, 0.1, 0.0, 0.0),
                Breakpoint::new(end, 100.0, 0.1, 0.0, 0.0),
            ]);
            assert!(matches!(
                bank.synthesize(&[partial]),
                Err(UtuError::InvalidInput(_))
            ));
        }
    }

    #[test]
    fn max_duration_is_configurable() {
        let short = SynthesisConfig {
            sample_rate: 100,
            max_duration: 0.5,
            ..Default::default()
        };
        let mut bank = OscillatorBank::new(&short).unwrap();
        assert!(bank.synthesize(&[steady(10.0, 0.1, 0.0)]).is_err());

        let invalid = SynthesisConfig {
            max_duration: f64::INFINITY,
            ..Default::default()
        };
        assert!(OscillatorBank::new(&invalid).is_err());
    }

    #[test]
    fn rejects_zero_sample_rate() {
        assert!(OscillatorBank::new(&config(0)).is_err());
    }

    #[test]
    fn analysis_lands_in_canonical_form() {
        let mut analyzer = FixedAnalyzer(vec![steady(440.0, 0.2, 0.0)]);
        let data = analyze_into(&mut analyzer, &[0.0; 16], 44_100).unwrap();

        assert_eq!(data.len(), 1);
        assert_eq!(data.partials()[0].envelope(TIME).unwrap(), &[0.0, 1.0]);
    }

    #[test]
    fn render_lowers_dataset_first() {
        let data = marshal::to_canonical(&[steady(50.0, 0.25, 0.0)]).unwrap();
        let mut bank = OscillatorBank::new(&config(100)).unwrap();
        let output = render(&mut bank, &data).unwrap();
        assert_eq!(output.len(), 101);
    }
}
