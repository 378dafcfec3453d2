//! Conversion between named envelopes and ordered breakpoint records.
//!
//! Analysis and synthesis engines exchange partials as sequences of
//! [`Breakpoint`]s. The canonical model stores the same data as one envelope
//! per parameter.

use serde::{Deserialize, Serialize};

use crate::{
    partial::{
        Partial, PartialData, AMPLITUDE, BANDWIDTH, BREAKPOINT_PARAMETERS, FREQUENCY, PHASE, TIME,
    },
    Result, UtuError,
};

/// A single sample of a partial's trajectory.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct Breakpoint {
    /// Seconds from the start of the sound.
    pub time: f64,
    /// Hertz.
    pub frequency: f64,
    /// Linear amplitude.
    pub amplitude: f64,
    /// Noise ratio in `0..=1`.
    pub bandwidth: f64,
    /// Radians.
    pub phase: f64,
}

impl Breakpoint {
    pub fn new(time: f64, frequency: f64, amplitude: f64, bandwidth: f64, phase: f64) -> Self {
        Self {
            time,
            frequency,
            amplitude,
            bandwidth,
            phase,
        }
    }
}

/// A partial in engine form: breakpoints ordered by time.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct BreakpointPartial {
    pub label: Option<String>,
    pub breakpoints: Vec<Breakpoint>,
}

impl BreakpointPartial {
    pub fn new(breakpoints: Vec<Breakpoint>) -> Self {
        Self {
            label: None,
            breakpoints,
        }
    }

    pub fn end_time(&self) -> Option<f64> {
        self.breakpoints.last().map(|bp| bp.time)
    }
}

/// Lifts engine partials into a dataset declaring the five breakpoint
/// parameters.
pub fn to_canonical(partials: &[BreakpointPartial]) -> Result<PartialData> {
    let mut data = PartialData::new(BREAKPOINT_PARAMETERS);

    for input in partials {
        let count = input.breakpoints.len();
        let mut time = Vec::with_capacity(count);
        let mut frequency = Vec::with_capacity(count);
        let mut amplitude = Vec::with_capacity(count);
        let mut bandwidth = Vec::with_capacity(count);
        let mut phase = Vec::with_capacity(count);

        for bp in &input.breakpoints {
            time.push(bp.time);
            frequency.push(bp.frequency);
            amplitude.push(bp.amplitude);
            bandwidth.push(bp.bandwidth);
            phase.push(bp.phase);
        }

        let partial = Partial {
            label: input.label.clone(),
            envelopes: [
                (TIME, time),
                (FREQUENCY, frequency),
                (AMPLITUDE, amplitude),
                (BANDWIDTH, bandwidth),
                (PHASE, phase),
            ]
            .into_iter()
            .map(|(name, samples)| (name.to_string(), samples))
            .collect(),
        };

        data.append(partial)?;
    }

    Ok(data)
}

/// Lowers a dataset into engine partials.
///
/// Envelopes are walked in lockstep and each partial ends at its shortest
/// envelope; samples past that point are dropped. Fails with
/// [`UtuError::MissingParameter`] when a partial lacks one of the five
/// breakpoint envelopes.
pub fn to_breakpoints(data: &PartialData) -> Result<Vec<BreakpointPartial>> {
    data.partials()
        .iter()
        .enumerate()
        .map(|(index, partial)| lower_partial(index, partial))
        .collect()
}

fn lower_partial(index: usize, partial: &Partial) -> Result<BreakpointPartial> {
    let envelope = |name: &str| {
        partial
            .envelope(name)
            .ok_or_else(|| UtuError::MissingParameter {
                index,
                parameter: name.to_string(),
            })
    };

    let time = envelope(TIME)?;
    let frequency = envelope(FREQUENCY)?;
    let amplitude = envelope(AMPLITUDE)?;
    let bandwidth = envelope(BANDWIDTH)?;
    let phase = envelope(PHASE)?;

    let lengths = [
        time.len(),
        frequency.len(),
        amplitude.len(),
        bandwidth.len(),
        phase.len(),
    ];
    let count = lengths.iter().copied().min().unwrap_or(0);
    let longest = lengths.iter().copied().max().unwrap_or(0);
    if longest > count {
        tracing::debug!(
            index,
            kept = count,
            dropped = longest - count,
            "truncating partial to its shortest envelope"
        );
    }

    let breakpoints = (0..count)
        .map(|i| Breakpoint::new(time[i], frequency[i], amplitude[i], bandwidth[i], phase[i]))
        .collect();

    Ok(BreakpointPartial {
        label: partial.label.clone(),
        breakpoints,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::codec;

    fn two_breakpoints() -> Vec<BreakpointPartial> {
        vec![BreakpointPartial::new(vec![
            Breakpoint::new(0.0, 440.0, 0.5, 0.0, 0.0),
            Breakpoint::new(0.01, 441.0, 0.4, 0.0, 0.1),
        ])]
    }

    #[test]
    fn lifts_breakpoints_into_envelopes() {
        let data = to_canonical(&two_breakpoints()).unwrap();

        assert_eq!(data.parameters(), BREAKPOINT_PARAMETERS);
        let partial = &data.partials()[0];
        assert_eq!(partial.envelope(TIME).unwrap(), &[0.0, 0.01]);
        assert_eq!(partial.envelope(FREQUENCY).unwrap(), &[440.0, 441.0]);
        assert_eq!(partial.envelope(AMPLITUDE).unwrap(), &[0.5, 0.4]);
        assert_eq!(partial.envelope(BANDWIDTH).unwrap(), &[0.0, 0.0]);
        assert_eq!(partial.envelope(PHASE).unwrap(), &[0.0, 0.1]);
        assert_eq!(partial.breakpoint_count(), Some(2));
    }

    #[test]
    fn lowers_back_to_original_breakpoints() {
        let input = two_breakpoints();
        let data = to_canonical(&input).unwrap();
        assert_eq!(to_breakpoints(&data).unwrap(), input);
    }

    #[test]
    fn round_trips_through_document() {
        let mut input = two_breakpoints();
        input.push(BreakpointPartial {
            label: Some("overtone".to_string()),
            breakpoints: vec![
                Breakpoint::new(0.5, 1320.3, 0.125, 0.3, -2.1),
                Breakpoint::new(0.52, 1319.9, 0.1, 0.35, 1.7),
                Breakpoint::new(0.54, 1321.4, 0.0, 0.4, 0.9),
            ],
        });

        let text = codec::encode(&to_canonical(&input).unwrap()).unwrap();
        let lowered = to_breakpoints(&codec::decode(&text).unwrap()).unwrap();
        assert_eq!(lowered, input);
    }

    #[test]
    fn empty_partials_survive() {
        let input = vec![BreakpointPartial::default()];
        let data = to_canonical(&input).unwrap();
        assert_eq!(to_breakpoints(&data).unwrap(), input);
    }

    #[test]
    fn truncates_to_shortest_envelope() {
        let mut data = PartialData::new(BREAKPOINT_PARAMETERS);
        data.append(
            Partial::new()
                .with_envelope(TIME, vec![0.0, 0.1, 0.2, 0.3, 0.4])
                .with_envelope(FREQUENCY, vec![100.0, 101.0, 102.0, 103.0, 104.0])
                .with_envelope(AMPLITUDE, vec![0.1, 0.2, 0.3])
                .with_envelope(BANDWIDTH, vec![0.0, 0.01, 0.02, 0.03, 0.04])
                .with_envelope(PHASE, vec![0.5, 0.6, 0.7, 0.8, 0.9]),
        )
        .unwrap();

        let lowered = to_breakpoints(&data).unwrap();
        let breakpoints = &lowered[0].breakpoints;
        assert_eq!(breakpoints.len(), 3);
        assert_eq!(breakpoints[2], Breakpoint::new(0.2, 102.0, 0.3, 0.02, 0.7));
    }

    #[test]
    fn missing_envelope_names_partial_and_parameter() {
        let mut data = PartialData::new([TIME]);
        data.append(
            Partial::new()
                .with_envelope(TIME, vec![0.0])
                .with_envelope(FREQUENCY, vec![440.0]),
        )
        .unwrap();

        let err = to_breakpoints(&data).unwrap_err();
        match err {
            UtuError::MissingParameter { index, parameter } => {
                assert_eq!(index, 0);
                assert_eq!(parameter, AMPLITUDE);
            }
            other => panic!("unexpected error {other:?}"),
        }
    }
}
