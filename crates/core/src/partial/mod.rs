//! Canonical in-memory representation of a partial-track dataset.
//!
//! A [`Partial`] stores each parameter as a named envelope rather than as a
//! fixed record, so datasets can carry parameters beyond the five canonical
//! ones. The fixed breakpoint shape only exists inside [`crate::marshal`].

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::{Result, UtuError};

pub const TIME: &str = "time";
pub const FREQUENCY: &str = "frequency";
pub const AMPLITUDE: &str = "amplitude";
pub const BANDWIDTH: &str = "bandwidth";
pub const PHASE: &str = "phase";

/// The five parameters every breakpoint carries, in breakpoint field order.
pub const BREAKPOINT_PARAMETERS: [&str; 5] = [TIME, FREQUENCY, AMPLITUDE, BANDWIDTH, PHASE];

/// Ordered samples of a single parameter.
pub type Envelope = Vec<f64>;

/// Envelopes keyed by parameter name. Keys are kept sorted so that encoding
/// the same partial always yields the same bytes.
pub type Envelopes = BTreeMap<String, Envelope>;

/// One spectral component.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Partial {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub label: Option<String>,
    pub envelopes: Envelopes,
}

impl Partial {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_label(mut self, label: impl Into<String>) -> Self {
        self.label = Some(label.into());
        self
    }

    pub fn with_envelope(mut self, name: impl Into<String>, samples: Envelope) -> Self {
        self.envelopes.insert(name.into(), samples);
        self
    }

    pub fn envelope(&self, name: &str) -> Option<&[f64]> {
        self.envelopes.get(name).map(Vec::as_slice)
    }

    /// Returns the shared envelope length, or `None` when the partial has no
    /// envelopes or their lengths disagree.
    pub fn breakpoint_count(&self) -> Option<usize> {
        let mut lengths = self.envelopes.values().map(Vec::len);
        let first = lengths.next()?;
        lengths.all(|len| len == first).then_some(first)
    }

    /// Returns the first of `parameters` this partial has no envelope for.
    pub fn missing_parameter<'a, S: AsRef<str>>(&self, parameters: &'a [S]) -> Option<&'a str> {
        for name in parameters {
            let name: &str = name.as_ref();
            if !self.envelopes.contains_key(name) {
                return Some(name);
            }
        }
        None
    }
}

/// Where a dataset came from.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Source {
    pub location: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub fingerprint: Option<String>,
}

impl Source {
    pub fn new(location: impl Into<String>) -> Self {
        Self {
            location: location.into(),
            fingerprint: None,
        }
    }

    pub fn with_fingerprint(mut self, fingerprint: impl Into<String>) -> Self {
        self.fingerprint = Some(fingerprint.into());
        self
    }
}

/// How a batch append reacts to a partial that fails the parameter check.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AppendMode {
    /// Log the rejected partial and keep going.
    #[default]
    Skip,
    /// Stop at the first rejected partial.
    Strict,
}

/// A dataset of partials sharing a declared parameter set.
///
/// Metadata is fixed at construction. Partials can only be added through
/// [`PartialData::append`] and [`PartialData::extend`], which guarantee that
/// every stored partial carries all declared parameters.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PartialData {
    description: Option<String>,
    source: Option<Source>,
    parameters: Vec<String>,
    partials: Vec<Partial>,
}

impl PartialData {
    pub fn new<I, S>(parameters: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            parameters: parameters.into_iter().map(Into::into).collect(),
            ..Default::default()
        }
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    pub fn with_source(mut self, source: Source) -> Self {
        self.source = Some(source);
        self
    }

    /// Assembles a dataset without checking partials against `parameters`.
    /// Used by the decoder, which validates separately when asked to.
    pub(crate) fn from_parts(
        description: Option<String>,
        source: Option<Source>,
        parameters: Vec<String>,
        partials: Vec<Partial>,
    ) -> Self {
        Self {
            description,
            source,
            parameters,
            partials,
        }
    }

    pub fn description(&self) -> Option<&str> {
        self.description.as_deref()
    }

    pub fn source(&self) -> Option<&Source> {
        self.source.as_ref()
    }

    pub fn parameters(&self) -> &[String] {
        &self.parameters
    }

    pub fn partials(&self) -> &[Partial] {
        &self.partials
    }

    pub fn len(&self) -> usize {
        self.partials.len()
    }

    pub fn is_empty(&self) -> bool {
        self.partials.is_empty()
    }

    /// Appends `partial` if it carries every declared parameter. On failure
    /// the dataset is left untouched.
    pub fn append(&mut self, partial: Partial) -> Result<()> {
        if let Some(missing) = partial.missing_parameter(&self.parameters) {
            return Err(UtuError::RejectedAppend {
                parameter: missing.to_string(),
            });
        }
        self.partials.push(partial);
        Ok(())
    }

    /// Appends each partial in turn and returns how many were stored.
    ///
    /// In [`AppendMode::Skip`] rejected partials are logged and dropped. In
    /// [`AppendMode::Strict`] the first rejection is returned with its input
    /// position; partials appended before it remain.
    pub fn extend<I>(&mut self, partials: I, mode: AppendMode) -> Result<usize>
    where
        I: IntoIterator<Item = Partial>,
    {
        let mut appended = 0;
        for (index, partial) in partials.into_iter().enumerate() {
            match self.append(partial) {
                Ok(()) => appended += 1,
                Err(UtuError::RejectedAppend { parameter }) => match mode {
                    AppendMode::Skip => {
                        tracing::warn!(
                            index,
                            %parameter,
                            "skipping partial without declared parameter"
                        );
                    }
                    AppendMode::Strict => {
                        return Err(UtuError::RejectedPartial { index, parameter });
                    }
                },
                Err(other) => return Err(other),
            }
        }
        Ok(appended)
    }

    /// Checks every stored partial against `parameters`.
    pub fn validate(&self) -> Result<()> {
        for (index, partial) in self.partials.iter().enumerate() {
            if let Some(missing) = partial.missing_parameter(&self.parameters) {
                return Err(UtuError::InconsistentPartial {
                    index,
                    parameter: missing.to_string(),
                });
            }
        }
        Ok(())
    }
}
