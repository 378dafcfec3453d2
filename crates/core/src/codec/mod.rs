//! Versioned JSON documents for [`PartialData`].
//!
//! Every document carries a `file_info` header naming the format family and
//! version. Writers always stamp the current header; readers check it before
//! touching the body. `//` and `/* */` comments are accepted on input and
//! never written.

use std::{
    fs::{self, File},
    io::{BufWriter, Read, Write},
    path::Path,
};

use json_comments::CommentSettings;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::{
    partial::{Envelopes, Partial, PartialData, Source},
    Result, UtuError,
};

/// Format family written into `file_info.kind`.
pub const FILE_KIND: &str = "utu-partial-data";
/// Highest `file_info.version` this codec reads, and the one it writes.
pub const FILE_VERSION: u16 = 1;

/// Document header.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileInfo {
    pub kind: String,
    pub version: u64,
}

impl FileInfo {
    pub fn current() -> Self {
        Self {
            kind: FILE_KIND.to_string(),
            version: u64::from(FILE_VERSION),
        }
    }

    fn check(&self) -> Result<()> {
        if self.kind != FILE_KIND {
            return Err(UtuError::UnsupportedFormat {
                kind: self.kind.clone(),
            });
        }
        if self.version == 0 || self.version > u64::from(FILE_VERSION) {
            return Err(UtuError::UnsupportedVersion {
                found: self.version,
                supported: FILE_VERSION,
            });
        }
        Ok(())
    }
}

/// Reader behaviour that callers may relax.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct DecodeOptions {
    /// Check every partial against the declared `parameters`.
    pub validate_partials: bool,
}

impl Default for DecodeOptions {
    fn default() -> Self {
        Self {
            validate_partials: true,
        }
    }
}

impl DecodeOptions {
    pub fn lenient() -> Self {
        Self {
            validate_partials: false,
        }
    }
}

#[derive(Serialize)]
struct DocumentRef<'a> {
    file_info: FileInfo,
    #[serde(skip_serializing_if = "Option::is_none")]
    description: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    source: Option<&'a Source>,
    parameters: &'a [String],
    partials: &'a [Partial],
}

/// Body fields are optional here so that absence can be reported with the
/// field path instead of serde's generic message.
#[derive(Deserialize)]
struct RawDocument {
    #[serde(default)]
    description: Option<String>,
    #[serde(default)]
    source: Option<RawSource>,
    #[serde(default)]
    parameters: Option<Vec<String>>,
    #[serde(default)]
    partials: Option<Vec<RawPartial>>,
}

#[derive(Deserialize)]
struct RawSource {
    #[serde(default)]
    location: Option<String>,
    #[serde(default)]
    fingerprint: Option<String>,
}

#[derive(Deserialize)]
struct RawPartial {
    #[serde(default)]
    label: Option<String>,
    #[serde(default)]
    envelopes: Option<Envelopes>,
}

/// Serialises `data` as an indented document with the current header.
pub fn encode(data: &PartialData) -> Result<String> {
    check_finite(data)?;

    let document = DocumentRef {
        file_info: FileInfo::current(),
        description: data.description(),
        source: data.source(),
        parameters: data.parameters(),
        partials: data.partials(),
    };

    let mut text = serde_json::to_string_pretty(&document)?;
    text.push('\n');
    Ok(text)
}

/// Writes the encoded document to `writer`.
pub fn encode_to_writer<W: Write>(data: &PartialData, mut writer: W) -> Result<()> {
    let text = encode(data)?;
    writer.write_all(text.as_bytes())?;
    writer.flush()?;
    Ok(())
}

/// Parses a document with the default (validating) options.
pub fn decode(text: &str) -> Result<PartialData> {
    decode_with(text, DecodeOptions::default())
}

/// Parses a document, optionally skipping partial validation.
pub fn decode_with(text: &str, options: DecodeOptions) -> Result<PartialData> {
    decode_reader(text.as_bytes(), options)
}

/// Parses a document from raw bytes. Bytes must be UTF-8 JSON.
pub fn decode_slice(bytes: &[u8], options: DecodeOptions) -> Result<PartialData> {
    decode_reader(bytes, options)
}

/// Parses a document from `reader`, accepting C-style comments.
pub fn decode_reader<R: Read>(reader: R, options: DecodeOptions) -> Result<PartialData> {
    let stripped = CommentSettings::c_style().strip_comments(reader);
    let value: Value = serde_json::from_reader(stripped)?;
    decode_value(value, options)
}

fn decode_value(mut value: Value, options: DecodeOptions) -> Result<PartialData> {
    if !value.is_object() {
        return Err(UtuError::MalformedDocument(serde::de::Error::custom(
            "document root must be a JSON object",
        )));
    }

    // The header is checked on its own so that a newer body layout is never
    // interpreted with this version's rules.
    let header = value
        .get_mut("file_info")
        .map(Value::take)
        .filter(|info| !info.is_null())
        .ok_or_else(|| UtuError::missing_field("file_info"))?;
    let info: FileInfo = serde_json::from_value(header)?;
    info.check()?;

    let raw: RawDocument = serde_json::from_value(value)?;

    let source = raw
        .source
        .map(|source| {
            let location = source
                .location
                .ok_or_else(|| UtuError::missing_field("source.location"))?;
            Ok::<_, UtuError>(Source {
                location,
                fingerprint: source.fingerprint,
            })
        })
        .transpose()?;

    let parameters = raw
        .parameters
        .ok_or_else(|| UtuError::missing_field("parameters"))?;

    let partials = raw
        .partials
        .ok_or_else(|| UtuError::missing_field("partials"))?
        .into_iter()
        .enumerate()
        .map(|(index, partial)| {
            let envelopes = partial
                .envelopes
                .ok_or_else(|| UtuError::missing_field(format!("partials[{index}].envelopes")))?;
            Ok(Partial {
                label: partial.label,
                envelopes,
            })
        })
        .collect::<Result<Vec<_>>>()?;

    let data = PartialData::from_parts(raw.description, source, parameters, partials);
    if options.validate_partials {
        data.validate()?;
    }

    tracing::debug!(
        version = info.version,
        partials = data.len(),
        parameters = data.parameters().len(),
        "decoded partial document"
    );
    Ok(data)
}

fn check_finite(data: &PartialData) -> Result<()> {
    for (partial, item) in data.partials().iter().enumerate() {
        for (parameter, samples) in &item.envelopes {
            if let Some(sample) = samples.iter().position(|value| !value.is_finite()) {
                return Err(UtuError::NonFiniteSample {
                    partial,
                    parameter: parameter.clone(),
                    sample,
                });
            }
        }
    }
    Ok(())
}

/// Reads and decodes the document at `path`. Errors carry the path.
pub fn read_file(path: impl AsRef<Path>, options: DecodeOptions) -> Result<PartialData> {
    let path = path.as_ref();
    fs::read(path)
        .map_err(UtuError::from)
        .and_then(|bytes| decode_slice(&bytes, options))
        .map_err(|err| err.in_file(path))
}

/// Encodes `data` and writes it to `path`. Errors carry the path.
pub fn write_file(path: impl AsRef<Path>, data: &PartialData) -> Result<()> {
    let path = path.as_ref();
    File::create(path)
        .map_err(UtuError::from)
        .and_then(|file| encode_to_writer(data, BufWriter::new(file)))
        .map_err(|err| err.in_file(path))
}
