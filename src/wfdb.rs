use std::fs;

use camino::Utf8Path;

use crate::domain::RecordId;
use crate::error::GrabError;

/// Gain applied when the header omits one, per the waveform-database
/// header convention.
const DEFAULT_GAIN: f64 = 200.0;
const DEFAULT_SAMPLING_FREQUENCY: f64 = 250.0;

/// One signal line of a record header.
#[derive(Debug, Clone)]
pub struct SignalSpec {
    pub file: String,
    pub format: u32,
    pub gain: f64,
    pub baseline: i32,
    pub units: String,
    pub description: String,
}

/// A decoded on-disk record: per-channel physical sample columns, the
/// ordered channel names, and the sampling frequency. Rows across the
/// columns line up as time samples.
#[derive(Debug, Clone)]
pub struct WfdbRecord {
    name: String,
    sampling_frequency: f64,
    signals: Vec<SignalSpec>,
    columns: Vec<Vec<f64>>,
}

impl WfdbRecord {
    /// Reads `<id>.hea` and the signal file(s) it references from `dir`.
    /// Digital samples convert to physical units as
    /// `(sample - baseline) / gain`; the format's invalid-sample
    /// sentinel maps to NaN.
    pub fn read(dir: &Utf8Path, id: &RecordId) -> Result<Self, GrabError> {
        let header_path = dir.join(format!("{id}.hea"));
        if !header_path.as_std_path().exists() {
            return Err(GrabError::RecordNotFound(id.to_string()));
        }
        let text = fs::read_to_string(header_path.as_std_path())
            .map_err(|err| GrabError::Filesystem(format!("read {header_path}: {err}")))?;
        let header = parse_header(&text)?;

        // Signals sharing a .dat file are interleaved sample by sample
        // in header order; distinct files decode independently.
        let mut file_groups: Vec<(String, Vec<usize>)> = Vec::new();
        for (idx, signal) in header.signals.iter().enumerate() {
            match file_groups
                .iter_mut()
                .find(|(file, _)| *file == signal.file)
            {
                Some((_, members)) => members.push(idx),
                None => file_groups.push((signal.file.clone(), vec![idx])),
            }
        }

        let mut columns = vec![Vec::new(); header.signals.len()];
        for (file, members) in &file_groups {
            let format = header.signals[members[0]].format;
            if members
                .iter()
                .any(|&idx| header.signals[idx].format != format)
            {
                return Err(GrabError::HeaderParse(format!(
                    "signal file {file} mixes storage formats"
                )));
            }

            let path = dir.join(file);
            let bytes = fs::read(path.as_std_path())
                .map_err(|err| GrabError::Filesystem(format!("read {path}: {err}")))?;
            let digital = match format {
                16 => decode_format16(&bytes),
                212 => decode_format212(&bytes),
                other => return Err(GrabError::UnsupportedFormat(other)),
            };

            let frames = digital.len() / members.len();
            for frame in 0..frames {
                for (slot, &idx) in members.iter().enumerate() {
                    let sample = digital[frame * members.len() + slot];
                    columns[idx].push(physical(sample, &header.signals[idx]));
                }
            }
        }

        if let Some(expected) = header.sample_count {
            for column in &mut columns {
                column.truncate(expected);
            }
        }

        Ok(Self {
            name: header.name,
            sampling_frequency: header.sampling_frequency,
            signals: header.signals,
            columns,
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn sampling_frequency(&self) -> f64 {
        self.sampling_frequency
    }

    pub fn sample_count(&self) -> usize {
        self.columns.first().map(Vec::len).unwrap_or(0)
    }

    pub fn channel_names(&self) -> Vec<&str> {
        self.signals
            .iter()
            .map(|signal| signal.description.as_str())
            .collect()
    }

    /// Exact-name lookup into the channel list.
    pub fn channel_index(&self, name: &str) -> Result<usize, GrabError> {
        self.signals
            .iter()
            .position(|signal| signal.description == name)
            .ok_or_else(|| GrabError::ChannelNotFound {
                record: self.name.clone(),
                channel: name.to_string(),
            })
    }

    pub fn channel(&self, index: usize) -> &[f64] {
        &self.columns[index]
    }

    pub fn units(&self, index: usize) -> &str {
        &self.signals[index].units
    }

    /// Sample index divided by the sampling frequency, in seconds.
    pub fn time_axis(&self) -> Vec<f64> {
        (0..self.sample_count())
            .map(|index| index as f64 / self.sampling_frequency)
            .collect()
    }
}

#[derive(Debug)]
struct Header {
    name: String,
    sampling_frequency: f64,
    sample_count: Option<usize>,
    signals: Vec<SignalSpec>,
}

fn parse_header(text: &str) -> Result<Header, GrabError> {
    let mut lines = text
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty() && !line.starts_with('#'));

    let record_line = lines
        .next()
        .ok_or_else(|| GrabError::HeaderParse("empty header".to_string()))?;
    let tokens = record_line.split_whitespace().collect::<Vec<_>>();
    if tokens.len() < 2 {
        return Err(GrabError::HeaderParse(format!(
            "record line {record_line:?} too short"
        )));
    }

    let name = tokens[0].split('/').next().unwrap_or(tokens[0]).to_string();
    let signal_count: usize = tokens[1]
        .parse()
        .map_err(|_| GrabError::HeaderParse(format!("signal count {:?}", tokens[1])))?;

    // The frequency field may carry a counter spec after a slash.
    let sampling_frequency = match tokens.get(2) {
        Some(token) => {
            let head = token.split('/').next().unwrap_or(token);
            head.parse::<f64>()
                .map_err(|_| GrabError::HeaderParse(format!("sampling frequency {token:?}")))?
        }
        None => DEFAULT_SAMPLING_FREQUENCY,
    };

    let sample_count = match tokens.get(3) {
        Some(token) => Some(
            token
                .parse::<usize>()
                .map_err(|_| GrabError::HeaderParse(format!("sample count {token:?}")))?,
        ),
        None => None,
    };

    let mut signals = Vec::with_capacity(signal_count);
    for index in 0..signal_count {
        let line = lines.next().ok_or_else(|| {
            GrabError::HeaderParse(format!(
                "header declares {signal_count} signals, found {index}"
            ))
        })?;
        signals.push(parse_signal_line(line, index)?);
    }

    Ok(Header {
        name,
        sampling_frequency,
        sample_count,
        signals,
    })
}

fn parse_signal_line(line: &str, index: usize) -> Result<SignalSpec, GrabError> {
    let tokens = line.split_whitespace().collect::<Vec<_>>();
    if tokens.len() < 2 {
        return Err(GrabError::HeaderParse(format!(
            "signal line {line:?} too short"
        )));
    }

    let file = tokens[0].to_string();
    // The format field may carry xN / :skew / +offset suffixes.
    let format_digits = tokens[1]
        .chars()
        .take_while(|ch| ch.is_ascii_digit())
        .collect::<String>();
    let format: u32 = format_digits
        .parse()
        .map_err(|_| GrabError::HeaderParse(format!("storage format {:?}", tokens[1])))?;

    let (gain, explicit_baseline, units) = match tokens.get(2) {
        Some(token) => parse_gain_spec(token)?,
        None => (DEFAULT_GAIN, None, None),
    };

    let adc_zero: i32 = match tokens.get(4) {
        Some(token) => token
            .parse()
            .map_err(|_| GrabError::HeaderParse(format!("adc zero {token:?}")))?,
        None => 0,
    };

    let description = if tokens.len() > 8 {
        tokens[8..].join(" ")
    } else {
        format!("signal {index}")
    };

    Ok(SignalSpec {
        file,
        format,
        gain,
        baseline: explicit_baseline.unwrap_or(adc_zero),
        units: units.unwrap_or_else(|| "adu".to_string()),
        description,
    })
}

/// Parses `gain(baseline)/units`, where baseline and units are optional.
fn parse_gain_spec(token: &str) -> Result<(f64, Option<i32>, Option<String>), GrabError> {
    let (head, units) = match token.split_once('/') {
        Some((head, units)) => (head, Some(units.to_string())),
        None => (token, None),
    };

    let (gain_str, baseline) = match head.split_once('(') {
        Some((gain_str, rest)) => {
            let baseline = rest
                .trim_end_matches(')')
                .parse::<i32>()
                .map_err(|_| GrabError::HeaderParse(format!("baseline in {token:?}")))?;
            (gain_str, Some(baseline))
        }
        None => (head, None),
    };

    let gain: f64 = gain_str
        .parse()
        .map_err(|_| GrabError::HeaderParse(format!("gain {token:?}")))?;
    let gain = if gain == 0.0 { DEFAULT_GAIN } else { gain };
    Ok((gain, baseline, units))
}

fn physical(sample: i32, signal: &SignalSpec) -> f64 {
    let sentinel = match signal.format {
        212 => -2048,
        _ => i32::from(i16::MIN),
    };
    if sample == sentinel {
        return f64::NAN;
    }
    f64::from(sample - signal.baseline) / signal.gain
}

fn decode_format16(bytes: &[u8]) -> Vec<i32> {
    bytes
        .chunks_exact(2)
        .map(|pair| i32::from(i16::from_le_bytes([pair[0], pair[1]])))
        .collect()
}

/// Format 212 packs two 12-bit two's-complement samples into 3 bytes.
fn decode_format212(bytes: &[u8]) -> Vec<i32> {
    let mut samples = Vec::with_capacity(bytes.len() / 3 * 2);
    for triple in bytes.chunks_exact(3) {
        let first = (i32::from(triple[1] & 0x0F) << 8) | i32::from(triple[0]);
        let second = (i32::from(triple[1] & 0xF0) << 4) | i32::from(triple[2]);
        samples.push(sign_extend_12(first));
        samples.push(sign_extend_12(second));
    }
    samples
}

fn sign_extend_12(value: i32) -> i32 {
    if value > 2047 { value - 4096 } else { value }
}

#[cfg(test)]
mod tests {
    use assert_matches::assert_matches;

    use super::*;

    const HEADER: &str = "\
a40439n 3 1.0 4
a40439n.dat 16 1(0)/bpm 12 0 86 0 0 HR
a40439n.dat 16 2(10)/mmHg 12 0 120 0 0 ABPMean
a40439n.dat 16 0 12 0 0 0 0 RESP
";

    #[test]
    fn parse_header_fields() {
        let header = parse_header(HEADER).unwrap();
        assert_eq!(header.name, "a40439n");
        assert_eq!(header.sampling_frequency, 1.0);
        assert_eq!(header.sample_count, Some(4));
        assert_eq!(header.signals.len(), 3);

        assert_eq!(header.signals[0].description, "HR");
        assert_eq!(header.signals[0].units, "bpm");
        assert_eq!(header.signals[0].gain, 1.0);
        assert_eq!(header.signals[0].baseline, 0);

        assert_eq!(header.signals[1].gain, 2.0);
        assert_eq!(header.signals[1].baseline, 10);

        // Zero gain falls back to the default; no units token means adu.
        assert_eq!(header.signals[2].gain, DEFAULT_GAIN);
        assert_eq!(header.signals[2].units, "adu");
    }

    #[test]
    fn parse_header_too_few_signal_lines() {
        let err = parse_header("a40439n 2 1.0 4\na40439n.dat 16 1 12 0 0 0 0 HR\n").unwrap_err();
        assert_matches!(err, GrabError::HeaderParse(_));
    }

    #[test]
    fn parse_header_skips_comments() {
        let text = format!("# recorded at bedside\n{HEADER}");
        let header = parse_header(&text).unwrap();
        assert_eq!(header.signals.len(), 3);
    }

    #[test]
    fn frequency_defaults_when_absent() {
        let header = parse_header("x1 1\nx1.dat 16 1 12 0 0 0 0 HR\n").unwrap();
        assert_eq!(header.sampling_frequency, DEFAULT_SAMPLING_FREQUENCY);
        assert_eq!(header.sample_count, None);
    }

    #[test]
    fn decode_212_sign_extension() {
        // 4 and -1, then -2048 (the invalid sentinel) and 2047.
        let bytes = [0x04, 0xF0, 0xFF, 0x00, 0x78, 0xFF];
        assert_eq!(decode_format212(&bytes), vec![4, -1, -2048, 2047]);
    }

    #[test]
    fn decode_16_little_endian() {
        let bytes = [0x01, 0x00, 0xFF, 0xFF, 0x00, 0x80];
        assert_eq!(decode_format16(&bytes), vec![1, -1, -32768]);
    }

    #[test]
    fn physical_conversion_and_sentinel() {
        let signal = SignalSpec {
            file: "x.dat".to_string(),
            format: 16,
            gain: 2.0,
            baseline: 10,
            units: "mmHg".to_string(),
            description: "ABPMean".to_string(),
        };
        assert_eq!(physical(30, &signal), 10.0);
        assert!(physical(i32::from(i16::MIN), &signal).is_nan());
    }
}
