//! Reading and writing step files.
//!
//! A step file is plain text. It starts with an optional header of
//! `Label: value` lines, in the order given by [`HEADER_LABELS`]; any of
//! them can be left out. After that comes one step per line, three
//! characters each.

use std::{
    fs::File,
    io::{self, BufRead, BufReader, Write},
    path::{Path, PathBuf},
};

use polarsim_geom::{GeometryParams, LenExt as _};

use crate::{StepCommand, StepSequence};

/// Header labels, in the order they must appear.
pub const HEADER_LABELS: [&str; 6] = [
    "Paper Offset Y",
    "Paper Offset X",
    "Step Distance",
    "Spool Distance",
    "Start Length Left",
    "Start Length Right",
];

/// The parameters given in a step file's header. Anything missing from the
/// header is `None`.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct Header {
    pub paper_offset_y: Option<f32>,
    pub paper_offset_x: Option<f32>,
    pub step_distance: Option<f32>,
    pub spool_distance: Option<f32>,
    pub start_length_left: Option<f32>,
    pub start_length_right: Option<f32>,
}

impl Header {
    /// A header that records every parameter.
    pub fn from_params(params: &GeometryParams) -> Header {
        Header {
            paper_offset_y: Some(params.paper_offset.y),
            paper_offset_x: Some(params.paper_offset.x),
            step_distance: Some(params.step_distance.get()),
            spool_distance: Some(params.spool_distance.get()),
            start_length_left: Some(params.start_lengths.left.get()),
            start_length_right: Some(params.start_lengths.right.get()),
        }
    }

    /// Overwrites the parameters that this header specifies, leaving the others alone.
    pub fn apply(&self, params: &mut GeometryParams) {
        if let Some(y) = self.paper_offset_y {
            params.paper_offset.y = y;
        }
        if let Some(x) = self.paper_offset_x {
            params.paper_offset.x = x;
        }
        if let Some(d) = self.step_distance {
            params.step_distance = d.units();
        }
        if let Some(d) = self.spool_distance {
            params.spool_distance = d.units();
        }
        if let Some(l) = self.start_length_left {
            params.start_lengths.left = l.units();
        }
        if let Some(r) = self.start_length_right {
            params.start_lengths.right = r.units();
        }
    }

    pub fn is_empty(&self) -> bool {
        *self == Header::default()
    }

    fn fields(&self) -> [Option<f32>; 6] {
        [
            self.paper_offset_y,
            self.paper_offset_x,
            self.step_distance,
            self.spool_distance,
            self.start_length_left,
            self.start_length_right,
        ]
    }

    fn field_mut(&mut self, idx: usize) -> Option<&mut Option<f32>> {
        Some(match idx {
            0 => &mut self.paper_offset_y,
            1 => &mut self.paper_offset_x,
            2 => &mut self.step_distance,
            3 => &mut self.spool_distance,
            4 => &mut self.start_length_left,
            5 => &mut self.start_length_right,
            _ => return None,
        })
    }
}

/// The contents of a step file.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct LoadedSteps {
    pub header: Header,
    pub steps: StepSequence,
    /// The (1-based) line number of the last line that we couldn't read,
    /// if there was one.
    pub last_error_line: Option<usize>,
}

impl LoadedSteps {
    pub fn record_count(&self) -> usize {
        self.steps.len()
    }
}

#[derive(Debug, thiserror::Error)]
pub enum LoadError {
    #[error("failed to open {}: {source}", .path.display())]
    Open {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("failed to read steps: {0}")]
    Read(#[from] io::Error),
}

fn strip_line_ending(mut line: &[u8]) -> &[u8] {
    if let Some(rest) = line.strip_suffix(b"\n") {
        line = rest;
    }
    if let Some(rest) = line.strip_suffix(b"\r") {
        line = rest;
    }
    line
}

fn parse_header_field(line: &[u8], label: &str) -> Option<f32> {
    let line = std::str::from_utf8(line).ok()?;
    let value = line.strip_prefix(label)?.strip_prefix(':')?;
    value.trim().parse().ok()
}

fn parse_step(line: &[u8]) -> Option<StepCommand> {
    match *line {
        [l, r, p] => Some(StepCommand::from_chars([l as char, r as char, p as char])),
        _ => None,
    }
}

/// Reads a step file.
///
/// Lines that aren't valid steps are skipped, and the last one is remembered
/// in [`LoadedSteps::last_error_line`]. The only errors returned are I/O errors.
pub fn load_steps<R: BufRead>(mut reader: R) -> Result<LoadedSteps, LoadError> {
    let mut ret = LoadedSteps::default();
    let mut steps = Vec::new();
    let mut next_label = 0;
    let mut line_no = 0;
    let mut buf = Vec::new();

    'lines: loop {
        buf.clear();
        if reader.read_until(b'\n', &mut buf)? == 0 {
            break;
        }
        line_no += 1;
        let line = strip_line_ending(&buf);

        // A line that doesn't match the next header label gets offered to the
        // label after that, and finally treated as a step.
        while let Some(label) = HEADER_LABELS.get(next_label) {
            let value = parse_header_field(line, label);
            let field = ret.header.field_mut(next_label);
            next_label += 1;
            if let (Some(value), Some(field)) = (value, field) {
                *field = Some(value);
                continue 'lines;
            }
        }

        match parse_step(line) {
            Some(step) => steps.push(step),
            None => {
                log::debug!("skipping malformed step on line {line_no}");
                ret.last_error_line = Some(line_no);
            }
        }
    }

    ret.steps = StepSequence::new(steps);
    Ok(ret)
}

/// Opens and reads a step file, logging a summary of what was read.
pub fn load_file(path: &Path) -> Result<LoadedSteps, LoadError> {
    let file = File::open(path).map_err(|source| LoadError::Open {
        path: path.to_owned(),
        source,
    })?;
    let loaded = load_steps(BufReader::new(file))?;

    if let Some(line) = loaded.last_error_line {
        log::warn!(
            "non-fatal error reading {}, last error found on line {line}",
            path.display()
        );
    }
    log::info!("read {} steps from {}", loaded.record_count(), path.display());
    Ok(loaded)
}

/// Writes a step file that [`load_steps`] will read back as `header` and `steps`.
pub fn write_steps<W: Write>(mut out: W, header: &Header, steps: &StepSequence) -> io::Result<()> {
    for (label, value) in HEADER_LABELS.iter().zip(header.fields()) {
        if let Some(value) = value {
            writeln!(out, "{label}: {value}")?;
        }
    }
    for step in steps {
        writeln!(out, "{step}")?;
    }
    out.flush()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn load(s: &str) -> LoadedSteps {
        load_steps(s.as_bytes()).unwrap()
    }

    fn seq(steps: &[&str]) -> StepSequence {
        steps.iter().map(|s| s.parse().unwrap()).collect()
    }

    #[test]
    fn empty() {
        let loaded = load("");
        assert!(loaded.steps.is_empty());
        assert_eq!(loaded.record_count(), 0);
        assert_eq!(loaded.last_error_line, None);
        assert!(loaded.header.is_empty());
    }

    #[test]
    fn steps_in_order() {
        let loaded = load("+.+\n..-\n-.+\n");
        assert_eq!(loaded.steps, seq(&["+.+", "..-", "-.+"]));
        assert_eq!(loaded.last_error_line, None);
    }

    #[test]
    fn missing_final_newline() {
        let loaded = load("+.+\n-.-");
        assert_eq!(loaded.steps, seq(&["+.+", "-.-"]));
    }

    #[test]
    fn malformed_line_is_skipped() {
        let loaded = load("+\n+.+\n.-.\n");
        assert_eq!(loaded.record_count(), 2);
        assert_eq!(loaded.last_error_line, Some(1));
        assert_eq!(loaded.steps, seq(&["+.+", ".-."]));
    }

    #[test]
    fn last_error_wins() {
        let loaded = load("+.+\n++++\n...\n\n-.-\n");
        assert_eq!(loaded.record_count(), 3);
        assert_eq!(loaded.last_error_line, Some(4));
    }

    #[test]
    fn crlf() {
        let loaded = load("Step Distance: 0.5\r\n+.+\r\n");
        assert_eq!(loaded.header.step_distance, Some(0.5));
        assert_eq!(loaded.steps, seq(&["+.+"]));
        assert_eq!(loaded.last_error_line, None);
    }

    #[test]
    fn full_header() {
        let loaded = load(
            "Paper Offset Y: 10\n\
             Paper Offset X: 20\n\
             Step Distance: 0.1\n\
             Spool Distance: 400\n\
             Start Length Left: 223.6\n\
             Start Length Right: 360.55\n\
             ..+\n",
        );
        assert_eq!(
            loaded.header,
            Header {
                paper_offset_y: Some(10.0),
                paper_offset_x: Some(20.0),
                step_distance: Some(0.1),
                spool_distance: Some(400.0),
                start_length_left: Some(223.6),
                start_length_right: Some(360.55),
            }
        );
        assert_eq!(loaded.steps, seq(&["..+"]));
    }

    #[test]
    fn partial_header() {
        let loaded = load(
            "Step Distance: 0.1\n\
             Start Length Left: 223.6\n\
             Start Length Right: 360.55\n\
             ..+\n",
        );
        assert_eq!(loaded.header.paper_offset_y, None);
        assert_eq!(loaded.header.spool_distance, None);
        assert_eq!(loaded.header.step_distance, Some(0.1));
        assert_eq!(loaded.header.start_length_right, Some(360.55));
        assert_eq!(loaded.record_count(), 1);
        assert_eq!(loaded.last_error_line, None);

        let mut params = GeometryParams::default();
        loaded.header.apply(&mut params);
        assert_eq!(params.step_distance.get(), 0.1);
        assert_eq!(params.start_lengths.left.get(), 223.6);
        assert_eq!(params.spool_distance, GeometryParams::default().spool_distance);
        assert_eq!(params.paper_offset, GeometryParams::default().paper_offset);
    }

    #[test]
    fn header_out_of_order() {
        // Once we've moved past a label, it isn't recognized any more.
        let loaded = load("Spool Distance: 400\nStep Distance: 0.1\n+.+\n");
        assert_eq!(loaded.header.spool_distance, Some(400.0));
        assert_eq!(loaded.header.step_distance, None);
        assert_eq!(loaded.last_error_line, Some(2));
        assert_eq!(loaded.steps, seq(&["+.+"]));
    }

    #[test]
    fn bad_header_value() {
        let loaded = load("Step Distance: lots\n+.+\n");
        assert_eq!(loaded.header.step_distance, None);
        assert_eq!(loaded.last_error_line, Some(1));
        assert_eq!(loaded.record_count(), 1);
    }

    #[test]
    fn header_only_at_start() {
        let loaded = load("+.+\nStep Distance: 0.1\n");
        assert!(loaded.header.is_empty());
        assert_eq!(loaded.last_error_line, Some(2));
    }

    #[test]
    fn write_then_load() {
        let params = GeometryParams::default();
        let header = Header::from_params(&params);
        let steps = seq(&["+.+", "-+.", "..-"]);

        let mut buf = Vec::new();
        write_steps(&mut buf, &header, &steps).unwrap();
        let loaded = load_steps(buf.as_slice()).unwrap();
        assert_eq!(loaded.header, header);
        assert_eq!(loaded.steps, steps);
        assert_eq!(loaded.last_error_line, None);

        let mut reloaded = GeometryParams {
            spool_distance: 1.0f32.units(),
            ..params
        };
        loaded.header.apply(&mut reloaded);
        assert_eq!(reloaded, params);
    }

    #[test]
    fn missing_file() {
        let err = load_file(Path::new("/this/path/does/not/exist.txt")).unwrap_err();
        assert!(matches!(err, LoadError::Open { .. }));
    }
}
