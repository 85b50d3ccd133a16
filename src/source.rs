//! Landmark frames from an external estimator.
//!
//! The estimator runs out of process and writes one JSON object per camera
//! frame:
//!
//! ```json
//! {"hands":[{"label":"Right","points":[[312,240],[318,221], ...]}]}
//! ```
//!
//! Points are camera pixels in anatomical order. Fractional pixels are rounded.

use log::debug;
use serde::Deserialize;
use serde::de::Error as _;
use std::{
    fs::File,
    io::{self, BufRead, BufReader},
};
use thiserror::Error;

use crate::geometry::Point;
use crate::landmarks::{FrameHands, Hand, HandLandmarks};

#[derive(Debug, Error)]
pub enum SourceError {
    #[error("cannot open landmark source {path}: {source}")]
    Open {
        path: String,
        #[source]
        source: io::Error,
    },
    #[error("landmark source read failed: {0}")]
    Io(#[from] io::Error),
    #[error("landmark source line {line}: {message}")]
    Parse { line: usize, message: String },
}

pub trait LandmarkSource {
    /// Next frame, or `Ok(None)` at end of stream.
    fn next_frame(&mut self) -> Result<Option<FrameHands>, SourceError>;
}

#[derive(Debug, Deserialize)]
struct WireFrame {
    #[serde(default)]
    hands: Vec<WireHand>,
}

#[derive(Debug, Deserialize)]
struct WireHand {
    label: String,
    points: Vec<[f64; 2]>,
}

/// Largest coordinate magnitude accepted from the wire. Anything beyond is
/// a corrupt frame, not a camera pixel.
pub const MAX_COORD: f64 = 1e6;

/// Parses one wire line. Unknown side labels are skipped and a second hand
/// for an already-seen side is ignored.
pub fn parse_frame(line: &str) -> Result<FrameHands, serde_json::Error> {
    let wire: WireFrame = serde_json::from_str(line)?;
    let mut frame = FrameHands::new();
    for hand in wire.hands {
        let Some(side) = Hand::from_label(&hand.label) else {
            debug!("skipping hand with unknown label {:?}", hand.label);
            continue;
        };
        if let Some([x, y]) = hand
            .points
            .iter()
            .find(|p| p.iter().any(|v| !v.is_finite() || v.abs() > MAX_COORD))
        {
            return Err(serde_json::Error::custom(format!(
                "{} hand point [{x}, {y}] out of range",
                hand.label
            )));
        }
        let points = hand
            .points
            .iter()
            .map(|[x, y]| Point::new(x.round() as i32, y.round() as i32))
            .collect();
        if !frame.insert(side, HandLandmarks::new(points)) {
            debug!("ignoring duplicate {side} hand");
        }
    }
    Ok(frame)
}

pub struct JsonLinesSource {
    reader: Box<dyn BufRead + Send>,
    line: usize,
    buf: String,
}

impl JsonLinesSource {
    /// Opens a file or FIFO; `-` reads stdin.
    pub fn open(path: &str) -> Result<Self, SourceError> {
        if path == "-" {
            return Ok(Self::from_reader(BufReader::new(io::stdin())));
        }
        let file = File::open(path).map_err(|source| SourceError::Open {
            path: path.to_string(),
            source,
        })?;
        Ok(Self::from_reader(BufReader::new(file)))
    }

    pub fn from_reader<R: BufRead + Send + 'static>(reader: R) -> Self {
        Self {
            reader: Box::new(reader),
            line: 0,
            buf: String::new(),
        }
    }

    /// Lines consumed so far.
    pub fn line(&self) -> usize {
        self.line
    }
}

impl LandmarkSource for JsonLinesSource {
    fn next_frame(&mut self) -> Result<Option<FrameHands>, SourceError> {
        loop {
            self.buf.clear();
            if self.reader.read_line(&mut self.buf)? == 0 {
                return Ok(None);
            }
            self.line += 1;
            let text = self.buf.trim();
            if text.is_empty() {
                continue;
            }
            return parse_frame(text).map(Some).map_err(|e| SourceError::Parse {
                line: self.line,
                message: e.to_string(),
            });
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    fn hand_json(label: &str, n: usize) -> String {
        let pts: Vec<String> = (0..n).map(|i| format!("[{i},{}]", i * 2)).collect();
        format!(r#"{{"label":"{label}","points":[{}]}}"#, pts.join(","))
    }

    fn source(text: String) -> JsonLinesSource {
        JsonLinesSource::from_reader(Cursor::new(text.into_bytes()))
    }

    #[test]
    fn reads_frames_and_skips_blank_lines() {
        let text = format!(
            "{{\"hands\":[{}]}}\n\n{{\"hands\":[]}}\n",
            hand_json("Right", 21)
        );
        let mut src = source(text);
        let f = src.next_frame().unwrap().unwrap();
        let right = f.right.unwrap();
        assert!(right.is_complete());
        assert_eq!(right.get(20), Some(Point::new(20, 40)));
        assert!(f.left.is_none());

        let f = src.next_frame().unwrap().unwrap();
        assert!(f.is_empty());
        assert!(src.next_frame().unwrap().is_none());
        assert_eq!(src.line(), 3);
    }

    #[test]
    fn labels_are_case_insensitive_and_unknown_skipped() {
        let line = format!(
            "{{\"hands\":[{},{},{}]}}",
            hand_json("LEFT", 21),
            hand_json("middle", 21),
            hand_json("left", 5)
        );
        let f = parse_frame(&line).unwrap();
        assert_eq!(f.left.unwrap().points().len(), 21);
        assert!(f.right.is_none());
    }

    #[test]
    fn short_hands_are_kept() {
        let f = parse_frame(&format!("{{\"hands\":[{}]}}", hand_json("right", 7))).unwrap();
        assert!(!f.right.unwrap().is_complete());
    }

    #[test]
    fn fractional_points_round() {
        let f = parse_frame(r#"{"hands":[{"label":"Right","points":[[1.6,2.4]]}]}"#).unwrap();
        assert_eq!(f.right.unwrap().get(0), Some(Point::new(2, 2)));
    }

    #[test]
    fn parse_error_reports_line() {
        let mut src = source("{\"hands\":[]}\n{not json\n".to_string());
        src.next_frame().unwrap();
        match src.next_frame() {
            Err(SourceError::Parse { line, .. }) => assert_eq!(line, 2),
            other => panic!("expected parse error, got {other:?}"),
        }
    }

    #[test]
    fn huge_coordinates_are_a_parse_error() {
        let mut pts = vec!["[300,300]".to_string(); 21];
        pts[3] = "[-1e12,0]".into();
        pts[4] = "[1e12,0]".into();
        let line = format!(
            r#"{{"hands":[{{"label":"Right","points":[{}]}}]}}"#,
            pts.join(",")
        );
        let err = parse_frame(&line).unwrap_err();
        assert!(err.to_string().contains("out of range"), "{err}");

        let mut src = source(format!("{line}\n{{\"hands\":[]}}\n"));
        assert!(matches!(src.next_frame(), Err(SourceError::Parse { line: 1, .. })));
        assert!(src.next_frame().unwrap().unwrap().is_empty());
    }

    #[test]
    fn coordinates_at_the_limit_are_kept() {
        let f = parse_frame(r#"{"hands":[{"label":"left","points":[[1000000,-1000000]]}]}"#).unwrap();
        assert_eq!(f.left.unwrap().get(0), Some(Point::new(1_000_000, -1_000_000)));
    }

    #[test]
    fn missing_file_is_open_error() {
        let err = JsonLinesSource::open("/nonexistent/handctl/frames.jsonl").err().unwrap();
        assert!(matches!(err, SourceError::Open { .. }));
    }
}
