//! Replays recorded coefficient frames from a file.
//!
//! One `+KCOEF:` line per frame, one frame handed out per `take()` call.
//! Garbage lines are logged and skipped, which often happens at the start
//! of a capture when the link still had partial lines in flight.

use log::warn;
use std::fs::File;
use std::io::{self, BufRead, BufReader, Lines};
use std::path::Path;

use crate::coefficients::{CoefficientSource, CurvatureModel};

/// A [`CoefficientSource`] fed from a recorded frame file.
pub struct ReplaySource {
    lines: Lines<BufReader<File>>,
}

impl ReplaySource {
    /// Opens a recorded frame file for replay.
    pub fn open(path: impl AsRef<Path>) -> io::Result<Self> {
        let file = File::open(path)?;
        Ok(ReplaySource {
            lines: BufReader::new(file).lines(),
        })
    }
}

impl CoefficientSource for ReplaySource {
    fn take(&mut self) -> Option<CurvatureModel> {
        for line in self.lines.by_ref() {
            let text = match line {
                Ok(text) => text,
                Err(err) => {
                    warn!("read error in replay file: {err}");
                    return None;
                }
            };
            let trimmed = text.trim();
            if trimmed.is_empty() {
                continue;
            }
            match trimmed.parse::<CurvatureModel>() {
                Ok(model) => return Some(model),
                Err(err) => {
                    warn!("was unable to parse coefficient frame: {err}");
                }
            }
        }
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn replays_frames_in_order_and_skips_garbage() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "+KCOEF:1.0,2.0,3.0,4.0").unwrap();
        writeln!(file, "garbage from a torn line").unwrap();
        writeln!(file).unwrap();
        writeln!(file, "+KCOEF:-0.5,0.25,0.0,1.5").unwrap();
        file.flush().unwrap();

        let mut source = ReplaySource::open(file.path()).unwrap();

        assert_eq!(
            source.take().unwrap(),
            CurvatureModel {
                ax: 1.0,
                bx: 2.0,
                ay: 3.0,
                by: 4.0,
            }
        );
        assert_eq!(
            source.take().unwrap(),
            CurvatureModel {
                ax: -0.5,
                bx: 0.25,
                ay: 0.0,
                by: 1.5,
            }
        );
        assert!(source.take().is_none());
        assert!(source.take().is_none());
    }

    #[test]
    fn missing_file_is_an_error() {
        assert!(ReplaySource::open("/no/such/replay.txt").is_err());
    }
}
