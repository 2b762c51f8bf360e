use super::{Record, Recorder};
use log::info;

/// Buffered recorder.
///
/// Keeps every record in memory, in the order written. Used for collecting
/// learning curves of an agent over episodes.
#[derive(Default)]
pub struct BufferedRecorder {
    buf: Vec<Record>,
    verbose: bool,
}

impl BufferedRecorder {
    /// Construct the recorder.
    pub fn new() -> Self {
        Self::default()
    }

    /// Also logs scalar values of each record at `info` level.
    pub fn verbose(mut self, v: bool) -> Self {
        self.verbose = v;
        self
    }

    /// Returns an iterator over the records.
    pub fn iter(&self) -> std::slice::Iter<Record> {
        self.buf.iter()
    }

    /// Number of stored records.
    pub fn len(&self) -> usize {
        self.buf.len()
    }

    /// Returns `true` if nothing has been written.
    pub fn is_empty(&self) -> bool {
        self.buf.is_empty()
    }

    /// Collects the scalar stored under `key` in every record having it.
    pub fn scalars(&self, key: &str) -> Vec<f32> {
        self.buf
            .iter()
            .filter_map(|r| r.get_scalar(key).ok())
            .collect()
    }
}

impl Recorder for BufferedRecorder {
    fn write(&mut self, record: Record) {
        if self.verbose {
            let mut keys = record.keys().cloned().collect::<Vec<_>>();
            keys.sort();
            for k in keys.iter() {
                if let Ok(v) = record.get_scalar(k) {
                    info!("{}: {}", k, v);
                }
            }
        }
        self.buf.push(record);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_scalars_skip_missing_keys() {
        let mut recorder = BufferedRecorder::new();
        recorder.write(Record::from_scalar("return", 1.0));
        recorder.write(Record::from_scalar("loss", 0.5));
        recorder.write(Record::from_scalar("return", 2.0));

        assert_eq!(recorder.len(), 3);
        assert_eq!(recorder.scalars("return"), vec![1.0, 2.0]);
    }
}
