use serde::Serialize;
use std::collections::VecDeque;

use rigdaq::Sample;

/// Lets through one sample out of every `update_rate / sensor_rate`.
pub struct Decimator {
    every: u32,
    count: u32,
}

impl Decimator {
    pub fn new(update_rate_ms: u32, sensor_rate_ms: u32) -> Self {
        Decimator {
            every: (update_rate_ms / sensor_rate_ms.max(1)).max(1),
            count: 0,
        }
    }

    pub fn accept(&mut self) -> bool {
        self.count += 1;
        if self.count == self.every {
            self.count = 0;
            true
        } else {
            false
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LivePoint {
    pub seq: u64,
    /// Sampler time in seconds.
    pub time: f64,
    pub values: Vec<f32>,
}

#[derive(Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum FeedMessage<'a> {
    Window {
        channels: &'a [String],
        points: Vec<LivePoint>,
    },
    Points {
        points: Vec<LivePoint>,
    },
}

/// Rolling window of the most recent decimated samples.
pub struct LiveFeed {
    channels: Vec<String>,
    points: VecDeque<LivePoint>,
    max_size: usize,
    next_seq: u64,
}

impl LiveFeed {
    pub fn new(channels: Vec<String>, max_size: usize) -> Self {
        LiveFeed {
            channels,
            points: VecDeque::with_capacity(max_size),
            max_size: max_size.max(1),
            next_seq: 0,
        }
    }

    pub fn push(&mut self, sample: &Sample) {
        if self.points.len() == self.max_size {
            self.points.pop_front();
        }
        self.points.push_back(LivePoint {
            seq: self.next_seq,
            time: sample.timestamp as f64 / 1000.0,
            values: sample.values.clone(),
        });
        self.next_seq += 1;
    }

    pub fn next_seq(&self) -> u64 {
        self.next_seq
    }

    /// Points with `seq >= from` still held in the window.
    pub fn since(&self, from: u64) -> Vec<LivePoint> {
        self.points.iter().filter(|p| p.seq >= from).cloned().collect()
    }

    pub fn window_message(&self) -> FeedMessage<'_> {
        FeedMessage::Window {
            channels: &self.channels,
            points: self.points.iter().cloned().collect(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn decimator_passes_every_nth() {
        let mut decimator = Decimator::new(25, 10);
        let passed: Vec<bool> = (0..6).map(|_| decimator.accept()).collect();
        assert_eq!(passed, vec![false, true, false, true, false, true]);
    }

    #[test]
    fn decimator_never_stalls() {
        // a plot refresh faster than the sensor rate still sees every sample
        let mut decimator = Decimator::new(5, 10);
        assert!((0..4).all(|_| decimator.accept()));
    }

    #[test]
    fn window_is_bounded() {
        let mut feed = LiveFeed::new(vec!["FM".into()], 3);
        for t in 0..5u32 {
            feed.push(&Sample::new(t * 10, vec![t as f32]));
        }
        assert_eq!(feed.next_seq(), 5);
        let seqs: Vec<u64> = feed.since(0).iter().map(|p| p.seq).collect();
        assert_eq!(seqs, vec![2, 3, 4]);
        assert_eq!(feed.since(4)[0].time, 0.04);
        assert!(feed.since(5).is_empty());
    }

    #[test]
    fn messages_serialize_with_type_tag() {
        let mut feed = LiveFeed::new(vec!["PT1".into()], 10);
        feed.push(&Sample::new(1500, vec![f32::NAN]));

        let json = serde_json::to_value(feed.window_message()).unwrap();
        assert_eq!(json["type"], "window");
        assert_eq!(json["channels"][0], "PT1");
        assert_eq!(json["points"][0]["time"], 1.5);
        // a faulted channel shows up as null
        assert!(json["points"][0]["values"][0].is_null());

        let json = serde_json::to_value(FeedMessage::Points { points: feed.since(0) }).unwrap();
        assert_eq!(json["type"], "points");
    }
}
