// Identity roster: merges per-frame detections into one record per person.

pub mod aggregator;
