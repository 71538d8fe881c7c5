//! Concurrent parse fan-out for the ingest endpoint.
//!
//! Raw lines flow through a bounded channel to a fixed pool of parser
//! workers; parsed records flow through a second bounded channel to a single
//! collector. Malformed lines are counted and dropped, never inserted.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use tokio::sync::{mpsc, Mutex};

use crate::codec;
use crate::models::NewLog;

pub const CHANNEL_CAPACITY: usize = 1024;

/// Fans the lines out over `num_cpus` workers and collects the parsed
/// records. Returns the records plus the number of dropped lines; the two
/// always add up to the input length.
pub async fn parse_lines(lines: Vec<String>) -> (Vec<NewLog>, usize) {
    if lines.is_empty() {
        return (Vec::new(), 0);
    }
    let total = lines.len();
    let capacity = CHANNEL_CAPACITY.min(total);
    let (line_tx, line_rx) = mpsc::channel::<String>(capacity);
    let (record_tx, mut record_rx) = mpsc::channel::<NewLog>(capacity);
    let line_rx = Arc::new(Mutex::new(line_rx));
    let dropped = Arc::new(AtomicUsize::new(0));

    let workers = num_cpus::get().max(1);
    let mut handles = Vec::with_capacity(workers);
    for _ in 0..workers {
        let line_rx = line_rx.clone();
        let record_tx = record_tx.clone();
        let dropped = dropped.clone();
        handles.push(tokio::spawn(async move {
            loop {
                // hold the lock only for the receive itself
                let line = { line_rx.lock().await.recv().await };
                let Some(line) = line else { break };
                match codec::parse_line(&line) {
                    Some(record) => {
                        if record_tx.send(record).await.is_err() {
                            break;
                        }
                    }
                    None => {
                        dropped.fetch_add(1, Ordering::Relaxed);
                    }
                }
            }
        }));
    }
    // the collector must observe the channel closing once all workers finish
    drop(record_tx);

    let feeder = tokio::spawn(async move {
        for line in lines {
            if line_tx.send(line).await.is_err() {
                break;
            }
        }
    });

    let mut records = Vec::with_capacity(total);
    while let Some(record) = record_rx.recv().await {
        records.push(record);
    }
    let _ = feeder.await;
    for handle in handles {
        let _ = handle.await;
    }

    (records, dropped.load(Ordering::Relaxed))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn good_line(ip: &str) -> String {
        format!(
            "{} - - [2025-04-10T10:20:30Z] \"GET /a HTTP/1.1\" 200 512 \"-\" \"UA\" \"1.1.1.1\"",
            ip
        )
    }

    #[tokio::test]
    async fn empty_input_yields_nothing() {
        let (records, dropped) = parse_lines(Vec::new()).await;
        assert!(records.is_empty());
        assert_eq!(dropped, 0);
    }

    #[tokio::test]
    async fn mixed_batch_counts_drops() {
        let lines = vec![
            "BAD".to_string(),
            good_line("192.168.1.1"),
            "".to_string(),
            good_line("10.0.0.1"),
        ];
        let (records, dropped) = parse_lines(lines).await;
        assert_eq!(records.len(), 2);
        assert_eq!(dropped, 2);
    }

    #[tokio::test]
    async fn inserted_plus_dropped_equals_input() {
        let mut lines = Vec::new();
        for i in 0..500 {
            if i % 3 == 0 {
                lines.push(format!("malformed {}", i));
            } else {
                lines.push(good_line("192.168.1.2"));
            }
        }
        let total = lines.len();
        let (records, dropped) = parse_lines(lines).await;
        assert_eq!(records.len() + dropped, total);
        assert_eq!(dropped, 167);
    }

    #[tokio::test]
    async fn all_malformed_batch_drops_everything() {
        let lines = vec!["x".to_string(); 20];
        let (records, dropped) = parse_lines(lines).await;
        assert!(records.is_empty());
        assert_eq!(dropped, 20);
    }
}
