//! Slicing feed records into batches.

use cohortsync_domain::{CohortSyncError, GenomicsBatch, ProcessingStatus, Result};
use uuid::Uuid;

/// Split `records` into PENDING batches of at most `batch_size`.
///
/// `batch_size` on each batch is the number of records it actually holds,
/// so the sizes always sum to `records.len()`.
pub fn slice_records(
    payload_id: &str,
    records: &[serde_json::Value],
    batch_size: usize,
    now: i64,
) -> Result<Vec<GenomicsBatch>> {
    if batch_size == 0 {
        return Err(CohortSyncError::Config("genomics batch size must be at least 1".into()));
    }

    records
        .chunks(batch_size)
        .map(|chunk| {
            Ok(GenomicsBatch {
                id: Uuid::now_v7().to_string(),
                payload_id: payload_id.to_string(),
                batch_payload: serde_json::to_string(chunk)?,
                batch_size: chunk.len() as i64,
                status: ProcessingStatus::Pending,
                retry_count: 0,
                error_details: None,
                created_on: now,
                updated_on: now,
            })
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    fn records(n: usize) -> Vec<serde_json::Value> {
        (0..n).map(|i| json!({"participant_id": format!("P{i}")})).collect()
    }

    #[test]
    fn six_records_with_batch_size_ten_make_one_batch_of_six() {
        let batches = slice_records("payload-1", &records(6), 10, 0).unwrap();
        assert_eq!(batches.len(), 1);
        assert_eq!(batches[0].batch_size, 6);
        assert_eq!(batches[0].status, ProcessingStatus::Pending);
    }

    #[test]
    fn sizes_sum_to_record_count() {
        for (count, size) in [(0, 10), (1, 1), (10, 10), (23, 10), (7, 3)] {
            let batches = slice_records("p", &records(count), size, 0).unwrap();
            let total: i64 = batches.iter().map(|b| b.batch_size).sum();
            assert_eq!(total, count as i64, "{count} records / {size}");
            assert_eq!(batches.len(), count.div_ceil(size));
        }
    }

    #[test]
    fn batch_payload_holds_its_slice_in_order() {
        let batches = slice_records("p", &records(5), 2, 0).unwrap();
        let last: Vec<serde_json::Value> = serde_json::from_str(&batches[2].batch_payload).unwrap();
        assert_eq!(last, vec![json!({"participant_id": "P4"})]);
        assert!(batches.iter().all(|b| b.payload_id == "p"));
    }

    #[test]
    fn zero_batch_size_is_rejected() {
        assert!(slice_records("p", &records(3), 0, 0).is_err());
    }
}
