use std::collections::HashMap;

use super::record::StoredRecord;
use super::traits::Entry;

/// Collapse records sharing an id, readable or not.
///
/// The survivor keeps the position of the first occurrence. A later duplicate
/// replaces it only when its recency is strictly greater; records without an
/// id are dropped.
pub fn dedupe_by_id<E: Entry>(records: Vec<StoredRecord<E>>) -> Vec<StoredRecord<E>> {
    let mut result: Vec<StoredRecord<E>> = Vec::with_capacity(records.len());
    let mut positions: HashMap<String, usize> = HashMap::new();

    for record in records {
        let Some(id) = record.id() else {
            continue;
        };
        match positions.get(&id) {
            Some(&index) => {
                if record.recency() > result[index].recency() {
                    result[index] = record;
                }
            }
            None => {
                positions.insert(id, result.len());
                result.push(record);
            }
        }
    }

    result
}
