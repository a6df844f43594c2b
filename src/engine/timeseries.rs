//! Append-only time-series engine (spec §4.H).
//!
//! Rows are bucketed by partition width (hourly/daily) into sorted
//! `Vec<Row>` per bucket, keyed by the bucket's floored start-of-partition
//! epoch second. Appends insert at the correct sorted position within a
//! bucket (ordered by timestamp), mirroring the teacher's `SortedFile`
//! insertion discipline without the on-disk paging.

use crate::predicate::Predicate;
use crate::resultset::{ColumnMeta, ResultSet};
use crate::row::Row;
use crate::schema::{floor_div, validate_row, Granularity, Partition, RetentionPolicy, TimeSeriesSchema};
use crate::status::{KdbResult, Status};
use crate::value::{DataType, Value};
use parking_lot::Mutex;
use rustc_hash::FxHashMap;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Aggregate {
    Count,
    Sum,
    Min,
    Max,
    Avg,
}

/// A fixed 24-hour grace window past a bucket's own start, independent of
/// the series' partition width. See spec §4.H: TTL drops a whole bucket
/// once `bucketStart + 86400 < cutoff`, even under `Partition::Hourly`.
const TTL_BUCKET_GRACE_SECONDS: i64 = 86_400;

/// Converts a caller-supplied `bucketWidth` (a count of `granularity`
/// units) into seconds, per spec §4.H ("bucketWidth converted to seconds,
/// minimum 1").
fn bucket_width_seconds(width: i64, granularity: Granularity) -> i64 {
    let seconds = match granularity {
        Granularity::Nanoseconds | Granularity::Microseconds | Granularity::Milliseconds => {
            width / granularity.seconds_divisor()
        }
        Granularity::Seconds => width,
        Granularity::Minutes | Granularity::Hours | Granularity::Days => {
            width * granularity.unit_seconds()
        }
    };
    seconds.max(1)
}

struct SeriesData {
    schema: TimeSeriesSchema,
    /// bucket start epoch second -> rows sorted by timestamp.
    buckets: std::collections::BTreeMap<i64, Vec<Row>>,
}

impl SeriesData {
    fn bucket_for(&self, epoch_seconds: i64) -> i64 {
        self.schema.partition.bucket_start(epoch_seconds)
    }

    fn enforce_retention(&mut self) {
        let policy = self.schema.retention;
        if policy.ttl_seconds > 0 {
            if let Some((&max_bucket, rows)) = self.buckets.iter().next_back() {
                let newest_ts = rows
                    .last()
                    .map(|r| r.get(0).and_then(|v| v.as_int().ok()).unwrap_or(0))
                    .unwrap_or(max_bucket);
                let newest_epoch = self.schema.granularity.to_epoch_seconds(newest_ts);
                let cutoff = newest_epoch - policy.ttl_seconds as i64;

                let mut drop_buckets = Vec::new();
                for (&bucket, rows) in self.buckets.iter_mut() {
                    if bucket + TTL_BUCKET_GRACE_SECONDS < cutoff {
                        drop_buckets.push(bucket);
                        continue;
                    }
                    rows.retain(|r| {
                        let ts_raw = r.get(0).and_then(|v| v.as_int().ok()).unwrap_or(0);
                        self.schema.granularity.to_epoch_seconds(ts_raw) >= cutoff
                    });
                }
                for bucket in drop_buckets {
                    self.buckets.remove(&bucket);
                }
                self.buckets.retain(|_, rows| !rows.is_empty());
            }
        }
        if policy.max_rows > 0 && policy.drop_oldest {
            let mut total: u64 = self.buckets.values().map(|v| v.len() as u64).sum();
            let bucket_keys: Vec<i64> = self.buckets.keys().cloned().collect();
            for bucket in bucket_keys {
                if total <= policy.max_rows {
                    break;
                }
                if let Some(rows) = self.buckets.get_mut(&bucket) {
                    while total > policy.max_rows && !rows.is_empty() {
                        rows.remove(0);
                        total -= 1;
                    }
                    if rows.is_empty() {
                        self.buckets.remove(&bucket);
                    }
                }
            }
        }
    }
}

#[derive(Default)]
pub struct TimeSeriesStore {
    series: Mutex<FxHashMap<String, SeriesData>>,
}

impl TimeSeriesStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn create_series(&self, name: &str, schema: TimeSeriesSchema) -> KdbResult<()> {
        let mut series = self.series.lock();
        if series.contains_key(name) {
            return Err(Status::already_exists(format!("series '{}' already exists", name)));
        }
        series.insert(
            name.to_string(),
            SeriesData { schema, buckets: std::collections::BTreeMap::new() },
        );
        Ok(())
    }

    /// Validates against the derived table schema, inserts sorted by
    /// timestamp within the owning bucket, then enforces retention.
    pub fn append(&self, name: &str, row: Row) -> KdbResult<()> {
        let mut series = self.series.lock();
        let s = series
            .get_mut(name)
            .ok_or_else(|| Status::not_found(format!("series '{}' not found", name)))?;

        let derived = s.schema.derived_table_schema()?;
        validate_row(&derived, row.values())?;

        let ts_raw = row
            .get(0)
            .ok_or_else(|| Status::invalid_argument("missing timestamp"))?
            .as_int()?;
        let epoch = s.schema.granularity.to_epoch_seconds(ts_raw);
        let bucket = s.bucket_for(epoch);

        let entry = s.buckets.entry(bucket).or_default();
        let pos = entry
            .binary_search_by_key(&ts_raw, |r| r.get(0).and_then(|v| v.as_int().ok()).unwrap_or(0))
            .unwrap_or_else(|p| p);
        entry.insert(pos, row);

        s.enforce_retention();
        Ok(())
    }

    /// Half-open `[start, end)` raw-timestamp range scan with column
    /// projection and predicate filtering.
    pub fn range(
        &self,
        name: &str,
        projection: &[String],
        start: i64,
        end: i64,
        where_: Option<&Predicate>,
    ) -> KdbResult<ResultSet> {
        let series = self.series.lock();
        let s = series
            .get(name)
            .ok_or_else(|| Status::not_found(format!("series '{}' not found", name)))?;
        let derived = s.schema.derived_table_schema()?;

        let proj_indices: Vec<usize> = if projection.is_empty() {
            (0..derived.columns.len()).collect()
        } else {
            let mut idxs = Vec::with_capacity(projection.len());
            for p in projection {
                let idx = derived
                    .column_index(p)
                    .ok_or_else(|| Status::invalid_argument(format!("unknown column '{}'", p)))?;
                idxs.push(idx);
            }
            idxs
        };

        let columns: Vec<ColumnMeta> = proj_indices
            .iter()
            .map(|&i| ColumnMeta { name: derived.columns[i].name.clone(), data_type: derived.columns[i].data_type })
            .collect();

        let mut rs = ResultSet::new(columns);
        if end <= start {
            return Ok(rs);
        }
        let start_bucket = s.bucket_for(start);
        let end_bucket = s.bucket_for(end - 1);
        for (_, rows) in s.buckets.range(start_bucket..=end_bucket) {
            for row in rows {
                let ts = row.get(0).and_then(|v| v.as_int().ok()).unwrap_or(0);
                if ts < start || ts >= end {
                    continue;
                }
                if let Some(pred) = where_ {
                    if !pred.eval(row) {
                        continue;
                    }
                }
                let values: Vec<Value> = proj_indices.iter().map(|&i| row.get(i).cloned().unwrap_or(Value::Null)).collect();
                rs.push_row(values);
            }
        }
        Ok(rs)
    }

    /// Bucketed aggregation of one value column over `[start, end)`, grouped
    /// by a caller-supplied bucket width rather than the series' own
    /// storage partition (spec §4.H). Bucket keys are
    /// `start + floor_div(tsec - start, widthSec) * widthSec`.
    #[allow(clippy::too_many_arguments)]
    pub fn aggregate(
        &self,
        name: &str,
        value_column: &str,
        agg: Aggregate,
        start: i64,
        end: i64,
        bucket_width: i64,
        bucket_granularity: Granularity,
        where_: Option<&Predicate>,
    ) -> KdbResult<ResultSet> {
        let series = self.series.lock();
        let s = series
            .get(name)
            .ok_or_else(|| Status::not_found(format!("series '{}' not found", name)))?;
        let derived = s.schema.derived_table_schema()?;
        let col_idx = derived
            .column_index(value_column)
            .ok_or_else(|| Status::invalid_argument(format!("unknown column '{}'", value_column)))?;

        let value_type = if agg == Aggregate::Count { DataType::Integer } else { DataType::Float };
        let mut rs = ResultSet::new(vec![
            ColumnMeta { name: "bucket_start".into(), data_type: DataType::Integer },
            ColumnMeta { name: "value".into(), data_type: value_type },
        ]);
        if end <= start {
            return Ok(rs);
        }

        let width_sec = bucket_width_seconds(bucket_width, bucket_granularity);
        let start_bucket = s.bucket_for(start);
        let end_bucket = s.bucket_for(end - 1);

        struct Acc {
            sum: f64,
            count: u64,
            min: f64,
            max: f64,
        }

        let mut buckets: std::collections::BTreeMap<i64, Acc> = std::collections::BTreeMap::new();
        for (_, rows) in s.buckets.range(start_bucket..=end_bucket) {
            for row in rows {
                let ts = row.get(0).and_then(|v| v.as_int().ok()).unwrap_or(0);
                if ts < start || ts >= end {
                    continue;
                }
                if let Some(pred) = where_ {
                    if !pred.eval(row) {
                        continue;
                    }
                }
                let key = start + floor_div(ts - start, width_sec) * width_sec;
                let acc = buckets.entry(key).or_insert(Acc {
                    sum: 0.0,
                    count: 0,
                    min: f64::INFINITY,
                    max: f64::NEG_INFINITY,
                });
                if agg == Aggregate::Count {
                    acc.count += 1;
                    continue;
                }
                let Some(v) = row.get(col_idx) else { continue };
                if v.is_null() {
                    continue;
                }
                let f = v.as_float()?;
                acc.sum += f;
                acc.count += 1;
                acc.min = acc.min.min(f);
                acc.max = acc.max.max(f);
            }
        }

        for (bucket, acc) in buckets {
            if acc.count == 0 {
                continue;
            }
            let value = match agg {
                Aggregate::Count => Value::integer(acc.count as i64),
                Aggregate::Sum => Value::float(acc.sum),
                Aggregate::Min => Value::float(acc.min),
                Aggregate::Max => Value::float(acc.max),
                Aggregate::Avg => Value::float(acc.sum / acc.count as f64),
            };
            rs.push_row(vec![Value::integer(bucket), value]);
        }
        Ok(rs)
    }

    pub fn apply_retention(&self, name: &str) -> KdbResult<()> {
        let mut series = self.series.lock();
        let s = series
            .get_mut(name)
            .ok_or_else(|| Status::not_found(format!("series '{}' not found", name)))?;
        s.enforce_retention();
        Ok(())
    }

    pub fn row_count(&self, name: &str) -> KdbResult<u64> {
        let series = self.series.lock();
        let s = series
            .get(name)
            .ok_or_else(|| Status::not_found(format!("series '{}' not found", name)))?;
        Ok(s.buckets.values().map(|v| v.len() as u64).sum())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::Column;

    fn schema(ttl: u64, max_rows: u64, drop_oldest: bool) -> TimeSeriesSchema {
        TimeSeriesSchema {
            timestamp_column: "ts".into(),
            granularity: Granularity::Seconds,
            tag_columns: vec![Column::new("host", DataType::String)],
            value_columns: vec![Column::new("cpu", DataType::Float)],
            partition: Partition::Hourly,
            retention: RetentionPolicy { ttl_seconds: ttl, max_rows, drop_oldest },
        }
    }

    fn row(ts: i64, host: &str, cpu: f64) -> Row {
        Row::new(vec![Value::integer(ts), Value::string(host), Value::float(cpu)])
    }

    #[test]
    fn scenario_s3_append_range_aggregate() {
        let store = TimeSeriesStore::new();
        store.create_series("metrics", schema(0, 0, false)).unwrap();
        for (ts, cpu) in [(100, 10.0), (105, 20.0), (110, 30.0), (115, 40.0), (120, 50.0), (125, 60.0)] {
            store.append("metrics", row(ts, "a", cpu)).unwrap();
        }

        let rs = store.range("metrics", &[], 100, 130, None).unwrap();
        assert_eq!(rs.row_count(), 6);

        let agg = store
            .aggregate("metrics", "cpu", Aggregate::Sum, 100, 130, 10, Granularity::Seconds, None)
            .unwrap();
        assert_eq!(agg.row_count(), 3);
        assert_eq!(agg.cell(0, 0).unwrap(), &Value::integer(100));
        assert_eq!(agg.cell(0, 1).unwrap(), &Value::float(30.0));
        assert_eq!(agg.cell(1, 0).unwrap(), &Value::integer(110));
        assert_eq!(agg.cell(1, 1).unwrap(), &Value::float(70.0));
        assert_eq!(agg.cell(2, 0).unwrap(), &Value::integer(120));
        assert_eq!(agg.cell(2, 1).unwrap(), &Value::float(110.0));
    }

    #[test]
    fn append_keeps_bucket_sorted_by_timestamp() {
        let store = TimeSeriesStore::new();
        store.create_series("m", schema(0, 0, false)).unwrap();
        store.append("m", row(100, "a", 1.0)).unwrap();
        store.append("m", row(10, "a", 2.0)).unwrap();
        store.append("m", row(50, "a", 3.0)).unwrap();
        let rs = store.range("m", &[], 0, 1000, None).unwrap();
        let timestamps: Vec<i64> = (0..rs.row_count())
            .map(|i| rs.cell(i, 0).unwrap().as_int().unwrap())
            .collect();
        assert_eq!(timestamps, vec![10, 50, 100]);
    }

    #[test]
    fn range_end_is_exclusive() {
        let store = TimeSeriesStore::new();
        store.create_series("m", schema(0, 0, false)).unwrap();
        store.append("m", row(10, "a", 1.0)).unwrap();
        store.append("m", row(20, "a", 2.0)).unwrap();
        let rs = store.range("m", &[], 10, 20, None).unwrap();
        assert_eq!(rs.row_count(), 1);
        assert_eq!(rs.cell(0, 0).unwrap(), &Value::integer(10));
    }

    #[test]
    fn retention_max_rows_drops_oldest() {
        let store = TimeSeriesStore::new();
        store.create_series("m", schema(0, 2, true)).unwrap();
        store.append("m", row(0, "a", 1.0)).unwrap();
        store.append("m", row(10, "a", 2.0)).unwrap();
        store.append("m", row(20, "a", 3.0)).unwrap();
        assert_eq!(store.row_count("m").unwrap(), 2);
        let rs = store.range("m", &[], 0, 1000, None).unwrap();
        assert_eq!(rs.cell(0, 0).unwrap(), &Value::integer(10));
    }

    #[test]
    fn append_rejects_wrong_arity() {
        let store = TimeSeriesStore::new();
        store.create_series("m", schema(0, 0, false)).unwrap();
        let err = store
            .append("m", Row::new(vec![Value::integer(0)]))
            .unwrap_err();
        assert_eq!(err.code, crate::status::StatusCode::InvalidArgument);
    }
}
