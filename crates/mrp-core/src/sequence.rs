//! 單據編號

use std::sync::atomic::{AtomicU64, Ordering};

use chrono::NaiveDate;

/// 單據編號產生器，格式 `{prefix}-{yyyymmdd}-{seq:04}`
#[derive(Debug)]
pub struct DocumentSequence {
    prefix: &'static str,
    counter: AtomicU64,
}

impl DocumentSequence {
    pub const fn new(prefix: &'static str) -> Self {
        Self {
            prefix,
            counter: AtomicU64::new(0),
        }
    }

    /// 取得下一個編號
    pub fn next(&self, date: NaiveDate) -> String {
        let seq = self.counter.fetch_add(1, Ordering::Relaxed) + 1;
        format!("{}-{}-{:04}", self.prefix, date.format("%Y%m%d"), seq)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sequence_format() {
        let seq = DocumentSequence::new("PR");
        let date = NaiveDate::from_ymd_opt(2025, 11, 3).unwrap();
        assert_eq!(seq.next(date), "PR-20251103-0001");
        assert_eq!(seq.next(date), "PR-20251103-0002");
    }
}
