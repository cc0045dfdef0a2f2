//! Quota reconciliation and display rows
//!
//! Reported quota counters are compared with a recomputed [`Summary`];
//! both are rendered as rows of display strings for the CLI.

use fsaudit_common::{Quota, Summary};
use serde::Serialize;

const UNLIMITED: &str = "unlimited";

/// Marker of a row whose reported and recomputed values agree
pub const CHECK_SUCCESS: &str = "success";
/// Marker of a row whose reported and recomputed values disagree
pub const CHECK_FAILED: &str = "failed";

/// Reported versus recomputed usage, formatted for display
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct QuotaCheckRow {
    pub capacity: String,
    pub used_bytes: String,
    pub real_bytes: String,
    pub max_inodes: String,
    pub used_inodes: String,
    pub real_inodes: String,
    pub status: String,
}

impl QuotaCheckRow {
    pub const HEADER: [&'static str; 7] = [
        "CAPACITY", "USED", "REAL_USED", "INODES", "INODES_IUSED", "REAL_INODES_IUSED", "STATUS",
    ];

    #[must_use]
    pub fn cells(&self) -> [&str; 7] {
        [
            self.capacity.as_str(),
            self.used_bytes.as_str(),
            self.real_bytes.as_str(),
            self.max_inodes.as_str(),
            self.used_inodes.as_str(),
            self.real_inodes.as_str(),
            self.status.as_str(),
        ]
    }
}

/// Quota limits and usage, humanized for display
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct QuotaUsageRow {
    pub capacity: String,
    pub used_bytes: String,
    pub bytes_percent: String,
    pub max_inodes: String,
    pub used_inodes: String,
    pub inodes_percent: String,
}

impl QuotaUsageRow {
    pub const HEADER: [&'static str; 6] =
        ["CAPACITY", "USED", "USED%", "INODES", "INODES_IUSED", "INODES_IUSED%"];

    #[must_use]
    pub fn cells(&self) -> [&str; 6] {
        [
            self.capacity.as_str(),
            self.used_bytes.as_str(),
            self.bytes_percent.as_str(),
            self.max_inodes.as_str(),
            self.used_inodes.as_str(),
            self.inodes_percent.as_str(),
        ]
    }
}

/// Outcome of checking one quota against its subtree
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct QuotaCheck {
    pub quota: Quota,
    pub real: Summary,
    pub row: QuotaCheckRow,
    pub consistent: bool,
}

impl QuotaCheck {
    #[must_use]
    pub fn new(quota: Quota, real: Summary) -> Self {
        let (row, consistent) = reconcile(
            quota.max_bytes,
            quota.used_bytes,
            quota.max_inodes,
            quota.used_inodes,
            to_signed(real.length),
            to_signed(real.inodes),
        );
        Self {
            quota,
            real,
            row,
            consistent,
        }
    }
}

/// Compare reported counters against recomputed ones
///
/// Consistent only when both byte and inode counters match exactly.
#[must_use]
pub fn reconcile(
    capacity: u64,
    used_bytes: i64,
    max_inodes: u64,
    used_inodes: i64,
    real_bytes: i64,
    real_inodes: i64,
) -> (QuotaCheckRow, bool) {
    let consistent = used_bytes == real_bytes && used_inodes == real_inodes;
    let row = QuotaCheckRow {
        capacity: limit_or_unlimited(capacity, ucomma),
        used_bytes: comma(used_bytes),
        real_bytes: comma(real_bytes),
        max_inodes: limit_or_unlimited(max_inodes, ucomma),
        used_inodes: comma(used_inodes),
        real_inodes: comma(real_inodes),
        status: if consistent { CHECK_SUCCESS } else { CHECK_FAILED }.to_string(),
    };
    (row, consistent)
}

/// Render quota limits and usage for display
#[must_use]
pub fn humanize_quota(capacity: u64, used_bytes: i64, max_inodes: u64, used_inodes: i64) -> QuotaUsageRow {
    QuotaUsageRow {
        capacity: limit_or_unlimited(capacity, ibytes),
        used_bytes: signed_ibytes(used_bytes),
        bytes_percent: percent(used_bytes, capacity),
        max_inodes: limit_or_unlimited(max_inodes, ucomma),
        used_inodes: comma(used_inodes),
        inodes_percent: percent(used_inodes, max_inodes),
    }
}

/// `used` as a whole percentage of `limit`, rounded half away from zero;
/// empty when there is no limit
#[must_use]
pub fn percent(used: i64, limit: u64) -> String {
    if limit == 0 {
        return String::new();
    }
    let pct = (used as f64 * 100.0 / limit as f64).round() as i64;
    pct.to_string()
}

/// Size in IEC units: `1000 B`, `1.5 KiB`, `12 MiB`
#[must_use]
pub fn ibytes(bytes: u64) -> String {
    const UNITS: [&str; 7] = ["B", "KiB", "MiB", "GiB", "TiB", "PiB", "EiB"];

    if bytes < 10 {
        return format!("{bytes} B");
    }

    let mut exp = 0;
    let mut scale: u128 = 1;
    while exp < UNITS.len() - 1 && u128::from(bytes) >= scale * 1024 {
        scale *= 1024;
        exp += 1;
    }

    let value = (bytes as f64 / scale as f64 * 10.0 + 0.5).floor() / 10.0;
    if value < 10.0 {
        format!("{value:.1} {}", UNITS[exp])
    } else {
        format!("{value:.0} {}", UNITS[exp])
    }
}

/// [`ibytes`] for counters that may be transiently negative
#[must_use]
pub fn signed_ibytes(bytes: i64) -> String {
    if bytes < 0 {
        format!("-{}", ibytes(bytes.unsigned_abs()))
    } else {
        ibytes(bytes.unsigned_abs())
    }
}

/// Integer with thousands separators: `1,234,567`
#[must_use]
pub fn comma(value: i64) -> String {
    let digits = ucomma(value.unsigned_abs());
    if value < 0 { format!("-{digits}") } else { digits }
}

/// [`comma`] for limits, which use the full `u64` range
#[must_use]
pub fn ucomma(value: u64) -> String {
    let digits = value.to_string();
    let mut out = String::with_capacity(digits.len() + digits.len() / 3);
    for (i, ch) in digits.chars().enumerate() {
        if i > 0 && (digits.len() - i) % 3 == 0 {
            out.push(',');
        }
        out.push(ch);
    }
    out
}

fn limit_or_unlimited(limit: u64, render: impl FnOnce(u64) -> String) -> String {
    if limit == 0 {
        UNLIMITED.to_string()
    } else {
        render(limit)
    }
}

fn to_signed(value: u64) -> i64 {
    i64::try_from(value).unwrap_or(i64::MAX)
}
