//! Work-list path normalization.
//!
//! Entries in a work list may be written as full URIs (`s3://bucket/logs/`,
//! or the Hadoop spelling `s3a://bucket/logs/`) or as plain key prefixes.
//! Listing calls need the key prefix only.

const BUCKET_URI_SCHEMES: [&str; 2] = ["s3a://", "s3://"];

/// Remove a leading `s3a://<bucket>/` or `s3://<bucket>/` from `path`.
///
/// At most one prefix is removed. Entries that do not start with one of the
/// recognized prefixes (including URIs naming a different bucket) are
/// returned unchanged.
///
/// ```
/// use s3thaw_rs::path::strip_bucket_prefix;
///
/// assert_eq!(strip_bucket_prefix("s3://logs-bucket/2021/", "logs-bucket"), "2021/");
/// assert_eq!(strip_bucket_prefix("2021/", "logs-bucket"), "2021/");
/// ```
pub fn strip_bucket_prefix(path: &str, bucket: &str) -> String {
    for scheme in BUCKET_URI_SCHEMES {
        let bucket_prefix = format!("{scheme}{bucket}/");
        if let Some(stripped) = path.strip_prefix(&bucket_prefix) {
            return stripped.to_string();
        }
    }
    path.to_string()
}
