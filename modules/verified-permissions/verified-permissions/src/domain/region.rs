//! Region and partition helpers.

use std::fmt;

/// AWS partition of a region.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Partition {
    Aws,
    AwsCn,
    AwsUsGov,
}

impl Partition {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Aws => "aws",
            Self::AwsCn => "aws-cn",
            Self::AwsUsGov => "aws-us-gov",
        }
    }
}

impl fmt::Display for Partition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// `cn-*` regions are in `aws-cn`, `us-gov-*` in `aws-us-gov`, everything else in `aws`.
#[must_use]
pub fn partition_for_region(region: &str) -> Partition {
    if region.starts_with("cn-") {
        Partition::AwsCn
    } else if region.starts_with("us-gov-") {
        Partition::AwsUsGov
    } else {
        Partition::Aws
    }
}

/// Region component of an ARN such as
/// `arn:aws:verifiedpermissions:us-east-1:123456789012:policy-store/ps-1`.
///
/// `None` for malformed ARNs and for global resources without a region.
#[must_use]
pub fn region_from_arn(arn: &str) -> Option<&str> {
    let mut parts = arn.splitn(6, ':');
    if parts.next() != Some("arn") {
        return None;
    }
    let region = parts.nth(2)?;
    // account and resource must follow
    parts.nth(1)?;
    (!region.is_empty()).then_some(region)
}

#[cfg(test)]
#[cfg_attr(coverage_nightly, coverage(off))]
mod tests {
    use super::*;

    #[test]
    fn partitions() {
        assert_eq!(partition_for_region("cn-north-1"), Partition::AwsCn);
        assert_eq!(partition_for_region("us-gov-west-1"), Partition::AwsUsGov);
        assert_eq!(partition_for_region("us-east-1"), Partition::Aws);
        assert_eq!(partition_for_region(""), Partition::Aws);
        assert_eq!(Partition::AwsUsGov.to_string(), "aws-us-gov");
    }

    #[test]
    fn arn_region() {
        assert_eq!(
            region_from_arn("arn:aws:verifiedpermissions:us-east-1:123456789012:policy-store/ps-1"),
            Some("us-east-1")
        );
        assert_eq!(
            region_from_arn("arn:aws-cn:ses:cn-north-1:123456789012:identity/a@b.cn"),
            Some("cn-north-1")
        );
        assert_eq!(region_from_arn("arn:aws:iam::123456789012:role/x"), None);
        assert_eq!(region_from_arn("not-an-arn"), None);
        assert_eq!(region_from_arn("arn:aws:s3"), None);
    }
}
