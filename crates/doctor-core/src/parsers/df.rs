//! Parser for `df -h` output.

use super::atoms::{parse_percent, parse_size, ParseError, ParseErrorReason};
use serde::{Deserialize, Serialize};

/// Disk usage for a single mount point. Sizes are bytes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DiskUsage {
    pub filesystem: String,
    pub mount: String,
    pub size_bytes: u64,
    pub used_bytes: u64,
    pub available_bytes: u64,
    /// Taken directly from df's Use% column
    pub percent_used: u8,
}

/// Filesystems that live in memory or are read-only images
const PSEUDO_FILESYSTEMS: &[&str] = &[
    "tmpfs", "devtmpfs", "udev", "overlay", "squashfs", "none", "shm", "efivarfs",
];

impl DiskUsage {
    /// Whether this mount is backed by real storage.
    pub fn is_real(&self) -> bool {
        !PSEUDO_FILESYSTEMS.contains(&self.filesystem.as_str())
            && !self.mount.starts_with("/snap/")
            && self.size_bytes > 0
    }
}

/// Parse `df -h` output into a list of DiskUsage entries.
///
/// ```text
/// Filesystem      Size  Used Avail Use% Mounted on
/// /dev/sda1        50G   35G   12G  75% /
/// tmpfs           7.8G  1.2M  7.8G   1% /dev/shm
/// ```
///
/// Rows before the header are ignored. A malformed row fails the whole parse.
pub fn parse_df(step_id: &str, output: &str) -> Result<Vec<DiskUsage>, ParseError> {
    let mut entries = Vec::new();
    let mut header_seen = false;

    for (line_idx, line) in output.lines().enumerate() {
        let line = line.trim();
        if line.is_empty() {
            continue;
        }
        if line.starts_with("Filesystem") {
            header_seen = true;
            continue;
        }
        if !header_seen {
            continue;
        }
        entries.push(parse_df_row(step_id, line, line_idx + 1)?);
    }

    if !header_seen {
        return Err(ParseError::new(
            step_id,
            ParseErrorReason::MissingSection("Filesystem header".to_string()),
            output,
        ));
    }

    Ok(entries)
}

fn parse_df_row(step_id: &str, line: &str, line_num: usize) -> Result<DiskUsage, ParseError> {
    let parts: Vec<&str> = line.split_whitespace().collect();

    // "Mounted on" may contain spaces
    if parts.len() < 6 {
        return Err(ParseError::at(step_id, line_num, line, ParseErrorReason::MalformedRow));
    }

    let size = |idx: usize| {
        parse_size(parts[idx]).map_err(|reason| ParseError::at(step_id, line_num, parts[idx], reason))
    };

    Ok(DiskUsage {
        filesystem: parts[0].to_string(),
        size_bytes: size(1)?,
        used_bytes: size(2)?,
        available_bytes: size(3)?,
        percent_used: parse_percent(parts[4])
            .map_err(|reason| ParseError::at(step_id, line_num, parts[4], reason))?,
        mount: parts[5..].join(" "),
    })
}

/// The real filesystem with the highest Use%.
///
/// Ties keep the first listed mount.
pub fn fullest_mount(disks: &[DiskUsage]) -> Option<&DiskUsage> {
    disks
        .iter()
        .filter(|d| d.is_real())
        .fold(None, |best: Option<&DiskUsage>, d| match best {
            Some(b) if b.percent_used >= d.percent_used => Some(b),
            _ => Some(d),
        })
}

#[cfg(test)]
mod tests {
    use super::*;

    const DF_OUTPUT: &str = "\
Filesystem      Size  Used Avail Use% Mounted on
/dev/nvme0n1p2  460G  420G   17G  97% /
tmpfs           7.8G  7.7G  100M  99% /dev/shm
/dev/nvme0n1p1  511M   61M  451M  12% /boot/efi
/dev/sdb1       1.8T  900G  900G  50% /mnt/My Backups
";

    #[test]
    fn test_parse_df_rows() {
        let disks = parse_df("df", DF_OUTPUT).unwrap();
        assert_eq!(disks.len(), 4);
        assert_eq!(disks[0].mount, "/");
        assert_eq!(disks[0].percent_used, 97);
        assert_eq!(disks[1].filesystem, "tmpfs");
        assert_eq!(disks[3].mount, "/mnt/My Backups");
    }

    #[test]
    fn test_fullest_mount_ignores_pseudo_filesystems() {
        let disks = parse_df("df", DF_OUTPUT).unwrap();
        let fullest = fullest_mount(&disks).unwrap();
        assert_eq!(fullest.mount, "/");
        assert_eq!(fullest.percent_used, 97);
    }

    #[test]
    fn test_header_only_is_empty() {
        let disks = parse_df("df", "Filesystem Size Used Avail Use% Mounted on\n").unwrap();
        assert!(disks.is_empty());
        assert!(fullest_mount(&disks).is_none());
    }

    #[test]
    fn test_missing_header() {
        let err = parse_df("df", "df: command not found\n").unwrap_err();
        assert!(matches!(err.reason, ParseErrorReason::MissingSection(_)));
    }

    #[test]
    fn test_malformed_row() {
        let output = "Filesystem Size Used Avail Use% Mounted on\n/dev/sda1 50G 35G\n";
        let err = parse_df("df", output).unwrap_err();
        assert_eq!(err.reason, ParseErrorReason::MalformedRow);
        assert_eq!(err.line_num, Some(2));
    }
}
