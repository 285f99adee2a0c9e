use itertools::Itertools;
use tracing::debug;

/// One manifest line: the publisher-asserted identity of an archive.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ArchiveDescriptor {
    /// URL tail after the last `/`; the archive's identity key.
    pub file_name: String,
    pub url: String,
    /// Publisher-asserted MD5, lowercased hex.
    pub expected_hash: String,
    pub size_bytes: i64,
}

#[derive(Debug, Default)]
pub struct ParsedManifest {
    pub descriptors: Vec<ArchiveDescriptor>,
    pub malformed_lines: usize,
}

/// Parses the publisher manifest: one archive per line, whitespace-separated
/// `<sizeBytes> <md5Hex> <url>`. Lines with fewer than three tokens or a
/// non-numeric size are counted as malformed and skipped.
pub fn parse_manifest(body: &str) -> ParsedManifest {
    let mut parsed = ParsedManifest::default();

    for line in body.lines() {
        if line.trim().is_empty() {
            continue;
        }
        let Some((size, hash, url)) = line.split_whitespace().next_tuple() else {
            debug!(line, "Skipping malformed manifest line");
            parsed.malformed_lines += 1;
            continue;
        };
        let Ok(size_bytes) = size.parse::<i64>() else {
            debug!(line, "Skipping manifest line with non-numeric size");
            parsed.malformed_lines += 1;
            continue;
        };
        let Some(file_name) = url.split('/').next_back().filter(|name| !name.is_empty())
        else {
            debug!(line, "Skipping manifest line with no file name in URL");
            parsed.malformed_lines += 1;
            continue;
        };

        parsed.descriptors.push(ArchiveDescriptor {
            file_name: file_name.to_string(),
            url: url.to_string(),
            expected_hash: hash.to_ascii_lowercase(),
            size_bytes,
        });
    }

    parsed
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parses_well_formed_lines() {
        let body = "\
47284 111a2b3c http://data.gdeltproject.org/gdeltv2/20250323151500.translation.export.CSV.zip
80433 222d4e5f http://data.gdeltproject.org/gdeltv2/20250323151500.translation.mentions.CSV.zip
";
        let parsed = parse_manifest(body);

        assert_eq!(parsed.malformed_lines, 0);
        assert_eq!(parsed.descriptors.len(), 2);
        assert_eq!(
            parsed.descriptors[0],
            ArchiveDescriptor {
                file_name: "20250323151500.translation.export.CSV.zip".to_string(),
                url: "http://data.gdeltproject.org/gdeltv2/20250323151500.translation.export.CSV.zip"
                    .to_string(),
                expected_hash: "111a2b3c".to_string(),
                size_bytes: 47284,
            }
        );
    }

    #[test]
    fn test_empty_manifest_yields_nothing() {
        let parsed = parse_manifest("");
        assert!(parsed.descriptors.is_empty());
        assert_eq!(parsed.malformed_lines, 0);

        let blank = parse_manifest("\n   \n\n");
        assert!(blank.descriptors.is_empty());
        assert_eq!(blank.malformed_lines, 0);
    }

    #[test]
    fn test_two_token_line_is_malformed() {
        let parsed = parse_manifest("47284 111a2b3c\n");
        assert!(parsed.descriptors.is_empty());
        assert_eq!(parsed.malformed_lines, 1);
    }

    #[test]
    fn test_non_numeric_size_is_malformed() {
        let parsed =
            parse_manifest("big 111a2b3c http://host/x.translation.export.CSV.zip\n");
        assert!(parsed.descriptors.is_empty());
        assert_eq!(parsed.malformed_lines, 1);
    }

    #[test]
    fn test_malformed_lines_do_not_poison_valid_ones() {
        let body = "\
47284 111a2b3c http://host/a.translation.export.CSV.zip
too few
80433 222d4e5f http://host/b.translation.mentions.CSV.zip
";
        let parsed = parse_manifest(body);
        assert_eq!(parsed.descriptors.len(), 2);
        assert_eq!(parsed.malformed_lines, 1);
    }

    #[test]
    fn test_uppercase_hash_is_lowercased() {
        let parsed = parse_manifest("1 ABCDEF0123 http://host/a.translation.export.CSV.zip\n");
        assert_eq!(parsed.descriptors[0].expected_hash, "abcdef0123");
    }

    #[test]
    fn test_extra_tokens_are_tolerated() {
        let parsed =
            parse_manifest("1 aa http://host/a.translation.export.CSV.zip trailing junk\n");
        assert_eq!(parsed.descriptors.len(), 1);
        assert_eq!(parsed.malformed_lines, 0);
    }
}
