use crate::error::CollectorError;
use regex::Regex;

const EXPORT_PATTERN: &str = r"translation\.export\.CSV\.zip$";
const MENTIONS_PATTERN: &str = r"translation\.mentions\.CSV\.zip$";

/// Maps archive file names to their destination topic by filename pattern.
/// Also acts as the coordinator's supported-archive-type filter.
#[derive(Debug)]
pub struct TopicResolver {
    rules: Vec<(Regex, String)>,
}

impl TopicResolver {
    pub fn new(event_topic: &str, mention_topic: &str) -> Self {
        let rules = vec![
            (
                Regex::new(EXPORT_PATTERN).expect("export pattern is valid"),
                event_topic.to_string(),
            ),
            (
                Regex::new(MENTIONS_PATTERN).expect("mentions pattern is valid"),
                mention_topic.to_string(),
            ),
        ];
        Self { rules }
    }

    pub fn resolve(&self, archive_file_name: &str) -> Result<&str, CollectorError> {
        self.rules
            .iter()
            .find(|(pattern, _)| pattern.is_match(archive_file_name))
            .map(|(_, topic)| topic.as_str())
            .ok_or_else(|| CollectorError::Classification {
                archive: archive_file_name.to_string(),
            })
    }

    pub fn is_supported(&self, url: &str) -> bool {
        self.rules.iter().any(|(pattern, _)| pattern.is_match(url))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn resolver() -> TopicResolver {
        TopicResolver::new("gdelt.events", "gdelt.mentions")
    }

    #[test]
    fn test_resolves_export_archives_to_event_topic() {
        let resolver = resolver();
        let topic = resolver
            .resolve("20250323151500.translation.export.CSV.zip")
            .expect("export archives must resolve");
        assert_eq!(topic, "gdelt.events");
    }

    #[test]
    fn test_resolves_mentions_archives_to_mention_topic() {
        let resolver = resolver();
        let topic = resolver
            .resolve("20250323151500.translation.mentions.CSV.zip")
            .expect("mentions archives must resolve");
        assert_eq!(topic, "gdelt.mentions");
    }

    #[test]
    fn test_unknown_archives_fail_classification() {
        let resolver = resolver();
        let result = resolver.resolve("20250323151500.unsupported.zip");
        assert!(matches!(
            result,
            Err(CollectorError::Classification { .. })
        ));
    }

    #[test]
    fn test_supported_filter_matches_full_urls() {
        let resolver = resolver();
        assert!(resolver.is_supported(
            "http://data.gdeltproject.org/gdeltv2/20250323151500.translation.export.CSV.zip"
        ));
        assert!(resolver.is_supported(
            "http://data.gdeltproject.org/gdeltv2/20250323151500.translation.mentions.CSV.zip"
        ));
        assert!(
            !resolver
                .is_supported("http://data.gdeltproject.org/gdeltv2/20250323151500.unsupported.zip")
        );
    }
}
