//! Topics pointés (`check.results.host.db01`) <-> topics MQTT (`monitoring/check/results/host/db01`).
//! L'exchange sert de racine de namespace côté MQTT.

/// Vrai si `topic` correspond au `pattern` (`#` = suffixe quelconque, `*` = un segment)
pub fn topic_matches(pattern: &str, topic: &str) -> bool {
    let mut pattern_parts = pattern.split('.');
    let mut topic_parts = topic.split('.');
    loop {
        match (pattern_parts.next(), topic_parts.next()) {
            (Some("#"), _) => return true,
            (Some("*"), Some(_)) => {}
            (Some(p), Some(t)) if p == t => {}
            (None, None) => return true,
            _ => return false,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TopicMapper {
    exchange: String,
}

impl TopicMapper {
    pub fn new<S: Into<String>>(exchange: S) -> Self {
        Self {
            exchange: exchange.into().trim_matches('/').to_string(),
        }
    }

    pub fn exchange(&self) -> &str {
        &self.exchange
    }

    /// Topic de publication MQTT
    pub fn to_mqtt_topic(&self, topic: &str) -> String {
        self.rooted(topic.split('.').collect::<Vec<_>>().join("/"))
    }

    /// Filtre de souscription MQTT (`#` conservé, `*` -> `+`)
    pub fn to_mqtt_filter(&self, pattern: &str) -> String {
        let levels: Vec<&str> = pattern
            .split('.')
            .map(|segment| if segment == "*" { "+" } else { segment })
            .collect();
        self.rooted(levels.join("/"))
    }

    /// Topic MQTT reçu -> topic pointé. `None` si hors de l'exchange.
    pub fn from_mqtt_topic(&self, mqtt_topic: &str) -> Option<String> {
        let relative = if self.exchange.is_empty() {
            mqtt_topic
        } else {
            mqtt_topic
                .strip_prefix(self.exchange.as_str())?
                .strip_prefix('/')?
        };
        if relative.is_empty() {
            return None;
        }
        Some(relative.split('/').collect::<Vec<_>>().join("."))
    }

    fn rooted(&self, path: String) -> String {
        if self.exchange.is_empty() {
            path
        } else {
            format!("{}/{}", self.exchange, path)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_topic_matches() {
        assert!(topic_matches("check.results.#", "check.results.host.db01"));
        assert!(topic_matches("check.results.#", "check.results.service.web01.example.com"));
        assert!(topic_matches("check.results.#", "check.results"));
        assert!(topic_matches("check.*.host.db01", "check.results.host.db01"));
        assert!(topic_matches("check.results.command", "check.results.command"));
        assert!(!topic_matches("check.results.#", "check.other.host.db01"));
        assert!(!topic_matches("check.results.host", "check.results.host.db01"));
        assert!(!topic_matches("check.*", "check.results.host"));
    }

    #[test]
    fn test_mapping_round_trip() {
        let mapper = TopicMapper::new("monitoring");
        let mqtt = mapper.to_mqtt_topic("check.results.host.web01.example.com");
        assert_eq!(mqtt, "monitoring/check/results/host/web01/example/com");
        assert_eq!(
            mapper.from_mqtt_topic(&mqtt).as_deref(),
            Some("check.results.host.web01.example.com")
        );
        assert_eq!(mapper.from_mqtt_topic("other/check/results"), None);
        assert_eq!(mapper.from_mqtt_topic("monitoringx/check"), None);
    }

    #[test]
    fn test_filters() {
        let mapper = TopicMapper::new("/monitoring/");
        assert_eq!(mapper.exchange(), "monitoring");
        assert_eq!(mapper.to_mqtt_filter("check.results.#"), "monitoring/check/results/#");
        assert_eq!(mapper.to_mqtt_filter("check.*.command"), "monitoring/check/+/command");

        let bare = TopicMapper::new("");
        assert_eq!(bare.to_mqtt_topic("check.results.command"), "check/results/command");
        assert_eq!(bare.from_mqtt_topic("check/results/command").as_deref(), Some("check.results.command"));
    }
}
