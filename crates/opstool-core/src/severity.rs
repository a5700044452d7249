use serde::{Deserialize, Serialize};

/// Alert severity on an ordered escalation scale.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Severity {
    Info,
    Warning,
    Critical,
}

impl Severity {
    pub fn as_str(&self) -> &'static str {
        match self {
            Severity::Info => "info",
            Severity::Warning => "warning",
            Severity::Critical => "critical",
        }
    }

    /// Parse the wire name. Unrecognized values are `None`.
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "info" => Some(Severity::Info),
            "warning" => Some(Severity::Warning),
            "critical" => Some(Severity::Critical),
            _ => None,
        }
    }

    /// Whether this severity calls for the escalation procedure
    pub fn escalates(&self) -> bool {
        matches!(self, Severity::Critical)
    }

    /// Webhook message prefix
    pub fn notification_prefix(&self) -> &'static str {
        match self {
            Severity::Critical => "CRITICAL ALERT",
            Severity::Warning => "WARNING",
            Severity::Info => "INFO",
        }
    }

    /// Attachment color used by chat webhooks
    pub fn color(&self) -> &'static str {
        match self {
            Severity::Critical => "danger",
            Severity::Warning => "warning",
            Severity::Info => "good",
        }
    }
}

impl Default for Severity {
    fn default() -> Self {
        Severity::Info
    }
}

impl std::fmt::Display for Severity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_severity_ordering() {
        assert!(Severity::Critical > Severity::Warning);
        assert!(Severity::Warning > Severity::Info);
        assert_eq!(Severity::default(), Severity::Info);
    }

    #[test]
    fn test_severity_parse() {
        assert_eq!(Severity::parse("critical"), Some(Severity::Critical));
        assert_eq!(Severity::parse("warning"), Some(Severity::Warning));
        assert_eq!(Severity::parse("info"), Some(Severity::Info));
        assert_eq!(Severity::parse("CRITICAL"), None);
        assert_eq!(Severity::parse("page-me"), None);

        assert!(Severity::Critical.escalates());
        assert!(!Severity::Warning.escalates());
    }
}
