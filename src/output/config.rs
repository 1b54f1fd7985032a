use std::env;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum OutputFormat {
    Json,
    Text,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct OutputConfig {
    pub format: OutputFormat,
    pub pretty: bool,
}

impl OutputConfig {
    pub fn from_env() -> Self {
        Self::from_values(
            env::var("PODCAST_OUTPUT_FORMAT").ok().as_deref(),
            env::var("PODCAST_OUTPUT_PRETTY").ok().as_deref(),
        )
    }

    fn from_values(format: Option<&str>, pretty: Option<&str>) -> Self {
        let format = match format {
            Some("text") => OutputFormat::Text,
            _ => OutputFormat::Json,
        };
        let pretty = match pretty {
            Some(v) if v.eq_ignore_ascii_case("1") || v.eq_ignore_ascii_case("true") || v.eq_ignore_ascii_case("yes") => true,
            _ => false,
        };
        OutputConfig { format, pretty }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_to_compact_json() {
        assert_eq!(OutputConfig::from_values(None, None), OutputConfig { format: OutputFormat::Json, pretty: false });
        assert_eq!(OutputConfig::from_values(Some("text"), Some("YES")), OutputConfig { format: OutputFormat::Text, pretty: true });
    }
}
