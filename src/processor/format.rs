//! Output formats

use std::fmt;

use super::ProcessorError;
use crate::layers::OutputSettings;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputFormat {
    Json,
    Yaml,
    Ascii,
    Markdown,
    Html,
    Csv,
    Tsv,
}

impl OutputFormat {
    pub fn from_settings(settings: &OutputSettings) -> Result<Self, ProcessorError> {
        match settings.output.as_str() {
            "json" => Ok(Self::Json),
            "yaml" => Ok(Self::Yaml),
            "table" => match settings.table_format.as_str() {
                "ascii" => Ok(Self::Ascii),
                "markdown" => Ok(Self::Markdown),
                "html" => Ok(Self::Html),
                "csv" => Ok(Self::Csv),
                "tsv" => Ok(Self::Tsv),
                other => Err(ProcessorError::UnknownFormat(format!("table/{}", other))),
            },
            other => Err(ProcessorError::UnknownFormat(other.to_string())),
        }
    }

    /// Pick a format from a download file name suffix
    pub fn from_file_name(file_name: &str) -> Result<Self, ProcessorError> {
        let (_, ext) = file_name
            .rsplit_once('.')
            .ok_or_else(|| ProcessorError::UnknownFormat(file_name.to_string()))?;

        match ext.to_ascii_lowercase().as_str() {
            "csv" => Ok(Self::Csv),
            "tsv" => Ok(Self::Tsv),
            "md" => Ok(Self::Markdown),
            "html" => Ok(Self::Html),
            "json" => Ok(Self::Json),
            "yaml" | "yml" => Ok(Self::Yaml),
            "txt" => Ok(Self::Ascii),
            _ => Err(ProcessorError::UnknownFormat(file_name.to_string())),
        }
    }

    /// The `(output, table-format)` pair selecting this format
    pub fn settings(&self) -> (&'static str, &'static str) {
        match self {
            Self::Json => ("json", ""),
            Self::Yaml => ("yaml", ""),
            Self::Ascii => ("table", "ascii"),
            Self::Markdown => ("table", "markdown"),
            Self::Html => ("table", "html"),
            Self::Csv => ("table", "csv"),
            Self::Tsv => ("table", "tsv"),
        }
    }

    pub fn content_type(&self) -> &'static str {
        match self {
            Self::Json => "application/json",
            Self::Yaml => "application/yaml",
            Self::Ascii => "text/plain; charset=utf-8",
            Self::Markdown => "text/markdown; charset=utf-8",
            Self::Html => "text/html; charset=utf-8",
            Self::Csv => "text/csv; charset=utf-8",
            Self::Tsv => "text/tab-separated-values; charset=utf-8",
        }
    }

    pub fn extension(&self) -> &'static str {
        match self {
            Self::Json => "json",
            Self::Yaml => "yaml",
            Self::Ascii => "txt",
            Self::Markdown => "md",
            Self::Html => "html",
            Self::Csv => "csv",
            Self::Tsv => "tsv",
        }
    }
}

impl fmt::Display for OutputFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.settings() {
            (output, "") => write!(f, "{}", output),
            (output, table_format) => write!(f, "{}/{}", output, table_format),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_file_name() {
        assert_eq!(OutputFormat::from_file_name("x.csv").unwrap(), OutputFormat::Csv);
        assert_eq!(OutputFormat::from_file_name("a.b.TSV").unwrap(), OutputFormat::Tsv);
        assert_eq!(OutputFormat::from_file_name("x.md").unwrap(), OutputFormat::Markdown);
        assert_eq!(OutputFormat::from_file_name("x.html").unwrap(), OutputFormat::Html);
        assert_eq!(OutputFormat::from_file_name("x.json").unwrap(), OutputFormat::Json);
        assert_eq!(OutputFormat::from_file_name("x.yml").unwrap(), OutputFormat::Yaml);
        assert_eq!(OutputFormat::from_file_name("x.txt").unwrap(), OutputFormat::Ascii);
        assert!(OutputFormat::from_file_name("x.xlsx").is_err());
        assert!(OutputFormat::from_file_name("noext").is_err());
    }

    #[test]
    fn test_from_settings() {
        let mut settings = OutputSettings::default();
        assert_eq!(OutputFormat::from_settings(&settings).unwrap(), OutputFormat::Ascii);

        settings.table_format = "csv".into();
        assert_eq!(OutputFormat::from_settings(&settings).unwrap(), OutputFormat::Csv);

        settings.output = "json".into();
        assert_eq!(OutputFormat::from_settings(&settings).unwrap(), OutputFormat::Json);

        settings.output = "excel".into();
        assert!(OutputFormat::from_settings(&settings).is_err());
    }

    #[test]
    fn test_settings_round_trip_through_display() {
        assert_eq!(OutputFormat::Html.to_string(), "table/html");
        assert_eq!(OutputFormat::Json.to_string(), "json");
    }
}
