use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::str::FromStr;

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("cannot read configuration file {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("invalid value '{value}' for '{key}', expected {expected}")]
    InvalidValue { key: String, value: String, expected: &'static str },

    #[error("required parameter '{0}' is not set")]
    MissingKey(String),
}

/// A single value from the parameter file.
#[derive(Clone, Debug, PartialEq)]
pub enum ParamValue {
    Text(String),
    Bool(bool),
    /// Written as `None`, an explicit "not set"
    Unset,
}

impl From<&str> for ParamValue {
    fn from(item: &str) -> Self {
        match item {
            "True" => ParamValue::Bool(true),
            "False" => ParamValue::Bool(false),
            "None" => ParamValue::Unset,
            _ => ParamValue::Text(item.to_string()),
        }
    }
}

/// Flat `key value` parameter file.
///
/// Blank lines and lines starting with `#` are skipped. The first word of a
/// line is the key, the rest of the line (whitespace-joined) is the value.
/// A key given twice keeps its last value.
#[derive(Clone, Debug, Default)]
pub struct ParameterDictionary {
    values: BTreeMap<String, ParamValue>,
}

impl ParameterDictionary {
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let text = fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Ok(Self::parse(&text))
    }

    pub fn parse(text: &str) -> Self {
        let mut values = BTreeMap::new();
        for line in text.lines().map(str::trim) {
            if line.is_empty() || line.starts_with('#') {
                continue;
            }
            let mut words = line.split_whitespace();
            let Some(key) = words.next() else { continue };
            let value = words.collect::<Vec<_>>().join(" ");
            values.insert(key.to_string(), ParamValue::from(value.as_str()));
        }
        ParameterDictionary { values }
    }

    pub fn set(&mut self, key: &str, value: &str) {
        self.values.insert(key.to_string(), ParamValue::from(value));
    }

    pub fn get(&self, key: &str) -> Option<&ParamValue> {
        self.values.get(key)
    }

    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.values.keys().map(String::as_str)
    }

    /// Text value, `None` when the key is absent or explicitly unset.
    pub fn text(&self, key: &str) -> Option<String> {
        match self.values.get(key) {
            Some(ParamValue::Text(value)) => Some(value.clone()),
            Some(ParamValue::Bool(true)) => Some("True".to_string()),
            Some(ParamValue::Bool(false)) => Some("False".to_string()),
            Some(ParamValue::Unset) | None => None,
        }
    }

    pub fn text_or(&self, key: &str, default: &str) -> String {
        self.text(key).unwrap_or_else(|| default.to_string())
    }

    pub fn required_text(&self, key: &str) -> Result<String, ConfigError> {
        self.text(key).ok_or_else(|| ConfigError::MissingKey(key.to_string()))
    }

    pub fn bool_or(&self, key: &str, default: bool) -> Result<bool, ConfigError> {
        match self.values.get(key) {
            Some(ParamValue::Bool(value)) => Ok(*value),
            Some(ParamValue::Text(value)) => match value.to_ascii_lowercase().as_str() {
                "true" | "1" => Ok(true),
                "false" | "0" => Ok(false),
                _ => Err(invalid(key, value, "True or False")),
            },
            Some(ParamValue::Unset) | None => Ok(default),
        }
    }

    pub fn f64_or(&self, key: &str, default: f64) -> Result<f64, ConfigError> {
        self.parsed_or(key, default, "a number")
    }

    pub fn usize_or(&self, key: &str, default: usize) -> Result<usize, ConfigError> {
        self.parsed_or(key, default, "a non-negative integer")
    }

    fn parsed_or<T: FromStr>(
        &self,
        key: &str,
        default: T,
        expected: &'static str,
    ) -> Result<T, ConfigError> {
        match self.values.get(key) {
            Some(ParamValue::Text(value)) => {
                value.parse().map_err(|_| invalid(key, value, expected))
            }
            Some(ParamValue::Bool(value)) => Err(invalid(key, &value.to_string(), expected)),
            Some(ParamValue::Unset) | None => Ok(default),
        }
    }
}

fn invalid(key: &str, value: &str, expected: &'static str) -> ConfigError {
    ConfigError::InvalidValue { key: key.to_string(), value: value.to_string(), expected }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE: &str = "
# instrument setup
instrument_name   SNAP
calibration_file_1  None
min_d 3.5
integrate_predicted_peaks True
use_sphere_integration False
output_directory /data/reduced runs
min_d 4.5
";

    #[test]
    fn test_parse_values() {
        let dict = ParameterDictionary::parse(SAMPLE);

        assert_eq!(dict.get("instrument_name"), Some(&ParamValue::Text("SNAP".to_string())));
        assert_eq!(dict.get("calibration_file_1"), Some(&ParamValue::Unset));
        assert_eq!(dict.get("integrate_predicted_peaks"), Some(&ParamValue::Bool(true)));
        assert_eq!(dict.text("output_directory"), Some("/data/reduced runs".to_string()));
        assert_eq!(dict.keys().count(), 6);
    }

    #[test]
    fn test_last_value_wins() {
        let dict = ParameterDictionary::parse(SAMPLE);

        assert_eq!(dict.f64_or("min_d", 0.0).unwrap(), 4.5);
    }

    #[test]
    fn test_defaults_for_absent_and_unset() {
        let dict = ParameterDictionary::parse(SAMPLE);

        assert_eq!(dict.text("calibration_file_1"), None);
        assert_eq!(dict.text_or("centering", "P"), "P");
        assert_eq!(dict.usize_or("num_peaks_to_find", 500).unwrap(), 500);
        assert!(!dict.bool_or("use_sphere_integration", true).unwrap());
        assert!(dict.bool_or("integrate_if_edge_peak", true).unwrap());
    }

    #[test]
    fn test_invalid_number() {
        let mut dict = ParameterDictionary::default();
        dict.set("max_Q", "thirty");

        let err = dict.f64_or("max_Q", 30.0).unwrap_err();

        assert!(matches!(err, ConfigError::InvalidValue { ref key, .. } if key == "max_Q"));
    }

    #[test]
    fn test_required_text() {
        let dict = ParameterDictionary::parse("output_directory None\n");

        assert!(matches!(
            dict.required_text("output_directory"),
            Err(ConfigError::MissingKey(_))
        ));
    }
}
