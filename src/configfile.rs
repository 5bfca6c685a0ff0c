// src/configfile.rs
// Printer configuration file reader.

use std::collections::HashMap;
use std::path::Path;

#[derive(Debug, Clone, PartialEq)]
pub enum ConfigError {
    Io(String),
    Syntax(usize, String),           // line number, message
    SectionNotFound(String),
    OptionNotFound(String, String),
    ParseError(String, String, String), // option, value, type_expected
    ValidationError(String),
}

impl std::fmt::Display for ConfigError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ConfigError::Io(msg) => write!(f, "Unable to read config file: {}", msg),
            ConfigError::Syntax(line, msg) => write!(f, "Config syntax error on line {}: {}", line, msg),
            ConfigError::SectionNotFound(s) => write!(f, "Section not found: [{}]", s),
            ConfigError::OptionNotFound(s, o) => write!(f, "Option '{}' not found in section '[{}]'", o, s),
            ConfigError::ParseError(o, v, t) => write!(f, "Failed to parse option '{}' value '{}' as {}", o, v, t),
            ConfigError::ValidationError(msg) => write!(f, "Validation error: {}", msg),
        }
    }
}

impl std::error::Error for ConfigError {}

#[derive(Debug, Default, Clone)]
pub struct Configfile {
    // section_name -> { option_name -> raw value }, names stored lowercase.
    data: HashMap<String, HashMap<String, String>>,
    // Section names in file order, so prefix lookups are deterministic.
    order: Vec<String>,
    filename: Option<String>,
}

impl Configfile {
    pub fn new(filename: Option<String>) -> Self {
        Configfile {
            data: HashMap::new(),
            order: Vec::new(),
            filename,
        }
    }

    pub fn read(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path)
            .map_err(|e| ConfigError::Io(format!("{}: {}", path.display(), e)))?;
        let mut cf = Configfile::new(Some(path.display().to_string()));
        cf.parse(&content)?;
        Ok(cf)
    }

    pub fn filename(&self) -> Option<&str> {
        self.filename.as_deref()
    }

    /// Parses an INI-style configuration string, replacing any previous content.
    pub fn parse(&mut self, config_content: &str) -> Result<(), ConfigError> {
        self.data.clear();
        self.order.clear();
        let mut current_section: Option<String> = None;

        for (idx, line_raw) in config_content.lines().enumerate() {
            let lineno = idx + 1;
            let line = match line_raw.find(|c: char| c == '#' || c == ';') {
                Some(index) => &line_raw[..index],
                None => line_raw,
            }
            .trim();
            if line.is_empty() {
                continue;
            }

            if line.starts_with('[') && line.ends_with(']') {
                let name = line[1..line.len() - 1]
                    .split_whitespace()
                    .collect::<Vec<_>>()
                    .join(" ")
                    .to_lowercase();
                if name.is_empty() {
                    return Err(ConfigError::Syntax(lineno, "empty section name".to_string()));
                }
                if !self.data.contains_key(&name) {
                    self.order.push(name.clone());
                    self.data.insert(name.clone(), HashMap::new());
                }
                current_section = Some(name);
                continue;
            }

            let section = current_section.as_ref().ok_or_else(|| {
                ConfigError::Syntax(lineno, format!("line outside of section: {}", line_raw))
            })?;
            let (key, value) = line
                .split_once(|c: char| c == '=' || c == ':')
                .ok_or_else(|| {
                    ConfigError::Syntax(lineno, format!("malformed line in section [{}]: {}", section, line_raw))
                })?;
            let key = key.trim().to_lowercase();
            if key.is_empty() {
                return Err(ConfigError::Syntax(lineno, format!("empty key in section [{}]", section)));
            }
            self.data
                .entry(section.clone())
                .or_default()
                .insert(key, value.trim().to_string());
        }
        Ok(())
    }

    pub fn has_section(&self, section: &str) -> bool {
        self.data.contains_key(&section.to_lowercase())
    }

    /// Sections named either `prefix` or `prefix <name>`, in file order.
    pub fn get_prefix_sections(&self, prefix: &str) -> Vec<String> {
        let prefix = prefix.to_lowercase();
        self.order
            .iter()
            .filter(|s| {
                s.as_str() == prefix
                    || s.strip_prefix(prefix.as_str()).map_or(false, |rest| rest.starts_with(' '))
            })
            .cloned()
            .collect()
    }

    fn get_str(&self, section: &str, option: &str) -> Result<&String, ConfigError> {
        self.data
            .get(&section.to_lowercase())
            .ok_or_else(|| ConfigError::SectionNotFound(section.to_string()))?
            .get(&option.to_lowercase())
            .ok_or_else(|| ConfigError::OptionNotFound(section.to_string(), option.to_string()))
    }

    // Raw lookup with the default applied only when the option itself is missing.
    fn lookup<T>(
        &self,
        section: &str,
        option: &str,
        default: Option<T>,
        convert: impl FnOnce(&str) -> Result<T, ConfigError>,
    ) -> Result<T, ConfigError> {
        match self.get_str(section, option) {
            Ok(raw) => convert(raw),
            Err(ConfigError::OptionNotFound(s, o)) => default.ok_or(ConfigError::OptionNotFound(s, o)),
            Err(e) => Err(e),
        }
    }

    pub fn get(&self, section: &str, option: &str, default: Option<&str>) -> Result<String, ConfigError> {
        self.lookup(section, option, default.map(str::to_string), |raw| Ok(raw.to_string()))
    }

    pub fn getfloat(
        &self,
        section: &str,
        option: &str,
        default: Option<f64>,
        minval: Option<f64>,
        maxval: Option<f64>,
    ) -> Result<f64, ConfigError> {
        let value = self.lookup(section, option, default, |raw| parse_float(option, raw))?;
        check_bounds(section, option, value, minval, maxval)?;
        Ok(value)
    }

    pub fn getboolean(&self, section: &str, option: &str, default: Option<bool>) -> Result<bool, ConfigError> {
        self.lookup(section, option, default, |raw| match raw.to_lowercase().as_str() {
            "true" | "yes" | "on" | "1" => Ok(true),
            "false" | "no" | "off" | "0" => Ok(false),
            _ => Err(ConfigError::ParseError(option.to_string(), raw.to_string(), "boolean".to_string())),
        })
    }

    /// Comma separated list of floats. When `count` is given the list must
    /// have exactly that many entries.
    pub fn getfloatlist(&self, section: &str, option: &str, count: Option<usize>) -> Result<Vec<f64>, ConfigError> {
        let raw = self.get_str(section, option)?;
        let values = raw
            .split(',')
            .map(|field| parse_float(option, field.trim()))
            .collect::<Result<Vec<f64>, ConfigError>>()?;
        if let Some(expected) = count {
            if values.len() != expected {
                return Err(ConfigError::ValidationError(format!(
                    "Option '{}' in section '[{}]' must have {} elements (got {})",
                    option,
                    section,
                    expected,
                    values.len()
                )));
            }
        }
        Ok(values)
    }

    #[cfg(test)]
    pub fn set(&mut self, section: &str, option: &str, value: &str) {
        let section = section.to_lowercase();
        if !self.data.contains_key(&section) {
            self.order.push(section.clone());
        }
        self.data.entry(section).or_default().insert(option.to_lowercase(), value.to_string());
    }
}

fn parse_float(option: &str, raw: &str) -> Result<f64, ConfigError> {
    match raw.parse::<f64>() {
        Ok(v) if v.is_finite() => Ok(v),
        _ => Err(ConfigError::ParseError(option.to_string(), raw.to_string(), "float".to_string())),
    }
}

fn check_bounds<T: PartialOrd + std::fmt::Display>(
    section: &str,
    option: &str,
    value: T,
    minval: Option<T>,
    maxval: Option<T>,
) -> Result<(), ConfigError> {
    if let Some(min) = minval {
        if value < min {
            return Err(ConfigError::ValidationError(format!(
                "Option '{}' in section '[{}]' ({}) must be >= {}",
                option, section, value, min
            )));
        }
    }
    if let Some(max) = maxval {
        if value > max {
            return Err(ConfigError::ValidationError(format!(
                "Option '{}' in section '[{}]' ({}) must be <= {}",
                option, section, value, max
            )));
        }
    }
    Ok(())
}
