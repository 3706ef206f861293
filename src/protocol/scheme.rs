//! Scheme and argument model.
//!
//! A [`Scheme`] is what a modular input prints in `--scheme` mode: its
//! title, flags and the arguments each configured stanza accepts.
//!
//! # Example
//!
//! ```
//! use modinput::protocol::{Argument, DataType, Scheme, StreamingMode};
//!
//! let mut scheme = Scheme::new("random numbers");
//! scheme.streaming_mode = StreamingMode::Simple;
//! scheme
//!     .add_argument(
//!         Argument::new("min")
//!             .data_type(DataType::Number)
//!             .required_on_create(true),
//!     )
//!     .unwrap();
//!
//! let xml = scheme.to_xml().unwrap();
//! assert!(xml.starts_with("<scheme><title>random numbers</title>"));
//! ```

use std::fmt;
use std::str::FromStr;

use super::xml::{parse_document, Element, XmlBuilder};
use crate::error::{ModularInputError, Result};

/// How the host should read events from the stream.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum StreamingMode {
    /// Plain text lines.
    Simple,
    /// `<stream>` of `<event>` elements.
    #[default]
    Xml,
}

impl StreamingMode {
    /// Wire spelling.
    pub fn as_str(self) -> &'static str {
        match self {
            StreamingMode::Simple => "simple",
            StreamingMode::Xml => "xml",
        }
    }
}

impl FromStr for StreamingMode {
    type Err = ModularInputError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim() {
            "simple" => Ok(StreamingMode::Simple),
            "xml" => Ok(StreamingMode::Xml),
            other => Err(ModularInputError::ConfigParse(format!(
                "unknown streaming mode `{}`",
                other
            ))),
        }
    }
}

impl fmt::Display for StreamingMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Value type of an argument.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum DataType {
    /// `true`/`false` style values.
    Boolean,
    /// Numeric values.
    Number,
    /// Free text.
    #[default]
    String,
}

impl DataType {
    /// Wire spelling.
    pub fn as_str(self) -> &'static str {
        match self {
            DataType::Boolean => "boolean",
            DataType::Number => "number",
            DataType::String => "string",
        }
    }
}

impl FromStr for DataType {
    type Err = ModularInputError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim() {
            "boolean" => Ok(DataType::Boolean),
            "number" => Ok(DataType::Number),
            "string" => Ok(DataType::String),
            other => Err(ModularInputError::ConfigParse(format!(
                "unknown data type `{}`",
                other
            ))),
        }
    }
}

impl fmt::Display for DataType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One configurable field of a stanza.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Argument {
    /// Field name, unique within a scheme.
    pub name: String,
    /// Human readable label.
    pub title: Option<String>,
    /// Operator-facing description.
    pub description: Option<String>,
    /// Value type.
    pub data_type: DataType,
    /// Must be supplied when a stanza is created.
    pub required_on_create: bool,
    /// Must be supplied when a stanza is edited.
    pub required_on_edit: bool,
    /// Host-side validation expression, passed through untouched.
    pub validation: Option<String>,
}

impl Argument {
    /// Create an argument with default settings.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            title: None,
            description: None,
            data_type: DataType::default(),
            required_on_create: false,
            required_on_edit: false,
            validation: None,
        }
    }

    /// Set the label.
    pub fn title(mut self, title: impl Into<String>) -> Self {
        self.title = Some(title.into());
        self
    }

    /// Set the description.
    pub fn description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    /// Set the value type.
    pub fn data_type(mut self, data_type: DataType) -> Self {
        self.data_type = data_type;
        self
    }

    /// Require the field on create.
    pub fn required_on_create(mut self, required: bool) -> Self {
        self.required_on_create = required;
        self
    }

    /// Require the field on edit.
    pub fn required_on_edit(mut self, required: bool) -> Self {
        self.required_on_edit = required;
        self
    }

    /// Set the validation expression.
    pub fn validation(mut self, validation: impl Into<String>) -> Self {
        self.validation = Some(validation.into());
        self
    }

    fn write_to(&self, xml: &mut XmlBuilder) {
        xml.open("arg", &[("name", self.name.as_str())])
            .optional_element("title", self.title.as_deref())
            .optional_element("description", self.description.as_deref())
            .optional_element("validation", self.validation.as_deref())
            .element("data_type", self.data_type.as_str())
            .element("required_on_edit", bool_word(self.required_on_edit))
            .element("required_on_create", bool_word(self.required_on_create))
            .close("arg");
    }

    fn from_element(element: &Element) -> Result<Self> {
        let mut arg = Argument::new(element.require_attr("name")?);
        arg.title = element.child_text("title").map(str::to_owned);
        arg.description = element.child_text("description").map(str::to_owned);
        arg.validation = element.child_text("validation").map(str::to_owned);
        if let Some(data_type) = element.child_text("data_type") {
            arg.data_type = data_type.parse()?;
        }
        if let Some(flag) = element.child_text("required_on_edit") {
            arg.required_on_edit = parse_bool(flag)?;
        }
        if let Some(flag) = element.child_text("required_on_create") {
            arg.required_on_create = parse_bool(flag)?;
        }
        Ok(arg)
    }
}

/// The self-description of a modular input.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Scheme {
    /// Title shown to operators; must not be empty.
    pub title: String,
    /// Operator-facing description.
    pub description: Option<String>,
    /// How events are streamed.
    pub streaming_mode: StreamingMode,
    /// Ask the host to run `--validate-arguments` before saving a stanza.
    pub use_external_validation: bool,
    /// Launch one process for all stanzas instead of one per stanza.
    pub use_single_instance: bool,
    arguments: Vec<Argument>,
}

impl Scheme {
    /// Create a scheme with default flags and no arguments.
    pub fn new(title: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            description: None,
            streaming_mode: StreamingMode::default(),
            use_external_validation: false,
            use_single_instance: false,
            arguments: Vec::new(),
        }
    }

    /// Append an argument; names must be unique.
    pub fn add_argument(&mut self, argument: Argument) -> Result<()> {
        if self.arguments.iter().any(|a| a.name == argument.name) {
            return Err(ModularInputError::DuplicateArgument(argument.name));
        }
        self.arguments.push(argument);
        Ok(())
    }

    /// Arguments in insertion order.
    pub fn arguments(&self) -> &[Argument] {
        &self.arguments
    }

    /// Look up an argument by name.
    pub fn argument(&self, name: &str) -> Option<&Argument> {
        self.arguments.iter().find(|a| a.name == name)
    }

    /// Serialize to the `<scheme>` document printed in `--scheme` mode.
    pub fn to_xml(&self) -> Result<String> {
        if self.title.trim().is_empty() {
            return Err(ModularInputError::InvalidScheme(
                "title must not be empty".to_string(),
            ));
        }

        let mut xml = XmlBuilder::new();
        xml.open("scheme", &[])
            .element("title", &self.title)
            .optional_element("description", self.description.as_deref())
            .element(
                "use_external_validation",
                bool_digit(self.use_external_validation),
            )
            .element("use_single_instance", bool_digit(self.use_single_instance))
            .element("streaming_mode", self.streaming_mode.as_str())
            .open("endpoint", &[])
            .open("args", &[]);
        for argument in &self.arguments {
            argument.write_to(&mut xml);
        }
        xml.close("args").close("endpoint").close("scheme");
        Ok(xml.into_string())
    }

    /// Parse a `<scheme>` document.
    pub fn from_xml(input: &str) -> Result<Self> {
        let root = parse_document(input)?;
        if root.name() != "scheme" {
            return Err(ModularInputError::ConfigParse(format!(
                "expected <scheme> root, found <{}>",
                root.name()
            )));
        }

        let title = root
            .child_text("title")
            .filter(|t| !t.trim().is_empty())
            .ok_or_else(|| {
                ModularInputError::ConfigParse("<scheme> has no <title>".to_string())
            })?;
        let mut scheme = Scheme::new(title);
        scheme.description = root.child_text("description").map(str::to_owned);
        if let Some(flag) = root.child_text("use_external_validation") {
            scheme.use_external_validation = parse_bool(flag)?;
        }
        if let Some(flag) = root.child_text("use_single_instance") {
            scheme.use_single_instance = parse_bool(flag)?;
        }
        if let Some(mode) = root.child_text("streaming_mode") {
            scheme.streaming_mode = mode.parse()?;
        }

        let args = root.child("endpoint").and_then(|e| e.child("args"));
        for arg in args.into_iter().flat_map(|a| a.children_named("arg")) {
            scheme
                .add_argument(Argument::from_element(arg)?)
                .map_err(|e| ModularInputError::ConfigParse(e.to_string()))?;
        }
        Ok(scheme)
    }
}

fn bool_digit(value: bool) -> &'static str {
    if value {
        "1"
    } else {
        "0"
    }
}

fn bool_word(value: bool) -> &'static str {
    if value {
        "true"
    } else {
        "false"
    }
}

/// Parse the boolean spellings the host uses in configuration.
pub(crate) fn parse_bool(value: &str) -> Result<bool> {
    match value.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "t" | "yes" | "y" | "on" => Ok(true),
        "0" | "false" | "f" | "no" | "n" | "off" => Ok(false),
        other => Err(ModularInputError::ConfigParse(format!(
            "`{}` is not a boolean",
            other
        ))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const UNICODE: &str = "\u{C3BC} and \u{C3B6} and <&> f\u{00FC}r";

    fn scheme_without_defaults() -> Scheme {
        let mut scheme = Scheme::new("abcd");
        scheme.description = Some(UNICODE.to_string());
        scheme.streaming_mode = StreamingMode::Simple;
        scheme.use_external_validation = false;
        scheme.use_single_instance = true;
        scheme.add_argument(Argument::new("arg1")).unwrap();
        scheme
            .add_argument(
                Argument::new("arg2")
                    .description(UNICODE)
                    .data_type(DataType::Number)
                    .required_on_create(true)
                    .required_on_edit(true)
                    .validation("is_pos_int('some_name')"),
            )
            .unwrap();
        scheme
    }

    #[test]
    fn test_defaults() {
        let scheme = Scheme::new("abcd");
        assert_eq!(scheme.streaming_mode, StreamingMode::Xml);
        assert!(!scheme.use_external_validation);
        assert!(!scheme.use_single_instance);

        let arg = Argument::new("a");
        assert_eq!(arg.data_type, DataType::String);
        assert!(!arg.required_on_create);
        assert!(!arg.required_on_edit);
        assert!(arg.description.is_none());
    }

    #[test]
    fn test_scheme_with_defaults_xml() {
        let mut scheme = Scheme::new("abcd");
        scheme.add_argument(Argument::new("arg1")).unwrap();

        assert_eq!(
            scheme.to_xml().unwrap(),
            "<scheme><title>abcd</title>\
             <use_external_validation>0</use_external_validation>\
             <use_single_instance>0</use_single_instance>\
             <streaming_mode>xml</streaming_mode>\
             <endpoint><args><arg name=\"arg1\">\
             <data_type>string</data_type>\
             <required_on_edit>false</required_on_edit>\
             <required_on_create>false</required_on_create>\
             </arg></args></endpoint></scheme>"
        );
    }

    #[test]
    fn test_scheme_escapes_and_keeps_unicode() {
        let xml = scheme_without_defaults().to_xml().unwrap();
        assert!(xml.contains(
            "<description>\u{C3BC} and \u{C3B6} and &lt;&amp;&gt; f\u{00FC}r</description>"
        ));
        assert!(xml.contains("<validation>is_pos_int('some_name')</validation>"));
        assert!(xml.contains("<use_single_instance>1</use_single_instance>"));
        assert!(xml.contains("<streaming_mode>simple</streaming_mode>"));
    }

    #[test]
    fn test_round_trip() {
        let scheme = scheme_without_defaults();
        let parsed = Scheme::from_xml(&scheme.to_xml().unwrap()).unwrap();
        assert_eq!(parsed, scheme);
        assert_eq!(parsed.arguments()[0].name, "arg1");
        assert_eq!(parsed.arguments()[1].name, "arg2");
    }

    #[test]
    fn test_empty_title_rejected() {
        let scheme = Scheme::new("  ");
        assert!(matches!(
            scheme.to_xml(),
            Err(ModularInputError::InvalidScheme(_))
        ));
    }

    #[test]
    fn test_duplicate_argument_rejected() {
        let mut scheme = Scheme::new("abcd");
        scheme.add_argument(Argument::new("a")).unwrap();
        let err = scheme.add_argument(Argument::new("a")).unwrap_err();
        assert!(matches!(err, ModularInputError::DuplicateArgument(name) if name == "a"));
        assert_eq!(scheme.arguments().len(), 1);
    }

    #[test]
    fn test_from_xml_accepts_word_booleans() {
        let scheme = Scheme::from_xml(
            "<scheme><title>t</title>\
             <use_external_validation>true</use_external_validation>\
             <use_single_instance>false</use_single_instance>\
             </scheme>",
        )
        .unwrap();
        assert!(scheme.use_external_validation);
        assert!(!scheme.use_single_instance);
        assert!(scheme.arguments().is_empty());
    }

    #[test]
    fn test_from_xml_rejects_wrong_root() {
        assert!(Scheme::from_xml("<input/>").is_err());
    }

    #[test]
    fn test_from_xml_rejects_empty_title() {
        for doc in [
            "<scheme><title></title></scheme>",
            "<scheme><title>  </title></scheme>",
            "<scheme/>",
        ] {
            assert!(matches!(
                Scheme::from_xml(doc),
                Err(ModularInputError::ConfigParse(_))
            ));
        }
    }

    #[test]
    fn test_argument_lookup() {
        let scheme = scheme_without_defaults();
        assert_eq!(
            scheme.argument("arg2").map(|a| a.data_type),
            Some(DataType::Number)
        );
        assert!(scheme.argument("missing").is_none());
    }

    #[test]
    fn test_parse_bool_spellings() {
        assert!(parse_bool("1").unwrap());
        assert!(parse_bool(" TRUE ").unwrap());
        assert!(!parse_bool("0").unwrap());
        assert!(!parse_bool("false").unwrap());
        assert!(parse_bool("maybe").is_err());
    }
}
