//! Event value type and its `<event>` fragment encoding.

use std::time::{SystemTime, UNIX_EPOCH};

use super::xml::XmlBuilder;
use crate::error::{ModularInputError, Result};

/// One record streamed to the host.
///
/// Only `data` is required. `unbroken` marks an event whose data is split
/// over several writes; the last piece sets `done`.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Event {
    /// Payload; must not be empty.
    pub data: String,
    /// Stanza the event belongs to.
    pub stanza: Option<String>,
    /// Epoch seconds, fractional allowed.
    pub time: Option<f64>,
    /// Host field.
    pub host: Option<String>,
    /// Destination index.
    pub index: Option<String>,
    /// Source field.
    pub source: Option<String>,
    /// Sourcetype field.
    pub sourcetype: Option<String>,
    /// Closes an unbroken event.
    pub done: bool,
    /// Part of a multi-write event.
    pub unbroken: bool,
}

impl Event {
    /// Create an event with the given payload.
    pub fn new(data: impl Into<String>) -> Self {
        Self {
            data: data.into(),
            ..Self::default()
        }
    }

    /// Set the stanza.
    pub fn stanza(mut self, stanza: impl Into<String>) -> Self {
        self.stanza = Some(stanza.into());
        self
    }

    /// Set the timestamp in epoch seconds.
    pub fn time(mut self, epoch_seconds: f64) -> Self {
        self.time = Some(epoch_seconds);
        self
    }

    /// Set the timestamp from a system time; times before the epoch are ignored.
    pub fn system_time(mut self, time: SystemTime) -> Self {
        self.time = time
            .duration_since(UNIX_EPOCH)
            .ok()
            .map(|d| d.as_secs_f64());
        self
    }

    /// Set the host.
    pub fn host(mut self, host: impl Into<String>) -> Self {
        self.host = Some(host.into());
        self
    }

    /// Set the index.
    pub fn index(mut self, index: impl Into<String>) -> Self {
        self.index = Some(index.into());
        self
    }

    /// Set the source.
    pub fn source(mut self, source: impl Into<String>) -> Self {
        self.source = Some(source.into());
        self
    }

    /// Set the sourcetype.
    pub fn sourcetype(mut self, sourcetype: impl Into<String>) -> Self {
        self.sourcetype = Some(sourcetype.into());
        self
    }

    /// Mark the end of an unbroken event.
    pub fn done(mut self, done: bool) -> Self {
        self.done = done;
        self
    }

    /// Mark the event as unbroken.
    pub fn unbroken(mut self, unbroken: bool) -> Self {
        self.unbroken = unbroken;
        self
    }

    /// Encode as an `<event>` fragment.
    pub fn to_xml(&self) -> Result<String> {
        if self.data.is_empty() {
            return Err(ModularInputError::InvalidEvent(
                "event data must not be empty".to_string(),
            ));
        }
        if let Some(time) = self.time.filter(|t| !t.is_finite()) {
            return Err(ModularInputError::InvalidEvent(format!(
                "event time must be finite epoch seconds, got {}",
                time
            )));
        }

        let mut attrs: Vec<(&str, &str)> = Vec::with_capacity(2);
        if let Some(stanza) = &self.stanza {
            attrs.push(("stanza", stanza.as_str()));
        }
        if self.unbroken {
            attrs.push(("unbroken", "1"));
        }

        let time = self.time.map(format_time);
        let mut xml = XmlBuilder::new();
        xml.open("event", &attrs)
            .optional_element("time", time.as_deref())
            .optional_element("host", self.host.as_deref())
            .optional_element("index", self.index.as_deref())
            .optional_element("source", self.source.as_deref())
            .optional_element("sourcetype", self.sourcetype.as_deref())
            .element("data", &self.data);
        if self.done {
            xml.empty("done");
        }
        xml.close("event");
        Ok(xml.into_string())
    }
}

/// Epoch seconds with millisecond precision.
fn format_time(epoch_seconds: f64) -> String {
    format!("{:.3}", epoch_seconds)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[test]
    fn test_minimal_event() {
        let xml = Event::new("x").to_xml().unwrap();
        assert_eq!(xml, "<event><data>x</data></event>");
    }

    #[test]
    fn test_full_event() {
        let event = Event::new("This is a test of the emergency broadcast system.")
            .stanza("fubar")
            .time(1372275124.466)
            .host("localhost")
            .index("main")
            .source("hilda")
            .sourcetype("misc")
            .done(true)
            .unbroken(true);

        assert_eq!(
            event.to_xml().unwrap(),
            "<event stanza=\"fubar\" unbroken=\"1\">\
             <time>1372275124.466</time>\
             <host>localhost</host>\
             <index>main</index>\
             <source>hilda</source>\
             <sourcetype>misc</sourcetype>\
             <data>This is a test of the emergency broadcast system.</data>\
             <done/></event>"
        );
    }

    #[test]
    fn test_time_fixed_precision() {
        assert_eq!(format_time(1.0), "1.000");
        assert_eq!(format_time(1372275124.4669), "1372275124.467");
    }

    #[test]
    fn test_system_time() {
        let event = Event::new("x").system_time(UNIX_EPOCH + Duration::from_millis(1500));
        assert_eq!(event.time, Some(1.5));
    }

    #[test]
    fn test_data_escaped() {
        let xml = Event::new("\u{C3BC} and <&> f\u{00FC}r").to_xml().unwrap();
        assert_eq!(
            xml,
            "<event><data>\u{C3BC} and &lt;&amp;&gt; f\u{00FC}r</data></event>"
        );
    }

    #[test]
    fn test_empty_data_rejected() {
        assert!(matches!(
            Event::new("").stanza("s").to_xml(),
            Err(ModularInputError::InvalidEvent(_))
        ));
    }

    #[test]
    fn test_non_finite_time_rejected() {
        for time in [f64::NAN, f64::INFINITY, f64::NEG_INFINITY] {
            assert!(matches!(
                Event::new("a").time(time).to_xml(),
                Err(ModularInputError::InvalidEvent(_))
            ));
        }
        assert!(Event::new("a").time(0.0).to_xml().is_ok());
    }
}
