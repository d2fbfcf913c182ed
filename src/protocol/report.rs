use crate::error::FrameError;

use super::METRICS_TAG;
use super::body::{Child, TestBody};
use super::fields::{CLASS, TIME, required, timestamp};

const FINISHED: &str = "finished";
const METRIC: &str = "Metric";
const NAME: &str = "name";

/// One metrics sample broadcast by an agent while a test runs.
#[derive(Debug, Clone, PartialEq)]
pub struct MetricsReport {
    pub time: String,
    /// Set on the final sample of a run.
    pub finished: bool,
    pub class: String,
    pub metrics: Vec<(String, f64)>,
}

impl MetricsReport {
    #[must_use]
    pub fn new(class: &str, finished: bool, metrics: Vec<(String, f64)>) -> Self {
        Self {
            time: timestamp(),
            finished,
            class: class.to_owned(),
            metrics,
        }
    }

    #[must_use]
    pub fn metric(&self, name: &str) -> Option<f64> {
        self.metrics
            .iter()
            .find(|(key, _)| key == name)
            .map(|(_, value)| *value)
    }

    #[must_use]
    pub fn to_payload(&self) -> String {
        let mut body = TestBody::new()
            .with_attribute(TIME, &self.time)
            .with_attribute(FINISHED, if self.finished { "True" } else { "False" })
            .with_child(CLASS, &self.class);
        for (name, value) in &self.metrics {
            body.push_child(Child {
                name: METRIC.to_owned(),
                attributes: vec![(NAME.to_owned(), name.clone())],
                text: value.to_string(),
            });
        }
        format!("{}{}", METRICS_TAG, body.render())
    }

    /// Parses the body that follows the `M` tag.
    ///
    /// # Errors
    ///
    /// Returns an error when the body is malformed, has no class, or a
    /// metric is unnamed or not a number.
    pub fn parse(body: &str) -> Result<Self, FrameError> {
        let body = TestBody::parse(body)?;
        let finished = match body.attribute(FINISHED).map(str::trim) {
            None => false,
            Some(flag) if flag.eq_ignore_ascii_case("true") => true,
            Some(flag) if flag.eq_ignore_ascii_case("false") => false,
            Some(flag) => {
                return Err(FrameError::InvalidField {
                    field: FINISHED,
                    value: flag.to_owned(),
                });
            }
        };
        let mut metrics = Vec::new();
        for child in body.children_named(METRIC) {
            let name = child
                .attribute(NAME)
                .ok_or(FrameError::MissingAttribute { name: NAME })?;
            let value = child
                .text
                .trim()
                .parse::<f64>()
                .map_err(|_err| FrameError::InvalidField {
                    field: METRIC,
                    value: child.text.clone(),
                })?;
            metrics.push((name.to_owned(), value));
        }
        Ok(Self {
            time: body.attribute(TIME).unwrap_or_default().to_owned(),
            finished,
            class: required(&body, CLASS)?.to_owned(),
            metrics,
        })
    }
}
