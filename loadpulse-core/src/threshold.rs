//! Pass/fail conditions over the aggregated metrics of a run.
//!
//! Thresholds use the same expression syntax as k6 scripts, written as `metric: expression`:
//!
//! ```
//! use loadpulse_core::Threshold;
//!
//! let threshold: Threshold = "http_req_duration: p(95)<400".parse().unwrap();
//! assert!(threshold.check(250.));
//! assert!(!threshold.check(400.));
//! ```
use crate::{METRIC_CHECKS, METRIC_HTTP_REQ_DURATION, METRIC_HTTP_REQ_FAILED};
use serde_with::SerializeDisplay;
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum Metric {
    /// Rate of requests counted as failed.
    HttpReqFailed,
    /// Request latency in milliseconds.
    HttpReqDuration,
    /// Rate of passing checks.
    Checks,
}

impl Metric {
    pub fn name(&self) -> &'static str {
        match self {
            Metric::HttpReqFailed => METRIC_HTTP_REQ_FAILED,
            Metric::HttpReqDuration => METRIC_HTTP_REQ_DURATION,
            Metric::Checks => METRIC_CHECKS,
        }
    }

    fn is_rate(&self) -> bool {
        matches!(self, Metric::HttpReqFailed | Metric::Checks)
    }
}

impl FromStr for Metric {
    type Err = ThresholdParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim() {
            METRIC_HTTP_REQ_FAILED => Ok(Metric::HttpReqFailed),
            METRIC_HTTP_REQ_DURATION => Ok(Metric::HttpReqDuration),
            METRIC_CHECKS => Ok(Metric::Checks),
            other => Err(ThresholdParseError::UnknownMetric(other.to_string())),
        }
    }
}

#[derive(Copy, Clone, Debug, PartialEq)]
pub enum Aggregation {
    Rate,
    Avg,
    Min,
    Med,
    Max,
    /// Percentile in `[0, 100]`
    Percentile(f64),
}

impl FromStr for Aggregation {
    type Err = ThresholdParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        match s {
            "rate" => Ok(Aggregation::Rate),
            "avg" => Ok(Aggregation::Avg),
            "min" => Ok(Aggregation::Min),
            "med" => Ok(Aggregation::Med),
            "max" => Ok(Aggregation::Max),
            _ => {
                let inner = s
                    .strip_prefix("p(")
                    .and_then(|rest| rest.strip_suffix(')'))
                    .ok_or_else(|| ThresholdParseError::UnknownAggregation(s.to_string()))?;

                match inner.trim().parse::<f64>() {
                    Ok(p) if (0. ..=100.).contains(&p) => Ok(Aggregation::Percentile(p)),
                    _ => Err(ThresholdParseError::InvalidPercentile(s.to_string())),
                }
            }
        }
    }
}

impl fmt::Display for Aggregation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Aggregation::Rate => write!(f, "rate"),
            Aggregation::Avg => write!(f, "avg"),
            Aggregation::Min => write!(f, "min"),
            Aggregation::Med => write!(f, "med"),
            Aggregation::Max => write!(f, "max"),
            Aggregation::Percentile(p) => write!(f, "p({p})"),
        }
    }
}

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum Comparison {
    Lt,
    Le,
    Gt,
    Ge,
    Eq,
}

impl Comparison {
    fn symbol(&self) -> &'static str {
        match self {
            Comparison::Lt => "<",
            Comparison::Le => "<=",
            Comparison::Gt => ">",
            Comparison::Ge => ">=",
            Comparison::Eq => "==",
        }
    }

    fn holds(&self, observed: f64, limit: f64) -> bool {
        match self {
            Comparison::Lt => observed < limit,
            Comparison::Le => observed <= limit,
            Comparison::Gt => observed > limit,
            Comparison::Ge => observed >= limit,
            Comparison::Eq => observed == limit,
        }
    }
}

#[derive(Clone, Debug, PartialEq, SerializeDisplay)]
pub struct Threshold {
    pub metric: Metric,
    pub aggregation: Aggregation,
    pub comparison: Comparison,
    pub limit: f64,
}

impl Threshold {
    /// Parse a threshold expression (`p(95)<400`) for the given metric.
    pub fn parse(metric: &str, expression: &str) -> Result<Self, ThresholdParseError> {
        let metric = metric.parse::<Metric>()?;

        let op_start = expression
            .find(['<', '>', '='])
            .ok_or_else(|| ThresholdParseError::MissingOperator(expression.to_string()))?;
        let (lhs, rest) = expression.split_at(op_start);

        let (comparison, rhs) = if let Some(rhs) = rest.strip_prefix("<=") {
            (Comparison::Le, rhs)
        } else if let Some(rhs) = rest.strip_prefix(">=") {
            (Comparison::Ge, rhs)
        } else if let Some(rhs) = rest.strip_prefix("==") {
            (Comparison::Eq, rhs)
        } else if let Some(rhs) = rest.strip_prefix('<') {
            (Comparison::Lt, rhs)
        } else if let Some(rhs) = rest.strip_prefix('>') {
            (Comparison::Gt, rhs)
        } else {
            return Err(ThresholdParseError::MissingOperator(expression.to_string()));
        };

        let limit = rhs
            .trim()
            .parse::<f64>()
            .ok()
            .filter(|v| v.is_finite())
            .ok_or_else(|| ThresholdParseError::InvalidLimit(rhs.trim().to_string()))?;

        let threshold = Self {
            metric,
            aggregation: lhs.parse()?,
            comparison,
            limit,
        };
        threshold.validate()?;
        Ok(threshold)
    }

    /// Rate metrics only support `rate`, and trend metrics never do.
    pub fn validate(&self) -> Result<(), ThresholdParseError> {
        let is_rate = matches!(self.aggregation, Aggregation::Rate);
        if self.metric.is_rate() != is_rate {
            return Err(ThresholdParseError::Mismatch {
                metric: self.metric.name(),
                aggregation: self.aggregation.to_string(),
            });
        }
        Ok(())
    }

    pub fn check(&self, observed: f64) -> bool {
        self.comparison.holds(observed, self.limit)
    }
}

impl FromStr for Threshold {
    type Err = ThresholdParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (metric, expression) = s
            .split_once(':')
            .ok_or_else(|| ThresholdParseError::MissingMetric(s.to_string()))?;
        Self::parse(metric, expression.trim())
    }
}

impl fmt::Display for Threshold {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}: {}{}{}",
            self.metric.name(),
            self.aggregation,
            self.comparison.symbol(),
            self.limit
        )
    }
}

#[derive(Debug, Error, PartialEq)]
pub enum ThresholdParseError {
    #[error("expected `metric: expression`, got `{0}`")]
    MissingMetric(String),

    #[error("unknown metric `{0}`")]
    UnknownMetric(String),

    #[error("no comparison operator in `{0}`")]
    MissingOperator(String),

    #[error("unknown aggregation `{0}`")]
    UnknownAggregation(String),

    #[error("invalid percentile `{0}`")]
    InvalidPercentile(String),

    #[error("invalid threshold limit `{0}`")]
    InvalidLimit(String),

    #[error("`{aggregation}` cannot be used with {metric}")]
    Mismatch {
        metric: &'static str,
        aggregation: String,
    },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_failure_rate() {
        let t: Threshold = "http_req_failed: rate<0.01".parse().unwrap();
        assert_eq!(t.metric, Metric::HttpReqFailed);
        assert_eq!(t.aggregation, Aggregation::Rate);
        assert_eq!(t.comparison, Comparison::Lt);
        assert_eq!(t.limit, 0.01);

        assert!(t.check(0.));
        assert!(t.check(0.0099));
        assert!(!t.check(0.01));
    }

    #[test]
    fn parses_latency_percentile() {
        let t = Threshold::parse("http_req_duration", "p(95)<400").unwrap();
        assert_eq!(t.aggregation, Aggregation::Percentile(95.));
        assert!(t.check(399.9));
        assert!(!t.check(400.));
    }

    #[test]
    fn parses_two_char_operators() {
        let t = Threshold::parse("http_req_duration", "max <= 1000").unwrap();
        assert_eq!(t.comparison, Comparison::Le);
        assert!(t.check(1000.));

        let t = Threshold::parse("checks", "rate>=0.99").unwrap();
        assert_eq!(t.comparison, Comparison::Ge);
        assert!(t.check(0.99));
        assert!(!t.check(0.98));
    }

    #[test]
    fn display_round_trips() {
        let t: Threshold = "http_req_duration: p(99.9)<1500".parse().unwrap();
        assert_eq!(t.to_string(), "http_req_duration: p(99.9)<1500");
        assert_eq!(t.to_string().parse::<Threshold>().unwrap(), t);
    }

    #[test]
    fn serializes_as_expression() {
        let t: Threshold = "http_req_failed: rate<0.01".parse().unwrap();
        let json = serde_json::to_string(&t).unwrap();
        assert_eq!(json, "\"http_req_failed: rate<0.01\"");
    }

    #[test]
    fn rejects_bad_expressions() {
        assert_eq!(
            "rate<0.01".parse::<Threshold>(),
            Err(ThresholdParseError::MissingMetric("rate<0.01".to_string()))
        );
        assert_eq!(
            Threshold::parse("http_reqs", "count<10"),
            Err(ThresholdParseError::UnknownMetric("http_reqs".to_string()))
        );
        assert_eq!(
            Threshold::parse("http_req_duration", "p(95)"),
            Err(ThresholdParseError::MissingOperator("p(95)".to_string()))
        );
        assert_eq!(
            Threshold::parse("http_req_duration", "p(101)<400"),
            Err(ThresholdParseError::InvalidPercentile("p(101)".to_string()))
        );
        assert_eq!(
            Threshold::parse("http_req_duration", "p95<400"),
            Err(ThresholdParseError::UnknownAggregation("p95".to_string()))
        );
        assert_eq!(
            Threshold::parse("http_req_duration", "avg<fast"),
            Err(ThresholdParseError::InvalidLimit("fast".to_string()))
        );
    }

    #[test]
    fn rejects_aggregation_mismatch() {
        assert!(matches!(
            Threshold::parse("http_req_failed", "p(95)<0.01"),
            Err(ThresholdParseError::Mismatch { .. })
        ));
        assert!(matches!(
            Threshold::parse("http_req_duration", "rate<400"),
            Err(ThresholdParseError::Mismatch { .. })
        ));
    }
}
