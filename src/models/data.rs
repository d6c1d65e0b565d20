// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Logical data requests and the pass-through result type.

use crate::error::FetchError;
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use serde_json::value::RawValue;
use std::fmt;
use std::str::FromStr;

/// Kinds of Fitbit data the dashboard can request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DataKind {
    Steps,
    HeartRate,
    Sleep,
}

impl DataKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            DataKind::Steps => "steps",
            DataKind::HeartRate => "heart_rate",
            DataKind::Sleep => "sleep",
        }
    }

    /// Endpoint path (relative to the API base) for one day of this kind.
    ///
    /// Sleep lives on the 1.2 API; activity series stay on 1.
    pub fn endpoint_path(&self, date: &FitbitDate) -> String {
        match self {
            DataKind::Steps => format!("1/user/-/activities/steps/date/{}/1d.json", date),
            DataKind::HeartRate => format!("1/user/-/activities/heart/date/{}/1d.json", date),
            DataKind::Sleep => format!("1.2/user/-/sleep/date/{}.json", date),
        }
    }
}

impl fmt::Display for DataKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A calendar date in strict `YYYY-MM-DD` form.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FitbitDate(NaiveDate);

impl FromStr for FitbitDate {
    type Err = FetchError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        // chrono accepts unpadded fields, so check the shape first.
        let bytes = s.as_bytes();
        let shaped = bytes.len() == 10
            && bytes[4] == b'-'
            && bytes[7] == b'-'
            && bytes
                .iter()
                .enumerate()
                .all(|(i, b)| i == 4 || i == 7 || b.is_ascii_digit());
        if !shaped {
            return Err(FetchError::InvalidDate);
        }

        NaiveDate::parse_from_str(s, "%Y-%m-%d")
            .map(FitbitDate)
            .map_err(|_| FetchError::InvalidDate)
    }
}

impl fmt::Display for FitbitDate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0.format("%Y-%m-%d"))
    }
}

/// One (user, kind, date) request from the presentation layer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DataRequest {
    pub user_id: String,
    pub kind: DataKind,
    pub date: FitbitDate,
}

impl DataRequest {
    /// Validate the raw date and build a request.
    pub fn new(user_id: &str, kind: DataKind, date: &str) -> Result<Self, FetchError> {
        Ok(Self {
            user_id: user_id.to_string(),
            kind,
            date: date.parse()?,
        })
    }

    pub fn endpoint_path(&self) -> String {
        self.kind.endpoint_path(&self.date)
    }
}

/// Upstream JSON body, validated but otherwise untouched.
///
/// Serializing writes the original bytes back out, key order included.
#[derive(Debug, Serialize)]
#[serde(transparent)]
pub struct NormalizedResult(Box<RawValue>);

impl NormalizedResult {
    /// Check that `body` is a single JSON value and keep it verbatim.
    pub fn from_body(body: String) -> Result<Self, serde_json::Error> {
        RawValue::from_string(body).map(NormalizedResult)
    }

    pub fn as_str(&self) -> &str {
        self.0.get()
    }
}
