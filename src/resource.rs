//! Typed views of the FHIR resources returned by DEQM operations.
//!
//! Only the fields the operations are inspected for are modelled; everything
//! else is ignored on decode.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::{DeqmError, Result};

/// Resources a DEQM operation can answer with.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "resourceType")]
pub enum Resource {
    Bundle(Bundle),
    Parameters(Parameters),
    OperationOutcome(OperationOutcome),
    Library(Library),
    MeasureReport(MeasureReport),
}

impl Resource {
    pub fn from_json(body: &str) -> Result<Self> {
        let value: Value = serde_json::from_str(body)
            .map_err(|err| DeqmError::Decode(format!("invalid resource JSON: {err}")))?;
        Self::from_value(value)
    }

    pub fn from_value(value: Value) -> Result<Self> {
        let kind = resource_type(&value)
            .ok_or_else(|| DeqmError::Decode("missing resourceType".to_owned()))?
            .to_owned();
        if !matches!(
            kind.as_str(),
            "Bundle" | "Parameters" | "OperationOutcome" | "Library" | "MeasureReport"
        ) {
            return Err(DeqmError::Decode(format!(
                "unsupported resourceType '{kind}'"
            )));
        }
        serde_json::from_value(value)
            .map_err(|err| DeqmError::Decode(format!("invalid {kind} resource: {err}")))
    }

    pub fn resource_type(&self) -> &'static str {
        match self {
            Self::Bundle(_) => "Bundle",
            Self::Parameters(_) => "Parameters",
            Self::OperationOutcome(_) => "OperationOutcome",
            Self::Library(_) => "Library",
            Self::MeasureReport(_) => "MeasureReport",
        }
    }
}

fn resource_type(value: &Value) -> Option<&str> {
    value.get("resourceType").and_then(Value::as_str)
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Bundle {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    #[serde(rename = "type", default, skip_serializing_if = "Option::is_none")]
    pub bundle_type: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub total: Option<u64>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub entry: Vec<BundleEntry>,
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BundleEntry {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub full_url: Option<String>,
    /// Entry resource as raw JSON; bundles may carry any resource type.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub resource: Option<Value>,
}

impl Bundle {
    /// Entry resources whose `resourceType` equals `name`.
    pub fn resources_of_type<'a>(&'a self, name: &'a str) -> impl Iterator<Item = &'a Value> + 'a {
        self.entry
            .iter()
            .filter_map(|entry| entry.resource.as_ref())
            .filter(move |resource| resource_type(resource) == Some(name))
    }

    pub fn measure_reports(&self) -> Result<Vec<MeasureReport>> {
        self.resources_of_type("MeasureReport")
            .map(|value| {
                serde_json::from_value(value.clone()).map_err(|err| {
                    DeqmError::Decode(format!("invalid MeasureReport in bundle: {err}"))
                })
            })
            .collect()
    }
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct Parameters {
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub parameter: Vec<Parameter>,
}

/// One `Parameters.parameter` entry. `value[x]` fields land in `values`.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct Parameter {
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub resource: Option<Value>,
    #[serde(flatten)]
    pub values: Map<String, Value>,
}

impl Parameter {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Self::default()
        }
    }

    /// Sets `value<kind>`, e.g. `with_value("String", "abc")` → `valueString`.
    pub fn with_value(mut self, kind: &str, value: impl Into<Value>) -> Self {
        self.values.insert(format!("value{kind}"), value.into());
        self
    }

    pub fn with_resource(mut self, resource: Value) -> Self {
        self.resource = Some(resource);
        self
    }

    /// First `value[x]` entry, whatever its type suffix.
    pub fn value(&self) -> Option<&Value> {
        self.values
            .iter()
            .find(|(key, _)| key.starts_with("value"))
            .map(|(_, value)| value)
    }
}

impl Parameters {
    pub fn new(parameter: Vec<Parameter>) -> Self {
        Self { parameter }
    }

    pub fn get(&self, name: &str) -> Option<&Parameter> {
        self.parameter.iter().find(|param| param.name == name)
    }

    pub fn resources<'a>(&'a self, name: &'a str) -> impl Iterator<Item = &'a Value> + 'a {
        self.parameter
            .iter()
            .filter(move |param| param.name == name)
            .filter_map(|param| param.resource.as_ref())
    }

    /// First string-like `value[x]` of the named parameter.
    pub fn value_str(&self, name: &str) -> Option<&str> {
        self.get(name)?.value()?.as_str()
    }

    /// Every Bundle carried as a parameter resource.
    pub fn bundles(&self) -> Result<Vec<Bundle>> {
        self.parameter
            .iter()
            .filter_map(|param| param.resource.as_ref())
            .filter(|resource| resource_type(resource) == Some("Bundle"))
            .map(|resource| {
                serde_json::from_value(resource.clone()).map_err(|err| {
                    DeqmError::Decode(format!("invalid Bundle parameter: {err}"))
                })
            })
            .collect()
    }

    /// MeasureReports nested as Parameters → Bundle → MeasureReport.
    ///
    /// Fails when there is no Bundle, or a Bundle holds no MeasureReport.
    pub fn measure_reports(&self) -> Result<Vec<MeasureReport>> {
        let bundles = self.bundles()?;
        if bundles.is_empty() {
            return Err(DeqmError::Decode(
                "Parameters carries no Bundle resource".to_owned(),
            ));
        }
        let mut reports = Vec::new();
        for (index, bundle) in bundles.iter().enumerate() {
            let found = bundle.measure_reports()?;
            if found.is_empty() {
                return Err(DeqmError::Decode(format!(
                    "Bundle at position {index} carries no MeasureReport"
                )));
            }
            reports.extend(found);
        }
        Ok(reports)
    }
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct OperationOutcome {
    #[serde(default)]
    pub issue: Vec<Issue>,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Issue {
    pub severity: String,
    pub code: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub diagnostics: Option<String>,
}

impl OperationOutcome {
    pub fn has_errors(&self) -> bool {
        self.issue
            .iter()
            .any(|issue| matches!(issue.severity.as_str(), "error" | "fatal"))
    }
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Library {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status: Option<String>,
    #[serde(rename = "type", default, skip_serializing_if = "Option::is_none")]
    pub library_type: Option<Value>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub data_requirement: Vec<Value>,
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct MeasureReport {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status: Option<String>,
    #[serde(rename = "type", default, skip_serializing_if = "Option::is_none")]
    pub report_type: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub measure: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub subject: Option<Reference>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub period: Option<Period>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub group: Vec<Value>,
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Reference {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reference: Option<String>,
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Period {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub start: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub end: Option<String>,
}
