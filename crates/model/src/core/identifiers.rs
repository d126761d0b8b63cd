use serde::{Deserialize, Serialize};
use std::{fmt, str::FromStr, sync::Arc};

/// Three-part identifier of a destination table.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TableId {
    pub project: String,
    pub dataset: String,
    pub table: String,
}

impl TableId {
    pub fn new(
        project: impl Into<String>,
        dataset: impl Into<String>,
        table: impl Into<String>,
    ) -> Self {
        Self {
            project: project.into(),
            dataset: dataset.into(),
            table: table.into(),
        }
    }

    /// Resource path of the table, `projects/{p}/datasets/{d}/tables/{t}`.
    pub fn resource_path(&self) -> String {
        format!(
            "projects/{}/datasets/{}/tables/{}",
            self.project, self.dataset, self.table
        )
    }
}

impl fmt::Display for TableId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}.{}", self.project, self.dataset, self.table)
    }
}

impl FromStr for TableId {
    type Err = String;

    /// Accepts `project.dataset.table` and the legacy `project:dataset.table`.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (project, rest) = match s.split_once(':') {
            Some((project, rest)) => (project, rest),
            None => s
                .split_once('.')
                .ok_or_else(|| format!("Invalid table id: {s}"))?,
        };

        let (dataset, table) = rest
            .split_once('.')
            .ok_or_else(|| format!("Invalid table id: {s}"))?;

        if [project, dataset, table]
            .iter()
            .any(|part| part.is_empty() || part.contains(['.', ':', '/']))
        {
            return Err(format!("Invalid table id: {s}"));
        }

        Ok(TableId::new(project, dataset, table))
    }
}

/// Fully-qualified name of a write stream, as returned by the destination.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct StreamName(Arc<str>);

impl StreamName {
    pub fn new(name: impl Into<String>) -> Self {
        Self(Arc::from(name.into()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<String> for StreamName {
    fn from(s: String) -> Self {
        Self::new(s)
    }
}

impl From<&str> for StreamName {
    fn from(s: &str) -> Self {
        Self::new(s)
    }
}

impl fmt::Display for StreamName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}
