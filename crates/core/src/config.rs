use std::collections::BTreeMap;
use std::path::PathBuf;
use std::str::FromStr;

pub const DEFAULT_STORE_DIR: &str = "./chroma_db";
pub const DEFAULT_COLLECTION: &str = "admin_manual";

/// A PDF on disk and the collection its pages are written to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ManualSource {
    pub pdf_path: PathBuf,
    pub collection: String,
}

impl ManualSource {
    pub fn new(pdf_path: impl Into<PathBuf>, collection: impl Into<String>) -> Self {
        Self {
            pdf_path: pdf_path.into(),
            collection: collection.into(),
        }
    }

    pub fn defaults() -> Vec<Self> {
        vec![
            Self::new("Admin.pdf", "admin_manual"),
            Self::new("User_Guide.pdf", "user_manual"),
        ]
    }
}

impl FromStr for ManualSource {
    type Err = String;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        let (path, collection) = split_pair(value, "PATH=COLLECTION")?;
        Ok(Self::new(path, collection))
    }
}

/// One `NAME=COUNT` pair as given on the command line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExpectedCount {
    pub collection: String,
    pub count: usize,
}

impl FromStr for ExpectedCount {
    type Err = String;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        let (collection, count) = split_pair(value, "NAME=COUNT")?;
        let count = count
            .parse::<usize>()
            .map_err(|error| format!("invalid count in '{value}': {error}"))?;
        Ok(Self {
            collection: collection.to_string(),
            count,
        })
    }
}

/// Expected document totals per collection, used by the status report.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ExpectedCounts(BTreeMap<String, usize>);

impl ExpectedCounts {
    pub fn defaults() -> Self {
        [("admin_manual", 6_331), ("user_manual", 855)]
            .into_iter()
            .map(|(name, count)| ExpectedCount {
                collection: name.to_string(),
                count,
            })
            .collect()
    }

    pub fn get(&self, collection: &str) -> Option<usize> {
        self.0.get(collection).copied()
    }

    pub fn insert(&mut self, collection: impl Into<String>, count: usize) {
        self.0.insert(collection.into(), count);
    }
}

impl FromIterator<ExpectedCount> for ExpectedCounts {
    fn from_iter<I: IntoIterator<Item = ExpectedCount>>(iter: I) -> Self {
        let mut counts = Self::default();
        for item in iter {
            counts.insert(item.collection, item.count);
        }
        counts
    }
}

fn split_pair<'a>(value: &'a str, shape: &str) -> Result<(&'a str, &'a str), String> {
    match value.rsplit_once('=') {
        Some((left, right)) if !left.trim().is_empty() && !right.trim().is_empty() => {
            Ok((left.trim(), right.trim()))
        }
        _ => Err(format!("expected {shape}, got '{value}'")),
    }
}
