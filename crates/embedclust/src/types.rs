use serde::de::{Error as _, MapAccess, Unexpected, Visitor};
use serde::ser::SerializeMap;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::collections::BTreeMap;
use std::fmt;

/// One text item and its embedding. `text` is never inspected.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Point {
    pub text: String,
    pub embedding: Vec<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub is_outlier: Option<bool>,
}

impl Point {
    pub fn new(text: impl Into<String>, embedding: Vec<f64>) -> Self {
        Self {
            text: text.into(),
            embedding,
            is_outlier: None,
        }
    }

    pub(crate) fn flagged(&self, is_outlier: bool) -> Self {
        Self {
            is_outlier: Some(is_outlier),
            ..self.clone()
        }
    }

    pub(crate) fn unflagged(&self) -> Self {
        Self {
            is_outlier: None,
            ..self.clone()
        }
    }
}

/// Points grouped under `cluster_0`, `cluster_1`, … in ascending order.
///
/// Every input point lives in exactly one cluster, and points keep their
/// input order inside a cluster. Clusters may be empty.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Partition {
    clusters: Vec<Vec<Point>>,
}

impl Partition {
    pub fn from_clusters(clusters: Vec<Vec<Point>>) -> Self {
        Self { clusters }
    }

    pub(crate) fn single(points: Vec<Point>) -> Self {
        Self {
            clusters: vec![points],
        }
    }

    pub fn key(index: usize) -> String {
        format!("cluster_{index}")
    }

    // Inverse of `key`; rejects spellings `key` never produces, like `cluster_01`
    fn parse_key(key: &str) -> Option<usize> {
        let index: usize = key.strip_prefix("cluster_")?.parse().ok()?;
        (Self::key(index) == key).then_some(index)
    }

    /// Number of clusters, including empty ones.
    pub fn len(&self) -> usize {
        self.clusters.len()
    }

    pub fn is_empty(&self) -> bool {
        self.clusters.is_empty()
    }

    pub fn keys(&self) -> impl Iterator<Item = String> + '_ {
        (0..self.clusters.len()).map(Self::key)
    }

    pub fn get(&self, key: &str) -> Option<&[Point]> {
        self.clusters.get(Self::parse_key(key)?).map(Vec::as_slice)
    }

    pub fn iter(&self) -> impl Iterator<Item = (String, &[Point])> {
        self.clusters
            .iter()
            .enumerate()
            .map(|(i, points)| (Self::key(i), points.as_slice()))
    }

    pub fn clusters(&self) -> &[Vec<Point>] {
        &self.clusters
    }

    pub fn into_clusters(self) -> Vec<Vec<Point>> {
        self.clusters
    }

    /// All points, cluster by cluster.
    pub fn points(&self) -> impl Iterator<Item = &Point> + Clone {
        self.clusters.iter().flatten()
    }

    pub fn point_count(&self) -> usize {
        self.clusters.iter().map(Vec::len).sum()
    }

    pub fn outliers(&self) -> impl Iterator<Item = &Point> {
        self.points().filter(|p| p.is_outlier == Some(true))
    }
}

impl Serialize for Partition {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.clusters.len()))?;
        for (key, points) in self.iter() {
            map.serialize_entry(&key, points)?;
        }
        map.end()
    }
}

/// Accepts the keys in any order, but they must cover `cluster_0` up to
/// `cluster_{n-1}` with no gaps.
impl<'de> Deserialize<'de> for Partition {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        deserializer.deserialize_map(PartitionVisitor)
    }
}

struct PartitionVisitor;

impl<'de> Visitor<'de> for PartitionVisitor {
    type Value = Partition;

    fn expecting(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str("a map from cluster_0, cluster_1, ... to arrays of points")
    }

    fn visit_map<A: MapAccess<'de>>(self, mut map: A) -> Result<Partition, A::Error> {
        let mut by_index = BTreeMap::new();
        while let Some(key) = map.next_key::<String>()? {
            let index = Partition::parse_key(&key).ok_or_else(|| {
                A::Error::invalid_value(Unexpected::Str(&key), &"a key like cluster_0")
            })?;
            let points: Vec<Point> = map.next_value()?;
            if by_index.insert(index, points).is_some() {
                return Err(A::Error::custom(format_args!("duplicate key {key}")));
            }
        }

        // Keys are distinct, so no gaps means the largest is len - 1
        let len = by_index.len();
        if by_index.keys().next_back().is_some_and(|&last| last + 1 != len) {
            return Err(A::Error::custom("cluster keys must run from cluster_0 without gaps"));
        }

        Ok(Partition::from_clusters(by_index.into_values().collect()))
    }
}
