use crate::{DocumentRecord, QueryHit, SearchError};

pub fn validate_collection_name(name: &str) -> Result<(), SearchError> {
    let valid = !name.is_empty()
        && name.len() <= 63
        && !name.starts_with('.')
        && name
            .chars()
            .all(|ch| ch.is_ascii_alphanumeric() || matches!(ch, '_' | '-' | '.'));

    if valid {
        Ok(())
    } else {
        Err(SearchError::InvalidCollectionName(name.to_string()))
    }
}

pub fn check_batch(
    records: &[DocumentRecord],
    embeddings: &[Vec<f32>],
    dimension: Option<usize>,
) -> Result<usize, SearchError> {
    if records.len() != embeddings.len() {
        return Err(SearchError::Request(format!(
            "embedding count {} doesn't match record count {}",
            embeddings.len(),
            records.len()
        )));
    }

    let expected = dimension
        .or_else(|| embeddings.first().map(Vec::len))
        .unwrap_or_default();

    for embedding in embeddings {
        if embedding.len() != expected {
            return Err(SearchError::DimensionMismatch {
                expected,
                actual: embedding.len(),
            });
        }
    }

    Ok(expected)
}

pub fn cosine_distance(left: &[f32], right: &[f32]) -> f32 {
    let dot: f32 = left.iter().zip(right).map(|(a, b)| a * b).sum();
    let left_norm = left.iter().map(|value| value * value).sum::<f32>().sqrt();
    let right_norm = right.iter().map(|value| value * value).sum::<f32>().sqrt();

    if left_norm == 0.0 || right_norm == 0.0 {
        return 1.0;
    }

    1.0 - dot / (left_norm * right_norm)
}

/// Brute-force nearest neighbours, most similar first.
pub fn rank_by_distance<'a, I>(entries: I, query_vector: &[f32], top_k: usize) -> Vec<QueryHit>
where
    I: IntoIterator<Item = (&'a DocumentRecord, &'a [f32])>,
{
    let mut hits = entries
        .into_iter()
        .map(|(record, embedding)| QueryHit {
            id: record.id.clone(),
            text: record.text.clone(),
            metadata: record.metadata.clone(),
            distance: cosine_distance(query_vector, embedding),
        })
        .collect::<Vec<_>>();

    hits.sort_by(|left, right| left.distance.total_cmp(&right.distance));
    hits.truncate(top_k);
    hits
}
