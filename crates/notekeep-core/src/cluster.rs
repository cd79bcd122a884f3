//! Snippet clustering ahead of insert resolution.
//!
//! Captured snippets often say the same thing twice; clustering groups
//! near-duplicates so they are filed as one insertion. Grouping is
//! density-based with a minimum cluster size of one: every snippet lands
//! in exactly one cluster, there is no noise class, and two snippets share
//! a cluster whenever a chain of neighbors within `eps` connects them.
//! Vectors are unit-normalized first, making the grouping invariant to
//! embedding magnitude.

use crate::embedding::{euclidean_distance, normalize_unit, Embedder};
use crate::error::{CoreError, CoreResult};
use crate::models::{NoteCluster, NoteSnippet};

/// Neighborhood radius on unit-normalized vectors.
pub const CLUSTER_EPS: f32 = 0.1;

/// Group snippets into connected components under the `eps` radius.
///
/// Clusters are ordered by their earliest member, and members keep input
/// order, so the output is deterministic for a fixed input.
pub fn cluster_snippets(snippets: &[NoteSnippet], eps: f32) -> Vec<NoteCluster> {
    let unit: Vec<Vec<f32>> = snippets.iter().map(|s| normalize_unit(&s.vector)).collect();
    let mut assigned = vec![false; snippets.len()];
    let mut clusters = Vec::new();

    for seed in 0..snippets.len() {
        if assigned[seed] {
            continue;
        }
        assigned[seed] = true;
        let mut members = vec![seed];
        let mut cursor = 0;
        while cursor < members.len() {
            let current = members[cursor];
            cursor += 1;
            for other in 0..snippets.len() {
                if !assigned[other] && euclidean_distance(&unit[current], &unit[other]) <= eps {
                    assigned[other] = true;
                    members.push(other);
                }
            }
        }
        members.sort_unstable();
        clusters.push(NoteCluster {
            members: members.into_iter().map(|i| snippets[i].clone()).collect(),
        });
    }
    clusters
}

/// Collapse each cluster to a single snippet.
///
/// Singletons pass through untouched. Larger clusters join their texts
/// with a blank line, re-embed the joined text, and carry the union of
/// member ids so every source snippet stays traceable.
pub async fn merge_clusters(
    embedder: &dyn Embedder,
    clusters: Vec<NoteCluster>,
) -> CoreResult<Vec<NoteSnippet>> {
    let mut merged = Vec::with_capacity(clusters.len());
    for cluster in clusters {
        let mut members = cluster.members;
        if members.len() == 1 {
            if let Some(only) = members.pop() {
                merged.push(only);
            }
            continue;
        }
        let text = members
            .iter()
            .map(|m| m.text.as_str())
            .collect::<Vec<_>>()
            .join("\n\n");
        let ids = members
            .iter()
            .flat_map(|m| m.ids.iter().cloned())
            .collect();
        let vector = embedder
            .embed(&text)
            .await
            .map_err(CoreError::Upstream)?;
        merged.push(NoteSnippet { ids, vector, text });
    }
    Ok(merged)
}
