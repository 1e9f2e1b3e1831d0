//! Discovery views: top tags across an organization's behaviors and plans.

use paceline_core::behavior::Behavior;
use paceline_core::plan::Plan;
use paceline_core::tags;
use paceline_store::Filter;

use crate::codec::decode;
use crate::collections;
use crate::context::RequestContext;
use crate::error::ServiceResult;
use crate::state::AppState;

/// The organization's most-used tags, ordered by count descending with
/// lexicographic tie-break.
pub async fn top_tags(
    state: &AppState,
    ctx: &RequestContext,
    k: usize,
) -> ServiceResult<Vec<(String, u64)>> {
    let org = ctx.org_id.to_string();
    let mut corpus: Vec<String> = Vec::new();

    let behaviors = state
        .store
        .list(collections::BEHAVIORS, &Filter::new().eq("org_id", org.clone()))
        .await?;
    for (_, doc) in &behaviors {
        let behavior: Behavior = decode(doc)?;
        corpus.extend(behavior.tags);
    }

    let plans = state
        .store
        .list(collections::PLANS, &Filter::new().eq("org_id", org))
        .await?;
    for (_, doc) in &plans {
        let plan: Plan = decode(doc)?;
        corpus.extend(plan.tags);
    }

    tracing::debug!(
        org_id = %ctx.org_id,
        corpus_size = corpus.len(),
        "Ranking tags"
    );
    Ok(tags::rank_tags(corpus, k))
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::behaviors::create_behavior;
    use crate::testing;

    #[tokio::test]
    async fn ranks_tags_across_behaviors() {
        let (state, _handles) = AppState::in_memory();
        let ctx = testing::ctx();

        let mut input = testing::behavior_input("goal");
        input.tags = vec!["fitness".to_string(), "outdoors".to_string()];
        create_behavior(&state, &ctx, input).await.unwrap();

        let mut input = testing::behavior_input("habit");
        input.tags = vec!["fitness".to_string()];
        create_behavior(&state, &ctx, input).await.unwrap();

        let ranked = top_tags(&state, &ctx, 10).await.unwrap();
        assert_eq!(ranked[0], ("fitness".to_string(), 2));
        assert_eq!(ranked[1], ("outdoors".to_string(), 1));
    }

    #[tokio::test]
    async fn respects_k_and_org_scope() {
        let (state, _handles) = AppState::in_memory();
        let ctx = testing::ctx();
        let foreign = testing::ctx();

        let mut input = testing::behavior_input("goal");
        input.tags = vec!["alpha".to_string(), "beta".to_string(), "gamma".to_string()];
        create_behavior(&state, &ctx, input).await.unwrap();

        let mut input = testing::behavior_input("goal");
        input.tags = vec!["foreign".to_string()];
        create_behavior(&state, &foreign, input).await.unwrap();

        let ranked = top_tags(&state, &ctx, 2).await.unwrap();
        assert_eq!(ranked.len(), 2);
        assert!(ranked.iter().all(|(tag, _)| tag != "foreign"));
    }

    #[tokio::test]
    async fn empty_org_has_no_tags() {
        let (state, _handles) = AppState::in_memory();
        let ctx = testing::ctx();
        assert!(top_tags(&state, &ctx, 5).await.unwrap().is_empty());
    }
}
