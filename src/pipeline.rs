//! One operator's Feed Reader -> Shape Resolver -> Geometry Builder chain.
//!
//! Chains are independent of each other; nothing is shared until the merge
//! stage, so the caller may run one chain per operator concurrently.

use tracing::info;

use crate::config::{OperatorConfig, PipelineOptions};
use crate::error::FeedError;
use crate::feed;
use crate::geometry::build_geometry;
use crate::merge::OperatorBuild;
use crate::resolve::{NearestVertexLocator, StopLocator, resolve_routes};
use crate::summary::OperatorSummary;

/// Runs the full chain for one operator with the default stop locator.
pub fn build_operator(
    op: &OperatorConfig,
    options: &PipelineOptions,
) -> Result<(OperatorBuild, OperatorSummary), FeedError> {
    build_operator_with_locator(op, options, &NearestVertexLocator)
}

/// Same as [`build_operator`] with a caller-supplied stop locator.
pub fn build_operator_with_locator(
    op: &OperatorConfig,
    options: &PipelineOptions,
    locator: &dyn StopLocator,
) -> Result<(OperatorBuild, OperatorSummary), FeedError> {
    let mut summary = OperatorSummary::new(&op.code);

    let feed = feed::load(&op.path, &mut summary)?;
    let resolved = resolve_routes(&feed, options, locator, &mut summary);
    let routes = build_geometry(&op.code, resolved, options, &mut summary);

    info!(
        operator = %op.code,
        routes = summary.routes_emitted,
        dropped_no_shape = summary.routes_dropped_no_shape,
        patterns = summary.patterns_emitted,
        deduplicated = summary.patterns_deduplicated,
        skipped_rows = summary.total_skipped_rows(),
        "Operator chain complete"
    );

    let build = OperatorBuild {
        operator: op.code.clone(),
        stops: feed.stops,
        routes,
    };
    Ok((build, summary))
}
