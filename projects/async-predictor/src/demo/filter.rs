use crate::demo::types::Predictions;
use std::collections::HashMap;

/// Per-class minimum score, keyed by class id. Classes not listed are dropped.
pub type ClassFilter = HashMap<usize, f32>;

/// Drop degenerate boxes, then apply the optional class filter.
///
/// A box survives when both sides are longer than `not_empty_threshold`
/// (pass 0 to keep everything with positive size) and, if `class_filter` is
/// set, its class is listed with a threshold strictly below its score.
pub fn filter_detections(
    predictions: &Predictions,
    not_empty_threshold: f32,
    class_filter: Option<&ClassFilter>,
) -> Predictions {
    let detections = predictions
        .detections
        .iter()
        .filter(|d| d.bbox.is_nonempty(not_empty_threshold))
        .filter(|d| match class_filter {
            Some(filter) => filter
                .get(&d.class_id)
                .map(|min_score| d.score > *min_score)
                .unwrap_or(false),
            None => true,
        })
        .cloned()
        .collect();

    Predictions {
        width: predictions.width,
        height: predictions.height,
        detections,
    }
}
