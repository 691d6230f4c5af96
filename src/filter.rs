use crate::comparison::truthy;
use crate::config::Config;
use crate::context::Context;
use crate::functions::Registry;
use crate::tree::{ConditionMarker, Document, Location, NodeId, NodeKind};
use crate::Evaluator;
use serde::Serialize;
use tracing::{debug, warn};

/// What happened to one conditional block.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum Outcome {
    /// Condition held; content spliced in place of the block.
    Kept,
    /// Condition failed; block and content removed.
    Dropped,
    /// Preview mode; expression shown, content kept, nothing evaluated.
    Annotated,
    /// Evaluation raised; block replaced by an error placeholder.
    Failed { error: String },
    /// Sat inside content that was dropped or replaced, so it was removed
    /// without being evaluated.
    Discarded,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MarkerReport {
    pub location: Location,
    pub expression: String,
    #[serde(flatten)]
    pub outcome: Outcome,
}

/// Per-document summary of a resolution pass, in document order.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct Resolution {
    pub document: String,
    pub preview: bool,
    pub markers: Vec<MarkerReport>,
}

impl Resolution {
    pub fn count(&self, pred: impl Fn(&Outcome) -> bool) -> usize {
        self.markers.iter().filter(|m| pred(&m.outcome)).count()
    }

    pub fn failures(&self) -> impl Iterator<Item = &MarkerReport> {
        self.markers
            .iter()
            .filter(|m| matches!(m.outcome, Outcome::Failed { .. }))
    }
}

/// Resolves every condition marker of a document into its final content.
#[derive(Default)]
pub struct ConditionalContentFilter {
    evaluator: Evaluator,
}

impl ConditionalContentFilter {
    pub fn new(registry: Registry) -> Self {
        Self {
            evaluator: Evaluator::new(registry),
        }
    }

    /// Resolve all markers of `doc` in place.
    ///
    /// Markers are collected in document order before anything is spliced,
    /// so each one is visited exactly once, including markers nested in
    /// content that a previous step moved up into the parent. Failures stay
    /// local to their marker.
    pub fn resolve(&self, doc: &mut Document, config: &Config) -> Resolution {
        let preview = config.is_preview();
        let mut resolution = Resolution {
            document: doc.name().to_string(),
            preview,
            markers: Vec::new(),
        };
        let markers = doc.markers();
        if markers.is_empty() {
            return resolution;
        }
        if preview {
            warn!(
                document = doc.name(),
                markers = markers.len(),
                "client is not set, annotating every conditional block"
            );
        }

        let ctx = Context::from_config(config);
        for id in markers {
            let Some(marker) = doc.marker(id).cloned() else {
                continue;
            };
            let outcome = if !doc.is_attached(id) {
                Outcome::Discarded
            } else if preview {
                let annotation = doc.alloc(NodeKind::Annotation {
                    expression: marker.expression.clone(),
                    indent: marker.indent,
                });
                unwrap_content(doc, id, &marker, Some(annotation));
                Outcome::Annotated
            } else {
                match self.evaluator.eval(&marker.expression, &ctx) {
                    Ok(value) if truthy(&value) => {
                        unwrap_content(doc, id, &marker, None);
                        Outcome::Kept
                    }
                    Ok(_) => {
                        doc.replace(id, Vec::new());
                        Outcome::Dropped
                    }
                    Err(err) => {
                        warn!(
                            location = %marker.location,
                            expression = %marker.expression,
                            "exception in {} expression: {err}",
                            marker.directive
                        );
                        let problem = doc.alloc(NodeKind::Problem {
                            message: format!(
                                "Exception occurred in {} expression:\n{err}",
                                marker.directive
                            ),
                            location: Some(marker.location.clone()),
                            indent: marker.indent,
                        });
                        doc.replace(id, vec![problem]);
                        Outcome::Failed {
                            error: err.to_string(),
                        }
                    }
                }
            };
            debug!(location = %marker.location, ?outcome, "resolved conditional block");
            resolution.markers.push(MarkerReport {
                location: marker.location,
                expression: marker.expression,
                outcome,
            });
        }
        resolution
    }
}

/// Replace the marker with its content, optionally preceded by `leading`.
fn unwrap_content(doc: &mut Document, id: NodeId, marker: &ConditionMarker, leading: Option<NodeId>) {
    let children = doc.take_children(id);
    for child in &children {
        doc.shift_left(*child, marker.dedent());
    }
    let replacement = leading.into_iter().chain(children).collect();
    doc.replace(id, replacement);
}
