//! Serializable pipeline commands.
//!
//! Every operation an adapter offers the user can be expressed as a
//! [`Command`] and replayed with [`Pipeline::apply`](crate::Pipeline::apply).
//! The JSON form is internally tagged by `op`:
//!
//! ```json
//! [
//!   {"op": "resize", "size": "vga"},
//!   {"op": "gray"},
//!   {"op": "blur", "amount": {"passes": 2}},
//!   {"op": "edges"},
//!   {"op": "find_contours", "external": true},
//!   {"op": "label_contour", "key": 3, "label": "tick", "coordinate": "0,0"}
//! ]
//! ```

use serde::{Deserialize, Serialize};

use crate::blur::{BlurAmount, BlurKind};
use crate::edge::{EdgeKind, Thresholds};
use crate::pipeline::{ClearScope, ResizeOutcome};
use crate::resize::SizeName;
use crate::types::ContourKey;

/// One user-level pipeline operation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "op", rename_all = "snake_case")]
pub enum Command {
    /// Shrink to a named resolution.
    Resize {
        /// Target size name.
        size: SizeName,
    },
    /// Convert color to luminance.
    Gray,
    /// Smooth the working buffer.
    Blur {
        /// Kernel family.
        #[serde(default)]
        kind: BlurKind,
        /// Pass count or strength fraction.
        amount: BlurAmount,
    },
    /// Run edge detection.
    Edges {
        /// Edge operator.
        #[serde(default)]
        kind: EdgeKind,
    },
    /// Discover contours globally, or inside `parent`'s region.
    FindContours {
        /// Keep only outermost borders.
        #[serde(default)]
        external: bool,
        /// Restrict discovery to this contour's region.
        #[serde(default)]
        parent: Option<ContourKey>,
    },
    /// Break a contour at its corners.
    SplitContour {
        /// Contour to split.
        key: ContourKey,
        /// Corner tolerance in pixels; the configured default when absent.
        #[serde(default)]
        epsilon: Option<f64>,
    },
    /// Set or clear a contour's label and coordinate.
    LabelContour {
        /// Contour to label.
        key: ContourKey,
        /// New label; absent or empty clears it.
        #[serde(default)]
        label: Option<String>,
        /// `"x,y"` user coordinate.
        #[serde(default)]
        coordinate: Option<String>,
    },
    /// Delete a contour.
    RemoveContour {
        /// Contour to delete.
        key: ContourKey,
    },
    /// Add a contour to the export list.
    Mark {
        /// Contour to export.
        key: ContourKey,
    },
    /// Remove a contour from the export list.
    Unmark {
        /// Contour to drop from export.
        key: ContourKey,
    },
    /// Reset buffers.
    Clear {
        /// What to reset.
        scope: ClearScope,
    },
}

/// What a successfully applied [`Command`] did.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum CommandOutcome {
    /// Nothing changed (empty pipeline, already gray, not marked...).
    Unchanged,
    /// State changed; nothing further to report.
    Done,
    /// Result of a resize request.
    Resized {
        /// Resize details.
        result: ResizeOutcome,
    },
    /// A blur pass ran with this kernel size.
    Blurred {
        /// Odd kernel edge length.
        kernel: u32,
    },
    /// Edge detection ran with these thresholds.
    Edges {
        /// Thresholds used.
        thresholds: Thresholds,
    },
    /// Contours were created or linked.
    Contours {
        /// Keys created (split, global discovery) or linked as
        /// children (scoped discovery).
        keys: Vec<ContourKey>,
    },
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn script_parses() {
        let json = r#"[
            {"op": "resize", "size": "4k"},
            {"op": "gray"},
            {"op": "blur", "amount": {"strength": 0.01}},
            {"op": "edges", "kind": "canny"},
            {"op": "find_contours", "external": true},
            {"op": "find_contours", "parent": 2},
            {"op": "split_contour", "key": 1},
            {"op": "label_contour", "key": 3, "label": "tick", "coordinate": "1^2,0"},
            {"op": "remove_contour", "key": 4},
            {"op": "mark", "key": 5},
            {"op": "unmark", "key": 5},
            {"op": "clear", "scope": "processed"}
        ]"#;
        let commands: Vec<Command> = serde_json::from_str(json).unwrap();
        assert_eq!(commands.len(), 12);
        assert_eq!(commands[0], Command::Resize { size: SizeName::Uhd4k });
        assert_eq!(
            commands[2],
            Command::Blur {
                kind: BlurKind::Gaussian,
                amount: BlurAmount::Strength(0.01)
            }
        );
        assert_eq!(
            commands[5],
            Command::FindContours {
                external: false,
                parent: Some(ContourKey(2))
            }
        );
        assert_eq!(
            commands[6],
            Command::SplitContour {
                key: ContourKey(1),
                epsilon: None
            }
        );
        assert_eq!(commands[11], Command::Clear { scope: ClearScope::Processed });
    }

    #[test]
    fn unknown_op_is_rejected() {
        assert!(serde_json::from_str::<Command>(r#"{"op": "sharpen"}"#).is_err());
        assert!(serde_json::from_str::<Command>(r#"{"op": "resize", "size": "xga"}"#).is_err());
    }

    #[test]
    fn commands_round_trip() {
        let cmd = Command::LabelContour {
            key: ContourKey(7),
            label: Some("tick".into()),
            coordinate: Some("0,1".into()),
        };
        let json = serde_json::to_string(&cmd).unwrap();
        assert!(json.contains(r#""op":"label_contour""#));
        assert_eq!(serde_json::from_str::<Command>(&json).unwrap(), cmd);
    }
}
