//! Declarative image operations and the ordered [`Recipe`] that holds them.
//!
//! An [`Operation`] is pure data: what to do and with which parameters. It
//! owns no image and performs no I/O. A [`Recipe`] is the registration
//! surface integrators use to build the ordered list once, at configuration
//! time; the [`Pipeline`](crate::pipeline::Pipeline) evaluates it per file.
//!
//! ```
//! use upload_imaging::{Gravity, Recipe};
//!
//! let recipe = Recipe::new()
//!     .auto_orient()
//!     .resize_to_fill(400, 500, Gravity::North)
//!     .strip()
//!     .convert("WebP");
//! assert_eq!(recipe.len(), 4);
//! ```

use crate::imaging::ImageHandle;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

/// Anchor point used when cropping during a fill-resize.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "&'static str")]
pub enum Gravity {
    NorthWest,
    North,
    NorthEast,
    West,
    #[default]
    Center,
    East,
    SouthWest,
    South,
    SouthEast,
}

impl Gravity {
    pub const ALL: [Gravity; 9] = [
        Gravity::NorthWest,
        Gravity::North,
        Gravity::NorthEast,
        Gravity::West,
        Gravity::Center,
        Gravity::East,
        Gravity::SouthWest,
        Gravity::South,
        Gravity::SouthEast,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            Gravity::NorthWest => "NorthWest",
            Gravity::North => "North",
            Gravity::NorthEast => "NorthEast",
            Gravity::West => "West",
            Gravity::Center => "Center",
            Gravity::East => "East",
            Gravity::SouthWest => "SouthWest",
            Gravity::South => "South",
            Gravity::SouthEast => "SouthEast",
        }
    }

    /// Grid position as (column, row), each 0 (leading), 1 (middle) or 2 (trailing).
    pub(crate) fn anchor(self) -> (u8, u8) {
        match self {
            Gravity::NorthWest => (0, 0),
            Gravity::North => (1, 0),
            Gravity::NorthEast => (2, 0),
            Gravity::West => (0, 1),
            Gravity::Center => (1, 1),
            Gravity::East => (2, 1),
            Gravity::SouthWest => (0, 2),
            Gravity::South => (1, 2),
            Gravity::SouthEast => (2, 2),
        }
    }
}

impl fmt::Display for Gravity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Gravity {
    type Err = String;

    /// Accepts `NorthWest`, `northwest`, `north_west` and `north-west`.
    fn from_str(value: &str) -> Result<Self, Self::Err> {
        let normalized: String = value
            .trim()
            .chars()
            .filter(|c| *c != '_' && *c != '-')
            .map(|c| c.to_ascii_lowercase())
            .collect();
        Gravity::ALL
            .into_iter()
            .find(|g| g.as_str().eq_ignore_ascii_case(&normalized))
            .ok_or_else(|| {
                format!(
                    "unknown gravity '{value}'. Expected one of: {}",
                    Gravity::ALL.map(Gravity::as_str).join(", ")
                )
            })
    }
}

impl TryFrom<String> for Gravity {
    type Error = String;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<Gravity> for &'static str {
    fn from(gravity: Gravity) -> Self {
        gravity.as_str()
    }
}

/// One declarative image transform with fixed parameters.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "op", rename_all = "snake_case", deny_unknown_fields)]
pub enum Operation {
    /// Re-encode as `format` on flush. Pixels are untouched.
    Convert { format: String },
    /// Shrink to fit inside the box; never enlarges.
    ResizeToLimit { width: u32, height: u32 },
    /// Scale up or down to fit inside the box.
    ResizeToFit { width: u32, height: u32 },
    /// Scale to cover the box and crop at `gravity` to exact size.
    ResizeToFill {
        width: u32,
        height: u32,
        #[serde(default)]
        gravity: Gravity,
    },
    /// Rotate/flip pixels according to the EXIF orientation tag.
    AutoOrient,
    /// Drop all embedded metadata.
    Strip,
}

impl Operation {
    /// Convert operation with the format name normalized to lowercase.
    pub fn convert(format: impl AsRef<str>) -> Self {
        Operation::Convert {
            format: format.as_ref().trim().to_ascii_lowercase(),
        }
    }

    /// Short snake_case name, matching the `op` key in config files.
    pub fn name(&self) -> &'static str {
        match self {
            Operation::Convert { .. } => "convert",
            Operation::ResizeToLimit { .. } => "resize_to_limit",
            Operation::ResizeToFit { .. } => "resize_to_fit",
            Operation::ResizeToFill { .. } => "resize_to_fill",
            Operation::AutoOrient => "auto_orient",
            Operation::Strip => "strip",
        }
    }
}

impl fmt::Display for Operation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Operation::Convert { format } => write!(f, "convert({format})"),
            Operation::ResizeToLimit { width, height } => {
                write!(f, "resize_to_limit({width}x{height})")
            }
            Operation::ResizeToFit { width, height } => {
                write!(f, "resize_to_fit({width}x{height})")
            }
            Operation::ResizeToFill {
                width,
                height,
                gravity,
            } => write!(f, "resize_to_fill({width}x{height}, {gravity})"),
            Operation::AutoOrient => f.write_str("auto_orient"),
            Operation::Strip => f.write_str("strip"),
        }
    }
}

/// Error a hook may return to abort the pipeline.
pub type HookError = Box<dyn std::error::Error + Send + Sync>;

/// Caller-supplied customization run right after an operation's built-in
/// transform. Receives the handle and hands it back, possibly mutated.
pub type Hook = Arc<dyn Fn(ImageHandle) -> Result<ImageHandle, HookError> + Send + Sync>;

/// A registered operation plus its optional hook.
#[derive(Clone)]
pub struct Step {
    pub operation: Operation,
    pub hook: Option<Hook>,
}

impl fmt::Debug for Step {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Step")
            .field("operation", &self.operation)
            .field("hook", &self.hook.as_ref().map(|_| "<hook>"))
            .finish()
    }
}

impl From<Operation> for Step {
    fn from(operation: Operation) -> Self {
        Self {
            operation,
            hook: None,
        }
    }
}

/// Ordered list of operations, applied exactly in registration order.
///
/// Registration does no validation beyond what the types enforce: zero
/// dimensions or unknown formats surface when the recipe is applied.
#[derive(Debug, Clone, Default)]
pub struct Recipe {
    steps: Vec<Step>,
}

impl Recipe {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append any operation.
    pub fn push(mut self, operation: Operation) -> Self {
        self.steps.push(operation.into());
        self
    }

    pub fn convert(self, format: impl AsRef<str>) -> Self {
        self.push(Operation::convert(format))
    }

    pub fn resize_to_limit(self, width: u32, height: u32) -> Self {
        self.push(Operation::ResizeToLimit { width, height })
    }

    pub fn resize_to_fit(self, width: u32, height: u32) -> Self {
        self.push(Operation::ResizeToFit { width, height })
    }

    pub fn resize_to_fill(self, width: u32, height: u32, gravity: Gravity) -> Self {
        self.push(Operation::ResizeToFill {
            width,
            height,
            gravity,
        })
    }

    pub fn auto_orient(self) -> Self {
        self.push(Operation::AutoOrient)
    }

    pub fn strip(self) -> Self {
        self.push(Operation::Strip)
    }

    /// Attach a hook to the most recently registered operation, replacing
    /// any hook it already had. No-op on an empty recipe.
    pub fn with_hook<F>(mut self, hook: F) -> Self
    where
        F: Fn(ImageHandle) -> Result<ImageHandle, HookError> + Send + Sync + 'static,
    {
        if let Some(last) = self.steps.last_mut() {
            last.hook = Some(Arc::new(hook));
        }
        self
    }

    pub fn steps(&self) -> &[Step] {
        &self.steps
    }

    pub fn operations(&self) -> impl Iterator<Item = &Operation> {
        self.steps.iter().map(|s| &s.operation)
    }

    pub fn len(&self) -> usize {
        self.steps.len()
    }

    pub fn is_empty(&self) -> bool {
        self.steps.is_empty()
    }
}

impl FromIterator<Operation> for Recipe {
    fn from_iter<I: IntoIterator<Item = Operation>>(iter: I) -> Self {
        Self {
            steps: iter.into_iter().map(Step::from).collect(),
        }
    }
}
