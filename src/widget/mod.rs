//! Widget bundle access for `resources/read`.

pub mod assets;

pub use assets::{WidgetAssetError, WidgetAssets};
